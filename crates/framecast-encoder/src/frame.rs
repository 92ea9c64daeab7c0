//! Raster surfaces and encoder output.

use std::time::Instant;

use bytes::Bytes;

use crate::error::EncoderError;
use crate::EncoderResult;

/// Bytes per RGB24 pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// A resizable RGB24 surface whose rows are padded to 4-byte boundaries.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    stride: usize,
    pixels: Vec<u8>,
    pushed_at: Option<Instant>,
}

impl FrameBuffer {
    /// An empty 0x0 buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A zeroed buffer of the given size.
    pub fn with_size(width: u32, height: u32) -> EncoderResult<Self> {
        let mut buffer = Self::new();
        buffer.resize_if_necessary(width, height)?;
        Ok(buffer)
    }

    /// Row length in bytes for a surface `width` pixels wide, or `None` if
    /// it does not fit in `usize`.
    pub fn stride_for(width: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(BYTES_PER_PIXEL)?
            .checked_next_multiple_of(4)
    }

    /// Total byte size of a `width` x `height` surface, or `None` on overflow.
    pub fn size_for(width: u32, height: u32) -> Option<usize> {
        Self::stride_for(width)?.checked_mul(height as usize)
    }

    /// Resize in place if the dimensions differ. Returns true if it resized.
    ///
    /// Pixel contents are unspecified after a resize.
    pub fn resize_if_necessary(&mut self, width: u32, height: u32) -> EncoderResult<bool> {
        if self.width == width && self.height == height {
            return Ok(false);
        }

        let (Some(stride), Some(size)) = (Self::stride_for(width), Self::size_for(width, height))
        else {
            return Err(EncoderError::InvalidInput(format!(
                "{width}x{height} frame is too large"
            )));
        };

        self.width = width;
        self.height = height;
        self.stride = stride;
        self.pixels.resize(size, 0);
        Ok(true)
    }

    /// Copy `src` into this buffer, resizing first.
    ///
    /// `src` must hold exactly [`FrameBuffer::size_for`] bytes. With `flip`
    /// the rows are stored bottom-up.
    pub fn fill(&mut self, width: u32, height: u32, src: &[u8], flip: bool) -> EncoderResult<()> {
        let Some(expected) = Self::size_for(width, height) else {
            return Err(EncoderError::InvalidInput(format!(
                "{width}x{height} frame is too large"
            )));
        };
        if src.len() != expected {
            return Err(EncoderError::InvalidInput(format!(
                "{width}x{height} frame needs {expected} bytes, got {}",
                src.len()
            )));
        }

        self.resize_if_necessary(width, height)?;
        if !flip {
            self.pixels.copy_from_slice(src);
        } else if self.stride > 0 {
            for (dst, src) in self
                .pixels
                .chunks_exact_mut(self.stride)
                .zip(src.chunks_exact(self.stride).rev())
            {
                dst.copy_from_slice(src);
            }
        }
        self.pushed_at = Some(Instant::now());
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// True for a degenerate 0-wide or 0-high surface.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// All pixel bytes, padding included.
    pub fn data(&self) -> &[u8] {
        &self.pixels
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Row `y`, padding included.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.pixels[start..start + self.stride]
    }

    /// When the producer last filled this buffer.
    pub fn pushed_at(&self) -> Option<Instant> {
        self.pushed_at
    }
}

/// A view into an encoder's output buffer.
///
/// Valid until the encoder is used again; receivers that need the bytes later
/// must copy them out, e.g. with [`EncodedFrame::to_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

impl<'a> EncodedFrame<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// A zero-length frame, meaning "nothing to send this cycle".
    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height, &[])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy into an owned packet.
    pub fn to_packet(&self) -> EncodedPacket {
        EncodedPacket {
            width: self.width,
            height: self.height,
            data: Bytes::copy_from_slice(self.data),
        }
    }
}

/// An owned copy of an [`EncodedFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}
