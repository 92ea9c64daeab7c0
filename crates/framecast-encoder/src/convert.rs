//! RGB24 to NV12 conversion with nearest-neighbour scaling.

use crate::frame::{FrameBuffer, BYTES_PER_PIXEL};

/// An NV12 picture: a full-resolution Y plane followed by an interleaved,
/// 2x2-subsampled UV plane. Both planes have a stride equal to `width`.
#[derive(Debug, Clone, Default)]
pub struct Nv12Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Nv12Image {
    pub fn new(width: u32, height: u32) -> Self {
        let mut image = Self::default();
        image.resize(width, height);
        image
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        let y_size = width as usize * height as usize;
        self.data.resize(y_size + y_size / 2, 0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.y_size()]
    }

    pub fn uv_plane(&self) -> &[u8] {
        &self.data[self.y_size()..]
    }

    fn y_size(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Convert `frame` into `out`, scaled to `width` x `height`.
///
/// `width` and `height` must be even. `out` is resized as needed so its
/// allocation can be reused across frames.
pub fn rgb24_to_nv12(frame: &FrameBuffer, width: u32, height: u32, out: &mut Nv12Image) {
    out.resize(width, height);
    if frame.is_empty() || width == 0 || height == 0 {
        out.data.fill(0);
        return;
    }

    let w = width as usize;
    let h = height as usize;

    // Source column byte offset and source row for every output column and row.
    let src_x: Vec<usize> = (0..w)
        .map(|x| x * frame.width() as usize / w * BYTES_PER_PIXEL)
        .collect();
    let src_y: Vec<u32> = (0..h)
        .map(|y| (y * frame.height() as usize / h) as u32)
        .collect();

    let (y_plane, uv_plane) = out.data.split_at_mut(w * h);

    // Y plane
    for (y, dst) in y_plane.chunks_exact_mut(w).enumerate() {
        let row = frame.row(src_y[y]);
        for (x, luma) in dst.iter_mut().enumerate() {
            let (r, g, b) = rgb_at(row, src_x[x]);

            // BT.601
            *luma = (0.299 * r + 0.587 * g + 0.114 * b) as u8;
        }
    }

    // UV plane, one sample per 2x2 block averaged over the block.
    for (by, dst) in uv_plane.chunks_exact_mut(w).enumerate() {
        let top = frame.row(src_y[by * 2]);
        let bottom = frame.row(src_y[by * 2 + 1]);

        for bx in 0..w / 2 {
            let mut sum = (0.0f32, 0.0f32, 0.0f32);
            for row in [top, bottom] {
                for offset in [src_x[bx * 2], src_x[bx * 2 + 1]] {
                    let (r, g, b) = rgb_at(row, offset);
                    sum = (sum.0 + r, sum.1 + g, sum.2 + b);
                }
            }
            let (r, g, b) = (sum.0 / 4.0, sum.1 / 4.0, sum.2 / 4.0);

            // BT.601
            let u = ((-0.169 * r - 0.331 * g + 0.500 * b) + 128.0).clamp(0.0, 255.0) as u8;
            let v = ((0.500 * r - 0.419 * g - 0.081 * b) + 128.0).clamp(0.0, 255.0) as u8;

            dst[bx * 2] = u;
            dst[bx * 2 + 1] = v;
        }
    }
}

#[inline]
fn rgb_at(row: &[u8], offset: usize) -> (f32, f32, f32) {
    (
        f32::from(row[offset]),
        f32::from(row[offset + 1]),
        f32::from(row[offset + 2]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> FrameBuffer {
        let mut frame = FrameBuffer::with_size(width, height).unwrap();
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width as usize {
                row[x * 3..x * 3 + 3].copy_from_slice(&rgb);
            }
        }
        frame
    }

    #[test]
    fn test_plane_sizes() {
        let image = Nv12Image::new(8, 4);
        assert_eq!(image.y_plane().len(), 32);
        assert_eq!(image.uv_plane().len(), 16);
    }

    #[test]
    fn test_white_and_black() {
        let mut out = Nv12Image::default();

        rgb24_to_nv12(&solid(4, 4, [255, 255, 255]), 4, 4, &mut out);
        assert!(out.y_plane().iter().all(|&y| y >= 254));
        assert!(out.uv_plane().iter().all(|&c| (127..=129).contains(&c)));

        rgb24_to_nv12(&solid(4, 4, [0, 0, 0]), 4, 4, &mut out);
        assert!(out.y_plane().iter().all(|&y| y == 0));
    }

    #[test]
    fn test_red_chroma() {
        let mut out = Nv12Image::default();
        rgb24_to_nv12(&solid(2, 2, [255, 0, 0]), 2, 2, &mut out);
        let (u, v) = (out.uv_plane()[0], out.uv_plane()[1]);
        assert!(u < 128);
        assert!(v > 200);
    }

    #[test]
    fn test_scaling_changes_geometry() {
        let mut out = Nv12Image::default();
        rgb24_to_nv12(&solid(5, 3, [10, 20, 30]), 8, 6, &mut out);
        assert_eq!(out.width(), 8);
        assert_eq!(out.height(), 6);
        let expected = (0.299 * 10.0 + 0.587 * 20.0 + 0.114 * 30.0) as u8;
        assert!(out.y_plane().iter().all(|&y| y == expected));
    }
}
