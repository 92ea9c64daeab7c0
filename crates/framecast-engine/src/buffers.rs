//! Triple-buffered frame hand-off between the producer and the encoders.
//!
//! Three [`FrameBuffer`]s rotate between three roles:
//!
//! * **write**: filled by the producer, touched by nobody else.
//! * **spare**: the newest completed write, waiting to be published.
//! * **read**: the published frame, read concurrently by every encoder.
//!
//! Each completed write gets the next generation number. The producer moves
//! a finished write buffer into the spare slot; the swap step moves the spare
//! slot into the read slot if it holds a newer generation. A frame still in
//! the spare slot when a newer one arrives is overwritten, which is the
//! overload policy: encoders only ever see the newest frame, and the
//! generations they see are strictly increasing.
//!
//! Memory ordering: buffer contents are only ever accessed under the lock of
//! the slot that holds them, so the locks order all pixel data. The two
//! atomics are hints that let loops skip taking a lock:
//!
//! * `written` is stored with `Release` after the spare slot is updated and
//!   loaded with `Acquire` by the swap step.
//! * `published` is stored with `Release` while the read slot is still
//!   exclusively locked. Encoders load it `Relaxed`: a stale value only
//!   delays or repeats a check, and the shared read lock they then take
//!   synchronizes with the swap that wrote the frame.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use framecast_encoder::{EncoderResult, FrameBuffer};

/// A buffer together with the generation of the write that filled it.
#[derive(Debug, Default)]
pub struct PublishedFrame {
    buffer: FrameBuffer,
    generation: u64,
}

impl PublishedFrame {
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// 0 until the first frame is published.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct WriteSide {
    buffer: FrameBuffer,
    next_generation: u64,
}

/// Result of a successful swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swapped {
    /// Generation now in the read slot.
    pub generation: u64,

    /// Completed writes that were overwritten before they could be published.
    pub dropped: u64,
}

/// Three-slot frame rotation.
#[derive(Debug, Default)]
pub struct TripleBuffer {
    write: Mutex<WriteSide>,
    spare: Mutex<PublishedFrame>,
    read: RwLock<PublishedFrame>,
    written: AtomicU64,
    published: AtomicU64,
}

impl TripleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a frame in and make it the newest completed write.
    ///
    /// Only blocks on other producers and, briefly, on the spare slot lock
    /// that the swap step holds for a pointer exchange.
    pub fn push(&self, width: u32, height: u32, data: &[u8], flip: bool) -> EncoderResult<u64> {
        let mut write = self.write.lock();
        write.buffer.fill(width, height, data, flip)?;
        write.next_generation += 1;
        let generation = write.next_generation;

        {
            let mut spare = self.spare.lock();
            mem::swap(&mut spare.buffer, &mut write.buffer);
            spare.generation = generation;
        }

        self.written.store(generation, Ordering::Release);
        Ok(generation)
    }

    /// True if a completed write is newer than the published frame.
    pub fn has_pending(&self) -> bool {
        self.written.load(Ordering::Acquire) > self.published.load(Ordering::Acquire)
    }

    /// Publish the newest completed write, if there is one.
    ///
    /// Takes the read slot exclusively, so no encoder holds the old frame
    /// while it is handed back as the spare.
    pub fn swap(&self) -> Option<Swapped> {
        if !self.has_pending() {
            return None;
        }

        let mut read = self.read.write();
        let mut spare = self.spare.lock();
        if spare.generation <= read.generation {
            return None;
        }

        let dropped = spare.generation - read.generation - 1;
        mem::swap(&mut *read, &mut *spare);
        self.published.store(read.generation, Ordering::Release);

        Some(Swapped {
            generation: read.generation,
            dropped,
        })
    }

    /// Generation of the published frame. May lag behind; see the module docs.
    pub fn published_generation(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Shared access to the published frame.
    pub fn read(&self) -> RwLockReadGuard<'_, PublishedFrame> {
        self.read.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    fn frame_of(value: u8) -> Vec<u8> {
        vec![value; FrameBuffer::size_for(2, 2).unwrap()]
    }

    #[test]
    fn test_nothing_published_initially() {
        let buffers = TripleBuffer::new();
        assert!(!buffers.has_pending());
        assert_eq!(buffers.swap(), None);
        assert_eq!(buffers.read().generation(), 0);
        assert!(buffers.read().buffer().is_empty());
    }

    #[test]
    fn test_push_then_swap() {
        let buffers = TripleBuffer::new();
        assert_eq!(buffers.push(2, 2, &frame_of(7), false).unwrap(), 1);
        assert!(buffers.has_pending());

        let swapped = buffers.swap().unwrap();
        assert_eq!(swapped, Swapped { generation: 1, dropped: 0 });
        assert_eq!(buffers.published_generation(), 1);

        let read = buffers.read();
        assert_eq!(read.generation(), 1);
        assert!(read.buffer().data().iter().all(|&b| b == 7));
    }

    #[test]
    fn test_only_newest_frame_is_published() {
        let buffers = TripleBuffer::new();
        for value in 1..=3 {
            buffers.push(2, 2, &frame_of(value), false).unwrap();
        }

        let swapped = buffers.swap().unwrap();
        assert_eq!(swapped.generation, 3);
        assert_eq!(swapped.dropped, 2);
        assert!(buffers.read().buffer().data().iter().all(|&b| b == 3));
        assert_eq!(buffers.swap(), None);
    }

    #[test]
    fn test_rejected_push_keeps_generation() {
        let buffers = TripleBuffer::new();
        assert!(buffers.push(2, 2, &[0u8; 3], false).is_err());
        assert!(!buffers.has_pending());
        assert_eq!(buffers.push(2, 2, &frame_of(1), false).unwrap(), 1);
    }

    #[test]
    fn test_readers_see_increasing_generations() {
        let buffers = Arc::new(TripleBuffer::new());
        let done = Arc::new(AtomicBool::new(false));

        let producer = {
            let buffers = Arc::clone(&buffers);
            thread::spawn(move || {
                for generation in 1..=2000u64 {
                    let value = (generation % 251) as u8;
                    buffers.push(2, 2, &frame_of(value), false).unwrap();
                }
            })
        };

        let swapper = {
            let buffers = Arc::clone(&buffers);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) || buffers.has_pending() {
                    if buffers.swap().is_none() {
                        thread::yield_now();
                    }
                }
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let buffers = Arc::clone(&buffers);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut last = 0;
                    while !done.load(Ordering::Acquire) {
                        let frame = buffers.read();
                        let generation = frame.generation();
                        assert!(generation >= last);
                        if generation > 0 {
                            let value = (generation % 251) as u8;
                            assert!(frame.buffer().data().iter().all(|&b| b == value));
                        }
                        last = generation;
                    }
                })
            })
            .collect();

        producer.join().unwrap();
        done.store(true, Ordering::Release);
        swapper.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(buffers.read().generation(), 2000);
    }
}
