//! Audio source contract and basic adapters.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

/// A pull-based provider of raw audio for the voice driver.
///
/// Samples are interleaved signed 16-bit PCM at 48 kHz, two channels.
/// The driver requests up to one 20 ms frame (1 920 samples) at a time;
/// writing fewer samples than requested ends the stream after that frame
/// is sent.
pub trait AudioSource: Send {
    /// Fills `buffer` with up to `buffer.len()` samples, returning how
    /// many were written.
    fn read(&mut self, buffer: &mut [i16]) -> usize;
}

/// Plays out a PCM buffer held in memory.
pub struct MemorySource {
    samples: Vec<i16>,
    cursor: usize,
}

impl MemorySource {
    /// Wraps interleaved stereo PCM samples.
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples, cursor: 0 }
    }
}

impl AudioSource for MemorySource {
    fn read(&mut self, buffer: &mut [i16]) -> usize {
        let remaining = self.samples.len() - self.cursor;
        let count = remaining.min(buffer.len());

        buffer[..count].copy_from_slice(&self.samples[self.cursor..self.cursor + count]);
        self.cursor += count;

        count
    }
}

/// Adapts any byte reader of little-endian interleaved PCM.
///
/// Useful for piping decoded audio out of a child process or file.
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read + Send> ReaderSource<R> {
    /// Wraps a byte reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> AudioSource for ReaderSource<R> {
    fn read(&mut self, buffer: &mut [i16]) -> usize {
        for (written, slot) in buffer.iter_mut().enumerate() {
            match self.inner.read_i16::<LittleEndian>() {
                Ok(sample) => *slot = sample,
                Err(_) => return written,
            }
        }

        buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STEREO_FRAME_SIZE;

    #[test]
    fn memory_source_signals_end_by_short_read() {
        let mut source = MemorySource::new(vec![1i16; STEREO_FRAME_SIZE + 480]);
        let mut frame = [0i16; STEREO_FRAME_SIZE];

        assert_eq!(source.read(&mut frame), STEREO_FRAME_SIZE);
        assert_eq!(source.read(&mut frame), 480);
        assert_eq!(source.read(&mut frame), 0);
    }

    #[test]
    fn reader_source_decodes_little_endian_pairs() {
        let bytes = vec![0x01, 0x00, 0xff, 0x7f, 0x00, 0x80];
        let mut source = ReaderSource::new(std::io::Cursor::new(bytes));
        let mut frame = [0i16; 4];

        assert_eq!(source.read(&mut frame), 3);
        assert_eq!(&frame[..3], &[1, i16::MAX, i16::MIN]);
    }
}
