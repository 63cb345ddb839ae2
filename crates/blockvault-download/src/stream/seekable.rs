//! Byte-granular seekable reader.
//!
//! The outer layer over the block producer. It owns the only buffer in the
//! stack: the stream must be constructed with a zero high-water mark, so no
//! bytes are queued anywhere but here, and a seek can account for every
//! buffered byte.

// In-buffer distances are bounded by the buffer length, which is a usize.
#![allow(clippy::cast_possible_truncation)]

use blockvault_core::DownloadError;

use super::producer::BlockStream;

/// Result of one [`SeekableStream::read`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadBytes {
    /// The bytes read; shorter than requested only at end of file.
    pub bytes: Vec<u8>,
    /// True once the producer has signaled EOF. A read can deliver its last
    /// bytes and `done` together.
    pub done: bool,
}

/// Random-access reads over a revision's plaintext.
pub struct SeekableStream {
    producer: BlockStream,
    buffer: Vec<u8>,
    buffer_pos: usize,
    /// Logical file offset of `buffer_pos`; equals the number of plaintext
    /// bytes already returned since the last seek target.
    current_position: u64,
    stream_closed: bool,
}

impl std::fmt::Debug for SeekableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeekableStream")
            .field("producer", &self.producer)
            .field("buffer_pos", &self.buffer_pos)
            .field("current_position", &self.current_position)
            .field("stream_closed", &self.stream_closed)
            .finish_non_exhaustive()
    }
}

impl SeekableStream {
    /// Wrap a producer. `high_water_mark` must be zero: the stream performs
    /// its own buffering and any queuing below it would break seek
    /// accounting.
    pub(crate) fn new(producer: BlockStream, high_water_mark: usize) -> Result<Self, DownloadError> {
        if high_water_mark != 0 {
            return Err(DownloadError::validation(
                "seekable stream requires a zero high-water mark",
            ));
        }
        Ok(Self {
            producer,
            buffer: Vec::new(),
            buffer_pos: 0,
            current_position: 0,
            stream_closed: false,
        })
    }

    /// The logical file offset the next read starts at.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.current_position
    }

    /// Read up to `n` bytes. Returns exactly `n` bytes unless end of file is
    /// reached first. `n` must be positive.
    pub async fn read(&mut self, n: usize) -> Result<ReadBytes, DownloadError> {
        if n == 0 {
            return Err(DownloadError::validation("read length must be positive"));
        }

        self.ensure_buffer(n).await?;

        let available = self.buffer.len() - self.buffer_pos;
        let take = n.min(available);
        let bytes = self.buffer[self.buffer_pos..self.buffer_pos + take].to_vec();
        self.buffer_pos += take;
        self.current_position += take as u64;

        Ok(ReadBytes {
            bytes,
            done: self.stream_closed,
        })
    }

    /// Pull chunks until at least `min_bytes` are buffered or the producer
    /// reports EOF, then compact the buffer.
    async fn ensure_buffer(&mut self, min_bytes: usize) -> Result<(), DownloadError> {
        let buffered = self.buffer.len() - self.buffer_pos;
        let mut needed = min_bytes.saturating_sub(buffered);
        let mut chunks: Vec<Vec<u8>> = Vec::new();

        while needed > 0 && !self.stream_closed {
            match self.producer.pull().await? {
                Some(chunk) => {
                    needed = needed.saturating_sub(chunk.len());
                    chunks.push(chunk);
                }
                None => self.stream_closed = true,
            }
        }

        if !chunks.is_empty() || self.buffer_pos > 0 {
            let mut rebuilt = self.buffer.split_off(self.buffer_pos);
            for chunk in chunks {
                rebuilt.extend_from_slice(&chunk);
            }
            self.buffer = rebuilt;
            self.buffer_pos = 0;
        }
        Ok(())
    }

    /// Move the read cursor to an absolute file offset.
    ///
    /// A target inside the buffered region just advances the cursor and no
    /// block is re-fetched; anything outside drops the buffer. The producer
    /// is always re-aligned: to the seek target when the buffer was dropped,
    /// to the buffered end otherwise, so the next pull continues where the
    /// buffer stops.
    pub fn seek(&mut self, position: u64) {
        let remaining = (self.buffer.len() - self.buffer_pos) as u64;
        let buffered_end = self.current_position + remaining;

        if position < self.current_position || position > buffered_end {
            self.buffer.clear();
            self.buffer_pos = 0;
            self.producer.seek(position);
        } else {
            self.buffer_pos += (position - self.current_position) as usize;
            self.producer.seek(buffered_end);
        }

        self.stream_closed = false;
        self.current_position = position;
    }
}
