//! Rolling sample buffer.
//!
//! The buffer stores samples at absolute, monotonically increasing positions.
//! Positions are never reused: trimming the head drops samples but keeps
//! every later index stable, which is what lets a chunk remember where its
//! output starts.
//!
//! Writes are single-writer. A chunk claims the buffer when it is bound and
//! holds a [`WriterToken`] until its load ends; any other claim attempt in
//! that window fails instead of interleaving samples.

mod handle;

pub use handle::{SampleBufferHandle, SampleWriter, WeakBufferRef};

use std::collections::VecDeque;

use chunkflow_common::BufferId;

use crate::error::{Error, Result};
use crate::sample::Sample;

/// Proof of the exclusive right to append to one buffer.
///
/// Tokens are not `Clone`; each claim produces exactly one.
#[derive(Debug)]
pub struct WriterToken {
    buffer: BufferId,
    chunk_index: u32,
    generation: u64,
}

impl WriterToken {
    /// Chunk that owns the claim.
    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }
}

#[derive(Debug, Clone, Copy)]
struct WriterClaim {
    chunk_index: u32,
    generation: u64,
}

/// Append-only, position-addressable sample store with head trimming.
#[derive(Debug)]
pub struct RollingSampleBuffer {
    id: BufferId,
    samples: VecDeque<Sample>,
    /// Absolute index of `samples[0]`.
    head_index: u64,
    read_index: u64,
    closed: bool,
    writer: Option<WriterClaim>,
    next_generation: u64,
}

impl RollingSampleBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            id: BufferId::new(),
            samples: VecDeque::new(),
            head_index: 0,
            read_index: 0,
            closed: false,
            writer: None,
            next_generation: 0,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Index the next appended sample will receive.
    pub fn write_index(&self) -> u64 {
        self.head_index + self.samples.len() as u64
    }

    /// Index of the next sample to be read.
    pub fn read_index(&self) -> u64 {
        self.read_index
    }

    /// Index of the oldest retained sample.
    pub fn head_index(&self) -> u64 {
        self.head_index
    }

    /// Number of retained samples, read or not.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples written but not yet read.
    pub fn unread(&self) -> u64 {
        self.write_index() - self.read_index
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Chunk currently holding the writer claim.
    pub fn active_writer(&self) -> Option<u32> {
        self.writer.map(|w| w.chunk_index)
    }

    /// Retained sample at an absolute index.
    pub fn get(&self, index: u64) -> Option<&Sample> {
        let offset = index.checked_sub(self.head_index)?;
        self.samples.get(offset as usize)
    }

    /// Take the writer claim for `chunk_index`.
    ///
    /// Returns the token together with the write index at the moment of the
    /// claim, read under the same borrow so no append can slip in between.
    pub fn claim_writer(&mut self, chunk_index: u32) -> Result<(WriterToken, u64)> {
        if self.closed {
            return Err(Error::BufferClosed);
        }
        if let Some(active) = self.writer {
            return Err(Error::WriterBusy {
                active_chunk: active.chunk_index,
            });
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.writer = Some(WriterClaim {
            chunk_index,
            generation,
        });

        let token = WriterToken {
            buffer: self.id,
            chunk_index,
            generation,
        };
        Ok((token, self.write_index()))
    }

    /// Give up a writer claim. Stale tokens are ignored.
    pub fn release_writer(&mut self, token: &WriterToken) {
        if self.owns(token) {
            self.writer = None;
        }
    }

    /// Append a sample, returning its absolute index.
    pub fn append(&mut self, token: &WriterToken, sample: Sample) -> Result<u64> {
        if self.closed {
            return Err(Error::BufferClosed);
        }
        if !self.owns(token) {
            return Err(Error::StaleWriter {
                chunk_index: token.chunk_index,
            });
        }
        let index = self.write_index();
        self.samples.push_back(sample);
        Ok(index)
    }

    fn owns(&self, token: &WriterToken) -> bool {
        token.buffer == self.id
            && self
                .writer
                .is_some_and(|w| w.generation == token.generation)
    }

    /// Next unread sample, without consuming it.
    pub fn peek(&self) -> Option<&Sample> {
        self.get(self.read_index)
    }

    /// Consume the next unread sample, returning it with its index.
    pub fn read(&mut self) -> Option<(u64, Sample)> {
        let index = self.read_index;
        let sample = self.get(index)?.clone();
        self.read_index += 1;
        Some((index, sample))
    }

    /// Drop consumed samples below `upto`.
    ///
    /// The trim point is clamped to the read index, so unread samples are
    /// never lost. Returns the number of samples dropped.
    pub fn trim(&mut self, upto: u64) -> usize {
        let target = upto.min(self.read_index);
        let mut dropped = 0;
        while self.head_index < target && self.samples.pop_front().is_some() {
            self.head_index += 1;
            dropped += 1;
        }
        if dropped > 0 {
            tracing::trace!(buffer = %self.id, dropped, head = self.head_index, "trimmed");
        }
        dropped
    }

    /// Discard every sample at or after `index`.
    ///
    /// Used when chunks that were loaded ahead are abandoned after a seek or
    /// format switch. Only unread samples may be discarded, and not while a
    /// chunk is mid-write.
    pub fn discard_upstream(&mut self, index: u64) -> Result<usize> {
        if let Some(active) = self.writer {
            return Err(Error::WriterBusy {
                active_chunk: active.chunk_index,
            });
        }
        let write = self.write_index();
        if index < self.read_index.max(self.head_index) || index > write {
            return Err(Error::IndexOutOfRange {
                index,
                head: self.head_index,
                write,
            });
        }
        let keep = (index - self.head_index) as usize;
        let dropped = self.samples.len() - keep;
        self.samples.truncate(keep);
        tracing::debug!(buffer = %self.id, index, dropped, "discarded upstream samples");
        Ok(dropped)
    }

    /// Refuse further claims and writes. Already written samples stay
    /// readable.
    pub fn close(&mut self) {
        self.closed = true;
        self.writer = None;
    }
}

impl Default for RollingSampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bytes::Bytes;

    fn fill(buffer: &mut RollingSampleBuffer, chunk: u32, count: u64) {
        let (token, _) = buffer.claim_writer(chunk).unwrap();
        for i in 0..count {
            buffer.append(&token, Sample::new(i, vec![i as u8])).unwrap();
        }
        buffer.release_writer(&token);
    }

    #[test]
    fn test_write_index_advances() {
        let mut buffer = RollingSampleBuffer::new();
        assert_eq!(buffer.write_index(), 0);
        fill(&mut buffer, 0, 5);
        assert_eq!(buffer.write_index(), 5);
        assert_eq!(buffer.unread(), 5);
    }

    #[test]
    fn test_claim_returns_write_index() {
        let mut buffer = RollingSampleBuffer::new();
        fill(&mut buffer, 0, 3);
        let (token, index) = buffer.claim_writer(1).unwrap();
        assert_eq!(index, 3);
        assert_eq!(token.chunk_index(), 1);
        assert_eq!(buffer.active_writer(), Some(1));
    }

    #[test]
    fn test_second_claim_is_rejected() {
        let mut buffer = RollingSampleBuffer::new();
        let (_token, _) = buffer.claim_writer(4).unwrap();
        assert_matches!(
            buffer.claim_writer(5),
            Err(Error::WriterBusy { active_chunk: 4 })
        );
    }

    #[test]
    fn test_stale_token_cannot_append() {
        let mut buffer = RollingSampleBuffer::new();
        let (old, _) = buffer.claim_writer(0).unwrap();
        buffer.release_writer(&old);
        let (_new, _) = buffer.claim_writer(1).unwrap();

        assert_matches!(
            buffer.append(&old, Sample::new(0, Bytes::new())),
            Err(Error::StaleWriter { chunk_index: 0 })
        );
        // releasing a stale token leaves the live claim alone
        buffer.release_writer(&old);
        assert_eq!(buffer.active_writer(), Some(1));
    }

    #[test]
    fn test_token_from_other_buffer_is_stale() {
        let mut a = RollingSampleBuffer::new();
        let mut b = RollingSampleBuffer::new();
        let (token_a, _) = a.claim_writer(0).unwrap();
        let (_token_b, _) = b.claim_writer(0).unwrap();
        assert_matches!(
            b.append(&token_a, Sample::new(0, Bytes::new())),
            Err(Error::StaleWriter { .. })
        );
    }

    #[test]
    fn test_trim_keeps_indices_stable() {
        let mut buffer = RollingSampleBuffer::new();
        fill(&mut buffer, 0, 6);
        for _ in 0..4 {
            buffer.read().unwrap();
        }
        assert_eq!(buffer.trim(3), 3);
        assert_eq!(buffer.head_index(), 3);
        assert_eq!(buffer.write_index(), 6);
        assert_eq!(buffer.get(3).unwrap().time_us, 3);
        assert!(buffer.get(2).is_none());
    }

    #[test]
    fn test_trim_never_drops_unread() {
        let mut buffer = RollingSampleBuffer::new();
        fill(&mut buffer, 0, 6);
        buffer.read().unwrap();
        assert_eq!(buffer.trim(100), 1);
        assert_eq!(buffer.head_index(), 1);
        assert_eq!(buffer.peek().unwrap().time_us, 1);
    }

    #[test]
    fn test_discard_upstream() {
        let mut buffer = RollingSampleBuffer::new();
        fill(&mut buffer, 0, 10);
        buffer.read().unwrap();

        assert_eq!(buffer.discard_upstream(4).unwrap(), 6);
        assert_eq!(buffer.write_index(), 4);
        assert_matches!(
            buffer.discard_upstream(0),
            Err(Error::IndexOutOfRange { index: 0, .. })
        );
        assert_matches!(
            buffer.discard_upstream(5),
            Err(Error::IndexOutOfRange { .. })
        );
    }

    #[test]
    fn test_discard_rejected_while_writing() {
        let mut buffer = RollingSampleBuffer::new();
        let (_token, _) = buffer.claim_writer(2).unwrap();
        assert_matches!(
            buffer.discard_upstream(0),
            Err(Error::WriterBusy { active_chunk: 2 })
        );
    }

    #[test]
    fn test_close_blocks_claims_and_writes() {
        let mut buffer = RollingSampleBuffer::new();
        let (token, _) = buffer.claim_writer(0).unwrap();
        buffer.append(&token, Sample::new(0, vec![1u8])).unwrap();
        buffer.close();

        assert_matches!(buffer.append(&token, Sample::new(1, Bytes::new())), Err(Error::BufferClosed));
        assert_matches!(buffer.claim_writer(1), Err(Error::BufferClosed));
        assert!(buffer.read().is_some());
    }
}
