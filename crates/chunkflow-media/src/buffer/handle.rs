//! Shared and non-owning handles to a [`RollingSampleBuffer`].

use std::sync::{Arc, Weak};

use chunkflow_common::BufferId;
use parking_lot::{Mutex, MutexGuard};

use super::{RollingSampleBuffer, WriterToken};
use crate::error::{Error, Result};
use crate::sample::Sample;

/// Owning handle to a sample buffer.
///
/// Held by whoever controls the buffer's lifetime (normally the chunk
/// source). Chunks only ever see a [`WeakBufferRef`].
#[derive(Debug, Clone)]
pub struct SampleBufferHandle {
    id: BufferId,
    inner: Arc<Mutex<RollingSampleBuffer>>,
}

impl SampleBufferHandle {
    /// Wrap a fresh buffer.
    pub fn new() -> Self {
        Self::from_buffer(RollingSampleBuffer::new())
    }

    pub fn from_buffer(buffer: RollingSampleBuffer) -> Self {
        Self {
            id: buffer.id(),
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Lock the buffer for direct access.
    pub fn lock(&self) -> MutexGuard<'_, RollingSampleBuffer> {
        self.inner.lock()
    }

    pub fn write_index(&self) -> u64 {
        self.inner.lock().write_index()
    }

    pub fn read_index(&self) -> u64 {
        self.inner.lock().read_index()
    }

    /// Create a non-owning reference.
    pub fn downgrade(&self) -> WeakBufferRef {
        WeakBufferRef {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Claim the buffer for `chunk_index`, returning a writer and the write
    /// index at the moment of the claim.
    pub(crate) fn claim(&self, chunk_index: u32) -> Result<(SampleWriter, u64)> {
        let (token, index) = self.inner.lock().claim_writer(chunk_index)?;
        let writer = SampleWriter {
            buffer: self.downgrade(),
            token: Some(token),
        };
        Ok((writer, index))
    }
}

impl Default for SampleBufferHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning reference to a sample buffer.
#[derive(Debug, Clone)]
pub struct WeakBufferRef {
    id: BufferId,
    inner: Weak<Mutex<RollingSampleBuffer>>,
}

impl WeakBufferRef {
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Upgrade to an owning handle, failing once the buffer is gone.
    pub fn upgrade(&self) -> Result<SampleBufferHandle> {
        let inner = self.inner.upgrade().ok_or(Error::BufferClosed)?;
        Ok(SampleBufferHandle { id: self.id, inner })
    }

    /// Whether this refers to the same buffer as `handle`.
    pub fn points_to(&self, handle: &SampleBufferHandle) -> bool {
        self.id == handle.id
    }
}

/// Exclusive appender for one chunk's samples.
///
/// Dropping the writer releases the buffer's writer claim, so a load that
/// errors out or is cancelled never leaves the buffer locked.
#[derive(Debug)]
pub struct SampleWriter {
    buffer: WeakBufferRef,
    token: Option<WriterToken>,
}

impl SampleWriter {
    pub fn chunk_index(&self) -> Option<u32> {
        self.token.as_ref().map(WriterToken::chunk_index)
    }

    /// Append a sample, returning its absolute buffer index.
    pub fn append(&self, sample: Sample) -> Result<u64> {
        let token = self.token.as_ref().ok_or(Error::BufferClosed)?;
        let handle = self.buffer.upgrade()?;
        let mut buffer = handle.lock();
        buffer.append(token, sample)
    }

    /// Release the claim explicitly.
    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(token) = self.token.take() {
            if let Ok(handle) = self.buffer.upgrade() {
                handle.lock().release_writer(&token);
            }
        }
    }
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        self.release();
    }
}
