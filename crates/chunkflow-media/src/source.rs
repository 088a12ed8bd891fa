//! Chunk sample source: sequences chunk loads into one sample buffer.
//!
//! The source runs on the stream's control task. It binds one chunk at a
//! time, in ascending chunk index order, and hands the load to a tokio
//! worker task. Because a bound chunk holds the buffer's writer claim until
//! its load ends, the next chunk can only bind once the previous load has
//! finished or been cancelled.
//!
//! On the consuming side the source maps buffer positions back to the chunk
//! that produced them, so a renderer reading samples also sees the format
//! and key material that apply to each one.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::SampleBufferHandle;
use crate::chunk::{self, BoundChunk, LoadOutcome, UnboundChunk};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::sample::Sample;

/// Source behaviour.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Trim the buffer and drop finished chunks after every read.
    pub evict_consumed: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            evict_consumed: true,
        }
    }
}

/// A sample handed to the renderer together with its chunk.
#[derive(Debug, Clone)]
pub struct ReadSample {
    /// Absolute buffer index of the sample.
    pub index: u64,
    pub sample: Sample,
    /// Chunk that produced the sample.
    pub chunk: Arc<BoundChunk>,
    /// Format in effect for this sample.
    pub format: Format,
    /// Whether `format` differs from the previous sample's.
    pub format_changed: bool,
}

struct PendingLoad {
    chunk: Arc<BoundChunk>,
    cancel: CancellationToken,
    task: JoinHandle<Result<LoadOutcome>>,
}

/// Control-side owner of a sample buffer and the chunks feeding it.
pub struct ChunkSampleSource {
    buffer: SampleBufferHandle,
    config: SourceConfig,
    chunks: VecDeque<Arc<BoundChunk>>,
    pending: Option<PendingLoad>,
    last_chunk_index: Option<u32>,
    last_read_format: Option<Format>,
}

impl ChunkSampleSource {
    /// Create a source with a fresh buffer.
    pub fn new(config: SourceConfig) -> Self {
        Self::with_buffer(SampleBufferHandle::new(), config)
    }

    pub fn with_buffer(buffer: SampleBufferHandle, config: SourceConfig) -> Self {
        Self {
            buffer,
            config,
            chunks: VecDeque::new(),
            pending: None,
            last_chunk_index: None,
            last_read_format: None,
        }
    }

    pub fn buffer(&self) -> &SampleBufferHandle {
        &self.buffer
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Bind `chunk` and start loading it on a worker task.
    ///
    /// Must be called from within a tokio runtime. Fails without binding if a
    /// load is still pending or the chunk index does not follow the last one.
    pub fn load_next(&mut self, chunk: UnboundChunk) -> Result<Arc<BoundChunk>> {
        let bound = self.bind_next(chunk)?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let bound = Arc::clone(&bound);
            let cancel = cancel.clone();
            async move { chunk::load(&bound, &cancel).await }
        });

        tracing::info!(
            chunk_index = bound.chunk_index(),
            first_sample_index = bound.first_sample_index(),
            start_us = bound.start_time_us(),
            end_us = bound.end_time_us(),
            "loading chunk"
        );

        self.pending = Some(PendingLoad {
            chunk: Arc::clone(&bound),
            cancel,
            task,
        });
        Ok(bound)
    }

    /// Bind `chunk` and abandon it without loading.
    ///
    /// The chunk is tracked with an empty sample range, exactly as if its
    /// load had been cancelled before any bytes arrived.
    pub fn skip_next(&mut self, chunk: UnboundChunk) -> Result<Arc<BoundChunk>> {
        let bound = self.bind_next(chunk)?;
        bound.abandon();
        tracing::info!(
            chunk_index = bound.chunk_index(),
            first_sample_index = bound.first_sample_index(),
            "skipped chunk"
        );
        Ok(bound)
    }

    fn bind_next(&mut self, chunk: UnboundChunk) -> Result<Arc<BoundChunk>> {
        if let Some(pending) = &self.pending {
            return Err(Error::WriterBusy {
                active_chunk: pending.chunk.chunk_index(),
            });
        }
        let index = chunk.descriptor().chunk_index();
        if let Some(previous) = self.last_chunk_index {
            if index <= previous {
                return Err(Error::OutOfOrder { index, previous });
            }
        }

        let bound = Arc::new(chunk.bind(&self.buffer)?);
        self.chunks.push_back(Arc::clone(&bound));
        self.last_chunk_index = Some(index);
        Ok(bound)
    }

    /// Wait for the pending load. Returns `None` if nothing is loading.
    pub async fn await_load(&mut self) -> Result<Option<LoadOutcome>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        let outcome = match pending.task.await {
            Ok(result) => result?,
            Err(e) => return Err(Error::Task(e.to_string())),
        };
        Ok(Some(outcome))
    }

    /// Cancel the pending load and wait for it to stop.
    pub async fn cancel_load(&mut self) -> Result<Option<LoadOutcome>> {
        if let Some(pending) = &self.pending {
            tracing::debug!(chunk_index = pending.chunk.chunk_index(), "cancelling load");
            pending.cancel.cancel();
        }
        self.await_load().await
    }

    /// Chunks still tracked, oldest first.
    pub fn chunks(&self) -> impl Iterator<Item = &Arc<BoundChunk>> {
        self.chunks.iter()
    }

    /// Tracked chunk with the given index.
    pub fn chunk(&self, chunk_index: u32) -> Option<&Arc<BoundChunk>> {
        self.chunks.iter().find(|c| c.chunk_index() == chunk_index)
    }

    /// Newest tracked chunk.
    pub fn last_chunk(&self) -> Option<&Arc<BoundChunk>> {
        self.chunks.back()
    }

    /// Buffer positions holding a chunk's samples.
    ///
    /// A chunk's range runs from its first sample index to the next chunk's.
    /// For the newest chunk it ends at the buffer's current write index.
    pub fn sample_range(&self, chunk_index: u32) -> Option<Range<u64>> {
        let pos = self
            .chunks
            .iter()
            .position(|c| c.chunk_index() == chunk_index)?;
        Some(self.range_at(pos))
    }

    fn range_at(&self, pos: usize) -> Range<u64> {
        let start = self.chunks[pos].first_sample_index();
        let end = match self.chunks.get(pos + 1) {
            Some(next) => next.first_sample_index(),
            None => self.buffer.write_index(),
        };
        start..end
    }

    /// Chunk that produced the sample at `index`.
    pub fn chunk_for_sample(&self, index: u64) -> Option<&Arc<BoundChunk>> {
        let pos = self
            .chunks
            .iter()
            .rposition(|c| c.first_sample_index() <= index)?;
        self.range_at(pos)
            .contains(&index)
            .then(|| &self.chunks[pos])
    }

    /// Drop the chunk with index `chunk_index` and every later one, along
    /// with their samples.
    ///
    /// Used after a seek or a format switch abandons chunks that were loaded
    /// ahead. Rejected while a load is pending and when any of the samples
    /// have already been read. Returns the number of chunks dropped.
    pub fn discard_upstream(&mut self, chunk_index: u32) -> Result<usize> {
        if let Some(pending) = &self.pending {
            return Err(Error::WriterBusy {
                active_chunk: pending.chunk.chunk_index(),
            });
        }
        let Some(pos) = self
            .chunks
            .iter()
            .position(|c| c.chunk_index() >= chunk_index)
        else {
            return Ok(0);
        };

        let first = self.chunks[pos].first_sample_index();
        let samples = self.buffer.lock().discard_upstream(first)?;
        let dropped = self.chunks.len() - pos;
        self.chunks.truncate(pos);
        self.last_chunk_index = self.chunks.back().map(|c| c.chunk_index());

        tracing::info!(
            from_chunk = chunk_index,
            chunks = dropped,
            samples,
            "discarded upstream chunks"
        );
        Ok(dropped)
    }

    /// Read the next sample along with its chunk's metadata.
    ///
    /// Returns `None` when no unread sample is buffered.
    pub fn read_sample(&mut self) -> Option<ReadSample> {
        let index = self.buffer.read_index();
        let chunk = Arc::clone(self.chunk_for_sample(index)?);
        let (index, sample) = self.buffer.lock().read()?;

        let format = chunk.sample_format();
        let format_changed = self.last_read_format.as_ref() != Some(&format);
        if format_changed {
            tracing::debug!(
                chunk_index = chunk.chunk_index(),
                format = %format.id,
                "format change"
            );
            self.last_read_format = Some(format.clone());
        }

        if self.config.evict_consumed {
            self.evict_consumed();
        }

        Some(ReadSample {
            index,
            sample,
            chunk,
            format,
            format_changed,
        })
    }

    /// Trim read samples and drop chunks whose samples are all gone.
    ///
    /// The newest chunk is always kept so later binds can still be ordered
    /// against it. Returns the number of chunks dropped.
    pub fn evict_consumed(&mut self) -> usize {
        let head = {
            let mut buffer = self.buffer.lock();
            let read = buffer.read_index();
            buffer.trim(read);
            buffer.head_index()
        };

        let mut dropped = 0;
        while self.chunks.len() > 1 && self.chunks[1].first_sample_index() <= head {
            self.chunks.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(chunks = dropped, head, "evicted consumed chunks");
        }
        dropped
    }

    /// Stop loading and close the buffer.
    ///
    /// Any pending load is cancelled; later binds fail with
    /// [`Error::BufferClosed`]. Samples already buffered can still be read,
    /// and their chunks stay tracked until evicted.
    pub fn release(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
        self.buffer.lock().close();
        tracing::debug!(buffer = %self.buffer.id(), "released sample source");
    }
}

impl std::fmt::Debug for ChunkSampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSampleSource")
            .field("buffer", &self.buffer.id())
            .field("chunks", &self.chunks.len())
            .field("loading", &self.is_loading())
            .field("last_chunk_index", &self.last_chunk_index)
            .finish()
    }
}
