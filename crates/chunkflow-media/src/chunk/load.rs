//! Loading a bound chunk into its sample buffer.

use tokio_util::sync::CancellationToken;

use super::{BoundChunk, ChunkKind};
use crate::buffer::SampleWriter;
use crate::drm::DrmState;
use crate::error::Result;
use crate::sample::Sample;

/// Progress of a chunk's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Completed,
    Cancelled,
    Failed,
}

/// How a load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed { samples: u64 },
    Cancelled { samples: u64 },
}

impl LoadOutcome {
    /// Samples appended before the load ended.
    pub fn samples(&self) -> u64 {
        match self {
            Self::Completed { samples } | Self::Cancelled { samples } => *samples,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Fetch, extract, and append a chunk's samples.
///
/// Consumes the chunk's writer, so a chunk loads at most once; a second call
/// fails with [`Error::AlreadyLoaded`](crate::Error::AlreadyLoaded). The
/// writer claim is released however the load ends. Samples appended before
/// a cancellation or failure stay in the buffer, and the write index is never
/// rewound.
pub async fn load(chunk: &BoundChunk, cancel: &CancellationToken) -> Result<LoadOutcome> {
    let writer = chunk.take_writer()?;
    chunk.set_status(LoadStatus::Loading);

    let result = run(chunk, &writer, cancel).await;
    writer.finish();

    let chunk_index = chunk.chunk_index();
    match &result {
        Ok(LoadOutcome::Completed { samples }) => {
            chunk.set_status(LoadStatus::Completed);
            tracing::debug!(chunk_index, samples, "chunk load completed");
        }
        Ok(LoadOutcome::Cancelled { samples }) => {
            chunk.set_status(LoadStatus::Cancelled);
            tracing::debug!(chunk_index, samples, "chunk load cancelled");
        }
        Err(e) => {
            chunk.set_status(LoadStatus::Failed);
            tracing::warn!(chunk_index, error = %e, "chunk load failed");
        }
    }
    result
}

async fn run(
    chunk: &BoundChunk,
    writer: &SampleWriter,
    cancel: &CancellationToken,
) -> Result<LoadOutcome> {
    // Fail before touching the network if the buffer is already gone.
    chunk.bound_buffer().upgrade()?;

    let data = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(LoadOutcome::Cancelled { samples: 0 }),
        data = chunk.data_source().open(chunk.data_spec()) => data?,
    };

    let samples = match chunk.kind() {
        ChunkKind::SingleSample { .. } => {
            vec![Sample::keyframe(chunk.start_time_us(), data)]
        }
        ChunkKind::Container { extractor, .. } => {
            let output = extractor.create().extract(chunk.descriptor(), data)?;
            chunk.apply_stream_metadata(output.format, output.drm_init_data);
            output.samples
        }
    };

    // Key material applies to every sample the chunk contributes.
    let encrypted = matches!(chunk.drm_init_data(), DrmState::Known(_));

    let mut written = 0;
    for sample in samples {
        if cancel.is_cancelled() {
            return Ok(LoadOutcome::Cancelled { samples: written });
        }
        let sample = if encrypted {
            sample.encrypted(true)
        } else {
            sample
        };
        writer.append(sample)?;
        chunk.record_sample();
        written += 1;
    }

    chunk.finalize_drm();
    Ok(LoadOutcome::Completed { samples: written })
}
