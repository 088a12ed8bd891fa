//! Error types for chunkflow-media.

use std::io;
use thiserror::Error;

/// Result type for chunkflow-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for chunkflow-media operations.
///
/// Variants fall into two groups. Ordering faults (see
/// [`Error::is_ordering_fault`]) mean the caller sequenced bind, load, and
/// query calls incorrectly; they are programming errors and are never
/// retried. Everything else is an environmental failure of a load.
#[derive(Debug, Error)]
pub enum Error {
    /// Chunk was queried before being bound to a buffer.
    #[error("chunk {chunk_index} is not bound to a sample buffer")]
    NotBound { chunk_index: u32 },

    /// Chunk was bound a second time.
    #[error("chunk {chunk_index} is already bound at sample index {first_sample_index}")]
    AlreadyBound {
        chunk_index: u32,
        first_sample_index: u64,
    },

    /// Another chunk holds the buffer's writer claim.
    #[error("sample buffer is being written by chunk {active_chunk}")]
    WriterBusy { active_chunk: u32 },

    /// Writer token no longer matches the buffer's active claim.
    #[error("stale writer token for chunk {chunk_index}")]
    StaleWriter { chunk_index: u32 },

    /// Chunk indices must strictly increase within a stream.
    #[error("chunk index {index} does not follow {previous}")]
    OutOfOrder { index: u32, previous: u32 },

    /// Chunk load was started more than once.
    #[error("chunk {chunk_index} has already been loaded")]
    AlreadyLoaded { chunk_index: u32 },

    /// Sample buffer was closed or dropped.
    #[error("sample buffer is closed")]
    BufferClosed,

    /// A buffer position outside the retained window was requested.
    #[error("sample index {index} outside buffer window [{head}, {write}]")]
    IndexOutOfRange { index: u64, head: u64, write: u64 },

    /// Transport failed to deliver bytes.
    #[error("load failed for {uri}: {message}")]
    Load { uri: String, message: String },

    /// Extractor could not turn bytes into samples.
    #[error("extract failed: {0}")]
    Extract(String),

    /// Load task panicked or was aborted.
    #[error("load task failed: {0}")]
    Task(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Descriptor validation failed.
    #[error(transparent)]
    Common(#[from] chunkflow_common::Error),
}

impl Error {
    /// Create a load error.
    pub fn load(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create an extract error.
    pub fn extract(msg: impl Into<String>) -> Self {
        Self::Extract(msg.into())
    }

    /// Whether this error reports a caller ordering bug rather than an
    /// environmental failure.
    pub fn is_ordering_fault(&self) -> bool {
        matches!(
            self,
            Self::NotBound { .. }
                | Self::AlreadyBound { .. }
                | Self::WriterBusy { .. }
                | Self::StaleWriter { .. }
                | Self::OutOfOrder { .. }
                | Self::AlreadyLoaded { .. }
        )
    }
}
