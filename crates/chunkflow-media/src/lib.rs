//! Chunkflow-Media: chunk loading into rolling sample buffers
//!
//! This crate implements the handoff between independently loaded media
//! chunks and the shared sample buffer a renderer consumes from.
//!
//! # Modules
//!
//! - `buffer` - Rolling sample buffer with stable absolute indices and a
//!   single-writer claim
//! - `chunk` - Chunk descriptors, the unbound/bound chunk phases, and loading
//! - `drm` - DRM initialization data attached to chunks
//! - `extractor` - Seam for turning fetched bytes into samples
//! - `upstream` - Seam for fetching bytes (memory and file sources)
//! - `source` - Control-side sequencing of chunk loads against one buffer
//!
//! # Handoff
//!
//! 1. A chunk is built from a [`ChunkDescriptor`] as an [`UnboundChunk`]
//! 2. Binding it to a buffer claims the buffer's writer and records the
//!    write index as the chunk's first sample index
//! 3. Loading fetches, extracts, and appends samples, then releases the claim
//! 4. The next chunk binds; its first sample index marks the end of the
//!    previous chunk's range
//!
//! ```
//! use std::sync::Arc;
//! use chunkflow_common::SelectionTrigger;
//! use chunkflow_media::{
//!     ChunkDescriptor, ChunkKind, DataSpec, DrmPolicy, FixedSizeExtractor, Format,
//!     MemoryDataSource, SampleBufferHandle, UnboundChunk,
//! };
//!
//! let buffer = SampleBufferHandle::new();
//! let descriptor = ChunkDescriptor::new(
//!     DataSpec::new("seg0.m4s"),
//!     SelectionTrigger::Initial,
//!     Format::new("v0", "video/mp4", 800_000),
//!     0,
//!     2_000_000,
//!     0,
//! )
//! .unwrap();
//! let kind = ChunkKind::container(FixedSizeExtractor::new(188), DrmPolicy::Declared(None));
//!
//! let chunk = UnboundChunk::new(Arc::new(MemoryDataSource::new()), descriptor, kind)
//!     .bind(&buffer)
//!     .unwrap();
//! assert_eq!(chunk.first_sample_index(), 0);
//! ```

pub mod buffer;
pub mod chunk;
pub mod drm;
pub mod error;
pub mod extractor;
pub mod format;
pub mod sample;
pub mod source;
pub mod upstream;

pub use buffer::{RollingSampleBuffer, SampleBufferHandle, WeakBufferRef, WriterToken};
pub use chunk::{
    load, BoundChunk, ChunkDescriptor, ChunkKind, DataSpec, DrmPolicy, LoadOutcome, LoadStatus,
    MediaChunk, UnboundChunk,
};
pub use drm::{DrmInitData, DrmState, SchemeInitData};
pub use error::{Error, Result};
pub use extractor::{Extractor, ExtractorFactory, ExtractorOutput, FixedSizeExtractor};
pub use format::Format;
pub use sample::Sample;
pub use source::{ChunkSampleSource, ReadSample, SourceConfig};
pub use upstream::{DataSource, FileDataSource, MemoryDataSource};
