//! Chunks: independently loadable segments of a media stream.
//!
//! A chunk starts life as an [`UnboundChunk`] carrying an immutable
//! [`ChunkDescriptor`]. Binding it to a sample buffer produces a
//! [`BoundChunk`] that knows the buffer position where its samples begin.
//! [`load`] then fetches, extracts, and appends the samples.

mod load;
mod media;

pub use load::{load, LoadOutcome, LoadStatus};
pub use media::{BoundChunk, ChunkKind, DrmPolicy, MediaChunk, UnboundChunk};

use chunkflow_common::{SelectionTrigger, TimeRange};

use crate::error::Result;
use crate::format::Format;

/// Location of a retrievable byte range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSpec {
    pub uri: String,
    /// Byte offset of the range within the resource.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub position: u64,
    /// Range length, or `None` to read to the end.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub length: Option<u64>,
    /// Cache key overriding the URI.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub key: Option<String>,
}

impl DataSpec {
    /// Spec for a whole resource.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            position: 0,
            length: None,
            key: None,
        }
    }

    /// Spec for `length` bytes starting at `position`.
    pub fn range(uri: impl Into<String>, position: u64, length: u64) -> Self {
        Self {
            position,
            length: Some(length),
            ..Self::new(uri)
        }
    }

    /// Key to use for caching.
    pub fn cache_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.uri)
    }
}

/// Immutable metadata for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDescriptor {
    data_spec: DataSpec,
    trigger: SelectionTrigger,
    format: Format,
    time_range: TimeRange,
    chunk_index: u32,
}

impl ChunkDescriptor {
    /// Create a descriptor, rejecting an end time before the start time.
    pub fn new(
        data_spec: DataSpec,
        trigger: SelectionTrigger,
        format: Format,
        start_time_us: u64,
        end_time_us: u64,
        chunk_index: u32,
    ) -> Result<Self> {
        let time_range = TimeRange::new(start_time_us, end_time_us)?;
        Ok(Self {
            data_spec,
            trigger,
            format,
            time_range,
            chunk_index,
        })
    }

    pub fn data_spec(&self) -> &DataSpec {
        &self.data_spec
    }

    pub fn trigger(&self) -> SelectionTrigger {
        self.trigger
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn start_time_us(&self) -> u64 {
        self.time_range.start_us()
    }

    pub fn end_time_us(&self) -> u64 {
        self.time_range.end_us()
    }

    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use assert_matches::assert_matches;

    #[test]
    fn test_descriptor_rejects_inverted_range() {
        let err = ChunkDescriptor::new(
            DataSpec::new("seg.ts"),
            SelectionTrigger::Initial,
            Format::default(),
            2_000,
            1_000,
            0,
        );
        assert_matches!(err, Err(Error::Common(_)));
    }

    #[test]
    fn test_descriptor_accessors() {
        let desc = ChunkDescriptor::new(
            DataSpec::range("seg.ts", 188, 1880),
            SelectionTrigger::Adaptive,
            Format::new("hi", "video/mp2t", 4_000_000),
            0,
            2_000_000,
            7,
        )
        .unwrap();
        assert_eq!(desc.chunk_index(), 7);
        assert_eq!(desc.trigger(), SelectionTrigger::Adaptive);
        assert_eq!(desc.time_range().duration_us(), 2_000_000);
        assert_eq!(desc.data_spec().length, Some(1880));
        assert_eq!(desc.format().id, "hi");
    }

    #[test]
    fn test_cache_key_defaults_to_uri() {
        let mut spec = DataSpec::new("a/b.m4s");
        assert_eq!(spec.cache_key(), "a/b.m4s");
        spec.key = Some("b".into());
        assert_eq!(spec.cache_key(), "b");
    }
}
