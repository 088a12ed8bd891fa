//! Turning fetched bytes into samples.
//!
//! Container parsing proper lives outside this crate; implementations plug in
//! through [`ExtractorFactory`]. A fresh [`Extractor`] is created per chunk
//! load, so extractors may keep per-chunk state.

use std::fmt;

use bytes::Bytes;

use crate::chunk::ChunkDescriptor;
use crate::drm::DrmInitData;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::sample::Sample;

/// Everything an extractor found in one chunk's payload.
#[derive(Debug, Clone, Default)]
pub struct ExtractorOutput {
    /// Sample format, if the stream declares one.
    pub format: Option<Format>,
    /// Key material carried in the stream (e.g. `pssh` boxes).
    pub drm_init_data: Option<DrmInitData>,
    /// Samples in decode order.
    pub samples: Vec<Sample>,
}

/// Parses one chunk's bytes.
pub trait Extractor: Send {
    fn extract(&mut self, descriptor: &ChunkDescriptor, data: Bytes) -> Result<ExtractorOutput>;
}

/// Creates an [`Extractor`] for each chunk load.
pub trait ExtractorFactory: Send + Sync + fmt::Debug {
    fn create(&self) -> Box<dyn Extractor>;
}

/// Splits a payload into fixed-size samples spread evenly over the chunk's
/// time range.
///
/// Stands in for a real demuxer when the byte layout is known to be uniform
/// (raw PCM frames, CBR transport packets) and in tests.
#[derive(Debug, Clone)]
pub struct FixedSizeExtractor {
    sample_size: usize,
    keyframe_interval: usize,
    drm: Option<DrmInitData>,
}

impl FixedSizeExtractor {
    /// Extractor producing `sample_size`-byte samples, each a keyframe.
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size,
            keyframe_interval: 1,
            drm: None,
        }
    }

    /// Mark only every `interval`-th sample as a keyframe.
    pub fn with_keyframe_interval(mut self, interval: usize) -> Self {
        self.keyframe_interval = interval.max(1);
        self
    }

    /// Report `drm` as in-stream key material and mark samples encrypted.
    pub fn with_drm(mut self, drm: DrmInitData) -> Self {
        self.drm = Some(drm);
        self
    }
}

impl Extractor for FixedSizeExtractor {
    fn extract(&mut self, descriptor: &ChunkDescriptor, data: Bytes) -> Result<ExtractorOutput> {
        if self.sample_size == 0 {
            return Err(Error::extract("sample size must be non-zero"));
        }

        let count = data.len().div_ceil(self.sample_size);
        let start = descriptor.start_time_us();
        let duration = descriptor.time_range().duration_us();
        let encrypted = self.drm.is_some();

        let samples = (0..count)
            .map(|i| {
                let from = i * self.sample_size;
                let to = (from + self.sample_size).min(data.len());
                let offset = u128::from(duration) * i as u128 / count as u128;
                let time_us = start + offset as u64;
                Sample {
                    time_us,
                    is_keyframe: i % self.keyframe_interval == 0,
                    is_encrypted: encrypted,
                    data: data.slice(from..to),
                }
            })
            .collect();

        Ok(ExtractorOutput {
            format: None,
            drm_init_data: self.drm.clone(),
            samples,
        })
    }
}

impl ExtractorFactory for FixedSizeExtractor {
    fn create(&self) -> Box<dyn Extractor> {
        Box::new(self.clone())
    }
}
