//! Decoded media samples as stored in a sample buffer.

use bytes::Bytes;

/// A single media sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Presentation time in microseconds.
    pub time_us: u64,
    /// Whether decoding can start at this sample.
    pub is_keyframe: bool,
    /// Whether the payload needs decrypting before decode.
    pub is_encrypted: bool,
    pub data: Bytes,
}

impl Sample {
    /// Create a non-keyframe, unencrypted sample.
    pub fn new(time_us: u64, data: impl Into<Bytes>) -> Self {
        Self {
            time_us,
            is_keyframe: false,
            is_encrypted: false,
            data: data.into(),
        }
    }

    /// Create a keyframe sample.
    pub fn keyframe(time_us: u64, data: impl Into<Bytes>) -> Self {
        Self {
            is_keyframe: true,
            ..Self::new(time_us, data)
        }
    }

    /// Mark the sample as encrypted.
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.is_encrypted = encrypted;
        self
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
