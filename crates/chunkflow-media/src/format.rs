//! Stream format descriptors.

/// Format of the samples in one stream variant.
///
/// Fields that do not apply to a track type stay `None` (an audio format has
/// no dimensions, a video format has no sample rate).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct Format {
    /// Variant identifier, unique within a stream.
    pub id: String,
    /// MIME type of the container or elementary stream.
    pub mime_type: String,
    /// RFC 6381 codec string, if known.
    pub codecs: Option<String>,
    /// Average bitrate in bits per second.
    pub bitrate: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    /// BCP 47 language tag.
    pub language: Option<String>,
}

impl Format {
    /// Create a format with only an id, MIME type, and bitrate set.
    pub fn new(id: impl Into<String>, mime_type: impl Into<String>, bitrate: u32) -> Self {
        Self {
            id: id.into(),
            mime_type: mime_type.into(),
            bitrate,
            ..Default::default()
        }
    }

    /// Create a video format.
    pub fn video(
        id: impl Into<String>,
        mime_type: impl Into<String>,
        bitrate: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::new(id, mime_type, bitrate)
        }
    }

    /// Create an audio format.
    pub fn audio(
        id: impl Into<String>,
        mime_type: impl Into<String>,
        bitrate: u32,
        channels: u32,
        sample_rate: u32,
    ) -> Self {
        Self {
            channels: Some(channels),
            sample_rate: Some(sample_rate),
            ..Self::new(id, mime_type, bitrate)
        }
    }

    /// Set the codec string.
    pub fn with_codecs(mut self, codecs: impl Into<String>) -> Self {
        self.codecs = Some(codecs.into());
        self
    }

    /// Set the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Whether this is a video format.
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/") || self.width.is_some()
    }

    /// Whether this is an audio format.
    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/") || self.sample_rate.is_some()
    }
}
