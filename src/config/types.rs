use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferConfig {
    /// Trim consumed samples and drop finished chunks after reading
    #[serde(default = "default_evict_consumed")]
    pub evict_consumed: bool,
}

fn default_evict_consumed() -> bool {
    true
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            evict_consumed: default_evict_consumed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// Bytes per sample for container chunks (default: one TS packet)
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Mark every Nth sample of a container chunk as a keyframe
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: usize,
}

fn default_sample_size() -> usize {
    188
}

fn default_keyframe_interval() -> usize {
    1
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            keyframe_interval: default_keyframe_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Print reports as JSON instead of a table
    #[serde(default)]
    pub json: bool,
}
