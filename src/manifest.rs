//! Chunk manifests: the list of chunks a simulation loads, in order.
//!
//! A manifest is a JSON document describing each chunk's byte range, time
//! range, format, and key material, as a selection layer would have chosen
//! them:
//!
//! ```json
//! {
//!   "chunks": [
//!     {
//!       "index": 0,
//!       "uri": "seg0.ts",
//!       "start_us": 0,
//!       "end_us": 2000000,
//!       "trigger": "initial",
//!       "format": { "id": "720p", "mime_type": "video/mp2t", "bitrate": 2000000 },
//!       "drm": { "policy": "in_stream" }
//!     }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use chunkflow_common::SelectionTrigger;
use chunkflow_media::{
    ChunkDescriptor, ChunkKind, DataSpec, DrmInitData, DrmPolicy, FixedSizeExtractor, Format,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::LoaderConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Directory segment URIs are resolved against, relative to the
    /// manifest file. Defaults to the manifest's own directory.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    pub chunks: Vec<ManifestChunk>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestChunk {
    pub index: u32,

    #[serde(flatten)]
    pub source: DataSpec,

    pub start_us: u64,

    pub end_us: u64,

    #[serde(default)]
    pub trigger: SelectionTrigger,

    #[serde(default)]
    pub format: Format,

    #[serde(default)]
    pub kind: ManifestChunkKind,

    #[serde(default)]
    pub drm: ManifestDrm,

    /// Abandon the chunk right after binding, before any bytes load
    #[serde(default)]
    pub cancel: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestChunkKind {
    #[default]
    Container,
    SingleSample,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ManifestDrm {
    /// Clear content
    #[default]
    None,
    /// Key material known from the manifest
    Declared { init_data: DrmInitData },
    /// Key material carried in the segment, surfaced by the extractor
    InStream {
        #[serde(default)]
        init_data: Option<DrmInitData>,
    },
}

impl Manifest {
    /// Load a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("Invalid manifest: {:?}", path))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.chunks.is_empty() {
            anyhow::bail!("manifest lists no chunks");
        }
        for pair in self.chunks.windows(2) {
            if pair[1].index <= pair[0].index {
                anyhow::bail!(
                    "chunk indices must increase: {} follows {}",
                    pair[1].index,
                    pair[0].index
                );
            }
        }
        Ok(())
    }

    /// Directory segment URIs resolve against
    pub fn media_root(&self, manifest_path: &Path) -> PathBuf {
        let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        match &self.base_dir {
            Some(base) => dir.join(base),
            None => dir.to_path_buf(),
        }
    }
}

impl ManifestChunk {
    pub fn descriptor(&self) -> Result<ChunkDescriptor> {
        ChunkDescriptor::new(
            self.source.clone(),
            self.trigger,
            self.format.clone(),
            self.start_us,
            self.end_us,
            self.index,
        )
        .with_context(|| format!("chunk {}", self.index))
    }

    /// Chunk kind, with container chunks split per the loader config
    pub fn kind(&self, loader: &LoaderConfig) -> ChunkKind {
        match self.kind {
            ManifestChunkKind::SingleSample => ChunkKind::SingleSample {
                sample_format: self.format.clone(),
                drm: match &self.drm {
                    ManifestDrm::Declared { init_data } => Some(init_data.clone()),
                    ManifestDrm::InStream { init_data } => init_data.clone(),
                    ManifestDrm::None => None,
                },
            },
            ManifestChunkKind::Container => {
                let mut extractor = FixedSizeExtractor::new(loader.sample_size)
                    .with_keyframe_interval(loader.keyframe_interval);
                let policy = match &self.drm {
                    ManifestDrm::None => DrmPolicy::Declared(None),
                    ManifestDrm::Declared { init_data } => {
                        DrmPolicy::Declared(Some(init_data.clone()))
                    }
                    ManifestDrm::InStream { init_data } => {
                        if let Some(data) = init_data {
                            extractor = extractor.with_drm(data.clone());
                        }
                        DrmPolicy::InStream
                    }
                };
                ChunkKind::container(extractor, policy)
            }
        }
    }
}
