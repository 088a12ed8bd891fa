//! Transport seam: fetching the bytes behind a [`DataSpec`].

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::chunk::DataSpec;
use crate::error::{Error, Result};

/// Async byte-range fetcher.
///
/// Implementations own retries and timeouts; a returned error is final for
/// the chunk being loaded.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short identifier for logs (e.g. `"file"`).
    fn name(&self) -> &'static str;

    /// Fetch the bytes described by `spec`.
    async fn open(&self, spec: &DataSpec) -> Result<Bytes>;
}

fn slice_range(uri: &str, data: &Bytes, spec: &DataSpec) -> Result<Bytes> {
    let len = data.len() as u64;
    let start = spec.position;
    let end = match spec.length {
        Some(length) => start.saturating_add(length),
        None => len,
    };
    if start > len || end > len {
        return Err(Error::load(
            uri,
            format!("range {start}..{end} exceeds resource length {len}"),
        ));
    }
    Ok(data.slice(start as usize..end as usize))
}

/// In-memory resources keyed by URI.
#[derive(Debug, Default)]
pub struct MemoryDataSource {
    resources: RwLock<HashMap<String, Bytes>>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a resource.
    pub fn insert(&self, uri: impl Into<String>, data: impl Into<Bytes>) {
        self.resources.write().insert(uri.into(), data.into());
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, spec: &DataSpec) -> Result<Bytes> {
        let data = self
            .resources
            .read()
            .get(&spec.uri)
            .cloned()
            .ok_or_else(|| Error::load(&spec.uri, "no such resource"))?;
        slice_range(&spec.uri, &data, spec)
    }
}

/// Files under a root directory, addressed by relative URI.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    root: PathBuf,
}

impl FileDataSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `uri` under the root, refusing to escape it.
    fn resolve(&self, uri: &str) -> Result<PathBuf> {
        let relative = Path::new(uri);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::load(uri, "path must be relative to the source root"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn open(&self, spec: &DataSpec) -> Result<Bytes> {
        let path = self.resolve(&spec.uri)?;
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| Error::load(&spec.uri, e.to_string()))?;
        let file_len = file.metadata().await?.len();

        let end = match spec.length {
            Some(length) => spec.position.saturating_add(length),
            None => file_len,
        };
        if spec.position > file_len || end > file_len {
            return Err(Error::load(
                &spec.uri,
                format!(
                    "range {}..{end} exceeds file length {file_len}",
                    spec.position
                ),
            ));
        }

        file.seek(SeekFrom::Start(spec.position)).await?;
        let mut data = vec![0u8; (end - spec.position) as usize];
        file.read_exact(&mut data).await?;

        tracing::trace!(uri = %spec.uri, bytes = data.len(), "read file range");
        Ok(Bytes::from(data))
    }
}
