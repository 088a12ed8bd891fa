//! Drive a manifest's chunks through a sample source and report where each
//! chunk's samples landed.

use anyhow::{Context, Result};
use chunkflow_media::{
    ChunkSampleSource, DataSource, DrmState, FileDataSource, LoadStatus, SourceConfig,
    UnboundChunk,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::manifest::Manifest;

/// What happened to one chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub index: u32,
    pub uri: String,
    pub trigger: String,
    pub start_us: u64,
    pub end_us: u64,
    pub first_sample_index: u64,
    /// Buffer range `[start, end)` holding this chunk's samples
    pub sample_range: (u64, u64),
    pub samples: u64,
    pub status: String,
    pub drm: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub chunks: Vec<ChunkReport>,
    /// Buffer write index after every chunk was loaded
    pub write_index: u64,
    pub samples_read: u64,
    pub format_changes: u64,
    /// Chunks still tracked after reading everything
    pub chunks_retained: usize,
}

/// Load every chunk of `manifest` in order, then read the buffer dry.
///
/// Chunks flagged `cancel` in the manifest, or listed in `cancel`, are bound
/// and abandoned before loading. Load failures are recorded per chunk rather
/// than aborting the run.
pub async fn simulate(
    manifest: &Manifest,
    media_root: &Path,
    config: &Config,
    cancel: &[u32],
) -> Result<SimulationReport> {
    let data_source: Arc<dyn DataSource> = Arc::new(FileDataSource::new(media_root));
    let cancel: HashSet<u32> = cancel.iter().copied().collect();

    // Keep every chunk until the report is built; eviction happens afterwards.
    let mut source = ChunkSampleSource::new(SourceConfig {
        evict_consumed: false,
    });
    let mut errors = Vec::new();

    for entry in &manifest.chunks {
        let chunk = UnboundChunk::new(
            Arc::clone(&data_source),
            entry.descriptor()?,
            entry.kind(&config.loader),
        );

        if entry.cancel || cancel.contains(&entry.index) {
            source
                .skip_next(chunk)
                .with_context(|| format!("Failed to bind chunk {}", entry.index))?;
            continue;
        }

        source
            .load_next(chunk)
            .with_context(|| format!("Failed to bind chunk {}", entry.index))?;
        if let Err(e) = source.await_load().await {
            if e.is_ordering_fault() {
                return Err(e).context(format!("chunk {}", entry.index));
            }
            tracing::warn!("Chunk {} failed to load: {}", entry.index, e);
            errors.push((entry.index, e.to_string()));
        }
    }

    let write_index = source.buffer().write_index();
    let chunks = source
        .chunks()
        .map(|chunk| {
            let range = source
                .sample_range(chunk.chunk_index())
                .unwrap_or(chunk.first_sample_index()..chunk.first_sample_index());
            ChunkReport {
                index: chunk.chunk_index(),
                uri: chunk.data_spec().uri.clone(),
                trigger: chunk.trigger().to_string(),
                start_us: chunk.start_time_us(),
                end_us: chunk.end_time_us(),
                first_sample_index: chunk.first_sample_index(),
                sample_range: (range.start, range.end),
                samples: chunk.samples_written(),
                status: status_label(chunk.status()).to_string(),
                drm: drm_label(&chunk.drm_init_data()),
                format: chunk.sample_format().id,
                error: errors
                    .iter()
                    .find(|(index, _)| *index == chunk.chunk_index())
                    .map(|(_, e)| e.clone()),
            }
        })
        .collect();

    let mut samples_read = 0;
    let mut format_changes = 0;
    while let Some(read) = source.read_sample() {
        samples_read += 1;
        if read.format_changed {
            format_changes += 1;
        }
    }
    if config.buffer.evict_consumed {
        source.evict_consumed();
    }

    Ok(SimulationReport {
        chunks,
        write_index,
        samples_read,
        format_changes,
        chunks_retained: source.chunks().count(),
    })
}

fn status_label(status: LoadStatus) -> &'static str {
    match status {
        LoadStatus::Idle => "idle",
        LoadStatus::Loading => "loading",
        LoadStatus::Completed => "completed",
        LoadStatus::Cancelled => "cancelled",
        LoadStatus::Failed => "failed",
    }
}

fn drm_label(state: &DrmState) -> String {
    match state {
        DrmState::Pending => "pending".to_string(),
        DrmState::Unencrypted => "none".to_string(),
        DrmState::Known(data) => {
            let schemes = data.schemes();
            if schemes.is_empty() {
                "universal".to_string()
            } else {
                let ids: Vec<String> = schemes.iter().map(|s| s.to_string()).collect();
                ids.join(",")
            }
        }
    }
}

/// Render a report as a plain-text table
pub fn render_table(report: &SimulationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>5}  {:<16} {:<11} {:>12} {:>8}  {:<10} {}\n",
        "index", "uri", "trigger", "range", "samples", "status", "drm"
    ));
    for chunk in &report.chunks {
        let range = format!("[{}, {})", chunk.sample_range.0, chunk.sample_range.1);
        out.push_str(&format!(
            "{:>5}  {:<16} {:<11} {:>12} {:>8}  {:<10} {}\n",
            chunk.index, chunk.uri, chunk.trigger, range, chunk.samples, chunk.status, chunk.drm
        ));
        if let Some(error) = &chunk.error {
            out.push_str(&format!("       error: {}\n", error));
        }
    }
    out.push_str(&format!(
        "\nwrite index: {}  samples read: {}  format changes: {}  chunks retained: {}\n",
        report.write_index, report.samples_read, report.format_changes, report.chunks_retained
    ));
    out
}
