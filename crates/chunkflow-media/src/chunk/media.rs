//! Media chunks and their binding to a sample buffer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chunkflow_common::{SelectionTrigger, TimeRange};
use parking_lot::{Mutex, RwLock};

use super::{ChunkDescriptor, DataSpec, LoadStatus};
use crate::buffer::{SampleBufferHandle, SampleWriter, WeakBufferRef};
use crate::drm::{DrmInitData, DrmState};
use crate::error::{Error, Result};
use crate::extractor::ExtractorFactory;
use crate::format::Format;
use crate::upstream::DataSource;

/// Where a container chunk's key material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrmPolicy {
    /// Known from the manifest before any bytes load. `None` means clear
    /// content.
    Declared(Option<DrmInitData>),
    /// Carried inside the stream; resolved when the load completes.
    InStream,
}

/// How a chunk turns its bytes into samples.
#[derive(Debug, Clone)]
pub enum ChunkKind {
    /// The whole payload is one sample (subtitles, thumbnails, key frames).
    /// Format and key material are fixed up front.
    SingleSample {
        sample_format: Format,
        drm: Option<DrmInitData>,
    },
    /// The payload is parsed by an extractor.
    Container {
        extractor: Arc<dyn ExtractorFactory>,
        drm: DrmPolicy,
    },
}

impl ChunkKind {
    /// Single-sample chunk with no key material.
    pub fn single_sample(sample_format: Format) -> Self {
        Self::SingleSample {
            sample_format,
            drm: None,
        }
    }

    /// Container chunk parsed by `extractor`.
    pub fn container(extractor: impl ExtractorFactory + 'static, drm: DrmPolicy) -> Self {
        Self::Container {
            extractor: Arc::new(extractor),
            drm,
        }
    }

    fn initial_drm_state(&self) -> DrmState {
        match self {
            Self::SingleSample { drm, .. } => DrmState::resolved(drm.clone()),
            Self::Container {
                drm: DrmPolicy::Declared(drm),
                ..
            } => DrmState::resolved(drm.clone()),
            Self::Container {
                drm: DrmPolicy::InStream,
                ..
            } => DrmState::Pending,
        }
    }

    fn initial_sample_format(&self) -> Option<Format> {
        match self {
            Self::SingleSample { sample_format, .. } => Some(sample_format.clone()),
            Self::Container { .. } => None,
        }
    }
}

/// A chunk that has not been attached to a sample buffer yet.
///
/// The only thing an unbound chunk can do besides describe itself is
/// [`bind`](UnboundChunk::bind); sample positions and key material are only
/// reachable on the resulting [`BoundChunk`].
#[derive(Clone)]
pub struct UnboundChunk {
    descriptor: ChunkDescriptor,
    kind: ChunkKind,
    data_source: Arc<dyn DataSource>,
}

impl UnboundChunk {
    pub fn new(
        data_source: Arc<dyn DataSource>,
        descriptor: ChunkDescriptor,
        kind: ChunkKind,
    ) -> Self {
        Self {
            descriptor,
            kind,
            data_source,
        }
    }

    pub fn descriptor(&self) -> &ChunkDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> &ChunkKind {
        &self.kind
    }

    /// Attach this chunk to `buffer`.
    ///
    /// Takes the buffer's writer claim and records its write index as the
    /// chunk's first sample index, both under one lock. Fails with
    /// [`Error::WriterBusy`] while another chunk still holds the claim and
    /// with [`Error::BufferClosed`] on a closed buffer.
    pub fn bind(self, buffer: &SampleBufferHandle) -> Result<BoundChunk> {
        let chunk_index = self.descriptor.chunk_index();
        let (writer, first_sample_index) = buffer.claim(chunk_index)?;

        tracing::debug!(
            chunk_index,
            first_sample_index,
            buffer = %buffer.id(),
            trigger = %self.descriptor.trigger(),
            "bound chunk"
        );

        let drm = self.kind.initial_drm_state();
        let sample_format = self.kind.initial_sample_format();
        Ok(BoundChunk {
            descriptor: self.descriptor,
            kind: self.kind,
            data_source: self.data_source,
            buffer: buffer.downgrade(),
            first_sample_index,
            writer: Mutex::new(Some(writer)),
            drm: RwLock::new(drm),
            sample_format: RwLock::new(sample_format),
            status: Mutex::new(LoadStatus::Idle),
            samples_written: AtomicU64::new(0),
        })
    }
}

impl fmt::Debug for UnboundChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundChunk")
            .field("descriptor", &self.descriptor)
            .field("kind", &self.kind)
            .field("data_source", &self.data_source.name())
            .finish()
    }
}

/// A chunk attached to one sample buffer.
///
/// The first sample index and the buffer reference are fixed at bind time.
/// Key material and the extracted sample format may be filled in by the
/// load, and are stable once it completes.
pub struct BoundChunk {
    descriptor: ChunkDescriptor,
    kind: ChunkKind,
    data_source: Arc<dyn DataSource>,
    buffer: WeakBufferRef,
    first_sample_index: u64,
    writer: Mutex<Option<SampleWriter>>,
    drm: RwLock<DrmState>,
    sample_format: RwLock<Option<Format>>,
    status: Mutex<LoadStatus>,
    samples_written: AtomicU64,
}

impl BoundChunk {
    pub fn descriptor(&self) -> &ChunkDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> &ChunkKind {
        &self.kind
    }

    pub fn chunk_index(&self) -> u32 {
        self.descriptor.chunk_index()
    }

    pub fn format(&self) -> &Format {
        self.descriptor.format()
    }

    pub fn trigger(&self) -> SelectionTrigger {
        self.descriptor.trigger()
    }

    pub fn time_range(&self) -> TimeRange {
        self.descriptor.time_range()
    }

    pub fn start_time_us(&self) -> u64 {
        self.descriptor.start_time_us()
    }

    pub fn end_time_us(&self) -> u64 {
        self.descriptor.end_time_us()
    }

    pub fn data_spec(&self) -> &DataSpec {
        self.descriptor.data_spec()
    }

    /// Buffer position of the first sample this chunk contributes.
    pub fn first_sample_index(&self) -> u64 {
        self.first_sample_index
    }

    /// Key material for this chunk's samples.
    pub fn drm_init_data(&self) -> DrmState {
        self.drm.read().clone()
    }

    /// Format of the samples as handed to the renderer.
    ///
    /// Prefers the format reported by the extractor, then the declared
    /// sample format, then the descriptor's stream format.
    pub fn sample_format(&self) -> Format {
        self.sample_format
            .read()
            .clone()
            .unwrap_or_else(|| self.descriptor.format().clone())
    }

    pub fn status(&self) -> LoadStatus {
        *self.status.lock()
    }

    /// Samples appended so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Acquire)
    }

    /// Whether this chunk is bound to `buffer`.
    pub fn is_bound_to(&self, buffer: &SampleBufferHandle) -> bool {
        self.buffer.points_to(buffer)
    }

    /// Release the writer claim without loading.
    ///
    /// The chunk keeps its first sample index and contributes an empty
    /// range. Returns `false` if the writer was already taken by a load.
    pub fn abandon(&self) -> bool {
        let writer = self.writer.lock().take();
        match writer {
            Some(writer) => {
                writer.finish();
                *self.status.lock() = LoadStatus::Cancelled;
                tracing::debug!(chunk_index = self.chunk_index(), "abandoned before load");
                true
            }
            None => false,
        }
    }

    pub(crate) fn bound_buffer(&self) -> &WeakBufferRef {
        &self.buffer
    }

    pub(crate) fn data_source(&self) -> &dyn DataSource {
        self.data_source.as_ref()
    }

    pub(crate) fn take_writer(&self) -> Result<SampleWriter> {
        self.writer.lock().take().ok_or(Error::AlreadyLoaded {
            chunk_index: self.chunk_index(),
        })
    }

    pub(crate) fn set_status(&self, status: LoadStatus) {
        *self.status.lock() = status;
    }

    pub(crate) fn record_sample(&self) {
        self.samples_written.fetch_add(1, Ordering::AcqRel);
    }

    /// Apply metadata reported by the extractor.
    ///
    /// Only in-stream key material is taken from the stream; declared key
    /// material is never overridden.
    pub(crate) fn apply_stream_metadata(
        &self,
        format: Option<Format>,
        drm: Option<DrmInitData>,
    ) {
        if let Some(format) = format {
            *self.sample_format.write() = Some(format);
        }
        if let Some(data) = drm {
            let mut state = self.drm.write();
            if !state.is_resolved() {
                *state = DrmState::Known(data);
            }
        }
    }

    /// Settle key material at load completion.
    pub(crate) fn finalize_drm(&self) {
        let mut drm = self.drm.write();
        if !drm.is_resolved() {
            *drm = DrmState::Unencrypted;
        }
    }
}

impl fmt::Debug for BoundChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundChunk")
            .field("chunk_index", &self.chunk_index())
            .field("first_sample_index", &self.first_sample_index)
            .field("buffer", &self.buffer.id())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// A chunk in either phase, for collections that hold both.
///
/// Unlike the typestate API, misuse here is only caught at runtime:
/// querying an unbound chunk returns [`Error::NotBound`] and binding twice
/// returns [`Error::AlreadyBound`].
#[derive(Debug)]
pub enum MediaChunk {
    Unbound(UnboundChunk),
    Bound(Arc<BoundChunk>),
}

impl MediaChunk {
    pub fn new(chunk: UnboundChunk) -> Self {
        Self::Unbound(chunk)
    }

    pub fn descriptor(&self) -> &ChunkDescriptor {
        match self {
            Self::Unbound(chunk) => chunk.descriptor(),
            Self::Bound(chunk) => chunk.descriptor(),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    pub fn as_bound(&self) -> Option<&Arc<BoundChunk>> {
        match self {
            Self::Bound(chunk) => Some(chunk),
            Self::Unbound(_) => None,
        }
    }

    /// Bind to `buffer`. Fails if already bound.
    pub fn bind(&mut self, buffer: &SampleBufferHandle) -> Result<Arc<BoundChunk>> {
        let unbound = match self {
            Self::Unbound(chunk) => chunk.clone(),
            Self::Bound(chunk) => {
                return Err(Error::AlreadyBound {
                    chunk_index: chunk.chunk_index(),
                    first_sample_index: chunk.first_sample_index(),
                })
            }
        };
        let bound = Arc::new(unbound.bind(buffer)?);
        *self = Self::Bound(Arc::clone(&bound));
        Ok(bound)
    }

    pub fn first_sample_index(&self) -> Result<u64> {
        self.bound().map(|chunk| chunk.first_sample_index())
    }

    pub fn drm_init_data(&self) -> Result<DrmState> {
        self.bound().map(|chunk| chunk.drm_init_data())
    }

    fn bound(&self) -> Result<&Arc<BoundChunk>> {
        self.as_bound().ok_or(Error::NotBound {
            chunk_index: self.descriptor().chunk_index(),
        })
    }
}
