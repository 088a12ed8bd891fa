//! End-to-end tests for binding and loading chunks against a shared buffer.

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use chunkflow_common::SelectionTrigger;
use chunkflow_media::{
    ChunkDescriptor, ChunkKind, ChunkSampleSource, DataSource, DataSpec, DrmInitData, DrmPolicy,
    DrmState, Error, FixedSizeExtractor, Format, LoadOutcome, LoadStatus, MediaChunk,
    MemoryDataSource, Result, SampleBufferHandle, SchemeInitData, SourceConfig, UnboundChunk,
};
use chunkflow_media::drm::WIDEVINE_UUID;

/// Transport that never completes, so loads only end by cancellation.
struct StallingDataSource;

#[async_trait]
impl DataSource for StallingDataSource {
    fn name(&self) -> &'static str {
        "stalling"
    }

    async fn open(&self, _spec: &DataSpec) -> Result<Bytes> {
        std::future::pending().await
    }
}

fn memory(segments: &[(&str, usize)]) -> Arc<MemoryDataSource> {
    let source = MemoryDataSource::new();
    for (uri, len) in segments {
        source.insert(*uri, vec![0xABu8; *len]);
    }
    Arc::new(source)
}

fn descriptor(uri: &str, index: u32, format: Format) -> ChunkDescriptor {
    ChunkDescriptor::new(
        DataSpec::new(uri),
        SelectionTrigger::Adaptive,
        format,
        u64::from(index) * 2_000_000,
        u64::from(index + 1) * 2_000_000,
        index,
    )
    .unwrap()
}

fn video() -> Format {
    Format::video("720p", "video/mp4", 2_000_000, 1280, 720)
}

fn chunk(source: Arc<dyn DataSource>, uri: &str, index: u32) -> UnboundChunk {
    let kind = ChunkKind::container(FixedSizeExtractor::new(10), DrmPolicy::Declared(None));
    UnboundChunk::new(source, descriptor(uri, index, video()), kind)
}

fn retaining() -> SourceConfig {
    SourceConfig {
        evict_consumed: false,
    }
}

#[tokio::test]
async fn consecutive_chunks_partition_the_buffer() {
    let data = memory(&[("a.m4s", 100), ("b.m4s", 50)]);
    let mut source = ChunkSampleSource::new(retaining());

    let a = source.load_next(chunk(data.clone(), "a.m4s", 0)).unwrap();
    assert_eq!(a.first_sample_index(), 0);
    assert_eq!(
        source.await_load().await.unwrap(),
        Some(LoadOutcome::Completed { samples: 10 })
    );

    let b = source.load_next(chunk(data.clone(), "b.m4s", 1)).unwrap();
    assert_eq!(b.first_sample_index(), 10);
    source.await_load().await.unwrap();

    assert_eq!(a.first_sample_index(), 0);
    assert_eq!(source.sample_range(0), Some(0..10));
    assert_eq!(source.sample_range(1), Some(10..15));
    assert_eq!(source.chunk_for_sample(9).unwrap().chunk_index(), 0);
    assert_eq!(source.chunk_for_sample(10).unwrap().chunk_index(), 1);
    assert!(source.chunk_for_sample(15).is_none());
}

#[tokio::test]
async fn first_sample_index_is_stable_across_later_writes() {
    let data = memory(&[("a.m4s", 30), ("b.m4s", 30), ("c.m4s", 30)]);
    let mut source = ChunkSampleSource::new(retaining());

    let mut firsts = Vec::new();
    let mut bound = Vec::new();
    for (i, uri) in ["a.m4s", "b.m4s", "c.m4s"].iter().enumerate() {
        let expected = source.buffer().write_index();
        let c = source.load_next(chunk(data.clone(), uri, i as u32)).unwrap();
        assert_eq!(c.first_sample_index(), expected);
        source.await_load().await.unwrap();
        firsts.push(c.first_sample_index());
        bound.push(c);
    }

    assert!(firsts.windows(2).all(|w| w[0] < w[1]));
    let recorded: Vec<u64> = bound.iter().map(|c| c.first_sample_index()).collect();
    assert_eq!(recorded, firsts);
}

#[tokio::test]
async fn cancelled_chunk_contributes_empty_range() {
    let data = memory(&[("d.m4s", 20)]);
    let mut source = ChunkSampleSource::new(retaining());

    let stalled: Arc<dyn DataSource> = Arc::new(StallingDataSource);
    let c = source.load_next(chunk(stalled, "c.m4s", 0)).unwrap();
    assert_eq!(
        source.cancel_load().await.unwrap(),
        Some(LoadOutcome::Cancelled { samples: 0 })
    );
    assert_eq!(c.status(), LoadStatus::Cancelled);

    let d = source.load_next(chunk(data, "d.m4s", 1)).unwrap();
    source.await_load().await.unwrap();

    assert_eq!(c.first_sample_index(), d.first_sample_index());
    assert_eq!(source.sample_range(0), Some(0..0));
    assert_eq!(source.sample_range(1), Some(0..2));
    assert_eq!(source.chunk_for_sample(0).unwrap().chunk_index(), 1);
}

#[tokio::test]
async fn bind_while_loading_is_rejected() {
    let mut source = ChunkSampleSource::new(retaining());
    let stalled: Arc<dyn DataSource> = Arc::new(StallingDataSource);
    source.load_next(chunk(stalled.clone(), "a.m4s", 0)).unwrap();

    let err = source.load_next(chunk(stalled, "b.m4s", 1)).unwrap_err();
    assert!(err.is_ordering_fault());
    assert_matches!(err, Error::WriterBusy { active_chunk: 0 });

    source.cancel_load().await.unwrap();
    assert!(!source.is_loading());
}

#[tokio::test]
async fn chunk_indices_must_increase() {
    let data = memory(&[("a.m4s", 10)]);
    let mut source = ChunkSampleSource::new(retaining());
    source.load_next(chunk(data.clone(), "a.m4s", 5)).unwrap();
    source.await_load().await.unwrap();

    assert_matches!(
        source.load_next(chunk(data.clone(), "a.m4s", 5)),
        Err(Error::OutOfOrder {
            index: 5,
            previous: 5
        })
    );
    assert_matches!(
        source.load_next(chunk(data, "a.m4s", 3)),
        Err(Error::OutOfOrder { .. })
    );
}

#[tokio::test]
async fn media_chunk_enforces_ordering_at_runtime() {
    let buffer = SampleBufferHandle::new();
    let data = memory(&[("a.m4s", 10)]);
    let mut chunk = MediaChunk::new(chunk(data, "a.m4s", 0));

    assert_matches!(chunk.first_sample_index(), Err(Error::NotBound { .. }));

    let bound = chunk.bind(&buffer).unwrap();
    chunkflow_media::load(&bound, &Default::default()).await.unwrap();

    assert_matches!(chunk.bind(&buffer), Err(Error::AlreadyBound { .. }));
    assert_eq!(chunk.first_sample_index().unwrap(), 0);
    assert_eq!(chunk.drm_init_data().unwrap(), DrmState::Unencrypted);
}

#[tokio::test]
async fn discard_upstream_rewinds_unread_chunks() {
    let data = memory(&[("a.m4s", 30), ("b.m4s", 30), ("c.m4s", 30)]);
    let mut source = ChunkSampleSource::new(retaining());
    for (i, uri) in ["a.m4s", "b.m4s", "c.m4s"].iter().enumerate() {
        source.load_next(chunk(data.clone(), uri, i as u32)).unwrap();
        source.await_load().await.unwrap();
    }
    source.read_sample().unwrap();

    assert_eq!(source.discard_upstream(1).unwrap(), 2);
    assert_eq!(source.buffer().write_index(), 3);
    assert_eq!(source.chunks().count(), 1);

    // the discarded position can be reloaded, e.g. at another bitrate
    let b = source.load_next(chunk(data, "b.m4s", 1)).unwrap();
    assert_eq!(b.first_sample_index(), 3);
    source.await_load().await.unwrap();

    // chunk 0 has been read from, so it can no longer be discarded
    assert_matches!(
        source.discard_upstream(0),
        Err(Error::IndexOutOfRange { .. })
    );
}

#[tokio::test]
async fn reads_carry_chunk_metadata_and_evict() {
    let drm = DrmInitData::mapped()
        .with_scheme(WIDEVINE_UUID, SchemeInitData::new("video/mp4", vec![1, 2]));
    let data = memory(&[("a.m4s", 20), ("b.m4s", 20)]);
    let mut source = ChunkSampleSource::new(SourceConfig::default());

    let a = UnboundChunk::new(
        data.clone(),
        descriptor("a.m4s", 0, video()),
        ChunkKind::container(FixedSizeExtractor::new(10), DrmPolicy::Declared(None)),
    );
    source.load_next(a).unwrap();
    source.await_load().await.unwrap();

    let b = UnboundChunk::new(
        data,
        descriptor("b.m4s", 1, Format::video("1080p", "video/mp4", 5_000_000, 1920, 1080)),
        ChunkKind::container(
            FixedSizeExtractor::new(10).with_drm(drm.clone()),
            DrmPolicy::InStream,
        ),
    );
    source.load_next(b).unwrap();
    source.await_load().await.unwrap();

    let first = source.read_sample().unwrap();
    assert!(first.format_changed);
    assert_eq!(first.chunk.drm_init_data(), DrmState::Unencrypted);

    let second = source.read_sample().unwrap();
    assert!(!second.format_changed);

    let third = source.read_sample().unwrap();
    assert_eq!(third.index, 2);
    assert!(third.format_changed);
    assert_eq!(third.format.id, "1080p");
    assert_eq!(third.chunk.drm_init_data(), DrmState::Known(drm));
    assert!(third.sample.is_encrypted);

    // chunk 0 is fully consumed and trimmed
    assert!(source.chunk(0).is_none());
    assert_eq!(source.buffer().lock().head_index(), 3);

    source.read_sample().unwrap();
    assert!(source.read_sample().is_none());
    assert_eq!(source.chunks().count(), 1);
}

#[tokio::test]
async fn release_closes_buffer() {
    let data = memory(&[("a.m4s", 10)]);
    let mut source = ChunkSampleSource::new(retaining());
    source.release();
    assert_matches!(
        source.load_next(chunk(data, "a.m4s", 0)),
        Err(Error::BufferClosed)
    );
}

#[tokio::test]
async fn buffered_samples_stay_readable_after_release() {
    let data = memory(&[("a.m4s", 30)]);
    let mut source = ChunkSampleSource::new(SourceConfig::default());
    source.load_next(chunk(data.clone(), "a.m4s", 0)).unwrap();
    source.await_load().await.unwrap();
    source.read_sample().unwrap();

    source.release();

    let next = source.read_sample().unwrap();
    assert_eq!(next.index, 1);
    assert_eq!(next.chunk.chunk_index(), 0);
    assert_eq!(source.read_sample().unwrap().index, 2);
    assert!(source.read_sample().is_none());
    assert_matches!(
        source.load_next(chunk(data, "b.m4s", 1)),
        Err(Error::BufferClosed)
    );
}

#[tokio::test]
async fn skipped_chunk_shares_next_first_index() {
    let data = memory(&[("a.m4s", 40), ("c.m4s", 10)]);
    let mut source = ChunkSampleSource::new(retaining());
    source.load_next(chunk(data.clone(), "a.m4s", 0)).unwrap();
    source.await_load().await.unwrap();

    let skipped = source.skip_next(chunk(data.clone(), "b.m4s", 1)).unwrap();
    assert!(!source.is_loading());
    assert_eq!(skipped.status(), LoadStatus::Cancelled);

    let next = source.load_next(chunk(data, "c.m4s", 2)).unwrap();
    source.await_load().await.unwrap();

    assert_eq!(skipped.first_sample_index(), 4);
    assert_eq!(next.first_sample_index(), 4);
    assert_eq!(source.sample_range(1), Some(4..4));
}
