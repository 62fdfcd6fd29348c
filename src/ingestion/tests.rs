//! Ingestion Module Tests
//!
//! ## Test Scopes
//! - **Parsing**: METADATA payloads, durations, filename derivation and `INDEX` fields.
//! - **Pipeline**: Duplicate detection across store and queue, metadata ingestion with
//!   persistence, completion notices and worker loss, driven through an in-memory worker
//!   channel.

#[cfg(test)]
mod tests {
    use crate::error::CatalogError;
    use crate::executor::pool::JobScheduler;
    use crate::executor::protocol::{WorkerMessage, read_message};
    use crate::executor::types::{ClientHandle, WorkerEvent, WorkerSlot, WorkerState};
    use crate::ingestion::handlers::{
        parse_duration, parse_index_fields, parse_metadata, synthesize_filename,
    };
    use crate::ingestion::pipeline::AcquisitionPipeline;
    use crate::ingestion::types::AddOutcome;
    use crate::storage::store::SongStore;
    use crate::storage::types::SongFields;

    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::io::DuplexStream;
    use tokio::sync::mpsc;

    struct Fixture {
        pipeline: AcquisitionPipeline,
        requests: DuplexStream,
        db_path: PathBuf,
        _dir: TempDir,
    }

    /// A pipeline with a single worker whose request channel the test reads.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog.bin");
        let (request_tx, requests) = tokio::io::duplex(4096);
        let scheduler = JobScheduler::new(vec![WorkerSlot::new(0, request_tx)]);

        Fixture {
            pipeline: AcquisitionPipeline::new(SongStore::new(), scheduler, &db_path),
            requests,
            db_path,
            _dir: dir,
        }
    }

    fn client(id: u64) -> (ClientHandle, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientHandle::new(id, tx), rx)
    }

    fn message(message: WorkerMessage) -> WorkerEvent {
        WorkerEvent::Message { worker: 0, message }
    }

    // ============================================================
    // TEST 1: Metadata and field parsing
    // ============================================================

    #[test]
    fn test_parse_metadata_payload() {
        let metadata = parse_metadata("Yellow\nColdplay\n269\nhttp://yt/yellow").unwrap();

        assert_eq!(metadata.title, "Yellow");
        assert_eq!(metadata.artist.as_deref(), Some("Coldplay"));
        assert_eq!(metadata.duration, 269);
        assert_eq!(metadata.url, "http://yt/yellow");
        assert_eq!(metadata.filename, "Yellow.mp3");
    }

    #[test]
    fn test_missing_artist_becomes_unknown() {
        let na = parse_metadata("Track\nNA\n10\nhttp://a").unwrap();
        let blank = parse_metadata("Track\n\n10\nhttp://b").unwrap();

        assert_eq!(na.artist, None);
        assert_eq!(na.into_fields().artist_or_default(), "Unknown");
        assert_eq!(blank.artist, None);
    }

    #[test]
    fn test_incomplete_metadata_is_rejected() {
        assert!(matches!(
            parse_metadata("Title\nArtist\n100"),
            Err(CatalogError::IncompleteMetadata)
        ));
        assert!(matches!(
            parse_metadata("\nArtist\n100\nhttp://a"),
            Err(CatalogError::IncompleteMetadata)
        ));
    }

    #[test]
    fn test_parse_duration_variants() {
        assert_eq!(parse_duration("215"), 215);
        assert_eq!(parse_duration(" 215.6 "), 216);
        assert_eq!(parse_duration("0.4"), 0);
        assert_eq!(parse_duration("NA"), 0);
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("-5"), 0);
    }

    #[test]
    fn test_filename_replaces_unsafe_characters() {
        assert_eq!(
            synthesize_filename("Hello, World! (Live)"),
            "Hello_ World_ _Live_.mp3"
        );
        assert_eq!(synthesize_filename("AC-DC_Live 1"), "AC-DC_Live 1.mp3");
        // One underscore per character, not per byte
        assert_eq!(synthesize_filename("夜に駆ける"), "_____.mp3");
    }

    #[test]
    fn test_filename_fits_its_slot() {
        let filename = synthesize_filename(&"a".repeat(300));
        assert_eq!(filename.len(), 255);
        assert!(filename.ends_with(".mp3"));
    }

    #[test]
    fn test_parse_index_fields() {
        let fields = parse_index_fields("http://a|Song|Band|song.mp3|180").unwrap();
        assert_eq!(
            fields,
            SongFields::new("http://a", "Song", Some("Band".to_string()), "song.mp3", 180)
        );

        let no_artist = parse_index_fields("http://a|Song||song.mp3|180").unwrap();
        assert_eq!(no_artist.artist, None);
    }

    #[test]
    fn test_index_fields_need_five_parts_and_numeric_duration() {
        assert!(matches!(
            parse_index_fields("http://a|Song|Band|song.mp3"),
            Err(CatalogError::InvalidFormat)
        ));
        assert!(matches!(
            parse_index_fields("http://a|Song|Band|song.mp3|180|extra"),
            Err(CatalogError::InvalidFormat)
        ));
        assert!(matches!(
            parse_index_fields("http://a|Song|Band|song.mp3|long"),
            Err(CatalogError::InvalidFormat)
        ));
        assert!(matches!(
            parse_index_fields("|Song|Band|song.mp3|180"),
            Err(CatalogError::InvalidFormat)
        ));
    }

    // ============================================================
    // TEST 2: AcquisitionPipeline
    // ============================================================

    #[tokio::test]
    async fn test_add_same_url_twice_is_duplicate() {
        // ARRANGE
        let mut fx = fixture();
        let (handle, _rx) = client(1);

        // ACT
        let first = fx.pipeline.add("http://a", handle.clone()).await;
        let second = fx.pipeline.add("http://a", handle).await;

        // ASSERT
        assert!(matches!(first, AddOutcome::Queued(_)));
        assert_eq!(second, AddOutcome::Duplicate);
        assert_eq!(
            read_message(&mut fx.requests).await.unwrap(),
            WorkerMessage::Request {
                url: "http://a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_add_of_catalogued_url_is_duplicate() {
        let mut fx = fixture();
        let (handle, _rx) = client(1);
        fx.pipeline
            .index(SongFields::new("http://a", "Song", None, "song.mp3", 1))
            .unwrap();

        assert_eq!(fx.pipeline.add("http://a", handle).await, AddOutcome::Duplicate);
        assert_eq!(fx.pipeline.scheduler().queue_len(), 0);
    }

    #[tokio::test]
    async fn test_index_persists_immediately() {
        let mut fx = fixture();

        let id = fx
            .pipeline
            .index(SongFields::new("http://a", "Song", Some("Band".to_string()), "song.mp3", 180))
            .unwrap();

        let reloaded = SongStore::load(&fx.db_path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get_by_id(id).unwrap().artist, "Band");
    }

    #[tokio::test]
    async fn test_get_returns_song_and_offset() {
        let mut fx = fixture();
        fx.pipeline
            .index(SongFields::new("http://a", "One", None, "one.mp3", 1))
            .unwrap();
        let id = fx
            .pipeline
            .index(SongFields::new("http://b", "Two", None, "two.mp3", 2))
            .unwrap();

        let (song, offset) = fx.pipeline.get(id).unwrap();
        assert_eq!(song.title, "Two");
        assert_eq!(offset, 84 + 1160);
        assert!(fx.pipeline.get(99).is_none());
    }

    #[tokio::test]
    async fn test_metadata_event_catalogues_song() {
        // ARRANGE
        let mut fx = fixture();
        let (handle, _rx) = client(1);
        fx.pipeline.add("http://yt/clocks", handle).await;

        // ACT
        fx.pipeline
            .on_worker_event(message(WorkerMessage::Metadata {
                payload: "Clocks\nColdplay\n307.2\nhttp://yt/clocks".to_string(),
            }))
            .await;

        // ASSERT: stored, searchable and on disk
        let song = fx.pipeline.store().get_by_id(1).unwrap();
        assert_eq!(song.title, "Clocks");
        assert_eq!(song.artist, "Coldplay");
        assert_eq!(song.duration, 307);
        assert_eq!(song.filename, "Clocks.mp3");
        assert_eq!(fx.pipeline.search("coldplay").len(), 1);
        assert_eq!(SongStore::load(&fx.db_path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_garbled_metadata_is_ignored() {
        let mut fx = fixture();

        fx.pipeline
            .on_worker_event(message(WorkerMessage::Metadata {
                payload: "only a title".to_string(),
            }))
            .await;

        assert!(fx.pipeline.store().is_empty());
    }

    #[tokio::test]
    async fn test_finished_notifies_client_and_drains_queue() {
        // ARRANGE: two jobs, one worker
        let mut fx = fixture();
        let (alice, mut alice_rx) = client(1);
        let (bob, _bob_rx) = client(2);
        fx.pipeline.add("http://first", alice).await;
        fx.pipeline.add("http://second", bob).await;
        read_message(&mut fx.requests).await.unwrap();
        assert_eq!(fx.pipeline.scheduler().queue_len(), 1);

        // ACT
        fx.pipeline
            .on_worker_event(message(WorkerMessage::Finished {
                url: "http://first".to_string(),
            }))
            .await;

        // ASSERT
        assert_eq!(alice_rx.try_recv().unwrap(), "DOWNLOADED http://first");
        assert_eq!(fx.pipeline.scheduler().queue_len(), 0);
        assert_eq!(
            read_message(&mut fx.requests).await.unwrap(),
            WorkerMessage::Request {
                url: "http://second".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_download_notifies_client() {
        let mut fx = fixture();
        let (handle, mut rx) = client(1);
        fx.pipeline.add("http://broken", handle).await;

        fx.pipeline
            .on_worker_event(message(WorkerMessage::Failed {
                url: "http://broken".to_string(),
                status: "exit 1".to_string(),
            }))
            .await;

        assert_eq!(rx.try_recv().unwrap(), "DOWNLOAD_FAILED http://broken");
        assert_eq!(fx.pipeline.scheduler().worker_state(0), Some(WorkerState::Idle));
        assert!(fx.pipeline.store().is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_client_is_skipped() {
        let mut fx = fixture();
        let (handle, rx) = client(1);
        fx.pipeline.add("http://a", handle).await;
        drop(rx);

        fx.pipeline
            .on_worker_event(message(WorkerMessage::Finished {
                url: "http://a".to_string(),
            }))
            .await;

        assert_eq!(fx.pipeline.scheduler().worker_state(0), Some(WorkerState::Idle));
    }

    #[tokio::test]
    async fn test_lost_worker_fails_its_job() {
        let mut fx = fixture();
        let (handle, mut rx) = client(1);
        fx.pipeline.add("http://a", handle).await;

        fx.pipeline
            .on_worker_event(WorkerEvent::Closed { worker: 0 })
            .await;

        assert_eq!(rx.try_recv().unwrap(), "DOWNLOAD_FAILED http://a");
        assert_eq!(fx.pipeline.scheduler().worker_state(0), Some(WorkerState::Busy));
        assert!(!fx.pipeline.scheduler().is_pending("http://a"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_workers_and_saves() {
        let mut fx = fixture();
        fx.pipeline
            .index(SongFields::new("http://a", "Song", None, "song.mp3", 1))
            .unwrap();
        std::fs::remove_file(&fx.db_path).unwrap();

        fx.pipeline.shutdown().await.unwrap();

        assert_eq!(
            read_message(&mut fx.requests).await.unwrap(),
            WorkerMessage::Shutdown
        );
        assert_eq!(SongStore::load(&fx.db_path).unwrap().len(), 1);
    }
}
