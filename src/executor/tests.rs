//! Executor Module Tests
//!
//! ## Test Scopes
//! - **Protocol**: Frame layout, size limits, unknown types and peer closure.
//! - **Scheduler**: FIFO assignment, queueing when every worker is busy, dispatch failure
//!   and lost workers, driven through in-memory channels.
//! - **Worker**: The job loop against real child processes (`sh -c` scripts standing in
//!   for the downloader).

#[cfg(test)]
mod tests {
    use crate::error::CatalogError;
    use crate::executor::pool::JobScheduler;
    use crate::executor::protocol::{
        MAX_PAYLOAD, MSG_FAILED, MSG_REQUEST, WorkerMessage, read_message, write_message,
    };
    use crate::executor::types::{ClientHandle, WorkerEvent, WorkerSlot, WorkerState};
    use crate::executor::worker::{Downloader, DownloaderConfig, worker_loop};

    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(10);

    fn client(id: u64) -> (ClientHandle, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientHandle::new(id, tx), rx)
    }

    fn sh_downloader(script: &str) -> Downloader {
        let config = DownloaderConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "{url}".to_string()],
            metadata_lines: 3,
        };
        Downloader::new(config, std::env::temp_dir())
    }

    async fn next_frame(reader: &mut DuplexStream) -> WorkerMessage {
        tokio::time::timeout(WAIT, read_message(reader))
            .await
            .expect("timed out waiting for a frame")
            .expect("frame should decode")
    }

    // ============================================================
    // TEST 1: Frame protocol
    // ============================================================

    #[test]
    fn test_request_frame_layout() {
        // ARRANGE
        let message = WorkerMessage::Request {
            url: "http://a".to_string(),
        };

        // ACT
        let frame = message.encode().unwrap();

        // ASSERT: [type][len u32 LE][payload]
        assert_eq!(frame[0], MSG_REQUEST);
        assert_eq!(&frame[1..5], &8u32.to_le_bytes());
        assert_eq!(&frame[5..], b"http://a");
    }

    #[test]
    fn test_failed_frame_carries_url_and_status() {
        let message = WorkerMessage::Failed {
            url: "http://a".to_string(),
            status: "exit 1".to_string(),
        };

        let frame = message.encode().unwrap();
        assert_eq!(frame[0], MSG_FAILED);

        let decoded = WorkerMessage::decode(frame[0], &frame[5..]).unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn test_frames_cross_a_channel_in_order() {
        // ARRANGE
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        let sent = vec![
            WorkerMessage::Request {
                url: "http://a".to_string(),
            },
            WorkerMessage::Metadata {
                payload: "Title\nArtist\n200\nhttp://a".to_string(),
            },
            WorkerMessage::Finished {
                url: "http://a".to_string(),
            },
            WorkerMessage::Shutdown,
        ];

        // ACT
        for message in &sent {
            write_message(&mut writer, message).await.unwrap();
        }

        // ASSERT
        for expected in &sent {
            assert_eq!(&read_message(&mut reader).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_oversize_payload_is_rejected_not_truncated() {
        let (mut writer, _reader) = tokio::io::duplex(1024);
        let message = WorkerMessage::Metadata {
            payload: "x".repeat(MAX_PAYLOAD + 1),
        };

        let result = write_message(&mut writer, &message).await;

        assert!(matches!(
            result,
            Err(CatalogError::FrameTooLarge { len, max }) if len == MAX_PAYLOAD + 1 && max == MAX_PAYLOAD
        ));
    }

    #[test]
    fn test_payload_at_limit_is_accepted() {
        let message = WorkerMessage::Metadata {
            payload: "x".repeat(MAX_PAYLOAD),
        };
        assert_eq!(message.encode().unwrap().len(), MAX_PAYLOAD + 5);
    }

    #[tokio::test]
    async fn test_read_rejects_oversize_length_prefix() {
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        let mut header = vec![MSG_REQUEST];
        header.extend_from_slice(&((MAX_PAYLOAD as u32) + 1).to_le_bytes());
        writer.write_all(&header).await.unwrap();

        let result = read_message(&mut reader).await;

        assert!(matches!(result, Err(CatalogError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_read_rejects_unknown_message_type() {
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        writer.write_all(&[9, 0, 0, 0, 0]).await.unwrap();

        let result = read_message(&mut reader).await;

        assert!(matches!(result, Err(CatalogError::UnknownMessageType(9))));
    }

    #[tokio::test]
    async fn test_peer_closure_is_channel_closed() {
        // Closed before any frame
        let (writer, mut reader) = tokio::io::duplex(1024);
        drop(writer);
        assert!(matches!(
            read_message(&mut reader).await,
            Err(CatalogError::ChannelClosed)
        ));

        // Closed mid-frame
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        writer.write_all(&[MSG_REQUEST, 10, 0, 0, 0, b'h']).await.unwrap();
        drop(writer);
        assert!(matches!(
            read_message(&mut reader).await,
            Err(CatalogError::ChannelClosed)
        ));
    }

    // ============================================================
    // TEST 2: JobScheduler assignment
    // ============================================================

    #[tokio::test]
    async fn test_second_job_waits_for_single_worker() {
        // ARRANGE: one idle worker whose request channel we read ourselves
        let (request_tx, mut request_rx) = tokio::io::duplex(4096);
        let mut scheduler = JobScheduler::new(vec![WorkerSlot::new(0, request_tx)]);
        let (alice, _alice_rx) = client(1);
        let (bob, _bob_rx) = client(2);

        // ACT: two submissions
        scheduler.submit_download("http://first", alice).await;
        scheduler.submit_download("http://second", bob).await;

        // ASSERT: first dispatched, second queued
        assert_eq!(
            next_frame(&mut request_rx).await,
            WorkerMessage::Request {
                url: "http://first".to_string()
            }
        );
        assert_eq!(scheduler.worker_state(0), Some(WorkerState::Busy));
        assert_eq!(scheduler.queue_len(), 1);
        assert_eq!(scheduler.current_job(0).unwrap().url, "http://first");

        // ACT: the worker reports completion
        let finished = scheduler.complete(0).unwrap();
        assert_eq!(finished.url, "http://first");
        assert_eq!(finished.client.id(), 1);
        let dispatched = scheduler.assign_pending_downloads().await;

        // ASSERT: the queued job moves to the worker
        assert_eq!(dispatched, 1);
        assert_eq!(scheduler.queue_len(), 0);
        assert_eq!(
            next_frame(&mut request_rx).await,
            WorkerMessage::Request {
                url: "http://second".to_string()
            }
        );
        assert_eq!(scheduler.current_job(0).unwrap().client.id(), 2);
    }

    #[tokio::test]
    async fn test_assignment_picks_first_idle_worker() {
        let (tx0, mut rx0) = tokio::io::duplex(4096);
        let (tx1, mut rx1) = tokio::io::duplex(4096);
        let mut scheduler = JobScheduler::new(vec![WorkerSlot::new(0, tx0), WorkerSlot::new(1, tx1)]);
        let (handle, _rx) = client(1);

        scheduler.submit_download("http://a", handle.clone()).await;
        scheduler.submit_download("http://b", handle.clone()).await;

        assert_eq!(
            next_frame(&mut rx0).await,
            WorkerMessage::Request {
                url: "http://a".to_string()
            }
        );
        assert_eq!(
            next_frame(&mut rx1).await,
            WorkerMessage::Request {
                url: "http://b".to_string()
            }
        );
        assert_eq!(scheduler.idle_count(), 0);

        // Worker 1 finishes first; the next job goes to it
        scheduler.complete(1);
        scheduler.submit_download("http://c", handle).await;
        assert_eq!(
            next_frame(&mut rx1).await,
            WorkerMessage::Request {
                url: "http://c".to_string()
            }
        );
        assert_eq!(scheduler.worker_state(0), Some(WorkerState::Busy));
    }

    #[tokio::test]
    async fn test_pending_covers_queued_and_in_flight_urls() {
        let (request_tx, _request_rx) = tokio::io::duplex(4096);
        let mut scheduler = JobScheduler::new(vec![WorkerSlot::new(0, request_tx)]);
        let (handle, _rx) = client(1);

        scheduler.submit_download("http://running", handle.clone()).await;
        scheduler.submit_download("http://queued", handle).await;

        assert!(scheduler.is_pending("http://running"));
        assert!(scheduler.is_pending("http://queued"));
        assert!(!scheduler.is_pending("http://other"));

        scheduler.complete(0);
        assert!(!scheduler.is_pending("http://running"));
    }

    #[tokio::test]
    async fn test_failed_dispatch_requeues_job_at_front() {
        // ARRANGE: the worker end of the channel is gone
        let (request_tx, request_rx) = tokio::io::duplex(4096);
        drop(request_rx);
        let mut scheduler = JobScheduler::new(vec![WorkerSlot::new(0, request_tx)]);
        let (handle, _rx) = client(1);

        // ACT
        scheduler.submit_download("http://a", handle.clone()).await;
        scheduler.submit_download("http://b", handle).await;

        // ASSERT: nothing dispatched, order preserved, worker still idle
        assert_eq!(scheduler.queue_len(), 2);
        assert_eq!(scheduler.worker_state(0), Some(WorkerState::Idle));
        assert!(scheduler.is_pending("http://a"));
        assert_eq!(scheduler.assign_pending_downloads().await, 0);
    }

    #[tokio::test]
    async fn test_lost_worker_is_never_selected_again() {
        let (request_tx, mut request_rx) = tokio::io::duplex(4096);
        let mut scheduler = JobScheduler::new(vec![WorkerSlot::new(0, request_tx)]);
        let (handle, _rx) = client(1);

        scheduler.submit_download("http://a", handle.clone()).await;
        next_frame(&mut request_rx).await;

        let lost = scheduler.mark_lost(0).unwrap();
        assert_eq!(lost.url, "http://a");
        assert_eq!(scheduler.worker_state(0), Some(WorkerState::Busy));
        assert!(scheduler.current_job(0).is_none());

        scheduler.submit_download("http://b", handle).await;
        assert_eq!(scheduler.queue_len(), 1);
    }

    #[test]
    fn test_client_handle_send_fails_once_client_is_gone() {
        let (handle, mut rx) = client(7);
        assert!(handle.send("DOWNLOADED http://a"));
        assert_eq!(rx.try_recv().unwrap(), "DOWNLOADED http://a");

        drop(rx);
        assert!(!handle.send("DOWNLOADED http://a"));
    }

    // ============================================================
    // TEST 3: Worker job loop
    // ============================================================

    #[test]
    fn test_downloader_arguments_are_templated() {
        let config = DownloaderConfig {
            program: "fetch".to_string(),
            args: vec!["-o".to_string(), "{media_dir}/out".to_string(), "{url}".to_string()],
            metadata_lines: 3,
        };
        let downloader = Downloader::new(config, "/srv/songs");

        assert_eq!(
            downloader.args_for("http://a"),
            vec!["-o", "/srv/songs/out", "http://a"]
        );
    }

    #[test]
    fn test_default_downloader_is_yt_dlp() {
        let config = DownloaderConfig::default();
        assert_eq!(config.program, "yt-dlp");
        assert_eq!(config.metadata_lines, 3);
        assert!(config.args.iter().any(|arg| arg == "{url}"));
        assert!(config.args.iter().any(|arg| arg.contains("{media_dir}")));
    }

    #[tokio::test]
    async fn test_worker_reports_metadata_then_finished() {
        // ARRANGE: the script prints three metadata lines plus trailing noise
        let downloader = sh_downloader(
            "printf 'Song Title\\nThe Artist\\n215\\n'; echo \"downloading $0\"; exit 0",
        );
        let (mut requests, request_rx) = tokio::io::duplex(4096);
        let (response_tx, mut responses) = tokio::io::duplex(4096);
        let worker = tokio::spawn(worker_loop(0, request_rx, response_tx, downloader));

        // ACT
        write_message(
            &mut requests,
            &WorkerMessage::Request {
                url: "http://a".to_string(),
            },
        )
        .await
        .unwrap();

        // ASSERT
        assert_eq!(
            next_frame(&mut responses).await,
            WorkerMessage::Metadata {
                payload: "Song Title\nThe Artist\n215\nhttp://a".to_string()
            }
        );
        assert_eq!(
            next_frame(&mut responses).await,
            WorkerMessage::Finished {
                url: "http://a".to_string()
            }
        );

        // ACT: SHUTDOWN ends the loop
        write_message(&mut requests, &WorkerMessage::Shutdown)
            .await
            .unwrap();
        tokio::time::timeout(WAIT, worker).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_worker_keeps_metadata_with_malformed_utf8() {
        // ARRANGE: \351 is a lone Latin-1 byte, not valid UTF-8
        let downloader = sh_downloader("printf 'Caf\\351 Song\\nArtist\\n200\\n'; exit 0");
        let (mut requests, request_rx) = tokio::io::duplex(4096);
        let (response_tx, mut responses) = tokio::io::duplex(4096);
        tokio::spawn(worker_loop(0, request_rx, response_tx, downloader));

        // ACT
        write_message(
            &mut requests,
            &WorkerMessage::Request {
                url: "http://a".to_string(),
            },
        )
        .await
        .unwrap();

        // ASSERT: the bad byte is replaced and the block still reaches the coordinator
        assert_eq!(
            next_frame(&mut responses).await,
            WorkerMessage::Metadata {
                payload: "Caf\u{FFFD} Song\nArtist\n200\nhttp://a".to_string()
            }
        );
        assert_eq!(
            next_frame(&mut responses).await,
            WorkerMessage::Finished {
                url: "http://a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_worker_reports_failed_exit_status() {
        let downloader = sh_downloader("exit 3");
        let (mut requests, request_rx) = tokio::io::duplex(4096);
        let (response_tx, mut responses) = tokio::io::duplex(4096);
        tokio::spawn(worker_loop(0, request_rx, response_tx, downloader));

        write_message(
            &mut requests,
            &WorkerMessage::Request {
                url: "http://broken".to_string(),
            },
        )
        .await
        .unwrap();

        // No metadata was printed, so the first frame is the failure
        assert_eq!(
            next_frame(&mut responses).await,
            WorkerMessage::Failed {
                url: "http://broken".to_string(),
                status: "exit 3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_worker_reports_missing_downloader() {
        let config = DownloaderConfig {
            program: "/nonexistent/song-catalog-downloader".to_string(),
            args: vec!["{url}".to_string()],
            metadata_lines: 3,
        };
        let downloader = Downloader::new(config, std::env::temp_dir());
        let (mut requests, request_rx) = tokio::io::duplex(4096);
        let (response_tx, mut responses) = tokio::io::duplex(4096);
        tokio::spawn(worker_loop(0, request_rx, response_tx, downloader));

        write_message(
            &mut requests,
            &WorkerMessage::Request {
                url: "http://a".to_string(),
            },
        )
        .await
        .unwrap();

        match next_frame(&mut responses).await {
            WorkerMessage::Failed { url, status } => {
                assert_eq!(url, "http://a");
                assert!(status.starts_with("spawn failed"));
            }
            other => panic!("expected FAILED, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_exits_when_request_channel_closes() {
        let downloader = sh_downloader("exit 0");
        let (requests, request_rx) = tokio::io::duplex(4096);
        let (response_tx, _responses) = tokio::io::duplex(4096);
        let worker = tokio::spawn(worker_loop(0, request_rx, response_tx, downloader));

        drop(requests);

        tokio::time::timeout(WAIT, worker).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_spawned_pool_delivers_worker_events() {
        // ARRANGE
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let downloader = sh_downloader("printf 'Clocks\\nColdplay\\n307\\n'");
        let mut scheduler = JobScheduler::spawn(2, downloader, events_tx);
        let (handle, _rx) = client(1);
        assert_eq!(scheduler.worker_count(), 2);

        // ACT
        scheduler.submit_download("http://clocks", handle).await;

        // ASSERT: metadata then completion, both from worker 0
        let first = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(
            first,
            WorkerEvent::Message {
                worker: 0,
                message: WorkerMessage::Metadata {
                    payload: "Clocks\nColdplay\n307\nhttp://clocks".to_string()
                }
            }
        );
        let second = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(
            second,
            WorkerEvent::Message {
                worker: 0,
                message: WorkerMessage::Finished {
                    url: "http://clocks".to_string()
                }
            }
        );

        assert!(scheduler.complete(0).is_some());
        scheduler.shutdown().await;

        // Workers leave their loops and the forwarders report closure
        let mut closed = Vec::new();
        while closed.len() < 2 {
            match tokio::time::timeout(WAIT, events.recv()).await.unwrap() {
                Some(WorkerEvent::Closed { worker }) => closed.push(worker),
                Some(other) => panic!("unexpected event {:?}", other),
                None => break,
            }
        }
        closed.sort();
        assert_eq!(closed, vec![0, 1]);
    }
}
