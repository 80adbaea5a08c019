mod helpers;

use bytes::Bytes;
use helpers::*;
use intake_core::{FileStatus, IntakeConfig, ToastVariant};
use intake_processing::ImageCompressor;
use intake_storage::LocalStorage;
use intake_uploader::{BatchSnapshot, SelectedFile, UploadError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_mixed_outcomes_report_successes_to_host() {
    let storage = MemoryStorage::new();
    storage.fail_on("b.txt", "network error");
    let notifier = RecordingNotifier::new();
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        Arc::new(ImageCompressor::default()),
        notifier.clone(),
        host.clone(),
    );

    let handle = uploader
        .select_files(vec![
            text_file("a.txt", 10),
            text_file("b.txt", 10),
            text_file("c.txt", 10),
        ])
        .unwrap();
    let ids = handle.ids().to_vec();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.done, vec![ids[0].clone(), ids[2].clone()]);
    assert_eq!(report.failed, vec![ids[1].clone()]);
    assert!(report.vanished.is_empty());

    let calls = host.calls();
    assert_eq!(calls.len(), 1);
    let names: Vec<&str> = calls[0].iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "c.txt"]);
    assert!(calls[0].iter().all(|f| f.url.starts_with(BASE_URL)));

    let b = uploader.entry(&ids[1]).unwrap();
    assert_eq!(b.status(), FileStatus::Error);
    assert_eq!(b.error(), Some("network error"));
    assert!(b.url().is_none());
    assert!(notifier.destructive().is_empty());
}

#[tokio::test]
async fn test_capacity_rejects_whole_selection() {
    let notifier = RecordingNotifier::new();
    let host = RecordingHost::new();
    let uploader = uploader(
        &config(2),
        MemoryStorage::new(),
        Arc::new(ImageCompressor::default()),
        notifier.clone(),
        host.clone(),
    );

    uploader
        .select_files(vec![text_file("first.txt", 5)])
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(uploader.entries()[0].status(), FileStatus::Done);

    let result = uploader.select_files(vec![text_file("x.txt", 5), text_file("y.txt", 5)]);

    match result {
        Err(UploadError::CapacityExceeded(e)) => {
            assert_eq!(e.current, 1);
            assert_eq!(e.incoming, 2);
            assert_eq!(e.max_files, 2);
        }
        other => panic!("expected capacity rejection, got {:?}", other.map(|h| h.ids().to_vec())),
    }

    let destructive = notifier.destructive();
    assert_eq!(destructive.len(), 1);
    assert_eq!(destructive[0].variant, ToastVariant::Destructive);
    assert!(destructive[0].description.contains("maximum of 2"));
    assert_eq!(uploader.entries().len(), 1);
    assert_eq!(host.calls().len(), 1);
}

#[tokio::test]
async fn test_capacity_counts_raw_selection_before_validation() {
    let notifier = RecordingNotifier::new();
    let config = IntakeConfig {
        max_files: 2,
        accepted_content_types: vec!["image/*".to_string()],
        ..IntakeConfig::default()
    };
    let uploader = uploader(
        &config,
        MemoryStorage::new(),
        Arc::new(ImageCompressor::default()),
        notifier.clone(),
        RecordingHost::new(),
    );

    // Two of the three would fail validation, but the selection is still too big.
    let result = uploader.select_files(vec![
        SelectedFile::new("a.png", "image/png", vec![1u8; 10]),
        text_file("b.txt", 10),
        text_file("c.txt", 10),
    ]);

    assert!(matches!(result, Err(UploadError::CapacityExceeded(_))));
    assert_eq!(notifier.destructive().len(), 1);
    assert!(uploader.entries().is_empty());
}

#[tokio::test]
async fn test_removed_entry_ignores_late_completion() {
    let storage = MemoryStorage::new();
    let gate = storage.hold("b.txt");
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        Arc::new(ImageCompressor::default()),
        RecordingNotifier::new(),
        host.clone(),
    );

    let handle = uploader
        .select_files(vec![
            text_file("a.txt", 10),
            text_file("b.txt", 10),
            text_file("c.txt", 10),
        ])
        .unwrap();
    let b_id = handle.ids()[1].clone();

    let mut rx = uploader.subscribe();
    rx.wait_for(|snapshot| {
        snapshot
            .iter()
            .any(|e| e.id() == b_id && e.status() == FileStatus::Uploading)
    })
    .await
    .unwrap();

    assert!(uploader.remove(&b_id));
    assert!(!uploader.remove(&b_id));
    let after_remove = host.last().unwrap();
    assert!(after_remove.iter().all(|f| f.name != "b.txt"));

    gate.notify_one();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.vanished, vec![b_id.clone()]);
    assert!(uploader.entry(&b_id).is_none());
    assert_eq!(uploader.entries().len(), 2);

    let last = host.last().unwrap();
    let names: Vec<&str> = last.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "c.txt"]);

    // Removal does not cancel the transfer itself.
    assert_eq!(storage.object_count(), 3);
}

#[tokio::test]
async fn test_removal_frees_capacity() {
    let uploader = uploader(
        &config(1),
        MemoryStorage::new(),
        Arc::new(ImageCompressor::default()),
        RecordingNotifier::new(),
        RecordingHost::new(),
    );

    let handle = uploader.select_files(vec![text_file("a.txt", 3)]).unwrap();
    let id = handle.ids()[0].clone();
    handle.wait().await.unwrap();
    assert!(uploader.select_files(vec![text_file("b.txt", 3)]).is_err());

    assert!(uploader.remove(&id));
    let report = uploader
        .select_files(vec![text_file("b.txt", 3)])
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(report.done.len(), 1);
}

#[tokio::test]
async fn test_large_image_is_compressed_before_upload() {
    let storage = MemoryStorage::new();
    let notifier = RecordingNotifier::new();
    let host = RecordingHost::new();
    let compressor = CountingCompressor::new(ImageCompressor::default());
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        compressor.clone(),
        notifier.clone(),
        host.clone(),
    );

    let jpeg = noisy_jpeg(1200, 900);
    let original_size = jpeg.len() as u64;
    assert!(original_size > 500 * 1024);

    uploader
        .select_files(vec![
            SelectedFile::new("photo.jpg", "image/jpeg", jpeg),
            text_file("notes.txt", 2048),
        ])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(compressor.calls(), 1);

    let files = host.last().unwrap();
    let photo = files.iter().find(|f| f.name == "photo.jpg").unwrap();
    let compressed = photo.compressed_size.unwrap();
    assert!(compressed <= original_size);
    assert!(compressed <= 5 * 1024 * 1024);
    assert_eq!(photo.original_size, original_size);
    assert_eq!(
        storage.stored("photo.jpg").unwrap().len() as u64,
        compressed
    );

    let notes = files.iter().find(|f| f.name == "notes.txt").unwrap();
    assert_eq!(notes.compressed_size, None);

    let info: Vec<_> = notifier
        .toasts()
        .into_iter()
        .filter(|t| t.variant == ToastVariant::Default)
        .collect();
    assert_eq!(info.len(), 1);
    assert!(info[0].description.contains("photo.jpg"));
}

#[tokio::test]
async fn test_compressed_content_type_is_forwarded() {
    let storage = MemoryStorage::new();
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        StaticCompressor::new(b"webp bytes", "image/webp", 4096),
        RecordingNotifier::new(),
        host.clone(),
    );

    uploader
        .select_files(vec![
            SelectedFile::new("scan.png", "image/png", vec![3u8; 4096]),
            text_file("notes.txt", 10),
        ])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(storage.content_type("scan.png").as_deref(), Some("image/webp"));
    assert_eq!(storage.stored("scan.png").unwrap(), Bytes::from_static(b"webp bytes"));
    assert_eq!(storage.content_type("notes.txt").as_deref(), Some("text/plain"));
    let scan = &host.last().unwrap()[0];
    assert_eq!(scan.compressed_size, Some(10));
}

#[tokio::test]
async fn test_compression_without_gain_sends_no_toast() {
    const ORIGINAL: &[u8] = b"already tight";
    let storage = MemoryStorage::new();
    let notifier = RecordingNotifier::new();
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        StaticCompressor::new(ORIGINAL, "image/jpeg", ORIGINAL.len() as u64),
        notifier.clone(),
        host.clone(),
    );

    uploader
        .select_files(vec![SelectedFile::new("tight.jpg", "image/jpeg", ORIGINAL)])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(notifier.toasts().is_empty());
    let tight = &host.last().unwrap()[0];
    assert_eq!(tight.compressed_size, Some(ORIGINAL.len() as u64));
    assert_eq!(storage.stored("tight.jpg").unwrap(), Bytes::from_static(ORIGINAL));
}

#[tokio::test]
async fn test_small_image_skips_compression() {
    let compressor = CountingCompressor::new(ImageCompressor::default());
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        MemoryStorage::new(),
        compressor.clone(),
        RecordingNotifier::new(),
        host.clone(),
    );

    uploader
        .select_files(vec![SelectedFile::new(
            "icon.png",
            "image/png",
            vec![7u8; 400 * 1024],
        )])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(compressor.calls(), 0);
    assert_eq!(host.last().unwrap()[0].compressed_size, None);
}

#[tokio::test]
async fn test_compression_failure_uploads_original() {
    let storage = MemoryStorage::new();
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        Arc::new(FailingCompressor::decode_error()),
        RecordingNotifier::new(),
        host.clone(),
    );

    let data = Bytes::from(vec![0xAB; 2 * 1024 * 1024]);
    let handle = uploader
        .select_files(vec![SelectedFile::new("scan.jpg", "image/jpeg", data.clone())])
        .unwrap();
    let id = handle.ids()[0].clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.done, vec![id.clone()]);
    let entry = uploader.entry(&id).unwrap();
    assert_eq!(entry.status(), FileStatus::Done);
    assert_eq!(entry.compressed_size(), None);
    assert_eq!(entry.error(), None);
    assert_eq!(storage.stored("scan.jpg").unwrap(), data);
    assert_eq!(host.last().unwrap()[0].compressed_size, None);
}

#[tokio::test]
async fn test_compression_worker_crash_fails_entry() {
    let storage = MemoryStorage::new();
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        Arc::new(FailingCompressor::worker_crash()),
        RecordingNotifier::new(),
        host.clone(),
    );

    let handle = uploader
        .select_files(vec![
            SelectedFile::new("scan.jpg", "image/jpeg", vec![0xAB; 600 * 1024]),
            text_file("notes.txt", 10),
        ])
        .unwrap();
    let ids = handle.ids().to_vec();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.failed, vec![ids[0].clone()]);
    assert_eq!(report.done, vec![ids[1].clone()]);
    let scan = uploader.entry(&ids[0]).unwrap();
    assert_eq!(scan.status(), FileStatus::Error);
    assert!(scan.error().unwrap().contains("task panicked"));
    assert!(storage.stored("scan.jpg").is_none());
    assert_eq!(host.last().unwrap().len(), 1);
}

#[tokio::test]
async fn test_observed_states_respect_lifecycle() {
    let storage = MemoryStorage::new();
    storage.fail_on("b.txt", "network error");
    let uploader = uploader(
        &IntakeConfig::default(),
        storage,
        Arc::new(ImageCompressor::default()),
        RecordingNotifier::new(),
        RecordingHost::new(),
    );

    let seen: Arc<Mutex<Vec<BatchSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let mut rx = uploader.subscribe();
    let watcher = {
        let seen = seen.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                seen.lock().unwrap().push(snapshot);
            }
        })
    };

    uploader
        .select_files(vec![text_file("a.txt", 10), text_file("b.txt", 10)])
        .unwrap()
        .wait()
        .await
        .unwrap();
    watcher.abort();

    let mut snapshots = seen.lock().unwrap().clone();
    snapshots.push(uploader.entries());

    let rank = |status: FileStatus| match status {
        FileStatus::Pending => 0,
        FileStatus::Compressing => 1,
        FileStatus::Uploading => 2,
        FileStatus::Done | FileStatus::Error => 3,
    };
    let mut last_seen: HashMap<String, FileStatus> = HashMap::new();
    for snapshot in &snapshots {
        for entry in snapshot.iter() {
            match entry.status() {
                FileStatus::Done => assert!(entry.url().is_some() && entry.error().is_none()),
                FileStatus::Error => assert!(entry.error().is_some() && entry.url().is_none()),
                _ => assert!(entry.url().is_none() && entry.error().is_none()),
            }
            if let Some(previous) = last_seen.insert(entry.id().to_string(), entry.status()) {
                assert!(rank(previous) <= rank(entry.status()));
                if previous.is_terminal() {
                    assert_eq!(previous, entry.status());
                }
            }
        }
    }
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let uploader = uploader(
        &IntakeConfig::default(),
        MemoryStorage::new(),
        Arc::new(ImageCompressor::default()),
        RecordingNotifier::new(),
        RecordingHost::new(),
    );
    uploader
        .select_files(vec![text_file("a.txt", 10), text_file("b.txt", 20)])
        .unwrap()
        .wait()
        .await
        .unwrap();

    let first = uploader.aggregate();
    let second = uploader.aggregate();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);

    let json = serde_json::to_value(&first[0]).unwrap();
    assert_eq!(json["name"], "a.txt");
    assert_eq!(json["type"], "text/plain");
    assert_eq!(json["originalSize"], 10);
    assert!(json.get("compressedSize").is_none());
}

#[tokio::test]
async fn test_validation_drops_rejected_files_individually() {
    let notifier = RecordingNotifier::new();
    let config = IntakeConfig {
        accepted_content_types: vec!["image/*".to_string(), "application/pdf".to_string()],
        ..IntakeConfig::default()
    };
    let uploader = uploader(
        &config,
        MemoryStorage::new(),
        Arc::new(ImageCompressor::default()),
        notifier.clone(),
        RecordingHost::new(),
    );

    let handle = uploader
        .select_files(vec![
            SelectedFile::new("logo.png", "image/png", vec![1u8; 64]),
            text_file("notes.txt", 10),
            SelectedFile::new("brief.pdf", "application/pdf", vec![2u8; 64]),
            SelectedFile::new("empty.pdf", "application/pdf", Vec::new()),
        ])
        .unwrap();

    assert_eq!(handle.ids().len(), 3);
    let rejected = notifier.destructive();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].title, "File rejected");
    assert!(rejected[0].description.contains("notes.txt"));

    let report = handle.wait().await.unwrap();
    assert_eq!(report.done.len(), 3);

    let result = uploader.select_files(vec![text_file("other.txt", 10)]);
    assert!(matches!(result, Err(UploadError::NothingAccepted)));
    assert_eq!(uploader.entries().len(), 3);
}

#[tokio::test]
async fn test_empty_file_uploads_with_default_config() {
    let storage = MemoryStorage::new();
    let notifier = RecordingNotifier::new();
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        storage.clone(),
        Arc::new(ImageCompressor::default()),
        notifier.clone(),
        host.clone(),
    );

    let report = uploader
        .select_files(vec![text_file("empty.txt", 0)])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.done.len(), 1);
    assert!(notifier.toasts().is_empty());
    assert_eq!(storage.stored("empty.txt").unwrap().len(), 0);
    assert_eq!(host.last().unwrap()[0].original_size, 0);
}

#[tokio::test]
async fn test_duplicate_names_upload_to_distinct_objects() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path(), "http://localhost:3000/files".to_string())
        .await
        .unwrap()
        .with_chunk_size(2);
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        Arc::new(storage),
        Arc::new(ImageCompressor::default()),
        RecordingNotifier::new(),
        host.clone(),
    );

    let handle = uploader
        .select_files(vec![
            SelectedFile::new("photo.txt", "text/plain", b"first photo".to_vec()),
            SelectedFile::new("photo.txt", "text/plain", b"second, longer photo".to_vec()),
        ])
        .unwrap();
    let ids = handle.ids().to_vec();
    assert_ne!(ids[0], ids[1]);
    assert!(ids[0].starts_with("photo.txt-"));

    let report = handle.wait().await.unwrap();
    assert_eq!(report.done, ids);

    let files = host.last().unwrap();
    assert_eq!(files.len(), 2);
    assert_ne!(files[0].url, files[1].url);
    for (file, expected) in files.iter().zip([&b"first photo"[..], b"second, longer photo"]) {
        let key = file
            .url
            .strip_prefix("http://localhost:3000/files/")
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join(key)).unwrap(), expected);
    }
}

#[tokio::test]
async fn test_status_rows_follow_entries() {
    let storage = MemoryStorage::new();
    storage.fail_on("b.txt", "network error");
    let uploader = uploader(
        &IntakeConfig::default(),
        storage,
        Arc::new(ImageCompressor::default()),
        RecordingNotifier::new(),
        RecordingHost::new(),
    );

    let handle = uploader
        .select_files(vec![text_file("a.txt", 2048), text_file("b.txt", 10)])
        .unwrap();
    let pending = uploader.status_rows();
    assert_eq!(pending[0].badge, "Pending");
    assert_eq!(pending[0].size, "2.00 KB");
    assert_eq!(pending[0].progress, None);

    handle.wait().await.unwrap();
    let rows = uploader.status_rows();
    assert_eq!(rows[0].badge, "Uploaded");
    assert_eq!(rows[1].badge, "Failed");
    assert_eq!(rows[1].error.as_deref(), Some("network error"));
}

#[tokio::test]
async fn test_local_backend_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path(), "http://localhost:3000/files".to_string())
        .await
        .unwrap()
        .with_chunk_size(4);
    let host = RecordingHost::new();
    let uploader = uploader(
        &IntakeConfig::default(),
        Arc::new(storage),
        Arc::new(ImageCompressor::default()),
        RecordingNotifier::new(),
        host.clone(),
    );

    uploader
        .select_files(vec![SelectedFile::new(
            "brief v2.txt",
            "text/plain",
            b"hello local storage".to_vec(),
        )])
        .unwrap()
        .wait()
        .await
        .unwrap();

    let files = host.last().unwrap();
    let url = &files[0].url;
    let key = url
        .strip_prefix("http://localhost:3000/files/")
        .unwrap();
    assert!(key.starts_with("uploads/"));
    assert!(key.ends_with("_brief_v2.txt"));
    let written = std::fs::read(dir.path().join(key)).unwrap();
    assert_eq!(written, b"hello local storage");
}
