//! End-to-end round trips over `tokio::io::duplex`: both state machines
//! driven together with no socket involved, covering the paths a unit test
//! scoped to one side can't exercise (the peer actually has to answer).

use tempfile::tempdir;
use transfer::{Download, TransferConfig, Upload, UploadStatus, UserChoice};

#[tokio::test]
async fn full_upload_completes_when_peer_accepts() {
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();
    std::fs::write(src_dir.path().join("a.txt"), vec![0x41u8; 20_000]).unwrap();
    std::fs::write(src_dir.path().join("b.txt"), vec![0x42u8; 5_000]).unwrap();

    let mut upload = Upload::new("alice".into(), TransferConfig::default());
    upload.set_payload(src_dir.path()).await.unwrap();

    let download = Download::new(TransferConfig::default());

    let (client, server) = tokio::io::duplex(4096);
    let (upload, download) = tokio::join!(
        upload.run(client),
        download.run_auto_accept(server, dst_dir.path().to_path_buf()),
    );

    let upload = upload.unwrap();
    let download = download.unwrap();

    assert_eq!(*upload.status(), UploadStatus::Completed);
    assert!(download.notifier().is_some());

    let payload_name = src_dir.path().file_name().unwrap();
    assert_eq!(
        std::fs::read(dst_dir.path().join(payload_name).join("a.txt")).unwrap(),
        vec![0x41u8; 20_000]
    );
    assert_eq!(
        std::fs::read(dst_dir.path().join(payload_name).join("b.txt")).unwrap(),
        vec![0x42u8; 5_000]
    );
}

#[tokio::test]
async fn caller_sees_manifest_before_deciding() {
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();
    std::fs::write(src_dir.path().join("note.txt"), b"hello").unwrap();

    let mut upload = Upload::new("bob".into(), TransferConfig::default());
    upload.set_payload(src_dir.path()).await.unwrap();

    let mut download = Download::new(TransferConfig::default());

    let (client, server) = tokio::io::duplex(4096);
    let upload_task = tokio::spawn(upload.run(client));

    let pending = download.wait_for_offer(server).await.unwrap();
    assert_eq!(pending.manifest().files.len(), 1);
    assert_eq!(pending.manifest().total_size, 5);
    assert_eq!(download.peer_username(), Some("bob"));

    let download = download
        .give_user_choice(pending, UserChoice::Accept, dst_dir.path().to_path_buf())
        .await
        .unwrap();

    upload_task.await.unwrap().unwrap();
    assert!(download.notifier().is_some());
}

#[tokio::test]
async fn rejecting_leaves_no_files_behind() {
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();
    std::fs::write(src_dir.path().join("secret.txt"), b"nope").unwrap();

    let mut upload = Upload::new("carol".into(), TransferConfig::default());
    upload.set_payload(src_dir.path()).await.unwrap();

    let mut download = Download::new(TransferConfig::default());

    let (client, server) = tokio::io::duplex(4096);
    let upload_task = tokio::spawn(upload.run(client));

    let pending = download.wait_for_offer(server).await.unwrap();
    let download = download
        .give_user_choice(pending, UserChoice::Reject, dst_dir.path().to_path_buf())
        .await
        .unwrap();

    let upload = upload_task.await.unwrap().unwrap();
    assert_eq!(*upload.status(), UploadStatus::Rejected);
    assert_eq!(*download.status(), transfer::DownloadStatus::Rejected);

    let entries: Vec<_> = std::fs::read_dir(dst_dir.path()).unwrap().collect();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn zero_byte_file_completes_without_ever_sending_a_chunk() {
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();
    std::fs::write(src_dir.path().join("empty.bin"), b"").unwrap();

    let mut upload = Upload::new("dave".into(), TransferConfig::default());
    upload.set_payload(src_dir.path()).await.unwrap();
    let download = Download::new(TransferConfig::default());

    let (client, server) = tokio::io::duplex(4096);
    let (upload, download) = tokio::join!(
        upload.run(client),
        download.run_auto_accept(server, dst_dir.path().to_path_buf()),
    );

    let upload = upload.unwrap();
    let _download = download.unwrap();
    assert_eq!(*upload.status(), UploadStatus::Completed);

    let payload_name = src_dir.path().file_name().unwrap();
    assert_eq!(
        std::fs::read(dst_dir.path().join(payload_name).join("empty.bin")).unwrap(),
        b""
    );
}
