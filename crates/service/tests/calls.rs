//! End-to-end call tests: chunk frames and envelopes in, replies out,
//! memory-backed tiers underneath.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use filedepot_protocol::constants::{
    ERR_CODE_BAD_REQUEST, ERR_CODE_EMPTY_UPLOAD, ERR_CODE_NAME_MISMATCH, ERR_CODE_NOT_FOUND,
    ERR_CODE_PERSIST_FAILED, MessageType,
};
use filedepot_protocol::envelope::Message;
use filedepot_protocol::frame::{ChunkHeader, parse_chunk_frame};
use filedepot_protocol::messages::{DeleteRequest, DownloadDone, DownloadRequest, MetadataRequest, UploadAck};
use filedepot_protocol::types::{ObjectInfo, TierOfRecord};
use filedepot_server::{Handler, Outbound, Sender};
use filedepot_service::TransferService;
use filedepot_store::{MemoryTier, StorageTier, TieredStore};
use filedepot_transfer::checksum_bytes;

struct Fixture {
    service: TransferService,
    primary: Arc<MemoryTier>,
    fallback: Arc<MemoryTier>,
    sender: Sender,
    rx: mpsc::Receiver<Outbound>,
}

fn fixture() -> Fixture {
    let primary = Arc::new(MemoryTier::new("object-store"));
    let fallback = Arc::new(MemoryTier::new("local-disk"));
    let store = TieredStore::new(
        Arc::clone(&primary) as Arc<dyn StorageTier>,
        Arc::clone(&fallback) as Arc<dyn StorageTier>,
    );
    let service = TransferService::new(Arc::new(store)).with_chunk_size(4);
    let (sender, rx) = Sender::channel("conn-test");
    Fixture {
        service,
        primary,
        fallback,
        sender,
        rx,
    }
}

async fn recv_frame(rx: &mut mpsc::Receiver<Outbound>) -> Outbound {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("channel closed")
}

async fn recv_text(rx: &mut mpsc::Receiver<Outbound>) -> Message {
    match recv_frame(rx).await {
        Outbound::Text(json) => serde_json::from_str(&json).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn send_chunk(fx: &Fixture, id: &str, name: &str, payload: &[u8]) {
    let header = ChunkHeader {
        id: id.into(),
        name: name.into(),
        checksum: String::new(),
    };
    fx.service
        .on_chunk(fx.sender.clone(), header, payload.to_vec())
        .await;
}

async fn end_upload(fx: &mut Fixture, id: &str) -> Message {
    let msg = Message::new::<()>(id, MessageType::UploadEnd, None).unwrap();
    fx.service.on_upload_end(fx.sender.clone(), msg).await;
    recv_text(&mut fx.rx).await
}

/// Drives a full download call and returns (body bytes, final message).
async fn run_download(fx: &mut Fixture, id: &str, name: &str) -> (Vec<u8>, Message) {
    let req = DownloadRequest { name: name.into() };
    let msg = Message::new(id, MessageType::Download, Some(&req)).unwrap();
    fx.service.on_download(fx.sender.clone(), msg).await;

    let mut body = Vec::new();
    loop {
        match recv_frame(&mut fx.rx).await {
            Outbound::Binary(frame) => {
                let (header, payload) = parse_chunk_frame(&frame).unwrap();
                assert_eq!(header.id, id);
                assert_eq!(header.name, name);
                assert_eq!(header.checksum, checksum_bytes(&payload));
                body.extend_from_slice(&payload);
            }
            Outbound::Text(json) => {
                return (body, serde_json::from_str(&json).unwrap());
            }
            Outbound::Pong(_) => continue,
        }
    }
}

#[tokio::test]
async fn upload_hello_world_lands_on_both_tiers() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "greeting.txt", b"Hello").await;
    send_chunk(&fx, "u1", "greeting.txt", b"World!").await;
    let reply = end_upload(&mut fx, "u1").await;

    assert_eq!(reply.msg_type, MessageType::UploadAck);
    let ack: UploadAck = reply.parse_payload().unwrap().unwrap();
    assert_eq!(ack.tier_of_record, TierOfRecord::Both);
    assert_eq!(ack.size, 11);

    assert_eq!(
        fx.primary.bytes("greeting.txt").await.unwrap(),
        b"HelloWorld!"
    );
    assert_eq!(
        fx.fallback.bytes("greeting.txt").await.unwrap(),
        b"HelloWorld!"
    );
}

#[tokio::test]
async fn upload_then_download_round_trips() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "greeting.txt", b"Hello").await;
    send_chunk(&fx, "u1", "greeting.txt", b"World!").await;
    end_upload(&mut fx, "u1").await;

    let (body, done) = run_download(&mut fx, "d1", "greeting.txt").await;
    assert_eq!(body, b"HelloWorld!");
    assert_eq!(done.msg_type, MessageType::DownloadDone);
    let done: DownloadDone = done.parse_payload().unwrap().unwrap();
    assert_eq!(done.size, 11);
}

#[tokio::test]
async fn round_trip_law_over_arbitrary_chunkings() {
    let data: Vec<u8> = (0u8..=255).cycle().take(777).collect();
    let chunkings: &[&[usize]] = &[
        &[777],
        &[1, 776],
        &[100, 0, 300, 0, 377],
        &[256, 256, 256, 9],
    ];

    for (i, sizes) in chunkings.iter().enumerate() {
        let mut fx = fixture();
        let id = format!("u{i}");

        let mut offset = 0;
        for &len in sizes.iter() {
            send_chunk(&fx, &id, "blob.bin", &data[offset..offset + len]).await;
            offset += len;
        }
        assert_eq!(offset, data.len());

        let reply = end_upload(&mut fx, &id).await;
        let ack: UploadAck = reply.parse_payload().unwrap().unwrap();
        assert_eq!(ack.size, data.len() as u64);

        let (body, _) = run_download(&mut fx, "d", "blob.bin").await;
        assert_eq!(body, data, "chunking {sizes:?} corrupted the round trip");
    }
}

#[tokio::test]
async fn metadata_after_put_reports_size_and_fresh_timestamp() {
    let mut fx = fixture();
    let start = chrono::Utc::now() - chrono::Duration::seconds(1);

    send_chunk(&fx, "u1", "report.pdf", &[0u8; 99]).await;
    end_upload(&mut fx, "u1").await;

    let req = MetadataRequest {
        name: "report.pdf".into(),
    };
    let msg = Message::new("m1", MessageType::GetMetadata, Some(&req)).unwrap();
    fx.service.on_get_metadata(fx.sender.clone(), msg).await;

    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.msg_type, MessageType::Metadata);
    let info: ObjectInfo = reply.parse_payload().unwrap().unwrap();
    assert_eq!(info.name, "report.pdf");
    assert_eq!(info.size, 99);
    assert!(info.last_modified >= start);
    assert!(!info.version.is_empty());
}

#[tokio::test]
async fn metadata_for_missing_object_is_not_found() {
    let mut fx = fixture();
    let req = MetadataRequest {
        name: "ghost.bin".into(),
    };
    let msg = Message::new("m1", MessageType::GetMetadata, Some(&req)).unwrap();
    fx.service.on_get_metadata(fx.sender.clone(), msg).await;

    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.msg_type, MessageType::Error);
    assert_eq!(reply.error.unwrap().code, ERR_CODE_NOT_FOUND);
}

#[tokio::test]
async fn primary_outage_still_accepts_uploads() {
    let mut fx = fixture();
    fx.primary.set_available(false);

    send_chunk(&fx, "u1", "resilient.bin", b"payload").await;
    let reply = end_upload(&mut fx, "u1").await;

    let ack: UploadAck = reply.parse_payload().unwrap().unwrap();
    assert_eq!(ack.tier_of_record, TierOfRecord::Fallback);

    // Reads come back from the fallback tier.
    let (body, _) = run_download(&mut fx, "d1", "resilient.bin").await;
    assert_eq!(body, b"payload");
}

#[tokio::test]
async fn both_tiers_down_fails_with_persist_failed() {
    let mut fx = fixture();
    fx.primary.set_available(false);
    fx.fallback.set_available(false);

    send_chunk(&fx, "u1", "doomed.bin", b"payload").await;
    let reply = end_upload(&mut fx, "u1").await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_PERSIST_FAILED);

    // No partial metadata is visible once the tiers recover.
    fx.primary.set_available(true);
    fx.fallback.set_available(true);
    let req = MetadataRequest {
        name: "doomed.bin".into(),
    };
    let msg = Message::new("m1", MessageType::GetMetadata, Some(&req)).unwrap();
    fx.service.on_get_metadata(fx.sender.clone(), msg).await;
    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_NOT_FOUND);
}

#[tokio::test]
async fn name_mismatch_fails_call_and_persists_nothing() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "a.txt", b"Hello").await;
    send_chunk(&fx, "u1", "b.txt", b"World").await;

    // The offending chunk is answered immediately.
    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.id, "u1");
    assert_eq!(reply.error.as_ref().unwrap().code, ERR_CODE_NAME_MISMATCH);

    // Later chunks are ignored, and the end reports the same failure.
    send_chunk(&fx, "u1", "a.txt", b"more").await;
    let reply = end_upload(&mut fx, "u1").await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_NAME_MISMATCH);

    assert!(fx.primary.is_empty().await);
    assert!(fx.fallback.is_empty().await);
}

#[tokio::test]
async fn empty_upload_stream_is_rejected() {
    let mut fx = fixture();
    let reply = end_upload(&mut fx, "u1").await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_EMPTY_UPLOAD);
}

#[tokio::test]
async fn zero_byte_file_uploads_as_one_empty_chunk() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "empty.bin", b"").await;
    let reply = end_upload(&mut fx, "u1").await;

    let ack: UploadAck = reply.parse_payload().unwrap().unwrap();
    assert_eq!(ack.size, 0);
    assert_eq!(fx.primary.bytes("empty.bin").await.unwrap(), b"");

    // Downloading it yields no chunk frames, just the completion.
    let (body, done) = run_download(&mut fx, "d1", "empty.bin").await;
    assert!(body.is_empty());
    let done: DownloadDone = done.parse_payload().unwrap().unwrap();
    assert_eq!(done.size, 0);
}

#[tokio::test]
async fn invalid_name_rejected_on_first_chunk() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "../escape", b"evil").await;
    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_BAD_REQUEST);

    let reply = end_upload(&mut fx, "u1").await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_BAD_REQUEST);
    assert!(fx.primary.is_empty().await);
    assert!(fx.fallback.is_empty().await);
}

#[tokio::test]
async fn checksummed_chunks_verified() {
    let mut fx = fixture();

    let good = ChunkHeader {
        id: "u1".into(),
        name: "sum.bin".into(),
        checksum: checksum_bytes(b"payload"),
    };
    fx.service
        .on_chunk(fx.sender.clone(), good, b"payload".to_vec())
        .await;
    let reply = end_upload(&mut fx, "u1").await;
    assert_eq!(reply.msg_type, MessageType::UploadAck);

    // A tampered payload is rejected.
    let bad = ChunkHeader {
        id: "u2".into(),
        name: "sum2.bin".into(),
        checksum: checksum_bytes(b"payload"),
    };
    fx.service
        .on_chunk(fx.sender.clone(), bad, b"tampered".to_vec())
        .await;
    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_BAD_REQUEST);
}

#[tokio::test]
async fn cancel_discards_upload_without_persisting() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "wip.bin", b"half-done").await;
    let msg = Message::new::<()>("u1", MessageType::UploadCancel, None).unwrap();
    fx.service.on_upload_cancel(fx.sender.clone(), msg).await;

    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.msg_type, MessageType::CancelAck);
    assert!(fx.primary.is_empty().await);
    assert!(fx.fallback.is_empty().await);

    // The call is gone: ending it now reads as an empty stream.
    let reply = end_upload(&mut fx, "u1").await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_EMPTY_UPLOAD);
}

#[tokio::test]
async fn disconnect_drops_in_flight_uploads() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "orphan.bin", b"data").await;
    fx.service
        .on_client_disconnected(fx.sender.conn_id().to_string())
        .await;

    assert!(fx.primary.is_empty().await);
    assert!(fx.fallback.is_empty().await);

    let reply = end_upload(&mut fx, "u1").await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_EMPTY_UPLOAD);
}

#[tokio::test]
async fn concurrent_calls_on_one_connection_stay_separate() {
    let mut fx = fixture();

    // Two interleaved uploads under different call ids.
    send_chunk(&fx, "u1", "first.bin", b"AAA").await;
    send_chunk(&fx, "u2", "second.bin", b"BBB").await;
    send_chunk(&fx, "u1", "first.bin", b"aaa").await;
    send_chunk(&fx, "u2", "second.bin", b"bbb").await;

    let reply = end_upload(&mut fx, "u1").await;
    let ack: UploadAck = reply.parse_payload().unwrap().unwrap();
    assert_eq!(ack.size, 6);

    let reply = end_upload(&mut fx, "u2").await;
    let ack: UploadAck = reply.parse_payload().unwrap().unwrap();
    assert_eq!(ack.size, 6);

    assert_eq!(fx.primary.bytes("first.bin").await.unwrap(), b"AAAaaa");
    assert_eq!(fx.primary.bytes("second.bin").await.unwrap(), b"BBBbbb");
}

#[tokio::test]
async fn download_missing_object_fails_fast_without_bytes() {
    let mut fx = fixture();

    let req = DownloadRequest {
        name: "ghost.bin".into(),
    };
    let msg = Message::new("d1", MessageType::Download, Some(&req)).unwrap();
    fx.service.on_download(fx.sender.clone(), msg).await;

    // The very first frame is the failure; no chunk precedes it.
    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_NOT_FOUND);
}

#[tokio::test]
async fn delete_then_second_delete_not_found() {
    let mut fx = fixture();

    send_chunk(&fx, "u1", "gone.bin", b"bytes").await;
    end_upload(&mut fx, "u1").await;

    let req = DeleteRequest {
        name: "gone.bin".into(),
    };
    let msg = Message::new("del1", MessageType::Delete, Some(&req)).unwrap();
    fx.service.on_delete(fx.sender.clone(), msg).await;
    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.msg_type, MessageType::DeleteAck);

    let msg = Message::new("del2", MessageType::Delete, Some(&req)).unwrap();
    fx.service.on_delete(fx.sender.clone(), msg).await;
    let reply = recv_text(&mut fx.rx).await;
    assert_eq!(reply.error.unwrap().code, ERR_CODE_NOT_FOUND);
}

#[tokio::test]
async fn download_rechunks_with_configured_bound() {
    let mut fx = fixture(); // chunk_size = 4

    send_chunk(&fx, "u1", "ten.bin", b"0123456789").await;
    end_upload(&mut fx, "u1").await;

    let req = DownloadRequest {
        name: "ten.bin".into(),
    };
    let msg = Message::new("d1", MessageType::Download, Some(&req)).unwrap();
    fx.service.on_download(fx.sender.clone(), msg).await;

    let mut sizes = Vec::new();
    loop {
        match recv_frame(&mut fx.rx).await {
            Outbound::Binary(frame) => {
                let (_, payload) = parse_chunk_frame(&frame).unwrap();
                sizes.push(payload.len());
            }
            Outbound::Text(_) => break,
            Outbound::Pong(_) => continue,
        }
    }
    assert_eq!(sizes, vec![4, 4, 2]);
}
