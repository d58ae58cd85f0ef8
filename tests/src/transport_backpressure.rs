//! Transport channel backpressure tests
//!
//! The inbound queue is sized from `tunables.inbound_queue_capacity`. When the
//! consumer falls behind, the newest messages are dropped and counted while
//! everything already queued is delivered in order.

use std::sync::Arc;

use bytes::Bytes;
use cucp::CuCpContext;
use cucp_f1ap::F1apPdu;
use cucp_sctp::{loopback_pair, Link, TransportChannel, F1AP_PPID, NGAP_PPID};
use integration_tests::{f1_setup_request, init_test_logging, test_config, wait_until, TestCuCp};
use rand::Rng;

fn random_payloads(count: usize) -> Vec<Bytes> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let mut payload = (i as u32).to_be_bytes().to_vec();
            let tail: [u8; 12] = rng.gen();
            payload.extend_from_slice(&tail);
            Bytes::from(payload)
        })
        .collect()
}

#[tokio::test]
async fn test_overflow_drops_newest_message() {
    init_test_logging();
    let ctx = CuCpContext::new(&test_config()).unwrap();
    let capacity = ctx.tunables().inbound_queue_capacity;

    let (local, remote) = loopback_pair(2);
    let channel = TransportChannel::new(Arc::new(local), ctx.channel_config(F1AP_PPID));

    let payloads = random_payloads(capacity + 1);
    for payload in &payloads {
        remote.send(0, F1AP_PPID, payload.clone()).await.unwrap();
    }
    wait_until(|| channel.dropped_count() == 1)
        .await
        .expect("one message dropped");

    for expected in &payloads[..capacity] {
        let msg = channel.recv().await.unwrap();
        assert_eq!(&msg.data, expected);
    }

    // Once drained, the queue accepts traffic again.
    let late = Bytes::from_static(b"late");
    remote.send(1, F1AP_PPID, late.clone()).await.unwrap();
    assert_eq!(channel.recv().await.unwrap().data, late);
    assert_eq!(channel.dropped_count(), 1);

    channel.close().await;
}

#[tokio::test]
async fn test_foreign_ppid_is_not_queued() {
    init_test_logging();
    let ctx = CuCpContext::new(&test_config()).unwrap();

    let (local, remote) = loopback_pair(1);
    let channel = TransportChannel::new(Arc::new(local), ctx.channel_config(F1AP_PPID));

    remote.send(0, NGAP_PPID, Bytes::from_static(b"n2")).await.unwrap();
    remote.send(0, F1AP_PPID, Bytes::from_static(b"f1")).await.unwrap();

    let msg = channel.recv().await.unwrap();
    assert_eq!(msg.data, Bytes::from_static(b"f1"));
    assert_eq!(msg.ppid, F1AP_PPID);
    assert_eq!(channel.dropped_count(), 0);

    channel.close().await;
}

#[tokio::test]
async fn test_router_survives_undecodable_pdus() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();

    for garbage in random_payloads(8) {
        du.send_raw(garbage);
    }
    assert!(matches!(
        du.f1_setup(f1_setup_request(7, 1)).await,
        F1apPdu::F1SetupResponse(_)
    ));
    assert_eq!(cu.ctx.dus.len(), 1);

    cu.shutdown().await;
}
