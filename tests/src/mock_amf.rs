//! Mock AMF for integration testing
//!
//! Answers NG Setup and otherwise only records what the CU-CP sends; tests
//! script every other AMF message themselves.

use std::sync::Arc;

use cucp::ngap;
use cucp::{AmfHandle, CuCpContext};
use cucp_ngap::{decode_ngap_pdu, encode_ngap_pdu, NgapPdu};
use cucp_sctp::{loopback_pair, ChannelConfig, LoopbackLink, TransportChannel, NGAP_PPID};
use tokio::time::timeout;

use crate::test_fixtures::ng_setup_response;
use crate::test_utils::{DEFAULT_TEST_TIMEOUT, SILENCE_WINDOW};

/// Name the mock AMF announces in NG Setup Response
pub const MOCK_AMF_NAME: &str = "amf-test";

/// AMF end of an N2 association
pub struct MockAmf {
    channel: Arc<TransportChannel>,
}

impl MockAmf {
    pub fn new(link: LoopbackLink) -> Self {
        Self {
            channel: TransportChannel::new(Arc::new(link), ChannelConfig::new(NGAP_PPID)),
        }
    }

    /// Opens an association to `ctx`, answers its NG Setup Request and
    /// returns the registered AMF.
    pub async fn attach(ctx: &Arc<CuCpContext>, relative_capacity: u8) -> (Self, Arc<AmfHandle>) {
        let (cu_end, amf_end) = loopback_pair(2);
        let mock = Self::new(amf_end);

        let establish = tokio::spawn({
            let ctx = Arc::clone(ctx);
            async move { ngap::establish(&ctx, Arc::new(cu_end)).await }
        });

        match mock.recv().await {
            NgapPdu::NgSetupRequest(request) => {
                assert_eq!(request.ran_node_name.as_deref(), Some("cu-test"));
            }
            other => panic!("expected NG Setup Request, got {}", other.name()),
        }
        mock.send(&NgapPdu::NgSetupResponse(ng_setup_response(
            MOCK_AMF_NAME,
            relative_capacity,
        )));

        let amf = establish
            .await
            .expect("NG Setup task panicked")
            .expect("NG Setup failed");
        (mock, amf)
    }

    pub fn send(&self, pdu: &NgapPdu) {
        self.channel.send(encode_ngap_pdu(pdu));
    }

    /// Next NGAP message from the CU-CP. Panics on timeout or closed association.
    pub async fn recv(&self) -> NgapPdu {
        let msg = timeout(DEFAULT_TEST_TIMEOUT, self.channel.recv())
            .await
            .expect("no NGAP message from the CU-CP")
            .expect("N2 association closed");
        decode_ngap_pdu(&msg.data).expect("CU-CP sent an undecodable NGAP PDU")
    }

    /// Asserts the CU-CP sends nothing for a short while.
    pub async fn assert_silent(&self) {
        if let Ok(Some(msg)) = timeout(SILENCE_WINDOW, self.channel.recv()).await {
            let name = decode_ngap_pdu(&msg.data)
                .map(|pdu| pdu.name())
                .unwrap_or("undecodable PDU");
            panic!("unexpected NGAP message: {name}");
        }
    }

    /// Drops the association.
    pub async fn disconnect(&self) {
        self.channel.close().await;
    }
}
