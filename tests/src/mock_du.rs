//! Mock gNB-DU for integration testing
//!
//! Each mock owns one F1 association served by a real DU router. Helpers wrap
//! RRC messages into the F1AP transfers a DU would send.

use std::sync::Arc;

use bytes::Bytes;
use cucp::f1::serve_du;
use cucp::CuCpContext;
use cucp_f1ap::{
    decode_f1ap_pdu, encode_f1ap_pdu, DlRrcMessageTransfer, F1SetupRequest, F1apPdu,
    InitialUlRrcMessageTransfer, UeContextSetupResponse, UlRrcMessageTransfer,
};
use cucp_common::NrCgi;
use cucp_rrc::{
    encode_rrc, EstablishmentCause, InitialUeIdentity, RrcSetupRequest, UlCcchMessage,
    UlDcchMessage,
};
use cucp_sctp::{loopback_pair, ChannelConfig, TransportChannel, F1AP_PPID};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::test_fixtures::{TEST_NCI, TEST_PLMN};
use crate::test_utils::{DEFAULT_TEST_TIMEOUT, SILENCE_WINDOW};

/// CellGroupConfig the mock DU reports for new UEs
pub const DU_CELL_GROUP: &[u8] = b"du-cell-group";

/// DU end of an F1 association
pub struct MockDu {
    channel: Arc<TransportChannel>,
    router: JoinHandle<()>,
}

impl MockDu {
    /// Opens an F1 association to `ctx` served by its own router task.
    pub fn attach(ctx: &Arc<CuCpContext>, shutdown: watch::Receiver<bool>) -> Self {
        let (cu_end, du_end) = loopback_pair(2);
        let router = tokio::spawn(serve_du(Arc::clone(ctx), Arc::new(cu_end), shutdown));
        Self {
            channel: TransportChannel::new(Arc::new(du_end), ChannelConfig::new(F1AP_PPID)),
            router,
        }
    }

    pub fn send(&self, pdu: &F1apPdu) {
        self.channel.send(encode_f1ap_pdu(pdu));
    }

    /// Sends bytes that need not be a valid F1AP PDU.
    pub fn send_raw(&self, data: Bytes) {
        self.channel.send(data);
    }

    /// Next F1AP message from the CU-CP. Panics on timeout or closed association.
    pub async fn recv(&self) -> F1apPdu {
        let msg = timeout(DEFAULT_TEST_TIMEOUT, self.channel.recv())
            .await
            .expect("no F1AP message from the CU-CP")
            .expect("F1 association closed");
        decode_f1ap_pdu(&msg.data).expect("CU-CP sent an undecodable F1AP PDU")
    }

    /// Sends `request` and returns the CU-CP's answer.
    pub async fn f1_setup(&self, request: F1SetupRequest) -> F1apPdu {
        self.send(&F1apPdu::F1SetupRequest(request));
        self.recv().await
    }

    pub async fn recv_dl_rrc(&self) -> DlRrcMessageTransfer {
        match self.recv().await {
            F1apPdu::DlRrcMessageTransfer(transfer) => transfer,
            other => panic!("expected DL RRC Message Transfer, got {}", other.name()),
        }
    }

    /// Initial UL RRC Message Transfer carrying an RRC Setup Request.
    pub fn send_rrc_setup_request(&self, du_ue_id: u32, ue_identity: InitialUeIdentity) {
        let request = UlCcchMessage::RrcSetupRequest(RrcSetupRequest {
            ue_identity,
            establishment_cause: EstablishmentCause::MoSignalling,
        });
        self.send(&F1apPdu::InitialUlRrcMessageTransfer(
            InitialUlRrcMessageTransfer {
                gnb_du_ue_f1ap_id: du_ue_id,
                nr_cgi: NrCgi::new(TEST_PLMN, TEST_NCI),
                c_rnti: 0x4600 + du_ue_id as u16,
                rrc_container: encode_rrc(&request),
                du_to_cu_rrc_container: Some(Bytes::from_static(DU_CELL_GROUP)),
            },
        ));
    }

    /// UL RRC Message Transfer on SRB1.
    pub fn send_ul_dcch(&self, cu_ue_id: u32, du_ue_id: u32, msg: &UlDcchMessage) {
        self.send_ul_rrc(1, cu_ue_id, du_ue_id, msg);
    }

    /// UL RRC Message Transfer on `srb_id`.
    pub fn send_ul_rrc(&self, srb_id: u8, cu_ue_id: u32, du_ue_id: u32, msg: &UlDcchMessage) {
        self.send(&F1apPdu::UlRrcMessageTransfer(UlRrcMessageTransfer {
            gnb_cu_ue_f1ap_id: cu_ue_id,
            gnb_du_ue_f1ap_id: du_ue_id,
            srb_id,
            rrc_container: encode_rrc(msg),
        }));
    }

    pub fn send_ue_context_setup_response(
        &self,
        cu_ue_id: u32,
        du_ue_id: u32,
        cell_group: &'static [u8],
    ) {
        self.send(&F1apPdu::UeContextSetupResponse(UeContextSetupResponse {
            gnb_cu_ue_f1ap_id: cu_ue_id,
            gnb_du_ue_f1ap_id: du_ue_id,
            du_to_cu_rrc_information: Bytes::from_static(cell_group),
        }));
    }

    /// Asserts the CU-CP sends nothing for a short while.
    pub async fn assert_silent(&self) {
        if let Ok(Some(msg)) = timeout(SILENCE_WINDOW, self.channel.recv()).await {
            let name = decode_f1ap_pdu(&msg.data)
                .map(|pdu| pdu.name())
                .unwrap_or("undecodable PDU");
            panic!("unexpected F1AP message: {name}");
        }
    }

    /// True once the CU-CP closed the association.
    pub async fn is_disconnected(&self) -> bool {
        matches!(timeout(DEFAULT_TEST_TIMEOUT, self.channel.recv()).await, Ok(None))
    }

    /// Drops the association and waits for the router to tear down.
    pub async fn disconnect(self) {
        self.channel.close().await;
        timeout(DEFAULT_TEST_TIMEOUT, self.router)
            .await
            .expect("DU router did not stop")
            .expect("DU router panicked");
    }

    /// Waits for the router to stop on its own.
    pub async fn join_router(self) {
        timeout(DEFAULT_TEST_TIMEOUT, self.router)
            .await
            .expect("DU router did not stop")
            .expect("DU router panicked");
    }
}
