//! UE registration integration tests
//!
//! Drives a UE from RRC Setup Request to READY through the real DU and AMF
//! routers, with the mock DU playing the UE's RRC side.

use bytes::Bytes;
use cucp::{AmfState, UeState};
use cucp_common::SNssai;
use cucp_f1ap::{DlRrcMessageTransfer, F1apPdu};
use cucp_ngap::{
    DownlinkNasTransport, Guami, InitialContextSetupRequest, NgapPdu, UeSecurityCapabilities,
};
use cucp_rrc::{
    decode_rrc, DlCcchMessage, DlDcchMessage, InitialUeIdentity, RrcReconfigurationComplete,
    RrcSetupComplete, SecurityModeComplete, UlDcchMessage, UlInformationTransfer,
};
use integration_tests::{
    f1_setup_request, wait_until, MockDu, TestCuCp, DU_CELL_GROUP, TEST_PLMN,
};

const DU_UE_ID: u32 = 40;

/// A CU-CP with one DU and one UE that received RRC Setup.
struct Attached {
    cu: TestCuCp,
    du: MockDu,
    cu_ue_id: u32,
    ran_ue_ngap_id: u32,
}

async fn attach_ue() -> Attached {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();
    assert!(matches!(
        du.f1_setup(f1_setup_request(7, 1)).await,
        F1apPdu::F1SetupResponse(_)
    ));

    du.send_rrc_setup_request(DU_UE_ID, InitialUeIdentity::RandomValue(0x1234));
    let transfer = du.recv_dl_rrc().await;
    assert_eq!(transfer.srb_id, 0);
    assert_eq!(transfer.gnb_du_ue_f1ap_id, DU_UE_ID);
    let DlCcchMessage::RrcSetup(setup) =
        decode_rrc::<DlCcchMessage>(&transfer.rrc_container).unwrap();
    assert_eq!(setup.master_cell_group, Bytes::from_static(DU_CELL_GROUP));

    let cu_ue_id = transfer.gnb_cu_ue_f1ap_id;
    let ue = cu.ctx.ues.get(cu_ue_id).expect("UE registered");
    assert_eq!(ue.state(), UeState::Initialized);
    assert_eq!(ue.du_id, 7);
    assert_eq!(ue.amf_id, cu.amf_handle.id);

    Attached {
        ran_ue_ngap_id: ue.ran_ue_ngap_id,
        cu,
        du,
        cu_ue_id,
    }
}

impl Attached {
    fn state(&self) -> Option<UeState> {
        self.cu.ctx.ues.get(self.cu_ue_id).map(|ue| ue.state())
    }

    fn send_ul_dcch(&self, msg: UlDcchMessage) {
        self.du.send_ul_dcch(self.cu_ue_id, DU_UE_ID, &msg);
    }

    fn setup_complete(&self, nas: &'static [u8]) {
        self.send_ul_dcch(UlDcchMessage::RrcSetupComplete(RrcSetupComplete {
            transaction_id: 0,
            selected_plmn_identity: 1,
            ng_5g_s_tmsi_value: None,
            dedicated_nas_message: Bytes::from_static(nas),
        }));
    }

    async fn recv_dl_dcch(&self) -> DlDcchMessage {
        let transfer: DlRrcMessageTransfer = self.du.recv_dl_rrc().await;
        assert_eq!(transfer.srb_id, 1);
        assert_eq!(transfer.gnb_cu_ue_f1ap_id, self.cu_ue_id);
        assert_eq!(transfer.gnb_du_ue_f1ap_id, DU_UE_ID);
        decode_rrc(&transfer.rrc_container).unwrap()
    }

    /// Setup Complete up to the Initial UE Message at the AMF.
    async fn register_nas(&self) {
        self.setup_complete(b"registration request");
        match self.cu.amf.recv().await {
            NgapPdu::InitialUeMessage(msg) => {
                assert_eq!(msg.ran_ue_ngap_id, self.ran_ue_ngap_id);
                assert_eq!(msg.nas_pdu, Bytes::from_static(b"registration request"));
                assert_eq!(msg.five_g_s_tmsi, None);
            }
            other => panic!("expected Initial UE Message, got {}", other.name()),
        }
    }

    fn downlink_nas(&self, amf_ue_ngap_id: u64, nas: &'static [u8]) {
        self.cu
            .amf
            .send(&NgapPdu::DownlinkNasTransport(DownlinkNasTransport {
                amf_ue_ngap_id,
                ran_ue_ngap_id: self.ran_ue_ngap_id,
                nas_pdu: Bytes::from_static(nas),
            }));
    }
}

fn initial_context_setup_request(ran_ue_ngap_id: u32) -> InitialContextSetupRequest {
    InitialContextSetupRequest {
        amf_ue_ngap_id: 42,
        ran_ue_ngap_id,
        guami: Guami {
            plmn: TEST_PLMN,
            amf_region_id: 1,
            amf_set_id: 1,
            amf_pointer: 0,
        },
        allowed_nssai: vec![SNssai::new(1)],
        ue_security_capabilities: UeSecurityCapabilities {
            nr_encryption_algorithms: 0xE000,
            nr_integrity_algorithms: 0xE000,
            ..Default::default()
        },
        security_key: [0x5A; 32],
        mobility_restriction: None,
        masked_imeisv: None,
        nas_pdu: Some(Bytes::from_static(b"registration accept")),
    }
}

#[tokio::test]
async fn test_setup_complete_sends_initial_ue_message() {
    let ue = attach_ue().await;
    ue.register_nas().await;
    assert_eq!(ue.state(), Some(UeState::Ongoing));

    let du = ue.cu.ctx.dus.get(&7).unwrap();
    assert_eq!(du.ue_ids(), vec![ue.cu_ue_id]);

    ue.cu.shutdown().await;
}

#[tokio::test]
async fn test_nas_is_relayed_both_ways() {
    let ue = attach_ue().await;
    ue.register_nas().await;

    ue.downlink_nas(42, b"authentication request");
    match ue.recv_dl_dcch().await {
        DlDcchMessage::DlInformationTransfer(transfer) => assert_eq!(
            transfer.dedicated_nas_message,
            Some(Bytes::from_static(b"authentication request"))
        ),
        other => panic!("expected DL Information Transfer, got {}", other.name()),
    }

    ue.send_ul_dcch(UlDcchMessage::UlInformationTransfer(UlInformationTransfer {
        dedicated_nas_message: Some(Bytes::from_static(b"authentication response")),
    }));
    match ue.cu.amf.recv().await {
        NgapPdu::UplinkNasTransport(msg) => {
            assert_eq!(msg.amf_ue_ngap_id, 42);
            assert_eq!(msg.ran_ue_ngap_id, ue.ran_ue_ngap_id);
            assert_eq!(msg.nas_pdu, Bytes::from_static(b"authentication response"));
        }
        other => panic!("expected Uplink NAS Transport, got {}", other.name()),
    }
    assert_eq!(ue.state(), Some(UeState::Ongoing));

    ue.cu.shutdown().await;
}

#[tokio::test]
async fn test_full_registration_reaches_ready() {
    let ue = attach_ue().await;
    ue.register_nas().await;

    ue.cu
        .amf
        .send(&NgapPdu::InitialContextSetupRequest(initial_context_setup_request(
            ue.ran_ue_ngap_id,
        )));
    assert!(matches!(
        ue.recv_dl_dcch().await,
        DlDcchMessage::SecurityModeCommand(_)
    ));

    ue.send_ul_dcch(UlDcchMessage::SecurityModeComplete(SecurityModeComplete {
        transaction_id: 1,
    }));
    match ue.du.recv().await {
        F1apPdu::UeContextSetupRequest(req) => {
            assert_eq!(req.gnb_cu_ue_f1ap_id, ue.cu_ue_id);
            assert_eq!(req.gnb_du_ue_f1ap_id, Some(DU_UE_ID));
            assert_eq!(req.srbs_to_setup, vec![2]);
            assert_eq!(req.drbs_to_setup, vec![cucp::ue::DEFAULT_DRB_ID]);
        }
        other => panic!("expected UE Context Setup Request, got {}", other.name()),
    }

    ue.du
        .send_ue_context_setup_response(ue.cu_ue_id, DU_UE_ID, b"bearer cell group");
    match ue.recv_dl_dcch().await {
        DlDcchMessage::RrcReconfiguration(reconfig) => {
            assert_eq!(
                reconfig.master_cell_group,
                Some(Bytes::from_static(b"bearer cell group"))
            );
            assert_eq!(
                reconfig.dedicated_nas_message_list,
                vec![Bytes::from_static(b"registration accept")]
            );
        }
        other => panic!("expected RRC Reconfiguration, got {}", other.name()),
    }
    assert_eq!(ue.state(), Some(UeState::Ongoing));

    ue.send_ul_dcch(UlDcchMessage::RrcReconfigurationComplete(
        RrcReconfigurationComplete { transaction_id: 2 },
    ));
    match ue.cu.amf.recv().await {
        NgapPdu::InitialContextSetupResponse(rsp) => {
            assert_eq!(rsp.amf_ue_ngap_id, 42);
            assert_eq!(rsp.ran_ue_ngap_id, ue.ran_ue_ngap_id);
        }
        other => panic!("expected Initial Context Setup Response, got {}", other.name()),
    }
    wait_until(|| ue.state() == Some(UeState::Ready))
        .await
        .expect("UE reaches READY");

    ue.cu.shutdown().await;
}

#[tokio::test]
async fn test_mismatched_du_ue_id_is_dropped() {
    let ue = attach_ue().await;

    ue.du.send_ul_dcch(
        ue.cu_ue_id,
        DU_UE_ID + 1,
        &UlDcchMessage::RrcSetupComplete(RrcSetupComplete {
            transaction_id: 0,
            selected_plmn_identity: 1,
            ng_5g_s_tmsi_value: None,
            dedicated_nas_message: Bytes::from_static(b"registration request"),
        }),
    );
    ue.cu.amf.assert_silent().await;
    assert_eq!(ue.state(), Some(UeState::Initialized));

    ue.cu.shutdown().await;
}

#[tokio::test]
async fn test_out_of_order_message_is_ignored() {
    let ue = attach_ue().await;

    ue.send_ul_dcch(UlDcchMessage::SecurityModeComplete(SecurityModeComplete {
        transaction_id: 0,
    }));
    ue.du.assert_silent().await;
    assert_eq!(ue.state(), Some(UeState::Initialized));

    // The UE still completes setup afterwards.
    ue.register_nas().await;
    assert_eq!(ue.state(), Some(UeState::Ongoing));

    ue.cu.shutdown().await;
}

#[tokio::test]
async fn test_du_loss_releases_its_ues() {
    let ue = attach_ue().await;
    ue.register_nas().await;
    let handle = ue.cu.ctx.ues.get(ue.cu_ue_id).unwrap();

    let Attached { cu, du, .. } = ue;
    du.disconnect().await;

    wait_until(|| cu.ctx.ues.is_empty() && cu.ctx.dus.is_empty())
        .await
        .expect("UE and DU released");
    assert_eq!(handle.state(), UeState::Down);
    assert_eq!(cu.amf_handle.state(), AmfState::Active);

    cu.shutdown().await;
}

#[tokio::test]
async fn test_amf_loss_releases_bound_ues() {
    let ue = attach_ue().await;
    ue.register_nas().await;
    let handle = ue.cu.ctx.ues.get(ue.cu_ue_id).unwrap();

    ue.cu.amf.disconnect().await;
    wait_until(|| ue.cu.ctx.ues.is_empty())
        .await
        .expect("UE released after AMF loss");
    assert_eq!(handle.state(), UeState::Down);
    assert_eq!(ue.cu.amf_handle.state(), AmfState::Inactive);
    assert_eq!(ue.cu.ctx.amfs.len(), 1);

    // Without an active AMF new UEs are not admitted.
    ue.du
        .send_rrc_setup_request(DU_UE_ID + 1, InitialUeIdentity::RandomValue(0x99));
    ue.du.assert_silent().await;
    assert!(ue.cu.ctx.ues.is_empty());

    ue.cu.shutdown().await;
}

#[tokio::test]
async fn test_ul_rrc_on_srb0_is_dropped() {
    let ue = attach_ue().await;

    ue.du.send_ul_rrc(
        0,
        ue.cu_ue_id,
        DU_UE_ID,
        &UlDcchMessage::RrcSetupComplete(RrcSetupComplete {
            transaction_id: 0,
            selected_plmn_identity: 1,
            ng_5g_s_tmsi_value: None,
            dedicated_nas_message: Bytes::from_static(b"registration request"),
        }),
    );
    ue.cu.amf.assert_silent().await;
    ue.du.assert_silent().await;
    assert_eq!(ue.state(), Some(UeState::Initialized));

    // The same message on SRB1 is accepted.
    ue.register_nas().await;
    assert_eq!(ue.state(), Some(UeState::Ongoing));

    ue.cu.shutdown().await;
}

#[tokio::test]
async fn test_no_ue_outlives_a_lost_amf() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();
    assert!(matches!(
        du.f1_setup(f1_setup_request(7, 1)).await,
        F1apPdu::F1SetupResponse(_)
    ));

    // Setup requests are still being routed while the AMF goes away.
    for du_ue_id in 100..140 {
        du.send_rrc_setup_request(du_ue_id, InitialUeIdentity::RandomValue(du_ue_id as u64));
    }
    cu.amf.disconnect().await;
    for du_ue_id in 140..160 {
        du.send_rrc_setup_request(du_ue_id, InitialUeIdentity::RandomValue(du_ue_id as u64));
    }

    wait_until(|| cu.amf_handle.state() == AmfState::Inactive)
        .await
        .expect("AMF goes INACTIVE");
    // Drain whatever the DU router sent back.
    while tokio::time::timeout(std::time::Duration::from_millis(200), du.recv())
        .await
        .is_ok()
    {}

    wait_until(|| cu.ctx.ues.is_empty())
        .await
        .expect("every UE bound to the lost AMF is released");
    let du_handle = cu.ctx.dus.get(&7).unwrap();
    wait_until(|| du_handle.ue_ids().is_empty())
        .await
        .expect("the DU forgets every released UE");

    cu.shutdown().await;
}
