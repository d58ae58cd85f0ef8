use std::time::Duration;

use bytes::Bytes;
use cucp_common::{FiveGSTmsi, NrCgi, Plmn, SNssai};
use cucp_f1ap::{decode_f1ap_pdu, F1apPdu};
use cucp_fsm::{Entity, Event, FsmError};
use cucp_ngap::{
    decode_ngap_pdu, GnbId, Guami, InitialContextSetupRequest, NgapPdu, RrcEstablishmentCause,
    UeSecurityCapabilities,
};
use cucp_rrc::{
    decode_rrc, CipheringAlgorithm, DlDcchMessage, EstablishmentCause, IntegrityProtAlgorithm,
    NgSTmsiValue, RrcSetupComplete,
};
use cucp_sctp::{loopback_pair, ChannelConfig, TransportChannel, F1AP_PPID, NGAP_PPID};

use super::*;
use crate::context::{UeLinks, UeSetup};

const TMSI_VALUE: u64 = 0x0123_4567_89AB;

struct Harness {
    fsm: Fsm<UeMachine>,
    ue: Entity<UeMachine>,
    du_peer: Arc<TransportChannel>,
    amf_peer: Arc<TransportChannel>,
}

fn node() -> Arc<NodeInfo> {
    let plmn = Plmn::new(1, 1, false);
    Arc::new(NodeInfo {
        node_id: "1".to_string(),
        name: "cu-test".to_string(),
        plmn,
        slices: vec![SNssai::new(1)],
        tac: 7,
        nr_cell_identity: 0x10,
        gnb_id: GnbId::new(plmn, 1, 24).unwrap(),
    })
}

fn harness() -> Harness {
    let (du, du_peer) = loopback_pair(2);
    let (amf, amf_peer) = loopback_pair(2);
    let links = UeLinks {
        du_id: 10,
        du: TransportChannel::new(Arc::new(du), ChannelConfig::new(F1AP_PPID)),
        amf_id: 1,
        amf: TransportChannel::new(Arc::new(amf), ChannelConfig::new(NGAP_PPID)),
    };
    let context = UeContext::new(
        UeSetup {
            rrc_ue_id: 5,
            ran_ue_ngap_id: 6,
            du_ue_id: 100,
            c_rnti: 0x4601,
            nr_cgi: NrCgi::new(Plmn::new(1, 1, false), 0x10),
            establishment_cause: EstablishmentCause::MoSignalling,
            tmsi_part1: Some(TMSI_VALUE & ((1 << 39) - 1)),
            master_cell_group: Bytes::from_static(b"cell-group"),
        },
        links,
    );

    Harness {
        fsm: build_ue_fsm(node(), 2).unwrap(),
        ue: Entity::new(UeState::Initialized, context),
        du_peer: TransportChannel::new(Arc::new(du_peer), ChannelConfig::new(F1AP_PPID)),
        amf_peer: TransportChannel::new(Arc::new(amf_peer), ChannelConfig::new(NGAP_PPID)),
    }
}

impl Harness {
    fn send(&self, event: Event<UeMachine>) -> Result<(), FsmError> {
        self.fsm.sync_send_event(&self.ue, event)
    }

    fn setup_complete(&self, nas: &'static [u8]) {
        let complete = RrcSetupComplete {
            transaction_id: 0,
            selected_plmn_identity: 1,
            ng_5g_s_tmsi_value: Some(NgSTmsiValue::Part2((TMSI_VALUE >> 39) as u16)),
            dedicated_nas_message: Bytes::from_static(nas),
        };
        self.send(Event::with_payload(
            UeEvent::SetupComplete,
            UePayload::SetupComplete(complete),
        ))
        .unwrap();
    }

    async fn next_ngap(&self) -> NgapPdu {
        let msg = tokio::time::timeout(Duration::from_secs(1), self.amf_peer.recv())
            .await
            .expect("no NGAP message")
            .expect("AMF channel closed");
        decode_ngap_pdu(&msg.data).unwrap()
    }

    async fn next_f1(&self) -> F1apPdu {
        let msg = tokio::time::timeout(Duration::from_secs(1), self.du_peer.recv())
            .await
            .expect("no F1AP message")
            .expect("DU channel closed");
        decode_f1ap_pdu(&msg.data).unwrap()
    }

    async fn next_dl_dcch(&self) -> (u8, DlDcchMessage) {
        match self.next_f1().await {
            F1apPdu::DlRrcMessageTransfer(transfer) => {
                assert_eq!(transfer.gnb_cu_ue_f1ap_id, 5);
                assert_eq!(transfer.gnb_du_ue_f1ap_id, 100);
                (transfer.srb_id, decode_rrc(&transfer.rrc_container).unwrap())
            }
            other => panic!("expected DL RRC Message Transfer, got {}", other.name()),
        }
    }

    async fn assert_du_silent(&self) {
        let recv = tokio::time::timeout(Duration::from_millis(50), self.du_peer.recv()).await;
        assert!(recv.is_err(), "unexpected F1AP traffic");
    }
}

fn initial_context_setup(nas: Option<&'static [u8]>) -> Event<UeMachine> {
    let plmn = Plmn::new(1, 1, false);
    let request = InitialContextSetupRequest {
        amf_ue_ngap_id: 77,
        ran_ue_ngap_id: 6,
        guami: Guami {
            plmn,
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
        security_key: [0x11; 32],
        mobility_restriction: Some(plmn),
        masked_imeisv: None,
        nas_pdu: nas.map(Bytes::from_static),
    };
    Event::with_payload(
        UeEvent::InitialContextSetup,
        UePayload::InitialContextSetup(Box::new(request)),
    )
}

#[tokio::test]
async fn test_setup_complete_sends_initial_ue_message() {
    let h = harness();
    h.setup_complete(b"registration request");

    match h.next_ngap().await {
        NgapPdu::InitialUeMessage(msg) => {
            assert_eq!(msg.ran_ue_ngap_id, 6);
            assert_eq!(msg.nas_pdu, Bytes::from_static(b"registration request"));
            assert_eq!(msg.rrc_establishment_cause, RrcEstablishmentCause::MoSignalling);
            assert_eq!(msg.five_g_s_tmsi, Some(FiveGSTmsi::from_value(TMSI_VALUE)));
            assert_eq!(msg.user_location.tai.tac, 7);
        }
        other => panic!("expected Initial UE Message, got {}", other.name()),
    }
    assert_eq!(h.ue.state(), UeState::Ongoing);
    h.ue.with_context(|ctx| {
        assert_eq!(ctx.five_g_s_tmsi, Some(FiveGSTmsi::from_value(TMSI_VALUE)));
    });
}

#[tokio::test]
async fn test_second_nas_uses_uplink_transport() {
    let h = harness();
    h.setup_complete(b"first");
    assert!(matches!(h.next_ngap().await, NgapPdu::InitialUeMessage(_)));

    h.send(Event::with_payload(
        UeEvent::NasUplink,
        UePayload::Nas(Bytes::from_static(b"second")),
    ))
    .unwrap();

    match h.next_ngap().await {
        NgapPdu::UplinkNasTransport(msg) => {
            assert_eq!(msg.ran_ue_ngap_id, 6);
            assert_eq!(msg.nas_pdu, Bytes::from_static(b"second"));
        }
        other => panic!("expected Uplink NAS Transport, got {}", other.name()),
    }
    assert_eq!(h.ue.state(), UeState::Ongoing);
}

#[tokio::test]
async fn test_full_registration_reaches_ready() {
    let h = harness();
    h.setup_complete(b"registration request");
    h.next_ngap().await;

    h.send(initial_context_setup(Some(b"registration accept")))
        .unwrap();
    let (srb, smc) = h.next_dl_dcch().await;
    assert_eq!(srb, 1);
    match smc {
        DlDcchMessage::SecurityModeCommand(cmd) => {
            assert_eq!(cmd.ciphering_algorithm, CipheringAlgorithm::Nea2);
            assert_eq!(cmd.integrity_prot_algorithm, Some(IntegrityProtAlgorithm::Nia2));
        }
        other => panic!("expected Security Mode Command, got {}", other.name()),
    }
    h.ue.with_context(|ctx| {
        assert_eq!(ctx.amf_ue_ngap_id, 77);
        assert_eq!(ctx.allowed_nssai, vec![SNssai::new(1)]);
        assert!(ctx.pending_nas.is_some());
    });

    h.send(Event::new(UeEvent::SecurityModeComplete)).unwrap();
    match h.next_f1().await {
        F1apPdu::UeContextSetupRequest(req) => {
            assert_eq!(req.gnb_cu_ue_f1ap_id, 5);
            assert_eq!(req.gnb_du_ue_f1ap_id, Some(100));
            assert_eq!(req.srbs_to_setup, vec![2]);
            assert_eq!(req.drbs_to_setup, vec![DEFAULT_DRB_ID]);
        }
        other => panic!("expected UE Context Setup Request, got {}", other.name()),
    }

    h.send(Event::with_payload(
        UeEvent::ContextSetupResponse,
        UePayload::CellGroup(Bytes::from_static(b"new cell group")),
    ))
    .unwrap();
    match h.next_dl_dcch().await.1 {
        DlDcchMessage::RrcReconfiguration(reconfig) => {
            assert_eq!(
                reconfig.master_cell_group,
                Some(Bytes::from_static(b"new cell group"))
            );
            assert_eq!(
                reconfig.dedicated_nas_message_list,
                vec![Bytes::from_static(b"registration accept")]
            );
        }
        other => panic!("expected RRC Reconfiguration, got {}", other.name()),
    }
    assert_eq!(h.ue.state(), UeState::Ongoing);

    h.send(Event::new(UeEvent::ReconfigurationComplete)).unwrap();
    match h.next_ngap().await {
        NgapPdu::InitialContextSetupResponse(rsp) => {
            assert_eq!(rsp.amf_ue_ngap_id, 77);
            assert_eq!(rsp.ran_ue_ngap_id, 6);
        }
        other => panic!("expected Initial Context Setup Response, got {}", other.name()),
    }
    assert_eq!(h.ue.state(), UeState::Ready);
    h.ue.with_context(|ctx| assert!(ctx.pending_nas.is_none()));
}

#[tokio::test]
async fn test_out_of_order_event_is_rejected() {
    let h = harness();
    let err = h
        .send(Event::new(UeEvent::ReconfigurationComplete))
        .unwrap_err();
    assert!(matches!(err, FsmError::UndefinedTransition { .. }));
    assert_eq!(h.ue.state(), UeState::Initialized);
    h.assert_du_silent().await;
}

#[tokio::test]
async fn test_downlink_nas_is_relayed_without_state_change() {
    let h = harness();
    h.setup_complete(b"registration request");
    h.next_ngap().await;

    h.send(Event::with_payload(
        UeEvent::DownlinkNas,
        UePayload::DownlinkNas {
            amf_ue_ngap_id: 42,
            nas_pdu: Bytes::from_static(b"authentication request"),
        },
    ))
    .unwrap();

    let (srb, msg) = h.next_dl_dcch().await;
    assert_eq!(srb, 1);
    match msg {
        DlDcchMessage::DlInformationTransfer(transfer) => assert_eq!(
            transfer.dedicated_nas_message,
            Some(Bytes::from_static(b"authentication request"))
        ),
        other => panic!("expected DL Information Transfer, got {}", other.name()),
    }
    assert_eq!(h.ue.state(), UeState::Ongoing);
    h.ue.with_context(|ctx| assert_eq!(ctx.amf_ue_ngap_id, 42));
}

#[tokio::test]
async fn test_down_is_terminal() {
    let h = harness();
    h.send(Event::new(UeEvent::AssociationLost)).unwrap();
    assert_eq!(h.ue.state(), UeState::Down);

    h.send(Event::with_payload(
        UeEvent::DownlinkNas,
        UePayload::DownlinkNas {
            amf_ue_ngap_id: 42,
            nas_pdu: Bytes::from_static(b"late"),
        },
    ))
    .unwrap();
    h.assert_du_silent().await;

    assert!(h
        .send(Event::with_payload(
            UeEvent::NasUplink,
            UePayload::Nas(Bytes::from_static(b"late")),
        ))
        .is_err());
    assert_eq!(h.ue.state(), UeState::Down);
}
