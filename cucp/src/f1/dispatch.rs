//! Per-DU F1AP router

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cucp_common::{log_protocol_message, Direction};
use cucp_f1ap::{
    decode_f1ap_pdu, Cause, DlRrcMessageTransfer, F1SetupFailure, F1SetupRequest, F1apPdu,
    InitialUlRrcMessageTransfer, UeContextSetupResponse, UlRrcMessageTransfer,
};
use cucp_fsm::Event;
use cucp_rrc::{
    decode_rrc, encode_rrc, DlCcchMessage, InitialUeIdentity, RadioBearerConfig, RrcSetup,
    UlCcchMessage, UlDcchMessage,
};
use cucp_sctp::{Link, TransportChannel, F1AP_PPID};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use super::send_f1ap;
use super::setup::{build_setup_response, validate_setup_request, SetupRejection};
use crate::context::{
    AmfState, CuCpContext, DuEvent, DuHandle, DuInfo, UeContext, UeHandle, UeLinks, UeSetup,
};
use crate::ue::{deliver, release, UeEvent, UePayload};

const SRB0: u8 = 0;
const SRB1: u8 = 1;

/// Serves one DU association until it closes or `shutdown` fires.
///
/// Messages are handled in arrival order and each UE event is awaited before
/// the next message is routed. If the DU has not completed F1 Setup within
/// `f1ap.timers.f1_setup_ms` the association is dropped.
pub async fn serve_du(
    ctx: Arc<CuCpContext>,
    link: Arc<dyn Link>,
    shutdown: watch::Receiver<bool>,
) {
    let channel = TransportChannel::new(link, ctx.channel_config(F1AP_PPID));
    let span = info_span!("f1", peer = %channel.peer());
    DuRouter {
        ctx,
        channel,
        du: None,
    }
    .run(shutdown)
    .instrument(span)
    .await
}

struct DuRouter {
    ctx: Arc<CuCpContext>,
    channel: Arc<TransportChannel>,
    /// Set once F1 Setup succeeded
    du: Option<Arc<DuHandle>>,
}

impl DuRouter {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let setup_timeout = Duration::from_millis(self.ctx.config.f1ap.timers.f1_setup_ms);
        let setup_deadline = tokio::time::sleep(setup_timeout);
        tokio::pin!(setup_deadline);

        if *shutdown.borrow() {
            self.teardown().await;
            return;
        }

        loop {
            tokio::select! {
                msg = self.channel.recv() => match msg {
                    Some(msg) => self.handle_message(msg.data).await,
                    None => {
                        debug!("F1 association closed by peer");
                        break;
                    }
                },
                _ = &mut setup_deadline, if self.du.is_none() => {
                    warn!("F1 Setup not completed within {:?}, dropping association", setup_timeout);
                    break;
                }
                _ = shutdown.changed() => break,
            }
        }

        self.teardown().await;
    }

    async fn handle_message(&mut self, data: Bytes) {
        let pdu = match decode_f1ap_pdu(&data) {
            Ok(pdu) => pdu,
            Err(e) => {
                warn!("Failed to decode F1AP PDU: {}", e);
                return;
            }
        };
        log_protocol_message("F1AP", Direction::Rx, pdu.name(), &data);

        let Some(du) = self.du.clone() else {
            match pdu {
                F1apPdu::F1SetupRequest(request) => self.handle_f1_setup(request),
                other => warn!("{} before F1 Setup, dropped", other.name()),
            }
            return;
        };

        match pdu {
            F1apPdu::F1SetupRequest(request) => {
                warn!(du_id = du.id(), "F1 Setup Request on an established association");
                send_f1ap(
                    &self.channel,
                    &F1apPdu::F1SetupFailure(F1SetupFailure {
                        transaction_id: request.transaction_id,
                        cause: Cause::MESSAGE_NOT_COMPATIBLE,
                    }),
                );
            }
            F1apPdu::InitialUlRrcMessageTransfer(msg) => self.handle_initial_ul_rrc(&du, msg).await,
            F1apPdu::UlRrcMessageTransfer(msg) => self.handle_ul_rrc(&du, msg).await,
            F1apPdu::UeContextSetupResponse(msg) => {
                self.handle_ue_context_setup_response(&du, msg).await
            }
            F1apPdu::Unsupported {
                class,
                procedure_code,
            } => {
                warn!(
                    ?class,
                    procedure_code, "Unsupported F1AP procedure, ignored"
                );
            }
            other => warn!("Unexpected F1AP message from DU: {}", other.name()),
        }
    }

    fn handle_f1_setup(&mut self, request: F1SetupRequest) {
        info!(
            du_id = request.gnb_du_id,
            name = ?request.gnb_du_name,
            cells = request.cell_count(),
            "F1 Setup Request"
        );

        match self.register_du(&request) {
            Ok(du) => {
                let response = build_setup_response(&request, &self.ctx.node);
                send_f1ap(&self.channel, &F1apPdu::F1SetupResponse(response));
                info!(du_id = du.id(), "F1 Setup completed");
                self.du = Some(du);
            }
            Err(rejection) => {
                warn!(du_id = request.gnb_du_id, "F1 Setup rejected: {}", rejection);
                let failure = F1SetupFailure {
                    transaction_id: request.transaction_id,
                    cause: rejection.cause(),
                };
                send_f1ap(&self.channel, &F1apPdu::F1SetupFailure(failure));
            }
        }
    }

    fn register_du(&self, request: &F1SetupRequest) -> Result<Arc<DuHandle>, SetupRejection> {
        validate_setup_request(request, &self.ctx.node)?;
        if self.ctx.dus.contains(&request.gnb_du_id) {
            return Err(SetupRejection::DuIdInUse(request.gnb_du_id));
        }

        let info = DuInfo::from_setup_request(request, self.ctx.node.plmn);
        let du = Arc::new(DuHandle::new(info, Arc::clone(&self.channel)));
        self.ctx
            .du_fsm
            .sync_send_event(&du.entity, Event::new(DuEvent::SetupAccepted))?;
        self.ctx
            .dus
            .insert_new(du.id(), Arc::clone(&du))
            .map_err(|_| SetupRejection::DuIdInUse(du.id()))?;
        Ok(du)
    }

    async fn handle_initial_ul_rrc(&self, du: &Arc<DuHandle>, msg: InitialUlRrcMessageTransfer) {
        let du_ue_id = msg.gnb_du_ue_f1ap_id;
        let Some(cell_group) = msg.du_to_cu_rrc_container else {
            warn!(du_ue_id, "Initial UL RRC Message Transfer without DU to CU RRC container");
            return;
        };
        let request = match decode_rrc::<UlCcchMessage>(&msg.rrc_container) {
            Ok(UlCcchMessage::RrcSetupRequest(request)) => request,
            Err(e) => {
                warn!(du_ue_id, "Failed to decode UL-CCCH message: {}", e);
                return;
            }
        };
        log_protocol_message("RRC", Direction::Rx, "RRCSetupRequest", &msg.rrc_container);

        let Some(amf) = self.ctx.select_amf() else {
            warn!(du_ue_id, "No active AMF, RRC Setup Request dropped");
            return;
        };
        let (rrc_ue_id, ran_ue_ngap_id) = match self.ctx.ues.allocate_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(du_ue_id, "Cannot allocate UE identifiers: {}", e);
                return;
            }
        };

        let tmsi_part1 = match request.ue_identity {
            InitialUeIdentity::Ng5gSTmsiPart1(part1) => Some(part1),
            InitialUeIdentity::RandomValue(_) => None,
        };
        let mut context = UeContext::new(
            UeSetup {
                rrc_ue_id,
                ran_ue_ngap_id,
                du_ue_id,
                c_rnti: msg.c_rnti,
                nr_cgi: msg.nr_cgi,
                establishment_cause: request.establishment_cause,
                tmsi_part1,
                master_cell_group: cell_group.clone(),
            },
            UeLinks {
                du_id: du.id(),
                du: Arc::clone(&du.channel),
                amf_id: amf.id,
                amf: Arc::clone(&amf.channel),
            },
        );
        let transaction_id = context.next_transaction_id();

        // Recorded on the DU before the UE becomes visible, so a concurrent
        // release always finds it there.
        if let Err(e) = self
            .ctx
            .du_fsm
            .send_event(
                Arc::clone(&du.entity),
                Event::with_payload(DuEvent::UeAttached, rrc_ue_id),
            )
            .outcome()
            .await
        {
            warn!(rrc_ue_id, du_id = du.id(), "DU did not record UE: {}", e);
        }

        let ue = Arc::new(UeHandle::new(context));
        if let Err(e) = self.ctx.ues.register(Arc::clone(&ue)) {
            warn!(rrc_ue_id, "Cannot register UE: {}", e);
            let released = Event::with_payload(DuEvent::UeReleased, rrc_ue_id);
            if let Err(e) = self.ctx.du_fsm.sync_send_event(&du.entity, released) {
                debug!(rrc_ue_id, du_id = du.id(), "UE release not recorded: {}", e);
            }
            return;
        }
        // The AMF may have gone INACTIVE after selection. Its teardown only
        // releases UEs registered before that, so this one is ours to release.
        if amf.state() == AmfState::Inactive {
            warn!(rrc_ue_id, amf_id = amf.id, "AMF lost during UE creation, UE released");
            release(&self.ctx, rrc_ue_id).await;
            return;
        }
        info!(
            rrc_ue_id,
            ran_ue_ngap_id,
            du_ue_id,
            c_rnti = msg.c_rnti,
            amf_id = amf.id,
            cause = ?request.establishment_cause,
            "UE created"
        );

        let setup = DlCcchMessage::RrcSetup(RrcSetup {
            transaction_id,
            radio_bearer_config: RadioBearerConfig::srbs(&[SRB1]),
            master_cell_group: cell_group,
        });
        let rrc_container = encode_rrc(&setup);
        log_protocol_message("RRC", Direction::Tx, "RRCSetup", &rrc_container);

        let transfer = DlRrcMessageTransfer {
            gnb_cu_ue_f1ap_id: rrc_ue_id,
            gnb_du_ue_f1ap_id: du_ue_id,
            srb_id: SRB0,
            rrc_container,
            execute_duplication: false,
        };
        send_f1ap(&self.channel, &F1apPdu::DlRrcMessageTransfer(transfer));
    }

    /// Looks up the UE a DU message refers to. Both F1AP UE ids and the DU
    /// must match the UE record.
    fn find_ue(&self, du: &DuHandle, cu_ue_id: u32, du_ue_id: u32) -> Option<Arc<UeHandle>> {
        let Some(ue) = self.ctx.ues.get(cu_ue_id) else {
            warn!(rrc_ue_id = cu_ue_id, "Unknown gNB-CU UE F1AP ID, message dropped");
            return None;
        };
        if ue.du_id != du.id() || ue.du_ue_id != du_ue_id {
            warn!(
                rrc_ue_id = cu_ue_id,
                du_ue_id,
                expected_du_ue_id = ue.du_ue_id,
                "UE identifiers do not match the UE record, message dropped"
            );
            return None;
        }
        Some(ue)
    }

    async fn handle_ul_rrc(&self, du: &DuHandle, msg: UlRrcMessageTransfer) {
        let Some(ue) = self.find_ue(du, msg.gnb_cu_ue_f1ap_id, msg.gnb_du_ue_f1ap_id) else {
            return;
        };
        if msg.srb_id < SRB1 {
            warn!(rrc_ue_id = ue.rrc_ue_id, "UL RRC Message Transfer on SRB0, dropped");
            return;
        }

        let dcch = match decode_rrc::<UlDcchMessage>(&msg.rrc_container) {
            Ok(dcch) => dcch,
            Err(e) => {
                warn!(rrc_ue_id = ue.rrc_ue_id, "Failed to decode UL-DCCH message: {}", e);
                return;
            }
        };
        log_protocol_message("RRC", Direction::Rx, dcch.name(), &msg.rrc_container);

        let event = match dcch {
            UlDcchMessage::RrcSetupComplete(complete) => {
                Event::with_payload(UeEvent::SetupComplete, UePayload::SetupComplete(complete))
            }
            UlDcchMessage::UlInformationTransfer(transfer) => {
                let Some(nas) = transfer.dedicated_nas_message else {
                    warn!(rrc_ue_id = ue.rrc_ue_id, "UL Information Transfer without NAS");
                    return;
                };
                Event::with_payload(UeEvent::NasUplink, UePayload::Nas(nas))
            }
            UlDcchMessage::SecurityModeComplete(_) => Event::new(UeEvent::SecurityModeComplete),
            UlDcchMessage::RrcReconfigurationComplete(_) => {
                Event::new(UeEvent::ReconfigurationComplete)
            }
        };
        deliver(&self.ctx.ue_fsm, &ue, event).await;
    }

    async fn handle_ue_context_setup_response(&self, du: &DuHandle, msg: UeContextSetupResponse) {
        let Some(ue) = self.find_ue(du, msg.gnb_cu_ue_f1ap_id, msg.gnb_du_ue_f1ap_id) else {
            return;
        };
        let event = Event::with_payload(
            UeEvent::ContextSetupResponse,
            UePayload::CellGroup(msg.du_to_cu_rrc_information),
        );
        deliver(&self.ctx.ue_fsm, &ue, event).await;
    }

    /// Releases the DU and every UE it carried, then closes the channel.
    async fn teardown(self) {
        if let Some(du) = &self.du {
            warn!(du_id = du.id(), "DU association down");

            for rrc_ue_id in du.ue_ids() {
                release(&self.ctx, rrc_ue_id).await;
            }

            if let Err(e) = self
                .ctx
                .du_fsm
                .sync_send_event(&du.entity, Event::new(DuEvent::AssociationLost))
            {
                warn!(du_id = du.id(), "DU state machine: {}", e);
            }
            self.ctx.dus.remove(&du.id());
        }

        self.channel.close().await;
    }
}
