//! Call-flow actions run from the UE state callbacks.

use bytes::Bytes;
use cucp_common::{log_protocol_message, Direction, FiveGSTmsi};
use cucp_f1ap::{DlRrcMessageTransfer, F1apPdu, UeContextSetupRequest};
use cucp_fsm::{Event, Scope};
use cucp_ngap::{
    InitialContextSetupRequest, InitialContextSetupResponse, InitialUeMessage, NgapPdu,
    RrcEstablishmentCause, UplinkNasTransport, UserLocationInfoNr,
};
use cucp_rrc::{
    encode_rrc, DlDcchMessage, DlInformationTransfer, EstablishmentCause, NgSTmsiValue,
    RadioBearerConfig, RrcReconfiguration, RrcSetupComplete, SecurityModeCommand,
};
use tracing::{debug, info, warn};

use super::security::select_algorithms;
use super::{UeEvent, UeMachine, UePayload, UeState};
use crate::context::{NodeInfo, UeContext};
use crate::f1::send_f1ap;
use crate::ngap::send_ngap;

/// DRB set up for every registered UE
pub const DEFAULT_DRB_ID: u8 = 1;

const SRB1: u8 = 1;
const SRB2: u8 = 2;

pub(super) fn setup_complete(scope: &mut Scope<'_, UeMachine>, complete: &RrcSetupComplete) {
    let ctx = scope.context_mut();
    match complete.ng_5g_s_tmsi_value {
        Some(NgSTmsiValue::Part2(part2)) => match ctx.tmsi_part1 {
            Some(part1) => match FiveGSTmsi::from_parts(part1, part2) {
                Ok(tmsi) => ctx.five_g_s_tmsi = Some(tmsi),
                Err(e) => warn!(rrc_ue_id = ctx.rrc_ue_id, "cannot reassemble 5G-S-TMSI: {}", e),
            },
            None => warn!(
                rrc_ue_id = ctx.rrc_ue_id,
                "5G-S-TMSI part 2 without a part 1 in the setup request"
            ),
        },
        Some(NgSTmsiValue::Full(tmsi)) => ctx.five_g_s_tmsi = Some(tmsi),
        None => {}
    }
    let rrc_ue_id = ctx.rrc_ue_id;
    debug!(rrc_ue_id, tmsi = ?ctx.five_g_s_tmsi, "RRC Setup Complete");

    let nas = Event::with_payload(
        UeEvent::NasUplink,
        UePayload::Nas(complete.dedicated_nas_message.clone()),
    );
    if let Some(displaced) = scope.queue_event(nas) {
        warn!(rrc_ue_id, event = ?displaced.kind, "queued UE event replaced");
    }
}

pub(super) fn initial_ue_message(ctx: &mut UeContext, node: &NodeInfo, nas: &Bytes) {
    let msg = InitialUeMessage {
        ran_ue_ngap_id: ctx.ran_ue_ngap_id,
        nas_pdu: nas.clone(),
        user_location: user_location(ctx, node),
        rrc_establishment_cause: establishment_cause(ctx.establishment_cause),
        five_g_s_tmsi: ctx.five_g_s_tmsi,
    };
    info!(
        rrc_ue_id = ctx.rrc_ue_id,
        ran_ue_ngap_id = ctx.ran_ue_ngap_id,
        "Sending Initial UE Message"
    );
    send_ngap(&ctx.links.amf, &NgapPdu::InitialUeMessage(msg));
}

pub(super) fn uplink_nas_transport(ctx: &mut UeContext, node: &NodeInfo, nas: &Bytes) {
    let msg = UplinkNasTransport {
        amf_ue_ngap_id: ctx.amf_ue_ngap_id,
        ran_ue_ngap_id: ctx.ran_ue_ngap_id,
        nas_pdu: nas.clone(),
        user_location: user_location(ctx, node),
    };
    send_ngap(&ctx.links.amf, &NgapPdu::UplinkNasTransport(msg));
}

pub(super) fn initial_context_setup(ctx: &mut UeContext, request: &InitialContextSetupRequest) {
    ctx.amf_ue_ngap_id = request.amf_ue_ngap_id;
    ctx.allowed_nssai = request.allowed_nssai.clone();
    ctx.security_capabilities = Some(request.ue_security_capabilities);
    ctx.security_key = Some(request.security_key);
    ctx.mobility_restriction = request.mobility_restriction;
    ctx.masked_imeisv = request.masked_imeisv;
    ctx.pending_nas = request.nas_pdu.clone();

    let (ciphering_algorithm, integrity) = select_algorithms(&request.ue_security_capabilities);
    info!(
        rrc_ue_id = ctx.rrc_ue_id,
        amf_ue_ngap_id = ctx.amf_ue_ngap_id,
        slices = ctx.allowed_nssai.len(),
        ?ciphering_algorithm,
        ?integrity,
        "Initial Context Setup, starting AS security"
    );

    let command = SecurityModeCommand {
        transaction_id: ctx.next_transaction_id(),
        ciphering_algorithm,
        integrity_prot_algorithm: Some(integrity),
    };
    send_dl_dcch(ctx, SRB1, &DlDcchMessage::SecurityModeCommand(command));
}

pub(super) fn security_mode_complete(ctx: &mut UeContext) {
    let request = UeContextSetupRequest {
        gnb_cu_ue_f1ap_id: ctx.rrc_ue_id,
        gnb_du_ue_f1ap_id: Some(ctx.du_ue_id),
        sp_cell_id: ctx.nr_cgi,
        serv_cell_index: 0,
        srbs_to_setup: vec![SRB2],
        drbs_to_setup: vec![DEFAULT_DRB_ID],
        rrc_container: None,
    };
    debug!(rrc_ue_id = ctx.rrc_ue_id, "Security Mode Complete, requesting UE context setup");
    send_f1ap(&ctx.links.du, &F1apPdu::UeContextSetupRequest(request));
}

pub(super) fn context_setup_response(ctx: &mut UeContext, cell_group: &Bytes) {
    if cell_group.is_empty() {
        warn!(rrc_ue_id = ctx.rrc_ue_id, "empty CellGroupConfig, keeping the previous one");
    } else {
        ctx.master_cell_group = cell_group.clone();
    }

    let reconfiguration = RrcReconfiguration {
        transaction_id: ctx.next_transaction_id(),
        radio_bearer_config: Some(RadioBearerConfig {
            srb_to_add_mod_list: vec![SRB2],
            drb_to_add_mod_list: vec![DEFAULT_DRB_ID],
        }),
        master_cell_group: Some(ctx.master_cell_group.clone()),
        dedicated_nas_message_list: ctx.pending_nas.take().into_iter().collect(),
    };
    send_dl_dcch(ctx, SRB1, &DlDcchMessage::RrcReconfiguration(reconfiguration));
}

pub(super) fn reconfiguration_complete(ctx: &mut UeContext) {
    let response = InitialContextSetupResponse {
        amf_ue_ngap_id: ctx.amf_ue_ngap_id,
        ran_ue_ngap_id: ctx.ran_ue_ngap_id,
    };
    send_ngap(&ctx.links.amf, &NgapPdu::InitialContextSetupResponse(response));
}

/// Generic handler for [`UeEvent::DownlinkNas`].
pub(super) fn downlink_nas(scope: &mut Scope<'_, UeMachine>, event: &Event<UeMachine>) {
    let state = scope.state();
    let ctx = scope.context_mut();
    let Some(UePayload::DownlinkNas {
        amf_ue_ngap_id,
        nas_pdu,
    }) = event.payload()
    else {
        ignored(ctx, event);
        return;
    };
    if state == UeState::Down {
        debug!(rrc_ue_id = ctx.rrc_ue_id, "downlink NAS for a UE that is down");
        return;
    }

    ctx.amf_ue_ngap_id = *amf_ue_ngap_id;
    let transfer = DlInformationTransfer {
        transaction_id: ctx.next_transaction_id(),
        dedicated_nas_message: Some(nas_pdu.clone()),
    };
    send_dl_dcch(ctx, SRB1, &DlDcchMessage::DlInformationTransfer(transfer));
}

pub(super) fn ignored(ctx: &UeContext, event: &Event<UeMachine>) {
    warn!(
        rrc_ue_id = ctx.rrc_ue_id,
        event = ?event.kind,
        "UE event without the expected payload"
    );
}

fn send_dl_dcch(ctx: &UeContext, srb_id: u8, msg: &DlDcchMessage) {
    let rrc_container = encode_rrc(msg);
    log_protocol_message("RRC", Direction::Tx, msg.name(), &rrc_container);

    let transfer = DlRrcMessageTransfer {
        gnb_cu_ue_f1ap_id: ctx.rrc_ue_id,
        gnb_du_ue_f1ap_id: ctx.du_ue_id,
        srb_id,
        rrc_container,
        execute_duplication: false,
    };
    send_f1ap(&ctx.links.du, &F1apPdu::DlRrcMessageTransfer(transfer));
}

fn user_location(ctx: &UeContext, node: &NodeInfo) -> UserLocationInfoNr {
    UserLocationInfoNr {
        nr_cgi: ctx.nr_cgi,
        tai: node.tai(),
    }
}

fn establishment_cause(cause: EstablishmentCause) -> RrcEstablishmentCause {
    RrcEstablishmentCause::try_from(u8::from(cause)).unwrap_or(RrcEstablishmentCause::NotAvailable)
}
