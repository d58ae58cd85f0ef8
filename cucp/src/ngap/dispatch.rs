//! AMF router

use std::sync::Arc;

use bytes::Bytes;
use cucp_common::{log_protocol_message, Direction};
use cucp_fsm::Event;
use cucp_ngap::{decode_ngap_pdu, DownlinkNasTransport, InitialContextSetupRequest, NgapPdu};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::context::{AmfEvent, AmfHandle, AmfPayload, CuCpContext, UeHandle};
use crate::ue::{deliver, release, UeEvent, UePayload};

/// Routes messages from a registered AMF until its association closes or
/// `shutdown` fires. The AMF then goes INACTIVE and the UEs bound to it are
/// released.
pub async fn serve_amf(
    ctx: Arc<CuCpContext>,
    amf: Arc<AmfHandle>,
    mut shutdown: watch::Receiver<bool>,
) {
    let span = info_span!("n2", amf_id = amf.id, peer = %amf.channel.peer());

    async move {
        loop {
            tokio::select! {
                msg = amf.channel.recv() => match msg {
                    Some(msg) => handle_message(&ctx, &amf, msg.data).await,
                    None => {
                        debug!("N2 association closed by peer");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        teardown(&ctx, &amf).await;
    }
    .instrument(span)
    .await
}

async fn handle_message(ctx: &CuCpContext, amf: &AmfHandle, data: Bytes) {
    let pdu = match decode_ngap_pdu(&data) {
        Ok(pdu) => pdu,
        Err(e) => {
            warn!("Failed to decode NGAP PDU: {}", e);
            return;
        }
    };
    log_protocol_message("NGAP", Direction::Rx, pdu.name(), &data);

    match pdu {
        NgapPdu::DownlinkNasTransport(msg) => handle_downlink_nas(ctx, amf, msg).await,
        NgapPdu::InitialContextSetupRequest(req) => {
            handle_initial_context_setup(ctx, amf, req).await
        }
        NgapPdu::OverloadStart(overload) => {
            warn!(
                action = ?overload.action,
                traffic_load_reduction = ?overload.traffic_load_reduction,
                "AMF overload start"
            );
            let event = Event::with_payload(AmfEvent::OverloadStart, AmfPayload::Overload(overload));
            if let Err(e) = ctx.amf_fsm.sync_send_event(&amf.entity, event) {
                warn!("Overload Start ignored: {}", e);
            }
        }
        NgapPdu::OverloadStop => {
            info!("AMF overload stop");
            if let Err(e) = ctx
                .amf_fsm
                .sync_send_event(&amf.entity, Event::new(AmfEvent::OverloadStop))
            {
                warn!("Overload Stop ignored: {}", e);
            }
        }
        NgapPdu::Unsupported {
            class,
            procedure_code,
        } => {
            warn!(?class, procedure_code, "Unsupported NGAP procedure, ignored");
        }
        other => warn!("Unexpected NGAP message from AMF: {}", other.name()),
    }
}

/// UE addressed by an AMF message. The UE must be bound to this AMF.
fn find_ue(ctx: &CuCpContext, amf: &AmfHandle, ran_ue_ngap_id: u32) -> Option<Arc<UeHandle>> {
    let Some(ue) = ctx.ues.get_by_ran_ue_ngap_id(ran_ue_ngap_id) else {
        warn!(ran_ue_ngap_id, "Unknown RAN UE NGAP ID, message dropped");
        return None;
    };
    if ue.amf_id != amf.id {
        warn!(
            ran_ue_ngap_id,
            bound_amf = ue.amf_id,
            "UE is bound to another AMF, message dropped"
        );
        return None;
    }
    Some(ue)
}

async fn handle_downlink_nas(ctx: &CuCpContext, amf: &AmfHandle, msg: DownlinkNasTransport) {
    let Some(ue) = find_ue(ctx, amf, msg.ran_ue_ngap_id) else {
        return;
    };
    let event = Event::with_payload(
        UeEvent::DownlinkNas,
        UePayload::DownlinkNas {
            amf_ue_ngap_id: msg.amf_ue_ngap_id,
            nas_pdu: msg.nas_pdu,
        },
    );
    deliver(&ctx.ue_fsm, &ue, event).await;
}

async fn handle_initial_context_setup(
    ctx: &CuCpContext,
    amf: &AmfHandle,
    req: InitialContextSetupRequest,
) {
    let Some(ue) = find_ue(ctx, amf, req.ran_ue_ngap_id) else {
        return;
    };
    let event = Event::with_payload(
        UeEvent::InitialContextSetup,
        UePayload::InitialContextSetup(Box::new(req)),
    );
    deliver(&ctx.ue_fsm, &ue, event).await;
}

async fn teardown(ctx: &CuCpContext, amf: &AmfHandle) {
    warn!(amf_id = amf.id, "AMF association down");

    // INACTIVE first: from here on the AMF is never selected for a new UE.
    if let Err(e) = ctx
        .amf_fsm
        .sync_send_event(&amf.entity, Event::new(AmfEvent::AssociationLost))
    {
        warn!(amf_id = amf.id, "AMF state machine: {}", e);
    }

    let bound: Vec<u32> = ctx
        .ues
        .values()
        .into_iter()
        .filter(|ue| ue.amf_id == amf.id)
        .map(|ue| ue.rrc_ue_id)
        .collect();
    for rrc_ue_id in bound {
        release(ctx, rrc_ue_id).await;
    }

    amf.channel.close().await;
}
