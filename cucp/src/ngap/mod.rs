//! N2 interface
//!
//! [`establish`] runs NG Setup over a fresh association and registers the AMF;
//! [`serve_amf`] then routes everything the AMF sends until the association
//! goes away.

mod dispatch;

use std::sync::Arc;
use std::time::Duration;

use cucp_common::{log_protocol_message, Direction};
use cucp_fsm::{Event, FsmError};
use cucp_ngap::{
    decode_ngap_pdu, encode_ngap_pdu, BroadcastPlmnItem, Cause, NgSetupRequest, NgSetupResponse,
    NgapPdu, PagingDrx, SupportedTaItem,
};
use cucp_sctp::{Link, TransportChannel, NGAP_PPID};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::context::{
    AmfEvent, AmfHandle, AmfPayload, CuCpContext, NodeInfo, RegistryError,
};

pub use dispatch::serve_amf;

/// NG Setup errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum NgSetupError {
    #[error("NG Setup rejected by the AMF: {cause}")]
    Rejected { cause: Cause },

    #[error("no NG Setup answer within {0:?}")]
    Timeout(Duration),

    #[error("N2 association closed during NG Setup")]
    Closed,

    #[error("AMF state machine: {0}")]
    Engine(#[from] FsmError),

    #[error("AMF registry: {0}")]
    Registry(#[from] RegistryError),
}

/// Encodes `pdu` and queues it on `channel`.
pub fn send_ngap(channel: &TransportChannel, pdu: &NgapPdu) {
    let bytes = encode_ngap_pdu(pdu);
    log_protocol_message("NGAP", Direction::Tx, pdu.name(), &bytes);
    channel.send(bytes);
}

/// NG Setup Request announcing the configured tracking area, PLMN and slices.
pub fn ng_setup_request(node: &NodeInfo) -> NgSetupRequest {
    NgSetupRequest {
        gnb_id: node.gnb_id,
        ran_node_name: Some(node.name.clone()),
        supported_ta_list: vec![SupportedTaItem {
            tac: node.tac,
            broadcast_plmn_list: vec![BroadcastPlmnItem {
                plmn: node.plmn,
                slice_support_list: node.slices.clone(),
            }],
        }],
        default_paging_drx: PagingDrx::default(),
    }
}

/// Runs NG Setup over `link` and registers the AMF as ACTIVE.
///
/// Waits at most `ngap.ng_setup_timeout_ms` for the answer. On failure the
/// channel is closed and nothing is registered.
pub async fn establish(
    ctx: &Arc<CuCpContext>,
    link: Arc<dyn Link>,
) -> Result<Arc<AmfHandle>, NgSetupError> {
    let channel = TransportChannel::new(link, ctx.channel_config(NGAP_PPID));
    let span = info_span!("n2", peer = %channel.peer());

    let result = register(ctx, &channel).instrument(span).await;
    if result.is_err() {
        channel.close().await;
    }
    result
}

async fn register(
    ctx: &CuCpContext,
    channel: &Arc<TransportChannel>,
) -> Result<Arc<AmfHandle>, NgSetupError> {
    info!("Sending NG Setup Request");
    send_ngap(channel, &NgapPdu::NgSetupRequest(ng_setup_request(&ctx.node)));

    let timeout = Duration::from_millis(ctx.config.ngap.ng_setup_timeout_ms);
    let response = tokio::time::timeout(timeout, setup_answer(channel))
        .await
        .map_err(|_| NgSetupError::Timeout(timeout))??;

    let amf_id = ctx.allocate_amf_id()?;
    let amf = Arc::new(AmfHandle::new(
        amf_id,
        response.amf_name.clone(),
        Arc::clone(channel),
    ));
    ctx.amf_fsm.sync_send_event(
        &amf.entity,
        Event::with_payload(
            AmfEvent::SetupAccepted,
            AmfPayload::Setup(Box::new(response)),
        ),
    )?;
    ctx.amfs.insert_new(amf_id, Arc::clone(&amf))?;

    info!(amf_id, name = %amf.name, "NG Setup completed");
    Ok(amf)
}

async fn setup_answer(channel: &TransportChannel) -> Result<NgSetupResponse, NgSetupError> {
    while let Some(msg) = channel.recv().await {
        let pdu = match decode_ngap_pdu(&msg.data) {
            Ok(pdu) => pdu,
            Err(e) => {
                warn!("Failed to decode NGAP PDU: {}", e);
                continue;
            }
        };
        log_protocol_message("NGAP", Direction::Rx, pdu.name(), &msg.data);

        match pdu {
            NgapPdu::NgSetupResponse(response) => return Ok(response),
            NgapPdu::NgSetupFailure(failure) => {
                warn!(
                    cause = %failure.cause,
                    time_to_wait = ?failure.time_to_wait,
                    "NG Setup Failure"
                );
                return Err(NgSetupError::Rejected {
                    cause: failure.cause,
                });
            }
            other => warn!("{} before NG Setup completed, ignored", other.name()),
        }
    }
    Err(NgSetupError::Closed)
}
