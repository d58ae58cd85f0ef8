//! UE call-control
//!
//! Drives each UE through registration across F1AP, RRC and NGAP:
//!
//! ```text
//! RRC Setup Complete ──► Initial UE Message          INITIALIZED ─► ONGOING
//! UL Information Transfer ──► Uplink NAS Transport   ONGOING / READY
//! Initial Context Setup Request ──► Security Mode Command
//! Security Mode Complete ──► UE Context Setup Request
//! UE Context Setup Response ──► RRC Reconfiguration
//! RRC Reconfiguration Complete ──► Initial Context Setup Response   ONGOING ─► READY
//! Downlink NAS Transport ──► DL Information Transfer  (no state change)
//! association loss ──► DOWN
//! ```
//!
//! Every action runs inside a state callback, under the UE lock, and sends
//! through the channels bound to the UE at creation.

mod handlers;
pub mod security;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use cucp_fsm::{Event, Fsm, FsmBuilder, FsmError, Machine, Step};
use cucp_ngap::InitialContextSetupRequest;
use cucp_rrc::RrcSetupComplete;
use tracing::{debug, info, warn};

use crate::context::{CuCpContext, DuEvent, NodeInfo, UeContext, UeHandle};

pub use handlers::DEFAULT_DRB_ID;

/// UE lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UeState {
    /// RRC connection being set up, no NGAP association yet
    Initialized,
    /// Initial UE Message sent, registration in progress
    Ongoing,
    /// Bearers configured and Initial Context Setup answered
    Ready,
    /// Association lost; terminal
    Down,
}

impl fmt::Display for UeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UeState::Initialized => write!(f, "INITIALIZED"),
            UeState::Ongoing => write!(f, "ONGOING"),
            UeState::Ready => write!(f, "READY"),
            UeState::Down => write!(f, "DOWN"),
        }
    }
}

/// UE events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UeEvent {
    /// RRC Setup Complete received
    SetupComplete,
    /// Uplink NAS to relay to the AMF
    NasUplink,
    /// NGAP Initial Context Setup Request received
    InitialContextSetup,
    /// RRC Security Mode Complete received
    SecurityModeComplete,
    /// F1AP UE Context Setup Response received
    ContextSetupResponse,
    /// RRC Reconfiguration Complete received
    ReconfigurationComplete,
    /// Downlink NAS from the AMF (non-transitional)
    DownlinkNas,
    /// DU or AMF association lost
    AssociationLost,
}

/// UE event payloads
#[derive(Debug, Clone)]
pub enum UePayload {
    SetupComplete(RrcSetupComplete),
    Nas(Bytes),
    InitialContextSetup(Box<InitialContextSetupRequest>),
    /// CellGroupConfig from a UE Context Setup Response
    CellGroup(Bytes),
    DownlinkNas { amf_ue_ngap_id: u64, nas_pdu: Bytes },
}

/// State machine binding for UEs
pub struct UeMachine;

impl Machine for UeMachine {
    type State = UeState;
    type EventKind = UeEvent;
    type Payload = UePayload;
    type Context = UeContext;
}

/// Builds the UE state machine. Callbacks use `node` for user location and
/// tracking area information.
pub fn build_ue_fsm(node: Arc<NodeInfo>, workers: usize) -> Result<Fsm<UeMachine>, FsmError> {
    use UeState::*;

    let initialized_node = Arc::clone(&node);
    let ongoing_node = Arc::clone(&node);
    let ready_node = node;

    FsmBuilder::<UeMachine>::new("ue")
        .transition(Initialized, UeEvent::SetupComplete, Initialized)
        .transition(Initialized, UeEvent::NasUplink, Ongoing)
        .transition(Ongoing, UeEvent::NasUplink, Ongoing)
        .transition(Ready, UeEvent::NasUplink, Ready)
        .transition(Ongoing, UeEvent::InitialContextSetup, Ongoing)
        .transition(Ongoing, UeEvent::SecurityModeComplete, Ongoing)
        .transition(Ongoing, UeEvent::ContextSetupResponse, Ongoing)
        .transition(Ongoing, UeEvent::ReconfigurationComplete, Ready)
        .transition_from_any(
            [Initialized, Ongoing, Ready],
            UeEvent::AssociationLost,
            Down,
        )
        .non_transitional([UeEvent::DownlinkNas])
        .generic_handler(handlers::downlink_nas)
        .on_state(Initialized, move |scope, step, event| {
            if step != Step::Event {
                return;
            }
            match (event.kind, event.payload()) {
                (UeEvent::SetupComplete, Some(UePayload::SetupComplete(complete))) => {
                    handlers::setup_complete(scope, complete);
                }
                (UeEvent::NasUplink, Some(UePayload::Nas(nas))) => {
                    handlers::initial_ue_message(scope.context_mut(), &initialized_node, nas);
                }
                (UeEvent::AssociationLost, _) => {}
                _ => handlers::ignored(scope.context(), event),
            }
        })
        .on_state(Ongoing, move |scope, step, event| match step {
            Step::Entry => debug!(rrc_ue_id = scope.context().rrc_ue_id, "UE registration ongoing"),
            Step::Exit => {}
            Step::Event => {
                let ctx = scope.context_mut();
                match (event.kind, event.payload()) {
                    (UeEvent::NasUplink, Some(UePayload::Nas(nas))) => {
                        handlers::uplink_nas_transport(ctx, &ongoing_node, nas);
                    }
                    (UeEvent::InitialContextSetup, Some(UePayload::InitialContextSetup(req))) => {
                        handlers::initial_context_setup(ctx, req);
                    }
                    (UeEvent::SecurityModeComplete, _) => {
                        handlers::security_mode_complete(ctx);
                    }
                    (UeEvent::ContextSetupResponse, Some(UePayload::CellGroup(cell_group))) => {
                        handlers::context_setup_response(ctx, cell_group);
                    }
                    (UeEvent::ReconfigurationComplete, _) => {
                        handlers::reconfiguration_complete(ctx);
                    }
                    (UeEvent::AssociationLost, _) => {}
                    _ => handlers::ignored(ctx, event),
                }
            }
        })
        .on_state(Ready, move |scope, step, event| match step {
            Step::Entry => {
                let ctx = scope.context();
                info!(
                    rrc_ue_id = ctx.rrc_ue_id,
                    ran_ue_ngap_id = ctx.ran_ue_ngap_id,
                    amf_ue_ngap_id = ctx.amf_ue_ngap_id,
                    "UE registered"
                );
            }
            Step::Exit => {}
            Step::Event => match (event.kind, event.payload()) {
                (UeEvent::NasUplink, Some(UePayload::Nas(nas))) => {
                    handlers::uplink_nas_transport(scope.context_mut(), &ready_node, nas);
                }
                (UeEvent::AssociationLost, _) => {}
                _ => handlers::ignored(scope.context(), event),
            },
        })
        .on_state(Down, |scope, step, _| {
            if step == Step::Entry {
                let ctx = scope.context_mut();
                ctx.pending_nas = None;
                info!(
                    rrc_ue_id = ctx.rrc_ue_id,
                    du_id = ctx.links.du_id,
                    "UE down"
                );
            }
        })
        .workers(workers)
        .build()
}

/// Submits `event` for `ue` and waits until it has been processed.
///
/// Returns false if the event was rejected; the rejection is logged and the UE
/// is left unchanged.
pub async fn deliver(fsm: &Arc<Fsm<UeMachine>>, ue: &UeHandle, event: Event<UeMachine>) -> bool {
    let kind = event.kind;
    match fsm.send_event(Arc::clone(&ue.entity), event).outcome().await {
        Ok(()) => true,
        Err(e) => {
            warn!(rrc_ue_id = ue.rrc_ue_id, event = ?kind, "UE event rejected: {}", e);
            false
        }
    }
}

/// Takes a UE out of service after an association loss: the UE is removed from
/// the registry, moved to [`UeState::Down`] and released from its DU.
pub async fn release(ctx: &CuCpContext, rrc_ue_id: u32) {
    let Some(ue) = ctx.ues.remove(rrc_ue_id) else {
        return;
    };
    deliver(&ctx.ue_fsm, &ue, Event::new(UeEvent::AssociationLost)).await;

    if let Some(du) = ctx.dus.get(&ue.du_id) {
        let released = Event::with_payload(DuEvent::UeReleased, rrc_ue_id);
        if let Err(e) = ctx.du_fsm.sync_send_event(&du.entity, released) {
            debug!(du_id = ue.du_id, rrc_ue_id, "UE release not recorded: {}", e);
        }
    }
}

#[cfg(test)]
mod call_flow_tests;
