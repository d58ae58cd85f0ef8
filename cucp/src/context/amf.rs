//! AMF Context Management
//!
//! An AMF is registered when its NG Setup Response arrives. The context tracks:
//! - Lifecycle state (INACTIVE, ACTIVE, OVERLOADED)
//! - Relative capacity, served GUAMIs and supported PLMNs/slices
//! - The overload action requested by the AMF

use std::fmt;
use std::sync::Arc;

use cucp_common::{Plmn, SNssai};
use cucp_fsm::{Entity, Fsm, FsmBuilder, FsmError, Machine, Step};
use cucp_ngap::{Guami, NgSetupResponse, OverloadStart};
use cucp_sctp::TransportChannel;
use tracing::{info, warn};

/// AMF lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AmfState {
    /// Association up, NG Setup not completed, or association lost
    #[default]
    Inactive,
    /// NG Setup completed, ready for UE signalling
    Active,
    /// The AMF asked for load reduction
    Overloaded,
}

impl fmt::Display for AmfState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfState::Inactive => write!(f, "INACTIVE"),
            AmfState::Active => write!(f, "ACTIVE"),
            AmfState::Overloaded => write!(f, "OVERLOADED"),
        }
    }
}

/// AMF events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmfEvent {
    SetupAccepted,
    OverloadStart,
    OverloadStop,
    AssociationLost,
}

/// AMF event payloads
#[derive(Debug, Clone)]
pub enum AmfPayload {
    Setup(Box<NgSetupResponse>),
    Overload(OverloadStart),
}

/// State machine binding for AMFs
pub struct AmfMachine;

impl Machine for AmfMachine {
    type State = AmfState;
    type EventKind = AmfEvent;
    type Payload = AmfPayload;
    type Context = AmfContext;
}

/// Mutable AMF data, guarded by the entity lock
#[derive(Debug, Clone, Default)]
pub struct AmfContext {
    pub amf_id: u32,
    /// Relative AMF capacity (0-255)
    pub relative_capacity: u8,
    pub served_guami_list: Vec<Guami>,
    /// Supported PLMNs, in NG Setup Response order
    pub plmns: Vec<Plmn>,
    /// Supported slices over every PLMN, without duplicates
    pub slices: Vec<SNssai>,
    /// Load reduction requested by the last Overload Start
    pub overload: Option<OverloadStart>,
}

impl AmfContext {
    fn apply_setup(&mut self, response: &NgSetupResponse) {
        self.relative_capacity = response.relative_amf_capacity;
        self.served_guami_list = response.served_guami_list.clone();
        self.plmns = response.plmn_support_list.iter().map(|p| p.plmn).collect();
        self.slices.clear();
        for slice in response
            .plmn_support_list
            .iter()
            .flat_map(|p| p.slice_support_list.iter())
        {
            if !self.slices.contains(slice) {
                self.slices.push(*slice);
            }
        }
    }

    /// Returns true if the AMF supports `slice` in any PLMN.
    pub fn supports_slice(&self, slice: &SNssai) -> bool {
        self.slices.contains(slice)
    }
}

/// A connected AMF
pub struct AmfHandle {
    pub id: u32,
    pub name: String,
    pub channel: Arc<TransportChannel>,
    pub entity: Arc<Entity<AmfMachine>>,
}

impl AmfHandle {
    /// Creates the handle with its entity in [`AmfState::Inactive`].
    pub fn new(id: u32, name: String, channel: Arc<TransportChannel>) -> Self {
        let context = AmfContext {
            amf_id: id,
            ..AmfContext::default()
        };
        Self {
            id,
            name,
            channel,
            entity: Arc::new(Entity::new(AmfState::Inactive, context)),
        }
    }

    pub fn state(&self) -> AmfState {
        self.entity.state()
    }

    /// Returns true if the AMF accepts new UEs.
    pub fn is_active(&self) -> bool {
        self.state() == AmfState::Active
    }

    /// Snapshot of the AMF context.
    pub fn snapshot(&self) -> AmfContext {
        self.entity.with_context(AmfContext::clone)
    }
}

impl fmt::Debug for AmfHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmfHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("peer", &self.channel.peer())
            .finish()
    }
}

/// Builds the AMF state machine.
pub fn build_amf_fsm(workers: usize) -> Result<Fsm<AmfMachine>, FsmError> {
    use AmfState::*;

    FsmBuilder::<AmfMachine>::new("amf")
        .transition(Inactive, AmfEvent::SetupAccepted, Active)
        .transition(Active, AmfEvent::OverloadStart, Overloaded)
        .transition(Overloaded, AmfEvent::OverloadStart, Overloaded)
        .transition(Overloaded, AmfEvent::OverloadStop, Active)
        .transition(Active, AmfEvent::OverloadStop, Active)
        .transition_from_any(
            [Inactive, Active, Overloaded],
            AmfEvent::AssociationLost,
            Inactive,
        )
        .on_state(Inactive, |scope, step, event| match (step, event.payload()) {
            (Step::Event, Some(AmfPayload::Setup(response))) => {
                scope.context_mut().apply_setup(response);
            }
            (Step::Entry, _) => {
                warn!(amf_id = scope.context().amf_id, "AMF inactive");
            }
            _ => {}
        })
        .on_state(Active, |scope, step, event| match (step, event.payload()) {
            (Step::Event, Some(AmfPayload::Overload(overload))) => {
                scope.context_mut().overload = Some(*overload);
            }
            (Step::Entry, _) => {
                let ctx = scope.context();
                info!(
                    amf_id = ctx.amf_id,
                    capacity = ctx.relative_capacity,
                    plmns = ctx.plmns.len(),
                    slices = ctx.slices.len(),
                    "AMF active"
                );
            }
            _ => {}
        })
        .on_state(Overloaded, |scope, step, event| match (step, event.payload()) {
            (Step::Event, Some(AmfPayload::Overload(overload))) => {
                scope.context_mut().overload = Some(*overload);
            }
            (Step::Exit, _) => {
                scope.context_mut().overload = None;
            }
            (Step::Entry, _) => {
                let ctx = scope.context();
                warn!(amf_id = ctx.amf_id, overload = ?ctx.overload, "AMF overloaded");
            }
            _ => {}
        })
        .workers(workers)
        .build()
}
