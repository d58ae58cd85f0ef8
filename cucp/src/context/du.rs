//! DU context
//!
//! A DU is registered once its F1 Setup Request has been accepted. Immutable
//! information from the setup request and the transport channel live in the
//! [`DuHandle`] beside the state machine entity, so UE call-control can send to
//! the DU without taking the DU lock.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use cucp_common::{NrCgi, Plmn};
use cucp_f1ap::{DuSystemInformation, F1SetupRequest};
use cucp_fsm::{Entity, Fsm, FsmBuilder, FsmError, Machine, Step};
use cucp_sctp::TransportChannel;
use tracing::{debug, info, warn};

/// DU lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuState {
    /// Association up, F1 Setup not yet accepted
    Inactive,
    /// F1 Setup accepted
    Active,
    /// Association lost
    Lost,
}

impl fmt::Display for DuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuState::Inactive => write!(f, "INACTIVE"),
            DuState::Active => write!(f, "ACTIVE"),
            DuState::Lost => write!(f, "LOST"),
        }
    }
}

/// DU events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuEvent {
    SetupAccepted,
    AssociationLost,
    /// A UE was created on this DU (non-transitional, payload: RRC UE id)
    UeAttached,
    /// A UE of this DU was torn down (non-transitional, payload: RRC UE id)
    UeReleased,
}

/// State machine binding for DUs
pub struct DuMachine;

impl Machine for DuMachine {
    type State = DuState;
    type EventKind = DuEvent;
    type Payload = u32;
    type Context = DuContext;
}

/// Mutable DU data, guarded by the entity lock
#[derive(Debug, Default)]
pub struct DuContext {
    pub du_id: u64,
    /// RRC UE ids of the UEs served through this DU
    pub ues: BTreeSet<u32>,
}

/// One served cell as accepted at F1 Setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedCell {
    pub nr_cgi: NrCgi,
    pub plmn: Plmn,
    pub pci: u16,
    pub tac: Option<u32>,
}

/// Immutable DU information from the F1 Setup Request
#[derive(Debug, Clone)]
pub struct DuInfo {
    pub id: u64,
    pub name: Option<String>,
    pub cells: Vec<ServedCell>,
    pub rrc_version: [u8; 3],
    pub system_information: Option<DuSystemInformation>,
}

impl DuInfo {
    /// Extracts the DU information of an accepted setup request. Every cell is
    /// recorded with the PLMN it was accepted for.
    pub fn from_setup_request(request: &F1SetupRequest, plmn: Plmn) -> Self {
        let cells = request
            .served_cells
            .iter()
            .map(|item| {
                let cell = &item.served_cell_information;
                ServedCell {
                    nr_cgi: cell.nr_cgi,
                    plmn,
                    pci: cell.nr_pci,
                    tac: cell.five_gs_tac,
                }
            })
            .collect();

        Self {
            id: request.gnb_du_id,
            name: request.gnb_du_name.clone(),
            cells,
            rrc_version: request.rrc_version,
            system_information: request
                .served_cells
                .first()
                .and_then(|item| item.system_information.clone()),
        }
    }
}

/// A registered DU
pub struct DuHandle {
    pub info: DuInfo,
    pub channel: Arc<TransportChannel>,
    pub entity: Arc<Entity<DuMachine>>,
}

impl DuHandle {
    /// Creates the handle with its entity in [`DuState::Inactive`].
    pub fn new(info: DuInfo, channel: Arc<TransportChannel>) -> Self {
        let context = DuContext {
            du_id: info.id,
            ues: BTreeSet::new(),
        };
        Self {
            info,
            channel,
            entity: Arc::new(Entity::new(DuState::Inactive, context)),
        }
    }

    pub fn id(&self) -> u64 {
        self.info.id
    }

    pub fn state(&self) -> DuState {
        self.entity.state()
    }

    /// RRC UE ids currently attached to this DU.
    pub fn ue_ids(&self) -> Vec<u32> {
        self.entity.with_context(|ctx| ctx.ues.iter().copied().collect())
    }
}

impl fmt::Debug for DuHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuHandle")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("state", &self.state())
            .field("peer", &self.channel.peer())
            .finish()
    }
}

/// Builds the DU state machine.
pub fn build_du_fsm(workers: usize) -> Result<Fsm<DuMachine>, FsmError> {
    FsmBuilder::<DuMachine>::new("du")
        .transition(DuState::Inactive, DuEvent::SetupAccepted, DuState::Active)
        .transition_from_any(
            [DuState::Inactive, DuState::Active],
            DuEvent::AssociationLost,
            DuState::Lost,
        )
        .non_transitional([DuEvent::UeAttached, DuEvent::UeReleased])
        .generic_handler(|scope, event| {
            let Some(&rrc_ue_id) = event.payload() else {
                warn!(event = ?event.kind, "DU event without UE id");
                return;
            };
            let state = scope.state();
            let ctx = scope.context_mut();
            match event.kind {
                DuEvent::UeAttached if state == DuState::Active => {
                    ctx.ues.insert(rrc_ue_id);
                }
                DuEvent::UeAttached => {
                    warn!(du_id = ctx.du_id, rrc_ue_id, %state, "UE attach on a DU that is not active");
                }
                DuEvent::UeReleased => {
                    ctx.ues.remove(&rrc_ue_id);
                }
                _ => {}
            }
        })
        .on_state(DuState::Inactive, |_, _, _| {})
        .on_state(DuState::Active, |scope, step, _| {
            if step == Step::Entry {
                info!(du_id = scope.context().du_id, "DU active");
            }
        })
        .on_state(DuState::Lost, |scope, step, _| {
            if step == Step::Entry {
                let ctx = scope.context();
                warn!(du_id = ctx.du_id, ues = ctx.ues.len(), "DU association lost");
            } else {
                debug!(du_id = scope.context().du_id, "event on lost DU ignored");
            }
        })
        .workers(workers)
        .build()
}
