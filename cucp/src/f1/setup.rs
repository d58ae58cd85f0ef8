//! F1 Setup validation and response building

use cucp_common::Plmn;
use cucp_f1ap::{Cause, CellToActivate, F1SetupRequest, F1SetupResponse};
use cucp_fsm::FsmError;
use thiserror::Error;

use crate::context::NodeInfo;

/// Reasons an F1 Setup Request is refused
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupRejection {
    #[error("expected exactly one served cell, got {0}")]
    CellCount(usize),

    #[error("served cell announces no PLMN")]
    NoServedPlmn,

    #[error("served PLMN {served} is not the configured PLMN {configured}")]
    PlmnMismatch { served: Plmn, configured: Plmn },

    #[error("gNB-DU {0} is already registered")]
    DuIdInUse(u64),

    #[error("DU state machine rejected the setup: {0}")]
    Engine(#[from] FsmError),
}

impl SetupRejection {
    /// Cause carried in the F1 Setup Failure.
    pub fn cause(&self) -> Cause {
        match self {
            SetupRejection::NoServedPlmn | SetupRejection::PlmnMismatch { .. } => {
                Cause::PLMN_NOT_SERVED
            }
            _ => Cause::MISC_UNSPECIFIED,
        }
    }
}

/// Checks the served cell list against the node configuration.
///
/// Exactly one cell is accepted, and its first served PLMN must be the
/// configured one.
pub fn validate_setup_request(
    request: &F1SetupRequest,
    node: &NodeInfo,
) -> Result<(), SetupRejection> {
    let [cell] = request.served_cells.as_slice() else {
        return Err(SetupRejection::CellCount(request.cell_count()));
    };
    let served = cell
        .served_cell_information
        .served_plmns
        .first()
        .ok_or(SetupRejection::NoServedPlmn)?
        .plmn;
    if served != node.plmn {
        return Err(SetupRejection::PlmnMismatch {
            served,
            configured: node.plmn,
        });
    }
    Ok(())
}

/// Builds the response to an accepted request: every served cell is activated
/// and the DU's RRC version is echoed.
pub fn build_setup_response(request: &F1SetupRequest, node: &NodeInfo) -> F1SetupResponse {
    F1SetupResponse {
        transaction_id: request.transaction_id,
        gnb_cu_name: Some(node.name.clone()),
        cells_to_activate: request
            .served_cells
            .iter()
            .map(|item| CellToActivate {
                nr_cgi: item.served_cell_information.nr_cgi,
                nr_pci: Some(item.served_cell_information.nr_pci),
            })
            .collect(),
        rrc_version: request.rrc_version,
    }
}
