//! CU-CP context
//!
//! [`CuCpContext`] is built once from the configuration and shared by every task.
//! It owns:
//! - Node identity derived from the configuration
//! - The DU, AMF and UE registries
//! - One state machine per entity kind
//!
//! There is no global lock. Registries are concurrent maps and each entity is
//! serialized by its own state machine lock.

pub mod amf;
pub mod du;
pub mod registry;
pub mod ue;

use std::sync::Arc;

use cucp_common::{
    ConfigValidationError, CucpConfig, NrCgi, Plmn, SNssai, Tunables,
};
use cucp_fsm::{Fsm, FsmError};
use cucp_ngap::{GnbId, NgapCodecError, Tai};
use cucp_sctp::ChannelConfig;
use thiserror::Error;
use tracing::info;

pub use amf::{AmfContext, AmfEvent, AmfHandle, AmfMachine, AmfPayload, AmfState};
pub use du::{DuContext, DuEvent, DuHandle, DuInfo, DuMachine, DuState, ServedCell};
pub use registry::{IdAllocator, Registry, RegistryError};
pub use ue::{UeContext, UeHandle, UeLinks, UeRegistry, UeSetup};

use crate::ue::{build_ue_fsm, UeMachine};

/// Errors building the context. All of them abort startup.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("invalid gNB id: {0}")]
    GnbId(#[from] NgapCodecError),

    #[error("state machine definition rejected: {0}")]
    Engine(#[from] FsmError),
}

/// Node identity, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// gNB-CU id
    pub node_id: String,
    /// gNB-CU name, sent in F1 Setup Response and NG Setup Request
    pub name: String,
    pub plmn: Plmn,
    pub slices: Vec<SNssai>,
    pub tac: u32,
    pub nr_cell_identity: u64,
    pub gnb_id: GnbId,
}

impl NodeInfo {
    pub fn from_config(config: &CucpConfig) -> Result<Self, ContextError> {
        let plmn = config.plmn()?;
        Ok(Self {
            node_id: config.cucp.node_id.clone(),
            name: config.cucp.node_name.clone(),
            plmn,
            slices: config.slices()?,
            tac: config.cucp.tac,
            nr_cell_identity: config.cucp.nr_cell_identity,
            gnb_id: GnbId::new(plmn, config.ngap.gnb_id, config.ngap.gnb_id_length)?,
        })
    }

    /// Tracking area served by this node
    pub fn tai(&self) -> Tai {
        Tai {
            plmn: self.plmn,
            tac: self.tac,
        }
    }

    /// Configured NR-CGI
    pub fn nr_cgi(&self) -> NrCgi {
        NrCgi::new(self.plmn, self.nr_cell_identity)
    }
}

/// Shared CU-CP state
pub struct CuCpContext {
    pub node: Arc<NodeInfo>,
    pub config: CucpConfig,
    pub dus: Registry<u64, DuHandle>,
    pub amfs: Registry<u32, AmfHandle>,
    pub ues: UeRegistry,
    pub du_fsm: Arc<Fsm<DuMachine>>,
    pub amf_fsm: Arc<Fsm<AmfMachine>>,
    pub ue_fsm: Arc<Fsm<UeMachine>>,
    amf_ids: IdAllocator,
}

impl CuCpContext {
    /// Builds the context from a validated configuration.
    ///
    /// Fails if the configuration cannot be turned into node identity or if a
    /// state machine definition is rejected.
    pub fn new(config: &CucpConfig) -> Result<Arc<Self>, ContextError> {
        let node = Arc::new(NodeInfo::from_config(config)?);
        let workers = config.tunables.fsm_workers;

        let context = Self {
            du_fsm: Arc::new(du::build_du_fsm(workers)?),
            amf_fsm: Arc::new(amf::build_amf_fsm(workers)?),
            ue_fsm: Arc::new(build_ue_fsm(Arc::clone(&node), workers)?),
            node,
            config: config.clone(),
            dus: Registry::new("DU"),
            amfs: Registry::new("AMF"),
            ues: UeRegistry::new(),
            amf_ids: IdAllocator::new("AMF", 1),
        };

        info!(
            node = %context.node.name,
            plmn = %context.node.plmn,
            tac = context.node.tac,
            slices = context.node.slices.len(),
            "CU-CP context ready"
        );
        Ok(Arc::new(context))
    }

    pub fn tunables(&self) -> &Tunables {
        &self.config.tunables
    }

    /// Channel settings for `ppid` from the tunables.
    pub fn channel_config(&self, ppid: u32) -> ChannelConfig {
        let tunables = self.tunables();
        ChannelConfig {
            ppid,
            inbound_capacity: tunables.inbound_queue_capacity,
            outbound_capacity: tunables.outbound_queue_capacity,
            readers: tunables.reader_tasks,
        }
    }

    pub fn allocate_amf_id(&self) -> Result<u32, RegistryError> {
        self.amf_ids.allocate()
    }

    /// Active AMF with the highest relative capacity.
    pub fn select_amf(&self) -> Option<Arc<AmfHandle>> {
        self.amfs
            .values()
            .into_iter()
            .filter(|amf| amf.is_active())
            .max_by_key(|amf| amf.entity.with_context(|ctx| ctx.relative_capacity))
    }
}
