//! cucp - 5G CU-CP control plane node
#![allow(missing_docs)]
//!
//! Terminates F1-C towards gNB-DUs and N2 towards one AMF, and runs UE
//! registration across them.
//!
//! # Architecture
//!
//! ```text
//!        DU                      DU
//!         │ F1AP (PPID 62)        │
//! ┌───────┼───────────────────────┼────────────────────┐
//! │  ┌────┴─────┐            ┌────┴─────┐              │
//! │  │ DU router│    ...     │ DU router│   f1         │
//! │  └────┬─────┘            └────┬─────┘              │
//! │       │      ┌──────────┐     │                    │
//! │       └─────►│ UE FSM   │◄────┘        ue          │
//! │              └────┬─────┘                          │
//! │  registries: DUs, AMFs, UEs              context   │
//! │              ┌────┴─────┐                          │
//! │              │AMF router│                ngap      │
//! │              └────┬─────┘                          │
//! └───────────────────┼──────────────────────────────────┘
//!                     │ NGAP (PPID 60)
//!                    AMF
//! ```
//!
//! Each association is read by one router task, which decodes the PDU, finds
//! the addressed entity in a registry and delivers an event to that entity's
//! state machine. Entity actions run under the entity lock and queue outbound
//! PDUs on the bound [`cucp_sctp::TransportChannel`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use cucp::app::{load_config, CucpApp};
//!
//! let config = load_config("config/cucp.yaml")?;
//! let app = CucpApp::start(&config).await?;
//! tokio::signal::ctrl_c().await?;
//! app.shutdown().await;
//! ```

pub mod app;
pub mod context;
pub mod f1;
pub mod ngap;
pub mod ue;

pub use app::{load_config, load_config_from_str, AppError, ConfigError, CucpApp};
pub use context::{
    AmfHandle, AmfState, CuCpContext, DuHandle, DuState, NodeInfo, UeContext, UeHandle,
};
pub use ue::{UeEvent, UeMachine, UePayload, UeState};
