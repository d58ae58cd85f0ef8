//! F1AP Procedures
//!
//! Message types for the F1AP procedures the CU-CP takes part in (3GPP TS 38.473).

pub mod f1_setup;
pub mod rrc_message_transfer;
pub mod ue_context_setup;

pub use f1_setup::*;
pub use rrc_message_transfer::*;
pub use ue_context_setup::*;
