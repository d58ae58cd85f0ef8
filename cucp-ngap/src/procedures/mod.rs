//! NGAP Procedures
//!
//! Message types for the NGAP procedures the CU-CP takes part in (3GPP TS 38.413).

pub mod initial_context_setup;
pub mod initial_ue_message;
pub mod nas_transport;
pub mod ng_setup;
pub mod overload;

pub use initial_context_setup::*;
pub use initial_ue_message::*;
pub use nas_transport::*;
pub use ng_setup::*;
pub use overload::*;
