//! F1AP (F1 Application Protocol) library
//!
//! Message types and a compact binary codec for the F1-C procedures between the
//! CU-CP and its DUs.
//!
//! # Modules
//!
//! - `codec` - PDU framing, procedure codes and the [`F1apPdu`] enum
//! - `procedures` - Per-procedure message types

pub mod codec;
pub mod procedures;

pub use codec::{decode_f1ap_pdu, encode_f1ap_pdu, F1apCodecError, F1apPdu, ProcedureCode};
pub use procedures::*;
