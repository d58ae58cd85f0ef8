//! NGAP (NG Application Protocol) library
//!
//! Message types and a compact binary codec for the NGAP procedures between
//! the CU-CP and the AMF.
//!
//! # Modules
//!
//! - `codec` - PDU framing, procedure codes and the [`NgapPdu`] enum
//! - `procedures` - Per-procedure message types

pub mod codec;
pub mod procedures;

pub use codec::{decode_ngap_pdu, encode_ngap_pdu, NgapCodecError, NgapPdu, ProcedureCode};
pub use procedures::*;
