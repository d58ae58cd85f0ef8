//! RRC (Radio Resource Control) protocol library
#![allow(missing_docs)]
//!
//! Logical channel messages relayed by the CU-CP inside F1AP RRC containers.
//!
//! # Modules
//!
//! - `codec` - Channel message enums and the generic [`encode_rrc`] / [`decode_rrc`]
//! - `procedures` - Per-procedure message types

pub mod codec;
pub mod procedures;

pub use codec::{
    decode_rrc, encode_rrc, DlCcchMessage, DlDcchMessage, RrcCodecError, RrcMessage,
    UlCcchMessage, UlDcchMessage,
};
pub use procedures::*;
