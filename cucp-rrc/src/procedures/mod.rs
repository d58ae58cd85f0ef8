//! RRC Procedures
//!
//! Message types for the RRC procedures relayed by the CU-CP (3GPP TS 38.331).

pub mod information_transfer;
pub mod rrc_reconfiguration;
pub mod rrc_setup;
pub mod security_mode;

pub use information_transfer::*;
pub use rrc_reconfiguration::*;
pub use rrc_setup::*;
pub use security_mode::*;

use cucp_common::{CodecError, OctetReader};

/// Largest RRC transaction identifier
pub const MAX_TRANSACTION_ID: u8 = 3;

pub(crate) fn read_transaction_id(r: &mut OctetReader<'_>) -> cucp_common::error::Result<u8> {
    let id = r.get_u8()?;
    if id > MAX_TRANSACTION_ID {
        return Err(CodecError::InvalidValue {
            field: "rrc_transaction_identifier",
            value: id as u64,
        });
    }
    Ok(id)
}
