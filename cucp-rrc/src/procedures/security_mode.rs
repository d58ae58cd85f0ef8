//! Security Mode Procedure
//!
//! Implements the AS security activation of 3GPP TS 38.331 Section 5.3.4: the
//! network sends Security Mode Command with the selected algorithms and the UE
//! confirms with Security Mode Complete. Key derivation is out of scope here; the
//! algorithms are only signalled.

use bytes::{BufMut, BytesMut};
use cucp_common::{CodecError, OctetReader, OctetWriter};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::Result;
use crate::procedures::read_transaction_id;

/// NR ciphering algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CipheringAlgorithm {
    #[default]
    Nea0 = 0,
    Nea1 = 1,
    Nea2 = 2,
    Nea3 = 3,
}

/// NR integrity protection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum IntegrityProtAlgorithm {
    #[default]
    Nia0 = 0,
    Nia1 = 1,
    Nia2 = 2,
    Nia3 = 3,
}

/// Security Mode Command (DL-DCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityModeCommand {
    pub transaction_id: u8,
    pub ciphering_algorithm: CipheringAlgorithm,
    pub integrity_prot_algorithm: Option<IntegrityProtAlgorithm>,
}

/// Security Mode Complete (UL-DCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityModeComplete {
    pub transaction_id: u8,
}

impl SecurityModeCommand {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        buf.put_u8(self.ciphering_algorithm.into());
        buf.put_optional(self.integrity_prot_algorithm.as_ref(), |w, a| {
            w.put_u8((*a).into())
        });
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let transaction_id = read_transaction_id(r)?;
        let raw = r.get_u8()?;
        let ciphering_algorithm =
            CipheringAlgorithm::try_from(raw).map_err(|_| CodecError::InvalidValue {
                field: "ciphering_algorithm",
                value: raw as u64,
            })?;
        let integrity_prot_algorithm = r.get_optional("integrity_prot_algorithm", |r| {
            let raw = r.get_u8()?;
            IntegrityProtAlgorithm::try_from(raw).map_err(|_| CodecError::InvalidValue {
                field: "integrity_prot_algorithm",
                value: raw as u64,
            })
        })?;
        Ok(Self {
            transaction_id,
            ciphering_algorithm,
            integrity_prot_algorithm,
        })
    }
}

impl SecurityModeComplete {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: read_transaction_id(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_rrc, encode_rrc, DlDcchMessage, RrcCodecError};

    #[test]
    fn test_security_mode_command_roundtrip() {
        let msg = DlDcchMessage::SecurityModeCommand(SecurityModeCommand {
            transaction_id: 1,
            ciphering_algorithm: CipheringAlgorithm::Nea2,
            integrity_prot_algorithm: Some(IntegrityProtAlgorithm::Nia2),
        });
        assert_eq!(decode_rrc::<DlDcchMessage>(&encode_rrc(&msg)).unwrap(), msg);
    }

    #[test]
    fn test_unknown_ciphering_algorithm() {
        // tag, transaction id, algorithm 9, no integrity algorithm
        assert_eq!(
            decode_rrc::<DlDcchMessage>(&[4, 0, 9, 0]),
            Err(RrcCodecError::Malformed(CodecError::InvalidValue {
                field: "ciphering_algorithm",
                value: 9
            }))
        );
    }
}
