//! Common PDU framing for the NGAP and F1AP codecs.
//!
//! ```text
//! +-------+----------------+-------------+------------------+
//! | class | procedure code | body length |       body       |
//! |  u8   |       u8       |     u32     |  `length` octets |
//! +-------+----------------+-------------+------------------+
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::octet::OctetReader;

/// Length of the framing header in octets.
pub const PDU_HEADER_LEN: usize = 6;

/// Elementary procedure message class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageClass {
    /// Initiating message
    Initiating,
    /// Successful outcome
    Successful,
    /// Unsuccessful outcome
    Unsuccessful,
}

impl MessageClass {
    /// Wire value of the class.
    pub const fn as_u8(self) -> u8 {
        match self {
            MessageClass::Initiating => 0,
            MessageClass::Successful => 1,
            MessageClass::Unsuccessful => 2,
        }
    }
}

impl TryFrom<u8> for MessageClass {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageClass::Initiating),
            1 => Ok(MessageClass::Successful),
            2 => Ok(MessageClass::Unsuccessful),
            other => Err(CodecError::UnknownMessageClass(other)),
        }
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageClass::Initiating => write!(f, "initiatingMessage"),
            MessageClass::Successful => write!(f, "successfulOutcome"),
            MessageClass::Unsuccessful => write!(f, "unsuccessfulOutcome"),
        }
    }
}

/// Decoded framing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    /// Message class
    pub class: MessageClass,
    /// Raw procedure code
    pub procedure_code: u8,
}

/// Frames a PDU, letting `write_body` fill in the body.
pub fn encode_pdu(header: PduHeader, write_body: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut body = BytesMut::new();
    write_body(&mut body);

    let mut out = BytesMut::with_capacity(PDU_HEADER_LEN + body.len());
    out.put_u8(header.class.as_u8());
    out.put_u8(header.procedure_code);
    out.put_u32(body.len() as u32);
    out.extend_from_slice(&body);
    out.freeze()
}

/// Parses the framing header and returns a reader positioned on the body.
///
/// The declared body length must match the remaining input exactly.
pub fn decode_pdu_header(data: &[u8]) -> Result<(PduHeader, OctetReader<'_>)> {
    let mut reader = OctetReader::new(data);
    let class = MessageClass::try_from(reader.get_u8()?)?;
    let procedure_code = reader.get_u8()?;
    let declared = reader.get_u32()? as usize;
    if declared != reader.remaining() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: reader.remaining(),
        });
    }
    Ok((
        PduHeader {
            class,
            procedure_code,
        },
        reader,
    ))
}
