//! RRC message codec
//!
//! RRC messages travel inside F1AP RRC containers, so there is no outer framing:
//! each logical channel message starts with a one-octet message tag (the c1 choice
//! index from TS 38.331) followed by the message body.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{CodecError, OctetReader};
use thiserror::Error;

use crate::procedures::*;

/// RRC codec error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RrcCodecError {
    /// The message is truncated or otherwise malformed
    #[error("malformed RRC message: {0}")]
    Malformed(#[from] CodecError),

    /// The message tag is not handled on this channel
    #[error("unsupported {channel} message type {tag}")]
    UnsupportedMessage {
        /// Logical channel name
        channel: &'static str,
        /// Message tag
        tag: u8,
    },
}

/// Result type for RRC codec operations
pub type Result<T> = std::result::Result<T, RrcCodecError>;

/// A logical channel message type
pub trait RrcMessage: Sized {
    /// Logical channel name for diagnostics
    const CHANNEL: &'static str;

    /// Message tag of this value.
    fn tag(&self) -> u8;

    /// Writes the message body.
    fn write_body(&self, buf: &mut BytesMut);

    /// Reads the body of the message identified by `tag`.
    fn read_body(tag: u8, r: &mut OctetReader<'_>) -> Result<Self>;
}

/// Encode an RRC message
pub fn encode_rrc<T: RrcMessage>(msg: &T) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(msg.tag());
    msg.write_body(&mut buf);
    buf.freeze()
}

/// Decode an RRC message
pub fn decode_rrc<T: RrcMessage>(bytes: &[u8]) -> Result<T> {
    let mut r = OctetReader::new(bytes);
    let tag = r.get_u8()?;
    let msg = T::read_body(tag, &mut r)?;
    r.finish()?;
    Ok(msg)
}

fn unsupported<T: RrcMessage>(tag: u8) -> RrcCodecError {
    RrcCodecError::UnsupportedMessage {
        channel: T::CHANNEL,
        tag,
    }
}

/// UL-CCCH message (UE -> network on SRB0)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlCcchMessage {
    RrcSetupRequest(RrcSetupRequest),
}

impl RrcMessage for UlCcchMessage {
    const CHANNEL: &'static str = "UL-CCCH";

    fn tag(&self) -> u8 {
        match self {
            UlCcchMessage::RrcSetupRequest(_) => 0,
        }
    }

    fn write_body(&self, buf: &mut BytesMut) {
        match self {
            UlCcchMessage::RrcSetupRequest(m) => m.write(buf),
        }
    }

    fn read_body(tag: u8, r: &mut OctetReader<'_>) -> Result<Self> {
        match tag {
            0 => Ok(UlCcchMessage::RrcSetupRequest(RrcSetupRequest::read(r)?)),
            other => Err(unsupported::<Self>(other)),
        }
    }
}

/// DL-CCCH message (network -> UE on SRB0)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlCcchMessage {
    RrcSetup(RrcSetup),
}

impl RrcMessage for DlCcchMessage {
    const CHANNEL: &'static str = "DL-CCCH";

    fn tag(&self) -> u8 {
        match self {
            DlCcchMessage::RrcSetup(_) => 1,
        }
    }

    fn write_body(&self, buf: &mut BytesMut) {
        match self {
            DlCcchMessage::RrcSetup(m) => m.write(buf),
        }
    }

    fn read_body(tag: u8, r: &mut OctetReader<'_>) -> Result<Self> {
        match tag {
            1 => Ok(DlCcchMessage::RrcSetup(RrcSetup::read(r)?)),
            other => Err(unsupported::<Self>(other)),
        }
    }
}

/// UL-DCCH message (UE -> network on SRB1/SRB2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlDcchMessage {
    RrcReconfigurationComplete(RrcReconfigurationComplete),
    RrcSetupComplete(RrcSetupComplete),
    SecurityModeComplete(SecurityModeComplete),
    UlInformationTransfer(UlInformationTransfer),
}

impl UlDcchMessage {
    /// Message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            UlDcchMessage::RrcReconfigurationComplete(_) => "RRCReconfigurationComplete",
            UlDcchMessage::RrcSetupComplete(_) => "RRCSetupComplete",
            UlDcchMessage::SecurityModeComplete(_) => "SecurityModeComplete",
            UlDcchMessage::UlInformationTransfer(_) => "ULInformationTransfer",
        }
    }
}

impl RrcMessage for UlDcchMessage {
    const CHANNEL: &'static str = "UL-DCCH";

    fn tag(&self) -> u8 {
        match self {
            UlDcchMessage::RrcReconfigurationComplete(_) => 1,
            UlDcchMessage::RrcSetupComplete(_) => 2,
            UlDcchMessage::SecurityModeComplete(_) => 5,
            UlDcchMessage::UlInformationTransfer(_) => 7,
        }
    }

    fn write_body(&self, buf: &mut BytesMut) {
        match self {
            UlDcchMessage::RrcReconfigurationComplete(m) => m.write(buf),
            UlDcchMessage::RrcSetupComplete(m) => m.write(buf),
            UlDcchMessage::SecurityModeComplete(m) => m.write(buf),
            UlDcchMessage::UlInformationTransfer(m) => m.write(buf),
        }
    }

    fn read_body(tag: u8, r: &mut OctetReader<'_>) -> Result<Self> {
        match tag {
            1 => Ok(UlDcchMessage::RrcReconfigurationComplete(
                RrcReconfigurationComplete::read(r)?,
            )),
            2 => Ok(UlDcchMessage::RrcSetupComplete(RrcSetupComplete::read(r)?)),
            5 => Ok(UlDcchMessage::SecurityModeComplete(SecurityModeComplete::read(r)?)),
            7 => Ok(UlDcchMessage::UlInformationTransfer(UlInformationTransfer::read(r)?)),
            other => Err(unsupported::<Self>(other)),
        }
    }
}

/// DL-DCCH message (network -> UE on SRB1/SRB2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlDcchMessage {
    RrcReconfiguration(RrcReconfiguration),
    SecurityModeCommand(SecurityModeCommand),
    DlInformationTransfer(DlInformationTransfer),
}

impl DlDcchMessage {
    /// Message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            DlDcchMessage::RrcReconfiguration(_) => "RRCReconfiguration",
            DlDcchMessage::SecurityModeCommand(_) => "SecurityModeCommand",
            DlDcchMessage::DlInformationTransfer(_) => "DLInformationTransfer",
        }
    }
}

impl RrcMessage for DlDcchMessage {
    const CHANNEL: &'static str = "DL-DCCH";

    fn tag(&self) -> u8 {
        match self {
            DlDcchMessage::RrcReconfiguration(_) => 0,
            DlDcchMessage::SecurityModeCommand(_) => 4,
            DlDcchMessage::DlInformationTransfer(_) => 5,
        }
    }

    fn write_body(&self, buf: &mut BytesMut) {
        match self {
            DlDcchMessage::RrcReconfiguration(m) => m.write(buf),
            DlDcchMessage::SecurityModeCommand(m) => m.write(buf),
            DlDcchMessage::DlInformationTransfer(m) => m.write(buf),
        }
    }

    fn read_body(tag: u8, r: &mut OctetReader<'_>) -> Result<Self> {
        match tag {
            0 => Ok(DlDcchMessage::RrcReconfiguration(RrcReconfiguration::read(r)?)),
            4 => Ok(DlDcchMessage::SecurityModeCommand(SecurityModeCommand::read(r)?)),
            5 => Ok(DlDcchMessage::DlInformationTransfer(DlInformationTransfer::read(r)?)),
            other => Err(unsupported::<Self>(other)),
        }
    }
}
