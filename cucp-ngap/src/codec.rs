//! NGAP PDU codec
//!
//! Every PDU is framed by [`cucp_common::pdu`]: message class, procedure code and
//! body length, followed by the message body. Procedure codes follow TS 38.413.

use bytes::Bytes;
use cucp_common::pdu::{decode_pdu_header, encode_pdu, MessageClass, PduHeader};
use cucp_common::CodecError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::procedures::*;

/// NGAP codec error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NgapCodecError {
    /// The PDU is truncated or otherwise malformed
    #[error("malformed NGAP PDU: {0}")]
    Malformed(#[from] CodecError),

    /// gNB ID bit length outside 22..=32
    #[error("gNB ID length {0} outside 22..=32")]
    InvalidGnbIdLength(u8),

    /// gNB ID does not fit its declared length
    #[error("gNB ID {value:#x} does not fit in {length} bits")]
    GnbIdOutOfRange {
        /// gNB ID value
        value: u32,
        /// Declared bit length
        length: u8,
    },
}

/// Result type for NGAP codec operations
pub type Result<T> = std::result::Result<T, NgapCodecError>;

/// NGAP elementary procedure codes used by the CU-CP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProcedureCode {
    DownlinkNasTransport = 4,
    InitialContextSetup = 14,
    InitialUeMessage = 15,
    NgSetup = 21,
    OverloadStart = 22,
    OverloadStop = 23,
    UplinkNasTransport = 46,
}

/// A decoded NGAP PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NgapPdu {
    NgSetupRequest(NgSetupRequest),
    NgSetupResponse(NgSetupResponse),
    NgSetupFailure(NgSetupFailure),
    InitialUeMessage(InitialUeMessage),
    UplinkNasTransport(UplinkNasTransport),
    DownlinkNasTransport(DownlinkNasTransport),
    InitialContextSetupRequest(InitialContextSetupRequest),
    InitialContextSetupResponse(InitialContextSetupResponse),
    OverloadStart(OverloadStart),
    OverloadStop,
    /// A well-framed PDU this codec does not understand
    Unsupported {
        /// Message class from the header
        class: MessageClass,
        /// Raw procedure code
        procedure_code: u8,
    },
}

impl NgapPdu {
    /// Message class and raw procedure code of this PDU.
    pub fn header(&self) -> PduHeader {
        use MessageClass::*;
        let (class, code) = match self {
            NgapPdu::NgSetupRequest(_) => (Initiating, ProcedureCode::NgSetup),
            NgapPdu::NgSetupResponse(_) => (Successful, ProcedureCode::NgSetup),
            NgapPdu::NgSetupFailure(_) => (Unsuccessful, ProcedureCode::NgSetup),
            NgapPdu::InitialUeMessage(_) => (Initiating, ProcedureCode::InitialUeMessage),
            NgapPdu::UplinkNasTransport(_) => (Initiating, ProcedureCode::UplinkNasTransport),
            NgapPdu::DownlinkNasTransport(_) => (Initiating, ProcedureCode::DownlinkNasTransport),
            NgapPdu::InitialContextSetupRequest(_) => {
                (Initiating, ProcedureCode::InitialContextSetup)
            }
            NgapPdu::InitialContextSetupResponse(_) => {
                (Successful, ProcedureCode::InitialContextSetup)
            }
            NgapPdu::OverloadStart(_) => (Initiating, ProcedureCode::OverloadStart),
            NgapPdu::OverloadStop => (Initiating, ProcedureCode::OverloadStop),
            NgapPdu::Unsupported {
                class,
                procedure_code,
            } => {
                return PduHeader {
                    class: *class,
                    procedure_code: *procedure_code,
                }
            }
        };
        PduHeader {
            class,
            procedure_code: code.into(),
        }
    }

    /// Message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            NgapPdu::NgSetupRequest(_) => "NGSetupRequest",
            NgapPdu::NgSetupResponse(_) => "NGSetupResponse",
            NgapPdu::NgSetupFailure(_) => "NGSetupFailure",
            NgapPdu::InitialUeMessage(_) => "InitialUEMessage",
            NgapPdu::UplinkNasTransport(_) => "UplinkNASTransport",
            NgapPdu::DownlinkNasTransport(_) => "DownlinkNASTransport",
            NgapPdu::InitialContextSetupRequest(_) => "InitialContextSetupRequest",
            NgapPdu::InitialContextSetupResponse(_) => "InitialContextSetupResponse",
            NgapPdu::OverloadStart(_) => "OverloadStart",
            NgapPdu::OverloadStop => "OverloadStop",
            NgapPdu::Unsupported { .. } => "Unsupported",
        }
    }
}

/// Encode an NGAP PDU.
pub fn encode_ngap_pdu(pdu: &NgapPdu) -> Bytes {
    encode_pdu(pdu.header(), |buf| match pdu {
        NgapPdu::NgSetupRequest(m) => m.write(buf),
        NgapPdu::NgSetupResponse(m) => m.write(buf),
        NgapPdu::NgSetupFailure(m) => m.write(buf),
        NgapPdu::InitialUeMessage(m) => m.write(buf),
        NgapPdu::UplinkNasTransport(m) => m.write(buf),
        NgapPdu::DownlinkNasTransport(m) => m.write(buf),
        NgapPdu::InitialContextSetupRequest(m) => m.write(buf),
        NgapPdu::InitialContextSetupResponse(m) => m.write(buf),
        NgapPdu::OverloadStart(m) => m.write(buf),
        NgapPdu::OverloadStop | NgapPdu::Unsupported { .. } => {}
    })
}

/// Decode an NGAP PDU.
///
/// Well-framed PDUs with a procedure code or class this codec does not handle
/// decode to [`NgapPdu::Unsupported`]; their body is not inspected.
pub fn decode_ngap_pdu(bytes: &[u8]) -> Result<NgapPdu> {
    let (header, mut body) = decode_pdu_header(bytes)?;

    let unsupported = NgapPdu::Unsupported {
        class: header.class,
        procedure_code: header.procedure_code,
    };
    let Ok(code) = ProcedureCode::try_from(header.procedure_code) else {
        return Ok(unsupported);
    };

    use MessageClass::*;
    let pdu = match (header.class, code) {
        (Initiating, ProcedureCode::NgSetup) => {
            NgapPdu::NgSetupRequest(NgSetupRequest::read(&mut body)?)
        }
        (Successful, ProcedureCode::NgSetup) => {
            NgapPdu::NgSetupResponse(NgSetupResponse::read(&mut body)?)
        }
        (Unsuccessful, ProcedureCode::NgSetup) => {
            NgapPdu::NgSetupFailure(NgSetupFailure::read(&mut body)?)
        }
        (Initiating, ProcedureCode::InitialUeMessage) => {
            NgapPdu::InitialUeMessage(InitialUeMessage::read(&mut body)?)
        }
        (Initiating, ProcedureCode::UplinkNasTransport) => {
            NgapPdu::UplinkNasTransport(UplinkNasTransport::read(&mut body)?)
        }
        (Initiating, ProcedureCode::DownlinkNasTransport) => {
            NgapPdu::DownlinkNasTransport(DownlinkNasTransport::read(&mut body)?)
        }
        (Initiating, ProcedureCode::InitialContextSetup) => {
            NgapPdu::InitialContextSetupRequest(InitialContextSetupRequest::read(&mut body)?)
        }
        (Successful, ProcedureCode::InitialContextSetup) => {
            NgapPdu::InitialContextSetupResponse(InitialContextSetupResponse::read(&mut body)?)
        }
        (Initiating, ProcedureCode::OverloadStart) => {
            NgapPdu::OverloadStart(OverloadStart::read(&mut body)?)
        }
        (Initiating, ProcedureCode::OverloadStop) => NgapPdu::OverloadStop,
        _ => return Ok(unsupported),
    };
    body.finish()?;
    Ok(pdu)
}
