//! F1AP PDU codec
//!
//! Framing is shared with NGAP (see [`cucp_common::pdu`]). Procedure codes follow
//! 3GPP TS 38.473.

use bytes::Bytes;
use cucp_common::pdu::{decode_pdu_header, encode_pdu, MessageClass, PduHeader};
use cucp_common::CodecError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::procedures::*;

/// F1AP codec error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum F1apCodecError {
    /// The PDU is truncated or otherwise malformed
    #[error("malformed F1AP PDU: {0}")]
    Malformed(#[from] CodecError),

    /// gNB-DU ID outside 0..2^36
    #[error("gNB-DU ID {0} exceeds 36 bits")]
    DuIdOutOfRange(u64),
}

/// Result type for F1AP codec operations
pub type Result<T> = std::result::Result<T, F1apCodecError>;

/// F1AP elementary procedure codes used by the CU-CP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProcedureCode {
    F1Setup = 1,
    UeContextSetup = 5,
    InitialUlRrcMessageTransfer = 11,
    DlRrcMessageTransfer = 12,
    UlRrcMessageTransfer = 13,
}

/// A decoded F1AP PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum F1apPdu {
    F1SetupRequest(F1SetupRequest),
    F1SetupResponse(F1SetupResponse),
    F1SetupFailure(F1SetupFailure),
    InitialUlRrcMessageTransfer(InitialUlRrcMessageTransfer),
    UlRrcMessageTransfer(UlRrcMessageTransfer),
    DlRrcMessageTransfer(DlRrcMessageTransfer),
    UeContextSetupRequest(UeContextSetupRequest),
    UeContextSetupResponse(UeContextSetupResponse),
    /// A well-framed PDU this codec does not understand
    Unsupported {
        class: MessageClass,
        procedure_code: u8,
    },
}

impl F1apPdu {
    /// Message class and raw procedure code of this PDU.
    pub fn header(&self) -> PduHeader {
        use MessageClass::*;
        let (class, code) = match self {
            F1apPdu::F1SetupRequest(_) => (Initiating, ProcedureCode::F1Setup),
            F1apPdu::F1SetupResponse(_) => (Successful, ProcedureCode::F1Setup),
            F1apPdu::F1SetupFailure(_) => (Unsuccessful, ProcedureCode::F1Setup),
            F1apPdu::InitialUlRrcMessageTransfer(_) => {
                (Initiating, ProcedureCode::InitialUlRrcMessageTransfer)
            }
            F1apPdu::UlRrcMessageTransfer(_) => (Initiating, ProcedureCode::UlRrcMessageTransfer),
            F1apPdu::DlRrcMessageTransfer(_) => (Initiating, ProcedureCode::DlRrcMessageTransfer),
            F1apPdu::UeContextSetupRequest(_) => (Initiating, ProcedureCode::UeContextSetup),
            F1apPdu::UeContextSetupResponse(_) => (Successful, ProcedureCode::UeContextSetup),
            F1apPdu::Unsupported {
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
            F1apPdu::F1SetupRequest(_) => "F1SetupRequest",
            F1apPdu::F1SetupResponse(_) => "F1SetupResponse",
            F1apPdu::F1SetupFailure(_) => "F1SetupFailure",
            F1apPdu::InitialUlRrcMessageTransfer(_) => "InitialULRRCMessageTransfer",
            F1apPdu::UlRrcMessageTransfer(_) => "ULRRCMessageTransfer",
            F1apPdu::DlRrcMessageTransfer(_) => "DLRRCMessageTransfer",
            F1apPdu::UeContextSetupRequest(_) => "UEContextSetupRequest",
            F1apPdu::UeContextSetupResponse(_) => "UEContextSetupResponse",
            F1apPdu::Unsupported { .. } => "Unsupported",
        }
    }
}

/// Encode an F1AP PDU.
pub fn encode_f1ap_pdu(pdu: &F1apPdu) -> Bytes {
    encode_pdu(pdu.header(), |buf| match pdu {
        F1apPdu::F1SetupRequest(m) => m.write(buf),
        F1apPdu::F1SetupResponse(m) => m.write(buf),
        F1apPdu::F1SetupFailure(m) => m.write(buf),
        F1apPdu::InitialUlRrcMessageTransfer(m) => m.write(buf),
        F1apPdu::UlRrcMessageTransfer(m) => m.write(buf),
        F1apPdu::DlRrcMessageTransfer(m) => m.write(buf),
        F1apPdu::UeContextSetupRequest(m) => m.write(buf),
        F1apPdu::UeContextSetupResponse(m) => m.write(buf),
        F1apPdu::Unsupported { .. } => {}
    })
}

/// Decode an F1AP PDU.
pub fn decode_f1ap_pdu(bytes: &[u8]) -> Result<F1apPdu> {
    let (header, mut body) = decode_pdu_header(bytes)?;

    let unsupported = F1apPdu::Unsupported {
        class: header.class,
        procedure_code: header.procedure_code,
    };
    let Ok(code) = ProcedureCode::try_from(header.procedure_code) else {
        return Ok(unsupported);
    };

    use MessageClass::*;
    let pdu = match (header.class, code) {
        (Initiating, ProcedureCode::F1Setup) => {
            F1apPdu::F1SetupRequest(F1SetupRequest::read(&mut body)?)
        }
        (Successful, ProcedureCode::F1Setup) => {
            F1apPdu::F1SetupResponse(F1SetupResponse::read(&mut body)?)
        }
        (Unsuccessful, ProcedureCode::F1Setup) => {
            F1apPdu::F1SetupFailure(F1SetupFailure::read(&mut body)?)
        }
        (Initiating, ProcedureCode::InitialUlRrcMessageTransfer) => {
            F1apPdu::InitialUlRrcMessageTransfer(InitialUlRrcMessageTransfer::read(&mut body)?)
        }
        (Initiating, ProcedureCode::UlRrcMessageTransfer) => {
            F1apPdu::UlRrcMessageTransfer(UlRrcMessageTransfer::read(&mut body)?)
        }
        (Initiating, ProcedureCode::DlRrcMessageTransfer) => {
            F1apPdu::DlRrcMessageTransfer(DlRrcMessageTransfer::read(&mut body)?)
        }
        (Initiating, ProcedureCode::UeContextSetup) => {
            F1apPdu::UeContextSetupRequest(UeContextSetupRequest::read(&mut body)?)
        }
        (Successful, ProcedureCode::UeContextSetup) => {
            F1apPdu::UeContextSetupResponse(UeContextSetupResponse::read(&mut body)?)
        }
        _ => return Ok(unsupported),
    };
    body.finish()?;
    Ok(pdu)
}
