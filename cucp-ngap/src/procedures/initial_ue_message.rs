//! Initial UE Message Procedure
//!
//! Implements the Initial UE Message procedure as defined in 3GPP TS 38.413 Section 8.6.1.
//! The gNB uses it to forward the first uplink NAS message of a UE to the AMF.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{CodecError, FiveGSTmsi, NrCgi, OctetReader, OctetWriter, Plmn};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::Result;

/// RRC Establishment Cause values as defined in 3GPP TS 38.413
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RrcEstablishmentCause {
    Emergency = 0,
    HighPriorityAccess = 1,
    MtAccess = 2,
    MoSignalling = 3,
    MoData = 4,
    MoVoiceCall = 5,
    MoVideoCall = 6,
    MoSms = 7,
    MpsPriorityAccess = 8,
    McsPriorityAccess = 9,
    NotAvailable = 10,
}

/// Tracking Area Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tai {
    /// PLMN Identity
    pub plmn: Plmn,
    /// Tracking Area Code (24 bits)
    pub tac: u32,
}

/// NR user location information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLocationInfoNr {
    /// NR Cell Global Identity
    pub nr_cgi: NrCgi,
    /// Tracking Area Identity
    pub tai: Tai,
}

impl UserLocationInfoNr {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_nr_cgi(&self.nr_cgi);
        buf.put_plmn(&self.tai.plmn);
        buf.put_u32(self.tai.tac);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> cucp_common::error::Result<Self> {
        let nr_cgi = r.get_nr_cgi()?;
        let plmn = r.get_plmn()?;
        let tac = r.get_u32()?;
        if tac > 0x00FF_FFFF {
            return Err(CodecError::InvalidValue {
                field: "tac",
                value: tac as u64,
            });
        }
        Ok(Self {
            nr_cgi,
            tai: Tai { plmn, tac },
        })
    }
}

/// Initial UE Message (gNB -> AMF)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialUeMessage {
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: u32,
    /// NAS PDU
    pub nas_pdu: Bytes,
    /// User Location Information
    pub user_location: UserLocationInfoNr,
    /// RRC Establishment Cause
    pub rrc_establishment_cause: RrcEstablishmentCause,
    /// 5G-S-TMSI, when the UE identified itself with one
    pub five_g_s_tmsi: Option<FiveGSTmsi>,
}

impl InitialUeMessage {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ran_ue_ngap_id);
        buf.put_octets(&self.nas_pdu);
        self.user_location.write(buf);
        buf.put_u8(self.rrc_establishment_cause.into());
        buf.put_optional(self.five_g_s_tmsi.as_ref(), |w, t| w.put_slice(&t.to_bytes()));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let ran_ue_ngap_id = r.get_u32()?;
        let nas_pdu = r.get_octets()?;
        let user_location = UserLocationInfoNr::read(r)?;
        let raw = r.get_u8()?;
        let rrc_establishment_cause =
            RrcEstablishmentCause::try_from(raw).map_err(|_| CodecError::InvalidValue {
                field: "rrc_establishment_cause",
                value: raw as u64,
            })?;
        let five_g_s_tmsi = r.get_optional("five_g_s_tmsi", |r| {
            Ok(FiveGSTmsi::from_bytes(r.get_array::<6>()?))
        })?;
        Ok(Self {
            ran_ue_ngap_id,
            nas_pdu,
            user_location,
            rrc_establishment_cause,
            five_g_s_tmsi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_ngap_pdu, encode_ngap_pdu, NgapCodecError, NgapPdu};

    fn create_test_message() -> InitialUeMessage {
        let plmn = Plmn::new(1, 1, false);
        InitialUeMessage {
            ran_ue_ngap_id: 1,
            nas_pdu: Bytes::from_static(&[0x7e, 0x00, 0x41, 0x79]),
            user_location: UserLocationInfoNr {
                nr_cgi: NrCgi::new(plmn, 0x10),
                tai: Tai { plmn, tac: 1 },
            },
            rrc_establishment_cause: RrcEstablishmentCause::MoSignalling,
            five_g_s_tmsi: None,
        }
    }

    #[test]
    fn test_initial_ue_message_roundtrip() {
        let msg = create_test_message();
        let bytes = encode_ngap_pdu(&NgapPdu::InitialUeMessage(msg.clone()));
        assert_eq!(decode_ngap_pdu(&bytes).unwrap(), NgapPdu::InitialUeMessage(msg));
    }

    #[test]
    fn test_initial_ue_message_carries_s_tmsi() {
        let mut msg = create_test_message();
        msg.five_g_s_tmsi = Some(FiveGSTmsi::new(0x3FF, 0x3F, 0xDEADBEEF));
        let bytes = encode_ngap_pdu(&NgapPdu::InitialUeMessage(msg));
        let NgapPdu::InitialUeMessage(decoded) = decode_ngap_pdu(&bytes).unwrap() else {
            panic!("expected InitialUEMessage");
        };
        let tmsi = decoded.five_g_s_tmsi.unwrap();
        assert_eq!(tmsi.amf_set_id, 0x3FF);
        assert_eq!(tmsi.amf_pointer, 0x3F);
        assert_eq!(tmsi.tmsi, 0xDEADBEEF);
    }

    #[test]
    fn test_unknown_establishment_cause_rejected() {
        let msg = create_test_message();
        let mut bytes = encode_ngap_pdu(&NgapPdu::InitialUeMessage(msg)).to_vec();
        // Cause octet sits right before the trailing S-TMSI presence flag.
        let index = bytes.len() - 2;
        bytes[index] = 42;
        assert_eq!(
            decode_ngap_pdu(&bytes),
            Err(NgapCodecError::Malformed(CodecError::InvalidValue {
                field: "rrc_establishment_cause",
                value: 42
            }))
        );
    }
}
