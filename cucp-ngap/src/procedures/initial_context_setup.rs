//! Initial Context Setup Procedure
//!
//! Implements the Initial Context Setup procedure as defined in 3GPP TS 38.413 Section 8.3.1.
//! The AMF establishes the UE context at the gNB: allowed slices, security
//! capabilities and key, optional mobility restrictions, and usually the NAS
//! Registration Accept to relay to the UE.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{OctetReader, OctetWriter, Plmn, SNssai};

use crate::codec::Result;
use crate::procedures::nas_transport::read_amf_ue_ngap_id;
use crate::procedures::Guami;

/// UE Security Capabilities (16-bit algorithm bitmaps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapabilities {
    /// NR encryption algorithms
    pub nr_encryption_algorithms: u16,
    /// NR integrity protection algorithms
    pub nr_integrity_algorithms: u16,
    /// E-UTRA encryption algorithms
    pub eutra_encryption_algorithms: u16,
    /// E-UTRA integrity protection algorithms
    pub eutra_integrity_algorithms: u16,
}

/// Initial Context Setup Request (AMF -> gNB)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupRequest {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: u64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: u32,
    /// GUAMI
    pub guami: Guami,
    /// Allowed NSSAI
    pub allowed_nssai: Vec<SNssai>,
    /// UE Security Capabilities
    pub ue_security_capabilities: UeSecurityCapabilities,
    /// Security Key (K_gNB)
    pub security_key: [u8; 32],
    /// Serving PLMN of the Mobility Restriction List
    pub mobility_restriction: Option<Plmn>,
    /// Masked IMEISV (64 bits)
    pub masked_imeisv: Option<u64>,
    /// NAS PDU, normally a Registration Accept
    pub nas_pdu: Option<Bytes>,
}

/// Initial Context Setup Response (gNB -> AMF)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialContextSetupResponse {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: u64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: u32,
}

impl InitialContextSetupRequest {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u64(self.amf_ue_ngap_id);
        buf.put_u32(self.ran_ue_ngap_id);
        buf.put_plmn(&self.guami.plmn);
        buf.put_u8(self.guami.amf_region_id);
        buf.put_u16(self.guami.amf_set_id);
        buf.put_u8(self.guami.amf_pointer);
        buf.put_list(&self.allowed_nssai, |w, s| w.put_snssai(s));
        let caps = &self.ue_security_capabilities;
        buf.put_u16(caps.nr_encryption_algorithms);
        buf.put_u16(caps.nr_integrity_algorithms);
        buf.put_u16(caps.eutra_encryption_algorithms);
        buf.put_u16(caps.eutra_integrity_algorithms);
        buf.put_slice(&self.security_key);
        buf.put_optional(self.mobility_restriction.as_ref(), |w, p| w.put_plmn(p));
        buf.put_optional(self.masked_imeisv.as_ref(), |w, v| w.put_u64(*v));
        buf.put_optional(self.nas_pdu.as_ref(), |w, nas| w.put_octets(nas));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let amf_ue_ngap_id = read_amf_ue_ngap_id(r)?;
        let ran_ue_ngap_id = r.get_u32()?;
        let guami = Guami {
            plmn: r.get_plmn()?,
            amf_region_id: r.get_u8()?,
            amf_set_id: r.get_u16()?,
            amf_pointer: r.get_u8()?,
        };
        let allowed_nssai = r.get_list(|r| r.get_snssai())?;
        let ue_security_capabilities = UeSecurityCapabilities {
            nr_encryption_algorithms: r.get_u16()?,
            nr_integrity_algorithms: r.get_u16()?,
            eutra_encryption_algorithms: r.get_u16()?,
            eutra_integrity_algorithms: r.get_u16()?,
        };
        let security_key = r.get_array::<32>()?;
        let mobility_restriction = r.get_optional("mobility_restriction", |r| r.get_plmn())?;
        let masked_imeisv = r.get_optional("masked_imeisv", |r| r.get_u64())?;
        let nas_pdu = r.get_optional("nas_pdu", |r| r.get_octets())?;
        Ok(Self {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            guami,
            allowed_nssai,
            ue_security_capabilities,
            security_key,
            mobility_restriction,
            masked_imeisv,
            nas_pdu,
        })
    }
}

impl InitialContextSetupResponse {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u64(self.amf_ue_ngap_id);
        buf.put_u32(self.ran_ue_ngap_id);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            amf_ue_ngap_id: read_amf_ue_ngap_id(r)?,
            ran_ue_ngap_id: r.get_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_ngap_pdu, encode_ngap_pdu, NgapPdu};

    fn create_test_request() -> InitialContextSetupRequest {
        let plmn = Plmn::new(1, 1, false);
        InitialContextSetupRequest {
            amf_ue_ngap_id: 1,
            ran_ue_ngap_id: 1,
            guami: Guami {
                plmn,
                amf_region_id: 2,
                amf_set_id: 1,
                amf_pointer: 0,
            },
            allowed_nssai: vec![SNssai::with_sd_u32(1, 0x010203)],
            ue_security_capabilities: UeSecurityCapabilities {
                nr_encryption_algorithms: 0xE000,
                nr_integrity_algorithms: 0xE000,
                eutra_encryption_algorithms: 0,
                eutra_integrity_algorithms: 0,
            },
            security_key: [0xAB; 32],
            mobility_restriction: Some(plmn),
            masked_imeisv: Some(0x1122_3344_FFFF_6677),
            nas_pdu: Some(Bytes::from_static(&[0x7e, 0x02, 0x42])),
        }
    }

    #[test]
    fn test_initial_context_setup_request_roundtrip() {
        let request = create_test_request();
        let bytes = encode_ngap_pdu(&NgapPdu::InitialContextSetupRequest(request.clone()));
        assert_eq!(
            decode_ngap_pdu(&bytes).unwrap(),
            NgapPdu::InitialContextSetupRequest(request)
        );
    }

    #[test]
    fn test_initial_context_setup_request_without_optionals() {
        let request = InitialContextSetupRequest {
            mobility_restriction: None,
            masked_imeisv: None,
            nas_pdu: None,
            ..create_test_request()
        };
        let bytes = encode_ngap_pdu(&NgapPdu::InitialContextSetupRequest(request));
        let NgapPdu::InitialContextSetupRequest(decoded) = decode_ngap_pdu(&bytes).unwrap() else {
            panic!("expected InitialContextSetupRequest");
        };
        assert!(decoded.mobility_restriction.is_none());
        assert!(decoded.masked_imeisv.is_none());
        assert!(decoded.nas_pdu.is_none());
    }

    #[test]
    fn test_initial_context_setup_response_layout() {
        let response = InitialContextSetupResponse {
            amf_ue_ngap_id: 2,
            ran_ue_ngap_id: 3,
        };
        let bytes = encode_ngap_pdu(&NgapPdu::InitialContextSetupResponse(response));
        assert_eq!(bytes.len(), 6 + 12);
        assert_eq!(&bytes[..2], &[1, 14]);
        assert_eq!(
            decode_ngap_pdu(&bytes).unwrap(),
            NgapPdu::InitialContextSetupResponse(response)
        );
    }
}
