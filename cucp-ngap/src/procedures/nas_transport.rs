//! NAS Transport Procedures
//!
//! Uplink and Downlink NAS Transport as defined in 3GPP TS 38.413 Section 8.6.
//! These carry NAS PDUs between the gNB and the AMF once the UE has UE-associated
//! logical NG-connection state on both sides.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{CodecError, OctetReader, OctetWriter};

use crate::codec::Result;
use crate::procedures::UserLocationInfoNr;

/// Largest AMF UE NGAP ID (40 bits)
pub const MAX_AMF_UE_NGAP_ID: u64 = (1 << 40) - 1;

pub(crate) fn read_amf_ue_ngap_id(r: &mut OctetReader<'_>) -> cucp_common::error::Result<u64> {
    let id = r.get_u64()?;
    if id > MAX_AMF_UE_NGAP_ID {
        return Err(CodecError::InvalidValue {
            field: "amf_ue_ngap_id",
            value: id,
        });
    }
    Ok(id)
}

/// Uplink NAS Transport (gNB -> AMF)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkNasTransport {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: u64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: u32,
    /// NAS PDU
    pub nas_pdu: Bytes,
    /// User Location Information
    pub user_location: UserLocationInfoNr,
}

/// Downlink NAS Transport (AMF -> gNB)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkNasTransport {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: u64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: u32,
    /// NAS PDU
    pub nas_pdu: Bytes,
}

impl UplinkNasTransport {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u64(self.amf_ue_ngap_id);
        buf.put_u32(self.ran_ue_ngap_id);
        buf.put_octets(&self.nas_pdu);
        self.user_location.write(buf);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            amf_ue_ngap_id: read_amf_ue_ngap_id(r)?,
            ran_ue_ngap_id: r.get_u32()?,
            nas_pdu: r.get_octets()?,
            user_location: UserLocationInfoNr::read(r)?,
        })
    }
}

impl DownlinkNasTransport {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u64(self.amf_ue_ngap_id);
        buf.put_u32(self.ran_ue_ngap_id);
        buf.put_octets(&self.nas_pdu);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            amf_ue_ngap_id: read_amf_ue_ngap_id(r)?,
            ran_ue_ngap_id: r.get_u32()?,
            nas_pdu: r.get_octets()?,
        })
    }
}
