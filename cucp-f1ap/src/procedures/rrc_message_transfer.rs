//! RRC Message Transfer Procedures
//!
//! Initial UL, UL and DL RRC Message Transfer (3GPP TS 38.473 Section 8.4).
//! These carry RRC PDUs between the DU and the CU inside an RRC container,
//! tagged with the SRB they belong to.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{CodecError, NrCgi, OctetReader, OctetWriter};

use crate::codec::Result;

/// Largest SRB identity
pub const MAX_SRB_ID: u8 = 3;

pub(crate) fn read_srb_id(r: &mut OctetReader<'_>) -> cucp_common::error::Result<u8> {
    let srb_id = r.get_u8()?;
    if srb_id > MAX_SRB_ID {
        return Err(CodecError::InvalidValue {
            field: "srb_id",
            value: srb_id as u64,
        });
    }
    Ok(srb_id)
}

/// Initial UL RRC Message Transfer (DU -> CU)
///
/// Sent when the DU receives the first RRC message of a UE on SRB0 (normally
/// an RRC Setup Request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialUlRrcMessageTransfer {
    /// gNB-DU UE F1AP ID
    pub gnb_du_ue_f1ap_id: u32,
    /// Cell the UE accessed
    pub nr_cgi: NrCgi,
    /// C-RNTI assigned by the DU
    pub c_rnti: u16,
    /// UL-CCCH message
    pub rrc_container: Bytes,
    /// DU-to-CU RRC container (CellGroupConfig)
    pub du_to_cu_rrc_container: Option<Bytes>,
}

/// UL RRC Message Transfer (DU -> CU)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlRrcMessageTransfer {
    /// gNB-CU UE F1AP ID
    pub gnb_cu_ue_f1ap_id: u32,
    /// gNB-DU UE F1AP ID
    pub gnb_du_ue_f1ap_id: u32,
    /// SRB the message arrived on
    pub srb_id: u8,
    /// UL-DCCH message
    pub rrc_container: Bytes,
}

/// DL RRC Message Transfer (CU -> DU)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlRrcMessageTransfer {
    /// gNB-CU UE F1AP ID
    pub gnb_cu_ue_f1ap_id: u32,
    /// gNB-DU UE F1AP ID
    pub gnb_du_ue_f1ap_id: u32,
    /// SRB to send the message on
    pub srb_id: u8,
    /// DL-CCCH or DL-DCCH message
    pub rrc_container: Bytes,
    /// Execute Duplication
    pub execute_duplication: bool,
}

impl InitialUlRrcMessageTransfer {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.gnb_du_ue_f1ap_id);
        buf.put_nr_cgi(&self.nr_cgi);
        buf.put_u16(self.c_rnti);
        buf.put_octets(&self.rrc_container);
        buf.put_optional(self.du_to_cu_rrc_container.as_ref(), |w, c| w.put_octets(c));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            gnb_du_ue_f1ap_id: r.get_u32()?,
            nr_cgi: r.get_nr_cgi()?,
            c_rnti: r.get_u16()?,
            rrc_container: r.get_octets()?,
            du_to_cu_rrc_container: r
                .get_optional("du_to_cu_rrc_container", |r| r.get_octets())?,
        })
    }
}

impl UlRrcMessageTransfer {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.gnb_cu_ue_f1ap_id);
        buf.put_u32(self.gnb_du_ue_f1ap_id);
        buf.put_u8(self.srb_id);
        buf.put_octets(&self.rrc_container);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            gnb_cu_ue_f1ap_id: r.get_u32()?,
            gnb_du_ue_f1ap_id: r.get_u32()?,
            srb_id: read_srb_id(r)?,
            rrc_container: r.get_octets()?,
        })
    }
}

impl DlRrcMessageTransfer {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.gnb_cu_ue_f1ap_id);
        buf.put_u32(self.gnb_du_ue_f1ap_id);
        buf.put_u8(self.srb_id);
        buf.put_octets(&self.rrc_container);
        buf.put_bool(self.execute_duplication);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            gnb_cu_ue_f1ap_id: r.get_u32()?,
            gnb_du_ue_f1ap_id: r.get_u32()?,
            srb_id: read_srb_id(r)?,
            rrc_container: r.get_octets()?,
            execute_duplication: r.get_bool("execute_duplication")?,
        })
    }
}
