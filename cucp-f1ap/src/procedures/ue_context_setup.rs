//! UE Context Setup Procedure (3GPP TS 38.473 Section 8.3.1)
//!
//! The CU asks the DU to set up SRB2 and the default DRB for a UE; the DU answers
//! with the updated cell group configuration.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{CodecError, NrCgi, OctetReader, OctetWriter};

use crate::codec::Result;
use crate::procedures::rrc_message_transfer::read_srb_id;

/// UE Context Setup Request (CU -> DU)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextSetupRequest {
    /// gNB-CU UE F1AP ID
    pub gnb_cu_ue_f1ap_id: u32,
    /// gNB-DU UE F1AP ID
    pub gnb_du_ue_f1ap_id: Option<u32>,
    /// Special cell the UE is served by
    pub sp_cell_id: NrCgi,
    /// Serving cell index
    pub serv_cell_index: u8,
    /// SRBs to set up
    pub srbs_to_setup: Vec<u8>,
    /// DRB identities to set up (1-32)
    pub drbs_to_setup: Vec<u8>,
    /// RRC container to deliver once the context is set up
    pub rrc_container: Option<Bytes>,
}

/// UE Context Setup Response (DU -> CU)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextSetupResponse {
    /// gNB-CU UE F1AP ID
    pub gnb_cu_ue_f1ap_id: u32,
    /// gNB-DU UE F1AP ID
    pub gnb_du_ue_f1ap_id: u32,
    /// DU-to-CU RRC information (CellGroupConfig)
    pub du_to_cu_rrc_information: Bytes,
}

fn read_drb_id(r: &mut OctetReader<'_>) -> cucp_common::error::Result<u8> {
    let drb_id = r.get_u8()?;
    if !(1..=32).contains(&drb_id) {
        return Err(CodecError::InvalidValue {
            field: "drb_id",
            value: drb_id as u64,
        });
    }
    Ok(drb_id)
}

impl UeContextSetupRequest {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.gnb_cu_ue_f1ap_id);
        buf.put_optional(self.gnb_du_ue_f1ap_id.as_ref(), |w, id| w.put_u32(*id));
        buf.put_nr_cgi(&self.sp_cell_id);
        buf.put_u8(self.serv_cell_index);
        buf.put_list(&self.srbs_to_setup, |w, id| w.put_u8(*id));
        buf.put_list(&self.drbs_to_setup, |w, id| w.put_u8(*id));
        buf.put_optional(self.rrc_container.as_ref(), |w, c| w.put_octets(c));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            gnb_cu_ue_f1ap_id: r.get_u32()?,
            gnb_du_ue_f1ap_id: r.get_optional("gnb_du_ue_f1ap_id", |r| r.get_u32())?,
            sp_cell_id: r.get_nr_cgi()?,
            serv_cell_index: r.get_u8()?,
            srbs_to_setup: r.get_list(read_srb_id)?,
            drbs_to_setup: r.get_list(read_drb_id)?,
            rrc_container: r.get_optional("rrc_container", |r| r.get_octets())?,
        })
    }
}

impl UeContextSetupResponse {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.gnb_cu_ue_f1ap_id);
        buf.put_u32(self.gnb_du_ue_f1ap_id);
        buf.put_octets(&self.du_to_cu_rrc_information);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            gnb_cu_ue_f1ap_id: r.get_u32()?,
            gnb_du_ue_f1ap_id: r.get_u32()?,
            du_to_cu_rrc_information: r.get_octets()?,
        })
    }
}
