//! F1 Setup Procedure
//!
//! Implements the F1 Setup procedure as defined in 3GPP TS 38.473 Section 8.2.3.
//! The gNB-DU announces its served cells; the gNB-CU answers with the cells to
//! activate or rejects the request with a cause.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{CodecError, NrCgi, OctetReader, OctetWriter, Plmn, SNssai};

use crate::codec::{F1apCodecError, Result};

/// Largest gNB-DU ID (36 bits)
pub const MAX_GNB_DU_ID: u64 = (1 << 36) - 1;

/// PLMN served by a cell, with its slices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedPlmn {
    /// PLMN Identity
    pub plmn: Plmn,
    /// Slices supported in this PLMN
    pub slices: Vec<SNssai>,
}

/// Served Cell Information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedCellInformation {
    /// NR Cell Global Identity
    pub nr_cgi: NrCgi,
    /// NR Physical Cell ID (0-1007)
    pub nr_pci: u16,
    /// 5GS Tracking Area Code
    pub five_gs_tac: Option<u32>,
    /// Served PLMNs
    pub served_plmns: Vec<ServedPlmn>,
    /// Measurement Timing Configuration
    pub measurement_timing_configuration: Bytes,
}

/// gNB-DU System Information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuSystemInformation {
    /// MIB message
    pub mib: Bytes,
    /// SIB1 message
    pub sib1: Bytes,
}

/// gNB-DU Served Cells item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedCellItem {
    pub served_cell_information: ServedCellInformation,
    pub system_information: Option<DuSystemInformation>,
}

/// F1 Setup Request (DU -> CU)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F1SetupRequest {
    /// Transaction ID
    pub transaction_id: u8,
    /// gNB-DU ID (36 bits)
    pub gnb_du_id: u64,
    /// gNB-DU Name
    pub gnb_du_name: Option<String>,
    /// gNB-DU Served Cells
    pub served_cells: Vec<ServedCellItem>,
    /// Latest RRC version supported by the DU
    pub rrc_version: [u8; 3],
}

/// Cell to be activated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellToActivate {
    /// NR Cell Global Identity
    pub nr_cgi: NrCgi,
    /// NR Physical Cell ID
    pub nr_pci: Option<u16>,
}

/// F1 Setup Response (CU -> DU)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F1SetupResponse {
    /// Transaction ID
    pub transaction_id: u8,
    /// gNB-CU Name
    pub gnb_cu_name: Option<String>,
    /// Cells to be activated
    pub cells_to_activate: Vec<CellToActivate>,
    /// Latest RRC version supported by the CU
    pub rrc_version: [u8; 3],
}

/// F1AP cause, as a group plus the value within that group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(u8),
    Transport(u8),
    Protocol(u8),
    Misc(u8),
}

impl Cause {
    /// misc / unspecified
    pub const MISC_UNSPECIFIED: Cause = Cause::Misc(4);
    /// radioNetwork / cell-not-available
    pub const CELL_NOT_AVAILABLE: Cause = Cause::RadioNetwork(9);
    /// radioNetwork / plmn-not-served-by-the-gNB-CU
    pub const PLMN_NOT_SERVED: Cause = Cause::RadioNetwork(20);
    /// protocol / message-not-compatible-with-receiver-state
    pub const MESSAGE_NOT_COMPATIBLE: Cause = Cause::Protocol(3);

    fn write(&self, buf: &mut BytesMut) {
        let (group, value) = match *self {
            Cause::RadioNetwork(v) => (0, v),
            Cause::Transport(v) => (1, v),
            Cause::Protocol(v) => (2, v),
            Cause::Misc(v) => (3, v),
        };
        buf.put_u8(group);
        buf.put_u8(value);
    }

    fn read(r: &mut OctetReader<'_>) -> cucp_common::error::Result<Self> {
        let group = r.get_u8()?;
        let value = r.get_u8()?;
        match group {
            0 => Ok(Cause::RadioNetwork(value)),
            1 => Ok(Cause::Transport(value)),
            2 => Ok(Cause::Protocol(value)),
            3 => Ok(Cause::Misc(value)),
            other => Err(CodecError::InvalidValue {
                field: "cause",
                value: other as u64,
            }),
        }
    }
}

impl Default for Cause {
    fn default() -> Self {
        Cause::MISC_UNSPECIFIED
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(v) => write!(f, "radioNetwork({v})"),
            Cause::Transport(v) => write!(f, "transport({v})"),
            Cause::Protocol(v) => write!(f, "protocol({v})"),
            Cause::Misc(v) => write!(f, "misc({v})"),
        }
    }
}

/// F1 Setup Failure (CU -> DU)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F1SetupFailure {
    /// Transaction ID
    pub transaction_id: u8,
    /// Cause of failure
    pub cause: Cause,
}

impl F1SetupRequest {
    /// Number of served cells announced.
    pub fn cell_count(&self) -> usize {
        self.served_cells.len()
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        buf.put_u64(self.gnb_du_id);
        buf.put_optional(self.gnb_du_name.as_ref(), |w, n| w.put_string(n));
        buf.put_list(&self.served_cells, |w, cell| {
            let info = &cell.served_cell_information;
            w.put_nr_cgi(&info.nr_cgi);
            w.put_u16(info.nr_pci);
            w.put_optional(info.five_gs_tac.as_ref(), |w, tac| w.put_u32(*tac));
            w.put_list(&info.served_plmns, |w, p| {
                w.put_plmn(&p.plmn);
                w.put_list(&p.slices, |w, s| w.put_snssai(s));
            });
            w.put_octets(&info.measurement_timing_configuration);
            w.put_optional(cell.system_information.as_ref(), |w, si| {
                w.put_octets(&si.mib);
                w.put_octets(&si.sib1);
            });
        });
        buf.put_slice(&self.rrc_version);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let transaction_id = r.get_u8()?;
        let gnb_du_id = r.get_u64()?;
        if gnb_du_id > MAX_GNB_DU_ID {
            return Err(F1apCodecError::DuIdOutOfRange(gnb_du_id));
        }
        let gnb_du_name = r.get_optional("gnb_du_name", |r| r.get_string("gnb_du_name"))?;
        let served_cells = r.get_list(|r| {
            let nr_cgi = r.get_nr_cgi()?;
            let nr_pci = r.get_u16()?;
            if nr_pci > 1007 {
                return Err(CodecError::InvalidValue {
                    field: "nr_pci",
                    value: nr_pci as u64,
                });
            }
            let five_gs_tac = r.get_optional("five_gs_tac", |r| r.get_u32())?;
            let served_plmns = r.get_list(|r| {
                Ok(ServedPlmn {
                    plmn: r.get_plmn()?,
                    slices: r.get_list(|r| r.get_snssai())?,
                })
            })?;
            let measurement_timing_configuration = r.get_octets()?;
            let system_information = r.get_optional("system_information", |r| {
                Ok(DuSystemInformation {
                    mib: r.get_octets()?,
                    sib1: r.get_octets()?,
                })
            })?;
            Ok(ServedCellItem {
                served_cell_information: ServedCellInformation {
                    nr_cgi,
                    nr_pci,
                    five_gs_tac,
                    served_plmns,
                    measurement_timing_configuration,
                },
                system_information,
            })
        })?;
        let rrc_version = r.get_array::<3>()?;
        Ok(Self {
            transaction_id,
            gnb_du_id,
            gnb_du_name,
            served_cells,
            rrc_version,
        })
    }
}

impl F1SetupResponse {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        buf.put_optional(self.gnb_cu_name.as_ref(), |w, n| w.put_string(n));
        buf.put_list(&self.cells_to_activate, |w, cell| {
            w.put_nr_cgi(&cell.nr_cgi);
            w.put_optional(cell.nr_pci.as_ref(), |w, pci| w.put_u16(*pci));
        });
        buf.put_slice(&self.rrc_version);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: r.get_u8()?,
            gnb_cu_name: r.get_optional("gnb_cu_name", |r| r.get_string("gnb_cu_name"))?,
            cells_to_activate: r.get_list(|r| {
                Ok(CellToActivate {
                    nr_cgi: r.get_nr_cgi()?,
                    nr_pci: r.get_optional("nr_pci", |r| r.get_u16())?,
                })
            })?,
            rrc_version: r.get_array::<3>()?,
        })
    }
}

impl F1SetupFailure {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        self.cause.write(buf);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: r.get_u8()?,
            cause: Cause::read(r)?,
        })
    }
}
