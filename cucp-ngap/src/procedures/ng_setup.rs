//! NG Setup Procedure
//!
//! Implements the NG Setup procedure as defined in 3GPP TS 38.413 Section 8.7.1.
//! The gNB sends NG Setup Request once the N2 association is up; the AMF answers
//! with its name, served GUAMIs, relative capacity and the PLMNs and slices it supports.

use std::fmt;

use bytes::{BufMut, BytesMut};
use cucp_common::{OctetReader, OctetWriter, Plmn, SNssai};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::{NgapCodecError, Result};

/// Paging DRX values as defined in 3GPP TS 38.413
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PagingDrx {
    /// 32 radio frames
    V32 = 0,
    /// 64 radio frames
    V64 = 1,
    /// 128 radio frames
    #[default]
    V128 = 2,
    /// 256 radio frames
    V256 = 3,
}

/// gNB ID with PLMN identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnbId {
    /// PLMN Identity
    pub plmn: Plmn,
    /// gNB ID value (22-32 bits)
    pub value: u32,
    /// gNB ID bit length (22-32)
    pub length: u8,
}

impl GnbId {
    /// Builds a gNB ID, checking the length and that the value fits it.
    pub fn new(plmn: Plmn, value: u32, length: u8) -> Result<Self> {
        if !(22..=32).contains(&length) {
            return Err(NgapCodecError::InvalidGnbIdLength(length));
        }
        if length < 32 && value >> length != 0 {
            return Err(NgapCodecError::GnbIdOutOfRange { value, length });
        }
        Ok(Self {
            plmn,
            value,
            length,
        })
    }
}

/// Broadcast PLMN item of a supported TA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlmnItem {
    /// PLMN Identity
    pub plmn: Plmn,
    /// Slices supported in this PLMN
    pub slice_support_list: Vec<SNssai>,
}

/// Supported TA (Tracking Area) item for NG Setup Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedTaItem {
    /// Tracking Area Code (24 bits)
    pub tac: u32,
    /// PLMNs broadcast in this TA
    pub broadcast_plmn_list: Vec<BroadcastPlmnItem>,
}

/// NG Setup Request (gNB -> AMF)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupRequest {
    /// Global RAN Node ID
    pub gnb_id: GnbId,
    /// RAN Node Name
    pub ran_node_name: Option<String>,
    /// Supported TAs
    pub supported_ta_list: Vec<SupportedTaItem>,
    /// Default Paging DRX
    pub default_paging_drx: PagingDrx,
}

/// GUAMI (Globally Unique AMF Identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guami {
    /// PLMN Identity
    pub plmn: Plmn,
    /// AMF Region ID
    pub amf_region_id: u8,
    /// AMF Set ID (10 bits)
    pub amf_set_id: u16,
    /// AMF Pointer (6 bits)
    pub amf_pointer: u8,
}

/// PLMN support item of NG Setup Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlmnSupportItem {
    /// PLMN Identity
    pub plmn: Plmn,
    /// Slices supported in this PLMN
    pub slice_support_list: Vec<SNssai>,
}

/// NG Setup Response (AMF -> gNB)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupResponse {
    /// AMF Name
    pub amf_name: String,
    /// Served GUAMIs
    pub served_guami_list: Vec<Guami>,
    /// Relative AMF Capacity (0-255)
    pub relative_amf_capacity: u8,
    /// Supported PLMNs and their slices
    pub plmn_support_list: Vec<PlmnSupportItem>,
}

/// NGAP cause, as a group plus the value within that group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(u8),
    Transport(u8),
    Nas(u8),
    Protocol(u8),
    Misc(u8),
}

impl Cause {
    /// misc / unspecified
    pub const MISC_UNSPECIFIED: Cause = Cause::Misc(5);
    /// misc / unknown-PLMN-or-SNPN
    pub const MISC_UNKNOWN_PLMN: Cause = Cause::Misc(4);
    /// protocol / semantic-error
    pub const PROTOCOL_SEMANTIC_ERROR: Cause = Cause::Protocol(4);

    fn group(&self) -> (u8, u8) {
        match *self {
            Cause::RadioNetwork(v) => (0, v),
            Cause::Transport(v) => (1, v),
            Cause::Nas(v) => (2, v),
            Cause::Protocol(v) => (3, v),
            Cause::Misc(v) => (4, v),
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        let (group, value) = self.group();
        buf.put_u8(group);
        buf.put_u8(value);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> cucp_common::error::Result<Self> {
        let group = r.get_u8()?;
        let value = r.get_u8()?;
        match group {
            0 => Ok(Cause::RadioNetwork(value)),
            1 => Ok(Cause::Transport(value)),
            2 => Ok(Cause::Nas(value)),
            3 => Ok(Cause::Protocol(value)),
            4 => Ok(Cause::Misc(value)),
            other => Err(cucp_common::CodecError::InvalidValue {
                field: "cause",
                value: other as u64,
            }),
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(v) => write!(f, "radioNetwork({v})"),
            Cause::Transport(v) => write!(f, "transport({v})"),
            Cause::Nas(v) => write!(f, "nas({v})"),
            Cause::Protocol(v) => write!(f, "protocol({v})"),
            Cause::Misc(v) => write!(f, "misc({v})"),
        }
    }
}

/// Time to wait values
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TimeToWait {
    V1s = 0,
    V2s = 1,
    V5s = 2,
    V10s = 3,
    V20s = 4,
    V60s = 5,
}

/// NG Setup Failure (AMF -> gNB)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupFailure {
    /// Cause of failure
    pub cause: Cause,
    /// Time to wait before retrying
    pub time_to_wait: Option<TimeToWait>,
}

fn write_slices(buf: &mut BytesMut, slices: &[SNssai]) {
    buf.put_list(slices, |w, s| w.put_snssai(s));
}

impl NgSetupRequest {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_plmn(&self.gnb_id.plmn);
        buf.put_u32(self.gnb_id.value);
        buf.put_u8(self.gnb_id.length);
        buf.put_optional(self.ran_node_name.as_ref(), |w, n| w.put_string(n));
        buf.put_list(&self.supported_ta_list, |w, ta| {
            w.put_u32(ta.tac);
            w.put_list(&ta.broadcast_plmn_list, |w, item| {
                w.put_plmn(&item.plmn);
                write_slices(w, &item.slice_support_list);
            });
        });
        buf.put_u8(self.default_paging_drx.into());
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let plmn = r.get_plmn()?;
        let value = r.get_u32()?;
        let length = r.get_u8()?;
        let gnb_id = GnbId::new(plmn, value, length)?;
        let ran_node_name = r.get_optional("ran_node_name", |r| r.get_string("ran_node_name"))?;
        let supported_ta_list = r.get_list(|r| {
            let tac = r.get_u32()?;
            if tac > 0x00FF_FFFF {
                return Err(cucp_common::CodecError::InvalidValue {
                    field: "tac",
                    value: tac as u64,
                });
            }
            let broadcast_plmn_list = r.get_list(|r| {
                Ok(BroadcastPlmnItem {
                    plmn: r.get_plmn()?,
                    slice_support_list: r.get_list(|r| r.get_snssai())?,
                })
            })?;
            Ok(SupportedTaItem {
                tac,
                broadcast_plmn_list,
            })
        })?;
        let drx = r.get_u8()?;
        let default_paging_drx =
            PagingDrx::try_from(drx).map_err(|_| cucp_common::CodecError::InvalidValue {
                field: "default_paging_drx",
                value: drx as u64,
            })?;
        Ok(Self {
            gnb_id,
            ran_node_name,
            supported_ta_list,
            default_paging_drx,
        })
    }
}

impl NgSetupResponse {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_string(&self.amf_name);
        buf.put_list(&self.served_guami_list, |w, g| {
            w.put_plmn(&g.plmn);
            w.put_u8(g.amf_region_id);
            w.put_u16(g.amf_set_id);
            w.put_u8(g.amf_pointer);
        });
        buf.put_u8(self.relative_amf_capacity);
        buf.put_list(&self.plmn_support_list, |w, item| {
            w.put_plmn(&item.plmn);
            write_slices(w, &item.slice_support_list);
        });
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let amf_name = r.get_string("amf_name")?;
        let served_guami_list = r.get_list(|r| {
            let plmn = r.get_plmn()?;
            let amf_region_id = r.get_u8()?;
            let amf_set_id = r.get_u16()?;
            if amf_set_id > 0x3FF {
                return Err(cucp_common::CodecError::InvalidValue {
                    field: "amf_set_id",
                    value: amf_set_id as u64,
                });
            }
            let amf_pointer = r.get_u8()?;
            if amf_pointer > 0x3F {
                return Err(cucp_common::CodecError::InvalidValue {
                    field: "amf_pointer",
                    value: amf_pointer as u64,
                });
            }
            Ok(Guami {
                plmn,
                amf_region_id,
                amf_set_id,
                amf_pointer,
            })
        })?;
        let relative_amf_capacity = r.get_u8()?;
        let plmn_support_list = r.get_list(|r| {
            Ok(PlmnSupportItem {
                plmn: r.get_plmn()?,
                slice_support_list: r.get_list(|r| r.get_snssai())?,
            })
        })?;
        Ok(Self {
            amf_name,
            served_guami_list,
            relative_amf_capacity,
            plmn_support_list,
        })
    }
}

impl NgSetupFailure {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        self.cause.write(buf);
        buf.put_optional(self.time_to_wait.as_ref(), |w, t| w.put_u8((*t).into()));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let cause = Cause::read(r)?;
        let time_to_wait = r.get_optional("time_to_wait", |r| {
            let raw = r.get_u8()?;
            TimeToWait::try_from(raw).map_err(|_| cucp_common::CodecError::InvalidValue {
                field: "time_to_wait",
                value: raw as u64,
            })
        })?;
        Ok(Self {
            cause,
            time_to_wait,
        })
    }
}
