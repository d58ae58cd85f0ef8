//! Overload Start / Overload Stop (3GPP TS 38.413 Section 8.7.6 and 8.7.7)

use bytes::{BufMut, BytesMut};
use cucp_common::{CodecError, OctetReader, OctetWriter};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::Result;

/// Overload action requested by the AMF
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OverloadAction {
    RejectNonEmergencyMoDt = 0,
    RejectRrcCrSignalling = 1,
    PermitEmergencySessionsAndMobileTerminatedServicesOnly = 2,
    PermitHighPrioritySessionsAndMobileTerminatedServicesOnly = 3,
}

/// Overload Start (AMF -> gNB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverloadStart {
    pub action: Option<OverloadAction>,
    /// Percentage of traffic to shed (1-99)
    pub traffic_load_reduction: Option<u8>,
}

impl OverloadStart {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_optional(self.action.as_ref(), |w, a| w.put_u8((*a).into()));
        buf.put_optional(self.traffic_load_reduction.as_ref(), |w, p| w.put_u8(*p));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let action = r.get_optional("overload_action", |r| {
            let raw = r.get_u8()?;
            OverloadAction::try_from(raw).map_err(|_| CodecError::InvalidValue {
                field: "overload_action",
                value: raw as u64,
            })
        })?;
        let traffic_load_reduction = r.get_optional("traffic_load_reduction", |r| {
            let pct = r.get_u8()?;
            if !(1..=99).contains(&pct) {
                return Err(CodecError::InvalidValue {
                    field: "traffic_load_reduction",
                    value: pct as u64,
                });
            }
            Ok(pct)
        })?;
        Ok(Self {
            action,
            traffic_load_reduction,
        })
    }
}
