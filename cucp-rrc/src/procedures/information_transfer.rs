//! UL/DL Information Transfer (3GPP TS 38.331 Section 5.7.1 and 5.7.2)
//!
//! Carry dedicated NAS messages between the UE and the network once SRB1 is up.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{OctetReader, OctetWriter};

use crate::codec::Result;
use crate::procedures::read_transaction_id;

/// UL Information Transfer (UL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlInformationTransfer {
    pub dedicated_nas_message: Option<Bytes>,
}

/// DL Information Transfer (DL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlInformationTransfer {
    pub transaction_id: u8,
    pub dedicated_nas_message: Option<Bytes>,
}

impl UlInformationTransfer {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_optional(self.dedicated_nas_message.as_ref(), |w, nas| w.put_octets(nas));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            dedicated_nas_message: r.get_optional("dedicated_nas_message", |r| r.get_octets())?,
        })
    }
}

impl DlInformationTransfer {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        buf.put_optional(self.dedicated_nas_message.as_ref(), |w, nas| w.put_octets(nas));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: read_transaction_id(r)?,
            dedicated_nas_message: r.get_optional("dedicated_nas_message", |r| r.get_octets())?,
        })
    }
}
