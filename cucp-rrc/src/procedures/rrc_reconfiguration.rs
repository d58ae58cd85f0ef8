//! RRC Reconfiguration Procedure
//!
//! Implements the RRC Reconfiguration procedure as defined in 3GPP TS 38.331 Section 5.3.5.
//! After initial context setup the network adds SRB2 and the default DRB, hands
//! over the DU's cell group configuration and piggybacks pending NAS messages.

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{OctetReader, OctetWriter};

use crate::codec::Result;
use crate::procedures::{read_transaction_id, RadioBearerConfig};

/// RRC Reconfiguration (DL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcReconfiguration {
    pub transaction_id: u8,
    pub radio_bearer_config: Option<RadioBearerConfig>,
    pub master_cell_group: Option<Bytes>,
    /// Dedicated NAS messages, in delivery order
    pub dedicated_nas_message_list: Vec<Bytes>,
}

/// RRC Reconfiguration Complete (UL-DCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcReconfigurationComplete {
    pub transaction_id: u8,
}

impl RrcReconfiguration {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        buf.put_optional(self.radio_bearer_config.as_ref(), |w, rb| rb.write(w));
        buf.put_optional(self.master_cell_group.as_ref(), |w, mcg| w.put_octets(mcg));
        buf.put_list(&self.dedicated_nas_message_list, |w, nas| w.put_octets(nas));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: read_transaction_id(r)?,
            radio_bearer_config: r.get_optional("radio_bearer_config", RadioBearerConfig::read)?,
            master_cell_group: r.get_optional("master_cell_group", |r| r.get_octets())?,
            dedicated_nas_message_list: r.get_list(|r| r.get_octets())?,
        })
    }
}

impl RrcReconfigurationComplete {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: read_transaction_id(r)?,
        })
    }
}
