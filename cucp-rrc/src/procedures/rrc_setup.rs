//! RRC Setup Procedure
//!
//! Implements the RRC Setup procedure as defined in 3GPP TS 38.331 Section 5.3.3.
//!
//! The procedure consists of three messages:
//! 1. `RRCSetupRequest` - UE → gNB: Initial request to establish RRC connection
//! 2. `RRCSetup` - gNB → UE: SRB1 configuration and the master cell group
//! 3. `RRCSetupComplete` - UE → gNB: Confirmation with the first NAS message

use bytes::{BufMut, Bytes, BytesMut};
use cucp_common::{CodecError, FiveGSTmsi, OctetReader, OctetWriter};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::Result;
use crate::procedures::read_transaction_id;

/// Largest value of a 39-bit initial UE identity
pub const MAX_INITIAL_UE_IDENTITY: u64 = (1 << 39) - 1;

/// Establishment cause for RRC Setup Request
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum EstablishmentCause {
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
}

/// Initial UE identity of an RRC Setup Request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialUeIdentity {
    /// Low 39 bits of the 5G-S-TMSI
    Ng5gSTmsiPart1(u64),
    /// 39-bit random value
    RandomValue(u64),
}

impl InitialUeIdentity {
    fn write(&self, buf: &mut BytesMut) {
        let (choice, value) = match *self {
            InitialUeIdentity::Ng5gSTmsiPart1(v) => (0, v),
            InitialUeIdentity::RandomValue(v) => (1, v),
        };
        buf.put_u8(choice);
        buf.put_u64(value);
    }

    fn read(r: &mut OctetReader<'_>) -> cucp_common::error::Result<Self> {
        let choice = r.get_u8()?;
        let value = r.get_u64()?;
        if value > MAX_INITIAL_UE_IDENTITY {
            return Err(CodecError::InvalidValue {
                field: "ue_identity",
                value,
            });
        }
        match choice {
            0 => Ok(InitialUeIdentity::Ng5gSTmsiPart1(value)),
            1 => Ok(InitialUeIdentity::RandomValue(value)),
            other => Err(CodecError::InvalidValue {
                field: "ue_identity_choice",
                value: other as u64,
            }),
        }
    }
}

/// RRC Setup Request (UL-CCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcSetupRequest {
    pub ue_identity: InitialUeIdentity,
    pub establishment_cause: EstablishmentCause,
}

impl RrcSetupRequest {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        self.ue_identity.write(buf);
        buf.put_u8(self.establishment_cause.into());
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let ue_identity = InitialUeIdentity::read(r)?;
        let raw = r.get_u8()?;
        let establishment_cause =
            EstablishmentCause::try_from(raw).map_err(|_| CodecError::InvalidValue {
                field: "establishment_cause",
                value: raw as u64,
            })?;
        Ok(Self {
            ue_identity,
            establishment_cause,
        })
    }
}

/// Radio bearer configuration: SRB and DRB identities to add or modify
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RadioBearerConfig {
    pub srb_to_add_mod_list: Vec<u8>,
    pub drb_to_add_mod_list: Vec<u8>,
}

impl RadioBearerConfig {
    /// Configuration adding the given SRBs only.
    pub fn srbs(ids: &[u8]) -> Self {
        Self {
            srb_to_add_mod_list: ids.to_vec(),
            drb_to_add_mod_list: Vec::new(),
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_list(&self.srb_to_add_mod_list, |w, id| w.put_u8(*id));
        buf.put_list(&self.drb_to_add_mod_list, |w, id| w.put_u8(*id));
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> cucp_common::error::Result<Self> {
        Ok(Self {
            srb_to_add_mod_list: r.get_list(|r| r.get_u8())?,
            drb_to_add_mod_list: r.get_list(|r| r.get_u8())?,
        })
    }
}

/// RRC Setup (DL-CCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcSetup {
    pub transaction_id: u8,
    pub radio_bearer_config: RadioBearerConfig,
    /// CellGroupConfig generated by the DU
    pub master_cell_group: Bytes,
}

impl RrcSetup {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        self.radio_bearer_config.write(buf);
        buf.put_octets(&self.master_cell_group);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        Ok(Self {
            transaction_id: read_transaction_id(r)?,
            radio_bearer_config: RadioBearerConfig::read(r)?,
            master_cell_group: r.get_octets()?,
        })
    }
}

/// 5G-S-TMSI value of an RRC Setup Complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgSTmsiValue {
    /// High 9 bits, completing the part 1 sent in the Setup Request
    Part2(u16),
    /// Full 48-bit value
    Full(FiveGSTmsi),
}

/// RRC Setup Complete (UL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcSetupComplete {
    pub transaction_id: u8,
    /// Index of the selected PLMN in SIB1 (1-12)
    pub selected_plmn_identity: u8,
    pub ng_5g_s_tmsi_value: Option<NgSTmsiValue>,
    pub dedicated_nas_message: Bytes,
}

impl RrcSetupComplete {
    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.transaction_id);
        buf.put_u8(self.selected_plmn_identity);
        buf.put_optional(self.ng_5g_s_tmsi_value.as_ref(), |w, v| match v {
            NgSTmsiValue::Part2(part2) => {
                w.put_u8(0);
                w.put_u16(*part2);
            }
            NgSTmsiValue::Full(tmsi) => {
                w.put_u8(1);
                w.put_slice(&tmsi.to_bytes());
            }
        });
        buf.put_octets(&self.dedicated_nas_message);
    }

    pub(crate) fn read(r: &mut OctetReader<'_>) -> Result<Self> {
        let transaction_id = read_transaction_id(r)?;
        let selected_plmn_identity = r.get_u8()?;
        let ng_5g_s_tmsi_value = r.get_optional("ng_5g_s_tmsi_value", |r| match r.get_u8()? {
            0 => {
                let part2 = r.get_u16()?;
                if part2 >> FiveGSTmsi::PART2_BITS != 0 {
                    return Err(CodecError::InvalidValue {
                        field: "ng_5g_s_tmsi_part2",
                        value: part2 as u64,
                    });
                }
                Ok(NgSTmsiValue::Part2(part2))
            }
            1 => Ok(NgSTmsiValue::Full(FiveGSTmsi::from_bytes(r.get_array::<6>()?))),
            other => Err(CodecError::InvalidValue {
                field: "ng_5g_s_tmsi_value_choice",
                value: other as u64,
            }),
        })?;
        let dedicated_nas_message = r.get_octets()?;
        Ok(Self {
            transaction_id,
            selected_plmn_identity,
            ng_5g_s_tmsi_value,
            dedicated_nas_message,
        })
    }
}
