//! Core 5G identifiers shared by the CU-CP crates: PLMN, S-NSSAI, NR-CGI and 5G-S-TMSI.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building or decoding identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// MCC is not exactly three decimal digits
    #[error("invalid MCC {0:?}: expected 3 decimal digits")]
    InvalidMcc(String),

    /// MNC is not two or three decimal digits
    #[error("invalid MNC {0:?}: expected 2 or 3 decimal digits")]
    InvalidMnc(String),

    /// A PLMN octet carries a nibble that is not a BCD digit
    #[error("invalid BCD nibble 0x{nibble:X} in PLMN octet {octet}")]
    InvalidBcd {
        /// Octet index (0..3)
        octet: usize,
        /// Offending nibble value
        nibble: u8,
    },

    /// Value does not fit in the declared bit width
    #[error("{name} value {value:#x} exceeds {bits} bits")]
    OutOfRange {
        /// Field name
        name: &'static str,
        /// Offending value
        value: u64,
        /// Allowed width
        bits: u32,
    },
}

/// Public Land Mobile Network identifier.
///
/// A PLMN consists of:
/// - MCC (Mobile Country Code): 3 decimal digits
/// - MNC (Mobile Network Code): 2 or 3 decimal digits
///
/// `long_mnc` records whether the MNC has 3 digits, so "01" and "001" stay distinct.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (range 0-999)
    pub mcc: u16,
    /// Mobile Network Code (range 0-999)
    pub mnc: u16,
    /// True if MNC is 3 digits, false if 2 digits
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a PLMN from numeric MCC and MNC.
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Creates a PLMN from its digit strings, e.g. `("001", "01")`.
    ///
    /// The MNC length is taken from the string, so leading zeros are significant.
    pub fn from_digits(mcc: &str, mnc: &str) -> Result<Self, IdentifierError> {
        if mcc.len() != 3 || !mcc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentifierError::InvalidMcc(mcc.to_string()));
        }
        if !(2..=3).contains(&mnc.len()) || !mnc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentifierError::InvalidMnc(mnc.to_string()));
        }

        let mcc_val = mcc
            .parse::<u16>()
            .map_err(|_| IdentifierError::InvalidMcc(mcc.to_string()))?;
        let mnc_val = mnc
            .parse::<u16>()
            .map_err(|_| IdentifierError::InvalidMnc(mnc.to_string()))?;

        Ok(Self::new(mcc_val, mnc_val, mnc.len() == 3))
    }

    /// MCC rendered as three digits.
    pub fn mcc_digits(&self) -> String {
        format!("{:03}", self.mcc)
    }

    /// MNC rendered as two or three digits depending on `long_mnc`.
    pub fn mnc_digits(&self) -> String {
        if self.long_mnc {
            format!("{:03}", self.mnc)
        } else {
            format!("{:02}", self.mnc)
        }
    }

    /// Encodes the PLMN into its 3-octet BCD form (3GPP TS 24.008).
    ///
    /// - Octet 0: MCC digit 2 (high nibble) | MCC digit 1 (low nibble)
    /// - Octet 1: MNC digit 3 or 0xF (high nibble) | MCC digit 3 (low nibble)
    /// - Octet 2: MNC digit 2 (high nibble) | MNC digit 1 (low nibble)
    pub fn encode(&self) -> [u8; 3] {
        let mcc1 = ((self.mcc / 100) % 10) as u8;
        let mcc2 = ((self.mcc / 10) % 10) as u8;
        let mcc3 = (self.mcc % 10) as u8;

        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            (
                ((self.mnc / 100) % 10) as u8,
                ((self.mnc / 10) % 10) as u8,
                (self.mnc % 10) as u8,
            )
        } else {
            (((self.mnc / 10) % 10) as u8, (self.mnc % 10) as u8, 0x0F)
        };

        [(mcc2 << 4) | mcc1, (mnc3 << 4) | mcc3, (mnc2 << 4) | mnc1]
    }

    /// Decodes a PLMN from its 3-octet BCD form.
    pub fn decode(bytes: [u8; 3]) -> Result<Self, IdentifierError> {
        let digit = |octet: usize, nibble: u8| -> Result<u16, IdentifierError> {
            if nibble > 9 {
                Err(IdentifierError::InvalidBcd { octet, nibble })
            } else {
                Ok(nibble as u16)
            }
        };

        let mcc1 = digit(0, bytes[0] & 0x0F)?;
        let mcc2 = digit(0, bytes[0] >> 4)?;
        let mcc3 = digit(1, bytes[1] & 0x0F)?;
        let mnc1 = digit(2, bytes[2] & 0x0F)?;
        let mnc2 = digit(2, bytes[2] >> 4)?;

        let mcc = 100 * mcc1 + 10 * mcc2 + mcc3;
        let filler = bytes[1] >> 4;
        let (mnc, long_mnc) = if filler == 0x0F {
            (10 * mnc1 + mnc2, false)
        } else {
            (100 * mnc1 + 10 * mnc2 + digit(1, filler)?, true)
        };

        Ok(Self { mcc, mnc, long_mnc })
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plmn({}-{})", self.mcc_digits(), self.mnc_digits())
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mcc_digits(), self.mnc_digits())
    }
}

/// Single Network Slice Selection Assistance Information (S-NSSAI).
///
/// - SST (Slice/Service Type): 8-bit
/// - SD (Slice Differentiator): optional 24-bit
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (24-bit, big-endian)
    pub sd: Option<[u8; 3]>,
}

impl SNssai {
    /// S-NSSAI with only an SST.
    pub const fn new(sst: u8) -> Self {
        Self { sst, sd: None }
    }

    /// S-NSSAI with SST and a 24-bit SD given as a `u32`.
    pub const fn with_sd_u32(sst: u8, sd: u32) -> Self {
        Self {
            sst,
            sd: Some([
                ((sd >> 16) & 0xFF) as u8,
                ((sd >> 8) & 0xFF) as u8,
                (sd & 0xFF) as u8,
            ]),
        }
    }

    /// Returns the SD as a u32 value, or None if SD is not set.
    pub fn sd_as_u32(&self) -> Option<u32> {
        self.sd
            .map(|sd| ((sd[0] as u32) << 16) | ((sd[1] as u32) << 8) | (sd[2] as u32))
    }
}

impl fmt::Debug for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd_as_u32() {
            Some(sd) => write!(f, "SNssai(sst={}, sd={:06X})", self.sst, sd),
            None => write!(f, "SNssai(sst={})", self.sst),
        }
    }
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd_as_u32() {
            Some(sd) => write!(f, "{}-{:06X}", self.sst, sd),
            None => write!(f, "{}", self.sst),
        }
    }
}

/// NR Cell Global Identifier: PLMN + 36-bit NR cell identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NrCgi {
    /// PLMN the cell broadcasts
    pub plmn: Plmn,
    /// NR cell identity (36 bits)
    pub cell_identity: u64,
}

impl NrCgi {
    /// Maximum value of the 36-bit NR cell identity.
    pub const MAX_CELL_IDENTITY: u64 = (1 << 36) - 1;

    /// Creates an NR-CGI, masking the cell identity to 36 bits.
    pub const fn new(plmn: Plmn, cell_identity: u64) -> Self {
        Self {
            plmn,
            cell_identity: cell_identity & Self::MAX_CELL_IDENTITY,
        }
    }
}

impl fmt::Display for NrCgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:09x}", self.plmn, self.cell_identity)
    }
}

/// 5G S-Temporary Mobile Subscriber Identity (48 bits).
///
/// ```text
///  47        38 37      32 31                               0
/// +------------+----------+----------------------------------+
/// | AMF Set ID | AMF Ptr  |              5G-TMSI             |
/// |  10 bits   |  6 bits  |              32 bits             |
/// +------------+----------+----------------------------------+
/// ```
///
/// Over RRC the value travels in two pieces: the low 39 bits ("part 1") in the
/// RRC Setup Request and the high 9 bits ("part 2") in the RRC Setup Complete.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FiveGSTmsi {
    /// AMF Set ID (10 bits)
    pub amf_set_id: u16,
    /// AMF Pointer (6 bits)
    pub amf_pointer: u8,
    /// 5G-TMSI (32 bits)
    pub tmsi: u32,
}

impl FiveGSTmsi {
    /// Width of the part carried in the RRC Setup Request.
    pub const PART1_BITS: u32 = 39;
    /// Width of the part carried in the RRC Setup Complete.
    pub const PART2_BITS: u32 = 9;
    /// Mask for the full 48-bit value.
    pub const VALUE_MASK: u64 = (1 << 48) - 1;
    const PART1_MASK: u64 = (1 << Self::PART1_BITS) - 1;
    const PART2_MASK: u64 = (1 << Self::PART2_BITS) - 1;

    /// Builds the identity from its three fields, masking them to their widths.
    pub const fn new(amf_set_id: u16, amf_pointer: u8, tmsi: u32) -> Self {
        Self {
            amf_set_id: amf_set_id & 0x3FF,
            amf_pointer: amf_pointer & 0x3F,
            tmsi,
        }
    }

    /// Decomposes a 48-bit value. Bits above 47 are ignored.
    pub const fn from_value(value: u64) -> Self {
        Self {
            amf_set_id: ((value >> 38) & 0x3FF) as u16,
            amf_pointer: ((value >> 32) & 0x3F) as u8,
            tmsi: (value & 0xFFFF_FFFF) as u32,
        }
    }

    /// Reassembles the identity from the two RRC pieces as `(part2 << 39) | part1`.
    pub fn from_parts(part1: u64, part2: u16) -> Result<Self, IdentifierError> {
        if part1 > Self::PART1_MASK {
            return Err(IdentifierError::OutOfRange {
                name: "5G-S-TMSI part 1",
                value: part1,
                bits: Self::PART1_BITS,
            });
        }
        if part2 as u64 > Self::PART2_MASK {
            return Err(IdentifierError::OutOfRange {
                name: "5G-S-TMSI part 2",
                value: part2 as u64,
                bits: Self::PART2_BITS,
            });
        }
        Ok(Self::from_value(((part2 as u64) << Self::PART1_BITS) | part1))
    }

    /// The 48-bit value.
    pub const fn value(&self) -> u64 {
        ((self.amf_set_id as u64 & 0x3FF) << 38)
            | ((self.amf_pointer as u64 & 0x3F) << 32)
            | self.tmsi as u64
    }

    /// Low 39 bits, as sent in the RRC Setup Request.
    pub const fn part1(&self) -> u64 {
        self.value() & Self::PART1_MASK
    }

    /// High 9 bits, as sent in the RRC Setup Complete.
    pub const fn part2(&self) -> u16 {
        (self.value() >> Self::PART1_BITS) as u16
    }

    /// Six-byte big-endian rendering.
    pub fn to_bytes(&self) -> [u8; 6] {
        let be = self.value().to_be_bytes();
        [be[2], be[3], be[4], be[5], be[6], be[7]]
    }

    /// Parses the six-byte big-endian rendering.
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        let mut be = [0u8; 8];
        be[2..].copy_from_slice(&bytes);
        Self::from_value(u64::from_be_bytes(be))
    }
}

impl fmt::Debug for FiveGSTmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FiveGSTmsi(set={}, ptr={}, tmsi={:08x})",
            self.amf_set_id, self.amf_pointer, self.tmsi
        )
    }
}
