//! CU-CP configuration
//!
//! The configuration is read once from YAML at startup and is immutable afterwards.
//! Missing optional fields take their defaults; `validate` reports every problem at once.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{LogFormat, LogLevel};
use crate::types::{NrCgi, Plmn, SNssai};

/// Top-level CU-CP configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CucpConfig {
    /// Node identity, PLMN and served slices
    pub cucp: NodeConfig,
    /// F1 (DU-facing) interface
    #[serde(default)]
    pub f1ap: F1apConfig,
    /// N2 (AMF-facing) interface
    #[serde(default)]
    pub ngap: NgapConfig,
    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Queue sizes, worker counts and shutdown grace
    #[serde(default)]
    pub tunables: Tunables,
}

/// Node identity section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// gNB-CU id sent in F1 setup responses
    #[serde(default = "default_node_id")]
    pub node_id: String,
    /// gNB-CU name
    #[serde(default = "default_node_name")]
    pub node_name: String,
    /// Served PLMN
    pub plmn: PlmnConfig,
    /// Supported slices
    #[serde(default)]
    pub slices: Vec<SliceConfig>,
    /// Tracking area code (24-bit)
    #[serde(default = "default_tac")]
    pub tac: u32,
    /// NR cell identity used in user location information (36-bit)
    #[serde(default)]
    pub nr_cell_identity: u64,
}

/// PLMN as configured: digit strings plus the declared MNC length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlmnConfig {
    /// Mobile country code, 3 digits
    pub mcc: String,
    /// Mobile network code, 2 or 3 digits
    pub mnc: String,
    /// Declared MNC length (2 or 3)
    #[serde(default = "default_mnc_length")]
    pub mnc_length: u8,
}

/// One supported S-NSSAI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Slice/service type
    pub sst: u8,
    /// Slice differentiator as 6 hex digits
    #[serde(default)]
    pub sd: Option<String>,
}

/// F1 interface section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct F1apConfig {
    /// Listen address
    pub local_address: IpAddr,
    /// Listen port
    pub local_port: u16,
    /// Negotiated stream counts
    pub sctp: StreamConfig,
    /// Procedure timers
    pub timers: F1Timers,
}

/// F1 procedure timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct F1Timers {
    /// Time a DU has to complete F1 setup after connecting
    pub f1_setup_ms: u64,
}

/// N2 interface section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NgapConfig {
    /// Global gNB id
    pub gnb_id: u32,
    /// gNB id length in bits (22-32)
    pub gnb_id_length: u8,
    /// AMF address
    pub amf_address: IpAddr,
    /// AMF port
    pub amf_port: u16,
    /// Local bind address
    pub local_address: IpAddr,
    /// Local bind port (0 for ephemeral)
    pub local_port: u16,
    /// Negotiated stream counts
    pub sctp: StreamConfig,
    /// Time allowed for the NG Setup exchange
    pub ng_setup_timeout_ms: u64,
}

/// Requested stream counts of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Inbound streams
    pub in_streams: u16,
    /// Outbound streams
    pub out_streams: u16,
}

/// Logging section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level; `RUST_LOG` overrides it
    pub level: LogLevel,
    /// Output format
    pub format: LogFormat,
}

/// Runtime tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Capacity of each transport channel's inbound queue
    pub inbound_queue_capacity: usize,
    /// Capacity of each outbound stream worker queue
    pub outbound_queue_capacity: usize,
    /// Concurrent event jobs per state machine
    pub fsm_workers: usize,
    /// Reader tasks per transport channel
    pub reader_tasks: usize,
    /// Grace period for draining work at shutdown
    pub shutdown_grace_ms: u64,
}

fn default_node_id() -> String {
    "1".to_string()
}

fn default_node_name() -> String {
    "cu-cp".to_string()
}

fn default_tac() -> u32 {
    1
}

fn default_mnc_length() -> u8 {
    2
}

impl Default for F1apConfig {
    fn default() -> Self {
        Self {
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 38472,
            sctp: StreamConfig {
                in_streams: 2,
                out_streams: 2,
            },
            timers: F1Timers::default(),
        }
    }
}

impl Default for F1Timers {
    fn default() -> Self {
        Self { f1_setup_ms: 5000 }
    }
}

impl Default for NgapConfig {
    fn default() -> Self {
        Self {
            gnb_id: 1,
            gnb_id_length: 24,
            amf_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            amf_port: 38412,
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_port: 0,
            sctp: StreamConfig {
                in_streams: 3,
                out_streams: 5,
            },
            ng_setup_timeout_ms: 5000,
        }
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            inbound_queue_capacity: 5000,
            outbound_queue_capacity: 1024,
            fsm_workers: 8,
            reader_tasks: 1,
            shutdown_grace_ms: 2000,
        }
    }
}

/// A single configuration problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Invalid PLMN digits or MNC length
    #[error("invalid PLMN: {0}")]
    InvalidPlmn(String),

    /// Invalid slice definition
    #[error("invalid slice: {0}")]
    InvalidSlice(String),

    /// Empty node name or id
    #[error("invalid node identity: {0}")]
    InvalidNode(String),

    /// Value out of range for its field
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        /// Dotted field path
        field: &'static str,
        /// Description of the constraint
        reason: String,
    },
}

/// Every problem found by [`CucpConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl std::error::Error for ConfigValidationErrors {}

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s): ", self.0.len())?;
        for (i, problem) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{problem}")?;
        }
        Ok(())
    }
}

impl PlmnConfig {
    /// Parses the configured digits into a [`Plmn`].
    pub fn to_plmn(&self) -> Result<Plmn, ConfigValidationError> {
        if self.mnc_length != 2 && self.mnc_length != 3 {
            return Err(ConfigValidationError::InvalidPlmn(format!(
                "mnc_length must be 2 or 3, got {}",
                self.mnc_length
            )));
        }
        if self.mnc.len() != self.mnc_length as usize {
            return Err(ConfigValidationError::InvalidPlmn(format!(
                "mnc {:?} does not have {} digits",
                self.mnc, self.mnc_length
            )));
        }
        Plmn::from_digits(&self.mcc, &self.mnc)
            .map_err(|e| ConfigValidationError::InvalidPlmn(e.to_string()))
    }
}

impl SliceConfig {
    /// Parses the slice into an [`SNssai`].
    pub fn to_snssai(&self) -> Result<SNssai, ConfigValidationError> {
        match &self.sd {
            None => Ok(SNssai::new(self.sst)),
            Some(sd) => {
                let raw = hex::decode(sd)
                    .map_err(|e| ConfigValidationError::InvalidSlice(format!("sd {sd:?}: {e}")))?;
                let sd: [u8; 3] = raw.as_slice().try_into().map_err(|_| {
                    ConfigValidationError::InvalidSlice(format!("sd {sd:?} must be 3 octets"))
                })?;
                Ok(SNssai {
                    sst: self.sst,
                    sd: Some(sd),
                })
            }
        }
    }
}

impl CucpConfig {
    /// Parses a configuration from YAML text without validating it.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Checks the whole configuration and reports every problem found.
    pub fn validate(&self) -> Result<(), ConfigValidationErrors> {
        let mut problems = Vec::new();

        if self.cucp.node_name.trim().is_empty() {
            problems.push(ConfigValidationError::InvalidNode(
                "node_name must not be empty".into(),
            ));
        }
        if self.cucp.node_id.trim().is_empty() {
            problems.push(ConfigValidationError::InvalidNode(
                "node_id must not be empty".into(),
            ));
        }
        if let Err(e) = self.cucp.plmn.to_plmn() {
            problems.push(e);
        }
        for slice in &self.cucp.slices {
            if let Err(e) = slice.to_snssai() {
                problems.push(e);
            }
        }
        if self.cucp.tac > 0x00FF_FFFF {
            problems.push(ConfigValidationError::OutOfRange {
                field: "cucp.tac",
                reason: format!("{} does not fit in 24 bits", self.cucp.tac),
            });
        }
        if self.cucp.nr_cell_identity > NrCgi::MAX_CELL_IDENTITY {
            problems.push(ConfigValidationError::OutOfRange {
                field: "cucp.nr_cell_identity",
                reason: format!("{:#x} does not fit in 36 bits", self.cucp.nr_cell_identity),
            });
        }

        if self.f1ap.local_port == 0 {
            problems.push(non_zero("f1ap.local_port"));
        }
        check_streams("f1ap.sctp", &self.f1ap.sctp, &mut problems);

        if !(22..=32).contains(&self.ngap.gnb_id_length) {
            problems.push(ConfigValidationError::OutOfRange {
                field: "ngap.gnb_id_length",
                reason: format!("{} is not within 22..=32", self.ngap.gnb_id_length),
            });
        } else if self.ngap.gnb_id_length < 32 && self.ngap.gnb_id >> self.ngap.gnb_id_length != 0
        {
            problems.push(ConfigValidationError::OutOfRange {
                field: "ngap.gnb_id",
                reason: format!(
                    "{} does not fit in {} bits",
                    self.ngap.gnb_id, self.ngap.gnb_id_length
                ),
            });
        }
        if self.ngap.amf_port == 0 {
            problems.push(non_zero("ngap.amf_port"));
        }
        check_streams("ngap.sctp", &self.ngap.sctp, &mut problems);
        if self.ngap.ng_setup_timeout_ms == 0 {
            problems.push(non_zero("ngap.ng_setup_timeout_ms"));
        }

        let t = &self.tunables;
        for (field, value) in [
            ("tunables.inbound_queue_capacity", t.inbound_queue_capacity),
            ("tunables.outbound_queue_capacity", t.outbound_queue_capacity),
            ("tunables.fsm_workers", t.fsm_workers),
            ("tunables.reader_tasks", t.reader_tasks),
        ] {
            if value == 0 {
                problems.push(non_zero(field));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationErrors(problems))
        }
    }

    /// Configured PLMN. Call after a successful [`validate`](Self::validate).
    pub fn plmn(&self) -> Result<Plmn, ConfigValidationError> {
        self.cucp.plmn.to_plmn()
    }

    /// Configured slices. Call after a successful [`validate`](Self::validate).
    pub fn slices(&self) -> Result<Vec<SNssai>, ConfigValidationError> {
        self.cucp.slices.iter().map(SliceConfig::to_snssai).collect()
    }
}

fn non_zero(field: &'static str) -> ConfigValidationError {
    ConfigValidationError::OutOfRange {
        field,
        reason: "must be non-zero".into(),
    }
}

fn check_streams(
    field: &'static str,
    streams: &StreamConfig,
    problems: &mut Vec<ConfigValidationError>,
) {
    if streams.in_streams == 0 || streams.out_streams == 0 {
        problems.push(ConfigValidationError::OutOfRange {
            field,
            reason: format!(
                "in_streams {} and out_streams {} must be non-zero",
                streams.in_streams, streams.out_streams
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
cucp:
  node_id: "7"
  node_name: cu-cp
  plmn: { mcc: "001", mnc: "01", mnc_length: 2 }
  slices: [ { sst: 1, sd: "010203" }, { sst: 2 } ]
  tac: 1
  nr_cell_identity: 16
f1ap:
  local_address: 127.0.0.1
  local_port: 38472
  sctp: { in_streams: 2, out_streams: 2 }
ngap:
  gnb_id: 1
  amf_address: 10.0.0.1
  sctp: { in_streams: 3, out_streams: 5 }
logging: { level: debug, format: text }
"#;

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = CucpConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.cucp.node_id, "7");
        assert_eq!(config.ngap.amf_port, 38412);
        assert_eq!(config.ngap.gnb_id_length, 24);
        assert_eq!(config.f1ap.timers.f1_setup_ms, 5000);
        assert_eq!(config.tunables, Tunables::default());
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());

        let plmn = config.plmn().unwrap();
        assert_eq!(plmn.mcc_digits(), "001");
        assert_eq!(plmn.mnc_digits(), "01");
        let slices = config.slices().unwrap();
        assert_eq!(slices, vec![SNssai::with_sd_u32(1, 0x010203), SNssai::new(2)]);
    }

    #[test]
    fn test_logging_defaults() {
        let minimal = "cucp:\n  plmn: { mcc: \"999\", mnc: \"999\", mnc_length: 3 }\n";
        let config = CucpConfig::from_yaml(minimal).unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = CucpConfig::from_yaml(SAMPLE).unwrap();
        config.cucp.node_name = String::new();
        config.cucp.plmn.mnc_length = 3;
        config.cucp.slices.push(SliceConfig {
            sst: 1,
            sd: Some("zz".into()),
        });
        config.f1ap.sctp.out_streams = 0;
        config.tunables.fsm_workers = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.0.len(), 5);
        assert!(errors
            .0
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidPlmn(_))));
        assert!(errors.to_string().starts_with("5 problem(s)"));
    }

    #[test]
    fn test_gnb_id_must_fit_length() {
        let mut config = CucpConfig::from_yaml(SAMPLE).unwrap();
        config.ngap.gnb_id = 1 << 24;
        let errors = config.validate().unwrap_err();
        assert_eq!(
            errors.0,
            vec![ConfigValidationError::OutOfRange {
                field: "ngap.gnb_id",
                reason: "16777216 does not fit in 24 bits".into(),
            }]
        );
    }
}
