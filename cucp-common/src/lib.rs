//! Common types and utilities for the CU-CP
//!
//! This crate provides the identifiers, configuration model, logging setup and
//! codec helpers shared by the protocol and application crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod octet;
pub mod pdu;
pub mod types;

pub use config::{
    ConfigValidationError, ConfigValidationErrors, CucpConfig, F1apConfig, LoggingConfig,
    NgapConfig, NodeConfig, StreamConfig, Tunables,
};
pub use error::CodecError;
pub use logging::{init_logging, log_protocol_message, Direction, HexDump, LogFormat, LogLevel};
pub use octet::{OctetReader, OctetWriter};
pub use pdu::{decode_pdu_header, encode_pdu, MessageClass, PduHeader};
pub use types::*;
