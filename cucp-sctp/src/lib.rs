//! SCTP transport for the CU-CP
#![allow(missing_docs)]
//!
//! Wraps `sctp-proto` (SCTP over UDP, Sans-IO) with tokio drivers and exposes
//! every association through the [`Link`] trait. A [`TransportChannel`] sits on
//! top of a link and provides:
//!
//! - a bounded inbound queue that drops the newest message when full
//! - PPID filtering (NGAP 60, F1AP 62)
//! - round-robin outbound sends over the negotiated streams
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use cucp_sctp::{ChannelConfig, SctpConfig, SctpLink, TransportChannel, NGAP_PPID};
//!
//! async fn connect_to_amf() -> Result<(), Box<dyn std::error::Error>> {
//!     let amf = "192.168.1.1:38412".parse()?;
//!     let link = SctpLink::connect(None, amf, SctpConfig::with_streams(NGAP_PPID, 3, 5)).await?;
//!     let channel = TransportChannel::new(Arc::new(link), ChannelConfig::new(NGAP_PPID));
//!
//!     channel.send(Bytes::from_static(b"NG Setup Request"));
//!     if let Some(msg) = channel.recv().await {
//!         println!("stream {}: {} bytes", msg.stream_id, msg.data.len());
//!     }
//!     channel.close().await;
//!     Ok(())
//! }
//! ```

pub mod association;
pub mod channel;
pub mod link;
pub mod server;

pub use association::{
    AssociationState, ReceivedMessage, Result, SctpAssociation, SctpConfig, SctpError,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_NUM_STREAMS, DEFAULT_RECEIVE_BUFFER_SIZE, F1AP_PPID,
    NGAP_PPID,
};
pub use channel::{ChannelConfig, TransportChannel};
pub use link::{loopback_pair, Link, LoopbackLink, SctpLink, SctpListener, SctpServerLink};
pub use server::{SctpServer, SctpServerConfig, ServerError, ServerEvent};
