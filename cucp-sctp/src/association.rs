//! SCTP association management (client side).

use bytes::Bytes;
use sctp_proto::{
    Association, AssociationHandle, ClientConfig, DatagramEvent, Endpoint, EndpointConfig, Event,
    Payload, PayloadProtocolIdentifier, TransportConfig, Transmit,
};
use std::{
    collections::{BTreeSet, VecDeque},
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{net::UdpSocket, time::timeout};
use tracing::{debug, info, trace, warn};

use crate::server::ServerError;

/// NGAP Payload Protocol Identifier (3GPP TS 38.412)
pub const NGAP_PPID: u32 = 60;
/// F1AP Payload Protocol Identifier (3GPP TS 38.472)
pub const F1AP_PPID: u32 = 62;
/// Default number of SCTP streams
pub const DEFAULT_NUM_STREAMS: u16 = 2;
/// Default maximum message size (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65536;
/// Default receive buffer size (256KB)
pub const DEFAULT_RECEIVE_BUFFER_SIZE: u32 = 262144;
/// Size of a single UDP read
pub const READ_BUFFER_SIZE: usize = 8192;

/// SCTP transport errors
#[derive(Debug, Error)]
pub enum SctpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Association closed")]
    AssociationClosed,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Result type for SCTP operations
pub type Result<T> = std::result::Result<T, SctpError>;

/// SCTP association state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Closed,
    Connecting,
    Established,
    ShuttingDown,
}

/// Configuration for an SCTP association
#[derive(Debug, Clone)]
pub struct SctpConfig {
    pub max_outbound_streams: u16,
    pub max_inbound_streams: u16,
    pub max_message_size: u32,
    pub max_receive_buffer_size: u32,
    pub connect_timeout: Duration,
    pub rto_initial_ms: u64,
    pub rto_min_ms: u64,
    pub rto_max_ms: u64,
    /// PPID stamped on inbound messages whose identifier the stack does not
    /// model (every 3GPP identifier, NGAP and F1AP included)
    pub ppid: u32,
}

impl Default for SctpConfig {
    fn default() -> Self {
        Self {
            max_outbound_streams: DEFAULT_NUM_STREAMS,
            max_inbound_streams: DEFAULT_NUM_STREAMS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(30),
            rto_initial_ms: 3000,
            rto_min_ms: 1000,
            rto_max_ms: 60000,
            ppid: NGAP_PPID,
        }
    }
}

impl SctpConfig {
    /// Configuration for an association carrying `ppid` with the given stream counts.
    pub fn with_streams(ppid: u32, in_streams: u16, out_streams: u16) -> Self {
        Self {
            max_inbound_streams: in_streams,
            max_outbound_streams: out_streams,
            ppid,
            ..Self::default()
        }
    }
}

/// A message read from an association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub stream_id: u16,
    pub data: Bytes,
    pub ppid: u32,
}

/// Numeric PPID of an inbound chunk.
///
/// `sctp-proto` only models the WebRTC identifiers; everything else arrives as
/// `Unknown` and is attributed to the association's configured PPID.
pub(crate) fn wire_ppid(ppi: &PayloadProtocolIdentifier, configured: u32) -> u32 {
    match ppi {
        PayloadProtocolIdentifier::Dcep => 50,
        PayloadProtocolIdentifier::String => 51,
        PayloadProtocolIdentifier::Binary => 53,
        PayloadProtocolIdentifier::StringEmpty => 56,
        PayloadProtocolIdentifier::BinaryEmpty => 57,
        PayloadProtocolIdentifier::Unknown => configured,
    }
}

/// Reads the next complete message from any stream of `association`.
///
/// Newly accepted streams join `streams`; every known stream is polled so later
/// messages on an existing stream are not missed.
pub(crate) fn read_message(
    association: &mut Association,
    streams: &mut BTreeSet<u16>,
    configured_ppid: u32,
) -> Option<ReceivedMessage> {
    while let Some(stream) = association.accept_stream() {
        let stream_id = stream.stream_identifier();
        debug!(stream_id, "accepted stream");
        streams.insert(stream_id);
    }

    for &stream_id in streams.iter() {
        let chunks = match association.stream(stream_id) {
            Ok(mut stream) => stream.read(),
            Err(_) => continue,
        };
        let chunks = match chunks {
            Ok(Some(chunks)) => chunks,
            Ok(None) => continue,
            Err(e) => {
                warn!(stream_id, error = %e, "stream read failed");
                continue;
            }
        };

        let ppid = wire_ppid(&chunks.ppi, configured_ppid);
        let mut buf = vec![0u8; chunks.len()];
        match chunks.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                trace!(stream_id, len = n, ppid, "read message");
                return Some(ReceivedMessage {
                    stream_id,
                    data: Bytes::from(buf),
                    ppid,
                });
            }
            Err(e) => warn!(stream_id, error = %e, "failed to copy chunks"),
        }
    }

    None
}

/// Queues `data` on `stream_id`, opening the stream on first use.
pub(crate) fn write_message(
    association: &mut Association,
    streams: &mut BTreeSet<u16>,
    stream_id: u16,
    ppid: u32,
    data: &[u8],
) -> Result<()> {
    let ppi = PayloadProtocolIdentifier::from(ppid);

    let mut stream = if streams.contains(&stream_id) {
        association.stream(stream_id)
    } else {
        association.open_stream(stream_id, ppi)
    }
    .map_err(|e| SctpError::StreamError(e.to_string()))?;

    stream
        .write_with_ppi(data, ppi)
        .map_err(|e| SctpError::StreamError(e.to_string()))?;
    streams.insert(stream_id);

    trace!(stream_id, len = data.len(), ppid, "queued message");
    Ok(())
}

/// Client-side SCTP association over UDP
pub struct SctpAssociation {
    socket: Arc<UdpSocket>,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    endpoint: Endpoint,
    handle: AssociationHandle,
    association: Association,
    state: AssociationState,
    pending_transmits: VecDeque<Transmit>,
    streams: BTreeSet<u16>,
    config: SctpConfig,
}

impl SctpAssociation {
    /// Connect to a remote SCTP endpoint from an ephemeral local port
    pub async fn connect(remote_addr: SocketAddr, config: SctpConfig) -> Result<Self> {
        let local_addr = if remote_addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        Self::connect_with_local(local_addr, remote_addr, config).await
    }

    /// Connect to a remote SCTP endpoint with a specific local address
    pub async fn connect_with_local(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        config: SctpConfig,
    ) -> Result<Self> {
        info!(%remote_addr, "connecting SCTP association");

        let socket = UdpSocket::bind(local_addr).await?;
        let actual_local = socket.local_addr()?;
        debug!(local_addr = %actual_local, "bound local socket");

        let mut endpoint = Endpoint::new(Arc::new(EndpointConfig::new()), None);

        let transport_config = TransportConfig::default()
            .with_max_num_outbound_streams(config.max_outbound_streams)
            .with_max_num_inbound_streams(config.max_inbound_streams)
            .with_max_message_size(config.max_message_size)
            .with_max_receive_buffer_size(config.max_receive_buffer_size)
            .with_rto_initial_ms(config.rto_initial_ms)
            .with_rto_min_ms(config.rto_min_ms)
            .with_rto_max_ms(config.rto_max_ms);

        let mut client_config = ClientConfig::new();
        client_config.transport = Arc::new(transport_config);

        let (handle, association) = endpoint
            .connect(client_config, remote_addr)
            .map_err(|e| SctpError::ConnectionFailed(e.to_string()))?;

        let mut assoc = Self {
            socket: Arc::new(socket),
            remote_addr,
            local_addr: actual_local,
            endpoint,
            handle,
            association,
            state: AssociationState::Connecting,
            pending_transmits: VecDeque::new(),
            streams: BTreeSet::new(),
            config,
        };

        assoc.perform_handshake().await?;

        Ok(assoc)
    }

    /// Perform the SCTP 4-way handshake
    async fn perform_handshake(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.connect_timeout;

        while self.state == AssociationState::Connecting {
            if Instant::now() > deadline {
                return Err(SctpError::Timeout("connection handshake timed out".into()));
            }

            self.flush_transmits().await?;
            self.poll_events();

            if !self.association.is_handshaking() {
                self.state = AssociationState::Established;
                info!(remote_addr = %self.remote_addr, "SCTP association established");
                return Ok(());
            }

            match timeout(Duration::from_millis(100), self.handle_incoming()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "error handling incoming packet"),
                Err(_) => trace!("receive timeout, continuing handshake"),
            }
        }

        if self.state == AssociationState::Established {
            Ok(())
        } else {
            Err(SctpError::ConnectionFailed(format!(
                "association to {} lost during handshake",
                self.remote_addr
            )))
        }
    }

    /// Handle one incoming UDP datagram
    async fn handle_incoming(&mut self) -> Result<()> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);

        trace!(len, %from, "received datagram");

        let now = Instant::now();
        if let Some((handle, event)) = self.endpoint.handle(now, from, None, None, Bytes::from(buf))
        {
            if handle == self.handle {
                match event {
                    DatagramEvent::AssociationEvent(assoc_event) => {
                        self.association.handle_event(assoc_event);
                    }
                    DatagramEvent::NewAssociation(_) => {
                        debug!("ignoring new association event (client mode)");
                    }
                }
            }
        }

        Ok(())
    }

    /// Process association events, timers and pending transmits
    fn poll_events(&mut self) {
        while let Some(event) = self.association.poll() {
            match event {
                Event::Connected => {
                    debug!("association connected event");
                    self.state = AssociationState::Established;
                }
                Event::AssociationLost { reason } => {
                    warn!(remote_addr = %self.remote_addr, %reason, "association lost");
                    self.state = AssociationState::Closed;
                }
                Event::Stream(stream_event) => trace!(?stream_event, "stream event"),
                Event::DatagramReceived => trace!("datagram received event"),
            }
        }

        if let Some(timeout_instant) = self.association.poll_timeout() {
            if Instant::now() >= timeout_instant {
                self.association.handle_timeout(Instant::now());
            }
        }

        while let Some(transmit) = self.association.poll_transmit(Instant::now()) {
            self.pending_transmits.push_back(transmit);
        }

        while let Some(transmit) = self.endpoint.poll_transmit() {
            self.pending_transmits.push_back(transmit);
        }

        if self.association.is_closed() {
            self.state = AssociationState::Closed;
        }
    }

    /// Flush pending transmits to the network
    async fn flush_transmits(&mut self) -> Result<()> {
        while let Some(transmit) = self.pending_transmits.pop_front() {
            match &transmit.payload {
                Payload::RawEncode(chunks) => {
                    for chunk in chunks {
                        self.socket.send_to(chunk, transmit.remote).await?;
                        trace!(len = chunk.len(), remote = %transmit.remote, "sent datagram");
                    }
                }
                Payload::PartialDecode(_) => trace!("skipping PartialDecode payload for transmit"),
            }
        }
        Ok(())
    }

    /// Send data on a stream with the association's PPID
    pub async fn send(&mut self, stream_id: u16, data: &[u8]) -> Result<()> {
        let ppid = self.config.ppid;
        self.send_with_ppid(stream_id, data, ppid).await
    }

    /// Send data on a stream with a custom PPID
    pub async fn send_with_ppid(&mut self, stream_id: u16, data: &[u8], ppid: u32) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(SctpError::InvalidState(
                "cannot send: association not established".into(),
            ));
        }

        write_message(
            &mut self.association,
            &mut self.streams,
            stream_id,
            ppid,
            data,
        )?;

        self.poll_events();
        self.flush_transmits().await
    }

    /// Try to take an already-received message without touching the socket
    pub fn try_recv(&mut self) -> Option<ReceivedMessage> {
        read_message(&mut self.association, &mut self.streams, self.config.ppid)
    }

    /// Wait up to `wait` for one datagram, then process events and flush transmits.
    pub async fn step(&mut self, wait: Duration) -> Result<()> {
        match timeout(wait, self.handle_incoming()).await {
            Ok(result) => result?,
            Err(_) => trace!("idle poll"),
        }
        self.poll_events();
        self.flush_transmits().await
    }

    /// Initiate graceful shutdown and wait up to five seconds for it to complete
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == AssociationState::Closed {
            return Ok(());
        }

        info!(remote_addr = %self.remote_addr, "initiating SCTP shutdown");
        self.state = AssociationState::ShuttingDown;

        let _ = self.association.shutdown();
        self.poll_events();
        self.flush_transmits().await?;

        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.association.is_closed() && Instant::now() < deadline {
            if let Ok(Err(e)) = timeout(Duration::from_millis(100), self.handle_incoming()).await {
                debug!(error = %e, "error while shutting down");
                break;
            }
            self.poll_events();
            self.flush_transmits().await?;
        }

        self.state = AssociationState::Closed;
        info!(remote_addr = %self.remote_addr, "SCTP shutdown complete");
        Ok(())
    }

    /// Close the association immediately
    pub fn close(&mut self) {
        if self.state != AssociationState::Closed {
            let _ = self.association.close();
            self.state = AssociationState::Closed;
        }
    }

    /// Check if the association is established
    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    /// Check if the association is closed
    pub fn is_closed(&self) -> bool {
        self.state == AssociationState::Closed
    }

    /// Current state
    pub fn state(&self) -> AssociationState {
        self.state
    }

    /// Remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Configured outbound stream count
    pub fn out_streams(&self) -> u16 {
        self.config.max_outbound_streams
    }
}

impl Drop for SctpAssociation {
    fn drop(&mut self) {
        self.close();
    }
}
