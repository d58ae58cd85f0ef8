//! SCTP server accepting associations from peers.
//!
//! One UDP socket carries every association; each one is identified by an
//! `association_id` allocated in arrival order.

use bytes::Bytes;
use sctp_proto::{
    Association, AssociationHandle, DatagramEvent, Endpoint, EndpointConfig, Event, Payload,
    ServerConfig, TransportConfig, Transmit,
};
use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{net::UdpSocket, sync::mpsc, time::timeout};
use tracing::{debug, info, trace, warn};

use crate::association::{
    read_message, write_message, ReceivedMessage, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_RECEIVE_BUFFER_SIZE, F1AP_PPID, READ_BUFFER_SIZE,
};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Server not running")]
    NotRunning,
    #[error("Association not found: {0}")]
    AssociationNotFound(u64),
    #[error("Send error: {0}")]
    SendError(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Server configuration
#[derive(Debug, Clone)]
pub struct SctpServerConfig {
    /// Maximum number of inbound streams per association
    pub max_inbound_streams: u16,
    /// Maximum number of outbound streams per association
    pub max_outbound_streams: u16,
    /// Maximum message size
    pub max_message_size: u32,
    /// Receive buffer size
    pub receive_buffer_size: u32,
    /// PPID attributed to inbound messages the stack does not classify
    pub ppid: u32,
}

impl Default for SctpServerConfig {
    fn default() -> Self {
        Self {
            max_inbound_streams: 2,
            max_outbound_streams: 2,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            ppid: F1AP_PPID,
        }
    }
}

/// Events from the server
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// New association established
    NewAssociation {
        association_id: u64,
        remote_addr: SocketAddr,
    },
    /// Association lost or shut down by the peer
    AssociationClosed { association_id: u64, reason: String },
    /// Data received from an association
    DataReceived {
        association_id: u64,
        message: ReceivedMessage,
    },
}

struct ManagedAssociation {
    association: Association,
    remote_addr: SocketAddr,
    pending_transmits: VecDeque<Transmit>,
    streams: BTreeSet<u16>,
}

/// SCTP server over UDP
pub struct SctpServer {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    endpoint: Endpoint,
    associations: HashMap<AssociationHandle, ManagedAssociation>,
    next_association_id: u64,
    handle_to_id: HashMap<AssociationHandle, u64>,
    id_to_handle: HashMap<u64, AssociationHandle>,
    config: SctpServerConfig,
    event_tx: Option<mpsc::UnboundedSender<ServerEvent>>,
    running: bool,
}

impl SctpServer {
    /// Create a new SCTP server bound to the given address
    pub async fn bind(addr: SocketAddr, config: SctpServerConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;

        info!(%local_addr, ppid = config.ppid, "SCTP server listening");

        let transport_config = TransportConfig::default()
            .with_max_num_inbound_streams(config.max_inbound_streams)
            .with_max_num_outbound_streams(config.max_outbound_streams)
            .with_max_message_size(config.max_message_size)
            .with_max_receive_buffer_size(config.receive_buffer_size);

        let mut server_config = ServerConfig::new();
        server_config.transport = Arc::new(transport_config);

        let endpoint = Endpoint::new(
            Arc::new(EndpointConfig::new()),
            Some(Arc::new(server_config)),
        );

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            endpoint,
            associations: HashMap::new(),
            next_association_id: 1,
            handle_to_id: HashMap::new(),
            id_to_handle: HashMap::new(),
            config,
            event_tx: None,
            running: true,
        })
    }

    /// Local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of active associations
    pub fn num_associations(&self) -> usize {
        self.associations.len()
    }

    /// Set the sender receiving server events
    pub fn set_event_sender(&mut self, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.event_tx = Some(tx);
    }

    fn emit(&self, event: ServerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Wait up to `recv_timeout` for one datagram and process it.
    ///
    /// Returns `true` if a datagram was handled, `false` on timeout.
    pub async fn recv(&mut self, recv_timeout: Duration) -> Result<bool> {
        if !self.running {
            return Err(ServerError::NotRunning);
        }

        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        match timeout(recv_timeout, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                buf.truncate(len);
                trace!(len, %from, "received datagram");
                self.handle_datagram(from, Bytes::from(buf)).await?;
                Ok(true)
            }
            Ok(Err(e)) => Err(ServerError::Io(e)),
            Err(_) => {
                self.process_timeouts().await?;
                Ok(false)
            }
        }
    }

    async fn handle_datagram(&mut self, from: SocketAddr, data: Bytes) -> Result<()> {
        let now = Instant::now();

        if let Some((handle, event)) = self.endpoint.handle(now, from, None, None, data) {
            match event {
                DatagramEvent::NewAssociation(association) => {
                    self.handle_new_association(handle, association, from);
                }
                DatagramEvent::AssociationEvent(assoc_event) => {
                    self.handle_association_event(handle, assoc_event);
                }
            }
        }

        self.flush_all_transmits().await
    }

    fn handle_new_association(
        &mut self,
        handle: AssociationHandle,
        association: Association,
        remote_addr: SocketAddr,
    ) {
        let association_id = self.next_association_id;
        self.next_association_id += 1;

        info!(%remote_addr, association_id, "new SCTP association");

        self.associations.insert(
            handle,
            ManagedAssociation {
                association,
                remote_addr,
                pending_transmits: VecDeque::new(),
                streams: BTreeSet::new(),
            },
        );
        self.handle_to_id.insert(handle, association_id);
        self.id_to_handle.insert(association_id, handle);

        self.emit(ServerEvent::NewAssociation {
            association_id,
            remote_addr,
        });
    }

    fn handle_association_event(
        &mut self,
        handle: AssociationHandle,
        event: sctp_proto::AssociationEvent,
    ) {
        let Some(&association_id) = self.handle_to_id.get(&handle) else {
            return;
        };
        let Some(managed) = self.associations.get_mut(&handle) else {
            return;
        };

        managed.association.handle_event(event);

        let mut lost = None;
        while let Some(evt) = managed.association.poll() {
            match evt {
                Event::Connected => debug!(association_id, "association connected"),
                Event::AssociationLost { reason } => lost = Some(reason.to_string()),
                Event::Stream(_) | Event::DatagramReceived => {}
            }
        }

        while let Some(transmit) = managed.association.poll_transmit(Instant::now()) {
            managed.pending_transmits.push_back(transmit);
        }

        let mut received = Vec::new();
        while let Some(message) = read_message(
            &mut managed.association,
            &mut managed.streams,
            self.config.ppid,
        ) {
            received.push(message);
        }

        let closed = managed.association.is_closed();

        for message in received {
            trace!(association_id, stream_id = message.stream_id, len = message.data.len(), "data received");
            self.emit(ServerEvent::DataReceived {
                association_id,
                message,
            });
        }

        if lost.is_some() || closed {
            let reason = lost.unwrap_or_else(|| "shutdown".to_string());
            warn!(association_id, %reason, "association closed");
            self.emit(ServerEvent::AssociationClosed {
                association_id,
                reason,
            });
        }
    }

    async fn process_timeouts(&mut self) -> Result<()> {
        let now = Instant::now();

        for managed in self.associations.values_mut() {
            if let Some(timeout_instant) = managed.association.poll_timeout() {
                if now >= timeout_instant {
                    managed.association.handle_timeout(now);
                }
            }

            while let Some(transmit) = managed.association.poll_transmit(now) {
                managed.pending_transmits.push_back(transmit);
            }
        }

        self.flush_all_transmits().await
    }

    async fn flush_all_transmits(&mut self) -> Result<()> {
        let mut all_transmits: Vec<Transmit> = Vec::new();

        while let Some(transmit) = self.endpoint.poll_transmit() {
            all_transmits.push(transmit);
        }

        for managed in self.associations.values_mut() {
            all_transmits.extend(managed.pending_transmits.drain(..));
        }

        for transmit in all_transmits {
            self.send_transmit(&transmit).await?;
        }

        Ok(())
    }

    async fn send_transmit(&self, transmit: &Transmit) -> Result<()> {
        match &transmit.payload {
            Payload::RawEncode(chunks) => {
                for chunk in chunks {
                    self.socket.send_to(chunk, transmit.remote).await?;
                    trace!(len = chunk.len(), remote = %transmit.remote, "sent datagram");
                }
            }
            Payload::PartialDecode(_) => {}
        }
        Ok(())
    }

    /// Send data to an association on `stream_id` with `ppid`
    pub async fn send(
        &mut self,
        association_id: u64,
        stream_id: u16,
        ppid: u32,
        data: &[u8],
    ) -> Result<()> {
        let handle = *self
            .id_to_handle
            .get(&association_id)
            .ok_or(ServerError::AssociationNotFound(association_id))?;

        let managed = self
            .associations
            .get_mut(&handle)
            .ok_or(ServerError::AssociationNotFound(association_id))?;

        write_message(
            &mut managed.association,
            &mut managed.streams,
            stream_id,
            ppid,
            data,
        )
        .map_err(|e| ServerError::SendError(e.to_string()))?;

        while let Some(transmit) = managed.association.poll_transmit(Instant::now()) {
            managed.pending_transmits.push_back(transmit);
        }

        self.flush_all_transmits().await
    }

    /// Abort an association and forget it
    pub fn close_association(&mut self, association_id: u64) {
        if let Some(handle) = self.id_to_handle.remove(&association_id) {
            self.handle_to_id.remove(&handle);
            if let Some(mut managed) = self.associations.remove(&handle) {
                let _ = managed.association.close();
                info!(association_id, remote_addr = %managed.remote_addr, "closed association");
            }
        }
    }

    /// Stop the server and abort every association
    pub fn stop(&mut self) {
        info!(local_addr = %self.local_addr, "stopping SCTP server");
        self.running = false;

        for (_, mut managed) in self.associations.drain() {
            let _ = managed.association.close();
        }

        self.handle_to_id.clear();
        self.id_to_handle.clear();
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for SctpServer {
    fn drop(&mut self) {
        if self.running {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = SctpServerConfig::default();
        assert_eq!(config.max_inbound_streams, 2);
        assert_eq!(config.max_outbound_streams, 2);
        assert_eq!(config.ppid, F1AP_PPID);
    }

    #[tokio::test]
    async fn test_server_bind_and_stop() {
        let mut server = SctpServer::bind("127.0.0.1:0".parse().unwrap(), SctpServerConfig::default())
            .await
            .unwrap();

        assert!(server.is_running());
        assert_eq!(server.num_associations(), 0);
        assert_ne!(server.local_addr().port(), 0);

        server.stop();
        assert!(!server.is_running());
        assert!(matches!(
            server.recv(Duration::from_millis(1)).await,
            Err(ServerError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_send_to_unknown_association() {
        let mut server = SctpServer::bind("127.0.0.1:0".parse().unwrap(), SctpServerConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            server.send(42, 0, F1AP_PPID, b"x").await,
            Err(ServerError::AssociationNotFound(42))
        ));
    }
}
