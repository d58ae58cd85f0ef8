//! Message links: the duplex, multi-stream transports a [`TransportChannel`] runs on.
//!
//! [`SctpLink`] drives a client association, [`SctpListener`] hands out one link per
//! accepted association, and [`loopback_pair`] connects two in-memory ends.
//!
//! [`TransportChannel`]: crate::channel::TransportChannel

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::association::{ReceivedMessage, Result, SctpAssociation, SctpConfig, SctpError};
use crate::server::{SctpServer, SctpServerConfig, ServerEvent};

/// How long a driver task waits on its socket before servicing commands again
const DRIVER_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Depth of the queue between a driver task and its link
const DRIVER_QUEUE_DEPTH: usize = 256;

/// A reliable, ordered, multi-stream message transport to one peer.
#[async_trait]
pub trait Link: Send + Sync {
    /// Next inbound message; `Ok(None)` once the peer has gone away.
    async fn recv(&self) -> Result<Option<ReceivedMessage>>;

    /// Sends `data` on `stream_id` tagged with `ppid`.
    async fn send(&self, stream_id: u16, ppid: u32, data: Bytes) -> Result<()>;

    /// Closes the link. Pending and later `recv` calls return `Ok(None)`.
    async fn close(&self);

    /// Number of outbound streams usable with [`send`](Link::send).
    fn out_streams(&self) -> u16;

    /// Printable peer identity.
    fn peer(&self) -> String;
}

enum DriverCommand {
    Send {
        stream_id: u16,
        ppid: u32,
        data: Bytes,
    },
    Close,
}

/// Link over a client-side SCTP association
pub struct SctpLink {
    peer: SocketAddr,
    out_streams: u16,
    commands: mpsc::Sender<DriverCommand>,
    inbound: Mutex<mpsc::Receiver<ReceivedMessage>>,
    driver: StdMutex<Option<JoinHandle<()>>>,
}

impl SctpLink {
    /// Connects to `remote` and spawns the association driver.
    pub async fn connect(
        local: Option<SocketAddr>,
        remote: SocketAddr,
        config: SctpConfig,
    ) -> Result<Self> {
        let association = match local {
            Some(local) => SctpAssociation::connect_with_local(local, remote, config).await?,
            None => SctpAssociation::connect(remote, config).await?,
        };
        let out_streams = association.out_streams();

        let (cmd_tx, cmd_rx) = mpsc::channel(DRIVER_QUEUE_DEPTH);
        let (in_tx, in_rx) = mpsc::channel(DRIVER_QUEUE_DEPTH);
        let driver = tokio::spawn(drive_association(association, cmd_rx, in_tx));

        Ok(Self {
            peer: remote,
            out_streams,
            commands: cmd_tx,
            inbound: Mutex::new(in_rx),
            driver: StdMutex::new(Some(driver)),
        })
    }
}

async fn drive_association(
    mut association: SctpAssociation,
    mut commands: mpsc::Receiver<DriverCommand>,
    inbound: mpsc::Sender<ReceivedMessage>,
) {
    let remote = association.remote_addr();

    'driver: loop {
        loop {
            match commands.try_recv() {
                Ok(DriverCommand::Send {
                    stream_id,
                    ppid,
                    data,
                }) => {
                    if let Err(e) = association.send_with_ppid(stream_id, &data, ppid).await {
                        warn!(%remote, stream_id, error = %e, "SCTP send failed");
                    }
                }
                Ok(DriverCommand::Close) | Err(TryRecvError::Disconnected) => break 'driver,
                Err(TryRecvError::Empty) => break,
            }
        }

        while let Some(message) = association.try_recv() {
            match hand_over(&inbound, message) {
                Delivery::Queued => {}
                Delivery::Dropped => warn!(%remote, "link queue full, inbound message dropped"),
                Delivery::Gone => break 'driver,
            }
        }

        if let Err(e) = association.step(DRIVER_POLL_INTERVAL).await {
            warn!(%remote, error = %e, "SCTP association I/O failed");
            break;
        }

        if association.is_closed() {
            info!(%remote, "SCTP association closed by peer");
            break;
        }
    }

    if let Err(e) = association.shutdown().await {
        debug!(%remote, error = %e, "SCTP shutdown incomplete");
    }
}

/// What became of a message handed from a driver task to its link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Queued,
    /// The link's queue was full
    Dropped,
    /// The link was dropped
    Gone,
}

/// Queues `message` for a link without waiting. A driver task serves the
/// socket for every association it owns, so it never blocks on one of them.
fn hand_over(inbound: &mpsc::Sender<ReceivedMessage>, message: ReceivedMessage) -> Delivery {
    match inbound.try_send(message) {
        Ok(()) => Delivery::Queued,
        Err(TrySendError::Full(_)) => Delivery::Dropped,
        Err(TrySendError::Closed(_)) => Delivery::Gone,
    }
}

#[async_trait]
impl Link for SctpLink {
    async fn recv(&self) -> Result<Option<ReceivedMessage>> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn send(&self, stream_id: u16, ppid: u32, data: Bytes) -> Result<()> {
        self.commands
            .send(DriverCommand::Send {
                stream_id,
                ppid,
                data,
            })
            .await
            .map_err(|_| SctpError::AssociationClosed)
    }

    async fn close(&self) {
        let _ = self.commands.send(DriverCommand::Close).await;
        let driver = self.driver.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(driver) = driver {
            let _ = driver.await;
        }
    }

    fn out_streams(&self) -> u16 {
        self.out_streams
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

enum ListenerCommand {
    Send {
        association_id: u64,
        stream_id: u16,
        ppid: u32,
        data: Bytes,
    },
    Close {
        association_id: u64,
    },
}

/// Accepts SCTP associations and yields one [`Link`] per association
pub struct SctpListener {
    local_addr: SocketAddr,
    accepted: Mutex<mpsc::Receiver<SctpServerLink>>,
    shutdown: watch::Sender<bool>,
    driver: StdMutex<Option<JoinHandle<()>>>,
}

impl SctpListener {
    /// Binds the server socket and spawns the server driver.
    pub async fn bind(addr: SocketAddr, config: SctpServerConfig) -> Result<Self> {
        let out_streams = config.max_outbound_streams;
        let mut server = SctpServer::bind(addr, config).await?;
        let local_addr = server.local_addr();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        server.set_event_sender(event_tx);

        let (accept_tx, accept_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = tokio::spawn(drive_server(
            server,
            event_rx,
            accept_tx,
            shutdown_rx,
            out_streams,
        ));

        Ok(Self {
            local_addr,
            accepted: Mutex::new(accept_rx),
            shutdown: shutdown_tx,
            driver: StdMutex::new(Some(driver)),
        })
    }

    /// Bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Next accepted association; `None` once the listener stopped.
    pub async fn accept(&self) -> Option<SctpServerLink> {
        self.accepted.lock().await.recv().await
    }

    /// Stops the server and aborts every association.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let driver = self.driver.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(driver) = driver {
            let _ = driver.await;
        }
    }
}

async fn drive_server(
    mut server: SctpServer,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    accepted: mpsc::Sender<SctpServerLink>,
    shutdown: watch::Receiver<bool>,
    out_streams: u16,
) {
    let (cmd_tx, mut commands) = mpsc::channel::<ListenerCommand>(DRIVER_QUEUE_DEPTH);
    let mut links: HashMap<u64, mpsc::Sender<ReceivedMessage>> = HashMap::new();

    while !*shutdown.borrow() {
        loop {
            match commands.try_recv() {
                Ok(ListenerCommand::Send {
                    association_id,
                    stream_id,
                    ppid,
                    data,
                }) => {
                    if let Err(e) = server.send(association_id, stream_id, ppid, &data).await {
                        warn!(association_id, stream_id, error = %e, "SCTP send failed");
                    }
                }
                Ok(ListenerCommand::Close { association_id }) => {
                    links.remove(&association_id);
                    server.close_association(association_id);
                }
                Err(_) => break,
            }
        }

        if let Err(e) = server.recv(DRIVER_POLL_INTERVAL).await {
            warn!(error = %e, "SCTP server I/O failed");
            break;
        }

        while let Ok(event) = events.try_recv() {
            match event {
                ServerEvent::NewAssociation {
                    association_id,
                    remote_addr,
                } => {
                    let (in_tx, in_rx) = mpsc::channel(DRIVER_QUEUE_DEPTH);
                    links.insert(association_id, in_tx);
                    let link = SctpServerLink {
                        association_id,
                        peer: remote_addr,
                        out_streams,
                        commands: cmd_tx.clone(),
                        inbound: Mutex::new(in_rx),
                    };
                    if accepted.send(link).await.is_err() {
                        debug!(association_id, "listener dropped, refusing association");
                        links.remove(&association_id);
                        server.close_association(association_id);
                    }
                }
                ServerEvent::DataReceived {
                    association_id,
                    message,
                } => {
                    let Some(tx) = links.get(&association_id) else {
                        continue;
                    };
                    match hand_over(tx, message) {
                        Delivery::Queued => {}
                        Delivery::Dropped => {
                            warn!(association_id, "link queue full, inbound message dropped")
                        }
                        Delivery::Gone => {
                            links.remove(&association_id);
                            server.close_association(association_id);
                        }
                    }
                }
                ServerEvent::AssociationClosed { association_id, .. } => {
                    links.remove(&association_id);
                    server.close_association(association_id);
                }
            }
        }
    }

    server.stop();
}

/// Server-side link for one accepted association
pub struct SctpServerLink {
    association_id: u64,
    peer: SocketAddr,
    out_streams: u16,
    commands: mpsc::Sender<ListenerCommand>,
    inbound: Mutex<mpsc::Receiver<ReceivedMessage>>,
}

impl SctpServerLink {
    /// Server-local association id
    pub fn association_id(&self) -> u64 {
        self.association_id
    }
}

#[async_trait]
impl Link for SctpServerLink {
    async fn recv(&self) -> Result<Option<ReceivedMessage>> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn send(&self, stream_id: u16, ppid: u32, data: Bytes) -> Result<()> {
        self.commands
            .send(ListenerCommand::Send {
                association_id: self.association_id,
                stream_id,
                ppid,
                data,
            })
            .await
            .map_err(|_| SctpError::AssociationClosed)
    }

    async fn close(&self) {
        let _ = self
            .commands
            .send(ListenerCommand::Close {
                association_id: self.association_id,
            })
            .await;
    }

    fn out_streams(&self) -> u16 {
        self.out_streams
    }

    fn peer(&self) -> String {
        format!("{}#{}", self.peer, self.association_id)
    }
}

/// One end of an in-memory link created by [`loopback_pair`]
pub struct LoopbackLink {
    name: String,
    out_streams: u16,
    outbound: StdMutex<Option<mpsc::UnboundedSender<ReceivedMessage>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<ReceivedMessage>>,
    closed: watch::Sender<bool>,
}

/// Creates two connected in-memory links with `out_streams` streams each way.
///
/// Closing one end makes both ends report end-of-stream once drained.
pub fn loopback_pair(out_streams: u16) -> (LoopbackLink, LoopbackLink) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();

    let end = |name: &str, tx, rx| LoopbackLink {
        name: name.to_string(),
        out_streams: out_streams.max(1),
        outbound: StdMutex::new(Some(tx)),
        inbound: Mutex::new(rx),
        closed: watch::channel(false).0,
    };

    (end("loopback-a", b_tx, a_rx), end("loopback-b", a_tx, b_rx))
}

impl LoopbackLink {
    fn sender(&self) -> Option<mpsc::UnboundedSender<ReceivedMessage>> {
        self.outbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Link for LoopbackLink {
    async fn recv(&self) -> Result<Option<ReceivedMessage>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            message = inbound.recv() => Ok(message),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn send(&self, stream_id: u16, ppid: u32, data: Bytes) -> Result<()> {
        if stream_id >= self.out_streams {
            return Err(SctpError::StreamError(format!(
                "stream {stream_id} out of range ({} streams)",
                self.out_streams
            )));
        }
        let tx = self.sender().ok_or(SctpError::AssociationClosed)?;
        tx.send(ReceivedMessage {
            stream_id,
            data,
            ppid,
        })
        .map_err(|_| SctpError::AssociationClosed)
    }

    async fn close(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let _ = self.closed.send_replace(true);
    }

    fn out_streams(&self) -> u16 {
        self.out_streams
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}
