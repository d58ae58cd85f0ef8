//! Transport channel: bounded inbound queue and round-robin outbound streams over a [`Link`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::association::ReceivedMessage;
use crate::link::Link;

/// Default inbound queue capacity
pub const DEFAULT_INBOUND_CAPACITY: usize = 5000;
/// Default per-stream outbound queue capacity
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Channel settings
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Payload protocol identifier expected on every inbound message and stamped
    /// on every outbound one
    pub ppid: u32,
    /// Inbound queue capacity; the newest message is dropped when full
    pub inbound_capacity: usize,
    /// Queue capacity of each outbound stream worker
    pub outbound_capacity: usize,
    /// Number of reader tasks pulling from the link
    pub readers: usize,
}

impl ChannelConfig {
    /// Defaults for a channel carrying `ppid`.
    pub fn new(ppid: u32) -> Self {
        Self {
            ppid,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            readers: 1,
        }
    }
}

/// A message channel to one peer.
///
/// Reader tasks move inbound messages from the link into a bounded queue consumed
/// with [`recv`](Self::recv). [`send`](Self::send) never blocks: messages are spread
/// round-robin over the outbound streams, each served by its own worker so order
/// within a stream is preserved.
///
/// Inbound messages whose PPID differs from [`ChannelConfig::ppid`] are discarded.
/// Over SCTP-over-UDP the PPID check is weaker: the association reports both NGAP (60)
/// and F1AP (62) as unknown identifiers and they arrive tagged with the configured
/// PPID, so only links that carry the wire PPID (loopback) can reject a foreign one.
pub struct TransportChannel {
    link: Arc<dyn Link>,
    peer: String,
    inbound: Mutex<mpsc::Receiver<ReceivedMessage>>,
    outbound: Vec<mpsc::Sender<Bytes>>,
    next_stream: AtomicUsize,
    dropped: Arc<AtomicU64>,
    shutdown: watch::Sender<bool>,
    readers: StdMutex<Vec<JoinHandle<()>>>,
    writers: StdMutex<Vec<JoinHandle<()>>>,
    span: Span,
}

impl TransportChannel {
    /// Starts reader and writer tasks over `link`. Must be called within a tokio runtime.
    pub fn new(link: Arc<dyn Link>, config: ChannelConfig) -> Arc<Self> {
        let peer = link.peer();
        let span = info_span!("channel", peer = %peer, ppid = config.ppid);

        let (in_tx, in_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dropped = Arc::new(AtomicU64::new(0));

        let readers = (0..config.readers.max(1))
            .map(|_| {
                tokio::spawn(
                    read_loop(
                        Arc::clone(&link),
                        in_tx.clone(),
                        config.ppid,
                        Arc::clone(&dropped),
                        shutdown_rx.clone(),
                    )
                    .instrument(span.clone()),
                )
            })
            .collect();
        drop(in_tx);

        let streams = link.out_streams().max(1);
        let mut outbound = Vec::with_capacity(streams as usize);
        let mut writers = Vec::with_capacity(streams as usize);
        for stream_id in 0..streams {
            let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));
            outbound.push(tx);
            writers.push(tokio::spawn(
                write_loop(
                    Arc::clone(&link),
                    stream_id,
                    config.ppid,
                    rx,
                    shutdown_rx.clone(),
                )
                .instrument(span.clone()),
            ));
        }

        span.in_scope(|| info!(streams, readers = config.readers.max(1), "channel open"));

        Arc::new(Self {
            link,
            peer,
            inbound: Mutex::new(in_rx),
            outbound,
            next_stream: AtomicUsize::new(0),
            dropped,
            shutdown: shutdown_tx,
            readers: StdMutex::new(readers),
            writers: StdMutex::new(writers),
            span,
        })
    }

    /// Next inbound message; `None` once every reader has stopped and the queue is drained.
    pub async fn recv(&self) -> Option<ReceivedMessage> {
        self.inbound.lock().await.recv().await
    }

    /// Queues `data` on the next outbound stream. Failures are logged, not returned.
    pub fn send(&self, data: Bytes) {
        let index = self.next_stream.fetch_add(1, Ordering::Relaxed) % self.outbound.len();
        match self.outbound[index].try_send(data) {
            Ok(()) => {}
            Err(TrySendError::Full(data)) => {
                let _enter = self.span.enter();
                warn!(stream_id = index, len = data.len(), "outbound queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                let _enter = self.span.enter();
                debug!(stream_id = index, "send on closed channel ignored");
            }
        }
    }

    /// Stops the readers, closes the link and waits for every task to finish.
    pub async fn close(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }

        let readers = std::mem::take(&mut *self.readers.lock().unwrap_or_else(|e| e.into_inner()));
        let writers = std::mem::take(&mut *self.writers.lock().unwrap_or_else(|e| e.into_inner()));

        self.link.close().await;
        for task in readers.into_iter().chain(writers) {
            let _ = task.await;
        }

        let _enter = self.span.enter();
        info!(dropped = self.dropped_count(), "channel closed");
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Inbound messages dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of outbound streams
    pub fn out_streams(&self) -> usize {
        self.outbound.len()
    }

    /// Peer identity
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

async fn read_loop(
    link: Arc<dyn Link>,
    queue: mpsc::Sender<ReceivedMessage>,
    ppid: u32,
    dropped: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = link.recv() => received,
        };

        let message = match received {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!("peer closed the association");
                break;
            }
            Err(e) => {
                warn!(error = %e, "link read failed");
                break;
            }
        };

        if message.ppid != ppid {
            warn!(
                expected = ppid,
                received = message.ppid,
                stream_id = message.stream_id,
                "dropping message with unexpected PPID"
            );
            continue;
        }

        match queue.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    stream_id = message.stream_id,
                    len = message.data.len(),
                    dropped = total,
                    "inbound queue full, dropping newest message"
                );
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
    debug!("reader stopped");
}

async fn write_loop(
    link: Arc<dyn Link>,
    stream_id: u16,
    ppid: u32,
    mut queue: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let data = tokio::select! {
            biased;
            data = queue.recv() => match data {
                Some(data) => data,
                None => break,
            },
            _ = shutdown.changed() => break,
        };

        if let Err(e) = link.send(stream_id, ppid, data).await {
            warn!(stream_id, error = %e, "send failed");
        }
    }
}
