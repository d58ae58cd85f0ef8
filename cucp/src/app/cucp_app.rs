//! CU-CP lifecycle

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cucp_common::CucpConfig;
use cucp_sctp::{
    Link, SctpConfig, SctpError, SctpLink, SctpListener, SctpServerConfig, F1AP_PPID, NGAP_PPID,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::{AmfHandle, ContextError, CuCpContext};
use crate::f1;
use crate::ngap::{self, NgSetupError};

/// Startup errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("context: {0}")]
    Context(#[from] ContextError),

    #[error("N2 association to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: SctpError,
    },

    #[error("NG Setup: {0}")]
    NgSetup(#[from] NgSetupError),

    #[error("F1 listener on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: SctpError,
    },
}

/// A running CU-CP node
pub struct CucpApp {
    context: Arc<CuCpContext>,
    listener: Arc<SctpListener>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CucpApp {
    /// Connects to the AMF, completes NG Setup and starts accepting DUs.
    ///
    /// The F1 listener is only opened once the AMF is ACTIVE, so a DU never
    /// attaches to a node that cannot reach the core.
    pub async fn start(config: &CucpConfig) -> Result<Self, AppError> {
        let context = CuCpContext::new(config)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let amf = connect_amf(&context).await?;
        let mut tasks = vec![tokio::spawn(ngap::serve_amf(
            Arc::clone(&context),
            amf,
            shutdown_rx.clone(),
        ))];

        let f1ap = &config.f1ap;
        let addr = SocketAddr::new(f1ap.local_address, f1ap.local_port);
        let server_config = SctpServerConfig {
            max_inbound_streams: f1ap.sctp.in_streams,
            max_outbound_streams: f1ap.sctp.out_streams,
            ppid: F1AP_PPID,
            ..Default::default()
        };
        let listener = match SctpListener::bind(addr, server_config).await {
            Ok(listener) => Arc::new(listener),
            Err(source) => {
                let _ = shutdown_tx.send(true);
                for task in tasks {
                    let _ = task.await;
                }
                return Err(AppError::Listen { addr, source });
            }
        };
        info!(addr = %listener.local_addr(), "F1-C listener ready");

        tasks.push(tokio::spawn(f1::accept_loop(
            Arc::clone(&context),
            Arc::clone(&listener),
            shutdown_rx,
        )));

        Ok(Self {
            context,
            listener,
            shutdown_tx,
            tasks,
        })
    }

    pub fn context(&self) -> &Arc<CuCpContext> {
        &self.context
    }

    /// Address the F1 listener is bound to.
    pub fn f1_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Stops the routers, closes every association and drains the state
    /// machines within `tunables.shutdown_grace_ms`.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        let _ = self.shutdown_tx.send(true);

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Router task failed: {}", e);
            }
        }
        self.listener.stop().await;

        let grace = Duration::from_millis(self.context.tunables().shutdown_grace_ms);
        let (du, amf, ue) = tokio::join!(
            self.context.du_fsm.drain(grace),
            self.context.amf_fsm.drain(grace),
            self.context.ue_fsm.drain(grace),
        );
        if du && amf && ue {
            info!("All state machines drained");
        } else {
            warn!(du, amf, ue, "Shutdown grace period expired with events in flight");
        }
    }
}

async fn connect_amf(context: &Arc<CuCpContext>) -> Result<Arc<AmfHandle>, AppError> {
    let ngap = &context.config.ngap;
    let remote = SocketAddr::new(ngap.amf_address, ngap.amf_port);
    let local = (!ngap.local_address.is_unspecified() || ngap.local_port != 0)
        .then(|| SocketAddr::new(ngap.local_address, ngap.local_port));

    info!(%remote, "Connecting to AMF");
    let sctp = SctpConfig::with_streams(NGAP_PPID, ngap.sctp.in_streams, ngap.sctp.out_streams);
    let link = SctpLink::connect(local, remote, sctp)
        .await
        .map_err(|source| AppError::Connect {
            addr: remote,
            source,
        })?;
    let link: Arc<dyn Link> = Arc::new(link);

    Ok(ngap::establish(context, link).await?)
}
