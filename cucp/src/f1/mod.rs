//! F1-C interface
//!
//! Every DU association gets its own router task ([`serve_du`]) fed by a
//! [`TransportChannel`] with PPID 62. The router owns the association until the
//! peer goes away or the node shuts down.

mod dispatch;
pub mod setup;

use std::sync::Arc;

use cucp_common::{log_protocol_message, Direction};
use cucp_f1ap::{encode_f1ap_pdu, F1apPdu};
use cucp_sctp::{Link, SctpListener, TransportChannel};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::context::CuCpContext;

pub use dispatch::serve_du;
pub use setup::SetupRejection;

/// Encodes `pdu` and queues it on `channel`.
pub fn send_f1ap(channel: &TransportChannel, pdu: &F1apPdu) {
    let bytes = encode_f1ap_pdu(pdu);
    log_protocol_message("F1AP", Direction::Tx, pdu.name(), &bytes);
    channel.send(bytes);
}

/// Accepts DU associations until the listener stops or shutdown is signalled,
/// then waits for every router to finish.
pub async fn accept_loop(
    ctx: Arc<CuCpContext>,
    listener: Arc<SctpListener>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut routers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Some(link) = accepted else {
                    debug!("F1 listener stopped");
                    break;
                };
                info!(peer = %link.peer(), "DU association accepted");
                routers.spawn(serve_du(Arc::clone(&ctx), Arc::new(link), shutdown.clone()));
            }
            _ = shutdown.changed() => break,
        }
    }

    while routers.join_next().await.is_some() {}
    debug!("F1 accept loop finished");
}
