//! A CU-CP context wired to one mock AMF, ready to accept mock DUs.

use std::sync::Arc;

use cucp::ngap::serve_amf;
use cucp::{AmfHandle, CuCpContext};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::mock_amf::MockAmf;
use crate::mock_du::MockDu;
use crate::test_fixtures::test_config;
use crate::test_utils::init_test_logging;

pub struct TestCuCp {
    pub ctx: Arc<CuCpContext>,
    pub amf: MockAmf,
    pub amf_handle: Arc<AmfHandle>,
    amf_router: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl TestCuCp {
    /// Builds the context from the test configuration, completes NG Setup
    /// with a mock AMF and starts its router.
    pub async fn start() -> Self {
        init_test_logging();
        let ctx = CuCpContext::new(&test_config()).expect("context from test configuration");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (amf, amf_handle) = MockAmf::attach(&ctx, 100).await;
        let amf_router = tokio::spawn(serve_amf(
            Arc::clone(&ctx),
            Arc::clone(&amf_handle),
            shutdown_rx,
        ));

        Self {
            ctx,
            amf,
            amf_handle,
            amf_router,
            shutdown_tx,
        }
    }

    /// A new DU association served by a router bound to this node's shutdown signal.
    pub fn connect_du(&self) -> MockDu {
        MockDu::attach(&self.ctx, self.shutdown_tx.subscribe())
    }

    /// Signals shutdown and waits for the AMF router.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.amf_router.await;
    }
}
