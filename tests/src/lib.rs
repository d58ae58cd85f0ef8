//! Integration test framework for the CU-CP
#![allow(missing_docs)]
//!
//! Mock peers and helpers for driving the DU and AMF routers end to end over
//! in-memory links.
//!
//! # Components
//!
//! - [`mock_amf`] - Mock AMF that answers NG Setup and records N2 traffic
//! - [`mock_du`] - Mock gNB-DU speaking F1AP with RRC containers
//! - [`harness`] - A CU-CP context with one AMF attached
//! - [`test_fixtures`] - Test configuration and message builders
//! - [`test_utils`] - Logging and wait helpers
//!
//! # Test Categories
//!
//! 1. **F1 Setup** - DU admission and rejection
//! 2. **UE Registration** - Call flow from RRC Setup Request to READY
//! 3. **Transport Backpressure** - Inbound queue overflow

pub mod harness;
pub mod mock_amf;
pub mod mock_du;
pub mod test_fixtures;
pub mod test_utils;

pub use harness::TestCuCp;
pub use mock_amf::{MockAmf, MOCK_AMF_NAME};
pub use mock_du::{MockDu, DU_CELL_GROUP};
pub use test_fixtures::{f1_setup_request, ng_setup_response, served_cell, test_config, TEST_PLMN};
pub use test_utils::{
    init_test_logging, wait_for_condition, wait_until, TestResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};
