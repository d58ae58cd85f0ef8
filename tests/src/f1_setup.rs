//! F1 Setup integration tests
//!
//! A mock DU connects to a CU-CP that already completed NG Setup and runs F1
//! Setup against the real DU router.

use cucp::DuState;
use cucp_common::{NrCgi, Plmn};
use cucp_f1ap::{Cause, F1apPdu};
use integration_tests::test_fixtures::TEST_NCI;
use integration_tests::{f1_setup_request, wait_until, TestCuCp, TEST_PLMN};

#[tokio::test]
async fn test_single_cell_du_is_accepted() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();

    let response = match du.f1_setup(f1_setup_request(7, 1)).await {
        F1apPdu::F1SetupResponse(response) => response,
        other => panic!("expected F1 Setup Response, got {}", other.name()),
    };
    assert_eq!(response.transaction_id, 1);
    assert_eq!(response.gnb_cu_name.as_deref(), Some("cu-test"));
    assert_eq!(response.rrc_version, [15, 4, 0]);
    assert_eq!(response.cells_to_activate.len(), 1);
    assert_eq!(response.cells_to_activate[0].nr_cgi, NrCgi::new(TEST_PLMN, TEST_NCI));
    assert_eq!(response.cells_to_activate[0].nr_pci, Some(100));

    assert_eq!(cu.ctx.dus.len(), 1);
    let registered = cu.ctx.dus.get(&7).expect("DU registered under its id");
    assert_eq!(registered.state(), DuState::Active);
    assert_eq!(registered.info.name.as_deref(), Some("du-7"));

    cu.shutdown().await;
}

#[tokio::test]
async fn test_two_cell_du_is_rejected() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();

    match du.f1_setup(f1_setup_request(7, 2)).await {
        F1apPdu::F1SetupFailure(failure) => {
            assert_eq!(failure.transaction_id, 1);
            assert_eq!(failure.cause, Cause::MISC_UNSPECIFIED);
        }
        other => panic!("expected F1 Setup Failure, got {}", other.name()),
    }
    assert!(cu.ctx.dus.is_empty());

    // The association stays open, so the DU may retry with a valid request.
    assert!(matches!(
        du.f1_setup(f1_setup_request(7, 1)).await,
        F1apPdu::F1SetupResponse(_)
    ));
    assert_eq!(cu.ctx.dus.len(), 1);

    cu.shutdown().await;
}

#[tokio::test]
async fn test_foreign_plmn_is_not_served() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();

    let mut request = f1_setup_request(7, 1);
    let cell = &mut request.served_cells[0].served_cell_information;
    cell.served_plmns[0].plmn = Plmn::new(999, 99, false);

    match du.f1_setup(request).await {
        F1apPdu::F1SetupFailure(failure) => assert_eq!(failure.cause, Cause::PLMN_NOT_SERVED),
        other => panic!("expected F1 Setup Failure, got {}", other.name()),
    }
    assert!(cu.ctx.dus.is_empty());

    cu.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_du_id_is_rejected() {
    let cu = TestCuCp::start().await;
    let first = cu.connect_du();
    assert!(matches!(
        first.f1_setup(f1_setup_request(7, 1)).await,
        F1apPdu::F1SetupResponse(_)
    ));

    let second = cu.connect_du();
    match second.f1_setup(f1_setup_request(7, 1)).await {
        F1apPdu::F1SetupFailure(failure) => assert_eq!(failure.cause, Cause::MISC_UNSPECIFIED),
        other => panic!("expected F1 Setup Failure, got {}", other.name()),
    }
    assert_eq!(cu.ctx.dus.len(), 1);

    cu.shutdown().await;
}

#[tokio::test]
async fn test_repeated_setup_on_established_association() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();
    assert!(matches!(
        du.f1_setup(f1_setup_request(7, 1)).await,
        F1apPdu::F1SetupResponse(_)
    ));

    match du.f1_setup(f1_setup_request(7, 1)).await {
        F1apPdu::F1SetupFailure(failure) => {
            assert_eq!(failure.cause, Cause::MESSAGE_NOT_COMPATIBLE)
        }
        other => panic!("expected F1 Setup Failure, got {}", other.name()),
    }
    assert_eq!(cu.ctx.dus.get(&7).map(|du| du.state()), Some(DuState::Active));

    cu.shutdown().await;
}

#[tokio::test]
async fn test_silent_du_is_dropped_after_setup_timer() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();

    assert!(du.is_disconnected().await);
    du.join_router().await;
    assert!(cu.ctx.dus.is_empty());

    cu.shutdown().await;
}

#[tokio::test]
async fn test_du_association_loss_removes_du() {
    let cu = TestCuCp::start().await;
    let du = cu.connect_du();
    assert!(matches!(
        du.f1_setup(f1_setup_request(7, 1)).await,
        F1apPdu::F1SetupResponse(_)
    ));

    du.disconnect().await;
    wait_until(|| cu.ctx.dus.is_empty())
        .await
        .expect("DU removed after association loss");

    cu.shutdown().await;
}
