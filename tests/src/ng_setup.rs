//! NG Setup and AMF lifecycle tests

use std::sync::Arc;
use std::time::Duration;

use cucp::ngap::{establish, NgSetupError};
use cucp::{AmfState, CuCpContext};
use cucp_ngap::{Cause, NgSetupFailure, NgapPdu, OverloadAction, OverloadStart};
use cucp_sctp::loopback_pair;
use integration_tests::{
    init_test_logging, test_config, wait_until, MockAmf, TestCuCp, MOCK_AMF_NAME,
};

#[tokio::test]
async fn test_setup_response_activates_amf() {
    let cu = TestCuCp::start().await;

    let amf = &cu.amf_handle;
    assert_eq!(amf.state(), AmfState::Active);
    assert_eq!(amf.name, MOCK_AMF_NAME);
    assert_eq!(cu.ctx.amfs.len(), 1);

    let snapshot = amf.snapshot();
    assert_eq!(snapshot.relative_capacity, 100);
    assert_eq!(snapshot.plmns, vec![integration_tests::TEST_PLMN]);
    assert_eq!(snapshot.served_guami_list.len(), 1);

    cu.shutdown().await;
}

#[tokio::test]
async fn test_setup_failure_is_reported() {
    init_test_logging();
    let ctx = CuCpContext::new(&test_config()).unwrap();
    let (cu_end, amf_end) = loopback_pair(2);
    let mock = MockAmf::new(amf_end);

    let establish = tokio::spawn({
        let ctx = Arc::clone(&ctx);
        async move { establish(&ctx, Arc::new(cu_end)).await }
    });
    assert!(matches!(mock.recv().await, NgapPdu::NgSetupRequest(_)));
    mock.send(&NgapPdu::NgSetupFailure(NgSetupFailure {
        cause: Cause::MISC_UNKNOWN_PLMN,
        time_to_wait: None,
    }));

    match establish.await.unwrap() {
        Err(NgSetupError::Rejected { cause }) => assert_eq!(cause, Cause::MISC_UNKNOWN_PLMN),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(ctx.amfs.is_empty());
}

#[tokio::test]
async fn test_silent_amf_times_out() {
    init_test_logging();
    let ctx = CuCpContext::new(&test_config()).unwrap();
    let (cu_end, amf_end) = loopback_pair(2);
    let mock = MockAmf::new(amf_end);

    let result = establish(&ctx, Arc::new(cu_end)).await;
    assert!(matches!(
        result,
        Err(NgSetupError::Timeout(timeout)) if timeout == Duration::from_millis(1000)
    ));
    assert!(ctx.amfs.is_empty());
    drop(mock);
}

#[tokio::test]
async fn test_overload_start_and_stop() {
    let cu = TestCuCp::start().await;

    cu.amf.send(&NgapPdu::OverloadStart(OverloadStart {
        action: Some(OverloadAction::RejectNonEmergencyMoDt),
        traffic_load_reduction: Some(50),
    }));
    wait_until(|| cu.amf_handle.state() == AmfState::Overloaded)
        .await
        .expect("AMF overloaded");
    assert_eq!(
        cu.amf_handle.snapshot().overload.and_then(|o| o.traffic_load_reduction),
        Some(50)
    );

    cu.amf.send(&NgapPdu::OverloadStop);
    wait_until(|| cu.amf_handle.state() == AmfState::Active)
        .await
        .expect("AMF active again");

    cu.shutdown().await;
}
