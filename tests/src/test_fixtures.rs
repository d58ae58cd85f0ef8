//! Test fixtures and configuration helpers
//!
//! A node configuration matching the mock peers, and builders for the
//! messages the mocks send.

use bytes::Bytes;
use cucp::load_config_from_str;
use cucp_common::{CucpConfig, NrCgi, Plmn, SNssai};
use cucp_f1ap::{F1SetupRequest, ServedCellInformation, ServedCellItem, ServedPlmn};
use cucp_ngap::{Guami, NgSetupResponse, PlmnSupportItem};

/// PLMN served by the test node (001/01)
pub const TEST_PLMN: Plmn = Plmn::new(1, 1, false);

/// NR cell identity of the first test cell
pub const TEST_NCI: u64 = 0x10;

/// Configuration used by every integration test.
///
/// Queues are small so backpressure is reachable, and F1 Setup must complete
/// within a second.
pub const TEST_CONFIG: &str = r#"
cucp:
  node_name: cu-test
  plmn: { mcc: "001", mnc: "01" }
  slices: [ { sst: 1 } ]
  tac: 7
  nr_cell_identity: 16
f1ap:
  timers: { f1_setup_ms: 1000 }
ngap:
  gnb_id: 1
  gnb_id_length: 24
  ng_setup_timeout_ms: 1000
logging: { level: debug, format: text }
tunables:
  inbound_queue_capacity: 64
  fsm_workers: 2
  shutdown_grace_ms: 500
"#;

pub fn test_config() -> CucpConfig {
    load_config_from_str(TEST_CONFIG).expect("test configuration is valid")
}

/// A served cell on the test PLMN with cell identity `nci`.
pub fn served_cell(nci: u64, pci: u16) -> ServedCellItem {
    ServedCellItem {
        served_cell_information: ServedCellInformation {
            nr_cgi: NrCgi::new(TEST_PLMN, nci),
            nr_pci: pci,
            five_gs_tac: Some(7),
            served_plmns: vec![ServedPlmn {
                plmn: TEST_PLMN,
                slices: vec![SNssai::new(1)],
            }],
            measurement_timing_configuration: Bytes::from_static(&[0x00]),
        },
        system_information: None,
    }
}

/// F1 Setup Request from DU `du_id` serving `cells` cells.
pub fn f1_setup_request(du_id: u64, cells: usize) -> F1SetupRequest {
    F1SetupRequest {
        transaction_id: 1,
        gnb_du_id: du_id,
        gnb_du_name: Some(format!("du-{du_id}")),
        served_cells: (0..cells)
            .map(|i| served_cell(TEST_NCI + i as u64, 100 + i as u16))
            .collect(),
        rrc_version: [15, 4, 0],
    }
}

/// NG Setup Response the mock AMF answers with.
pub fn ng_setup_response(amf_name: &str, relative_amf_capacity: u8) -> NgSetupResponse {
    NgSetupResponse {
        amf_name: amf_name.to_string(),
        served_guami_list: vec![Guami {
            plmn: TEST_PLMN,
            amf_region_id: 1,
            amf_set_id: 1,
            amf_pointer: 0,
        }],
        relative_amf_capacity,
        plmn_support_list: vec![PlmnSupportItem {
            plmn: TEST_PLMN,
            slice_support_list: vec![SNssai::new(1)],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        let config = test_config();
        assert_eq!(config.cucp.node_name, "cu-test");
        assert_eq!(config.f1ap.timers.f1_setup_ms, 1000);
        assert_eq!(config.tunables.inbound_queue_capacity, 64);
    }

    #[test]
    fn test_setup_request_cells() {
        let request = f1_setup_request(3, 2);
        assert_eq!(request.cell_count(), 2);
        assert_ne!(
            request.served_cells[0].served_cell_information.nr_cgi,
            request.served_cells[1].served_cell_information.nr_cgi
        );
    }
}
