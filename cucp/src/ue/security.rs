//! AS security algorithm selection
//!
//! Algorithms are only signalled to the UE; keys are stored, never derived here.
//! NR algorithm bitmaps follow the NGAP UE Security Capabilities layout: the most
//! significant bit is algorithm 1, the next one algorithm 2, then algorithm 3.
//! Algorithm 0 is always supported.

use cucp_ngap::UeSecurityCapabilities;
use cucp_rrc::{CipheringAlgorithm, IntegrityProtAlgorithm};

/// Ciphering algorithms in order of preference
pub const CIPHERING_PREFERENCE: [CipheringAlgorithm; 3] = [
    CipheringAlgorithm::Nea2,
    CipheringAlgorithm::Nea1,
    CipheringAlgorithm::Nea3,
];

/// Integrity algorithms in order of preference
pub const INTEGRITY_PREFERENCE: [IntegrityProtAlgorithm; 3] = [
    IntegrityProtAlgorithm::Nia2,
    IntegrityProtAlgorithm::Nia1,
    IntegrityProtAlgorithm::Nia3,
];

fn supported(bitmap: u16, algorithm: u8) -> bool {
    algorithm == 0 || bitmap & (0x8000 >> (algorithm - 1)) != 0
}

/// Picks the preferred ciphering and integrity algorithms the UE supports.
pub fn select_algorithms(
    capabilities: &UeSecurityCapabilities,
) -> (CipheringAlgorithm, IntegrityProtAlgorithm) {
    let ciphering = CIPHERING_PREFERENCE
        .into_iter()
        .find(|a| supported(capabilities.nr_encryption_algorithms, u8::from(*a)))
        .unwrap_or(CipheringAlgorithm::Nea0);
    let integrity = INTEGRITY_PREFERENCE
        .into_iter()
        .find(|a| supported(capabilities.nr_integrity_algorithms, u8::from(*a)))
        .unwrap_or(IntegrityProtAlgorithm::Nia0);
    (ciphering, integrity)
}
