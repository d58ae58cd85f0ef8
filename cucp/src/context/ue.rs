//! UE Context Management
//!
//! A UE is created on its first RRC Setup Request and bound for its lifetime to
//! the DU it arrived through and the AMF selected at that moment. The handle holds
//! the identifiers fixed at creation; everything the call flow learns later lives
//! in [`UeContext`] and is only touched by callbacks running under the UE lock.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use cucp_common::{FiveGSTmsi, NrCgi, Plmn, SNssai};
use cucp_fsm::Entity;
use cucp_ngap::UeSecurityCapabilities;
use cucp_rrc::{EstablishmentCause, MAX_TRANSACTION_ID};
use cucp_sctp::TransportChannel;
use dashmap::DashMap;

use super::registry::{IdAllocator, Registry, RegistryError};
use crate::ue::{UeMachine, UeState};

/// Transport channels a UE talks through
#[derive(Clone)]
pub struct UeLinks {
    pub du_id: u64,
    pub du: Arc<TransportChannel>,
    pub amf_id: u32,
    pub amf: Arc<TransportChannel>,
}

impl fmt::Debug for UeLinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UeLinks")
            .field("du_id", &self.du_id)
            .field("amf_id", &self.amf_id)
            .finish()
    }
}

/// Mutable UE data, guarded by the entity lock
#[derive(Debug)]
pub struct UeContext {
    /// Local RRC UE id, also used as gNB-CU UE F1AP ID
    pub rrc_ue_id: u32,
    /// Local RAN UE NGAP ID
    pub ran_ue_ngap_id: u32,
    /// gNB-DU UE F1AP ID assigned by the DU
    pub du_ue_id: u32,
    /// AMF UE NGAP ID, 0 until the AMF assigns one
    pub amf_ue_ngap_id: u64,
    pub c_rnti: u16,
    /// Cell the UE attached through
    pub nr_cgi: NrCgi,
    pub establishment_cause: EstablishmentCause,
    /// 5G-S-TMSI part 1 from the RRC Setup Request, if that identity was used
    pub tmsi_part1: Option<u64>,
    pub five_g_s_tmsi: Option<FiveGSTmsi>,
    /// CellGroupConfig from the DU
    pub master_cell_group: Bytes,
    pub security_capabilities: Option<UeSecurityCapabilities>,
    pub security_key: Option<[u8; 32]>,
    pub allowed_nssai: Vec<SNssai>,
    /// Serving PLMN of the mobility restriction list
    pub mobility_restriction: Option<Plmn>,
    pub masked_imeisv: Option<u64>,
    /// NAS message (registration accept) waiting for the RRC Reconfiguration
    pub pending_nas: Option<Bytes>,
    pub links: UeLinks,
    next_transaction_id: u8,
}

/// Identifiers and radio parameters known when a UE is created.
#[derive(Debug, Clone)]
pub struct UeSetup {
    pub rrc_ue_id: u32,
    pub ran_ue_ngap_id: u32,
    pub du_ue_id: u32,
    pub c_rnti: u16,
    pub nr_cgi: NrCgi,
    pub establishment_cause: EstablishmentCause,
    pub tmsi_part1: Option<u64>,
    pub master_cell_group: Bytes,
}

impl UeContext {
    pub fn new(setup: UeSetup, links: UeLinks) -> Self {
        Self {
            rrc_ue_id: setup.rrc_ue_id,
            ran_ue_ngap_id: setup.ran_ue_ngap_id,
            du_ue_id: setup.du_ue_id,
            amf_ue_ngap_id: 0,
            c_rnti: setup.c_rnti,
            nr_cgi: setup.nr_cgi,
            establishment_cause: setup.establishment_cause,
            tmsi_part1: setup.tmsi_part1,
            five_g_s_tmsi: None,
            master_cell_group: setup.master_cell_group,
            security_capabilities: None,
            security_key: None,
            allowed_nssai: Vec::new(),
            mobility_restriction: None,
            masked_imeisv: None,
            pending_nas: None,
            links,
            next_transaction_id: 0,
        }
    }

    /// Next RRC transaction identifier (0-3, cycling).
    pub fn next_transaction_id(&mut self) -> u8 {
        let id = self.next_transaction_id;
        self.next_transaction_id = if id >= MAX_TRANSACTION_ID { 0 } else { id + 1 };
        id
    }
}

/// A live UE
pub struct UeHandle {
    pub rrc_ue_id: u32,
    pub ran_ue_ngap_id: u32,
    pub du_ue_id: u32,
    pub du_id: u64,
    pub amf_id: u32,
    pub entity: Arc<Entity<UeMachine>>,
}

impl UeHandle {
    /// Creates the handle with its entity in [`UeState::Initialized`].
    pub fn new(context: UeContext) -> Self {
        Self {
            rrc_ue_id: context.rrc_ue_id,
            ran_ue_ngap_id: context.ran_ue_ngap_id,
            du_ue_id: context.du_ue_id,
            du_id: context.links.du_id,
            amf_id: context.links.amf_id,
            entity: Arc::new(Entity::new(UeState::Initialized, context)),
        }
    }

    pub fn state(&self) -> UeState {
        self.entity.state()
    }
}

impl fmt::Debug for UeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UeHandle")
            .field("rrc_ue_id", &self.rrc_ue_id)
            .field("ran_ue_ngap_id", &self.ran_ue_ngap_id)
            .field("du_ue_id", &self.du_ue_id)
            .field("du_id", &self.du_id)
            .field("amf_id", &self.amf_id)
            .field("state", &self.state())
            .finish()
    }
}

/// UE table indexed by RRC UE id, with a RAN UE NGAP ID index and the two
/// identifier allocators.
pub struct UeRegistry {
    ues: Registry<u32, UeHandle>,
    by_ran_ue_ngap_id: DashMap<u32, u32>,
    rrc_ue_ids: IdAllocator,
    ran_ue_ngap_ids: IdAllocator,
}

impl Default for UeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UeRegistry {
    pub fn new() -> Self {
        Self {
            ues: Registry::new("UE"),
            by_ran_ue_ngap_id: DashMap::new(),
            rrc_ue_ids: IdAllocator::new("RRC UE", 1),
            ran_ue_ngap_ids: IdAllocator::new("RAN UE NGAP", 1),
        }
    }

    /// Allocates a fresh (RRC UE id, RAN UE NGAP ID) pair.
    pub fn allocate_ids(&self) -> Result<(u32, u32), RegistryError> {
        Ok((self.rrc_ue_ids.allocate()?, self.ran_ue_ngap_ids.allocate()?))
    }

    pub fn register(&self, ue: Arc<UeHandle>) -> Result<(), RegistryError> {
        let (rrc_ue_id, ran_ue_ngap_id) = (ue.rrc_ue_id, ue.ran_ue_ngap_id);
        self.ues.insert_new(rrc_ue_id, ue)?;
        self.by_ran_ue_ngap_id.insert(ran_ue_ngap_id, rrc_ue_id);
        Ok(())
    }

    pub fn get(&self, rrc_ue_id: u32) -> Option<Arc<UeHandle>> {
        self.ues.get(&rrc_ue_id)
    }

    pub fn get_by_ran_ue_ngap_id(&self, ran_ue_ngap_id: u32) -> Option<Arc<UeHandle>> {
        let rrc_ue_id = *self.by_ran_ue_ngap_id.get(&ran_ue_ngap_id)?;
        self.ues.get(&rrc_ue_id)
    }

    pub fn remove(&self, rrc_ue_id: u32) -> Option<Arc<UeHandle>> {
        let ue = self.ues.remove(&rrc_ue_id)?;
        self.by_ran_ue_ngap_id.remove(&ue.ran_ue_ngap_id);
        Some(ue)
    }

    pub fn values(&self) -> Vec<Arc<UeHandle>> {
        self.ues.values()
    }

    pub fn len(&self) -> usize {
        self.ues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cucp_sctp::{loopback_pair, ChannelConfig, F1AP_PPID, NGAP_PPID};

    fn links() -> UeLinks {
        let (du, _du_peer) = loopback_pair(1);
        let (amf, _amf_peer) = loopback_pair(1);
        UeLinks {
            du_id: 7,
            du: TransportChannel::new(Arc::new(du), ChannelConfig::new(F1AP_PPID)),
            amf_id: 1,
            amf: TransportChannel::new(Arc::new(amf), ChannelConfig::new(NGAP_PPID)),
        }
    }

    fn context(registry: &UeRegistry, du_ue_id: u32) -> UeContext {
        let (rrc_ue_id, ran_ue_ngap_id) = registry.allocate_ids().unwrap();
        UeContext::new(
            UeSetup {
                rrc_ue_id,
                ran_ue_ngap_id,
                du_ue_id,
                c_rnti: 0x4601,
                nr_cgi: NrCgi::new(Plmn::new(1, 1, false), 0x10),
                establishment_cause: EstablishmentCause::MoSignalling,
                tmsi_part1: None,
                master_cell_group: Bytes::new(),
            },
            links(),
        )
    }

    #[tokio::test]
    async fn test_register_and_lookup_by_both_ids() {
        let registry = UeRegistry::new();
        let ue = Arc::new(UeHandle::new(context(&registry, 100)));
        registry.register(Arc::clone(&ue)).unwrap();

        assert_eq!(registry.get(ue.rrc_ue_id).unwrap().du_ue_id, 100);
        assert_eq!(
            registry
                .get_by_ran_ue_ngap_id(ue.ran_ue_ngap_id)
                .unwrap()
                .rrc_ue_id,
            ue.rrc_ue_id
        );
        assert_eq!(ue.state(), UeState::Initialized);

        registry.remove(ue.rrc_ue_id).unwrap();
        assert!(registry.get_by_ran_ue_ngap_id(ue.ran_ue_ngap_id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_fresh_per_ue() {
        let registry = UeRegistry::new();
        let first = context(&registry, 1);
        let second = context(&registry, 1);
        assert_ne!(first.rrc_ue_id, second.rrc_ue_id);
        assert_ne!(first.ran_ue_ngap_id, second.ran_ue_ngap_id);
    }

    #[tokio::test]
    async fn test_transaction_id_cycles() {
        let registry = UeRegistry::new();
        let mut ctx = context(&registry, 1);
        let ids: Vec<u8> = (0..6).map(|_| ctx.next_transaction_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 0, 1]);
    }
}
