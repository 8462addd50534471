//! AMF Context
//!
//! gNB bindings (one per SCTP association that completed NG Setup) and the
//! per-UE NAS security contexts, keyed by serving gNB and UE routing key.
//! RAN-UE-NGAP-IDs are allocated by each gNB, so the same key seen on two
//! associations names two different UEs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use ogs_nas::common::security::SecurityContext;
use ogs_nas::common::types::UeSecurityCapability;
use ogs_sctp::Connection;

use crate::nas_security::{self, AlgorithmError, SecurityOrder};

/// Length of KNASint / KNASenc
pub const OGS_KEY_LEN: usize = 16;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// gNB context
// ============================================================================

/// A gNB bound to one SCTP association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmfGnb {
    pub connection: Connection,
    pub setup_at: Instant,
}

// ============================================================================
// UE context
// ============================================================================

/// Per-UE state needed on the NAS path
#[derive(Debug)]
pub struct AmfUe {
    pub routing_key: u64,
    /// Connection id of the serving gNB
    pub gnb_id: u64,
    security: Mutex<SecurityContext>,
}

impl AmfUe {
    fn new(routing_key: u64, gnb_id: u64) -> Self {
        Self {
            routing_key,
            gnb_id,
            security: Mutex::new(SecurityContext::default()),
        }
    }

    /// The UE's NAS security context.
    ///
    /// Only the worker lane that owns this UE's routing key locks this, so
    /// the lock is never contended on the message path.
    pub fn security(&self) -> MutexGuard<'_, SecurityContext> {
        self.security.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Activate a new security context: pick algorithms against `order`,
    /// install the keys and restart both NAS counts.
    ///
    /// Keys come from the authentication procedure, which is not handled
    /// in this AMF yet.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn establish_security(
        &self,
        capability: &UeSecurityCapability,
        order: &SecurityOrder,
        knas_int: [u8; OGS_KEY_LEN],
        knas_enc: [u8; OGS_KEY_LEN],
    ) -> Result<(u8, u8), AlgorithmError> {
        let (integrity, ciphering) = nas_security::select_security_algorithms(capability, order)?;
        *self.security() = SecurityContext::new(integrity, ciphering, knas_int, knas_enc);
        log::info!(
            "[ue {}/{}] NAS security context established ({} / {})",
            self.gnb_id,
            self.routing_key,
            nas_security::integrity_algorithm_name(integrity),
            nas_security::ciphering_algorithm_name(ciphering)
        );
        Ok((integrity, ciphering))
    }
}

// ============================================================================
// AMF Context (Main)
// ============================================================================

/// `(gNB connection id, routing key)`
pub type UeKey = (u64, u64);

/// AMF Context - gNB and UE registries
pub struct AmfContext {
    /// Configured algorithm preference
    pub security_order: SecurityOrder,
    /// gNB list (by connection id)
    gnb_list: RwLock<HashMap<u64, AmfGnb>>,
    /// UE list (by gNB and routing key)
    ue_list: RwLock<HashMap<UeKey, Arc<AmfUe>>>,
}

impl Default for AmfContext {
    fn default() -> Self {
        Self::new(SecurityOrder::default())
    }
}

impl AmfContext {
    pub fn new(security_order: SecurityOrder) -> Self {
        Self {
            security_order,
            gnb_list: RwLock::new(HashMap::new()),
            ue_list: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // gNB Management
    // ========================================================================

    /// Bind a gNB to `connection`. Returns `false` if one is already bound.
    pub fn gnb_add(&self, connection: Connection) -> bool {
        let mut gnb_list = write(&self.gnb_list);
        if gnb_list.contains_key(&connection.id) {
            return false;
        }
        gnb_list.insert(
            connection.id,
            AmfGnb {
                connection,
                setup_at: Instant::now(),
            },
        );
        log::info!("[{}] gNB added", connection);
        true
    }

    pub fn gnb_find(&self, conn_id: u64) -> Option<AmfGnb> {
        read(&self.gnb_list).get(&conn_id).cloned()
    }

    /// Remove a gNB and every UE it was serving
    pub fn gnb_remove(&self, conn_id: u64) -> Option<AmfGnb> {
        let gnb = write(&self.gnb_list).remove(&conn_id)?;

        let mut ue_list = write(&self.ue_list);
        let before = ue_list.len();
        ue_list.retain(|_, ue| ue.gnb_id != conn_id);
        let removed = before - ue_list.len();

        log::info!("[{}] gNB removed ({} UEs released)", gnb.connection, removed);
        Some(gnb)
    }

    pub fn gnb_count(&self) -> usize {
        read(&self.gnb_list).len()
    }

    // ========================================================================
    // UE Management
    // ========================================================================

    /// The UE behind `routing_key` on gNB `gnb_id`, created on first sight
    pub fn ue_find_or_add(&self, gnb_id: u64, routing_key: u64) -> Arc<AmfUe> {
        let key = (gnb_id, routing_key);
        if let Some(ue) = read(&self.ue_list).get(&key) {
            return Arc::clone(ue);
        }
        let mut ue_list = write(&self.ue_list);
        let ue = ue_list.entry(key).or_insert_with(|| {
            log::debug!("[ue {}/{}] UE context added", gnb_id, routing_key);
            Arc::new(AmfUe::new(routing_key, gnb_id))
        });
        Arc::clone(ue)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn ue_find(&self, gnb_id: u64, routing_key: u64) -> Option<Arc<AmfUe>> {
        read(&self.ue_list).get(&(gnb_id, routing_key)).cloned()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn ue_remove(&self, gnb_id: u64, routing_key: u64) -> Option<Arc<AmfUe>> {
        write(&self.ue_list).remove(&(gnb_id, routing_key))
    }

    pub fn ue_count(&self) -> usize {
        read(&self.ue_list).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nas_security::NasCipheringPolicy;

    fn conn(id: u64) -> Connection {
        Connection {
            id,
            peer: format!("10.0.0.{}:38412", id).parse().unwrap(),
        }
    }

    #[test]
    fn test_gnb_add_find_remove() {
        let ctx = AmfContext::default();
        assert!(ctx.gnb_add(conn(1)));
        assert!(!ctx.gnb_add(conn(1)));
        assert_eq!(ctx.gnb_count(), 1);
        assert_eq!(ctx.gnb_find(1).unwrap().connection, conn(1));
        assert!(ctx.gnb_find(2).is_none());

        assert!(ctx.gnb_remove(1).is_some());
        assert!(ctx.gnb_remove(1).is_none());
        assert_eq!(ctx.gnb_count(), 0);
    }

    #[test]
    fn test_ue_find_or_add_is_stable() {
        let ctx = AmfContext::default();
        let a = ctx.ue_find_or_add(1, 42);
        let b = ctx.ue_find_or_add(1, 42);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(ctx.ue_count(), 1);
        assert!(!a.security().security_context_available);
    }

    #[test]
    fn test_gnb_remove_releases_its_ues() {
        let ctx = AmfContext::default();
        ctx.gnb_add(conn(1));
        ctx.gnb_add(conn(2));
        ctx.ue_find_or_add(1, 10);
        ctx.ue_find_or_add(1, 11);
        ctx.ue_find_or_add(2, 20);

        ctx.gnb_remove(1);
        assert!(ctx.ue_find(1, 10).is_none());
        assert!(ctx.ue_find(1, 11).is_none());
        assert!(ctx.ue_find(2, 20).is_some());
        assert!(ctx.ue_remove(2, 20).is_some());
        assert_eq!(ctx.ue_count(), 0);
    }

    #[test]
    fn test_same_ran_id_on_two_gnbs() {
        let ctx = AmfContext::default();
        ctx.gnb_add(conn(1));
        ctx.gnb_add(conn(2));
        let first = ctx.ue_find_or_add(1, 5);
        let second = ctx.ue_find_or_add(2, 5);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.gnb_id, 2);
        assert_eq!(ctx.ue_count(), 2);
        assert!(ctx.ue_find(3, 5).is_none());

        first.security().ul_count.increment();
        assert_eq!(second.security().ul_count.value(), 0);

        ctx.gnb_remove(1);
        assert!(ctx.ue_find(1, 5).is_none());
        let kept = ctx.ue_find(2, 5).unwrap();
        assert!(Arc::ptr_eq(&kept, &second));
        assert_eq!(ctx.ue_count(), 1);
    }

    #[test]
    fn test_establish_security() {
        let ctx = AmfContext::default();
        let ue = ctx.ue_find_or_add(1, 7);
        ue.security().dl_count.increment();

        let cap = UeSecurityCapability::new(0xf0, 0xf0);
        let selected = ue
            .establish_security(&cap, &ctx.security_order, [0x11; 16], [0x22; 16])
            .unwrap();
        assert_eq!(selected, (2, 0));

        let sec = ue.security();
        assert!(sec.security_context_available);
        assert_eq!(sec.integrity_algorithm, 2);
        assert_eq!(sec.dl_count.value(), 0);
        assert_eq!(sec.knas_enc, [0x22; 16]);
    }

    #[test]
    fn test_establish_security_rejected_by_policy() {
        let order = SecurityOrder {
            integrity_order: vec![0],
            ciphering_order: vec![0],
            policy: NasCipheringPolicy::RejectNullIntegrity,
        };
        let ctx = AmfContext::new(order);
        let ue = ctx.ue_find_or_add(1, 7);
        let cap = UeSecurityCapability::new(0x80, 0x80);
        assert!(ue
            .establish_security(&cap, &ctx.security_order, [0; 16], [0; 16])
            .is_err());
        assert!(!ue.security().security_context_available);
    }
}
