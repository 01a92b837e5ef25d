//! Bounded in-memory ledger of consumed coupon nonces
//!
//! A consumed nonce only has to be remembered until its coupon expires; after
//! that the expiry check rejects the coupon on its own. Entries therefore
//! carry the coupon's expiry and are pruned once it has passed.
//!
//! - **Max capacity:** fixed at construction.
//! - **Eviction:** expired entries only. When the ledger is full of live
//!   entries it refuses new ones instead of forgetting a live nonce.

use alloy::primitives::U256;
use std::collections::HashMap;

use crate::error::VerificationError;

/// Single-use enforcement for coupon nonces.
pub trait NonceLedger {
    /// Mark `nonce` as spent until `expires_at` (unix seconds).
    ///
    /// Fails with [`VerificationError::NonceReplayed`] if it is already spent.
    fn consume(
        &mut self,
        nonce: U256,
        expires_at: U256,
        now: u64,
    ) -> Result<(), VerificationError>;
}

/// Bounded ledger keyed by nonce.
pub struct BoundedNonceCache {
    /// Nonce -> expiry of the coupon that spent it
    map: HashMap<U256, U256>,
    max_size: usize,
}

impl BoundedNonceCache {
    /// Create a ledger holding at most `max_size` live nonces.
    pub fn new(max_size: usize) -> Self {
        Self {
            map: HashMap::new(),
            max_size,
        }
    }

    /// Returns true if the nonce is spent and its coupon has not yet expired.
    pub fn contains(&self, nonce: &U256, now: u64) -> bool {
        self.map
            .get(nonce)
            .is_some_and(|&expiry| expiry > U256::from(now))
    }

    /// Drop entries whose coupons have expired.
    pub fn prune(&mut self, now: u64) {
        let now = U256::from(now);
        self.map.retain(|_, expiry| *expiry > now);
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Returns (current len, max_size) for capacity percentage checks.
    pub fn capacity_info(&self) -> (usize, usize) {
        (self.map.len(), self.max_size)
    }
}

impl NonceLedger for BoundedNonceCache {
    fn consume(
        &mut self,
        nonce: U256,
        expires_at: U256,
        now: u64,
    ) -> Result<(), VerificationError> {
        if self.contains(&nonce, now) {
            return Err(VerificationError::NonceReplayed { nonce });
        }

        if self.map.len() >= self.max_size {
            self.prune(now);
        }
        if self.map.len() >= self.max_size {
            tracing::warn!(
                capacity = self.max_size,
                "Nonce ledger full of unexpired coupons, refusing withdrawal"
            );
            return Err(VerificationError::LedgerFull {
                capacity: self.max_size,
            });
        }

        self.map.insert(nonce, expires_at);
        Ok(())
    }
}
