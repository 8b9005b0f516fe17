use crate::network::Network;
use alloy_primitives::Address;
use std::collections::HashMap;

/// Composite identity of a detected token. At most one persisted row exists
/// per key; the same address may legitimately exist on both networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub address: Address,
    pub network: Network,
}

/// `true` once `required_depth` blocks have been built on top of the
/// candidate's origin block.
pub fn is_confirmed(origin_block: u64, head_block: u64, required_depth: u64) -> bool {
    head_block.saturating_sub(origin_block) >= required_depth
}

/// Pending-confirmation set for one network. Owned by that network's
/// monitor task; entries are keyed by (address, network) and hold the block
/// at which the candidate was first seen.
#[derive(Debug)]
pub struct ConfirmationTracker {
    required_depth: u64,
    pending: HashMap<TokenKey, u64>,
}

impl ConfirmationTracker {
    pub fn new(required_depth: u64) -> Self {
        Self {
            required_depth,
            pending: HashMap::new(),
        }
    }

    pub fn confirmed_at(&self, origin_block: u64, head_block: u64) -> bool {
        is_confirmed(origin_block, head_block, self.required_depth)
    }

    /// Registers an unconfirmed candidate. The origin block of an already
    /// tracked key never changes.
    pub fn track(&mut self, key: TokenKey, origin_block: u64) {
        self.pending.entry(key).or_insert(origin_block);
    }

    /// Keys whose entries now satisfy the confirmation depth. The caller
    /// removes each one only after the confirm write succeeds, so a failed
    /// write leaves the entry pending for the next sweep.
    pub fn ripe(&self, head_block: u64) -> Vec<TokenKey> {
        self.pending
            .iter()
            .filter(|&(_, &origin)| self.confirmed_at(origin, head_block))
            .map(|(&key, _)| key)
            .collect()
    }

    pub fn remove(&mut self, key: &TokenKey) -> Option<u64> {
        self.pending.remove(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
