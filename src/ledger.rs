// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Optimistic balance ledger.
//!
//! Each tracked key holds the last authoritative base value plus a pending
//! delta applied speculatively when a write is submitted. The displayed
//! value is always `base + pending`. The pending delta moves toward zero
//! only when a matching on-chain event is reconciled, never on a timer;
//! failure-class transaction terminals undo their adjustment exactly, so
//! optimism is strictly reversible.

use crate::metrics::ClientMetrics;
use crate::types::BalanceKey;
use ethers::types::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
struct OptimisticEntry {
    base: U256,
    pending: i128,
}

impl OptimisticEntry {
    fn displayed(&self) -> U256 {
        if self.pending >= 0 {
            self.base.saturating_add(U256::from(self.pending as u128))
        } else {
            self.base
                .saturating_sub(U256::from(self.pending.unsigned_abs()))
        }
    }
}

pub struct OptimisticLedger {
    entries: RwLock<HashMap<BalanceKey, OptimisticEntry>>,
    metrics: Arc<ClientMetrics>,
}

impl OptimisticLedger {
    pub fn new(metrics: Arc<ClientMetrics>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Refresh the authoritative base value for a key, preserving any
    /// pending delta. Called whenever a fresh chain read of the balance is
    /// available (preflight checks, reconciliation).
    pub async fn prime(&self, key: BalanceKey, base: U256) {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key)
            .or_insert(OptimisticEntry {
                base,
                pending: 0,
            });
        entry.base = base;
        debug!("ledger primed: key={key}, base={base}");
    }

    /// Apply a speculative delta. Called exactly once on entry to
    /// `Submitted`, and with the negated delta on any failure-class
    /// terminal.
    pub async fn adjust(&self, key: BalanceKey, delta: i128) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_insert_with(|| {
            warn!("ledger adjust on unprimed key {key}; base assumed zero until reconciled");
            OptimisticEntry {
                base: U256::zero(),
                pending: 0,
            }
        });
        entry.pending += delta;
        debug!(
            "ledger adjusted: key={key}, delta={delta}, pending={}",
            entry.pending
        );
    }

    /// Fold an observed on-chain event of the given magnitude into the
    /// pending delta and refresh the base from the authoritative read the
    /// reconciler performed. The delta only ever moves toward zero; an
    /// unexplained overshoot is clamped and logged, never propagated.
    pub async fn reconcile(&self, key: BalanceKey, observed: U256, fresh_base: U256) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&key) else {
            debug!("reconcile for untracked key {key}; ignoring");
            return;
        };

        let magnitude = observed.min(U256::from(i128::MAX as u128)).as_u128() as i128;
        let before = entry.pending;
        if entry.pending > 0 {
            if magnitude > entry.pending {
                warn!(
                    "reconcile overshoot for {key}: observed {observed} against pending {before}; clamping to zero"
                );
                self.metrics.ledger_clamped_reconciliations.inc();
            }
            entry.pending = (entry.pending - magnitude).max(0);
        } else if entry.pending < 0 {
            if magnitude > -entry.pending {
                warn!(
                    "reconcile overshoot for {key}: observed {observed} against pending {before}; clamping to zero"
                );
                self.metrics.ledger_clamped_reconciliations.inc();
            }
            entry.pending = (entry.pending + magnitude).min(0);
        }
        entry.base = fresh_base;

        if entry.pending == 0 {
            entries.remove(&key);
            info!("ledger reconciled to ground truth: key={key}, base={fresh_base}");
        } else {
            debug!(
                "ledger partially reconciled: key={key}, pending {before} -> {}",
                entries[&key].pending
            );
        }
    }

    /// The locally adjusted view: `base + pending`. `None` means the key
    /// is not tracked and callers should fall through to chain truth.
    pub async fn read(&self, key: BalanceKey) -> Option<U256> {
        let entries = self.entries.read().await;
        entries.get(&key).map(|e| e.displayed())
    }

    /// Outstanding speculative delta for a key; zero when untracked.
    pub async fn pending_delta(&self, key: BalanceKey) -> i128 {
        let entries = self.entries.read().await;
        entries.get(&key).map(|e| e.pending).unwrap_or(0)
    }

    pub async fn tracked_keys(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContractName;
    use ethers::types::Address;

    fn key(id: u64) -> BalanceKey {
        BalanceKey {
            owner: Address::repeat_byte(0x11),
            contract: ContractName::Relics,
            token_id: U256::from(id),
        }
    }

    fn ledger() -> OptimisticLedger {
        OptimisticLedger::new(ClientMetrics::new_for_testing())
    }

    #[tokio::test]
    async fn test_displayed_value_is_base_plus_pending() {
        let ledger = ledger();
        let k = key(1);

        ledger.prime(k, U256::from(5u64)).await;
        assert_eq!(ledger.read(k).await, Some(U256::from(5u64)));

        ledger.adjust(k, -2).await;
        assert_eq!(ledger.read(k).await, Some(U256::from(3u64)));

        ledger.adjust(k, 4).await;
        assert_eq!(ledger.read(k).await, Some(U256::from(7u64)));
    }

    #[tokio::test]
    async fn test_adjust_is_strictly_reversible() {
        let ledger = ledger();
        let k = key(1);
        ledger.prime(k, U256::from(10u64)).await;
        let before = ledger.read(k).await;

        ledger.adjust(k, -3).await;
        assert_eq!(ledger.read(k).await, Some(U256::from(7u64)));

        // Failure-class terminal undoes the exact delta.
        ledger.adjust(k, 3).await;
        assert_eq!(ledger.read(k).await, before);
        assert_eq!(ledger.pending_delta(k).await, 0);
    }

    #[tokio::test]
    async fn test_reconcile_moves_pending_toward_zero_and_collects() {
        let ledger = ledger();
        let k = key(1);
        ledger.prime(k, U256::from(10u64)).await;
        ledger.adjust(k, -3).await;

        // Chain confirms the burn: observed magnitude 3, fresh base 7.
        ledger
            .reconcile(k, U256::from(3u64), U256::from(7u64))
            .await;
        assert_eq!(ledger.pending_delta(k).await, 0);
        // Entry collected once fully reconciled.
        assert_eq!(ledger.read(k).await, None);
        assert_eq!(ledger.tracked_keys().await, 0);
    }

    #[tokio::test]
    async fn test_partial_reconcile_keeps_remainder() {
        let ledger = ledger();
        let k = key(1);
        ledger.prime(k, U256::from(10u64)).await;
        ledger.adjust(k, -5).await;

        ledger
            .reconcile(k, U256::from(2u64), U256::from(8u64))
            .await;
        assert_eq!(ledger.pending_delta(k).await, -3);
        // base refreshed to 8, pending -3.
        assert_eq!(ledger.read(k).await, Some(U256::from(5u64)));
    }

    #[tokio::test]
    async fn test_reconcile_overshoot_clamps_to_zero() {
        let ledger = ledger();
        let k = key(1);
        ledger.prime(k, U256::from(10u64)).await;
        ledger.adjust(k, -2).await;

        // Event larger than the pending delta: clamp, never flip sign.
        ledger
            .reconcile(k, U256::from(9u64), U256::from(1u64))
            .await;
        assert_eq!(ledger.pending_delta(k).await, 0);
        assert_eq!(ledger.read(k).await, None);
    }

    #[tokio::test]
    async fn test_reconcile_untracked_key_is_ignored() {
        let ledger = ledger();
        ledger
            .reconcile(key(9), U256::from(1u64), U256::from(1u64))
            .await;
        assert_eq!(ledger.read(key(9)).await, None);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let ledger = ledger();
        ledger.prime(key(1), U256::from(10u64)).await;
        ledger.prime(key(2), U256::from(20u64)).await;

        ledger.adjust(key(1), -4).await;
        assert_eq!(ledger.read(key(1)).await, Some(U256::from(6u64)));
        assert_eq!(ledger.read(key(2)).await, Some(U256::from(20u64)));
    }

    #[tokio::test]
    async fn test_negative_view_saturates_at_zero() {
        let ledger = ledger();
        let k = key(1);
        ledger.prime(k, U256::from(1u64)).await;
        ledger.adjust(k, -5).await;
        assert_eq!(ledger.read(k).await, Some(U256::zero()));
    }
}
