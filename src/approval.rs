// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator-approval gating for ritual writes.
//!
//! `isApprovedForAll` is cheap but not free, and the answer rarely
//! changes, so positive results are held in a TTL cache keyed by
//! `(owner, operator)`. The cache is invalidated explicitly whenever a
//! locally submitted approval confirms or an `ApprovalForAll` event for
//! the owner is observed, so a stale entry can never mask a revocation
//! for longer than the TTL.

use crate::contracts::RelicsContract;
use crate::coordinator::{TransactionCoordinator, TransactionSpec};
use crate::error::ClientResult;
use crate::metrics::ClientMetrics;
use crate::types::OperationClass;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

pub struct ApprovalCache {
    ttl: Duration,
    entries: RwLock<HashMap<(Address, Address), (bool, Instant)>>,
    metrics: Arc<ClientMetrics>,
}

impl ApprovalCache {
    pub fn new(ttl: Duration, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    pub async fn get(&self, owner: Address, operator: Address) -> Option<bool> {
        let entries = self.entries.read().await;
        match entries.get(&(owner, operator)) {
            Some((approved, cached_at)) if cached_at.elapsed() < self.ttl => {
                self.metrics.approval_cache_hits.inc();
                Some(*approved)
            }
            _ => {
                self.metrics.approval_cache_misses.inc();
                None
            }
        }
    }

    pub async fn insert(&self, owner: Address, operator: Address, approved: bool) {
        self.entries
            .write()
            .await
            .insert((owner, operator), (approved, Instant::now()));
    }

    pub async fn invalidate(&self, owner: Address, operator: Address) {
        self.entries.write().await.remove(&(owner, operator));
    }
}

/// Ensures the Maw holds operator approval before a ritual needs it.
#[derive(Clone)]
pub struct ApprovalGate {
    relics: RelicsContract,
    coordinator: Arc<TransactionCoordinator>,
    cache: Arc<ApprovalCache>,
}

impl ApprovalGate {
    pub fn new(
        relics: RelicsContract,
        coordinator: Arc<TransactionCoordinator>,
        cache: Arc<ApprovalCache>,
    ) -> Self {
        Self {
            relics,
            coordinator,
            cache,
        }
    }

    /// Returns once `operator` is approved for `owner`, submitting a
    /// `setApprovalForAll` write if the chain says it is not. The cache
    /// entry is dropped after a confirmed write so the next check re-reads
    /// chain state instead of trusting the local assumption.
    pub async fn ensure_approved(&self, owner: Address, operator: Address) -> ClientResult<()> {
        if let Some(true) = self.cache.get(owner, operator).await {
            return Ok(());
        }

        if self.relics.is_approved_for_all(owner, operator).await? {
            self.cache.insert(owner, operator, true).await;
            return Ok(());
        }

        info!("requesting operator approval for {operator:?} on behalf of {owner:?}");
        let spec = TransactionSpec {
            description: format!("setApprovalForAll({operator:?}, true)"),
            class: OperationClass::Approval,
            request: self.relics.set_approval_for_all_request(operator, true),
            from: owner,
            preflight: vec![],
            ledger_adjustments: vec![],
            verification: None,
        };
        self.coordinator.execute(spec).await?;
        self.cache.invalidate(owner, operator).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutConfig;
    use crate::contracts::functions;
    use crate::ledger::OptimisticLedger;
    use crate::mock_chain_reader::MockChainReader;
    use crate::types::TxReceipt;
    use ethers::abi::Token;
    use ethers::types::H256;

    fn owner() -> Address {
        Address::repeat_byte(0x11)
    }

    fn operator() -> Address {
        Address::repeat_byte(0xbb)
    }

    fn relics_addr() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn gate(mock: Arc<MockChainReader>, ttl: Duration) -> (ApprovalGate, Arc<ApprovalCache>) {
        let metrics = ClientMetrics::new_for_testing();
        let ledger = Arc::new(OptimisticLedger::new(metrics.clone()));
        let coordinator = Arc::new(TransactionCoordinator::new(
            mock.clone(),
            ledger,
            TimeoutConfig::default(),
            metrics.clone(),
        ));
        let cache = Arc::new(ApprovalCache::new(ttl, metrics));
        let relics = RelicsContract::new(mock, relics_addr());
        (ApprovalGate::new(relics, coordinator, cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_cached_approval_skips_the_chain() {
        // No scripted responses: any chain read would fail the test.
        let mock = Arc::new(MockChainReader::new());
        let (gate, cache) = gate(mock, Duration::from_secs(30));
        cache.insert(owner(), operator(), true).await;

        gate.ensure_approved(owner(), operator()).await.unwrap();
    }

    #[tokio::test]
    async fn test_chain_read_populates_cache() {
        let mock = Arc::new(MockChainReader::new());
        mock.set_call_response(
            relics_addr(),
            functions::IS_APPROVED_FOR_ALL,
            vec![Token::Bool(true)],
        );
        let (gate, cache) = gate(mock.clone(), Duration::from_secs(30));

        gate.ensure_approved(owner(), operator()).await.unwrap();
        assert_eq!(cache.get(owner(), operator()).await, Some(true));
        assert!(mock.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_approval_submits_write_and_invalidates() {
        let mock = Arc::new(MockChainReader::new());
        mock.set_call_response(
            relics_addr(),
            functions::IS_APPROVED_FOR_ALL,
            vec![Token::Bool(false)],
        );
        mock.push_receipt(Some(TxReceipt {
            tx_hash: H256::zero(),
            status: true,
            block_number: 1,
        }));
        let (gate, cache) = gate(mock.clone(), Duration::from_secs(30));

        gate.ensure_approved(owner(), operator()).await.unwrap();

        let sent = mock.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].function, functions::SET_APPROVAL_FOR_ALL);
        assert_eq!(
            sent[0].args,
            vec![Token::Address(operator()), Token::Bool(true)]
        );
        // Next check must re-read chain state, not trust the local write.
        assert_eq!(cache.get(owner(), operator()).await, None);
    }

    /// After a local approval confirmed, a repeat check reads the chain
    /// (now reporting approval) without submitting a second write.
    #[tokio::test]
    async fn test_no_stale_answer_after_local_approval() {
        let mock = Arc::new(MockChainReader::new());
        // First read: not approved. Every later read: approved.
        mock.push_call_response(
            relics_addr(),
            functions::IS_APPROVED_FOR_ALL,
            Ok(vec![Token::Bool(false)]),
        );
        mock.set_call_response(
            relics_addr(),
            functions::IS_APPROVED_FOR_ALL,
            vec![Token::Bool(true)],
        );
        mock.push_receipt(Some(TxReceipt {
            tx_hash: H256::zero(),
            status: true,
            block_number: 1,
        }));
        let (gate, _) = gate(mock.clone(), Duration::from_secs(30));

        gate.ensure_approved(owner(), operator()).await.unwrap();
        gate.ensure_approved(owner(), operator()).await.unwrap();
        assert_eq!(mock.sent_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_entry_expires_after_ttl() {
        let mock = Arc::new(MockChainReader::new());
        let (_, cache) = gate(mock, Duration::from_secs(30));
        cache.insert(owner(), operator(), true).await;
        assert_eq!(cache.get(owner(), operator()).await, Some(true));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(cache.get(owner(), operator()).await, None);
    }
}
