// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoded contract events and the reconciliation task.
//!
//! Events are the trigger, never the truth: an observed transfer prompts
//! an authoritative `balanceOf` read, and the ledger is reconciled against
//! that read. This keeps the ledger correct even when events arrive late,
//! duplicated, or after a broadcast lag drops some of them.

use crate::approval::ApprovalCache;
use crate::chain_reader::ChainReader;
use crate::contracts::{CosmeticsContract, RelicsContract};
use crate::ledger::OptimisticLedger;
use crate::types::{BalanceKey, ContractAddressSet, ContractName};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tap::TapFallible;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    TransferSingle {
        contract: Address,
        operator: Address,
        from: Address,
        to: Address,
        id: U256,
        value: U256,
    },
    ApprovalForAll {
        contract: Address,
        account: Address,
        operator: Address,
        approved: bool,
    },
}

/// Background task folding observed events into the ledger and the
/// approval cache for one tracked user. Aborted on drop; a chain switch
/// builds a fresh reconciler against the new address set.
pub struct EventReconciler {
    handle: JoinHandle<()>,
}

impl EventReconciler {
    pub fn spawn(
        reader: Arc<dyn ChainReader>,
        addresses: ContractAddressSet,
        user: Address,
        ledger: Arc<OptimisticLedger>,
        approval_cache: Arc<ApprovalCache>,
    ) -> Self {
        let mut events = reader.subscribe_events();
        let relics = RelicsContract::new(reader.clone(), addresses.relics());
        let cosmetics = CosmeticsContract::new(reader, addresses.cosmetics());
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        handle_event(
                            event,
                            user,
                            &addresses,
                            &relics,
                            &cosmetics,
                            &ledger,
                            &approval_cache,
                        )
                        .await;
                    }
                    Err(RecvError::Lagged(dropped)) => {
                        // Safe to continue: the next relevant event still
                        // triggers a full authoritative re-read.
                        warn!("event stream lagged, {dropped} events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { handle }
    }
}

impl Drop for EventReconciler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_event(
    event: ChainEvent,
    user: Address,
    addresses: &ContractAddressSet,
    relics: &RelicsContract,
    cosmetics: &CosmeticsContract,
    ledger: &OptimisticLedger,
    approval_cache: &ApprovalCache,
) {
    match event {
        ChainEvent::TransferSingle {
            contract,
            from,
            to,
            id,
            value,
            ..
        } => {
            if from != user && to != user {
                return;
            }
            let name = match addresses.name_of(contract) {
                Some(name @ (ContractName::Relics | ContractName::Cosmetics)) => name,
                _ => {
                    debug!("transfer on unknown contract {contract:?}, ignoring");
                    return;
                }
            };
            let fresh = match name {
                ContractName::Relics => relics.balance_of(user, id).await,
                _ => cosmetics.balance_of(user, id).await,
            }
            .tap_err(|e| warn!("balance re-read after transfer event failed: {e}"));
            let Ok(fresh) = fresh else {
                return;
            };
            let key = BalanceKey {
                owner: user,
                contract: name,
                token_id: id,
            };
            ledger.reconcile(key, value, fresh).await;
        }
        ChainEvent::ApprovalForAll {
            contract,
            account,
            operator,
            ..
        } => {
            if account != user || contract != addresses.relics() {
                return;
            }
            debug!("approval event for tracked user, invalidating cache");
            approval_cache.invalidate(account, operator).await;
        }
    }
}
