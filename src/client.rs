// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The embedding surface.
//!
//! [`RitualClient`] owns everything scoped to one chain connection: the
//! frozen address set, the optimistic ledger, the coordinator, the
//! approval gate, and the background event reconciler. A chain switch
//! tears the whole session down and rebuilds it against the new chain, so
//! no address, cached approval, or speculative balance can leak across
//! chains.

use crate::approval::{ApprovalCache, ApprovalGate};
use crate::chain_reader::ChainReader;
use crate::config::ClientConfig;
use crate::contracts::{CosmeticsContract, MawSacrificeContract, RelicsContract};
use crate::coordinator::{TransactionCoordinator, TransactionSpec};
use crate::derivation::derive_bound_id;
use crate::error::{ClientError, ClientResult};
use crate::events::EventReconciler;
use crate::ledger::OptimisticLedger;
use crate::metrics::ClientMetrics;
use crate::resolver::{AddressResolver, ResolutionSession};
use crate::rituals::RitualBuilder;
use crate::types::{BalanceKey, ContractAddressSet, ContractName, DriftReport, IntentId, TxPhase};
use ethers::types::{Address, U256};
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

struct ChainSession {
    addresses: ContractAddressSet,
    resolution: Arc<ResolutionSession>,
    ledger: Arc<OptimisticLedger>,
    coordinator: Arc<TransactionCoordinator>,
    gate: ApprovalGate,
    rituals: Arc<RitualBuilder>,
    relics: RelicsContract,
    cosmetics: CosmeticsContract,
    // Aborted on drop; the session owns its reconciler's lifetime.
    _reconciler: EventReconciler,
}

pub struct RitualClient {
    reader: Arc<dyn ChainReader>,
    config: ClientConfig,
    metrics: Arc<ClientMetrics>,
    user: Address,
    session: RwLock<Option<ChainSession>>,
}

impl RitualClient {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        config: ClientConfig,
        user: Address,
        registry: &Registry,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            config,
            metrics: Arc::new(ClientMetrics::new(registry)),
            user,
            session: RwLock::new(None),
        })
    }

    /// Resolve the contract set for `chain_id` and build a fresh session
    /// around it. Fails closed: on any resolution error no session exists
    /// afterwards, including a previously connected one.
    pub async fn connect(&self, chain_id: u64) -> ClientResult<ContractAddressSet> {
        self.session.write().await.take();

        let resolution = Arc::new(ResolutionSession::new());
        let resolver = AddressResolver::new(
            self.reader.clone(),
            self.config.clone(),
            self.metrics.clone(),
        );
        let addresses = resolver.resolve(chain_id, &resolution).await?;

        let ledger = Arc::new(OptimisticLedger::new(self.metrics.clone()));
        let coordinator = Arc::new(TransactionCoordinator::new(
            self.reader.clone(),
            ledger.clone(),
            self.config.timeouts.clone(),
            self.metrics.clone(),
        ));
        let relics = RelicsContract::new(self.reader.clone(), addresses.relics());
        let maw = MawSacrificeContract::new(self.reader.clone(), addresses.maw_sacrifice());
        let cosmetics = CosmeticsContract::new(self.reader.clone(), addresses.cosmetics());
        let cache = Arc::new(ApprovalCache::new(
            self.config.approval_cache_ttl(),
            self.metrics.clone(),
        ));
        let gate = ApprovalGate::new(relics.clone(), coordinator.clone(), cache.clone());
        let rituals = Arc::new(RitualBuilder::new(
            relics.clone(),
            maw,
            cosmetics.clone(),
            ledger.clone(),
            self.user,
        ));
        let reconciler = EventReconciler::spawn(
            self.reader.clone(),
            addresses.clone(),
            self.user,
            ledger.clone(),
            cache,
        );

        *self.session.write().await = Some(ChainSession {
            addresses: addresses.clone(),
            resolution,
            ledger,
            coordinator,
            gate,
            rituals,
            relics,
            cosmetics,
            _reconciler: reconciler,
        });
        info!("connected to chain {chain_id} as {:?}", self.user);
        Ok(addresses)
    }

    /// Discard the current session entirely and re-resolve against the new
    /// chain. Drift warnings start over with the fresh session.
    pub async fn switch_chain(&self, chain_id: u64) -> ClientResult<ContractAddressSet> {
        self.connect(chain_id).await
    }

    pub async fn addresses(&self) -> Option<ContractAddressSet> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.addresses.clone())
    }

    pub async fn drift_reports(&self) -> Vec<DriftReport> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.resolution.drift_reports())
            .unwrap_or_default()
    }

    /// Predict the token id a cosmetic bind will mint. Pure; usable before
    /// connecting.
    pub fn derive_bound_id(&self, base_type_id: U256, context_id: U256) -> U256 {
        derive_bound_id(base_type_id, context_id)
    }

    /// Ensure the Maw may move the user's caps, submitting an approval
    /// write if the chain says it cannot.
    pub async fn ensure_maw_approved(&self) -> ClientResult<()> {
        let (gate, operator) = {
            let guard = self.session.read().await;
            let session = guard.as_ref().ok_or_else(not_connected)?;
            (session.gate.clone(), session.addresses.maw_sacrifice())
        };
        gate.ensure_approved(self.user, operator).await
    }

    /// Submit an arbitrary prepared spec and observe its phase stream.
    /// The ritual builders cover the common writes; this is the escape
    /// hatch for embedders composing their own specs.
    pub async fn submit_transaction(
        &self,
        spec: TransactionSpec,
    ) -> ClientResult<(IntentId, mpsc::Receiver<TxPhase>)> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(not_connected)?;
        Ok(session.coordinator.submit(spec))
    }

    /// Start a key sacrifice and return its phase stream.
    pub async fn sacrifice_keys(
        &self,
        amount: U256,
    ) -> ClientResult<(IntentId, mpsc::Receiver<TxPhase>)> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(not_connected)?;
        let spec = session.rituals.key_sacrifice_spec(amount);
        Ok(session.coordinator.submit(spec))
    }

    /// Start a cosmetic bind and return its phase stream.
    pub async fn bind_cosmetic(
        &self,
        base_type_id: U256,
        context_id: U256,
    ) -> ClientResult<(IntentId, mpsc::Receiver<TxPhase>)> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(not_connected)?;
        let spec = session.rituals.cosmetic_bind_spec(base_type_id, context_id);
        Ok(session.coordinator.submit(spec))
    }

    /// The balance the UI should display: the locally adjusted view while
    /// a write is in flight, chain truth otherwise.
    pub async fn read_optimistic_balance(
        &self,
        contract: ContractName,
        token_id: U256,
    ) -> ClientResult<U256> {
        let (ledger, relics, cosmetics) = {
            let guard = self.session.read().await;
            let session = guard.as_ref().ok_or_else(not_connected)?;
            (
                session.ledger.clone(),
                session.relics.clone(),
                session.cosmetics.clone(),
            )
        };
        let key = BalanceKey {
            owner: self.user,
            contract,
            token_id,
        };
        if let Some(value) = ledger.read(key).await {
            return Ok(value);
        }
        match contract {
            ContractName::Relics => relics.balance_of(self.user, token_id).await,
            ContractName::Cosmetics => cosmetics.balance_of(self.user, token_id).await,
            ContractName::MawSacrifice => Err(ClientError::InternalError(
                "MawSacrifice holds no balances".to_string(),
            )),
        }
    }
}

fn not_connected() -> ClientError {
    ClientError::InternalError("not connected to a chain".to_string())
}
