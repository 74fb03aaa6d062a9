// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Logical names of the contracts this client coordinates with.
///
/// `Relics` is the bootstrap contract: the only address ever taken from
/// static configuration. Every other address is chain-read from an
/// already-trusted contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ContractName {
    Relics,
    MawSacrifice,
    Cosmetics,
}

impl ContractName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractName::Relics => "relics",
            ContractName::MawSacrifice => "maw_sacrifice",
            ContractName::Cosmetics => "cosmetics",
        }
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractName::Relics => write!(f, "Relics"),
            ContractName::MawSacrifice => write!(f, "MawSacrifice"),
            ContractName::Cosmetics => write!(f, "Cosmetics"),
        }
    }
}

/// The authoritative set of contract addresses for one chain session.
///
/// Immutable once resolved; a chain switch produces a brand-new set. The
/// map is private so a partially-populated set can never escape the
/// resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAddressSet {
    chain_id: u64,
    resolved_at_ms: u64,
    addresses: BTreeMap<ContractName, Address>,
}

impl ContractAddressSet {
    pub(crate) fn new(
        chain_id: u64,
        relics: Address,
        maw_sacrifice: Address,
        cosmetics: Address,
    ) -> Self {
        let mut addresses = BTreeMap::new();
        addresses.insert(ContractName::Relics, relics);
        addresses.insert(ContractName::MawSacrifice, maw_sacrifice);
        addresses.insert(ContractName::Cosmetics, cosmetics);
        let resolved_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            chain_id,
            resolved_at_ms,
            addresses,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn resolved_at_ms(&self) -> u64 {
        self.resolved_at_ms
    }

    pub fn relics(&self) -> Address {
        self.addresses[&ContractName::Relics]
    }

    pub fn maw_sacrifice(&self) -> Address {
        self.addresses[&ContractName::MawSacrifice]
    }

    pub fn cosmetics(&self) -> Address {
        self.addresses[&ContractName::Cosmetics]
    }

    pub fn get(&self, name: ContractName) -> Address {
        self.addresses[&name]
    }

    /// Reverse lookup used when mapping observed events back to a logical
    /// contract.
    pub fn name_of(&self, address: Address) -> Option<ContractName> {
        self.addresses
            .iter()
            .find(|(_, a)| **a == address)
            .map(|(n, _)| *n)
    }
}

/// Advisory mismatch between a statically configured address and the
/// chain-resolved value for the same logical name. Never an error;
/// surfaced at most once per name per resolution session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub chain_id: u64,
    pub name: ContractName,
    pub static_address: Address,
    pub resolved_address: Address,
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "static config for {} on chain {} is stale: configured {:?}, chain reports {:?}",
            self.name, self.chain_id, self.static_address, self.resolved_address
        )
    }
}

/// Classes of write operations, each with its own confirmation timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Operator approvals. Cheap, fast, no derived-id side effect.
    Approval,
    /// Single-step domain writes.
    SimpleWrite,
    /// Multi-step rituals; these take longer to land.
    Ritual,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Approval => "approval",
            OperationClass::SimpleWrite => "simple_write",
            OperationClass::Ritual => "ritual",
        }
    }
}

/// The slice of a transaction receipt this layer relies on. Receipt status
/// alone is never trusted as proof of semantic success; see the
/// verification predicate on `TransactionSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub status: bool,
    pub block_number: u64,
}

/// Locally generated identifier for one write attempt. A retry gets a
/// fresh intent id so attempts are distinguishable in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntentId(pub u64);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intent-{}", self.0)
    }
}

/// Key for one locally tracked balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub owner: Address,
    pub contract: ContractName,
    pub token_id: U256,
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}/{}", self.owner, self.contract, self.token_id)
    }
}

/// Which stage produced a revert-class terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertCause {
    /// A read-only preflight check failed; nothing was submitted.
    Preflight,
    /// The dry-run predicted failure; nothing was submitted, no fees spent.
    Simulation,
    /// The write could not be handed to the chain.
    Submission,
    /// The receipt reports on-chain failure; gas was spent.
    OnChain,
}

impl RevertCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevertCause::Preflight => "preflight",
            RevertCause::Simulation => "simulation",
            RevertCause::Submission => "submission",
            RevertCause::OnChain => "on_chain",
        }
    }
}

/// Lifecycle phases of one pending transaction.
///
/// Phases are emitted in the order defined here: preflight runs before
/// simulation, simulation before submission, and confirmation waiting only
/// starts once submission returned a hash. `TimedOut` is not terminal; it
/// is resolved through `VerifyingOutcome` into one of `ConfirmedLate`,
/// `GenuinelyFailed` or `CriticalInconsistent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPhase {
    Idle,
    PreflightChecking,
    Simulating,
    Submitted { tx_hash: H256 },
    Confirming { tx_hash: H256 },
    Confirmed { tx_hash: H256 },
    ConfirmedLate { tx_hash: H256 },
    Reverted { cause: RevertCause, reason: String },
    TimedOut { tx_hash: H256 },
    VerifyingOutcome { tx_hash: H256 },
    GenuinelyFailed { tx_hash: H256, reason: String },
    CriticalInconsistent { tx_hash: Option<H256>, detail: String },
}

impl TxPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxPhase::Confirmed { .. }
                | TxPhase::ConfirmedLate { .. }
                | TxPhase::Reverted { .. }
                | TxPhase::GenuinelyFailed { .. }
                | TxPhase::CriticalInconsistent { .. }
        )
    }

    /// Success-class terminal phases leave the optimistic ledger
    /// adjustment in place.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TxPhase::Confirmed { .. } | TxPhase::ConfirmedLate { .. }
        )
    }

    /// Failure-class terminal phases fully undo the optimistic adjustment.
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && !self.is_success()
    }

    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TxPhase::Idle => "idle",
            TxPhase::PreflightChecking => "preflight_checking",
            TxPhase::Simulating => "simulating",
            TxPhase::Submitted { .. } => "submitted",
            TxPhase::Confirming { .. } => "confirming",
            TxPhase::Confirmed { .. } => "confirmed",
            TxPhase::ConfirmedLate { .. } => "confirmed_late",
            TxPhase::Reverted { .. } => "reverted",
            TxPhase::TimedOut { .. } => "timed_out",
            TxPhase::VerifyingOutcome { .. } => "verifying_outcome",
            TxPhase::GenuinelyFailed { .. } => "genuinely_failed",
            TxPhase::CriticalInconsistent { .. } => "critical_inconsistent",
        }
    }
}
