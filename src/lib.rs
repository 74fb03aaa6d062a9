// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Client-side coordination layer for the Relics / MawSacrifice /
//! Cosmetics contract set.
//!
//! The crate sits between an embedding application and the chain and owns
//! four concerns:
//!
//! - **Address resolution**: only the Relics bootstrap address is
//!   configured statically; every other contract address is read from the
//!   chain through the contracts' own trust links, with drift detection
//!   against optional static entries ([`resolver`]).
//! - **Bound-id derivation**: the token id a cosmetic bind will mint is
//!   computed locally, byte-for-byte compatible with the contract
//!   ([`derivation`]).
//! - **Transaction lifecycle**: every write runs preflight checks, a
//!   dry-run, submission, a bounded confirmation wait, and post-hoc
//!   verification when the outcome is ambiguous ([`coordinator`]).
//! - **Optimistic balances**: speculative deltas shown immediately on
//!   submission and reconciled against authoritative reads triggered by
//!   chain events ([`ledger`], [`events`]).
//!
//! [`RitualClient`] is the facade tying these together per chain session.

pub mod approval;
pub mod chain_reader;
pub mod client;
pub mod config;
pub mod contracts;
pub mod coordinator;
pub mod derivation;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod resolver;
pub mod rituals;
pub mod types;

#[cfg(test)]
pub(crate) mod mock_chain_reader;
#[cfg(test)]
pub(crate) mod test_utils;

pub use chain_reader::{CallRequest, ChainReader};
pub use client::RitualClient;
pub use config::{ChainSettings, ClientConfig, TimeoutConfig};
pub use coordinator::{
    predicate, AsyncPredicate, LedgerAdjustment, PreflightCheck, TransactionCoordinator,
    TransactionSpec, Verification,
};
pub use derivation::{derive_bound_id, BOUND_ID_OFFSET};
pub use error::{ClientError, ClientResult};
pub use events::ChainEvent;
pub use ledger::OptimisticLedger;
pub use metrics::ClientMetrics;
pub use resolver::{AddressResolver, ResolutionSession};
pub use types::{
    BalanceKey, ContractAddressSet, ContractName, DriftReport, IntentId, OperationClass,
    RevertCause, TxPhase, TxReceipt,
};
