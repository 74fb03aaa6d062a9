// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, IntCounter,
    IntCounterVec, Registry,
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ClientMetrics {
    pub(crate) resolutions_ok: IntCounterVec,
    pub(crate) resolutions_err: IntCounterVec,
    pub(crate) drift_reports: IntCounterVec,
    pub(crate) tx_terminal_phases: IntCounterVec,
    pub(crate) preflight_failures: IntCounterVec,
    pub(crate) approval_cache_hits: IntCounter,
    pub(crate) approval_cache_misses: IntCounter,
    pub(crate) ledger_clamped_reconciliations: IntCounter,
    // Indicates consumed input with no observed effect; wired to alerting.
    pub(crate) critical_inconsistencies: IntCounter,
}

impl ClientMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            resolutions_ok: register_int_counter_vec_with_registry!(
                "ritual_client_resolutions_ok",
                "Successful address resolutions by chain id",
                &["chain_id"],
                registry,
            )
            .unwrap(),
            resolutions_err: register_int_counter_vec_with_registry!(
                "ritual_client_resolutions_err",
                "Failed address resolutions by error type",
                &["error_type"],
                registry,
            )
            .unwrap(),
            drift_reports: register_int_counter_vec_with_registry!(
                "ritual_client_drift_reports",
                "Static/chain address mismatches by logical contract name",
                &["contract"],
                registry,
            )
            .unwrap(),
            tx_terminal_phases: register_int_counter_vec_with_registry!(
                "ritual_client_tx_terminal_phases",
                "Terminal transaction phases by operation class",
                &["class", "phase"],
                registry,
            )
            .unwrap(),
            preflight_failures: register_int_counter_vec_with_registry!(
                "ritual_client_preflight_failures",
                "Preflight check failures by check name",
                &["check"],
                registry,
            )
            .unwrap(),
            approval_cache_hits: register_int_counter_with_registry!(
                "ritual_client_approval_cache_hits",
                "Approval status served from cache",
                registry,
            )
            .unwrap(),
            approval_cache_misses: register_int_counter_with_registry!(
                "ritual_client_approval_cache_misses",
                "Approval status read from chain",
                registry,
            )
            .unwrap(),
            ledger_clamped_reconciliations: register_int_counter_with_registry!(
                "ritual_client_ledger_clamped_reconciliations",
                "Reconciliations that overshot the pending delta and were clamped",
                registry,
            )
            .unwrap(),
            critical_inconsistencies: register_int_counter_with_registry!(
                "ritual_client_critical_inconsistencies",
                "Transactions that consumed input without the expected effect appearing",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Arc<Self> {
        let registry = Registry::new();
        Arc::new(Self::new(&registry))
    }
}
