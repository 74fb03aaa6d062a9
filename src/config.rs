// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::types::OperationClass;
use anyhow::anyhow;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Static per-chain settings.
///
/// Only `relics-address` is trusted as-is (the bootstrap, root of
/// chain-first resolution). The optional static addresses exist purely for
/// drift detection against what the chain actually reports; they are never
/// used as call targets.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainSettings {
    pub chain_id: u64,
    pub relics_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_maw_sacrifice_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_cosmetics_address: Option<Address>,
}

/// Confirmation and polling bounds, per operation class.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimeoutConfig {
    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: u64,
    #[serde(default = "default_simple_write_timeout_secs")]
    pub simple_write_timeout_secs: u64,
    #[serde(default = "default_ritual_timeout_secs")]
    pub ritual_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    // Delay before re-running the verification predicate after a timeout,
    // giving a late receipt a chance to land.
    #[serde(default = "default_verify_grace_delay_ms")]
    pub verify_grace_delay_ms: u64,
}

fn default_approval_timeout_secs() -> u64 {
    30
}

fn default_simple_write_timeout_secs() -> u64 {
    60
}

fn default_ritual_timeout_secs() -> u64 {
    90
}

fn default_receipt_poll_interval_ms() -> u64 {
    1000
}

fn default_verify_grace_delay_ms() -> u64 {
    2000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            approval_timeout_secs: default_approval_timeout_secs(),
            simple_write_timeout_secs: default_simple_write_timeout_secs(),
            ritual_timeout_secs: default_ritual_timeout_secs(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            verify_grace_delay_ms: default_verify_grace_delay_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn confirm_timeout(&self, class: OperationClass) -> Duration {
        let secs = match class {
            OperationClass::Approval => self.approval_timeout_secs,
            OperationClass::SimpleWrite => self.simple_write_timeout_secs,
            OperationClass::Ritual => self.ritual_timeout_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.verify_grace_delay_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    pub chains: Vec<ChainSettings>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default = "default_approval_cache_ttl_secs")]
    pub approval_cache_ttl_secs: u64,
}

fn default_approval_cache_ttl_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn chain(&self, chain_id: u64) -> Option<&ChainSettings> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn approval_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.approval_cache_ttl_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chains.is_empty() {
            return Err(anyhow!("no chains configured"));
        }
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(anyhow!("duplicate chain id {} in config", chain.chain_id));
            }
            if chain.relics_address.is_zero() {
                return Err(anyhow!(
                    "relics bootstrap address for chain {} is the zero address",
                    chain.chain_id
                ));
            }
        }
        Ok(())
    }
}
