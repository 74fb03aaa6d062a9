// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the inline test modules.

use crate::config::{ChainSettings, ClientConfig, TimeoutConfig};
use crate::contracts::functions;
use crate::mock_chain_reader::MockChainReader;
use ethers::abi::Token;
use ethers::types::Address;

pub const CHAIN_ID: u64 = 11155111;

pub fn user() -> Address {
    Address::repeat_byte(0x11)
}

pub fn relics_addr() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn maw_addr() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn cosmetics_addr() -> Address {
    Address::repeat_byte(0xcc)
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        chains: vec![ChainSettings {
            chain_id: CHAIN_ID,
            relics_address: relics_addr(),
            static_maw_sacrifice_address: None,
            static_cosmetics_address: None,
        }],
        timeouts: TimeoutConfig::default(),
        approval_cache_ttl_secs: 30,
    }
}

pub fn config_with_static_maw(static_maw: Address) -> ClientConfig {
    let mut config = test_config();
    config.chains[0].static_maw_sacrifice_address = Some(static_maw);
    config
}

/// Scripts the two cascade reads the resolver performs.
pub fn script_happy_cascade(mock: &MockChainReader) {
    mock.set_call_response(
        relics_addr(),
        functions::MAW_SACRIFICE,
        vec![Token::Address(maw_addr())],
    );
    mock.set_call_response(
        maw_addr(),
        functions::COSMETICS,
        vec![Token::Address(cosmetics_addr())],
    );
}

/// Hooks tracing output into the test harness; safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
