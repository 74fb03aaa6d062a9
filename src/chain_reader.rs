// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The capability this crate requires of an RPC client.
//!
//! The core never talks JSON-RPC itself; everything it needs from the
//! chain is expressed through [`ChainReader`]. Production wires this to a
//! real provider, tests script it.

use crate::error::ClientResult;
use crate::events::ChainEvent;
use crate::types::TxReceipt;
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256};
use tokio::sync::broadcast;

/// One read-only or write call against a contract, identified by its
/// human-readable function signature (e.g. `"balanceOf(address,uint256)"`).
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub to: Address,
    pub function: String,
    pub args: Vec<Token>,
}

impl CallRequest {
    pub fn new(to: Address, function: impl Into<String>, args: Vec<Token>) -> Self {
        Self {
            to,
            function: function.into(),
            args,
        }
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute a read-only contract call and return the decoded outputs.
    ///
    /// Fails with `RpcError` on transport problems and `RevertError` when
    /// the call reverts.
    async fn call(&self, req: &CallRequest) -> ClientResult<Vec<Token>>;

    /// Dry-run a write against current chain state without submitting it.
    ///
    /// A predicted failure surfaces as `RevertError` carrying the revert
    /// reason verbatim.
    async fn simulate(&self, req: &CallRequest, from: Address) -> ClientResult<()>;

    /// Submit a write and return the chain-assigned transaction hash.
    async fn send(&self, req: &CallRequest, from: Address) -> ClientResult<H256>;

    /// Fetch the receipt for a submitted transaction, `None` while still
    /// pending.
    async fn get_receipt(&self, tx_hash: H256) -> ClientResult<Option<TxReceipt>>;

    /// Subscribe to the decoded contract event stream.
    fn subscribe_events(&self) -> broadcast::Receiver<ChainEvent>;
}
