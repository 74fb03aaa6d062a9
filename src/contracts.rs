// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static typed contract surfaces.
//!
//! Function signatures are fixed at build time; an operation missing from
//! this module is a build-time data error, never a runtime patch. Each
//! surface wraps the [`ChainReader`] capability with decoded, typed
//! accessors for exactly the reads and writes the coordination layer uses.

use crate::chain_reader::{CallRequest, ChainReader};
use crate::error::{ClientError, ClientResult};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::sync::Arc;

pub mod functions {
    // Relics (multi-token): balances, operator approvals, trusted Maw.
    pub const MAW_SACRIFICE: &str = "mawSacrifice()";
    pub const BALANCE_OF: &str = "balanceOf(address,uint256)";
    pub const IS_APPROVED_FOR_ALL: &str = "isApprovedForAll(address,address)";
    pub const SET_APPROVAL_FOR_ALL: &str = "setApprovalForAll(address,bool)";

    // MawSacrifice: the ritual entry points and its trusted Cosmetics.
    pub const COSMETICS: &str = "cosmetics()";
    pub const PAUSED: &str = "paused()";
    pub const SACRIFICE_KEYS: &str = "sacrificeKeys(uint256)";
    pub const SACRIFICE_FOR_COSMETIC: &str = "sacrificeForCosmetic(uint256,uint256)";
}

fn malformed(function: &str, tokens: &[Token]) -> ClientError {
    ClientError::RpcError(format!(
        "{function} returned malformed data: {tokens:?}"
    ))
}

pub(crate) fn expect_address(function: &str, tokens: &[Token]) -> ClientResult<Address> {
    match tokens {
        [Token::Address(a)] => Ok(*a),
        other => Err(malformed(function, other)),
    }
}

pub(crate) fn expect_uint(function: &str, tokens: &[Token]) -> ClientResult<U256> {
    match tokens {
        [Token::Uint(v)] => Ok(*v),
        other => Err(malformed(function, other)),
    }
}

pub(crate) fn expect_bool(function: &str, tokens: &[Token]) -> ClientResult<bool> {
    match tokens {
        [Token::Bool(b)] => Ok(*b),
        other => Err(malformed(function, other)),
    }
}

/// The bootstrap multi-token contract. Holds the caps being sacrificed and
/// the operator approvals that let the Maw move them.
#[derive(Clone)]
pub struct RelicsContract {
    reader: Arc<dyn ChainReader>,
    address: Address,
}

impl RelicsContract {
    pub fn new(reader: Arc<dyn ChainReader>, address: Address) -> Self {
        Self { reader, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The MawSacrifice address this Relics deployment trusts. Root read of
    /// the cascading resolution.
    pub async fn maw_sacrifice(&self) -> ClientResult<Address> {
        let req = CallRequest::new(self.address, functions::MAW_SACRIFICE, vec![]);
        let tokens = self.reader.call(&req).await?;
        expect_address(functions::MAW_SACRIFICE, &tokens)
    }

    pub async fn balance_of(&self, owner: Address, id: U256) -> ClientResult<U256> {
        let req = CallRequest::new(
            self.address,
            functions::BALANCE_OF,
            vec![Token::Address(owner), Token::Uint(id)],
        );
        let tokens = self.reader.call(&req).await?;
        expect_uint(functions::BALANCE_OF, &tokens)
    }

    pub async fn is_approved_for_all(
        &self,
        owner: Address,
        operator: Address,
    ) -> ClientResult<bool> {
        let req = CallRequest::new(
            self.address,
            functions::IS_APPROVED_FOR_ALL,
            vec![Token::Address(owner), Token::Address(operator)],
        );
        let tokens = self.reader.call(&req).await?;
        expect_bool(functions::IS_APPROVED_FOR_ALL, &tokens)
    }

    pub fn set_approval_for_all_request(&self, operator: Address, approved: bool) -> CallRequest {
        CallRequest::new(
            self.address,
            functions::SET_APPROVAL_FOR_ALL,
            vec![Token::Address(operator), Token::Bool(approved)],
        )
    }
}

/// The ritual contract: consumes caps, mints bound cosmetics.
#[derive(Clone)]
pub struct MawSacrificeContract {
    reader: Arc<dyn ChainReader>,
    address: Address,
}

impl MawSacrificeContract {
    pub fn new(reader: Arc<dyn ChainReader>, address: Address) -> Self {
        Self { reader, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The Cosmetics address this Maw deployment uses. Second level of the
    /// cascading resolution.
    pub async fn cosmetics(&self) -> ClientResult<Address> {
        let req = CallRequest::new(self.address, functions::COSMETICS, vec![]);
        let tokens = self.reader.call(&req).await?;
        expect_address(functions::COSMETICS, &tokens)
    }

    pub async fn paused(&self) -> ClientResult<bool> {
        let req = CallRequest::new(self.address, functions::PAUSED, vec![]);
        let tokens = self.reader.call(&req).await?;
        expect_bool(functions::PAUSED, &tokens)
    }

    pub fn sacrifice_keys_request(&self, amount: U256) -> CallRequest {
        CallRequest::new(
            self.address,
            functions::SACRIFICE_KEYS,
            vec![Token::Uint(amount)],
        )
    }

    pub fn sacrifice_for_cosmetic_request(
        &self,
        base_type_id: U256,
        context_id: U256,
    ) -> CallRequest {
        CallRequest::new(
            self.address,
            functions::SACRIFICE_FOR_COSMETIC,
            vec![Token::Uint(base_type_id), Token::Uint(context_id)],
        )
    }
}

/// The bound-item contract; only balance reads are needed client-side
/// (bound ids are derived, then proven by positive balance).
#[derive(Clone)]
pub struct CosmeticsContract {
    reader: Arc<dyn ChainReader>,
    address: Address,
}

impl CosmeticsContract {
    pub fn new(reader: Arc<dyn ChainReader>, address: Address) -> Self {
        Self { reader, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, owner: Address, id: U256) -> ClientResult<U256> {
        let req = CallRequest::new(
            self.address,
            functions::BALANCE_OF,
            vec![Token::Address(owner), Token::Uint(id)],
        );
        let tokens = self.reader.call(&req).await?;
        expect_uint(functions::BALANCE_OF, &tokens)
    }
}
