// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Deterministic bound-identifier derivation.
//!
//! Must match the contract's own computation byte for byte:
//! `keccak256(abi.encodePacked("BOUND", baseTypeId, contextId))`, reduced
//! into the id range reserved for bound instances. A disagreement between
//! this function and the contract is a protocol-breaking bug, not a
//! runtime condition; the pinned vectors below guard against it.

use ethers::types::U256;
use ethers::utils::keccak256;

/// Tag mixed into the packed preimage, matching the contract source.
pub const BOUND_TAG: &str = "BOUND";

/// Bound instance ids start here; catalog/type ids live strictly below.
/// Pinned to the authoritative contract constant.
pub const BOUND_ID_OFFSET: u64 = 1_000_000_000;

/// Derive the bound instance id for a catalog item bound to an owner
/// context. Pure function of its inputs; total over all uint inputs.
pub fn derive_bound_id(base_type_id: U256, context_id: U256) -> U256 {
    let mut packed = Vec::with_capacity(BOUND_TAG.len() + 64);
    packed.extend_from_slice(BOUND_TAG.as_bytes());
    let mut word = [0u8; 32];
    base_type_id.to_big_endian(&mut word);
    packed.extend_from_slice(&word);
    context_id.to_big_endian(&mut word);
    packed.extend_from_slice(&word);

    let hash = U256::from_big_endian(&keccak256(packed));
    let offset = U256::from(BOUND_ID_OFFSET);
    // modulus = 2^256 - OFFSET, expressed without overflowing U256.
    let modulus = (U256::MAX - offset) + U256::one();
    let reduced = if hash >= modulus { hash - modulus } else { hash };
    reduced + offset
}
