// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Domain write builders.
//!
//! Each builder assembles a complete [`TransactionSpec`]: the call itself,
//! the read-only preflight checks that catch doomed writes before any fee
//! is spent, the speculative ledger deltas, and the verification
//! predicates the coordinator falls back on when an outcome is ambiguous.

use crate::contracts::{CosmeticsContract, MawSacrificeContract, RelicsContract};
use crate::coordinator::{
    predicate, LedgerAdjustment, PreflightCheck, TransactionSpec, Verification,
};
use crate::derivation::derive_bound_id;
use crate::error::ClientError;
use crate::ledger::OptimisticLedger;
use crate::types::{BalanceKey, ContractName, OperationClass};
use ethers::types::{Address, U256};
use std::sync::{Arc, Mutex};

/// Token id of the sacrificial rusted caps. The deployment migrated the
/// sacrificial token away from id 0; wallets that still hold value there
/// need the explicit mismatch message from the balance preflight.
pub const RUSTED_CAP_ID: u64 = 1;
pub const LEGACY_KEY_ID: u64 = 0;

/// Relics balance snapshot taken by the balance preflight and consulted by
/// the post-timeout verification predicates of the same attempt.
type BalanceSnapshot = Arc<Mutex<Option<U256>>>;

/// Cap amounts far exceed any real wallet; clamp so the delta fits the
/// ledger's i128.
fn clamped_delta(amount: U256) -> i128 {
    amount.min(U256::from(i128::MAX as u128)).as_u128() as i128
}

pub struct RitualBuilder {
    relics: RelicsContract,
    maw: MawSacrificeContract,
    cosmetics: CosmeticsContract,
    ledger: Arc<OptimisticLedger>,
    user: Address,
}

impl RitualBuilder {
    pub fn new(
        relics: RelicsContract,
        maw: MawSacrificeContract,
        cosmetics: CosmeticsContract,
        ledger: Arc<OptimisticLedger>,
        user: Address,
    ) -> Self {
        Self {
            relics,
            maw,
            cosmetics,
            ledger,
            user,
        }
    }

    fn cap_key(&self) -> BalanceKey {
        BalanceKey {
            owner: self.user,
            contract: ContractName::Relics,
            token_id: U256::from(RUSTED_CAP_ID),
        }
    }

    /// Burn `amount` rusted caps through `sacrificeKeys`.
    pub fn key_sacrifice_spec(&self, amount: U256) -> TransactionSpec {
        let snapshot: BalanceSnapshot = Arc::new(Mutex::new(None));
        TransactionSpec {
            description: format!("sacrificeKeys({amount})"),
            class: OperationClass::Ritual,
            request: self.maw.sacrifice_keys_request(amount),
            from: self.user,
            preflight: vec![
                self.pause_check(),
                self.cap_balance_check(amount, snapshot.clone()),
                self.approval_check(),
            ],
            ledger_adjustments: vec![LedgerAdjustment {
                key: self.cap_key(),
                delta: -clamped_delta(amount),
            }],
            verification: Some(Verification {
                effect_holds: self.caps_spent_predicate(amount, snapshot.clone()),
                input_consumed: self.caps_touched_predicate(snapshot),
            }),
        }
    }

    /// Sacrifice one cap to mint the cosmetic bound to `context_id`. The
    /// minted token id is derived locally; semantic success is the
    /// predicted bound id holding positive balance, regardless of what the
    /// receipt says.
    pub fn cosmetic_bind_spec(&self, base_type_id: U256, context_id: U256) -> TransactionSpec {
        let snapshot: BalanceSnapshot = Arc::new(Mutex::new(None));
        let bound_id = derive_bound_id(base_type_id, context_id);
        let bound_key = BalanceKey {
            owner: self.user,
            contract: ContractName::Cosmetics,
            token_id: bound_id,
        };
        let cost = U256::one();

        let cosmetics = self.cosmetics.clone();
        let user = self.user;
        let effect_holds = predicate(move || {
            let cosmetics = cosmetics.clone();
            async move {
                let balance = cosmetics.balance_of(user, bound_id).await?;
                Ok(balance > U256::zero())
            }
        });

        TransactionSpec {
            description: format!("sacrificeForCosmetic({base_type_id}, {context_id})"),
            class: OperationClass::Ritual,
            request: self
                .maw
                .sacrifice_for_cosmetic_request(base_type_id, context_id),
            from: self.user,
            preflight: vec![
                self.pause_check(),
                self.cap_balance_check(cost, snapshot.clone()),
                self.approval_check(),
            ],
            ledger_adjustments: vec![
                LedgerAdjustment {
                    key: self.cap_key(),
                    delta: -1,
                },
                LedgerAdjustment {
                    key: bound_key,
                    delta: 1,
                },
            ],
            verification: Some(Verification {
                effect_holds,
                input_consumed: self.caps_touched_predicate(snapshot),
            }),
        }
    }

    fn pause_check(&self) -> PreflightCheck {
        let maw = self.maw.clone();
        PreflightCheck::new("maw_paused", move || {
            let maw = maw.clone();
            async move {
                if maw.paused().await? {
                    return Err(ClientError::PreflightFailed(
                        "the maw is paused; sacrifices are disabled".to_string(),
                    ));
                }
                Ok(())
            }
        })
    }

    /// Reads the cap balance, primes the ledger base with the
    /// authoritative value, and snapshots it for the verification
    /// predicates. A wallet holding value only at the legacy id gets the
    /// explicit mismatch message rather than a bare "insufficient".
    fn cap_balance_check(&self, amount: U256, snapshot: BalanceSnapshot) -> PreflightCheck {
        let relics = self.relics.clone();
        let ledger = self.ledger.clone();
        let user = self.user;
        let key = self.cap_key();
        PreflightCheck::new("cap_balance", move || {
            let relics = relics.clone();
            let ledger = ledger.clone();
            let snapshot = snapshot.clone();
            async move {
                let balance = relics.balance_of(user, U256::from(RUSTED_CAP_ID)).await?;
                ledger.prime(key, balance).await;
                *snapshot.lock().unwrap() = Some(balance);
                if balance >= amount {
                    return Ok(());
                }
                let legacy = relics.balance_of(user, U256::from(LEGACY_KEY_ID)).await?;
                if legacy >= amount {
                    return Err(ClientError::PreflightFailed(format!(
                        "rusted caps sit at legacy token id {LEGACY_KEY_ID} but the ritual \
                         consumes token id {RUSTED_CAP_ID}: {legacy} at id {LEGACY_KEY_ID}, \
                         {balance} at id {RUSTED_CAP_ID}"
                    )));
                }
                Err(ClientError::PreflightFailed(format!(
                    "insufficient rusted caps: have {balance}, need {amount}"
                )))
            }
        })
    }

    fn approval_check(&self) -> PreflightCheck {
        let relics = self.relics.clone();
        let user = self.user;
        let maw_address = self.maw.address();
        PreflightCheck::new("maw_approval", move || {
            let relics = relics.clone();
            async move {
                if relics.is_approved_for_all(user, maw_address).await? {
                    Ok(())
                } else {
                    Err(ClientError::PreflightFailed(
                        "the maw is not approved to move caps; run the approval flow first"
                            .to_string(),
                    ))
                }
            }
        })
    }

    /// True once the wallet's cap balance dropped by at least `amount`
    /// relative to the preflight snapshot.
    fn caps_spent_predicate(&self, amount: U256, snapshot: BalanceSnapshot) -> crate::coordinator::AsyncPredicate {
        let relics = self.relics.clone();
        let user = self.user;
        predicate(move || {
            let relics = relics.clone();
            let snapshot = snapshot.clone();
            async move {
                let current = relics.balance_of(user, U256::from(RUSTED_CAP_ID)).await?;
                let before = *snapshot.lock().unwrap();
                match before.and_then(|b| b.checked_sub(amount)) {
                    Some(expected_max) => Ok(current <= expected_max),
                    None => Ok(false),
                }
            }
        })
    }

    /// True once any caps left the wallet relative to the snapshot.
    fn caps_touched_predicate(&self, snapshot: BalanceSnapshot) -> crate::coordinator::AsyncPredicate {
        let relics = self.relics.clone();
        let user = self.user;
        predicate(move || {
            let relics = relics.clone();
            let snapshot = snapshot.clone();
            async move {
                let current = relics.balance_of(user, U256::from(RUSTED_CAP_ID)).await?;
                match *snapshot.lock().unwrap() {
                    Some(before) => Ok(current < before),
                    None => Ok(false),
                }
            }
        })
    }
}
