// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transaction lifecycle coordination.
//!
//! One [`TransactionSpec`] drives one write attempt through a fixed phase
//! order: preflight checks, dry-run simulation, submission, confirmation
//! wait, and outcome verification. The verification predicate is the
//! arbiter of semantic success: it is run on a confirmed receipt (a
//! success status with no observable effect is a critical inconsistency,
//! never silently accepted) and again after a timeout to resolve
//! ambiguous outcomes. Each submitted spec gets its own spawned task and
//! phase stream; concurrent writes never share state except through the
//! ledger.
//!
//! The optimistic ledger adjustment is applied exactly once, on entry to
//! `Submitted`, and undone in full on every failure-class terminal, so a
//! caller observing the ledger after a failure sees the pre-submission
//! view.

use crate::chain_reader::{CallRequest, ChainReader};
use crate::config::TimeoutConfig;
use crate::error::{ClientError, ClientResult};
use crate::ledger::OptimisticLedger;
use crate::metrics::ClientMetrics;
use crate::types::{BalanceKey, IntentId, OperationClass, RevertCause, TxPhase, TxReceipt};
use ethers::types::{Address, H256};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// A re-runnable async check returning whether some chain condition holds.
pub type AsyncPredicate = Arc<dyn Fn() -> BoxFuture<'static, ClientResult<bool>> + Send + Sync>;

/// Builds an [`AsyncPredicate`] from a closure returning a future.
pub fn predicate<F, Fut>(f: F) -> AsyncPredicate
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ClientResult<bool>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// A named read-only check run before simulation. Failing with
/// `PreflightFailed` carries the user-facing reason; any other error aborts
/// the attempt the same way.
#[derive(Clone)]
pub struct PreflightCheck {
    pub name: &'static str,
    run: Arc<dyn Fn() -> BoxFuture<'static, ClientResult<()>> + Send + Sync>,
}

impl PreflightCheck {
    pub fn new<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<()>> + Send + 'static,
    {
        Self {
            name,
            run: Arc::new(move || f().boxed()),
        }
    }

    pub async fn run(&self) -> ClientResult<()> {
        (self.run)().await
    }
}

/// Predicates used to resolve an ambiguous (timed-out) outcome.
///
/// `effect_holds` proves semantic success independently of the receipt;
/// `input_consumed` detects the dangerous middle ground where the input
/// resource left the wallet but the effect never appeared.
#[derive(Clone)]
pub struct Verification {
    pub effect_holds: AsyncPredicate,
    pub input_consumed: AsyncPredicate,
}

/// Speculative ledger delta tied to one write, applied on submission and
/// reverted on failure.
#[derive(Debug, Clone, Copy)]
pub struct LedgerAdjustment {
    pub key: BalanceKey,
    pub delta: i128,
}

#[derive(Clone)]
pub struct TransactionSpec {
    pub description: String,
    pub class: OperationClass,
    pub request: CallRequest,
    pub from: Address,
    pub preflight: Vec<PreflightCheck>,
    pub ledger_adjustments: Vec<LedgerAdjustment>,
    pub verification: Option<Verification>,
}

pub struct TransactionCoordinator {
    reader: Arc<dyn ChainReader>,
    ledger: Arc<OptimisticLedger>,
    timeouts: TimeoutConfig,
    metrics: Arc<ClientMetrics>,
    next_intent: AtomicU64,
}

impl TransactionCoordinator {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        ledger: Arc<OptimisticLedger>,
        timeouts: TimeoutConfig,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            reader,
            ledger,
            timeouts,
            metrics,
            next_intent: AtomicU64::new(1),
        }
    }

    pub fn ledger(&self) -> &Arc<OptimisticLedger> {
        &self.ledger
    }

    /// Start driving a write attempt. Phases arrive on the returned stream
    /// in lifecycle order, ending with exactly one terminal phase. Each
    /// submission gets a fresh intent id so retries are distinguishable.
    pub fn submit(&self, spec: TransactionSpec) -> (IntentId, mpsc::Receiver<TxPhase>) {
        let intent = IntentId(self.next_intent.fetch_add(1, Ordering::Relaxed));
        let (phases_tx, phases_rx) = mpsc::channel(32);
        let driver = TxDriver {
            reader: self.reader.clone(),
            ledger: self.ledger.clone(),
            timeouts: self.timeouts.clone(),
            metrics: self.metrics.clone(),
            intent,
            spec,
        };
        tokio::spawn(async move {
            driver.drive(phases_tx).await;
        });
        (intent, phases_rx)
    }

    /// Drive a spec to its terminal phase, mapping failure-class terminals
    /// to errors. Success-class terminals are returned as-is so callers can
    /// distinguish `Confirmed` from `ConfirmedLate`.
    pub async fn execute(&self, spec: TransactionSpec) -> ClientResult<TxPhase> {
        let (intent, mut phases) = self.submit(spec);
        let mut last = TxPhase::Idle;
        while let Some(phase) = phases.recv().await {
            last = phase;
            if last.is_terminal() {
                break;
            }
        }
        match &last {
            TxPhase::Confirmed { .. } | TxPhase::ConfirmedLate { .. } => Ok(last),
            TxPhase::Reverted { cause, reason } => Err(match cause {
                RevertCause::Preflight => ClientError::PreflightFailed(reason.clone()),
                RevertCause::Simulation => ClientError::SimulationReverted(reason.clone()),
                RevertCause::Submission => ClientError::SubmissionFailed(reason.clone()),
                RevertCause::OnChain => ClientError::Reverted(reason.clone()),
            }),
            TxPhase::GenuinelyFailed { reason, .. } => Err(ClientError::TimedOut(reason.clone())),
            TxPhase::CriticalInconsistent { detail, .. } => {
                Err(ClientError::CriticalInconsistent(detail.clone()))
            }
            _ => Err(ClientError::InternalError(format!(
                "{intent} phase stream ended before a terminal phase"
            ))),
        }
    }
}

struct TxDriver {
    reader: Arc<dyn ChainReader>,
    ledger: Arc<OptimisticLedger>,
    timeouts: TimeoutConfig,
    metrics: Arc<ClientMetrics>,
    intent: IntentId,
    spec: TransactionSpec,
}

impl TxDriver {
    async fn drive(&self, phases: mpsc::Sender<TxPhase>) {
        info!(
            "{}: starting {} ({})",
            self.intent,
            self.spec.description,
            self.spec.class.as_str()
        );
        let terminal = self.run(&phases).await;
        self.metrics
            .tx_terminal_phases
            .with_label_values(&[self.spec.class.as_str(), terminal.label()])
            .inc();
        info!(
            "{}: {} reached terminal phase {}",
            self.intent,
            self.spec.description,
            terminal.label()
        );
    }

    async fn run(&self, phases: &mpsc::Sender<TxPhase>) -> TxPhase {
        self.emit(phases, TxPhase::PreflightChecking).await;
        for check in &self.spec.preflight {
            if let Err(e) = check.run().await {
                self.metrics
                    .preflight_failures
                    .with_label_values(&[check.name])
                    .inc();
                warn!(
                    "{}: preflight check '{}' failed: {e}",
                    self.intent, check.name
                );
                return self
                    .finish(
                        phases,
                        TxPhase::Reverted {
                            cause: RevertCause::Preflight,
                            reason: e.to_string(),
                        },
                    )
                    .await;
            }
        }

        self.emit(phases, TxPhase::Simulating).await;
        if let Err(e) = self.reader.simulate(&self.spec.request, self.spec.from).await {
            // Nothing was submitted and no fees were spent.
            return self
                .finish(
                    phases,
                    TxPhase::Reverted {
                        cause: RevertCause::Simulation,
                        reason: revert_reason(e),
                    },
                )
                .await;
        }

        let tx_hash = match self.reader.send(&self.spec.request, self.spec.from).await {
            Ok(hash) => hash,
            Err(e) => {
                return self
                    .finish(
                        phases,
                        TxPhase::Reverted {
                            cause: RevertCause::Submission,
                            reason: e.to_string(),
                        },
                    )
                    .await;
            }
        };

        for adjustment in &self.spec.ledger_adjustments {
            self.ledger.adjust(adjustment.key, adjustment.delta).await;
        }
        self.emit(phases, TxPhase::Submitted { tx_hash }).await;
        self.emit(phases, TxPhase::Confirming { tx_hash }).await;

        let window = self.timeouts.confirm_timeout(self.spec.class);
        let terminal = match tokio::time::timeout(window, self.wait_for_receipt(tx_hash)).await {
            Ok(receipt) if receipt.status => self.verify_confirmed(tx_hash).await,
            Ok(_) => {
                let reason = self.recover_revert_reason().await;
                TxPhase::Reverted {
                    cause: RevertCause::OnChain,
                    reason,
                }
            }
            Err(_) => {
                self.emit(phases, TxPhase::TimedOut { tx_hash }).await;
                self.resolve_ambiguous_outcome(phases, tx_hash).await
            }
        };

        if terminal.is_failure() {
            self.undo_adjustments().await;
        }
        self.emit(phases, terminal.clone()).await;
        terminal
    }

    /// Pre-submission failure: no ledger adjustment exists yet, so the
    /// terminal is emitted directly.
    async fn finish(&self, phases: &mpsc::Sender<TxPhase>, terminal: TxPhase) -> TxPhase {
        self.emit(phases, terminal.clone()).await;
        terminal
    }

    async fn emit(&self, phases: &mpsc::Sender<TxPhase>, phase: TxPhase) {
        // A dropped receiver must not stall the lifecycle.
        let _ = phases.send(phase).await;
    }

    /// Polls until a receipt exists. Transient RPC failures are logged and
    /// retried; the confirmation timeout above bounds the total wait.
    async fn wait_for_receipt(&self, tx_hash: H256) -> TxReceipt {
        loop {
            match self.reader.get_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => warn!("{}: receipt poll failed, retrying: {e}", self.intent),
            }
            tokio::time::sleep(self.timeouts.poll_interval()).await;
        }
    }

    /// Receipt status alone is not proof of semantic success. When a
    /// verification predicate is attached, a confirmed receipt whose
    /// effect cannot be positively verified is a critical inconsistency,
    /// not a success.
    async fn verify_confirmed(&self, tx_hash: H256) -> TxPhase {
        let Some(verification) = &self.spec.verification else {
            return TxPhase::Confirmed { tx_hash };
        };
        let detail = match (verification.effect_holds)().await {
            Ok(true) => return TxPhase::Confirmed { tx_hash },
            Ok(false) => format!(
                "{}: receipt reports success but the expected effect is absent; manual review required",
                self.spec.description
            ),
            Err(e) => format!(
                "{}: receipt reports success but the effect could not be verified: {e}",
                self.spec.description
            ),
        };
        self.metrics.critical_inconsistencies.inc();
        error!("{}: {detail}", self.intent);
        TxPhase::CriticalInconsistent {
            tx_hash: Some(tx_hash),
            detail,
        }
    }

    /// The receipt reports on-chain failure but carries no reason; re-run
    /// the identical call as a dry-run to surface the revert string
    /// verbatim where chain state still reproduces it.
    async fn recover_revert_reason(&self) -> String {
        match self.reader.simulate(&self.spec.request, self.spec.from).await {
            Err(ClientError::RevertError(reason)) => reason,
            Err(e) => format!("reverted on-chain; reason unavailable ({e})"),
            Ok(()) => "reverted on-chain; re-simulation no longer fails".to_string(),
        }
    }

    /// The confirmation window expired without a receipt. The transaction
    /// may still have landed, so the outcome is decided from chain state,
    /// not from the missing receipt.
    async fn resolve_ambiguous_outcome(
        &self,
        phases: &mpsc::Sender<TxPhase>,
        tx_hash: H256,
    ) -> TxPhase {
        self.emit(phases, TxPhase::VerifyingOutcome { tx_hash }).await;
        // Give a late-landing transaction a chance to take effect before
        // reading chain state.
        tokio::time::sleep(self.timeouts.grace_delay()).await;

        let Some(verification) = &self.spec.verification else {
            return TxPhase::GenuinelyFailed {
                tx_hash,
                reason: "no receipt within the confirmation window".to_string(),
            };
        };

        match (verification.effect_holds)().await {
            Ok(true) => {
                info!(
                    "{}: effect verified after timeout, treating as confirmed",
                    self.intent
                );
                return TxPhase::ConfirmedLate { tx_hash };
            }
            Ok(false) => {}
            Err(e) => {
                warn!("{}: outcome verification unavailable: {e}", self.intent);
                return TxPhase::GenuinelyFailed {
                    tx_hash,
                    reason: format!("outcome verification unavailable: {e}"),
                };
            }
        }

        match (verification.input_consumed)().await {
            Ok(true) => {
                self.metrics.critical_inconsistencies.inc();
                let detail = format!(
                    "{}: input consumed but expected effect absent; manual review required",
                    self.spec.description
                );
                error!("{}: {detail}", self.intent);
                TxPhase::CriticalInconsistent {
                    tx_hash: Some(tx_hash),
                    detail,
                }
            }
            Ok(false) => TxPhase::GenuinelyFailed {
                tx_hash,
                reason: "no receipt and no observable effect; safe to retry".to_string(),
            },
            Err(e) => TxPhase::GenuinelyFailed {
                tx_hash,
                reason: format!("input-consumption check unavailable: {e}"),
            },
        }
    }

    async fn undo_adjustments(&self) {
        for adjustment in &self.spec.ledger_adjustments {
            self.ledger.adjust(adjustment.key, -adjustment.delta).await;
        }
    }
}

/// Simulation failures carry the revert reason in `RevertError`; other
/// error kinds are reported as-is.
fn revert_reason(e: ClientError) -> String {
    match e {
        ClientError::RevertError(reason) => reason,
        other => other.to_string(),
    }
}
