// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::types::ContractName;

/// Errors surfaced by the coordination layer.
///
/// Reason strings carried by the revert-class variants are propagated
/// verbatim from the chain; callers must not replace them with generic
/// messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    // No bootstrap address is configured for the requested chain. Fatal,
    // not retried.
    UnsupportedChain(u64),
    // A cascading read resolved a contract to the zero address. Fatal for
    // this resolution attempt, retryable on the next chain-state poll.
    InvalidChainState { contract: ContractName },
    // RPC failure or revert during cascading address resolution. Retryable.
    ResolutionError(String),
    // Generic provider failure outside of resolution.
    RpcError(String),
    // A read-only call reverted.
    RevertError(String),
    // A preflight check found the write pointless or dangerous to attempt.
    PreflightFailed(String),
    // The dry-run predicted failure; the write was never submitted.
    SimulationReverted(String),
    // The write could not be handed to the chain at all.
    SubmissionFailed(String),
    // On-chain failure after submission; gas was spent.
    Reverted(String),
    // Neither success nor failure could be established within the timeout
    // and post-hoc verification did not prove success. Safe to retry.
    TimedOut(String),
    // Input resource consumed but the expected effect never appeared.
    // Must be escalated, never treated as routine.
    CriticalInconsistent(String),
    // Uncategorized internal error.
    InternalError(String),
}

impl ClientError {
    /// Returns a short string identifying the error type for metrics labels.
    pub fn error_type(&self) -> &'static str {
        match self {
            ClientError::UnsupportedChain(_) => "unsupported_chain",
            ClientError::InvalidChainState { .. } => "invalid_chain_state",
            ClientError::ResolutionError(_) => "resolution_error",
            ClientError::RpcError(_) => "rpc_error",
            ClientError::RevertError(_) => "revert_error",
            ClientError::PreflightFailed(_) => "preflight_failed",
            ClientError::SimulationReverted(_) => "simulation_reverted",
            ClientError::SubmissionFailed(_) => "submission_failed",
            ClientError::Reverted(_) => "reverted",
            ClientError::TimedOut(_) => "timed_out",
            ClientError::CriticalInconsistent(_) => "critical_inconsistent",
            ClientError::InternalError(_) => "internal_error",
        }
    }

    /// Whether the condition may clear on a later attempt without manual
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::ResolutionError(_)
                | ClientError::RpcError(_)
                | ClientError::SubmissionFailed(_)
                | ClientError::TimedOut(_)
        )
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::UnsupportedChain(chain_id) => {
                write!(f, "no bootstrap address configured for chain id {chain_id}")
            }
            ClientError::InvalidChainState { contract } => {
                write!(f, "{contract} resolved to the zero address")
            }
            ClientError::ResolutionError(e) => write!(f, "address resolution failed: {e}"),
            ClientError::RpcError(e) => write!(f, "provider error: {e}"),
            ClientError::RevertError(e) => write!(f, "call reverted: {e}"),
            ClientError::PreflightFailed(e) => write!(f, "preflight check failed: {e}"),
            ClientError::SimulationReverted(e) => write!(f, "simulation reverted: {e}"),
            ClientError::SubmissionFailed(e) => write!(f, "transaction submission failed: {e}"),
            ClientError::Reverted(e) => write!(f, "transaction reverted: {e}"),
            ClientError::TimedOut(e) => write!(f, "transaction timed out: {e}"),
            ClientError::CriticalInconsistent(e) => {
                write!(f, "critical inconsistency, manual intervention required: {e}")
            }
            ClientError::InternalError(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for ClientError {}

pub type ClientResult<T> = Result<T, ClientError>;
