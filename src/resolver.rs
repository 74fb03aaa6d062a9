// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain-first address resolution.
//!
//! Only the Relics bootstrap address comes from static configuration.
//! MawSacrifice is read off Relics, Cosmetics off MawSacrifice, so the
//! contracts' own trust relationships are the source of truth. Resolution
//! fails closed: any RPC failure, revert, or zero address in the cascade
//! yields an error and no partial set ever escapes.
//!
//! Statically configured addresses for the downstream contracts are used
//! only to detect stale configuration. A mismatch is advisory, reported at
//! most once per logical name per [`ResolutionSession`].

use crate::chain_reader::ChainReader;
use crate::config::ClientConfig;
use crate::contracts::{MawSacrificeContract, RelicsContract};
use crate::error::{ClientError, ClientResult};
use crate::metrics::ClientMetrics;
use crate::types::{ContractAddressSet, ContractName, DriftReport};
use ethers::types::Address;
use std::sync::{Arc, Mutex};
use tap::TapFallible;
use tracing::{info, warn};

/// Scope for drift-report deduplication. A fresh session (new connection,
/// chain switch) reports drift anew.
#[derive(Default)]
pub struct ResolutionSession {
    reported: Mutex<Vec<DriftReport>>,
}

impl ResolutionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a report unless one for the same logical name already
    /// exists; returns whether this is the first for the name.
    fn record(&self, report: DriftReport) -> bool {
        let mut reported = self.reported.lock().unwrap();
        if reported.iter().any(|r| r.name == report.name) {
            return false;
        }
        reported.push(report);
        true
    }

    pub fn drift_reports(&self) -> Vec<DriftReport> {
        self.reported.lock().unwrap().clone()
    }
}

pub struct AddressResolver {
    reader: Arc<dyn ChainReader>,
    config: ClientConfig,
    metrics: Arc<ClientMetrics>,
}

impl AddressResolver {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        config: ClientConfig,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            reader,
            config,
            metrics,
        }
    }

    pub async fn resolve(
        &self,
        chain_id: u64,
        session: &ResolutionSession,
    ) -> ClientResult<ContractAddressSet> {
        self.resolve_inner(chain_id, session)
            .await
            .tap_err(|e| {
                self.metrics
                    .resolutions_err
                    .with_label_values(&[e.error_type()])
                    .inc();
                warn!("address resolution for chain {chain_id} failed: {e}");
            })
    }

    async fn resolve_inner(
        &self,
        chain_id: u64,
        session: &ResolutionSession,
    ) -> ClientResult<ContractAddressSet> {
        let settings = self
            .config
            .chain(chain_id)
            .ok_or(ClientError::UnsupportedChain(chain_id))?;

        let relics = RelicsContract::new(self.reader.clone(), settings.relics_address);
        let maw_address = relics.maw_sacrifice().await.map_err(into_resolution)?;
        if maw_address.is_zero() {
            return Err(ClientError::InvalidChainState {
                contract: ContractName::MawSacrifice,
            });
        }

        let maw = MawSacrificeContract::new(self.reader.clone(), maw_address);
        let cosmetics_address = maw.cosmetics().await.map_err(into_resolution)?;
        if cosmetics_address.is_zero() {
            return Err(ClientError::InvalidChainState {
                contract: ContractName::Cosmetics,
            });
        }

        self.check_drift(
            session,
            chain_id,
            ContractName::MawSacrifice,
            settings.static_maw_sacrifice_address,
            maw_address,
        );
        self.check_drift(
            session,
            chain_id,
            ContractName::Cosmetics,
            settings.static_cosmetics_address,
            cosmetics_address,
        );

        self.metrics
            .resolutions_ok
            .with_label_values(&[&chain_id.to_string()])
            .inc();
        info!(
            "resolved contract set for chain {chain_id}: relics={:?}, maw={:?}, cosmetics={:?}",
            settings.relics_address, maw_address, cosmetics_address
        );
        Ok(ContractAddressSet::new(
            chain_id,
            settings.relics_address,
            maw_address,
            cosmetics_address,
        ))
    }

    fn check_drift(
        &self,
        session: &ResolutionSession,
        chain_id: u64,
        name: ContractName,
        static_address: Option<Address>,
        resolved_address: Address,
    ) {
        let Some(static_address) = static_address else {
            return;
        };
        if static_address == resolved_address {
            return;
        }
        let report = DriftReport {
            chain_id,
            name,
            static_address,
            resolved_address,
        };
        if session.record(report.clone()) {
            warn!("{report}");
            self.metrics
                .drift_reports
                .with_label_values(&[name.as_str()])
                .inc();
        }
    }
}

/// Failures inside the cascade are resolution errors regardless of the
/// underlying transport condition.
fn into_resolution(e: ClientError) -> ClientError {
    match e {
        ClientError::RpcError(m) | ClientError::RevertError(m) => ClientError::ResolutionError(m),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainSettings, TimeoutConfig};
    use crate::contracts::functions;
    use crate::mock_chain_reader::MockChainReader;
    use ethers::abi::Token;

    const CHAIN_ID: u64 = 11155111;

    fn relics_addr() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn maw_addr() -> Address {
        Address::repeat_byte(0xbb)
    }

    fn cosmetics_addr() -> Address {
        Address::repeat_byte(0xcc)
    }

    fn config(static_maw: Option<Address>, static_cosmetics: Option<Address>) -> ClientConfig {
        ClientConfig {
            chains: vec![ChainSettings {
                chain_id: CHAIN_ID,
                relics_address: relics_addr(),
                static_maw_sacrifice_address: static_maw,
                static_cosmetics_address: static_cosmetics,
            }],
            timeouts: TimeoutConfig::default(),
            approval_cache_ttl_secs: 30,
        }
    }

    fn script_happy_cascade(mock: &MockChainReader) {
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

    fn resolver(mock: Arc<MockChainReader>, config: ClientConfig) -> AddressResolver {
        AddressResolver::new(mock, config, ClientMetrics::new_for_testing())
    }

    #[tokio::test]
    async fn test_cascading_resolution_happy_path() {
        let mock = Arc::new(MockChainReader::new());
        script_happy_cascade(&mock);
        let resolver = resolver(mock, config(None, None));
        let session = ResolutionSession::new();

        let set = resolver.resolve(CHAIN_ID, &session).await.unwrap();
        assert_eq!(set.chain_id(), CHAIN_ID);
        assert_eq!(set.relics(), relics_addr());
        assert_eq!(set.maw_sacrifice(), maw_addr());
        assert_eq!(set.cosmetics(), cosmetics_addr());
        assert!(session.drift_reports().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_chain_is_unsupported() {
        let mock = Arc::new(MockChainReader::new());
        let resolver = resolver(mock, config(None, None));
        let err = resolver
            .resolve(31337, &ResolutionSession::new())
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::UnsupportedChain(31337));
    }

    #[tokio::test]
    async fn test_zero_maw_address_fails_closed() {
        let mock = Arc::new(MockChainReader::new());
        mock.set_call_response(
            relics_addr(),
            functions::MAW_SACRIFICE,
            vec![Token::Address(Address::zero())],
        );
        let resolver = resolver(mock, config(None, None));
        let err = resolver
            .resolve(CHAIN_ID, &ResolutionSession::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::InvalidChainState {
                contract: ContractName::MawSacrifice
            }
        );
    }

    #[tokio::test]
    async fn test_zero_cosmetics_address_fails_closed() {
        let mock = Arc::new(MockChainReader::new());
        mock.set_call_response(
            relics_addr(),
            functions::MAW_SACRIFICE,
            vec![Token::Address(maw_addr())],
        );
        mock.set_call_response(
            maw_addr(),
            functions::COSMETICS,
            vec![Token::Address(Address::zero())],
        );
        let resolver = resolver(mock, config(None, None));
        let err = resolver
            .resolve(CHAIN_ID, &ResolutionSession::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::InvalidChainState {
                contract: ContractName::Cosmetics
            }
        );
    }

    #[tokio::test]
    async fn test_rpc_failure_mid_cascade_is_a_resolution_error() {
        let mock = Arc::new(MockChainReader::new());
        mock.set_call_response(
            relics_addr(),
            functions::MAW_SACRIFICE,
            vec![Token::Address(maw_addr())],
        );
        mock.set_call_error(
            maw_addr(),
            functions::COSMETICS,
            ClientError::RpcError("connection refused".to_string()),
        );
        let resolver = resolver(mock, config(None, None));
        let err = resolver
            .resolve(CHAIN_ID, &ResolutionSession::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "resolution_error");
        assert!(err.is_retryable());
        assert!(format!("{err}").contains("connection refused"));
    }

    /// Static config carries a stale MawSacrifice address; the chain wins
    /// and the mismatch is reported exactly once for the session.
    #[tokio::test]
    async fn test_drift_detected_and_chain_value_wins() {
        let stale = Address::repeat_byte(0xdd);
        let mock = Arc::new(MockChainReader::new());
        script_happy_cascade(&mock);
        let resolver = resolver(mock, config(Some(stale), Some(cosmetics_addr())));
        let session = ResolutionSession::new();

        let set = resolver.resolve(CHAIN_ID, &session).await.unwrap();
        // Chain-reported address is authoritative.
        assert_eq!(set.maw_sacrifice(), maw_addr());

        let reports = session.drift_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, ContractName::MawSacrifice);
        assert_eq!(reports[0].static_address, stale);
        assert_eq!(reports[0].resolved_address, maw_addr());
    }

    #[tokio::test]
    async fn test_drift_reported_once_per_session_then_again_on_fresh_session() {
        let stale = Address::repeat_byte(0xdd);
        let mock = Arc::new(MockChainReader::new());
        script_happy_cascade(&mock);
        let resolver = resolver(mock, config(Some(stale), None));

        let session = ResolutionSession::new();
        resolver.resolve(CHAIN_ID, &session).await.unwrap();
        resolver.resolve(CHAIN_ID, &session).await.unwrap();
        assert_eq!(session.drift_reports().len(), 1);

        // A chain switch or reconnect starts a new session and warns anew.
        let fresh = ResolutionSession::new();
        resolver.resolve(CHAIN_ID, &fresh).await.unwrap();
        assert_eq!(fresh.drift_reports().len(), 1);
    }
}
