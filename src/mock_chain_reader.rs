// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scripted [`ChainReader`] for tests.
//!
//! Call responses are keyed by `(target address, function signature)`.
//! One-shot responses queued with `push_call_response` take precedence over
//! persistent ones and are consumed in FIFO order, which lets a test script
//! two successive reads of the same function differently. Receipts come
//! from a single FIFO consumed one entry per poll; an empty queue means
//! "still pending", which is how timeout paths are driven.

use crate::chain_reader::{CallRequest, ChainReader};
use crate::error::{ClientError, ClientResult};
use crate::events::ChainEvent;
use crate::types::TxReceipt;
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

type CallKey = (Address, String);

pub struct MockChainReader {
    call_responses: Mutex<HashMap<CallKey, ClientResult<Vec<Token>>>>,
    one_shot_calls: Mutex<HashMap<CallKey, VecDeque<ClientResult<Vec<Token>>>>>,
    simulate_outcomes: Mutex<HashMap<CallKey, ClientResult<()>>>,
    send_errors: Mutex<HashMap<CallKey, ClientError>>,
    sent: Mutex<Vec<CallRequest>>,
    next_nonce: AtomicU64,
    receipts: Mutex<VecDeque<Option<TxReceipt>>>,
    events_tx: broadcast::Sender<ChainEvent>,
}

impl MockChainReader {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            call_responses: Mutex::new(HashMap::new()),
            one_shot_calls: Mutex::new(HashMap::new()),
            simulate_outcomes: Mutex::new(HashMap::new()),
            send_errors: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            next_nonce: AtomicU64::new(1),
            receipts: Mutex::new(VecDeque::new()),
            events_tx,
        }
    }

    pub fn set_call_response(&self, to: Address, function: &str, tokens: Vec<Token>) {
        self.call_responses
            .lock()
            .unwrap()
            .insert((to, function.to_string()), Ok(tokens));
    }

    pub fn set_call_error(&self, to: Address, function: &str, error: ClientError) {
        self.call_responses
            .lock()
            .unwrap()
            .insert((to, function.to_string()), Err(error));
    }

    /// Queue a response consumed by exactly one call, ahead of any
    /// persistent response for the same key.
    pub fn push_call_response(&self, to: Address, function: &str, result: ClientResult<Vec<Token>>) {
        self.one_shot_calls
            .lock()
            .unwrap()
            .entry((to, function.to_string()))
            .or_default()
            .push_back(result);
    }

    pub fn set_simulate_outcome(&self, to: Address, function: &str, outcome: ClientResult<()>) {
        self.simulate_outcomes
            .lock()
            .unwrap()
            .insert((to, function.to_string()), outcome);
    }

    pub fn set_send_error(&self, to: Address, function: &str, error: ClientError) {
        self.send_errors
            .lock()
            .unwrap()
            .insert((to, function.to_string()), error);
    }

    /// Queue one receipt poll outcome; `None` means "still pending" for
    /// that poll. The transaction hash is patched to the polled hash.
    pub fn push_receipt(&self, receipt: Option<TxReceipt>) {
        self.receipts.lock().unwrap().push_back(receipt);
    }

    pub fn sent_requests(&self) -> Vec<CallRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn emit_event(&self, event: ChainEvent) {
        // No receiver yet is fine; the event is simply dropped.
        let _ = self.events_tx.send(event);
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn call(&self, req: &CallRequest) -> ClientResult<Vec<Token>> {
        let key = (req.to, req.function.clone());
        if let Some(result) = self
            .one_shot_calls
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
        {
            return result;
        }
        match self.call_responses.lock().unwrap().get(&key) {
            Some(result) => result.clone(),
            None => Err(ClientError::RpcError(format!(
                "no scripted response for {} at {:?}",
                req.function, req.to
            ))),
        }
    }

    async fn simulate(&self, req: &CallRequest, _from: Address) -> ClientResult<()> {
        let key = (req.to, req.function.clone());
        match self.simulate_outcomes.lock().unwrap().get(&key) {
            Some(outcome) => outcome.clone(),
            None => Ok(()),
        }
    }

    async fn send(&self, req: &CallRequest, _from: Address) -> ClientResult<H256> {
        let key = (req.to, req.function.clone());
        if let Some(error) = self.send_errors.lock().unwrap().get(&key) {
            return Err(error.clone());
        }
        self.sent.lock().unwrap().push(req.clone());
        let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        Ok(H256::from_low_u64_be(nonce))
    }

    async fn get_receipt(&self, tx_hash: H256) -> ClientResult<Option<TxReceipt>> {
        match self.receipts.lock().unwrap().pop_front() {
            Some(Some(mut receipt)) => {
                receipt.tx_hash = tx_hash;
                Ok(Some(receipt))
            }
            Some(None) | None => Ok(None),
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ChainEvent> {
        self.events_tx.subscribe()
    }
}
