//! Nonce management for sequential submission from one account
//!
//! Handles:
//! - Local nonce tracking so back-to-back submissions never collide
//! - Releasing a nonce whose submission failed
//! - Resyncing with the node after a "nonce too low" rejection

use crate::chain::ChainProvider;
use crate::error::SubmitterResult;

use ethers::providers::JsonRpcClient;
use ethers::types::Address;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct NonceState {
    /// Next nonce to hand out
    current: u64,
    /// Submitted but unconfirmed: nonce -> tx hash
    pending: BTreeMap<u64, String>,
}

/// Hands out nonces for a single wallet
pub struct NonceManager {
    wallet_address: Address,
    state: Mutex<NonceState>,
}

impl NonceManager {
    /// Create a nonce manager starting at `start`
    pub fn new(wallet_address: Address, start: u64) -> Self {
        Self {
            wallet_address,
            state: Mutex::new(NonceState {
                current: start,
                pending: BTreeMap::new(),
            }),
        }
    }

    /// Create a nonce manager starting at the node's pending transaction count
    pub async fn from_chain<P: JsonRpcClient>(
        wallet_address: Address,
        provider: &ChainProvider<P>,
    ) -> SubmitterResult<Self> {
        let start = provider.get_transaction_count(wallet_address).await?;
        debug!("Initialized nonce for {:?}: {}", wallet_address, start);
        Ok(Self::new(wallet_address, start))
    }

    /// Get the next nonce
    pub async fn next_nonce(&self) -> u64 {
        let mut state = self.state.lock().await;
        let nonce = state.current;
        state.current += 1;

        debug!("Allocated nonce {}", nonce);
        nonce
    }

    /// Mark a nonce as pending with transaction hash
    pub async fn mark_pending(&self, nonce: u64, tx_hash: &str) {
        self.state
            .lock()
            .await
            .pending
            .insert(nonce, tx_hash.to_string());
    }

    /// Confirm a nonce (transaction mined)
    pub async fn confirm(&self, nonce: u64) {
        self.state.lock().await.pending.remove(&nonce);
    }

    /// Release a nonce (submission failed, can be reused)
    pub async fn release(&self, nonce: u64) {
        let mut state = self.state.lock().await;
        state.pending.remove(&nonce);

        // Only the most recent allocation can be handed back
        if nonce + 1 == state.current {
            state.current = nonce;
            debug!("Released nonce {}", nonce);
        } else {
            warn!(
                "Cannot release nonce {} (next is {}), leaving a gap",
                nonce, state.current
            );
        }
    }

    /// Sync with on-chain state
    pub async fn sync<P: JsonRpcClient>(&self, provider: &ChainProvider<P>) -> SubmitterResult<()> {
        let on_chain = provider.get_transaction_count(self.wallet_address).await?;
        let mut state = self.state.lock().await;

        // Drop pending entries the chain has already consumed
        state.pending.retain(|nonce, _| *nonce >= on_chain);

        if state.current < on_chain {
            warn!(
                "Local nonce {} behind chain {}, skipping ahead",
                state.current, on_chain
            );
            state.current = on_chain;
        }

        Ok(())
    }

    /// Next nonce that would be handed out
    pub async fn peek(&self) -> u64 {
        self.state.lock().await.current
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}
