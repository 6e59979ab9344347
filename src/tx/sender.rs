//! Transaction sender: fill, sign locally, broadcast once

use super::gas::GasEstimator;
use super::nonce::NonceManager;
use super::{TxHandle, TxRequest};
use crate::chain::ChainProvider;
use crate::config::GasConfig;
use crate::error::{SubmitterError, SubmitterResult};
use crate::wallet::Identity;

use ethers::providers::{Http, JsonRpcClient};
use ethers::signers::Signer;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256};
use ethers::utils::keccak256;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a successful broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub handle: TxHandle,
    pub nonce: u64,
}

/// Signs and submits transactions for one identity on one endpoint
pub struct TransactionSender<P = Http> {
    /// Chain provider
    provider: Arc<ChainProvider<P>>,
    /// Signing identity, bound to the chain ID
    identity: Identity,
    /// Nonce manager
    nonce_manager: NonceManager,
    /// Gas estimator
    gas_estimator: GasEstimator,
}

impl<P: JsonRpcClient> TransactionSender<P> {
    /// Create a new transaction sender
    pub fn new(
        provider: Arc<ChainProvider<P>>,
        identity: Identity,
        nonce_manager: NonceManager,
        gas: &GasConfig,
    ) -> Self {
        info!(
            "Transaction sender initialized with wallet: {:?}",
            identity.address()
        );

        Self {
            provider,
            identity,
            nonce_manager,
            gas_estimator: GasEstimator::new(gas),
        }
    }

    /// Submit a request. Never retried: a rejected transaction surfaces as an error.
    pub async fn submit(&self, request: &TxRequest) -> SubmitterResult<Submission> {
        let nonce = self.nonce_manager.next_nonce().await;

        match self.sign_and_send(request, nonce).await {
            Ok(handle) => {
                self.nonce_manager
                    .mark_pending(nonce, &handle.to_string())
                    .await;
                Ok(Submission { handle, nonce })
            }
            Err(SubmitterError::Timeout { operation }) => {
                // The node may have accepted it; keep the nonce consumed
                warn!(
                    "Timed out submitting {} with nonce {}, not reusing the nonce",
                    request.name, nonce
                );
                Err(SubmitterError::Timeout { operation })
            }
            Err(e) => {
                error!("Failed to submit {}: {}", request.name, e);
                self.nonce_manager.release(nonce).await;

                if matches!(e, SubmitterError::NonceTooLow { .. }) {
                    if let Err(sync_err) = self.nonce_manager.sync(self.provider.as_ref()).await {
                        warn!("Nonce sync failed: {}", sync_err);
                    }
                }

                Err(e)
            }
        }
    }

    async fn sign_and_send(&self, request: &TxRequest, nonce: u64) -> SubmitterResult<TxHandle> {
        let gas_price = self.gas_estimator.gas_price(self.provider.as_ref()).await?;

        let mut tx = request.to_typed(
            self.identity.address(),
            nonce,
            self.identity.chain_id(),
            &gas_price,
        );

        let gas_limit = self.gas_estimator.gas_limit(self.provider.as_ref(), &tx).await?;
        tx.set_gas(gas_limit);
        debug!(
            "Prepared {} with nonce {}, max cost {} wei",
            request.name,
            nonce,
            GasEstimator::max_cost(gas_limit, &gas_price)
        );

        let raw = self.sign(&tx).await?;
        let local_hash = H256::from(keccak256(&raw));

        let tx_hash = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| match e {
                SubmitterError::Rpc { message, .. } => SubmitterError::from_rejection(
                    &format!("{:?}", self.identity.address()),
                    nonce,
                    message,
                ),
                other => other,
            })?;

        if tx_hash != local_hash {
            warn!(
                "Node reported hash {:?} but signed transaction hashes to {:?}",
                tx_hash, local_hash
            );
        }

        info!(
            "Transaction {} sent: {:?} (nonce {}, gas limit {})",
            request.name, tx_hash, nonce, gas_limit
        );

        Ok(TxHandle::new(tx_hash))
    }

    /// Sign a filled transaction, returning its RLP encoding
    pub async fn sign(&self, tx: &TypedTransaction) -> SubmitterResult<Bytes> {
        let signature = self
            .identity
            .wallet()
            .sign_transaction(tx)
            .await
            .map_err(|e| SubmitterError::Wallet(format!("Failed to sign transaction: {}", e)))?;

        Ok(tx.rlp_signed(&signature))
    }

    /// Record that a submitted transaction has a receipt
    pub async fn mark_confirmed(&self, submission: &Submission) {
        self.nonce_manager.confirm(submission.nonce).await;
    }

    /// Get wallet balance
    pub async fn get_balance(&self) -> SubmitterResult<ethers::types::U256> {
        self.provider.get_balance(self.identity.address()).await
    }

    /// Get wallet address
    pub fn wallet_address(&self) -> Address {
        self.identity.address()
    }

    pub fn nonce_manager(&self) -> &NonceManager {
        &self.nonce_manager
    }
}
