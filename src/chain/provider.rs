//! JSON-RPC chain provider with per-request timeouts

use crate::config::{GasConfig, GasPriceStrategy, RpcConfig};
use crate::error::{SubmitterError, SubmitterResult};

use ethers::prelude::*;
use ethers::providers::{Http, JsonRpcClient, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Wrapper around a single JSON-RPC endpoint
#[derive(Debug)]
pub struct ChainProvider<P = Http> {
    /// Underlying ethers provider
    provider: Provider<P>,
    /// Endpoint label for logs
    url: String,
    /// Upper bound for every RPC call
    request_timeout: Duration,
    /// Fee cap for EIP-1559 estimation
    max_gas_price_gwei: u64,
}

impl ChainProvider<Http> {
    /// Create a provider for an HTTP endpoint
    pub fn connect(rpc: &RpcConfig, gas: &GasConfig) -> SubmitterResult<Self> {
        let provider = Provider::<Http>::try_from(rpc.url.as_str()).map_err(|e| {
            SubmitterError::Config(format!("Invalid RPC URL {}: {}", rpc.url, e))
        })?;

        debug!("Using HTTP provider {}", rpc.url);

        Ok(Self::with_provider(
            provider,
            rpc.url.clone(),
            rpc.request_timeout(),
            gas.max_gas_price_gwei,
        ))
    }
}

impl<P: JsonRpcClient> ChainProvider<P> {
    /// Wrap an existing ethers provider
    pub fn with_provider(
        provider: Provider<P>,
        url: String,
        request_timeout: Duration,
        max_gas_price_gwei: u64,
    ) -> Self {
        Self {
            provider,
            url,
            request_timeout,
            max_gas_price_gwei,
        }
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run one RPC call bounded by the request timeout
    async fn call<T, F>(&self, method: &'static str, fut: F) -> SubmitterResult<T>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SubmitterError::Rpc {
                method,
                message: e.to_string(),
            }),
            Err(_) => Err(SubmitterError::Timeout {
                operation: method.to_string(),
            }),
        }
    }

    /// Get current block number
    pub async fn get_block_number(&self) -> SubmitterResult<u64> {
        let block = self
            .call("eth_blockNumber", self.provider.get_block_number())
            .await?;
        Ok(block.as_u64())
    }

    /// Get chain ID reported by the node
    pub async fn get_chain_id(&self) -> SubmitterResult<u64> {
        let chain_id = self.call("eth_chainId", self.provider.get_chainid()).await?;
        Ok(chain_id.as_u64())
    }

    /// Get balance of an address at the latest block
    pub async fn get_balance(&self, address: Address) -> SubmitterResult<U256> {
        self.call("eth_getBalance", self.provider.get_balance(address, None))
            .await
    }

    /// Get the next nonce for an address, counting pool transactions
    pub async fn get_transaction_count(&self, address: Address) -> SubmitterResult<u64> {
        let count = self
            .call(
                "eth_getTransactionCount",
                self.provider
                    .get_transaction_count(address, Some(BlockNumber::Pending.into())),
            )
            .await?;
        Ok(count.as_u64())
    }

    /// Estimate gas for a transaction
    pub async fn estimate_gas(&self, tx: &TypedTransaction) -> SubmitterResult<U256> {
        self.call("eth_estimateGas", self.provider.estimate_gas(tx, None))
            .await
    }

    /// Get current gas price based on the configured strategy
    pub async fn get_gas_price(&self, strategy: GasPriceStrategy) -> SubmitterResult<GasPrice> {
        match strategy {
            GasPriceStrategy::Legacy => {
                let price = self.call("eth_gasPrice", self.provider.get_gas_price()).await?;
                Ok(GasPrice::Legacy(price))
            }
            GasPriceStrategy::Eip1559 => {
                let (max_fee, priority_fee) = self.estimate_eip1559_fees().await?;
                Ok(GasPrice::Eip1559 {
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: priority_fee,
                })
            }
        }
    }

    /// Estimate EIP-1559 fees from the latest block
    async fn estimate_eip1559_fees(&self) -> SubmitterResult<(U256, U256)> {
        let block = self
            .call(
                "eth_getBlockByNumber",
                self.provider.get_block(BlockNumber::Latest),
            )
            .await?
            .ok_or_else(|| SubmitterError::Transaction("No latest block".to_string()))?;

        let base_fee = block.base_fee_per_gas.ok_or_else(|| {
            SubmitterError::Transaction("No base fee in latest block".to_string())
        })?;

        let priority_fee = U256::from(2_000_000_000u64); // 2 gwei

        // Max fee = 2 * base_fee + priority_fee
        let max_fee = base_fee * 2 + priority_fee;

        let max_wei = U256::from(self.max_gas_price_gwei) * U256::from(1_000_000_000u64);
        let max_fee = std::cmp::min(max_fee, max_wei);
        let priority_fee = std::cmp::min(priority_fee, max_fee);

        Ok((max_fee, priority_fee))
    }

    /// Broadcast a signed transaction, returning the hash the node reports
    pub async fn send_raw_transaction(&self, raw: Bytes) -> SubmitterResult<H256> {
        let pending = self
            .call(
                "eth_sendRawTransaction",
                self.provider.send_raw_transaction(raw),
            )
            .await?;
        Ok(pending.tx_hash())
    }

    /// Get transaction receipt; `None` while the transaction is not mined
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> SubmitterResult<Option<TransactionReceipt>> {
        self.call(
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(tx_hash),
        )
        .await
    }
}

/// Gas price types
#[derive(Debug, Clone, PartialEq)]
pub enum GasPrice {
    Legacy(U256),
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}
