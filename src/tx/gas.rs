//! Gas limit and fee estimation with safety buffers

use crate::chain::{ChainProvider, GasPrice};
use crate::config::{GasConfig, GasPriceStrategy};
use crate::error::SubmitterResult;

use ethers::providers::JsonRpcClient;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::U256;
use tracing::debug;

/// Gas estimator for transactions
pub struct GasEstimator {
    strategy: GasPriceStrategy,
    /// Buffer percentage for gas limit (e.g., 20 = 20% buffer)
    gas_limit_buffer_percent: u64,
    /// Buffer percentage for gas price
    gas_price_buffer_percent: u64,
    /// Skips estimation when set
    fixed_limit: Option<u64>,
}

impl GasEstimator {
    pub fn new(config: &GasConfig) -> Self {
        Self {
            strategy: config.strategy,
            gas_limit_buffer_percent: config.limit_buffer_percent,
            gas_price_buffer_percent: config.price_buffer_percent,
            fixed_limit: config.limit,
        }
    }

    /// Gas limit for a transaction, from config or `eth_estimateGas` plus buffer
    pub async fn gas_limit<P: JsonRpcClient>(
        &self,
        provider: &ChainProvider<P>,
        tx: &TypedTransaction,
    ) -> SubmitterResult<U256> {
        if let Some(limit) = self.fixed_limit {
            return Ok(U256::from(limit));
        }

        let estimate = provider.estimate_gas(tx).await?;
        let limit = self.buffer_limit(estimate);
        debug!("Gas estimate {} -> limit {}", estimate, limit);
        Ok(limit)
    }

    /// Get buffered gas price for the configured strategy
    pub async fn gas_price<P: JsonRpcClient>(
        &self,
        provider: &ChainProvider<P>,
    ) -> SubmitterResult<GasPrice> {
        let gas_price = provider.get_gas_price(self.strategy).await?;
        let buffered = self.buffer_price(&gas_price);

        debug!("Gas price: {:?}", buffered);
        Ok(buffered)
    }

    fn buffer_limit(&self, estimate: U256) -> U256 {
        estimate + estimate * self.gas_limit_buffer_percent / 100
    }

    fn buffer_price(&self, gas_price: &GasPrice) -> GasPrice {
        match gas_price {
            GasPrice::Legacy(price) => {
                let buffer = *price * self.gas_price_buffer_percent / 100;
                GasPrice::Legacy(*price + buffer)
            }
            GasPrice::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let fee_buffer = *max_fee_per_gas * self.gas_price_buffer_percent / 100;
                let priority_buffer =
                    *max_priority_fee_per_gas * self.gas_price_buffer_percent / 100;
                GasPrice::Eip1559 {
                    max_fee_per_gas: *max_fee_per_gas + fee_buffer,
                    max_priority_fee_per_gas: *max_priority_fee_per_gas + priority_buffer,
                }
            }
        }
    }

    /// Worst-case cost in wei
    pub fn max_cost(gas_limit: U256, gas_price: &GasPrice) -> U256 {
        match gas_price {
            GasPrice::Legacy(price) => gas_limit * *price,
            GasPrice::Eip1559 {
                max_fee_per_gas, ..
            } => gas_limit * *max_fee_per_gas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::provider::tests::mocked;
    use ethers::types::TransactionRequest;

    #[tokio::test]
    async fn test_buffered_legacy_price_and_limit() {
        let (provider, mock) = mocked();
        let estimator = GasEstimator::new(&GasConfig::default());

        mock.push(U256::from(100_000)).unwrap(); // eth_estimateGas
        mock.push(U256::from(1_000)).unwrap(); // eth_gasPrice

        let price = estimator.gas_price(&provider).await.unwrap();
        assert_eq!(price, GasPrice::Legacy(U256::from(1_100)));

        let limit = estimator
            .gas_limit(&provider, &TypedTransaction::Legacy(TransactionRequest::new()))
            .await
            .unwrap();
        assert_eq!(limit, U256::from(120_000));
        assert_eq!(
            GasEstimator::max_cost(limit, &price),
            U256::from(132_000_000u64)
        );
    }

    #[tokio::test]
    async fn test_fixed_limit_skips_estimation() {
        // No canned responses: any RPC call would fail
        let (provider, _mock) = mocked();
        let estimator = GasEstimator::new(&GasConfig {
            limit: Some(300_000),
            ..GasConfig::default()
        });

        let limit = estimator
            .gas_limit(&provider, &TypedTransaction::Legacy(TransactionRequest::new()))
            .await
            .unwrap();
        assert_eq!(limit, U256::from(300_000));
    }

    #[test]
    fn test_eip1559_buffer() {
        let estimator = GasEstimator::new(&GasConfig::default());
        let buffered = estimator.buffer_price(&GasPrice::Eip1559 {
            max_fee_per_gas: U256::from(100),
            max_priority_fee_per_gas: U256::from(20),
        });
        assert_eq!(
            buffered,
            GasPrice::Eip1559 {
                max_fee_per_gas: U256::from(110),
                max_priority_fee_per_gas: U256::from(22),
            }
        );
    }
}
