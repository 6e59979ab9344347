//! Transaction requests built from configured contract calls

use crate::chain::GasPrice;
use crate::config::TransactionConfig;
use crate::error::{SubmitterError, SubmitterResult};

use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;

/// An outgoing contract call. The payload is opaque and sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRequest {
    pub name: String,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl TxRequest {
    /// Build the unsigned transaction with fee fields for the given gas price.
    /// The gas limit is filled in later by the sender.
    pub fn to_typed(
        &self,
        from: Address,
        nonce: u64,
        chain_id: u64,
        gas_price: &GasPrice,
    ) -> TypedTransaction {
        match gas_price {
            GasPrice::Legacy(price) => TransactionRequest::new()
                .from(from)
                .to(self.to)
                .value(self.value)
                .data(self.data.clone())
                .nonce(nonce)
                .chain_id(chain_id)
                .gas_price(*price)
                .into(),
            GasPrice::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Eip1559TransactionRequest::new()
                .from(from)
                .to(self.to)
                .value(self.value)
                .data(self.data.clone())
                .nonce(nonce)
                .chain_id(chain_id)
                .max_fee_per_gas(*max_fee_per_gas)
                .max_priority_fee_per_gas(*max_priority_fee_per_gas)
                .into(),
        }
    }
}

impl TryFrom<&TransactionConfig> for TxRequest {
    type Error = SubmitterError;

    fn try_from(config: &TransactionConfig) -> SubmitterResult<Self> {
        let to: Address = config.to.trim().parse().map_err(|e| {
            SubmitterError::Config(format!("Invalid recipient address {}: {}", config.to, e))
        })?;

        let value = U256::from_dec_str(config.value.trim()).map_err(|e| {
            SubmitterError::Config(format!("Invalid value {}: {}", config.value, e))
        })?;

        let data = decode_payload(&config.data)?;

        Ok(Self {
            name: config.name.clone(),
            to,
            value,
            data,
        })
    }
}

fn decode_payload(raw: &str) -> SubmitterResult<Bytes> {
    let raw = raw.trim();
    let stripped = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    hex::decode(stripped)
        .map(Bytes::from)
        .map_err(|e| SubmitterError::Config(format!("Payload is not valid hex: {}", e)))
}
