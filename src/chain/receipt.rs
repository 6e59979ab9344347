//! Receipt lookup after submission
//!
//! Two strategies:
//! - Fixed: wait once, look up once
//! - Backoff: poll with growing delays until the receipt shows up or the
//!   deadline passes
//!
//! Both report a missing receipt as `None`. Dropping the returned future
//! cancels the wait.

use crate::chain::ChainProvider;
use crate::config::{ConfirmationConfig, ConfirmationMode};
use crate::error::SubmitterResult;
use crate::tx::TxHandle;

use ethers::providers::{Http, JsonRpcClient};
use ethers::types::{TransactionReceipt, U64};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Exponential polling schedule with a hard deadline
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    pub timeout: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &ConfirmationConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Delay following `current`, capped at `max_delay`
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(self.multiplier).min(self.max_delay)
    }
}

/// Outcome of a receipt check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
    /// No receipt yet
    Pending,
}

impl ReceiptStatus {
    pub fn of(receipt: Option<&TransactionReceipt>) -> Self {
        match receipt {
            None => ReceiptStatus::Pending,
            Some(r) if r.status == Some(U64::from(1)) => ReceiptStatus::Success,
            Some(_) => ReceiptStatus::Reverted,
        }
    }
}

/// Waits for transaction receipts on one endpoint
pub struct ReceiptWaiter<P = Http> {
    provider: Arc<ChainProvider<P>>,
    mode: ConfirmationMode,
    policy: BackoffPolicy,
}

impl<P: JsonRpcClient> ReceiptWaiter<P> {
    pub fn new(provider: Arc<ChainProvider<P>>, config: &ConfirmationConfig) -> Self {
        Self {
            provider,
            mode: config.mode,
            policy: BackoffPolicy::from_config(config),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Wait for a receipt using the configured strategy
    pub async fn await_receipt(
        &self,
        handle: &TxHandle,
    ) -> SubmitterResult<Option<TransactionReceipt>> {
        match self.mode {
            ConfirmationMode::Fixed => self.check_after(handle, self.policy.initial_delay).await,
            ConfirmationMode::Backoff => self.poll(handle).await,
        }
    }

    /// Wait `delay`, then look the receipt up once
    pub async fn check_after(
        &self,
        handle: &TxHandle,
        delay: Duration,
    ) -> SubmitterResult<Option<TransactionReceipt>> {
        debug!("Checking receipt for {} in {:?}", handle, delay);
        sleep(delay).await;

        let receipt = self.provider.get_transaction_receipt(handle.hash()).await?;
        if receipt.is_none() {
            info!("No receipt yet for {}", handle);
        }
        Ok(receipt)
    }

    /// Poll until the receipt appears or the deadline passes
    pub async fn poll(&self, handle: &TxHandle) -> SubmitterResult<Option<TransactionReceipt>> {
        let started = Instant::now();
        let deadline = started + self.policy.timeout;
        let mut delay = self.policy.initial_delay;
        let mut attempts = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "No receipt for {} after {} lookups in {:?}",
                    handle,
                    attempts,
                    started.elapsed()
                );
                return Ok(None);
            }

            sleep(delay.min(deadline - now)).await;
            attempts += 1;

            match self.provider.get_transaction_receipt(handle.hash()).await {
                Ok(Some(receipt)) => {
                    info!(
                        "Receipt for {} found after {} lookups ({:?})",
                        handle,
                        attempts,
                        started.elapsed()
                    );
                    return Ok(Some(receipt));
                }
                Ok(None) => {
                    debug!("Receipt for {} not available (lookup {})", handle, attempts);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Receipt lookup for {} failed, will retry: {}", handle, e);
                }
                Err(e) => return Err(e),
            }

            delay = self.policy.next_delay(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::provider::tests::mocked;
    use ethers::providers::MockProvider;
    use ethers::types::H256;

    fn config(mode: ConfirmationMode) -> ConfirmationConfig {
        ConfirmationConfig {
            mode,
            initial_delay_ms: 1_000,
            max_delay_ms: 4_000,
            multiplier: 2,
            timeout_secs: 10,
        }
    }

    fn waiter(mode: ConfirmationMode) -> (ReceiptWaiter<MockProvider>, MockProvider) {
        let (provider, mock) = mocked();
        (ReceiptWaiter::new(Arc::new(provider), &config(mode)), mock)
    }

    fn receipt(hash: H256, status: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(U64::from(12)),
            status: Some(U64::from(status)),
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = BackoffPolicy::from_config(&config(ConfirmationMode::Backoff));

        let mut delay = policy.initial_delay;
        let mut schedule = vec![delay];
        for _ in 0..4 {
            delay = policy.next_delay(delay);
            schedule.push(delay);
        }

        let secs: Vec<u64> = schedule.iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 4, 4]);
    }

    #[test]
    fn test_status_classification() {
        let hash = H256::repeat_byte(1);
        assert_eq!(ReceiptStatus::of(None), ReceiptStatus::Pending);
        assert_eq!(
            ReceiptStatus::of(Some(&receipt(hash, 1))),
            ReceiptStatus::Success
        );
        assert_eq!(
            ReceiptStatus::of(Some(&receipt(hash, 0))),
            ReceiptStatus::Reverted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_receipt_matches_handle() {
        let (waiter, mock) = waiter(ConfirmationMode::Backoff);
        let hash = H256::repeat_byte(0x22);
        mock.push(receipt(hash, 1)).unwrap();
        mock.push::<Option<TransactionReceipt>, _>(None).unwrap();
        mock.push::<Option<TransactionReceipt>, _>(None).unwrap();

        let started = Instant::now();
        let found = waiter
            .await_receipt(&TxHandle::new(hash))
            .await
            .unwrap()
            .expect("receipt");

        assert_eq!(found.transaction_hash, hash);
        assert_eq!(ReceiptStatus::of(Some(&found)), ReceiptStatus::Success);
        // 1s + 2s + 4s
        assert_eq!(started.elapsed().as_secs(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_check_before_mining_is_absent() {
        let (waiter, mock) = waiter(ConfirmationMode::Fixed);
        mock.push::<Option<TransactionReceipt>, _>(None).unwrap();

        let started = Instant::now();
        let result = waiter
            .await_receipt(&TxHandle::new(H256::repeat_byte(0x33)))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(started.elapsed().as_secs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_at_deadline() {
        let (waiter, mock) = waiter(ConfirmationMode::Backoff);
        // 1s + 2s + 4s + 3s (clipped to the deadline)
        for _ in 0..4 {
            mock.push::<Option<TransactionReceipt>, _>(None).unwrap();
        }

        let started = Instant::now();
        let result = waiter
            .await_receipt(&TxHandle::new(H256::repeat_byte(0x44)))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(started.elapsed().as_secs(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_lookup_error_keeps_polling() {
        let (waiter, mock) = waiter(ConfirmationMode::Backoff);
        let hash = H256::repeat_byte(0x55);
        mock.push(receipt(hash, 0)).unwrap();
        // Undecodable response surfaces as an RPC error
        mock.push(serde_json::json!("garbage")).unwrap();

        let found = waiter.poll(&TxHandle::new(hash)).await.unwrap();

        assert_eq!(
            ReceiptStatus::of(found.as_ref()),
            ReceiptStatus::Reverted
        );
    }
}
