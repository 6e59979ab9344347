//! Sequential submit-and-confirm run over the configured transactions
//!
//! Transactions are independent: a reverted or unconfirmed one does not stop
//! the run, but a failed submission or receipt lookup does.

use crate::chain::{ChainProvider, ReceiptStatus, ReceiptWaiter};
use crate::config::Settings;
use crate::error::SubmitterResult;
use crate::tx::{NonceManager, Submission, TransactionSender, TxHandle, TxRequest};
use crate::wallet::Identity;

use chrono::{DateTime, Utc};
use ethers::providers::{Http, JsonRpcClient};
use ethers::types::{Address, TransactionReceipt, U256};
use ethers::utils::format_ether;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one configured transaction
///
/// Created as `Pending` right after the broadcast and completed once the
/// receipt lookup returns.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub name: String,
    pub from: Address,
    pub to: Address,
    pub handle: TxHandle,
    pub nonce: u64,
    pub submitted_at: DateTime<Utc>,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub elapsed_ms: u64,
    /// Full receipt as returned by the node, logs included
    pub receipt: Option<TransactionReceipt>,
}

impl SubmissionReport {
    fn submitted(
        request: &TxRequest,
        from: Address,
        submission: &Submission,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: request.name.clone(),
            from,
            to: request.to,
            handle: submission.handle,
            nonce: submission.nonce,
            submitted_at,
            status: ReceiptStatus::Pending,
            block_number: None,
            gas_used: None,
            elapsed_ms: 0,
            receipt: None,
        }
    }

    fn complete(&mut self, receipt: Option<TransactionReceipt>, elapsed_ms: u64) {
        self.status = ReceiptStatus::of(receipt.as_ref());
        self.block_number = receipt
            .as_ref()
            .and_then(|r| r.block_number)
            .map(|b| b.as_u64());
        self.gas_used = receipt.as_ref().and_then(|r| r.gas_used);
        self.elapsed_ms = elapsed_ms;
        self.receipt = receipt;
    }
}

/// Drives the configured transactions one after another
pub struct Runner<P = Http> {
    provider: Arc<ChainProvider<P>>,
    sender: TransactionSender<P>,
    waiter: ReceiptWaiter<P>,
    requests: Vec<TxRequest>,
}

impl<P: JsonRpcClient> Runner<P> {
    pub fn new(
        settings: &Settings,
        provider: Arc<ChainProvider<P>>,
        identity: Identity,
        nonce_manager: NonceManager,
    ) -> SubmitterResult<Self> {
        let requests = settings
            .enabled_transactions()
            .into_iter()
            .map(TxRequest::try_from)
            .collect::<SubmitterResult<Vec<_>>>()?;

        let sender =
            TransactionSender::new(provider.clone(), identity, nonce_manager, &settings.gas);
        let waiter = ReceiptWaiter::new(provider.clone(), &settings.confirmation);

        Ok(Self {
            provider,
            sender,
            waiter,
            requests,
        })
    }

    /// Log node height, signer and balance before sending anything
    pub async fn preflight(&self) -> SubmitterResult<()> {
        let block = self.provider.get_block_number().await?;
        info!("Connected to {} at block {}", self.provider.url(), block);

        let balance = self.sender.get_balance().await?;
        info!(
            "Signer {:?} balance: {} ETH",
            self.sender.wallet_address(),
            format_ether(balance)
        );

        if balance.is_zero() {
            warn!("Signer has no balance; submissions will likely be rejected");
        }

        debug!(
            "Next nonce {}, receipt policy: {:?}",
            self.sender.nonce_manager().peek().await,
            self.waiter.policy()
        );
        Ok(())
    }

    /// Submit every request in order, appending a report for each.
    ///
    /// A report is pushed as soon as its transaction is broadcast, so the
    /// caller keeps it even if the receipt lookup fails or this future is
    /// dropped mid-wait.
    pub async fn run(&self, reports: &mut Vec<SubmissionReport>) -> SubmitterResult<()> {
        self.preflight().await?;

        for request in &self.requests {
            let started = Instant::now();
            let submitted_at = Utc::now();

            let submission = self.sender.submit(request).await?;
            info!("{} tx: {}", request.name, submission.handle);

            reports.push(SubmissionReport::submitted(
                request,
                self.sender.wallet_address(),
                &submission,
                submitted_at,
            ));
            let index = reports.len() - 1;

            let receipt = match self.waiter.await_receipt(&submission.handle).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!(
                        "Receipt lookup for {} ({}) failed: {}",
                        request.name, submission.handle, e
                    );
                    reports[index].elapsed_ms = started.elapsed().as_millis() as u64;
                    return Err(e);
                }
            };

            self.record(request, &submission, receipt.as_ref()).await;
            reports[index].complete(receipt, started.elapsed().as_millis() as u64);
        }

        info!(
            "Processed {} transactions ({} without receipt)",
            reports.len(),
            self.sender.nonce_manager().pending_count().await
        );
        Ok(())
    }

    async fn record(
        &self,
        request: &TxRequest,
        submission: &Submission,
        receipt: Option<&TransactionReceipt>,
    ) {
        match ReceiptStatus::of(receipt) {
            ReceiptStatus::Success => {
                info!("{} tx receipt: confirmed", request.name);
                self.sender.mark_confirmed(submission).await;
            }
            ReceiptStatus::Reverted => {
                warn!("{} tx receipt: reverted", request.name);
                self.sender.mark_confirmed(submission).await;
            }
            ReceiptStatus::Pending => {
                warn!("{} tx receipt: not available", request.name);
            }
        }
    }
}
