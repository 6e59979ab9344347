//! Transaction submission: requests, nonces, fees, signing and broadcast

mod gas;
mod handle;
mod nonce;
mod request;
mod sender;

pub use handle::TxHandle;
pub use nonce::NonceManager;
pub use request::TxRequest;
pub use sender::{Submission, TransactionSender};
