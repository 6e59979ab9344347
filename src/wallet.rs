//! Signing identity

use crate::config::WalletConfig;
use crate::error::{SubmitterError, SubmitterResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;

/// The key pair used to sign every outgoing transaction
#[derive(Debug, Clone)]
pub struct Identity {
    wallet: LocalWallet,
}

impl Identity {
    /// Load the private key from the environment variable named in config
    pub fn from_env(config: &WalletConfig) -> SubmitterResult<Self> {
        let key = std::env::var(&config.private_key_env).map_err(|_| {
            SubmitterError::Wallet(format!(
                "No wallet configured. Set {} to a hex private key",
                config.private_key_env
            ))
        })?;

        Self::from_private_key(&key)
    }

    /// Parse a hex private key, with or without `0x`
    pub fn from_private_key(key: &str) -> SubmitterResult<Self> {
        let wallet = key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| SubmitterError::Wallet(format!("Invalid private key: {}", e)))?;

        Ok(Self { wallet })
    }

    /// Bind signatures to a chain (EIP-155)
    pub fn with_chain_id(self, chain_id: u64) -> Self {
        Self {
            wallet: self.wallet.with_chain_id(chain_id),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.wallet.chain_id()
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Well-known development key (first hardhat/anvil account)
    pub(crate) const DEV_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_derives_address() {
        let identity = Identity::from_private_key(DEV_KEY).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(identity.address(), expected);
    }

    #[test]
    fn test_accepts_key_without_prefix() {
        let with_prefix = Identity::from_private_key(DEV_KEY).unwrap();
        let without = Identity::from_private_key(&DEV_KEY[2..]).unwrap();
        assert_eq!(with_prefix.address(), without.address());
    }

    #[test]
    fn test_chain_id_binding() {
        let identity = Identity::from_private_key(DEV_KEY).unwrap().with_chain_id(9000);
        assert_eq!(identity.chain_id(), 9000);
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(matches!(
            Identity::from_private_key("0x1234"),
            Err(SubmitterError::Wallet(_))
        ));
    }

    #[test]
    fn test_missing_env_var() {
        let config = WalletConfig {
            private_key_env: "SUBMITTER_TEST_KEY_THAT_IS_NOT_SET".to_string(),
        };
        assert!(matches!(
            Identity::from_env(&config),
            Err(SubmitterError::Wallet(_))
        ));
    }
}
