use ethers::types::H256;
use serde::Serialize;
use std::fmt;

/// Identifies a submitted transaction by its hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TxHandle(H256);

impl TxHandle {
    pub fn new(hash: H256) -> Self {
        Self(hash)
    }

    pub fn hash(&self) -> H256 {
        self.0
    }
}

impl From<H256> for TxHandle {
    fn from(hash: H256) -> Self {
        Self(hash)
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_full_hash() {
        let handle = TxHandle::new(H256::repeat_byte(0xab));
        let rendered = handle.to_string();

        assert_eq!(rendered.len(), 66);
        assert!(rendered.starts_with("0x"));
        assert!(rendered[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
