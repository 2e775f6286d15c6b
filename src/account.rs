//! Accounts: one BIP-39 paper key, one derived address set per chain
//! family.
//!
//! The account object holds public material only.  Seeds are derived from
//! the paper key at each signing call and never stored; serializations
//! carry addresses, never keys.

use eyre::{eyre, Result};

use crate::address::Address;
use crate::avax::account::AvalancheAccount;
use crate::avax::AvalancheChain;
use crate::eth::account::EthereumAccount;
use crate::network::ChainFamily;

/// A multi-chain account.
#[derive(Debug, Clone)]
pub struct Account {
    uids: String,
    /// Creation time, seconds since the epoch; bounds the earliest block a
    /// sync must consider.
    timestamp: u64,
    avalanche: AvalancheAccount,
    ethereum: EthereumAccount,
}

impl Account {
    /// Derive the 64-byte seed from a BIP-39 paper key.
    pub fn derive_seed(paper_key: &str) -> Result<[u8; 64]> {
        let mnemonic = bip39::Mnemonic::parse_normalized(paper_key)
            .map_err(|e| eyre!("invalid paper key: {}", e))?;
        Ok(mnemonic.to_seed(""))
    }

    /// Create an account from a paper key.
    pub fn from_paper_key(paper_key: &str, timestamp: u64, uids: impl Into<String>) -> Result<Self> {
        let seed = Self::derive_seed(paper_key)?;
        Self::from_seed(&seed, timestamp, uids)
    }

    pub fn from_seed(seed: &[u8; 64], timestamp: u64, uids: impl Into<String>) -> Result<Self> {
        Ok(Account {
            uids: uids.into(),
            timestamp,
            avalanche: AvalancheAccount::from_seed(seed)?,
            ethereum: EthereumAccount::from_seed(seed)?,
        })
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn avalanche(&self) -> &AvalancheAccount {
        &self.avalanche
    }

    pub fn ethereum(&self) -> &EthereumAccount {
        &self.ethereum
    }

    /// The per-chain serialization blob: each family's address material,
    /// length-prefixed.
    pub fn serialize(&self) -> Vec<u8> {
        let avalanche = self.avalanche.serialize();
        let ethereum = self.ethereum.serialize();

        let mut out = Vec::with_capacity(8 + avalanche.len() + ethereum.len());
        out.extend_from_slice(&(avalanche.len() as u32).to_be_bytes());
        out.extend_from_slice(&avalanche);
        out.extend_from_slice(&(ethereum.len() as u32).to_be_bytes());
        out.extend_from_slice(&ethereum);
        out
    }

    /// Reconstruct from a serialization; the address set is identical to
    /// the original's.
    pub fn from_serialization(
        bytes: &[u8],
        timestamp: u64,
        uids: impl Into<String>,
    ) -> Result<Self> {
        let (avalanche_bytes, rest) = split_prefixed(bytes)?;
        let (ethereum_bytes, rest) = split_prefixed(rest)?;
        if !rest.is_empty() {
            return Err(eyre!("trailing bytes in account serialization"));
        }

        Ok(Account {
            uids: uids.into(),
            timestamp,
            avalanche: AvalancheAccount::from_serialization(avalanche_bytes)?,
            ethereum: EthereumAccount::from_serialization(ethereum_bytes)?,
        })
    }

    /// The primary receive address on a chain family.
    pub fn primary_address(&self, family: ChainFamily) -> Address {
        match family {
            ChainFamily::Avalanche => {
                Address::Avalanche(self.avalanche.address(AvalancheChain::X))
            }
            ChainFamily::Ethereum => Address::Ethereum(self.ethereum.address()),
        }
    }

    pub fn has_address(&self, address: &Address) -> bool {
        match address {
            Address::Avalanche(avalanche) => self.avalanche.has_address(avalanche),
            Address::Ethereum(ethereum) => self.ethereum.has_address(ethereum),
        }
    }
}

fn split_prefixed(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    if bytes.len() < 4 {
        return Err(eyre!("truncated account serialization"));
    }
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if bytes.len() < 4 + len {
        return Err(eyre!("truncated account serialization"));
    }
    Ok((&bytes[4..4 + len], &bytes[4 + len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER_KEY: &str =
        "patient doctor olympic frog force glimpse endless antenna online dragon bargain someone";

    #[test]
    fn test_roundtrip_preserves_addresses() {
        let account = Account::from_paper_key(PAPER_KEY, 1_700_000_000, "account-1").unwrap();
        let recovered =
            Account::from_serialization(&account.serialize(), 1_700_000_000, "account-1").unwrap();

        for family in [ChainFamily::Avalanche, ChainFamily::Ethereum] {
            assert_eq!(account.primary_address(family), recovered.primary_address(family));
            assert!(recovered.has_address(&account.primary_address(family)));
        }
    }

    #[test]
    fn test_truncated_serialization_rejected() {
        let account = Account::from_paper_key(PAPER_KEY, 0, "account-1").unwrap();
        let bytes = account.serialize();
        assert!(Account::from_serialization(&bytes[..bytes.len() - 1], 0, "x").is_err());
        assert!(Account::from_serialization(&[0, 0], 0, "x").is_err());
    }

    #[test]
    fn test_invalid_paper_key() {
        assert!(Account::from_paper_key("not a mnemonic", 0, "x").is_err());
    }
}
