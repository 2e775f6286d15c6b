//! Ethereum-style accounts: one BIP-44 derived key, one address.

use alloy::primitives::Address;
use bip32::{DerivationPath, XPrv};
use eyre::{eyre, Result};
use k256::ecdsa::SigningKey;

use crate::eth::signature::address_of_key;

/// BIP-44 derivation path for the primary Ethereum key.
const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Derive the signing key from a 64-byte BIP-39 seed.  Called on every
/// signing operation; keys are never retained.
pub fn derive_signing_key(seed: &[u8; 64]) -> Result<SigningKey> {
    let path: DerivationPath = DERIVATION_PATH
        .parse()
        .map_err(|e| eyre!("invalid derivation path: {}", e))?;
    let xprv = XPrv::derive_from_path(seed, &path).map_err(|e| eyre!("derivation failed: {}", e))?;
    Ok(xprv.private_key().clone())
}

/// An Ethereum-style account: the derived address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthereumAccount {
    address: Address,
}

impl EthereumAccount {
    pub fn from_seed(seed: &[u8; 64]) -> Result<Self> {
        let key = derive_signing_key(seed)?;
        Ok(EthereumAccount {
            address: address_of_key(key.verifying_key()),
        })
    }

    pub fn from_serialization(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 20 {
            return Err(eyre!(
                "account serialization must be 20 bytes, got {}",
                bytes.len()
            ));
        }
        Ok(EthereumAccount {
            address: Address::from_slice(bytes),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.address.as_slice().to_vec()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn has_address(&self, address: &Address) -> bool {
        &self.address == address
    }
}
