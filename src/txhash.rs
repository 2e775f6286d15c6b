//! Transaction hashes across chain families.
//!
//! Equality is bit-exact within a variant and false across variants.  Each
//! variant has a canonical text form that round-trips: CB58-with-checksum
//! for Avalanche, `0x` hex for Ethereum-style chains.

use eyre::{eyre, Result};
use std::fmt;

use crate::codec::{cb58_decode, cb58_encode, decode_hex};
use crate::network::ChainFamily;

/// A chain transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxHash {
    Avalanche([u8; 32]),
    Ethereum([u8; 32]),
}

impl TxHash {
    pub fn family(&self) -> ChainFamily {
        match self {
            TxHash::Avalanche(_) => ChainFamily::Avalanche,
            TxHash::Ethereum(_) => ChainFamily::Ethereum,
        }
    }

    pub fn bytes(&self) -> &[u8; 32] {
        match self {
            TxHash::Avalanche(bytes) | TxHash::Ethereum(bytes) => bytes,
        }
    }

    /// Parse the chain-specific text form.
    pub fn from_string(family: ChainFamily, input: &str) -> Result<TxHash> {
        match family {
            ChainFamily::Avalanche => {
                let bytes = cb58_decode(input)?;
                if bytes.len() != 32 {
                    return Err(eyre!("avalanche hash must be 32 bytes, got {}", bytes.len()));
                }
                let mut raw = [0u8; 32];
                raw.copy_from_slice(&bytes);
                Ok(TxHash::Avalanche(raw))
            }
            ChainFamily::Ethereum => {
                let bytes = decode_hex(input)?;
                if bytes.len() != 32 {
                    return Err(eyre!("ethereum hash must be 32 bytes, got {}", bytes.len()));
                }
                let mut raw = [0u8; 32];
                raw.copy_from_slice(&bytes);
                Ok(TxHash::Ethereum(raw))
            }
        }
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxHash::Avalanche(bytes) => write!(f, "{}", cb58_encode(bytes)),
            TxHash::Ethereum(bytes) => write!(f, "0x{}", hex::encode(bytes)),
        }
    }
}
