//! Avalanche addresses.
//!
//! The X-chain address is the 20-byte `ripemd160(sha256(compressed pubkey))`
//! rendered as `X-<bech32>` against the network's HRP.  The C-chain address
//! is the usual 20-byte keccak form rendered as `0x` hex.  Two sentinel
//! addresses occur in indexer bundles: `__fee__` (the implicit fee sink) and
//! `unknown` (burn companions and unparseable counterparties).

use eyre::{eyre, Result};
use std::fmt;

use crate::codec::{decode_bech32_address, decode_hex, encode_bech32_address};

/// Which Avalanche chain an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvalancheChain {
    X,
    C,
}

/// An Avalanche address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvalancheAddress {
    X([u8; 20]),
    C([u8; 20]),
    /// The implicit fee sink, textually `__fee__`.
    Fee,
    /// An unknown counterparty, textually `unknown`.
    Unknown,
}

impl AvalancheAddress {
    pub fn chain(&self) -> Option<AvalancheChain> {
        match self {
            AvalancheAddress::X(_) => Some(AvalancheChain::X),
            AvalancheAddress::C(_) => Some(AvalancheChain::C),
            _ => None,
        }
    }

    pub fn is_fee(&self) -> bool {
        matches!(self, AvalancheAddress::Fee)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, AvalancheAddress::Unknown)
    }

    /// The raw 20-byte hash for X and C addresses.
    pub fn raw_bytes(&self) -> Option<[u8; 20]> {
        match self {
            AvalancheAddress::X(bytes) | AvalancheAddress::C(bytes) => Some(*bytes),
            _ => None,
        }
    }

    /// The X-chain payload, required by transaction outputs.
    pub fn x_bytes(&self) -> Result<[u8; 20]> {
        match self {
            AvalancheAddress::X(bytes) => Ok(*bytes),
            other => Err(eyre!("not an X-chain address: {:?}", other)),
        }
    }

    /// Render against the network's human-readable prefix.
    pub fn to_string_with_hrp(&self, hrp: &str) -> Result<String> {
        match self {
            AvalancheAddress::X(bytes) => {
                Ok(format!("X-{}", encode_bech32_address(bytes, hrp)?))
            }
            AvalancheAddress::C(bytes) => Ok(format!("0x{}", hex::encode(bytes))),
            AvalancheAddress::Fee => Ok("__fee__".to_string()),
            AvalancheAddress::Unknown => Ok("unknown".to_string()),
        }
    }

    /// Parse an address string.
    ///
    /// In strict mode the sentinels are rejected; otherwise `__fee__`,
    /// `unknown` and the empty string parse to their sentinel forms, the way
    /// indexer bundles use them.
    pub fn from_string(input: &str, strict: bool, hrp: &str) -> Result<AvalancheAddress> {
        if input.is_empty() {
            return if strict {
                Err(eyre!("empty address"))
            } else {
                Ok(AvalancheAddress::Unknown)
            };
        }

        if !strict {
            match input {
                "unknown" => return Ok(AvalancheAddress::Unknown),
                "__fee__" => return Ok(AvalancheAddress::Fee),
                _ => {}
            }
        }

        if let Some(bech) = input.strip_prefix("X-") {
            let (bytes, decoded_hrp) = decode_bech32_address(bech)?;
            if decoded_hrp != hrp {
                return Err(eyre!("address prefix '{}' does not match '{}'", decoded_hrp, hrp));
            }
            if bytes.len() != 20 {
                return Err(eyre!("X address must be 20 bytes, got {}", bytes.len()));
            }
            let mut raw = [0u8; 20];
            raw.copy_from_slice(&bytes);
            return Ok(AvalancheAddress::X(raw));
        }

        if input.starts_with("0x") {
            let bytes = decode_hex(input)?;
            if bytes.len() != 20 {
                return Err(eyre!("C address must be 20 bytes, got {}", bytes.len()));
            }
            let mut raw = [0u8; 20];
            raw.copy_from_slice(&bytes);
            return Ok(AvalancheAddress::C(raw));
        }

        Err(eyre!("unrecognized avalanche address: {}", input))
    }
}

impl fmt::Display for AvalancheAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvalancheAddress::X(bytes) => write!(f, "X:{}", hex::encode(bytes)),
            AvalancheAddress::C(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            AvalancheAddress::Fee => write!(f, "__fee__"),
            AvalancheAddress::Unknown => write!(f, "unknown"),
        }
    }
}
