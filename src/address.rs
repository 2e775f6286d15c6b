//! Addresses across chain families.
//!
//! A sealed union: each variant stores the chain-specific bytes plus its
//! scheme discriminator.  Equality is bit-exact within a variant and false
//! across variants.  String rendering for Avalanche needs the network's
//! human-readable prefix, so the canonical text forms go through
//! [`Address::to_string_for`] / [`Address::from_string_for`] with the
//! owning [`Network`].

use alloy::primitives::Address as EvmAddress;
use eyre::{eyre, Result};
use std::fmt;
use std::str::FromStr;

use crate::avax::address::AvalancheAddress;
use crate::network::{ChainFamily, ChainParams, Network};

/// An address of some chain family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Avalanche(AvalancheAddress),
    Ethereum(EvmAddress),
}

impl Address {
    pub fn family(&self) -> ChainFamily {
        match self {
            Address::Avalanche(_) => ChainFamily::Avalanche,
            Address::Ethereum(_) => ChainFamily::Ethereum,
        }
    }

    pub fn as_avalanche(&self) -> Result<AvalancheAddress> {
        match self {
            Address::Avalanche(address) => Ok(*address),
            other => Err(eyre!("not an avalanche address: {}", other)),
        }
    }

    pub fn as_ethereum(&self) -> Result<EvmAddress> {
        match self {
            Address::Ethereum(address) => Ok(*address),
            other => Err(eyre!("not an ethereum address: {}", other)),
        }
    }

    /// The canonical text form against `network`.
    pub fn to_string_for(&self, network: &Network) -> Result<String> {
        match (self, network.params()) {
            (Address::Avalanche(address), ChainParams::Avalanche(params)) => {
                params.address_to_string(address)
            }
            (Address::Ethereum(address), ChainParams::Ethereum { .. }) => {
                Ok(format!("{:#x}", address))
            }
            _ => Err(eyre!("address family does not match network")),
        }
    }

    /// Parse the canonical text form against `network`.  Non-strict parsing
    /// admits the indexer sentinels (`unknown`, `__fee__`).
    pub fn from_string_for(network: &Network, input: &str, strict: bool) -> Result<Address> {
        match network.params() {
            ChainParams::Avalanche(params) => Ok(Address::Avalanche(
                params.address_from_string(input, strict)?,
            )),
            ChainParams::Ethereum { .. } => {
                let address = EvmAddress::from_str(input)
                    .map_err(|e| eyre!("invalid ethereum address '{}': {}", input, e))?;
                Ok(Address::Ethereum(address))
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Avalanche(address) => write!(f, "{}", address),
            Address::Ethereum(address) => write!(f, "{:#x}", address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_family_inequality() {
        let raw = [0x11u8; 20];
        let avalanche = Address::Avalanche(AvalancheAddress::C(raw));
        let ethereum = Address::Ethereum(EvmAddress::from_slice(&raw));
        assert_ne!(avalanche, ethereum);
    }

    #[test]
    fn test_family_accessors() {
        let address = Address::Avalanche(AvalancheAddress::X([0x22; 20]));
        assert_eq!(address.family(), ChainFamily::Avalanche);
        assert!(address.as_avalanche().is_ok());
        assert!(address.as_ethereum().is_err());
    }
}
