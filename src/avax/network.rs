//! Avalanche network records: mainnet and the Fuji testnet.

use crate::avax::address::AvalancheAddress;
use crate::avax::AvalancheChain;
use eyre::Result;

/// Network id carried in every serialized transaction.
pub const AVALANCHE_NETWORK_ID_MAINNET: u32 = 1;
pub const AVALANCHE_NETWORK_ID_FUJI: u32 = 5;

/// The X-chain blockchain id of mainnet,
/// CB58 `2oYMBNV4eNHyqk2fjjV5nVQLDbtmNJzq5s3qs3Lo6ftnC6FByM`.
const MAINNET_BLOCKCHAIN_ID: [u8; 32] = [
    0xed, 0x5f, 0x38, 0x34, 0x1e, 0x43, 0x6e, 0x5d, 0x46, 0xe2, 0xbb, 0x00, 0xb4, 0x5d, 0x62,
    0xae, 0x97, 0xd1, 0xb0, 0x50, 0xc6, 0x4b, 0xc6, 0x34, 0xae, 0x10, 0x62, 0x67, 0x39, 0xe3,
    0x5c, 0x4b,
];

/// The X-chain blockchain id of Fuji,
/// CB58 `2JVSBoinj9C2J33VntvzYtVJNZdN2NKiwwKjcumHUWEb5DbBrm`.
const FUJI_BLOCKCHAIN_ID: [u8; 32] = [
    0xab, 0x68, 0xeb, 0x1e, 0xe1, 0x42, 0xa0, 0x5c, 0xfe, 0x76, 0x8c, 0x36, 0xe1, 0x1f, 0x0b,
    0x59, 0x6d, 0xb5, 0xa3, 0xc6, 0xc7, 0x7a, 0xab, 0xe6, 0x65, 0xda, 0xd9, 0xe6, 0x38, 0xca,
    0x94, 0xf7,
];

/// Per-network constants of the Avalanche X-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvalancheNetworkParams {
    pub chain: AvalancheChain,
    pub network_id: u32,
    pub blockchain_id: [u8; 32],
    pub hrp: &'static str,
}

impl AvalancheNetworkParams {
    pub fn mainnet() -> Self {
        AvalancheNetworkParams {
            chain: AvalancheChain::X,
            network_id: AVALANCHE_NETWORK_ID_MAINNET,
            blockchain_id: MAINNET_BLOCKCHAIN_ID,
            hrp: "avax",
        }
    }

    pub fn fuji() -> Self {
        AvalancheNetworkParams {
            chain: AvalancheChain::X,
            network_id: AVALANCHE_NETWORK_ID_FUJI,
            blockchain_id: FUJI_BLOCKCHAIN_ID,
            hrp: "fuji",
        }
    }

    /// Render an address against this network's prefix.
    pub fn address_to_string(&self, address: &AvalancheAddress) -> Result<String> {
        address.to_string_with_hrp(self.hrp)
    }

    /// Parse an address against this network's prefix.
    pub fn address_from_string(&self, input: &str, strict: bool) -> Result<AvalancheAddress> {
        AvalancheAddress::from_string(input, strict, self.hrp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::cb58_encode;

    #[test]
    fn test_blockchain_ids_match_cb58() {
        assert_eq!(
            cb58_encode(&AvalancheNetworkParams::mainnet().blockchain_id),
            "2oYMBNV4eNHyqk2fjjV5nVQLDbtmNJzq5s3qs3Lo6ftnC6FByM"
        );
        assert_eq!(
            cb58_encode(&AvalancheNetworkParams::fuji().blockchain_id),
            "2JVSBoinj9C2J33VntvzYtVJNZdN2NKiwwKjcumHUWEb5DbBrm"
        );
    }
}
