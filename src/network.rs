//! Networks: the per-chain parameters a wallet manager runs against.
//!
//! Known networks are immutable tables constructed at startup and passed by
//! reference into the manager; chain families register through the
//! [`ChainFamily`] enumeration, not at runtime.  Only the block height, the
//! verified block hash and the current fee schedule are mutable, each behind
//! the network's lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::avax::network::AvalancheNetworkParams;
use crate::currency::{Amount, Currency, Unit};
use crate::txhash::TxHash;

/// Sentinel for an unbounded `endBlock` in client range queries.
pub const BLOCK_HEIGHT_UNBOUNDED: u64 = u64::MAX;

/// The chain families this runtime dispatches over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    /// Avalanche X-chain: UTXO data model, CB58 hashes, bech32 addresses.
    Avalanche,
    /// Ethereum-style: account data model, gas fees, keccak hashes.
    Ethereum,
}

impl ChainFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Avalanche => "avalanche",
            ChainFamily::Ethereum => "ethereum",
        }
    }
}

impl std::fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a manager synchronizes and submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    ApiOnly,
    ApiWithP2pSend,
    P2pWithApiSync,
    P2pOnly,
}

impl SyncMode {
    /// Does the sync engine poll the indexer in this mode?
    pub fn syncs_via_api(&self) -> bool {
        matches!(self, SyncMode::ApiOnly | SyncMode::ApiWithP2pSend)
    }
}

/// Which address form a wallet generates by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressScheme {
    Native,
    Legacy,
}

/// One entry of the network's fee schedule.
#[derive(Debug, Clone)]
pub struct NetworkFee {
    /// Expected confirmation time at this price.
    pub confirmation_time_ms: u64,
    /// Price per cost factor: per kB, per gas, or per operation, family
    /// specific.  Its unit is the price unit.
    pub price_per_cost_factor: Amount,
}

impl NetworkFee {
    pub fn new(confirmation_time_ms: u64, price_per_cost_factor: Amount) -> Self {
        NetworkFee {
            confirmation_time_ms,
            price_per_cost_factor,
        }
    }

    pub fn price_unit(&self) -> &Unit {
        self.price_per_cost_factor.unit()
    }
}

/// A currency known on a network, with its unit scalings.
#[derive(Debug, Clone)]
pub struct CurrencyAssociation {
    pub currency: Currency,
    pub base_unit: Unit,
    pub default_unit: Unit,
    pub units: Vec<Unit>,
}

/// Chain-specific network parameters.
#[derive(Debug, Clone)]
pub enum ChainParams {
    Avalanche(AvalancheNetworkParams),
    Ethereum { chain_id: u64 },
}

/// A blockchain network.
#[derive(Debug)]
pub struct Network {
    family: ChainFamily,
    uids: String,
    name: String,
    is_mainnet: bool,
    confirmation_period_secs: u64,
    confirmations_until_final: u32,
    default_address_scheme: AddressScheme,
    default_sync_mode: SyncMode,
    native_currency: Currency,
    associations: Vec<CurrencyAssociation>,
    params: ChainParams,

    // Mutable state, guarded.
    height: AtomicU64,
    verified_block_hash: Mutex<Option<TxHash>>,
    fees: Mutex<Vec<NetworkFee>>,
}

impl Network {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        family: ChainFamily,
        uids: impl Into<String>,
        name: impl Into<String>,
        is_mainnet: bool,
        confirmation_period_secs: u64,
        confirmations_until_final: u32,
        default_address_scheme: AddressScheme,
        default_sync_mode: SyncMode,
        native_currency: Currency,
        associations: Vec<CurrencyAssociation>,
        params: ChainParams,
        fees: Vec<NetworkFee>,
    ) -> Self {
        let mut fees = fees;
        // Keep the schedule ordered fastest-confirmation first.
        fees.sort_by_key(|fee| fee.confirmation_time_ms);

        Network {
            family,
            uids: uids.into(),
            name: name.into(),
            is_mainnet,
            confirmation_period_secs,
            confirmations_until_final,
            default_address_scheme,
            default_sync_mode,
            native_currency,
            associations,
            params,
            height: AtomicU64::new(0),
            verified_block_hash: Mutex::new(None),
            fees: Mutex::new(fees),
        }
    }

    pub fn family(&self) -> ChainFamily {
        self.family
    }

    pub fn uids(&self) -> &str {
        &self.uids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }

    pub fn confirmation_period_secs(&self) -> u64 {
        self.confirmation_period_secs
    }

    pub fn confirmations_until_final(&self) -> u32 {
        self.confirmations_until_final
    }

    pub fn default_address_scheme(&self) -> AddressScheme {
        self.default_address_scheme
    }

    pub fn default_sync_mode(&self) -> SyncMode {
        self.default_sync_mode
    }

    pub fn native_currency(&self) -> &Currency {
        &self.native_currency
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn associations(&self) -> &[CurrencyAssociation] {
        &self.associations
    }

    fn association(&self, currency: &Currency) -> Option<&CurrencyAssociation> {
        self.associations.iter().find(|a| &a.currency == currency)
    }

    pub fn unit_as_base(&self, currency: &Currency) -> Option<Unit> {
        self.association(currency).map(|a| a.base_unit.clone())
    }

    pub fn unit_as_default(&self, currency: &Currency) -> Option<Unit> {
        self.association(currency).map(|a| a.default_unit.clone())
    }

    pub fn has_currency(&self, currency: &Currency) -> bool {
        self.association(currency).is_some()
    }

    // ========================================================================
    // Mutable state
    // ========================================================================

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    /// Update the height; returns true when it changed.
    pub fn set_height(&self, height: u64) -> bool {
        let old = self.height.swap(height, Ordering::SeqCst);
        if old != height {
            tracing::debug!(network = %self.name, old, new = height, "network height updated");
        }
        old != height
    }

    pub fn verified_block_hash(&self) -> Option<TxHash> {
        self.verified_block_hash.lock().unwrap().clone()
    }

    pub fn set_verified_block_hash(&self, hash: TxHash) {
        *self.verified_block_hash.lock().unwrap() = Some(hash);
    }

    /// The current fee schedule, ordered by confirmation time.
    pub fn fees(&self) -> Vec<NetworkFee> {
        self.fees.lock().unwrap().clone()
    }

    /// Replace the fee schedule; returns the new schedule length.
    pub fn set_fees(&self, mut fees: Vec<NetworkFee>) -> usize {
        fees.sort_by_key(|fee| fee.confirmation_time_ms);
        let count = fees.len();
        *self.fees.lock().unwrap() = fees;
        count
    }

    /// The cheapest (slowest) fee, the default for estimation when the host
    /// does not choose one.
    pub fn default_fee(&self) -> Option<NetworkFee> {
        self.fees.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyKind;

    fn test_network() -> Network {
        let avax = Currency::new("avalanche-mainnet:avax", "Avalanche", "AVAX", CurrencyKind::Native, None);
        let base = Unit::base(avax.clone(), "nAVAX", "nanoavax");
        let default = Unit::new(avax.clone(), "AVAX", "avalanche", 9);

        Network::new(
            ChainFamily::Avalanche,
            "avalanche-mainnet",
            "mainnet",
            true,
            2,
            1,
            AddressScheme::Native,
            SyncMode::ApiOnly,
            avax.clone(),
            vec![CurrencyAssociation {
                currency: avax,
                base_unit: base.clone(),
                default_unit: default.clone(),
                units: vec![base.clone(), default],
            }],
            ChainParams::Avalanche(AvalancheNetworkParams::mainnet()),
            vec![
                NetworkFee::new(2_000, Amount::from_u64(base.clone(), 1_000_000)),
                NetworkFee::new(1_000, Amount::from_u64(base, 2_000_000)),
            ],
        )
    }

    #[test]
    fn test_height_update_reports_change() {
        let network = test_network();
        assert_eq!(network.height(), 0);
        assert!(network.set_height(10));
        assert!(!network.set_height(10));
        assert_eq!(network.height(), 10);
    }

    #[test]
    fn test_fees_ordered_by_confirmation_time() {
        let network = test_network();
        let fees = network.fees();
        assert_eq!(fees[0].confirmation_time_ms, 1_000);
        assert_eq!(fees[1].confirmation_time_ms, 2_000);
        // Default fee is the slowest/cheapest entry.
        assert_eq!(network.default_fee().unwrap().confirmation_time_ms, 2_000);
    }

    #[test]
    fn test_unit_lookup() {
        let network = test_network();
        let native = network.native_currency().clone();
        assert_eq!(network.unit_as_base(&native).unwrap().decimals(), 0);
        assert_eq!(network.unit_as_default(&native).unwrap().decimals(), 9);
    }
}
