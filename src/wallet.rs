//! A wallet: the transfers of one currency, their balance, and the address
//! set the sync engine queries for.

use alloy::primitives::I256;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::currency::{Amount, Currency, Unit};
use crate::fee::FeeBasis;
use crate::network::Network;
use crate::transfer::Transfer;
use crate::txhash::TxHash;

#[derive(Debug, Default)]
struct WalletState {
    transfers: Vec<Arc<Transfer>>,
    /// Canonical text forms of every address known to belong to this
    /// wallet.  Grows as recovery discovers new ones; the sync engine
    /// re-queries until this reaches a fixed point.
    addresses: BTreeSet<String>,
    default_fee_basis: Option<FeeBasis>,
}

/// A collection of transfers for one currency.
pub struct Wallet {
    network: Arc<Network>,
    unit: Unit,
    unit_for_fee: Unit,
    primary_address: Address,
    balance_minimum: Option<Amount>,
    balance_maximum: Option<Amount>,
    state: Mutex<WalletState>,
}

impl Wallet {
    pub fn new(
        network: Arc<Network>,
        unit: Unit,
        unit_for_fee: Unit,
        primary_address: Address,
        balance_minimum: Option<Amount>,
        balance_maximum: Option<Amount>,
    ) -> Self {
        let mut addresses = BTreeSet::new();
        if let Ok(text) = primary_address.to_string_for(&network) {
            addresses.insert(text);
        }

        Wallet {
            network,
            unit,
            unit_for_fee,
            primary_address,
            balance_minimum,
            balance_maximum,
            state: Mutex::new(WalletState {
                transfers: Vec::new(),
                addresses,
                default_fee_basis: None,
            }),
        }
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn currency(&self) -> &Currency {
        self.unit.currency()
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn unit_for_fee(&self) -> &Unit {
        &self.unit_for_fee
    }

    pub fn primary_address(&self) -> &Address {
        &self.primary_address
    }

    pub fn balance_minimum(&self) -> Option<Amount> {
        self.balance_minimum.clone()
    }

    pub fn balance_maximum(&self) -> Option<Amount> {
        self.balance_maximum.clone()
    }

    pub fn default_fee_basis(&self) -> Option<FeeBasis> {
        self.state.lock().unwrap().default_fee_basis.clone()
    }

    pub fn set_default_fee_basis(&self, basis: FeeBasis) {
        self.state.lock().unwrap().default_fee_basis = Some(basis);
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    pub fn transfers(&self) -> Vec<Arc<Transfer>> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn transfer_count(&self) -> usize {
        self.state.lock().unwrap().transfers.len()
    }

    /// Add a transfer; returns false when it is already present.
    pub fn add_transfer(&self, transfer: Arc<Transfer>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state
            .transfers
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &transfer))
        {
            return false;
        }
        state.transfers.push(transfer);
        true
    }

    pub fn remove_transfer(&self, transfer: &Arc<Transfer>) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.transfers.len();
        state.transfers.retain(|existing| !Arc::ptr_eq(existing, transfer));
        state.transfers.len() != before
    }

    /// Find a transfer by hash or uids.  A bundle can arrive before the
    /// local transfer has learned its uids, so hash matches too.
    pub fn transfer_by_hash_or_uids(
        &self,
        hash: Option<&TxHash>,
        uids: &str,
    ) -> Option<Arc<Transfer>> {
        let state = self.state.lock().unwrap();
        state
            .transfers
            .iter()
            .find(|transfer| {
                transfer.uids().as_deref() == Some(uids)
                    || (hash.is_some() && transfer.hash().as_ref() == hash)
            })
            .cloned()
    }

    // ========================================================================
    // Balance
    // ========================================================================

    /// The balance: the signed sum of every transfer's effect on this
    /// wallet's currency.
    pub fn balance(&self) -> Amount {
        let currency = self.currency();
        let total: I256 = self
            .state
            .lock()
            .unwrap()
            .transfers
            .iter()
            .fold(I256::ZERO, |acc, transfer| acc + transfer.effect_on(currency));
        Amount::new(self.unit.clone(), total)
    }

    // ========================================================================
    // Address set
    // ========================================================================

    /// The addresses the sync engine queries transfers for.
    pub fn addresses_for_recovery(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().addresses.clone()
    }

    /// Register an address discovered during recovery; returns true when it
    /// was new (which re-arms the sync engine's fixpoint query).
    pub fn register_address(&self, address: impl Into<String>) -> bool {
        self.state.lock().unwrap().addresses.insert(address.into())
    }

    pub fn has_address(&self, address: &str) -> bool {
        self.state.lock().unwrap().addresses.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avax::address::AvalancheAddress;
    use crate::avax::network::AvalancheNetworkParams;
    use crate::currency::CurrencyKind;
    use crate::network::{
        AddressScheme, ChainFamily, ChainParams, CurrencyAssociation, SyncMode,
    };
    use crate::transfer::{TransferDirection, TransferState};

    fn currency() -> Currency {
        Currency::new("avalanche-mainnet:avax", "Avalanche", "AVAX", CurrencyKind::Native, None)
    }

    fn unit() -> Unit {
        Unit::base(currency(), "nAVAX", "nanoavax")
    }

    fn network() -> Arc<Network> {
        Arc::new(Network::new(
            ChainFamily::Avalanche,
            "avalanche-mainnet",
            "mainnet",
            true,
            2,
            1,
            AddressScheme::Native,
            SyncMode::ApiOnly,
            currency(),
            vec![CurrencyAssociation {
                currency: currency(),
                base_unit: unit(),
                default_unit: unit(),
                units: vec![unit()],
            }],
            ChainParams::Avalanche(AvalancheNetworkParams::mainnet()),
            vec![],
        ))
    }

    fn wallet() -> Wallet {
        Wallet::new(
            network(),
            unit(),
            unit(),
            Address::Avalanche(AvalancheAddress::X([1; 20])),
            None,
            None,
        )
    }

    fn transfer(direction: TransferDirection, amount: u64) -> Arc<Transfer> {
        Arc::new(Transfer::new(
            unit(),
            unit(),
            Address::Avalanche(AvalancheAddress::X([1; 20])),
            Address::Avalanche(AvalancheAddress::X([2; 20])),
            Amount::from_u64(unit(), amount),
            direction,
            Some(FeeBasis::Fixed {
                fee_per_operation: Amount::from_u64(unit(), 10),
                operations: 1,
            }),
            None,
        ))
    }

    #[test]
    fn test_balance_is_signed_sum() {
        let wallet = wallet();
        wallet.add_transfer(transfer(TransferDirection::Received, 1_000));
        wallet.add_transfer(transfer(TransferDirection::Sent, 300));

        // +1000 - 10 (received pays no fee) ... received: +1000; sent: -300 - 10.
        assert_eq!(wallet.balance().value(), I256::try_from(690).unwrap());
    }

    #[test]
    fn test_balance_ignores_errored() {
        let wallet = wallet();
        let failed = transfer(TransferDirection::Sent, 300);
        failed.set_state(TransferState::Errored(crate::error::SubmitError::Unknown));
        wallet.add_transfer(failed);

        assert!(wallet.balance().is_zero());
    }

    #[test]
    fn test_add_transfer_is_idempotent() {
        let wallet = wallet();
        let t = transfer(TransferDirection::Sent, 1);
        assert!(wallet.add_transfer(t.clone()));
        assert!(!wallet.add_transfer(t));
        assert_eq!(wallet.transfer_count(), 1);
    }

    #[test]
    fn test_lookup_by_hash_then_uids() {
        let wallet = wallet();
        let t = transfer(TransferDirection::Sent, 1);
        t.set_hash(TxHash::Avalanche([7; 32]));
        wallet.add_transfer(t.clone());

        let hash = TxHash::Avalanche([7; 32]);
        let found = wallet.transfer_by_hash_or_uids(Some(&hash), "unseen-uids").unwrap();
        assert!(Arc::ptr_eq(&found, &t));

        t.set_uids("uids-1");
        let found = wallet.transfer_by_hash_or_uids(None, "uids-1").unwrap();
        assert!(Arc::ptr_eq(&found, &t));

        assert!(wallet.transfer_by_hash_or_uids(None, "other").is_none());
    }

    #[test]
    fn test_address_registration_reports_growth() {
        let wallet = wallet();
        let initial = wallet.addresses_for_recovery();
        assert_eq!(initial.len(), 1);

        assert!(wallet.register_address("X-avax1other"));
        assert!(!wallet.register_address("X-avax1other"));
        assert_eq!(wallet.addresses_for_recovery().len(), 2);
    }
}
