//! Shared fixtures: networks, a scripted mock indexer client, and a
//! recording listener.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use multiwallet_core::avax::AvalancheNetworkParams;
use multiwallet_core::client::{
    BlockNumberReply, Client, ClientError, FeeEstimateReply, SubmitReply, TransactionBundle,
    TransferBundle,
};
use multiwallet_core::currency::CurrencyKind;
use multiwallet_core::listener::{Listener, ManagerEvent, TransferEvent, WalletEvent};
use multiwallet_core::network::{
    AddressScheme, ChainFamily, ChainParams, CurrencyAssociation, SyncMode,
};
use multiwallet_core::{Amount, Currency, Network, NetworkFee, Transfer, Unit, Wallet};

pub const PAPER_KEY: &str =
    "patient doctor olympic frog force glimpse endless antenna online dragon bargain someone";

pub fn avax_currency() -> Currency {
    Currency::new(
        "avalanche-mainnet:avax",
        "Avalanche",
        "AVAX",
        CurrencyKind::Native,
        None,
    )
}

pub fn avax_network() -> Arc<Network> {
    let currency = avax_currency();
    let base = Unit::base(currency.clone(), "nAVAX", "nanoavax");
    let default = Unit::new(currency.clone(), "AVAX", "avalanche", 9);

    Arc::new(Network::new(
        ChainFamily::Avalanche,
        "avalanche-mainnet",
        "mainnet",
        true,
        2,
        1,
        AddressScheme::Native,
        SyncMode::ApiOnly,
        currency.clone(),
        vec![CurrencyAssociation {
            currency,
            base_unit: base.clone(),
            default_unit: base.clone(),
            units: vec![base.clone(), default],
        }],
        ChainParams::Avalanche(AvalancheNetworkParams::mainnet()),
        vec![NetworkFee::new(2_000, Amount::from_u64(base, 1_000_000))],
    ))
}

pub fn eth_currency() -> Currency {
    Currency::new("ethereum-mainnet:eth", "Ether", "ETH", CurrencyKind::Native, None)
}

pub fn eth_network() -> Arc<Network> {
    let currency = eth_currency();
    let base = Unit::base(currency.clone(), "WEI", "wei");
    let default = Unit::new(currency.clone(), "ETH", "ether", 18);

    Arc::new(Network::new(
        ChainFamily::Ethereum,
        "ethereum-mainnet",
        "mainnet",
        true,
        15,
        6,
        AddressScheme::Native,
        SyncMode::ApiOnly,
        currency.clone(),
        vec![CurrencyAssociation {
            currency,
            base_unit: base.clone(),
            default_unit: default.clone(),
            units: vec![base.clone(), default],
        }],
        ChainParams::Ethereum { chain_id: 1 },
        vec![NetworkFee::new(15_000, Amount::from_u64(base, 20_000_000_000))],
    ))
}

/// A scripted indexer.  `get_transfers` returns the configured bundles
/// whose endpoints intersect the requested addresses, records every call,
/// and can register a late-discovered address on the wallet the first time
/// it is asked.
pub struct MockClient {
    pub height: AtomicU64,
    pub bundles: Mutex<Vec<TransferBundle>>,
    pub transfers_fail: AtomicBool,
    pub submit_success: AtomicBool,
    pub fee_cost_units: AtomicU64,
    pub fee_attributes: Mutex<Vec<(String, String)>>,
    pub transfer_calls: Mutex<Vec<Vec<String>>>,
    pub discovers: OnceLock<(Arc<Wallet>, String)>,
}

impl MockClient {
    pub fn new(height: u64) -> Arc<Self> {
        Arc::new(MockClient {
            height: AtomicU64::new(height),
            bundles: Mutex::new(Vec::new()),
            transfers_fail: AtomicBool::new(false),
            submit_success: AtomicBool::new(true),
            fee_cost_units: AtomicU64::new(21_000),
            fee_attributes: Mutex::new(Vec::new()),
            transfer_calls: Mutex::new(Vec::new()),
            discovers: OnceLock::new(),
        })
    }

    pub fn push_bundle(&self, bundle: TransferBundle) {
        self.bundles.lock().unwrap().push(bundle);
    }

    pub fn transfer_call_count(&self) -> usize {
        self.transfer_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Client for MockClient {
    async fn get_block_number(&self) -> Result<BlockNumberReply, ClientError> {
        Ok(BlockNumberReply {
            block_number: self.height.load(Ordering::SeqCst),
            verified_block_hash: None,
        })
    }

    async fn get_transfers(
        &self,
        addresses: &[String],
        _beg_block: u64,
        _end_block: u64,
    ) -> Result<Vec<TransferBundle>, ClientError> {
        let first_call = {
            let mut calls = self.transfer_calls.lock().unwrap();
            calls.push(addresses.to_vec());
            calls.len() == 1
        };

        if self.transfers_fail.load(Ordering::SeqCst) {
            return Err(ClientError("indexer unavailable".into()));
        }

        // Simulate address discovery: the first query surfaces a transfer
        // that teaches the wallet a new address.
        if first_call {
            if let Some((wallet, address)) = self.discovers.get() {
                wallet.register_address(address.clone());
            }
        }

        let bundles = self
            .bundles
            .lock()
            .unwrap()
            .iter()
            .filter(|b| {
                addresses.iter().any(|a| a == &b.from || a == &b.to)
            })
            .cloned()
            .collect();
        Ok(bundles)
    }

    async fn get_transactions(
        &self,
        _addresses: &[String],
        _beg_block: u64,
        _end_block: u64,
    ) -> Result<Vec<TransactionBundle>, ClientError> {
        Ok(Vec::new())
    }

    async fn submit_transaction(
        &self,
        identifier: &str,
        _serialization: &[u8],
    ) -> Result<SubmitReply, ClientError> {
        if self.submit_success.load(Ordering::SeqCst) {
            Ok(SubmitReply {
                identifier: identifier.to_string(),
                hash: None,
            })
        } else {
            Err(ClientError("rejected".into()))
        }
    }

    async fn estimate_transaction_fee(
        &self,
        _serialization: &[u8],
        _hash_hex: &str,
    ) -> Result<FeeEstimateReply, ClientError> {
        Ok(FeeEstimateReply {
            cost_units: self.fee_cost_units.load(Ordering::SeqCst),
            attributes: self.fee_attributes.lock().unwrap().clone(),
        })
    }
}

/// Captures every event, for ordering and payload assertions.
#[derive(Default)]
pub struct RecordingListener {
    pub manager_events: Mutex<Vec<ManagerEvent>>,
    pub wallet_events: Mutex<Vec<WalletEvent>>,
    pub transfer_events: Mutex<Vec<TransferEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingListener::default())
    }

    pub fn manager_event_count(&self) -> usize {
        self.manager_events.lock().unwrap().len()
    }

    pub fn last_fee_estimate(&self) -> Option<WalletEvent> {
        self.wallet_events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|event| matches!(event, WalletEvent::FeeBasisEstimated { .. }))
            .cloned()
    }
}

impl Listener for RecordingListener {
    fn manager_event(&self, event: ManagerEvent) {
        self.manager_events.lock().unwrap().push(event);
    }

    fn wallet_event(&self, _wallet: &Arc<Wallet>, event: WalletEvent) {
        self.wallet_events.lock().unwrap().push(event);
    }

    fn transfer_event(&self, _wallet: &Arc<Wallet>, _transfer: &Arc<Transfer>, event: TransferEvent) {
        self.transfer_events.lock().unwrap().push(event);
    }
}

/// Poll until `predicate` holds or the timeout lapses.
pub async fn wait_for(predicate: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    predicate()
}
