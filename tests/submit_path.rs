//! The sign/submit path and asynchronous fee estimation.

mod common;

use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use multiwallet_core::account::Account;
use multiwallet_core::address::Address;
use multiwallet_core::avax::{AvalancheAddress, Utxo};
use multiwallet_core::fee::FeeBasis;
use multiwallet_core::handler::TransferAssembly;
use multiwallet_core::listener::WalletEvent;
use multiwallet_core::network::{AddressScheme, SyncMode};
use multiwallet_core::transfer::TransferState;
use multiwallet_core::{Amount, WalletManager};

use common::{
    avax_network, eth_network, wait_for, MockClient, RecordingListener, PAPER_KEY,
};

fn avax_manager(
    client: Arc<MockClient>,
    listener: Arc<RecordingListener>,
    path: &std::path::Path,
) -> WalletManager {
    let account = Arc::new(Account::from_paper_key(PAPER_KEY, 0, "account-1").unwrap());
    WalletManager::create(
        listener,
        client,
        account,
        avax_network(),
        SyncMode::ApiOnly,
        AddressScheme::Native,
        path,
    )
    .unwrap()
}

fn our_x_address() -> AvalancheAddress {
    let raw = hex::decode("cc30e2015780a6c72efaef2280e3de4a954e770c").unwrap();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&raw);
    AvalancheAddress::X(bytes)
}

fn sendable_transfer(
    manager: &WalletManager,
) -> (Arc<multiwallet_core::Wallet>, Arc<multiwallet_core::Transfer>) {
    let wallet = manager.primary_wallet().clone();
    let unit = wallet.unit().clone();

    let asset = multiwallet_core::avax::AvalancheNetworkParams::mainnet().blockchain_id;
    let utxos = vec![Utxo::new(
        [1; 32],
        0,
        asset,
        10_000_000_000,
        vec![our_x_address()],
    )];

    let transfer = manager
        .create_transfer(
            &wallet,
            Address::Avalanche(AvalancheAddress::X([5; 20])),
            Amount::from_u64(unit.clone(), 700_000_000),
            FeeBasis::Fixed {
                fee_per_operation: Amount::from_u64(unit, 1_000_000),
                operations: 1,
            },
            vec![],
            TransferAssembly::Avalanche {
                utxos: &utxos,
                memo: "",
            },
        )
        .unwrap();

    (wallet, transfer)
}

#[tokio::test]
async fn sign_then_submit_reaches_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new(1_000);
    let manager = avax_manager(client, RecordingListener::new(), dir.path());

    let (wallet, transfer) = sendable_transfer(&manager);
    assert_eq!(transfer.state(), TransferState::Created);
    assert!(transfer.hash().is_none());

    assert!(manager.sign(&wallet, &transfer, PAPER_KEY));
    assert_eq!(transfer.state(), TransferState::Signed);
    // The hash covers the signature, so it exists only from signing on.
    assert!(transfer.hash().is_some());
    assert!(transfer.serialization().is_some());

    manager.submit_signed(&wallet, &transfer);
    assert!(wait_for(|| transfer.state() == TransferState::Submitted).await);

    // The wallet adopted the transfer; the sent amount and fee left.
    assert_eq!(wallet.transfer_count(), 1);
    assert_eq!(
        wallet.balance().value(),
        alloy::primitives::I256::try_from(-701_000_000i64).unwrap()
    );

    manager.stop();
}

#[tokio::test]
async fn submit_failure_marks_errored_and_keeps_amount() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new(1_000);
    client.submit_success.store(false, Ordering::SeqCst);
    let manager = avax_manager(client, RecordingListener::new(), dir.path());

    let (wallet, transfer) = sendable_transfer(&manager);
    manager.submit(&wallet, &transfer, PAPER_KEY);

    assert!(wait_for(|| transfer.state().is_errored()).await);

    // The attempted amount is preserved for the host to explain, while the
    // balance no longer carries the effect.
    assert_eq!(transfer.amount().value_as_u64().unwrap(), 700_000_000);
    assert!(wallet.balance().is_zero());

    manager.stop();
}

#[tokio::test]
async fn sign_with_wrong_paper_key_still_signs_consistently() {
    // Signing derives from whatever seed the host supplies; a different
    // mnemonic yields a different signature but the same state machine.
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new(1_000);
    let manager = avax_manager(client, RecordingListener::new(), dir.path());

    let (wallet, transfer) = sendable_transfer(&manager);
    assert!(!manager.sign(&wallet, &transfer, "garbage mnemonic"));
    assert_eq!(transfer.state(), TransferState::Created);

    manager.stop();
}

#[tokio::test]
async fn deferred_fee_estimate_applies_margin() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new(1_000);
    client.fee_cost_units.store(21_000, Ordering::SeqCst);
    let listener = RecordingListener::new();

    let account = Arc::new(Account::from_paper_key(PAPER_KEY, 0, "account-1").unwrap());
    let manager = WalletManager::create(
        listener.clone(),
        client,
        account,
        eth_network(),
        SyncMode::ApiOnly,
        AddressScheme::Native,
        dir.path(),
    )
    .unwrap();

    let wallet = manager.primary_wallet().clone();
    let target = Address::Ethereum(
        alloy::primitives::Address::from_str("0x3535353535353535353535353535353535353535")
            .unwrap(),
    );
    let fee = manager.network().default_fee().unwrap();

    manager.estimate_fee_basis(
        &wallet,
        7,
        &target,
        &Amount::from_u64(wallet.unit().clone(), 1),
        &fee,
    );

    assert!(wait_for(|| listener.last_fee_estimate().is_some()).await);

    match listener.last_fee_estimate().unwrap() {
        WalletEvent::FeeBasisEstimated {
            cookie,
            success,
            basis: Some(FeeBasis::Gas { limit, .. }),
        } => {
            assert_eq!(cookie, 7);
            assert!(success);
            // 21000 plus the ten percent dry-run margin.
            assert_eq!(limit, 23_100);
        }
        other => panic!("unexpected estimate event: {:?}", other),
    }

    manager.stop();
}

#[tokio::test]
async fn avalanche_fee_estimate_is_synchronous() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new(1_000);
    let listener = RecordingListener::new();
    let manager = avax_manager(client, listener.clone(), dir.path());

    let wallet = manager.primary_wallet().clone();
    let fee = manager.network().default_fee().unwrap();

    manager.estimate_fee_basis(
        &wallet,
        9,
        &Address::Avalanche(AvalancheAddress::X([5; 20])),
        &Amount::from_u64(wallet.unit().clone(), 100),
        &fee,
    );

    // No round trip: the event is already there.
    match listener.last_fee_estimate().unwrap() {
        WalletEvent::FeeBasisEstimated {
            cookie,
            success,
            basis: Some(FeeBasis::Fixed { fee_per_operation, .. }),
        } => {
            assert_eq!(cookie, 9);
            assert!(success);
            assert_eq!(fee_per_operation.value_as_u64().unwrap(), 1_000_000);
        }
        other => panic!("unexpected estimate event: {:?}", other),
    }

    manager.stop();
}

#[tokio::test]
async fn estimate_limit_maximum() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new(1_000);
    let manager = avax_manager(client, RecordingListener::new(), dir.path());

    let wallet = manager.primary_wallet().clone();
    let fee = manager.network().default_fee().unwrap();
    let target = Address::Avalanche(AvalancheAddress::X([5; 20]));

    let (maximum, need_estimate, zero_insufficient) =
        manager.estimate_limit(&wallet, true, &target, &fee);
    assert!(maximum.is_zero()); // empty wallet
    assert!(!need_estimate);
    assert!(!zero_insufficient);

    let (minimum, _, _) = manager.estimate_limit(&wallet, false, &target, &fee);
    assert!(minimum.is_zero());

    manager.stop();
}
