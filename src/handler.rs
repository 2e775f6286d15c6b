//! Chain handler dispatch: one uniform operation set, implemented per chain
//! family.
//!
//! The dispatch table of the original design becomes a sealed enum, one
//! variant per family carrying that family's private state, and every
//! polymorphic call is a `match`.  Handlers never panic on bad input; they
//! return success/failure with structured errors, and the sync engine
//! skips what it cannot recover.

use eyre::{eyre, Result};
use k256::ecdsa::SigningKey;
use std::sync::Arc;

use crate::account::Account;
use crate::address::Address;
use crate::avax::network::AvalancheNetworkParams;
use crate::avax::transaction::{AvalancheFeeBasis, AvalancheTransaction, Utxo};
use crate::client::{
    TransactionBundle, TransferBundle, TRANSACTION_BUNDLE_VERSION_CURRENT,
    TRANSFER_BUNDLE_VERSION_CURRENT,
};
use crate::currency::{Amount, Currency};
use crate::error::{NotYetImplemented, ParseError};
use crate::eth::account as eth_account;
use crate::eth::transaction::EthereumTransaction;
use crate::fee::FeeBasis;
use crate::file_service::FileService;
use crate::network::{ChainFamily, ChainParams, Network, NetworkFee};
use crate::transfer::{OriginatingTransaction, Transfer, TransferDirection, TransferState};
use crate::txhash::TxHash;
use crate::wallet::Wallet;

/// File-service type names.
pub const FILE_SERVICE_TYPE_TRANSFER: &str = "transfer";
pub const FILE_SERVICE_TYPE_TRANSACTION: &str = "transaction";

/// Default gas limit for a plain value transfer on gas chains.
const GAS_LIMIT_TRANSFER: u64 = 21_000;

/// Safety margin applied to dry-run cost numbers, in percent.
const FEE_ESTIMATE_MARGIN_PERCENT: u64 = 10;

/// Whether a key-import sweep is possible on this wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperStatus {
    Supported,
    UnsupportedCurrency,
    InvalidKey,
    InvalidArguments,
}

/// Handle for a peer-to-peer sync manager.  Both families here are
/// API-synced, so none is ever constructed.
#[derive(Debug)]
pub struct P2pManager;

/// Which client query the sync engine issues for this family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryBy {
    Transfers,
    Transactions,
}

/// The outcome of `estimate_fee_basis`.
pub enum FeeEstimateOutcome {
    /// Answered synchronously.
    Estimated(FeeBasis),
    /// The handler prepared a dry-run; the manager must round-trip it
    /// through the client and deliver the answer via
    /// `recover_fee_basis_from_fee_estimate`, keyed by the caller's cookie.
    Deferred {
        serialization: Vec<u8>,
        hash_hex: String,
        initial_fee_basis: FeeBasis,
    },
}

/// What recovering one bundle produced, so the manager can fire events.
pub struct BundleRecovery {
    pub transfer: Arc<Transfer>,
    pub is_new: bool,
    pub state_change: Option<(TransferState, TransferState)>,
}

/// Per-family transaction assembly inputs for `create_transfer`.
pub enum TransferAssembly<'a> {
    Avalanche { utxos: &'a [Utxo], memo: &'a str },
    Ethereum { nonce: u64, data: Vec<u8> },
}

// ============================================================================
// Dispatch
// ============================================================================

/// The sealed per-family dispatch.
pub enum ChainHandler {
    Avalanche(AvaxHandler),
    Ethereum(EthHandler),
}

pub struct AvaxHandler {
    pub params: AvalancheNetworkParams,
}

pub struct EthHandler {
    pub chain_id: u64,
}

impl ChainHandler {
    /// Install the handler for a network's family; part of manager startup.
    pub fn for_network(network: &Network) -> Self {
        match network.params() {
            ChainParams::Avalanche(params) => ChainHandler::Avalanche(AvaxHandler {
                params: params.clone(),
            }),
            ChainParams::Ethereum { chain_id } => ChainHandler::Ethereum(EthHandler {
                chain_id: *chain_id,
            }),
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            ChainHandler::Avalanche(_) => ChainFamily::Avalanche,
            ChainHandler::Ethereum(_) => ChainFamily::Ethereum,
        }
    }

    /// Both families here sync by indexer transfer records.
    pub fn query_by(&self) -> QueryBy {
        QueryBy::Transfers
    }

    /// The event descriptors this family's handler may emit.
    pub fn event_types(&self) -> &'static [&'static str] {
        &[
            "announce-block-number",
            "announce-transfers",
            "announce-transactions",
            "announce-submit",
            "announce-estimate-fee",
        ]
    }

    /// The file service for `(base, currency, network)`, with
    /// this family's entity types registered.
    pub fn create_file_service(
        &self,
        base_path: &std::path::Path,
        currency_name: &str,
        network_name: &str,
    ) -> Result<FileService> {
        let mut service = FileService::new(base_path, currency_name, network_name)?;
        service.register_type(FILE_SERVICE_TYPE_TRANSFER, TRANSFER_BUNDLE_VERSION_CURRENT)?;
        service.register_type(
            FILE_SERVICE_TYPE_TRANSACTION,
            TRANSACTION_BUNDLE_VERSION_CURRENT,
        )?;
        Ok(service)
    }

    /// No P2P manager for API-only families.
    pub fn create_p2p_manager(&self) -> Option<P2pManager> {
        None
    }

    /// The wallet for `currency`, bound to the account's
    /// primary address on this family.
    pub fn create_wallet(
        &self,
        network: &Arc<Network>,
        account: &Account,
        currency: &Currency,
    ) -> Result<Arc<Wallet>> {
        let unit = network
            .unit_as_default(currency)
            .ok_or_else(|| eyre!("currency {} unknown on {}", currency, network.name()))?;
        let unit_for_fee = network
            .unit_as_default(network.native_currency())
            .ok_or_else(|| eyre!("native currency missing units"))?;

        Ok(Arc::new(Wallet::new(
            network.clone(),
            unit,
            unit_for_fee,
            account.primary_address(self.family()),
            None,
            None,
        )))
    }

    /// Build a transfer plus its originating chain transaction.
    pub fn create_transfer(
        &self,
        wallet: &Wallet,
        target: Address,
        amount: Amount,
        fee_basis: FeeBasis,
        attributes: Vec<(String, String)>,
        assembly: TransferAssembly<'_>,
    ) -> Result<Arc<Transfer>> {
        let source = *wallet.primary_address();

        let originating = match (self, assembly) {
            (ChainHandler::Avalanche(handler), TransferAssembly::Avalanche { utxos, memo }) => {
                let avax_fee = match &fee_basis {
                    FeeBasis::Fixed {
                        fee_per_operation,
                        operations,
                    } => AvalancheFeeBasis {
                        fee_per_operation: fee_per_operation.value_as_u64()?,
                        operations: *operations,
                    },
                    other => return Err(eyre!("wrong fee basis for avalanche: {:?}", other)),
                };

                // The asset travels with the UTXOs being spent.
                let asset = utxos
                    .first()
                    .map(|utxo| utxo.asset)
                    .ok_or_else(|| eyre!("no utxos to spend"))?;

                let transaction = AvalancheTransaction::create(
                    source.as_avalanche()?,
                    target.as_avalanche()?,
                    source.as_avalanche()?, // change returns to the source
                    asset,
                    amount.value_as_u64()?,
                    avax_fee,
                    memo,
                    utxos,
                    handler.params.clone(),
                )?;
                OriginatingTransaction::Avalanche(transaction)
            }

            (ChainHandler::Ethereum(handler), TransferAssembly::Ethereum { nonce, data }) => {
                let (gas_limit, gas_price) = match &fee_basis {
                    FeeBasis::Gas { limit, price } => {
                        (*limit, price.value_as_u64().map(alloy::primitives::U256::from)?)
                    }
                    other => return Err(eyre!("wrong fee basis for ethereum: {:?}", other)),
                };

                if amount.is_negative() {
                    return Err(eyre!("cannot send a negative amount"));
                }
                let transaction = EthereumTransaction::new(
                    nonce,
                    gas_price,
                    gas_limit,
                    target.as_ethereum()?,
                    amount.value().into_raw(),
                    data,
                    handler.chain_id,
                );
                OriginatingTransaction::Ethereum(transaction)
            }

            _ => return Err(eyre!("assembly does not match chain family")),
        };

        let transfer = Arc::new(Transfer::new(
            wallet.unit().clone(),
            wallet.unit_for_fee().clone(),
            source,
            target,
            amount,
            TransferDirection::Sent,
            Some(fee_basis),
            Some(originating),
        ));
        transfer.set_attributes(attributes);
        Ok(transfer)
    }

    /// Sign with the seed-derived key; fills the transfer's
    /// serialization and hash.
    pub fn sign_transaction_with_seed(
        &self,
        account: &Account,
        transfer: &Arc<Transfer>,
        seed: &[u8; 64],
    ) -> bool {
        match self {
            ChainHandler::Avalanche(_) => {
                let avax_account = account.avalanche().clone();
                let hash = transfer.with_originating(|originating| match originating {
                    Some(OriginatingTransaction::Avalanche(transaction)) => transaction
                        .serialize_for_submission(&avax_account, seed)
                        .map(|_| transaction.hash())
                        .ok()
                        .flatten(),
                    _ => None,
                });
                match hash {
                    Some(hash) => {
                        transfer.set_hash(TxHash::Avalanche(hash));
                        true
                    }
                    None => false,
                }
            }

            ChainHandler::Ethereum(_) => {
                let key = match eth_account::derive_signing_key(seed) {
                    Ok(key) => key,
                    Err(err) => {
                        tracing::warn!(error = %err, "key derivation failed");
                        return false;
                    }
                };
                self.sign_transaction_with_key(transfer, &key)
            }
        }
    }

    /// Sign with an explicit private key.
    pub fn sign_transaction_with_key(&self, transfer: &Arc<Transfer>, key: &SigningKey) -> bool {
        match self {
            // The Avalanche path re-derives from the seed; keyed signing is
            // not wired in the original either.
            ChainHandler::Avalanche(_) => false,

            ChainHandler::Ethereum(_) => {
                let hash = transfer.with_originating(|originating| match originating {
                    Some(OriginatingTransaction::Ethereum(transaction)) => {
                        transaction.sign(key).ok().and_then(|_| transaction.hash())
                    }
                    _ => None,
                });
                match hash {
                    Some(hash) => {
                        transfer.set_hash(TxHash::Ethereum(hash));
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// The largest (or smallest) sendable amount given `fee`.
    /// Returns `(limit, need_estimate, zero_is_insufficient_funds)`.
    pub fn estimate_limit(
        &self,
        wallet: &Wallet,
        as_maximum: bool,
        network_fee: &NetworkFee,
    ) -> (Amount, bool, bool) {
        let balance = wallet.balance();
        let zero = Amount::zero(wallet.unit().clone());

        if !as_maximum {
            return (zero, false, false);
        }

        match self {
            // Maximum is the balance; a precise answer would subtract the
            // fee, which needs an estimate.
            ChainHandler::Avalanche(_) => (balance, false, false),

            ChainHandler::Ethereum(_) => {
                let fee = network_fee
                    .price_per_cost_factor
                    .checked_mul_u64(GAS_LIMIT_TRANSFER)
                    .unwrap_or_else(|_| zero.clone());

                match balance.checked_sub(&fee) {
                    Ok(limit) if !limit.is_negative() => (limit, false, true),
                    _ => (zero, false, true),
                }
            }
        }
    }

    /// A fee basis, synchronously or deferred through the
    /// indexer's dry run.
    pub fn estimate_fee_basis(
        &self,
        _wallet: &Wallet,
        target: &Address,
        amount: &Amount,
        network_fee: &NetworkFee,
    ) -> Result<FeeEstimateOutcome> {
        match self {
            // Avalanche fees are fixed; answer immediately.
            ChainHandler::Avalanche(_) => Ok(FeeEstimateOutcome::Estimated(FeeBasis::Fixed {
                fee_per_operation: network_fee.price_per_cost_factor.clone(),
                operations: 1,
            })),

            ChainHandler::Ethereum(handler) => {
                let initial = FeeBasis::Gas {
                    limit: GAS_LIMIT_TRANSFER,
                    price: network_fee.price_per_cost_factor.clone(),
                };

                // The dry-run payload: an unsigned transfer to the target.
                let transaction = EthereumTransaction::new(
                    0,
                    alloy::primitives::U256::from(
                        network_fee.price_per_cost_factor.value_as_u64().unwrap_or(0),
                    ),
                    GAS_LIMIT_TRANSFER,
                    target.as_ethereum()?,
                    alloy::primitives::U256::from(amount.value_as_u64().unwrap_or(0)),
                    Vec::new(),
                    handler.chain_id,
                );

                Ok(FeeEstimateOutcome::Deferred {
                    serialization: transaction.encode_unsigned(),
                    hash_hex: String::new(), // unsigned, so no hash yet
                    initial_fee_basis: initial,
                })
            }
        }
    }

    /// Persist a bundle through the file
    /// service.  Families with non-trivial encodings would override; these
    /// use the versioned default.
    pub fn save_transfer_bundle(&self, service: &FileService, bundle: &TransferBundle) {
        let identifier = crate::file_service::transfer_identifier(&bundle.uids);
        if let Err(err) = service.save(FILE_SERVICE_TYPE_TRANSFER, &identifier, &bundle.encode()) {
            tracing::warn!(uids = %bundle.uids, error = %err, "failed to persist transfer bundle");
        }
    }

    pub fn save_transaction_bundle(&self, service: &FileService, bundle: &TransactionBundle) {
        let identifier = crate::file_service::transaction_identifier(&bundle.serialization);
        if let Err(err) =
            service.save(FILE_SERVICE_TYPE_TRANSACTION, &identifier, &bundle.encode())
        {
            tracing::warn!(error = %err, "failed to persist transaction bundle");
        }
    }

    /// Recover transfers by parsing a raw transaction.
    /// Neither family here syncs by transaction bundles.
    pub fn recover_transfers_from_transaction_bundle(
        &self,
        _wallet: &Arc<Wallet>,
        _account: &Account,
        _bundle: &TransactionBundle,
    ) -> Result<Vec<BundleRecovery>> {
        Err(NotYetImplemented("recover transfers from a raw transaction").into())
    }

    /// Materialize one transfer from an indexer record.
    pub fn recover_transfer_from_transfer_bundle(
        &self,
        wallet: &Arc<Wallet>,
        account: &Account,
        bundle: &TransferBundle,
    ) -> Result<BundleRecovery> {
        match self {
            ChainHandler::Avalanche(handler) => {
                self.recover_transfer_avalanche(handler, wallet, account, bundle)
            }
            ChainHandler::Ethereum(_) => self.recover_transfer_ethereum(wallet, account, bundle),
        }
    }

    fn recover_transfer_avalanche(
        &self,
        handler: &AvaxHandler,
        wallet: &Arc<Wallet>,
        account: &Account,
        bundle: &TransferBundle,
    ) -> Result<BundleRecovery> {
        let amount: u64 = bundle
            .amount
            .parse()
            .map_err(|_| ParseError::Numeric(bundle.amount.clone()))?;
        let fee: u64 = match &bundle.fee {
            Some(fee) => fee.parse().unwrap_or(0),
            None => 0,
        };

        // Sentinel counterparties (`unknown`, `__fee__`) parse non-strictly;
        // a burn companion arrives with target `unknown` and the same hash
        // as its ordinary sibling.
        let source = handler.params.address_from_string(&bundle.from, false)?;
        let target = handler.params.address_from_string(&bundle.to, false)?;

        let hash = TxHash::from_string(ChainFamily::Avalanche, &bundle.hash).ok();
        let state = bundle.transfer_state();
        let fee_basis = FeeBasis::Fixed {
            fee_per_operation: Amount::from_u64(wallet.unit_for_fee().clone(), fee),
            operations: 1,
        };

        if let Some(transfer) = wallet.transfer_by_hash_or_uids(hash.as_ref(), &bundle.uids) {
            transfer.set_uids(bundle.uids.clone());
            if state.is_included() {
                transfer.set_confirmed_fee_basis(fee_basis);
            }
            let state_change = transfer.set_state(state);
            return Ok(BundleRecovery {
                transfer,
                is_new: false,
                state_change,
            });
        }

        let direction = direction_for(
            account.has_address(&Address::Avalanche(source)),
            account.has_address(&Address::Avalanche(target)),
        );

        let transaction = AvalancheTransaction::from_bundle(
            source,
            target,
            amount,
            AvalancheFeeBasis::new(fee),
            handler.params.clone(),
        );

        let transfer = Arc::new(Transfer::new(
            wallet.unit().clone(),
            wallet.unit_for_fee().clone(),
            Address::Avalanche(source),
            Address::Avalanche(target),
            Amount::from_u64(wallet.unit().clone(), amount),
            direction,
            Some(fee_basis.clone()),
            Some(OriginatingTransaction::Avalanche(transaction)),
        ));

        transfer.set_uids(bundle.uids.clone());
        if let Some(hash) = hash {
            transfer.set_hash(hash);
        }
        if state.is_included() {
            transfer.set_confirmed_fee_basis(fee_basis);
        }
        let state_change = transfer.set_state(state);
        transfer.set_attributes(bundle.attributes.clone());

        wallet.add_transfer(transfer.clone());

        Ok(BundleRecovery {
            transfer,
            is_new: true,
            state_change,
        })
    }

    fn recover_transfer_ethereum(
        &self,
        wallet: &Arc<Wallet>,
        account: &Account,
        bundle: &TransferBundle,
    ) -> Result<BundleRecovery> {
        let amount = Amount::from_string(wallet.unit().clone(), &bundle.amount)?;

        let source = Address::from_string_for(wallet.network(), &bundle.from, false)?;
        let target = Address::from_string_for(wallet.network(), &bundle.to, false)?;

        let hash = TxHash::from_string(ChainFamily::Ethereum, &bundle.hash).ok();
        let state = bundle.transfer_state();

        // The gas actually used and paid, from the universal attribute
        // vocabulary, with the flat fee string as fallback.
        let gas_used: u64 = bundle
            .attribute("gasUsed")
            .and_then(|v| v.parse().ok())
            .unwrap_or(GAS_LIMIT_TRANSFER);
        let gas_price: u64 = bundle
            .attribute("gasPrice")
            .and_then(|v| v.parse().ok())
            .or_else(|| {
                bundle
                    .fee
                    .as_deref()
                    .and_then(|fee| fee.parse::<u64>().ok())
                    .map(|fee| fee / gas_used.max(1))
            })
            .unwrap_or(0);

        let fee_basis = FeeBasis::Gas {
            limit: gas_used,
            price: Amount::from_u64(wallet.unit_for_fee().clone(), gas_price),
        };

        if let Some(transfer) = wallet.transfer_by_hash_or_uids(hash.as_ref(), &bundle.uids) {
            transfer.set_uids(bundle.uids.clone());
            if state.is_included() {
                transfer.set_confirmed_fee_basis(fee_basis);
            }
            let state_change = transfer.set_state(state);
            return Ok(BundleRecovery {
                transfer,
                is_new: false,
                state_change,
            });
        }

        let direction = direction_for(account.has_address(&source), account.has_address(&target));

        let transfer = Arc::new(Transfer::new(
            wallet.unit().clone(),
            wallet.unit_for_fee().clone(),
            source,
            target,
            amount,
            direction,
            Some(fee_basis.clone()),
            None,
        ));

        transfer.set_uids(bundle.uids.clone());
        if let Some(hash) = hash {
            transfer.set_hash(hash);
        }
        if state.is_included() {
            transfer.set_confirmed_fee_basis(fee_basis);
        }
        let state_change = transfer.set_state(state);
        transfer.set_attributes(bundle.attributes.clone());

        wallet.add_transfer(transfer.clone());

        Ok(BundleRecovery {
            transfer,
            is_new: true,
            state_change,
        })
    }

    /// Assemble the final fee basis from a dry-run reply,
    /// applying the safety margin to the returned cost numbers.
    pub fn recover_fee_basis_from_fee_estimate(
        &self,
        price_per_cost_factor: &Amount,
        initial_fee_basis: Option<&FeeBasis>,
        cost_units: u64,
        attributes: &[(String, String)],
    ) -> Result<FeeBasis> {
        match self {
            ChainHandler::Avalanche(_) => {
                // Fixed-fee family: the dry run cannot change the answer.
                Ok(FeeBasis::Fixed {
                    fee_per_operation: price_per_cost_factor.clone(),
                    operations: 1,
                })
            }

            ChainHandler::Ethereum(_) => {
                let consumed = attributes
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("consumed_gas") || k.eq_ignore_ascii_case("gasUsed"))
                    .and_then(|(_, v)| v.parse::<u64>().ok())
                    .unwrap_or(cost_units);

                let limit = with_margin(consumed.max(cost_units));

                let price = match initial_fee_basis {
                    Some(FeeBasis::Gas { price, .. }) => price.clone(),
                    _ => price_per_cost_factor.clone(),
                };

                Ok(FeeBasis::Gas { limit, price })
            }
        }
    }

    /// Sweeping needs UTXO-set introspection neither family
    /// provides over an API-only sync.
    pub fn validate_sweeper_supported(&self) -> SweeperStatus {
        SweeperStatus::UnsupportedCurrency
    }

    /// See [`Self::validate_sweeper_supported`].
    pub fn create_sweeper(&self) -> Result<()> {
        Err(NotYetImplemented("wallet sweeper").into())
    }
}

fn direction_for(from_ours: bool, to_ours: bool) -> TransferDirection {
    match (from_ours, to_ours) {
        (true, true) => TransferDirection::Recovered,
        (true, false) => TransferDirection::Sent,
        _ => TransferDirection::Received,
    }
}

fn with_margin(cost: u64) -> u64 {
    cost.saturating_add(cost.saturating_mul(FEE_ESTIMATE_MARGIN_PERCENT) / 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BundleStatus;
    use crate::currency::{CurrencyKind, Unit};
    use crate::network::{AddressScheme, CurrencyAssociation, SyncMode};

    const PAPER_KEY: &str =
        "patient doctor olympic frog force glimpse endless antenna online dragon bargain someone";

    fn avax_currency() -> Currency {
        Currency::new("avalanche-mainnet:avax", "Avalanche", "AVAX", CurrencyKind::Native, None)
    }

    fn avax_network() -> Arc<Network> {
        let currency = avax_currency();
        let base = Unit::base(currency.clone(), "nAVAX", "nanoavax");
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
                units: vec![base.clone()],
            }],
            ChainParams::Avalanche(AvalancheNetworkParams::mainnet()),
            vec![NetworkFee::new(2_000, Amount::from_u64(base, 1_000_000))],
        ))
    }

    fn account() -> Account {
        Account::from_paper_key(PAPER_KEY, 0, "account-1").unwrap()
    }

    fn bundle(uids: &str, to: &str, from: &str, amount: &str) -> TransferBundle {
        TransferBundle {
            status: BundleStatus::Included,
            uids: uids.into(),
            hash: TxHash::Avalanche([9; 32]).to_string(),
            identifier: "id".into(),
            from: from.into(),
            to: to.into(),
            amount: amount.into(),
            currency: "avax".into(),
            fee: Some("1000000".into()),
            block_timestamp: 1_700_000_000,
            block_number: 100,
            block_confirmations: 2,
            block_transaction_index: 0,
            block_hash: "bh".into(),
            attributes: vec![],
        }
    }

    #[test]
    fn test_create_wallet_binds_primary_address() {
        let network = avax_network();
        let account = account();
        let handler = ChainHandler::for_network(&network);

        let wallet = handler
            .create_wallet(&network, &account, network.native_currency())
            .unwrap();
        assert!(wallet.has_address("X-avax1escwyq2hsznvwth6au3gpc77f225uacvwldgal"));
    }

    #[test]
    fn test_recover_received_transfer() {
        let network = avax_network();
        let account = account();
        let handler = ChainHandler::for_network(&network);
        let wallet = handler
            .create_wallet(&network, &account, network.native_currency())
            .unwrap();

        let ours = "X-avax1escwyq2hsznvwth6au3gpc77f225uacvwldgal";

        // A malformed counterparty is a per-bundle failure, not a panic.
        let recovery = handler.recover_transfer_from_transfer_bundle(
            &wallet,
            &account,
            &bundle("uids-1", ours, "X-avax1not-bech32", "5000"),
        );
        assert!(recovery.is_err());

        let other = crate::avax::address::AvalancheAddress::X([7; 20])
            .to_string_with_hrp("avax")
            .unwrap();
        let recovery = handler
            .recover_transfer_from_transfer_bundle(
                &wallet,
                &account,
                &bundle("uids-1", ours, &other, "5000"),
            )
            .unwrap();

        assert!(recovery.is_new);
        assert_eq!(recovery.transfer.direction(), TransferDirection::Received);
        assert!(recovery.transfer.state().is_included());
        assert_eq!(wallet.balance().value_as_u64().unwrap(), 5_000);
    }

    #[test]
    fn test_recover_is_idempotent_by_uids() {
        let network = avax_network();
        let account = account();
        let handler = ChainHandler::for_network(&network);
        let wallet = handler
            .create_wallet(&network, &account, network.native_currency())
            .unwrap();

        let ours = "X-avax1escwyq2hsznvwth6au3gpc77f225uacvwldgal";
        let other = crate::avax::address::AvalancheAddress::X([7; 20])
            .to_string_with_hrp("avax")
            .unwrap();
        let b = bundle("uids-1", ours, &other, "5000");

        let first = handler
            .recover_transfer_from_transfer_bundle(&wallet, &account, &b)
            .unwrap();
        let second = handler
            .recover_transfer_from_transfer_bundle(&wallet, &account, &b)
            .unwrap();

        assert!(first.is_new);
        assert!(!second.is_new);
        assert!(Arc::ptr_eq(&first.transfer, &second.transfer));
        assert_eq!(wallet.transfer_count(), 1);
    }

    #[test]
    fn test_recover_burn_companion_with_unknown_target() {
        let network = avax_network();
        let account = account();
        let handler = ChainHandler::for_network(&network);
        let wallet = handler
            .create_wallet(&network, &account, network.native_currency())
            .unwrap();

        let ours = "X-avax1escwyq2hsznvwth6au3gpc77f225uacvwldgal";
        let recovery = handler
            .recover_transfer_from_transfer_bundle(
                &wallet,
                &account,
                &bundle("uids-burn", "unknown", ours, "250"),
            )
            .unwrap();

        // Sent to `unknown`: the burn reduces the balance.
        assert_eq!(recovery.transfer.direction(), TransferDirection::Sent);
    }

    #[test]
    fn test_fee_estimate_margin() {
        assert_eq!(with_margin(1000), 1100);
        assert_eq!(with_margin(0), 0);
    }

    #[test]
    fn test_sweeper_unsupported() {
        let network = avax_network();
        let handler = ChainHandler::for_network(&network);
        assert_eq!(
            handler.validate_sweeper_supported(),
            SweeperStatus::UnsupportedCurrency
        );
        assert!(handler.create_sweeper().is_err());
    }
}
