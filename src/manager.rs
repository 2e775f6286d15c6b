//! The wallet manager: the ownership root for one account on one network.
//!
//! A manager exclusively owns its network and account references, its
//! wallet list, its sync engine, its file service and its chain handler.
//! One cooperative handler task per manager dispatches timer ticks and
//! posted completions in FIFO order; client calls are suspension points
//! whose replies re-enter through the `announce_*` methods.

use eyre::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

use crate::account::Account;
use crate::address::Address;
use crate::client::{Client, TransactionBundle, TransferBundle};
use crate::currency::{Amount, Currency};
use crate::error::DisconnectReason;
use crate::fee::FeeBasis;
use crate::file_service::FileService;
use crate::handler::{
    BundleRecovery, ChainHandler, FeeEstimateOutcome, SweeperStatus, TransferAssembly,
    FILE_SERVICE_TYPE_TRANSFER,
};
use crate::listener::{
    Cookie, Listener, ManagerEvent, NetworkEvent, SyncStoppedReason, TransferEvent, WalletEvent,
    WalletManagerState,
};
use crate::network::{AddressScheme, Network, NetworkFee, SyncMode};
use crate::sync::{tick_period, CallbackState, QryState, SyncEvent};
use crate::transfer::{Transfer, TransferDirection, TransferState};
use crate::txhash::TxHash;
use crate::wallet::Wallet;

/// A wallet manager handle.  Cloning shares the underlying manager.
#[derive(Clone)]
pub struct WalletManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    network: Arc<Network>,
    account: Arc<Account>,
    client: Arc<dyn Client>,
    listener: Arc<dyn Listener>,
    handler: ChainHandler,
    sync_mode: SyncMode,
    address_scheme: AddressScheme,
    base_path: PathBuf,
    file_service: FileService,

    state: Mutex<WalletManagerState>,
    wallets: Mutex<Vec<Arc<Wallet>>>,
    primary_wallet: Arc<Wallet>,
    qry: Mutex<QryState>,
    events: mpsc::UnboundedSender<SyncEvent>,

    /// Self-reference for handing strong clones to spawned client calls.
    weak_self: Weak<ManagerInner>,
}

impl WalletManager {
    /// Create the manager, its file service, its primary
    /// wallet, and its handler task; persisted bundles are recovered into
    /// transfers before the first sync.
    pub fn create(
        listener: Arc<dyn Listener>,
        client: Arc<dyn Client>,
        account: Arc<Account>,
        network: Arc<Network>,
        sync_mode: SyncMode,
        address_scheme: AddressScheme,
        base_path: impl AsRef<Path>,
    ) -> Result<WalletManager> {
        let handler = ChainHandler::for_network(&network);

        let file_service = handler.create_file_service(
            base_path.as_ref(),
            network.native_currency().code(),
            network.name(),
        )?;

        let primary_wallet =
            handler.create_wallet(&network, &account, network.native_currency())?;

        let qry = QryState::new(0, network.height(), network.confirmation_period_secs());

        let (events, receiver) = mpsc::unbounded_channel();

        let inner = Arc::new_cyclic(|weak_self| ManagerInner {
            network,
            account,
            client,
            listener,
            handler,
            sync_mode,
            address_scheme,
            base_path: base_path.as_ref().to_path_buf(),
            file_service,
            state: Mutex::new(WalletManagerState::Created),
            wallets: Mutex::new(Vec::new()),
            primary_wallet,
            qry: Mutex::new(qry),
            events,
            weak_self: weak_self.clone(),
        });

        inner.listener.manager_event(ManagerEvent::Created);

        inner.add_wallet(inner.primary_wallet.clone());

        // Recover persisted bundles into transfers before anything syncs.
        inner.load_persisted_transfer_bundles();

        tokio::spawn(ManagerInner::run(inner.clone(), receiver));

        Ok(WalletManager { inner })
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.inner.network
    }

    pub fn account(&self) -> &Arc<Account> {
        &self.inner.account
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.inner.sync_mode
    }

    pub fn address_scheme(&self) -> AddressScheme {
        self.inner.address_scheme
    }

    pub fn base_path(&self) -> &Path {
        &self.inner.base_path
    }

    pub fn state(&self) -> WalletManagerState {
        *self.inner.state.lock().unwrap()
    }

    pub fn primary_wallet(&self) -> &Arc<Wallet> {
        &self.inner.primary_wallet
    }

    pub fn wallets(&self) -> Vec<Arc<Wallet>> {
        self.inner.wallets.lock().unwrap().clone()
    }

    pub fn wallet_for_currency(&self, currency: &Currency) -> Option<Arc<Wallet>> {
        self.inner.wallet_for_currency(currency)
    }

    /// A wallet for an additional (token)
    /// currency known on this network.
    pub fn create_wallet(&self, currency: &Currency) -> Result<Arc<Wallet>> {
        if let Some(existing) = self.inner.wallet_for_currency(currency) {
            return Ok(existing);
        }
        let wallet =
            self.inner
                .handler
                .create_wallet(&self.inner.network, &self.inner.account, currency)?;
        self.inner.add_wallet(wallet.clone());
        Ok(wallet)
    }

    // ========================================================================
    // Connect / disconnect
    // ========================================================================

    pub fn connect(&self) {
        {
            let mut qry = self.inner.qry.lock().unwrap();
            qry.connected = true;
        }
        self.inner.set_state(WalletManagerState::Syncing);

        // Sync immediately rather than waiting out the first tick.
        self.inner.tick();
    }

    /// Disconnect is immediate: in-flight replies are accepted but filtered
    /// by rid; there is no request cancellation.
    pub fn disconnect(&self) {
        {
            let mut qry = self.inner.qry.lock().unwrap();
            qry.connected = false;
        }
        self.inner
            .set_state(WalletManagerState::Disconnected(DisconnectReason::Requested));
    }

    /// Stop the handler task.  The manager is unusable afterwards.
    pub fn stop(&self) {
        let _ = self.inner.events.send(SyncEvent::Stop);
    }

    /// Remove every persisted artifact for `network` under `path`.
    pub fn wipe(network: &Network, path: impl AsRef<Path>) -> Result<()> {
        FileService::new(path, network.native_currency().code(), network.name())?
            .wipe()
            .map_err(Into::into)
    }

    // ========================================================================
    // Transfers: create / sign / submit
    // ========================================================================

    /// Assemble a transfer and its originating chain transaction.
    pub fn create_transfer(
        &self,
        wallet: &Arc<Wallet>,
        target: Address,
        amount: Amount,
        fee_basis: FeeBasis,
        attributes: Vec<(String, String)>,
        assembly: TransferAssembly<'_>,
    ) -> Result<Arc<Transfer>> {
        let transfer = self.inner.handler.create_transfer(
            wallet,
            target,
            amount,
            fee_basis,
            attributes,
            assembly,
        )?;
        self.inner
            .listener
            .transfer_event(wallet, &transfer, TransferEvent::Created);
        Ok(transfer)
    }

    /// Sign with the paper key's seed; on success the transfer becomes
    /// Signed.  The seed never outlives the call.
    pub fn sign(&self, wallet: &Arc<Wallet>, transfer: &Arc<Transfer>, paper_key: &str) -> bool {
        let seed = match Account::derive_seed(paper_key) {
            Ok(seed) => seed,
            Err(err) => {
                tracing::warn!(error = %err, "cannot derive seed");
                return false;
            }
        };

        let success =
            self.inner
                .handler
                .sign_transaction_with_seed(&self.inner.account, transfer, &seed);

        if success {
            self.inner
                .apply_transfer_state(wallet, transfer, TransferState::Signed);
        }
        success
    }

    /// Sign and submit in one step.
    pub fn submit(&self, wallet: &Arc<Wallet>, transfer: &Arc<Transfer>, paper_key: &str) {
        if self.sign(wallet, transfer, paper_key) {
            self.submit_signed(wallet, transfer);
        }
    }

    /// Submit an already-signed transfer: adopt it into the wallet (and the
    /// native wallet when the fee is paid in a different currency), then
    /// hand the serialization to the client.
    pub fn submit_signed(&self, wallet: &Arc<Wallet>, transfer: &Arc<Transfer>) {
        self.inner.submit_signed(wallet, transfer);
    }

    // ========================================================================
    // Estimation
    // ========================================================================

    /// The largest (`as_maximum`) or smallest amount this
    /// wallet can send given `fee`.
    pub fn estimate_limit(
        &self,
        wallet: &Arc<Wallet>,
        as_maximum: bool,
        _target: &Address,
        fee: &NetworkFee,
    ) -> (Amount, bool, bool) {
        self.inner.handler.estimate_limit(wallet, as_maximum, fee)
    }

    /// Estimate the fee basis for a prospective transfer.
    /// Synchronous answers arrive through the listener immediately;
    /// deferred ones after the indexer dry-run, keyed by `cookie`.
    pub fn estimate_fee_basis(
        &self,
        wallet: &Arc<Wallet>,
        cookie: Cookie,
        target: &Address,
        amount: &Amount,
        fee: &NetworkFee,
    ) {
        match self
            .inner
            .handler
            .estimate_fee_basis(wallet, target, amount, fee)
        {
            Ok(FeeEstimateOutcome::Estimated(basis)) => {
                self.inner.listener.wallet_event(
                    wallet,
                    WalletEvent::FeeBasisEstimated {
                        cookie,
                        success: true,
                        basis: Some(basis),
                    },
                );
            }

            Ok(FeeEstimateOutcome::Deferred {
                serialization,
                hash_hex,
                initial_fee_basis,
            }) => {
                let inner = self.inner.clone();
                let price = fee.price_per_cost_factor.clone();
                tokio::spawn(async move {
                    let reply = inner
                        .client
                        .estimate_transaction_fee(&serialization, &hash_hex)
                        .await;
                    let event = match reply {
                        Ok(reply) => SyncEvent::AnnounceFeeEstimate {
                            cookie,
                            success: true,
                            cost_units: reply.cost_units,
                            attributes: reply.attributes,
                            price_per_cost_factor: price,
                            initial_fee_basis: Some(initial_fee_basis),
                        },
                        Err(err) => {
                            tracing::warn!(error = %err, "fee estimation failed");
                            SyncEvent::AnnounceFeeEstimate {
                                cookie,
                                success: false,
                                cost_units: 0,
                                attributes: Vec::new(),
                                price_per_cost_factor: price,
                                initial_fee_basis: Some(initial_fee_basis),
                            }
                        }
                    };
                    let _ = inner.events.send(event);
                });
            }

            Err(err) => {
                tracing::warn!(error = %err, "fee basis estimation failed");
                self.inner.listener.wallet_event(
                    wallet,
                    WalletEvent::FeeBasisEstimated {
                        cookie,
                        success: false,
                        basis: None,
                    },
                );
            }
        }
    }

    // ========================================================================
    // Sweeper
    // ========================================================================

    pub fn validate_sweeper_supported(&self) -> SweeperStatus {
        self.inner.handler.validate_sweeper_supported()
    }

    pub fn create_sweeper(&self) -> Result<()> {
        self.inner.handler.create_sweeper()
    }

    // ========================================================================
    // Announcements (reply entry points)
    // ========================================================================

    pub fn announce_block_number(
        &self,
        success: bool,
        block_number: u64,
        verified_block_hash: Option<String>,
    ) {
        let _ = self.inner.events.send(SyncEvent::AnnounceBlockNumber {
            success,
            block_number,
            verified_block_hash,
        });
    }

    pub fn announce_transfers(
        &self,
        state: CallbackState,
        success: bool,
        bundles: Vec<TransferBundle>,
    ) {
        let _ = self.inner.events.send(SyncEvent::AnnounceTransfers {
            state,
            success,
            bundles,
        });
    }

    pub fn announce_transactions(
        &self,
        state: CallbackState,
        success: bool,
        bundles: Vec<TransactionBundle>,
    ) {
        let _ = self.inner.events.send(SyncEvent::AnnounceTransactions {
            state,
            success,
            bundles,
        });
    }
}

// ============================================================================
// Handler task
// ============================================================================

impl ManagerInner {
    /// A strong self-reference for spawned client calls.  The cycle is
    /// broken because spawned tasks are short-lived.
    fn strong(&self) -> Arc<ManagerInner> {
        self.weak_self.upgrade().expect("manager inner alive")
    }

    async fn run(inner: Arc<ManagerInner>, mut receiver: mpsc::UnboundedReceiver<SyncEvent>) {
        let mut ticker =
            tokio::time::interval(tick_period(inner.network.confirmation_period_secs()));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => inner.tick(),
                event = receiver.recv() => match event {
                    Some(SyncEvent::Stop) | None => break,
                    Some(event) => inner.handle_event(event),
                },
            }
        }

        tracing::debug!(network = %inner.network.name(), "manager handler stopped");
    }

    fn handle_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::AnnounceBlockNumber {
                success,
                block_number,
                verified_block_hash,
            } => self.handle_block_number(success, block_number, verified_block_hash),

            SyncEvent::AnnounceTransfers {
                state,
                success,
                bundles,
            } => self.handle_transfers(state, success, bundles),

            SyncEvent::AnnounceTransactions {
                state,
                success,
                bundles,
            } => self.handle_transactions(state, success, bundles),

            SyncEvent::AnnounceSubmit {
                wallet,
                transfer,
                hash,
                success,
            } => self.handle_submit(wallet, transfer, hash, success),

            SyncEvent::AnnounceFeeEstimate {
                cookie,
                success,
                cost_units,
                attributes,
                price_per_cost_factor,
                initial_fee_basis,
            } => self.handle_fee_estimate(
                cookie,
                success,
                cost_units,
                attributes,
                price_per_cost_factor,
                initial_fee_basis,
            ),

            SyncEvent::Stop => {}
        }
    }

    // ------------------------------------------------------------------------
    // Wallets
    // ------------------------------------------------------------------------

    fn add_wallet(&self, wallet: Arc<Wallet>) {
        self.wallets.lock().unwrap().push(wallet.clone());
        self.listener.wallet_event(&wallet, WalletEvent::Created);
        self.listener.manager_event(ManagerEvent::WalletAdded);
    }

    fn wallet_for_currency(&self, currency: &Currency) -> Option<Arc<Wallet>> {
        self.wallets
            .lock()
            .unwrap()
            .iter()
            .find(|wallet| wallet.currency() == currency)
            .cloned()
    }

    fn set_state(&self, new: WalletManagerState) {
        let old = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, new)
        };
        if old != new {
            self.listener
                .manager_event(ManagerEvent::Changed { old, new });
        }
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn load_persisted_transfer_bundles(&self) {
        let entities = match self.file_service.load_all(FILE_SERVICE_TYPE_TRANSFER) {
            Ok(entities) => entities,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load persisted transfer bundles");
                return;
            }
        };

        let mut bundles: Vec<TransferBundle> = Vec::with_capacity(entities.len());
        for (identifier, bytes) in entities {
            match TransferBundle::decode(&bytes) {
                Some((bundle, version)) => {
                    // Migrate older encodings forward.
                    if version != crate::client::TRANSFER_BUNDLE_VERSION_CURRENT {
                        self.handler.save_transfer_bundle(&self.file_service, &bundle);
                    }
                    bundles.push(bundle);
                }
                None => {
                    tracing::warn!(
                        identifier = %hex::encode(identifier),
                        "undecodable transfer bundle; skipping"
                    );
                }
            }
        }

        tracing::info!(
            network = %self.network.name(),
            count = bundles.len(),
            "loaded persisted transfer bundles"
        );

        bundles.sort_by_key(|bundle| bundle.sort_key());
        for bundle in &bundles {
            self.recover_one_transfer_bundle(bundle);
        }
    }

    // ------------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------------

    fn tick(&self) {
        {
            let qry = self.qry.lock().unwrap();
            if !qry.connected {
                return;
            }
        }
        if !self.sync_mode.syncs_via_api() {
            return;
        }

        let inner = self.strong();
        tokio::spawn(async move {
            let event = match inner.client.get_block_number().await {
                Ok(reply) => SyncEvent::AnnounceBlockNumber {
                    success: true,
                    block_number: reply.block_number,
                    verified_block_hash: reply.verified_block_hash,
                },
                Err(err) => {
                    tracing::debug!(error = %err, "get_block_number failed");
                    SyncEvent::AnnounceBlockNumber {
                        success: false,
                        block_number: 0,
                        verified_block_hash: None,
                    }
                }
            };
            let _ = inner.events.send(event);
        });
    }

    fn handle_block_number(
        &self,
        success: bool,
        block_number: u64,
        verified_block_hash: Option<String>,
    ) {
        if success && self.network.set_height(block_number) {
            if let Some(hash_text) = verified_block_hash.as_deref() {
                if let Ok(hash) = TxHash::from_string(self.network.family(), hash_text) {
                    self.network.set_verified_block_hash(hash);
                }
            }
            self.listener
                .manager_event(ManagerEvent::BlockHeightUpdated(block_number));
            self.listener
                .network_event(&self.network, NetworkEvent::HeightUpdated(block_number));
        }

        // Whether the height call succeeded or not, consider a range sync;
        // where the last one ended decides incremental vs. full.
        self.request_sync();
    }

    fn request_sync(&self) {
        let plan = {
            let mut qry = self.qry.lock().unwrap();
            if !qry.connected {
                return;
            }
            qry.prepare_sync(self.network.height())
        };

        let plan = match plan {
            Some(plan) => plan,
            None => return,
        };

        if plan.emit_events {
            self.set_state(WalletManagerState::Syncing);
            self.listener.manager_event(ManagerEvent::SyncStarted);
            self.listener
                .manager_event(ManagerEvent::SyncContinues { percent: 0 });
        }

        let addresses = self.primary_wallet.addresses_for_recovery();
        self.request_transfers_or_transactions(plan.rid, plan.beg_block, plan.end_block, addresses);
    }

    /// Issue the ranged query for `addresses`, carrying the accumulated
    /// address set in the callback state.
    fn request_transfers_or_transactions(
        &self,
        rid: u64,
        beg_block: u64,
        end_block: u64,
        addresses: BTreeSet<String>,
    ) {
        let inner = self.strong();
        let by = self.handler.query_by();

        tokio::spawn(async move {
            let request: Vec<String> = addresses.iter().cloned().collect();
            let state = CallbackState { rid, addresses };

            match by {
                crate::handler::QueryBy::Transfers => {
                    let event = match inner.client.get_transfers(&request, beg_block, end_block).await
                    {
                        Ok(bundles) => SyncEvent::AnnounceTransfers {
                            state,
                            success: true,
                            bundles,
                        },
                        Err(err) => {
                            tracing::debug!(error = %err, "get_transfers failed");
                            SyncEvent::AnnounceTransfers {
                                state,
                                success: false,
                                bundles: Vec::new(),
                            }
                        }
                    };
                    let _ = inner.events.send(event);
                }
                crate::handler::QueryBy::Transactions => {
                    let event = match inner
                        .client
                        .get_transactions(&request, beg_block, end_block)
                        .await
                    {
                        Ok(bundles) => SyncEvent::AnnounceTransactions {
                            state,
                            success: true,
                            bundles,
                        },
                        Err(err) => {
                            tracing::debug!(error = %err, "get_transactions failed");
                            SyncEvent::AnnounceTransactions {
                                state,
                                success: false,
                                bundles: Vec::new(),
                            }
                        }
                    };
                    let _ = inner.events.send(event);
                }
            }
        });
    }

    fn handle_transfers(
        &self,
        state: CallbackState,
        success: bool,
        mut bundles: Vec<TransferBundle>,
    ) {
        let matched = self.qry.lock().unwrap().matches(state.rid);
        if !matched {
            tracing::debug!(rid = state.rid, "discarding stale transfers reply");
            return;
        }

        if !success {
            self.finish_sync(false);
            return;
        }

        // Persist first, then apply in ascending (block, index) order so
        // dependents resolve deterministically.
        for bundle in &bundles {
            self.handler.save_transfer_bundle(&self.file_service, bundle);
        }
        bundles.sort_by_key(|bundle| bundle.sort_key());

        for bundle in &bundles {
            self.recover_one_transfer_bundle(bundle);
        }

        self.continue_or_finish_sync(state);
    }

    fn handle_transactions(
        &self,
        state: CallbackState,
        success: bool,
        mut bundles: Vec<TransactionBundle>,
    ) {
        let matched = self.qry.lock().unwrap().matches(state.rid);
        if !matched {
            tracing::debug!(rid = state.rid, "discarding stale transactions reply");
            return;
        }

        if !success {
            self.finish_sync(false);
            return;
        }

        for bundle in &bundles {
            self.handler
                .save_transaction_bundle(&self.file_service, bundle);
        }
        bundles.sort_by_key(|bundle| bundle.sort_key());

        for bundle in &bundles {
            match self.handler.recover_transfers_from_transaction_bundle(
                &self.primary_wallet,
                &self.account,
                bundle,
            ) {
                Ok(recoveries) => {
                    for recovery in recoveries {
                        self.fire_recovery_events(&recovery);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unrecoverable transaction bundle");
                }
            }
        }

        self.continue_or_finish_sync(state);
    }

    fn recover_one_transfer_bundle(&self, bundle: &TransferBundle) {
        match self.handler.recover_transfer_from_transfer_bundle(
            &self.primary_wallet,
            &self.account,
            bundle,
        ) {
            Ok(recovery) => self.fire_recovery_events(&recovery),
            Err(err) => {
                tracing::warn!(uids = %bundle.uids, error = %err, "skipping unrecoverable bundle");
            }
        }
    }

    fn fire_recovery_events(&self, recovery: &BundleRecovery) {
        let wallet = &self.primary_wallet;
        if recovery.is_new {
            self.listener
                .transfer_event(wallet, &recovery.transfer, TransferEvent::Created);
            self.listener.wallet_event(wallet, WalletEvent::TransferAdded);
        }
        if let Some((old, new)) = recovery.state_change.clone() {
            self.listener.transfer_event(
                wallet,
                &recovery.transfer,
                TransferEvent::Changed { old, new },
            );
            self.listener
                .wallet_event(wallet, WalletEvent::TransferChanged);
        }
        if recovery.is_new || recovery.state_change.is_some() {
            self.listener
                .wallet_event(wallet, WalletEvent::BalanceUpdated(wallet.balance()));
        }
    }

    /// After a successful batch: re-query for any addresses discovery added
    /// (same rid), or conclude the sync.
    fn continue_or_finish_sync(&self, state: CallbackState) {
        let new_addresses = self.primary_wallet.addresses_for_recovery();
        let needed: BTreeSet<String> = new_addresses
            .difference(&state.addresses)
            .cloned()
            .collect();

        if needed.is_empty() {
            self.finish_sync(true);
            return;
        }

        let (beg_block, end_block) = {
            let qry = self.qry.lock().unwrap();
            (qry.sync.beg_block, qry.end_block_for_request())
        };

        tracing::debug!(count = needed.len(), "address discovery: re-querying");

        // The callback state accumulates the full set; the request itself
        // carries only the new addresses.
        let inner = self.strong();
        let rid = state.rid;
        let request: Vec<String> = needed.into_iter().collect();
        tokio::spawn(async move {
            let callback = CallbackState {
                rid,
                addresses: new_addresses,
            };
            let event = match inner.client.get_transfers(&request, beg_block, end_block).await {
                Ok(bundles) => SyncEvent::AnnounceTransfers {
                    state: callback,
                    success: true,
                    bundles,
                },
                Err(err) => {
                    tracing::debug!(error = %err, "get_transfers failed");
                    SyncEvent::AnnounceTransfers {
                        state: callback,
                        success: false,
                        bundles: Vec::new(),
                    }
                }
            };
            let _ = inner.events.send(event);
        });
    }

    fn finish_sync(&self, success: bool) {
        let emit_events = {
            let mut qry = self.qry.lock().unwrap();
            qry.finish(success);
            qry.sync.emit_events
        };

        if emit_events {
            self.listener
                .manager_event(ManagerEvent::SyncContinues { percent: 100 });
            self.listener.manager_event(ManagerEvent::SyncStopped(if success {
                SyncStoppedReason::Complete
            } else {
                SyncStoppedReason::Unknown
            }));
        }

        let connected = self.qry.lock().unwrap().connected;
        if connected {
            self.set_state(WalletManagerState::Connected);
        }
    }

    // ------------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------------

    fn submit_signed(&self, wallet: &Arc<Wallet>, transfer: &Arc<Transfer>) {
        // The transfer also appears in the native wallet when its fee is
        // paid in a different currency than the one transferred.
        let wallet_for_fee = if transfer.direction() != TransferDirection::Received
            && !transfer.unit().is_compatible(transfer.unit_for_fee())
        {
            self.wallet_for_currency(transfer.fee_currency())
        } else {
            None
        };

        wallet.add_transfer(transfer.clone());
        self.listener.wallet_event(wallet, WalletEvent::TransferAdded);

        if let Some(fee_wallet) = &wallet_for_fee {
            fee_wallet.add_transfer(transfer.clone());
            self.listener
                .wallet_event(fee_wallet, WalletEvent::TransferAdded);
        }

        let serialization = match transfer.serialization() {
            Some(serialization) => serialization,
            None => {
                tracing::warn!("submit of a transfer without serialization");
                self.apply_transfer_state(
                    wallet,
                    transfer,
                    TransferState::Errored(crate::error::SubmitError::Unknown),
                );
                return;
            }
        };
        let identifier = transfer.identifier().unwrap_or_default();

        self.listener
            .wallet_event(wallet, WalletEvent::TransferSubmitted);
        if let Some(fee_wallet) = &wallet_for_fee {
            self.listener
                .wallet_event(fee_wallet, WalletEvent::TransferSubmitted);
        }

        let inner = self.strong();
        let wallet = wallet.clone();
        let transfer = transfer.clone();
        tokio::spawn(async move {
            let event = match inner
                .client
                .submit_transaction(&identifier, &serialization)
                .await
            {
                Ok(reply) => SyncEvent::AnnounceSubmit {
                    wallet,
                    transfer,
                    hash: reply.hash,
                    success: true,
                },
                Err(err) => {
                    tracing::warn!(error = %err, "submit failed");
                    SyncEvent::AnnounceSubmit {
                        wallet,
                        transfer,
                        hash: None,
                        success: false,
                    }
                }
            };
            let _ = inner.events.send(event);
        });
    }

    fn handle_submit(
        &self,
        wallet: Arc<Wallet>,
        transfer: Arc<Transfer>,
        hash: Option<String>,
        success: bool,
    ) {
        let state = if success {
            TransferState::Submitted
        } else {
            TransferState::Errored(crate::error::SubmitError::Unknown)
        };
        self.apply_transfer_state(&wallet, &transfer, state);

        // Some chains only learn their hash from the submit reply.
        if let Some(hash_text) = hash.as_deref() {
            if let Ok(parsed) = TxHash::from_string(self.network.family(), hash_text) {
                if transfer.set_hash(parsed) {
                    let current = transfer.state();
                    self.listener.transfer_event(
                        &wallet,
                        &transfer,
                        TransferEvent::Changed {
                            old: current.clone(),
                            new: current,
                        },
                    );
                }
            }
        }

        // On error, the fee effect on the native wallet is undone; balances
        // are derived, so announcing the recomputed value suffices.
        if !success
            && !Arc::ptr_eq(&wallet, &self.primary_wallet)
            && transfer.direction() != TransferDirection::Received
        {
            self.listener.wallet_event(
                &self.primary_wallet,
                WalletEvent::BalanceUpdated(self.primary_wallet.balance()),
            );
        }
    }

    // ------------------------------------------------------------------------
    // Fee estimation
    // ------------------------------------------------------------------------

    fn handle_fee_estimate(
        &self,
        cookie: Cookie,
        success: bool,
        cost_units: u64,
        attributes: Vec<(String, String)>,
        price_per_cost_factor: Amount,
        initial_fee_basis: Option<FeeBasis>,
    ) {
        let basis = if success {
            self.handler
                .recover_fee_basis_from_fee_estimate(
                    &price_per_cost_factor,
                    initial_fee_basis.as_ref(),
                    cost_units,
                    &attributes,
                )
                .map_err(|err| {
                    tracing::warn!(error = %err, "fee basis recovery failed");
                    err
                })
                .ok()
        } else {
            None
        };

        let success = success && basis.is_some();
        self.listener.wallet_event(
            &self.primary_wallet,
            WalletEvent::FeeBasisEstimated {
                cookie,
                success,
                basis,
            },
        );
    }

    // ------------------------------------------------------------------------
    // Transfer state + events
    // ------------------------------------------------------------------------

    fn apply_transfer_state(
        &self,
        wallet: &Arc<Wallet>,
        transfer: &Arc<Transfer>,
        state: TransferState,
    ) {
        if let Some((old, new)) = transfer.set_state(state) {
            self.listener
                .transfer_event(wallet, transfer, TransferEvent::Changed { old, new });
            self.listener
                .wallet_event(wallet, WalletEvent::BalanceUpdated(wallet.balance()));
        }
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("network", &self.inner.network.name())
            .field("state", &self.state())
            .field("sync_mode", &self.inner.sync_mode)
            .finish()
    }
}
