//! Listener events.
//!
//! Events are produced on the manager's handler task in a defined order;
//! a listener may re-dispatch onto another thread but must preserve
//! per-object ordering.

use std::sync::Arc;

use crate::currency::Amount;
use crate::error::DisconnectReason;
use crate::fee::FeeBasis;
use crate::network::Network;
use crate::transfer::{Transfer, TransferState};
use crate::wallet::Wallet;

/// Correlates an asynchronous fee estimate with its requester.
pub type Cookie = u64;

/// The manager's connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletManagerState {
    Created,
    Connected,
    Syncing,
    Disconnected(DisconnectReason),
    Deleted,
}

/// Why a sync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStoppedReason {
    Complete,
    Requested,
    Unknown,
    Posix(i32),
}

/// Events about one wallet manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    Created,
    Changed {
        old: WalletManagerState,
        new: WalletManagerState,
    },
    Deleted,
    WalletAdded,
    SyncStarted,
    SyncContinues {
        percent: u8,
    },
    SyncStopped(SyncStoppedReason),
    BlockHeightUpdated(u64),
}

/// Events about one wallet.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    Created,
    BalanceUpdated(Amount),
    TransferAdded,
    TransferChanged,
    TransferSubmitted,
    /// The answer to an asynchronous `estimate_fee_basis`, keyed by cookie.
    FeeBasisEstimated {
        cookie: Cookie,
        success: bool,
        basis: Option<FeeBasis>,
    },
}

/// Events about one transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Created,
    Changed {
        old: TransferState,
        new: TransferState,
    },
    Deleted,
}

/// Events about the network.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    FeesUpdated,
    HeightUpdated(u64),
}

/// The host's event sink.  Default implementations ignore everything, so
/// hosts implement only what they observe.
pub trait Listener: Send + Sync + 'static {
    fn manager_event(&self, _event: ManagerEvent) {}
    fn wallet_event(&self, _wallet: &Arc<Wallet>, _event: WalletEvent) {}
    fn transfer_event(&self, _wallet: &Arc<Wallet>, _transfer: &Arc<Transfer>, _event: TransferEvent) {}
    fn network_event(&self, _network: &Arc<Network>, _event: NetworkEvent) {}
}

/// A listener that drops every event.
pub struct NullListener;

impl Listener for NullListener {}
