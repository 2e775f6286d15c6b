//! The QRY sync engine's state: a bounded polling protocol against the
//! indexer, driven by a periodic tick.
//!
//! All decisions are made here, against plain state; the manager owns the
//! I/O.  Replies are filtered by `rid`; the monotone request id is the sole
//! cancellation mechanism, which makes the sync best-effort at-least-once:
//! after a restart the engine re-queries from `block_offset` blocks behind
//! the last successful boundary.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{TransactionBundle, TransferBundle};
use crate::currency::Amount;
use crate::fee::FeeBasis;
use crate::listener::Cookie;
use crate::network::BLOCK_HEIGHT_UNBOUNDED;
use crate::transfer::Transfer;
use crate::wallet::Wallet;

/// Conservative look-back from the last successful sync boundary, in
/// seconds' worth of blocks.
const OFFSET_BLOCKS_IN_SECONDS: u64 = 3 * 24 * 60 * 60; // 3 days

const MINIMUM_BLOCK_OFFSET: u64 = 100;

const MINIMUM_TICK_MS: u64 = 10_000;
const MAXIMUM_TICK_MS: u64 = 60_000;

/// The tick period: a quarter of the confirmation period, clamped so slow
/// chains sample at least once a minute and fast chains at most every ten
/// seconds.
pub fn tick_period(confirmation_period_secs: u64) -> Duration {
    let ms = (confirmation_period_secs * 1000 / 4).clamp(MINIMUM_TICK_MS, MAXIMUM_TICK_MS);
    Duration::from_millis(ms)
}

/// Callback state carried through a get-transfers / get-transactions round
/// trip: the originating request id and the accumulated address set.
#[derive(Debug, Clone)]
pub struct CallbackState {
    pub rid: u64,
    pub addresses: BTreeSet<String>,
}

/// Typed completions posted back onto the manager's handler task.
pub(crate) enum SyncEvent {
    AnnounceBlockNumber {
        success: bool,
        block_number: u64,
        verified_block_hash: Option<String>,
    },
    AnnounceTransfers {
        state: CallbackState,
        success: bool,
        bundles: Vec<TransferBundle>,
    },
    AnnounceTransactions {
        state: CallbackState,
        success: bool,
        bundles: Vec<TransactionBundle>,
    },
    AnnounceSubmit {
        wallet: Arc<Wallet>,
        transfer: Arc<Transfer>,
        hash: Option<String>,
        success: bool,
    },
    AnnounceFeeEstimate {
        cookie: Cookie,
        success: bool,
        cost_units: u64,
        attributes: Vec<(String, String)>,
        price_per_cost_factor: Amount,
        initial_fee_basis: Option<FeeBasis>,
    },
    Stop,
}

/// One bounded sync's bookkeeping.
#[derive(Debug, Clone)]
pub struct SyncRange {
    pub rid: u64,
    pub beg_block: u64,
    pub end_block: u64,
    pub completed: bool,
    pub success: bool,
    /// Pass the unbounded sentinel as the request's end block, so the
    /// initial full sync also returns recent and pending entries.
    pub unbounded: bool,
    /// Small incremental catch-ups stay silent; only spans beyond twice the
    /// block offset produce sync events.
    pub emit_events: bool,
}

/// The issue-this-request decision from one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub rid: u64,
    pub beg_block: u64,
    pub end_block: u64,
    pub emit_events: bool,
}

/// Sync-engine state, guarded by the manager's lock.
#[derive(Debug)]
pub struct QryState {
    pub connected: bool,
    request_id: u64,
    pub sync: SyncRange,
    pub block_offset: u64,
}

impl QryState {
    pub fn new(earliest_block: u64, current_block: u64, confirmation_period_secs: u64) -> Self {
        let block_offset = if confirmation_period_secs == 0 {
            MINIMUM_BLOCK_OFFSET
        } else {
            (OFFSET_BLOCKS_IN_SECONDS / confirmation_period_secs).max(MINIMUM_BLOCK_OFFSET)
        };

        QryState {
            connected: false,
            request_id: 0,
            sync: SyncRange {
                rid: u64::MAX,
                beg_block: earliest_block,
                end_block: current_block.max(earliest_block),
                completed: true,
                success: false,
                unbounded: true,
                emit_events: false,
            },
            block_offset,
        }
    }

    pub fn next_request_id(&mut self) -> u64 {
        let rid = self.request_id;
        self.request_id += 1;
        rid
    }

    /// Is a reply with `rid` the one the current sync is waiting for?
    pub fn matches(&self, rid: u64) -> bool {
        self.sync.rid == rid
    }

    /// Decide whether a new range sync is due, and claim a request id for
    /// it.  Runs after every block-number reply.
    pub fn prepare_sync(&mut self, current_height: u64) -> Option<SyncPlan> {
        // After a fully successful sync, back the start up by the offset so
        // a missed range (indexer outage, app restart) is re-queried.
        if self.sync.completed && self.sync.success {
            self.sync.beg_block = self.sync.end_block.saturating_sub(self.block_offset);
        }

        self.sync.end_block = current_height.max(self.sync.beg_block);

        if !self.sync.completed {
            return None; // still running
        }
        if self.sync.beg_block == self.sync.end_block {
            return None; // nothing new
        }

        let rid = self.next_request_id();
        self.sync.rid = rid;
        self.sync.completed = false;
        self.sync.success = false;
        self.sync.emit_events =
            self.sync.beg_block < current_height.saturating_sub(2 * self.block_offset);

        Some(SyncPlan {
            rid,
            beg_block: self.sync.beg_block,
            end_block: self.end_block_for_request(),
            emit_events: self.sync.emit_events,
        })
    }

    /// The end block actually sent to the client.
    pub fn end_block_for_request(&self) -> u64 {
        if self.sync.unbounded {
            BLOCK_HEIGHT_UNBOUNDED
        } else {
            self.sync.end_block
        }
    }

    /// Record the outcome of the current sync.
    pub fn finish(&mut self, success: bool) {
        self.sync.completed = true;
        self.sync.success = success;
    }
}
