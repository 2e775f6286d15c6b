//! The host-implemented indexer client, and the bundles it reports.
//!
//! A bundle is the indexer's record of one transfer (account-style chains)
//! or one raw transaction (UTXO-style chains).  Bundles are the unit of
//! persistence; their encodings carry a version prefix so older stores
//! migrate forward.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SubmitError;
use crate::network::BLOCK_HEIGHT_UNBOUNDED;
use crate::transfer::TransferState;

/// A transport or service failure reported by the client.
#[derive(Debug, Clone, Error)]
#[error("client error: {0}")]
pub struct ClientError(pub String);

/// Reply to `get_block_number`.
#[derive(Debug, Clone)]
pub struct BlockNumberReply {
    pub block_number: u64,
    /// The chain-specific text form of the verified block hash, when the
    /// indexer provides one.
    pub verified_block_hash: Option<String>,
}

/// Reply to `submit_transaction`.
#[derive(Debug, Clone)]
pub struct SubmitReply {
    pub identifier: String,
    /// Some chains only learn their transaction hash from this reply.
    pub hash: Option<String>,
}

/// Reply to `estimate_transaction_fee`: the dry-run's cost units plus
/// chain-specific attributes (`consumed_gas`, `storage_size`, ...).
#[derive(Debug, Clone)]
pub struct FeeEstimateReply {
    pub cost_units: u64,
    pub attributes: Vec<(String, String)>,
}

/// Host callbacks to the remote indexer.  All methods are suspension
/// points: the manager never blocks on them, and replies re-enter through
/// the manager's `announce_*` methods carrying the originating request id.
#[async_trait]
pub trait Client: Send + Sync + 'static {
    async fn get_block_number(&self) -> Result<BlockNumberReply, ClientError>;

    /// Transfers touching `addresses` within `[beg_block, end_block]`;
    /// `end_block` may be [`BLOCK_HEIGHT_UNBOUNDED`].
    async fn get_transfers(
        &self,
        addresses: &[String],
        beg_block: u64,
        end_block: u64,
    ) -> Result<Vec<TransferBundle>, ClientError>;

    /// Raw transactions touching `addresses` within the range, for
    /// UTXO-style chains.
    async fn get_transactions(
        &self,
        addresses: &[String],
        beg_block: u64,
        end_block: u64,
    ) -> Result<Vec<TransactionBundle>, ClientError>;

    async fn submit_transaction(
        &self,
        identifier: &str,
        serialization: &[u8],
    ) -> Result<SubmitReply, ClientError>;

    async fn estimate_transaction_fee(
        &self,
        serialization: &[u8],
        hash_hex: &str,
    ) -> Result<FeeEstimateReply, ClientError>;
}

// ============================================================================
// Bundle status
// ============================================================================

/// The indexer's view of a transfer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleStatus {
    Created,
    Signed,
    Submitted,
    Included,
    Errored,
    Deleted,
}

// ============================================================================
// Transfer bundle
// ============================================================================

/// The indexer's report of one transfer.  All value fields are strings;
/// parsing is the chain handler's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferBundle {
    pub status: BundleStatus,
    pub uids: String,
    pub hash: String,
    pub identifier: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub currency: String,
    pub fee: Option<String>,
    pub block_timestamp: u64,
    pub block_number: u64,
    pub block_confirmations: u64,
    pub block_transaction_index: u64,
    pub block_hash: String,
    pub attributes: Vec<(String, String)>,
}

/// Version 1 lacked the confirmations count.
#[derive(Debug, Deserialize)]
struct TransferBundleV1 {
    status: BundleStatus,
    uids: String,
    hash: String,
    identifier: String,
    from: String,
    to: String,
    amount: String,
    currency: String,
    fee: Option<String>,
    block_timestamp: u64,
    block_number: u64,
    block_transaction_index: u64,
    block_hash: String,
    attributes: Vec<(String, String)>,
}

pub const TRANSFER_BUNDLE_VERSION_1: u32 = 1;
pub const TRANSFER_BUNDLE_VERSION_CURRENT: u32 = 2;

impl TransferBundle {
    /// Bundles apply in ascending block order, index-within-block second,
    /// so dependencies resolve deterministically.
    pub fn sort_key(&self) -> (u64, u64) {
        (self.block_number, self.block_transaction_index)
    }

    /// Case-insensitive attribute lookup.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The transfer state this bundle implies.  An errored bundle with a
    /// real block is an inclusion that failed on-chain; the fee was still
    /// paid.
    pub fn transfer_state(&self) -> TransferState {
        let is_included = BundleStatus::Included == self.status
            || (BundleStatus::Errored == self.status
                && self.block_number != BLOCK_HEIGHT_UNBOUNDED
                && self.block_timestamp != 0);

        if is_included {
            let success = BundleStatus::Included == self.status;
            return TransferState::Included {
                block_number: self.block_number,
                transaction_index: self.block_transaction_index,
                timestamp: self.block_timestamp,
                success,
                error: if success { None } else { Some("unknown".to_string()) },
            };
        }

        match self.status {
            BundleStatus::Created => TransferState::Created,
            BundleStatus::Signed => TransferState::Signed,
            BundleStatus::Submitted => TransferState::Submitted,
            BundleStatus::Errored => TransferState::Errored(SubmitError::Unknown),
            BundleStatus::Deleted => TransferState::Deleted,
            BundleStatus::Included => unreachable!("handled above"),
        }
    }

    /// Encode at the current version: one version byte, then JSON.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![TRANSFER_BUNDLE_VERSION_CURRENT as u8];
        out.extend_from_slice(&serde_json::to_vec(self).expect("bundle serializes"));
        out
    }

    /// Decode any known version, migrating older ones forward.
    pub fn decode(bytes: &[u8]) -> Option<(TransferBundle, u32)> {
        let (&version, payload) = bytes.split_first()?;
        match version as u32 {
            TRANSFER_BUNDLE_VERSION_1 => {
                let v1: TransferBundleV1 = serde_json::from_slice(payload).ok()?;
                Some((
                    TransferBundle {
                        status: v1.status,
                        uids: v1.uids,
                        hash: v1.hash,
                        identifier: v1.identifier,
                        from: v1.from,
                        to: v1.to,
                        amount: v1.amount,
                        currency: v1.currency,
                        fee: v1.fee,
                        block_timestamp: v1.block_timestamp,
                        block_number: v1.block_number,
                        block_confirmations: 0,
                        block_transaction_index: v1.block_transaction_index,
                        block_hash: v1.block_hash,
                        attributes: v1.attributes,
                    },
                    TRANSFER_BUNDLE_VERSION_1,
                ))
            }
            TRANSFER_BUNDLE_VERSION_CURRENT => serde_json::from_slice(payload)
                .ok()
                .map(|bundle| (bundle, TRANSFER_BUNDLE_VERSION_CURRENT)),
            _ => None,
        }
    }
}

// ============================================================================
// Transaction bundle
// ============================================================================

/// The indexer's report of one raw transaction (UTXO-style chains).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBundle {
    pub status: BundleStatus,
    pub serialization: Vec<u8>,
    pub timestamp: u64,
    pub block_height: u64,
}

pub const TRANSACTION_BUNDLE_VERSION_CURRENT: u32 = 1;

impl TransactionBundle {
    pub fn sort_key(&self) -> u64 {
        self.block_height
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![TRANSACTION_BUNDLE_VERSION_CURRENT as u8];
        out.extend_from_slice(&serde_json::to_vec(self).expect("bundle serializes"));
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<(TransactionBundle, u32)> {
        let (&version, payload) = bytes.split_first()?;
        if version as u32 != TRANSACTION_BUNDLE_VERSION_CURRENT {
            return None;
        }
        serde_json::from_slice(payload)
            .ok()
            .map(|bundle| (bundle, TRANSACTION_BUNDLE_VERSION_CURRENT))
    }
}
