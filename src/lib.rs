//! Multiwallet-Core: Multi-Chain Wallet Runtime
//!
//! This crate drives per-blockchain wallets through account derivation,
//! address generation, transaction assembly, signing, fee estimation,
//! remote-indexer synchronization and persistent state reconciliation,
//! uniformly across heterogeneous chain families:
//!
//! - **Account / Address / Amount** - HD accounts and semantic value types
//! - **Transfer / Wallet** - one movement of value, and collections thereof
//! - **Chain Handler Dispatch** - one uniform operation set per chain family
//! - **Sync Engine** - bounded polling against a remote indexer with an
//!   address-discovery fixpoint and stale-reply filtering
//! - **File Service** - versioned blob persistence for bundles
//! - **Typed Structure Signer** - typed-data validation, canonical encoding
//!   and recoverable signing (EVM family)
//! - **UTXO Transaction Codec** - input selection, canonical serialization
//!   and signing (Avalanche X-chain family)
//!
//! The host supplies a [`client::Client`] for indexer access and a
//! [`listener::Listener`] for events; everything else is owned by the
//! [`manager::WalletManager`].

// Core modules
pub mod account;
pub mod address;
pub mod client;
pub mod codec;
pub mod currency;
pub mod error;
pub mod fee;
pub mod file_service;
pub mod handler;
pub mod hash;
pub mod listener;
pub mod manager;
pub mod network;
pub mod sync;
pub mod transfer;
pub mod txhash;
pub mod wallet;

// Chain-family modules
pub mod avax;
pub mod eth;

// Re-export commonly used items at the crate root
pub use account::Account;
pub use address::Address;
pub use client::{Client, TransactionBundle, TransferBundle};
pub use currency::{Amount, Currency, Unit};
pub use error::{FileServiceError, ParseError, SubmitError, TypedDataError};
pub use fee::FeeBasis;
pub use listener::Listener;
pub use manager::WalletManager;
pub use network::{AddressScheme, ChainFamily, Network, NetworkFee, SyncMode};
pub use transfer::{Transfer, TransferDirection, TransferState};
pub use txhash::TxHash;
pub use wallet::Wallet;
