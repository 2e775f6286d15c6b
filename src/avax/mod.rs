//! Avalanche X-chain family: addresses, accounts, networks and the UTXO
//! transaction codec.

pub mod account;
pub mod address;
pub mod network;
pub mod transaction;

pub use account::{AvalancheAccount, AvalancheSignature};
pub use address::{AvalancheAddress, AvalancheChain};
pub use network::AvalancheNetworkParams;
pub use transaction::{
    AvalancheFeeBasis, AvalancheTransaction, TransactionInput, TransactionOutput, Utxo, UtxoSearch,
    UtxoSet,
};

/// The integer amount for Avalanche, in nAVAX base units.
pub type AvalancheAmount = u64;
