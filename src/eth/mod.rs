//! Ethereum-style family: accounts, recoverable signatures, the legacy
//! transaction codec, and the typed-structure encoder/signer.

pub mod account;
pub mod signature;
pub mod structure;
pub mod transaction;

pub use account::EthereumAccount;
pub use signature::{EthSignature, SignatureType};
pub use structure::{StructureCoder, StructureSignResult};
pub use transaction::EthereumTransaction;
