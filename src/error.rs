//! Error types shared across the wallet runtime.
//!
//! Chain-handler operations never panic on bad input: they return
//! success/failure and carry richer information through these enums.

use thiserror::Error;

/// Validation errors raised while constructing a typed-data coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TypedDataError {
    #[error("missing 'types'")]
    MissingTypes,
    #[error("invalid 'types' value")]
    InvalidTypesValue,
    #[error("missing 'EIP712Domain' type")]
    MissingDomainType,
    #[error("missing 'domain'")]
    MissingDomain,
    #[error("invalid 'domain' value")]
    InvalidDomainValue,
    #[error("missing 'primaryType'")]
    MissingPrimaryType,
    #[error("unknown 'primaryType'")]
    UnknownPrimaryType,
    #[error("missing 'message'")]
    MissingMessage,
    #[error("invalid 'message' value")]
    InvalidMessageValue,
    #[error("invalid atomic type")]
    InvalidAtomicType,
}

/// Why a submitted transfer failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// No additional information from the client or network.
    Unknown,
    /// The client refused the transaction before it reached the network.
    Client(String),
    /// The network propagated a failure back.
    Posix(i32),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Unknown => write!(f, "submit failed: unknown"),
            SubmitError::Client(msg) => write!(f, "submit refused by client: {}", msg),
            SubmitError::Posix(errno) => write!(f, "submit failed: errno {}", errno),
        }
    }
}

impl std::error::Error for SubmitError {}

/// File-service failures, classified.
#[derive(Debug, Error)]
pub enum FileServiceError {
    /// A coding bug in this crate; fatal for the affected store.
    #[error("file service implementation error: {0}")]
    Impl(String),
    /// Underlying blob-store failure.
    #[error("file service OS error")]
    Os(#[from] std::io::Error),
    /// An entity could not be decoded at its recorded version.
    #[error("file service entity error: type {entity_type} version {version}")]
    Entity { entity_type: String, version: u32 },
    /// The store's index (version sidecar) is corrupt.
    #[error("file service store error: {0}")]
    Store(String),
}

/// Parse failures for values arriving as indexer strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("parse error: {0}")]
    Generic(String),
    #[error("numeric parse error: {0}")]
    Numeric(String),
    #[error("internal parse error")]
    Internal,
}

/// Why a manager disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    Unknown,
    Posix(i32),
}

/// An operation the runtime deliberately leaves unimplemented rather than
/// guessing at semantics the original never defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not yet implemented: {0}")]
pub struct NotYetImplemented(pub &'static str);
