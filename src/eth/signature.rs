//! Recoverable secp256k1 signatures in the two orders Ethereum-style chains
//! use: `VRS` with v in {27, 28} (the EIP variant) and `RSV` with v in
//! {0, 1}.

use alloy::primitives::Address;
use eyre::{eyre, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::hash::keccak256;

/// Which recoverable layout to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureType {
    /// `v || r || s` with v in {27, 28}.
    RecoverableVrsEip,
    /// `r || s || v` with v in {0, 1}.
    RecoverableRsv,
}

/// A recoverable signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthSignature {
    pub kind: SignatureType,
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EthSignature {
    /// The 65-byte wire form in the layout's order.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        match self.kind {
            SignatureType::RecoverableVrsEip => {
                bytes[0] = self.v;
                bytes[1..33].copy_from_slice(&self.r);
                bytes[33..65].copy_from_slice(&self.s);
            }
            SignatureType::RecoverableRsv => {
                bytes[..32].copy_from_slice(&self.r);
                bytes[32..64].copy_from_slice(&self.s);
                bytes[64] = self.v;
            }
        }
        bytes
    }

    /// The recovery id, independent of layout.
    pub fn recovery_id(&self) -> Result<RecoveryId> {
        let recid = match self.kind {
            SignatureType::RecoverableVrsEip => self
                .v
                .checked_sub(27)
                .ok_or_else(|| eyre!("invalid v {}", self.v))?,
            SignatureType::RecoverableRsv => self.v,
        };
        RecoveryId::from_byte(recid).ok_or_else(|| eyre!("invalid recovery id {}", recid))
    }
}

/// Sign a keccak digest.
pub fn sign_digest(
    kind: SignatureType,
    digest: &[u8; 32],
    key: &SigningKey,
) -> Result<EthSignature> {
    let (signature, recovery): (Signature, RecoveryId) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| eyre!("signing failed: {}", e))?;

    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    let v = match kind {
        SignatureType::RecoverableVrsEip => 27 + recovery.to_byte(),
        SignatureType::RecoverableRsv => recovery.to_byte(),
    };

    Ok(EthSignature { kind, v, r, s })
}

/// Keccak-hash `bytes` and sign the digest; returns the digest too.
pub fn sign_bytes(
    kind: SignatureType,
    bytes: &[u8],
    key: &SigningKey,
) -> Result<([u8; 32], EthSignature)> {
    let digest = keccak256(bytes);
    let signature = sign_digest(kind, &digest, key)?;
    Ok((digest, signature))
}

/// The address of a verifying key: keccak of the uncompressed point, last
/// twenty bytes.
pub fn address_of_key(key: &VerifyingKey) -> Address {
    let uncompressed = key.to_encoded_point(false);
    Address::from_slice(&keccak256(&uncompressed.as_bytes()[1..])[12..])
}

/// Recover the signer address from a signature over a keccak digest.
pub fn recover_address(signature: &EthSignature, digest: &[u8; 32]) -> Result<Address> {
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&signature.r);
    compact[32..].copy_from_slice(&signature.s);

    let sig = Signature::from_slice(&compact).map_err(|e| eyre!("invalid signature: {}", e))?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, signature.recovery_id()?)
        .map_err(|e| eyre!("recovery failed: {}", e))?;

    Ok(address_of_key(&key))
}
