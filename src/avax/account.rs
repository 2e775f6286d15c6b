//! Avalanche accounts: HD derivation, address material and signing.
//!
//! The account holds derived addresses only.  Private keys are re-derived
//! from the seed on every signing call and dropped immediately after; no key
//! material is ever serialized or logged.

use bip32::{DerivationPath, XPrv};
use eyre::{eyre, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey};

use crate::avax::address::{AvalancheAddress, AvalancheChain};
use crate::hash::{keccak256, ripemd160_sha256, sha256};

/// BIP-44 derivation path for the primary Avalanche key.
const DERIVATION_PATH: &str = "m/44'/9000'/0'/0/0";

/// Prefix of the standard signed-message envelope; the leading byte is the
/// length of the text that follows.
const STANDARD_MESSAGE_PREFIX: &[u8] = b"\x1aAvalanche Signed Message:\n";

const ADDRESS_BYTES: usize = 20;

/// A 65-byte recoverable signature in `R || S || V` order, `V` in {0, 1},
/// `S` in the low half of the group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvalancheSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl AvalancheSignature {
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(eyre!("signature must be 65 bytes, got {}", bytes.len()));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(AvalancheSignature { r, s, v: bytes[64] })
    }
}

/// An Avalanche account: the X and C addresses derived from one seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvalancheAccount {
    address_x: [u8; ADDRESS_BYTES],
    address_c: [u8; ADDRESS_BYTES],
}

fn derive_signing_key(seed: &[u8; 64]) -> Result<SigningKey> {
    let path: DerivationPath = DERIVATION_PATH
        .parse()
        .map_err(|e| eyre!("invalid derivation path: {}", e))?;
    let xprv = XPrv::derive_from_path(seed, &path).map_err(|e| eyre!("derivation failed: {}", e))?;
    Ok(xprv.private_key().clone())
}

impl AvalancheAccount {
    /// Derive the account from a 64-byte BIP-39 seed.
    pub fn from_seed(seed: &[u8; 64]) -> Result<Self> {
        let key = derive_signing_key(seed)?;
        let verifying = key.verifying_key();

        // The X address hashes the compressed public key; the C address the
        // uncompressed one, keccak-style.
        let compressed = verifying.to_encoded_point(true);
        let uncompressed = verifying.to_encoded_point(false);

        let address_x = ripemd160_sha256(compressed.as_bytes());

        let mut address_c = [0u8; ADDRESS_BYTES];
        address_c.copy_from_slice(&keccak256(&uncompressed.as_bytes()[1..])[12..]);

        Ok(AvalancheAccount { address_x, address_c })
    }

    /// Reconstruct from a serialization: the X and C addresses back-to-back.
    pub fn from_serialization(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 2 * ADDRESS_BYTES {
            return Err(eyre!(
                "account serialization must be {} bytes, got {}",
                2 * ADDRESS_BYTES,
                bytes.len()
            ));
        }

        let mut address_x = [0u8; ADDRESS_BYTES];
        let mut address_c = [0u8; ADDRESS_BYTES];
        address_x.copy_from_slice(&bytes[..ADDRESS_BYTES]);
        address_c.copy_from_slice(&bytes[ADDRESS_BYTES..]);

        Ok(AvalancheAccount { address_x, address_c })
    }

    /// Serialize the address material, X then C.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 * ADDRESS_BYTES);
        bytes.extend_from_slice(&self.address_x);
        bytes.extend_from_slice(&self.address_c);
        bytes
    }

    pub fn address(&self, chain: AvalancheChain) -> AvalancheAddress {
        match chain {
            AvalancheChain::X => AvalancheAddress::X(self.address_x),
            AvalancheChain::C => AvalancheAddress::C(self.address_c),
        }
    }

    pub fn has_address(&self, address: &AvalancheAddress) -> bool {
        match address {
            AvalancheAddress::X(bytes) => *bytes == self.address_x,
            AvalancheAddress::C(bytes) => *bytes == self.address_c,
            _ => false,
        }
    }

    /// Balance limits: Avalanche has none, in either direction.
    pub fn balance_limit(&self, _as_maximum: bool) -> Option<u64> {
        None
    }

    /// Wrap bytes in the standard signed-message envelope:
    /// `0x1A || "Avalanche Signed Message:\n" || u32_be(len) || bytes`.
    pub fn standard_message(&self, bytes: &[u8]) -> Vec<u8> {
        let mut message =
            Vec::with_capacity(STANDARD_MESSAGE_PREFIX.len() + 4 + bytes.len());
        message.extend_from_slice(STANDARD_MESSAGE_PREFIX);
        message.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        message.extend_from_slice(bytes);
        message
    }

    /// Sign arbitrary bytes: SHA-256 the message, then produce a recoverable
    /// low-S signature over the digest.
    pub fn sign_data(&self, bytes: &[u8], seed: &[u8; 64]) -> Result<AvalancheSignature> {
        let digest = sha256(bytes);
        self.sign_digest(&digest, seed)
    }

    /// Sign a prepared 32-byte digest.
    pub fn sign_digest(&self, digest: &[u8; 32], seed: &[u8; 64]) -> Result<AvalancheSignature> {
        let key = derive_signing_key(seed)?;

        let (signature, recovery): (Signature, RecoveryId) = key
            .sign_prehash_recoverable(digest)
            .map_err(|e| eyre!("signing failed: {}", e))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(AvalancheSignature {
            r,
            s,
            v: recovery.to_byte(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER_KEY: &str =
        "patient doctor olympic frog force glimpse endless antenna online dragon bargain someone";

    fn seed() -> [u8; 64] {
        bip39::Mnemonic::parse_normalized(PAPER_KEY)
            .unwrap()
            .to_seed("")
    }

    #[test]
    fn test_address_derivation() {
        let account = AvalancheAccount::from_seed(&seed()).unwrap();

        assert_eq!(
            hex::encode(account.address_x),
            "cc30e2015780a6c72efaef2280e3de4a954e770c"
        );
        assert_eq!(
            account
                .address(AvalancheChain::X)
                .to_string_with_hrp("avax")
                .unwrap(),
            "X-avax1escwyq2hsznvwth6au3gpc77f225uacvwldgal"
        );
    }

    #[test]
    fn test_serialization_roundtrip() {
        let account = AvalancheAccount::from_seed(&seed()).unwrap();
        let recovered = AvalancheAccount::from_serialization(&account.serialize()).unwrap();

        assert_eq!(
            account.address(AvalancheChain::X),
            recovered.address(AvalancheChain::X)
        );
        assert_eq!(
            account.address(AvalancheChain::C),
            recovered.address(AvalancheChain::C)
        );
        assert!(recovered.has_address(&account.address(AvalancheChain::X)));
        assert!(recovered.has_address(&account.address(AvalancheChain::C)));

        assert!(AvalancheAccount::from_serialization(&[0u8; 17]).is_err());
    }

    #[test]
    fn test_balance_limits_absent() {
        let account = AvalancheAccount::from_seed(&seed()).unwrap();
        assert_eq!(account.balance_limit(true), None);
        assert_eq!(account.balance_limit(false), None);
    }

    #[test]
    fn test_standard_message_signature() {
        let account = AvalancheAccount::from_seed(&seed()).unwrap();
        let message = account.standard_message(b"hello");
        let signature = account.sign_data(&message, &seed()).unwrap();

        assert_eq!(
            hex::encode(signature.to_bytes()),
            "f72ca286c8e6f1a0ddf1fb6ee18c93cd649cf058b4ce7e75fab3ab2cabeb29af\
             2fdafd1b57bdefddfaddc3b89d333f5b5dbb02928a416f500792df201ad4424a01"
        );
    }
}
