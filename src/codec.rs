//! Text codecs for hashes and addresses: hex, base58, CB58 and bech32.
//!
//! CB58 is base58 over `payload || sha256(payload)[28..32]`, the final four
//! bytes of a single SHA-256 as checksum.  Bitcoin's base58check instead uses
//! the first four bytes of a double SHA-256; the two are not interchangeable.

use bech32::{self, FromBase32, ToBase32, Variant};
use eyre::{eyre, Result};

use crate::hash::sha256;

// ============================================================================
// CB58
// ============================================================================

/// Encode bytes as a CB58 string (base58 with a 4-byte SHA-256 tail checksum).
pub fn cb58_encode(data: &[u8]) -> String {
    let digest = sha256(data);

    let mut buf = Vec::with_capacity(data.len() + 4);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&digest[28..32]);

    bs58::encode(buf).into_string()
}

/// Decode a CB58 string, verifying the checksum.
pub fn cb58_decode(input: &str) -> Result<Vec<u8>> {
    let buf = bs58::decode(input)
        .into_vec()
        .map_err(|e| eyre!("invalid base58: {}", e))?;

    if buf.len() < 4 {
        return Err(eyre!("CB58 payload too short: {} bytes", buf.len()));
    }

    let (payload, checksum) = buf.split_at(buf.len() - 4);
    let digest = sha256(payload);

    if checksum != &digest[28..32] {
        return Err(eyre!("CB58 checksum mismatch"));
    }

    Ok(payload.to_vec())
}

// ============================================================================
// Bech32
// ============================================================================

/// Encode raw bytes to a bech32 address with the given prefix
pub fn encode_bech32_address(bytes: &[u8], hrp: &str) -> Result<String> {
    bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
        .map_err(|e| eyre!("failed to encode bech32: {}", e))
}

/// Decode a bech32 address to raw bytes
///
/// Returns (raw_bytes, hrp) where hrp is the human-readable prefix.
pub fn decode_bech32_address(addr: &str) -> Result<(Vec<u8>, String)> {
    let (hrp, data, _variant) =
        bech32::decode(addr).map_err(|e| eyre!("invalid bech32 address: {}", e))?;

    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| eyre!("invalid base32 data: {}", e))?;

    Ok((bytes, hrp))
}

// ============================================================================
// Hex
// ============================================================================

/// Parse a hex string, tolerating an optional `0x` prefix.
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(stripped).map_err(|e| eyre!("invalid hex: {}", e))
}

/// Check that a string (without `0x`) is valid, even-length hex.
pub fn validate_hex(input: &str) -> bool {
    input.len() % 2 == 0 && input.chars().all(|c| c.is_ascii_hexdigit())
}
