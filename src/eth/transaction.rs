//! A minimal legacy (pre-typed-envelope) transaction for the gas-chain
//! family: RLP canonical encoding, replay-protected signing, keccak hash.
//!
//! The RLP encoder below covers exactly what a legacy transaction needs:
//! byte strings and one flat list.  Encode/decode pairs are not required
//! here; the serialization flows one way, to the submit client.

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};
use k256::ecdsa::SigningKey;

use crate::eth::signature::{self, EthSignature, SignatureType};
use crate::hash::keccak256;

// ============================================================================
// RLP encoding
// ============================================================================

fn rlp_encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    match bytes.len() {
        1 if bytes[0] < 0x80 => out.push(bytes[0]),
        len if len <= 55 => {
            out.push(0x80 + len as u8);
            out.extend_from_slice(bytes);
        }
        len => {
            let len_be = (len as u64).to_be_bytes();
            let len_bytes = be_trimmed(&len_be);
            out.push(0xb7 + len_bytes.len() as u8);
            out.extend_from_slice(len_bytes);
            out.extend_from_slice(bytes);
        }
    }
}

fn rlp_encode_list(payload: &[u8], out: &mut Vec<u8>) {
    match payload.len() {
        len if len <= 55 => {
            out.push(0xc0 + len as u8);
        }
        len => {
            let len_be = (len as u64).to_be_bytes();
            let len_bytes = be_trimmed(&len_be);
            out.push(0xf7 + len_bytes.len() as u8);
            out.extend_from_slice(len_bytes);
        }
    }
    out.extend_from_slice(payload);
}

/// Strip leading zeros; the canonical integer form (zero is empty).
fn be_trimmed(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn rlp_encode_u64(value: u64, out: &mut Vec<u8>) {
    rlp_encode_bytes(be_trimmed(&value.to_be_bytes()), out);
}

fn rlp_encode_u256(value: U256, out: &mut Vec<u8>) {
    rlp_encode_bytes(be_trimmed(&value.to_be_bytes::<32>()), out);
}

// ============================================================================
// Transaction
// ============================================================================

/// A legacy gas-chain transaction.
#[derive(Debug, Clone)]
pub struct EthereumTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: u64,

    signature: Option<EthSignature>,
    hash: Option<[u8; 32]>,
    serialization: Vec<u8>,
}

impl EthereumTransaction {
    pub fn new(
        nonce: u64,
        gas_price: U256,
        gas_limit: u64,
        to: Address,
        value: U256,
        data: Vec<u8>,
        chain_id: u64,
    ) -> Self {
        EthereumTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            chain_id,
            signature: None,
            hash: None,
            serialization: Vec::new(),
        }
    }

    pub fn signature(&self) -> Option<EthSignature> {
        self.signature
    }

    pub fn hash(&self) -> Option<[u8; 32]> {
        self.hash
    }

    pub fn serialization(&self) -> &[u8] {
        &self.serialization
    }

    fn encode_fields(&self, out: &mut Vec<u8>) {
        rlp_encode_u64(self.nonce, out);
        rlp_encode_u256(self.gas_price, out);
        rlp_encode_u64(self.gas_limit, out);
        rlp_encode_bytes(self.to.as_slice(), out);
        rlp_encode_u256(self.value, out);
        rlp_encode_bytes(&self.data, out);
    }

    /// The replay-protected unsigned form: fields then `(chain_id, 0, 0)`.
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(128);
        self.encode_fields(&mut payload);
        rlp_encode_u64(self.chain_id, &mut payload);
        rlp_encode_bytes(&[], &mut payload);
        rlp_encode_bytes(&[], &mut payload);

        let mut out = Vec::with_capacity(payload.len() + 4);
        rlp_encode_list(&payload, &mut out);
        out
    }

    /// The signed form: fields then `(v, r, s)` with
    /// `v = chain_id * 2 + 35 + recovery`.
    pub fn encode_signed(&self) -> Result<Vec<u8>> {
        let sig = self
            .signature
            .ok_or_else(|| eyre!("transaction is not signed"))?;

        let mut payload = Vec::with_capacity(128 + 68);
        self.encode_fields(&mut payload);
        rlp_encode_u64(self.chain_id * 2 + 35 + sig.v as u64, &mut payload);
        rlp_encode_bytes(be_trimmed(&sig.r), &mut payload);
        rlp_encode_bytes(be_trimmed(&sig.s), &mut payload);

        let mut out = Vec::with_capacity(payload.len() + 4);
        rlp_encode_list(&payload, &mut out);
        Ok(out)
    }

    /// Sign, then fill the serialization and the transaction hash.
    pub fn sign(&mut self, key: &SigningKey) -> Result<Vec<u8>> {
        let unsigned = self.encode_unsigned();
        let digest = keccak256(&unsigned);
        self.signature = Some(signature::sign_digest(
            SignatureType::RecoverableRsv,
            &digest,
            key,
        )?);

        let serialization = self.encode_signed()?;
        self.hash = Some(keccak256(&serialization));
        self.serialization = serialization.clone();
        Ok(serialization)
    }
}
