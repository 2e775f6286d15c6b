//! The Avalanche X-chain transaction codec: UTXO selection, canonical
//! serialization and signing.
//!
//! Serialization is deterministic: integers are big-endian at their field
//! width, arrays carry a 4-byte count, outputs sort by their serialized
//! bytes and inputs by `(txid, index)`.  Building the same transaction twice
//! from the same UTXO set yields byte-identical pre-images.

use eyre::{eyre, Result};
use rand::seq::SliceRandom;
use std::collections::HashMap;

use crate::avax::account::{AvalancheAccount, AvalancheSignature};
use crate::avax::address::AvalancheAddress;
use crate::avax::network::AvalancheNetworkParams;
use crate::hash::sha256;

/// Maximum memo length, in bytes.
pub const MEMO_MAX_BYTES: usize = 256;

/// Codec version carried in the first two serialized bytes.
const CODEC_VERSION: u16 = 0;

/// Wire tags.
const PURPOSE_BASE: u32 = 0x0000;
const PURPOSE_CREDENTIAL: u32 = 0x0009;
const OUTPUT_KIND_TRANSFER: u32 = 7;
const INPUT_KIND_TRANSFER: u32 = 5;

// ============================================================================
// UTXO
// ============================================================================

/// An unspent output.  `identifier` is the synthesized set key
/// `sha256(txid || u32_be(index))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    identifier: [u8; 32],
    pub txid: [u8; 32],
    pub index: u32,
    pub asset: [u8; 32],
    pub amount: u64,
    pub addresses: Vec<AvalancheAddress>,
}

impl Utxo {
    pub fn new(
        txid: [u8; 32],
        index: u32,
        asset: [u8; 32],
        amount: u64,
        addresses: Vec<AvalancheAddress>,
    ) -> Self {
        let mut bytes = Vec::with_capacity(36);
        bytes.extend_from_slice(&txid);
        bytes.extend_from_slice(&index.to_be_bytes());

        Utxo {
            identifier: sha256(&bytes),
            txid,
            index,
            asset,
            amount,
            addresses,
        }
    }

    pub fn identifier(&self) -> [u8; 32] {
        self.identifier
    }

    pub fn has_asset(&self, asset: &[u8; 32]) -> bool {
        &self.asset == asset
    }

    /// Index of `address` among the owners, when present.
    pub fn address_index(&self, address: &AvalancheAddress) -> Option<usize> {
        self.addresses.iter().position(|a| a == address)
    }
}

/// A set of UTXOs keyed by the synthesized identifier.
#[derive(Debug, Default)]
pub struct UtxoSet {
    utxos: HashMap<[u8; 32], Utxo>,
}

/// How `UtxoSet::search_for_amount` orders candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtxoSearch {
    AmountIncreasing,
    AmountDecreasing,
    Random,
}

impl UtxoSet {
    pub fn new() -> Self {
        UtxoSet::default()
    }

    pub fn insert(&mut self, utxo: Utxo) {
        self.utxos.insert(utxo.identifier, utxo);
    }

    pub fn remove(&mut self, identifier: &[u8; 32]) -> Option<Utxo> {
        self.utxos.remove(identifier)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Find UTXOs holding both `source` and `asset` whose amounts reach
    /// `amount_with_fee`.  Returns the selection and its total; an empty
    /// selection (and zero total) when the set cannot cover the amount.
    /// With `update` the selected UTXOs are removed from the set.
    pub fn search_for_amount(
        &mut self,
        search: UtxoSearch,
        source: &AvalancheAddress,
        asset: &[u8; 32],
        amount_with_fee: u64,
        update: bool,
    ) -> (Vec<Utxo>, u64) {
        let mut ordered: Vec<&Utxo> = self.utxos.values().collect();

        match search {
            UtxoSearch::AmountIncreasing => ordered.sort_by_key(|u| (u.amount, u.identifier)),
            UtxoSearch::AmountDecreasing => {
                ordered.sort_by_key(|u| (std::cmp::Reverse(u.amount), u.identifier))
            }
            UtxoSearch::Random => ordered.shuffle(&mut rand::thread_rng()),
        }

        let mut selected: Vec<Utxo> = Vec::new();
        let mut total: u64 = 0;

        for utxo in ordered {
            if !utxo.has_asset(asset) || utxo.address_index(source).is_none() {
                continue;
            }

            selected.push(utxo.clone());
            total = total.saturating_add(utxo.amount);

            if total >= amount_with_fee {
                break;
            }
        }

        if total < amount_with_fee {
            return (Vec::new(), 0);
        }

        if update {
            for utxo in &selected {
                self.utxos.remove(&utxo.identifier);
            }
        }

        (selected, total)
    }
}

/// Check that every UTXO holds `source` and `asset`, and that the total
/// meets `amount_with_fee`.
pub fn utxos_validate(
    utxos: &[Utxo],
    source: &AvalancheAddress,
    asset: &[u8; 32],
    amount_with_fee: u64,
) -> bool {
    let mut total: u64 = 0;

    for utxo in utxos {
        if !utxo.has_asset(asset) || utxo.address_index(source).is_none() {
            return false;
        }
        total = match total.checked_add(utxo.amount) {
            Some(total) => total,
            None => return false,
        };
    }

    total >= amount_with_fee
}

pub fn utxos_amount_total(utxos: &[Utxo]) -> u64 {
    utxos.iter().fold(0u64, |acc, u| acc.saturating_add(u.amount))
}

// ============================================================================
// Fee basis
// ============================================================================

/// Avalanche's fixed fee: a per-operation price times an operation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvalancheFeeBasis {
    pub fee_per_operation: u64,
    pub operations: u32,
}

impl AvalancheFeeBasis {
    pub fn new(fee_per_operation: u64) -> Self {
        AvalancheFeeBasis {
            fee_per_operation,
            operations: 1,
        }
    }

    pub fn fee(&self) -> u64 {
        self.fee_per_operation.saturating_mul(self.operations as u64)
    }
}

// ============================================================================
// Inputs and outputs
// ============================================================================

/// A SECP256k1 transfer input spending one UTXO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    pub txid: [u8; 32],
    pub index: u32,
    pub asset: [u8; 32],
    pub amount: u64,
    pub address_indices: Vec<u32>,
}

impl TransactionInput {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.txid);
        out.extend_from_slice(&self.index.to_be_bytes());
        out.extend_from_slice(&self.asset);
        out.extend_from_slice(&INPUT_KIND_TRANSFER.to_be_bytes());
        out.extend_from_slice(&self.amount.to_be_bytes());
        out.extend_from_slice(&(self.address_indices.len() as u32).to_be_bytes());
        for index in &self.address_indices {
            out.extend_from_slice(&index.to_be_bytes());
        }
    }
}

/// A SECP256k1 transfer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub asset: [u8; 32],
    pub locktime: u64,
    pub threshold: u32,
    pub amount: u64,
    /// Raw 20-byte X-chain owner hashes.
    pub addresses: Vec<[u8; 20]>,
}

impl TransactionOutput {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.asset);
        out.extend_from_slice(&OUTPUT_KIND_TRANSFER.to_be_bytes());
        out.extend_from_slice(&self.amount.to_be_bytes());
        out.extend_from_slice(&self.locktime.to_be_bytes());
        out.extend_from_slice(&self.threshold.to_be_bytes());
        out.extend_from_slice(&(self.addresses.len() as u32).to_be_bytes());
        for address in &self.addresses {
            out.extend_from_slice(address);
        }
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// An X-chain base transaction.
#[derive(Debug, Clone)]
pub struct AvalancheTransaction {
    pub network: AvalancheNetworkParams,
    pub source: AvalancheAddress,
    pub target: AvalancheAddress,
    pub amount: u64,
    pub fee_basis: AvalancheFeeBasis,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub memo: String,

    /// Filled at signing time; the hash covers the signature.
    hash: Option<[u8; 32]>,
    signature: Option<AvalancheSignature>,
    serialization: Vec<u8>,
}

impl AvalancheTransaction {
    /// Build a transfer from pre-selected UTXOs: one input per UTXO, an
    /// output to `target` for `amount`, and a change output when the
    /// selection exceeds `amount + fee`.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        source: AvalancheAddress,
        target: AvalancheAddress,
        change: AvalancheAddress,
        asset: [u8; 32],
        amount: u64,
        fee_basis: AvalancheFeeBasis,
        memo: &str,
        utxos: &[Utxo],
        network: AvalancheNetworkParams,
    ) -> Result<Self> {
        if memo.len() > MEMO_MAX_BYTES {
            return Err(eyre!("memo exceeds {} bytes", MEMO_MAX_BYTES));
        }

        let amount_total = amount
            .checked_add(fee_basis.fee())
            .ok_or_else(|| eyre!("amount + fee overflows"))?;

        if !utxos_validate(utxos, &source, &asset, amount_total) {
            return Err(eyre!("utxos do not cover amount {} plus fee", amount));
        }

        let mut transaction = AvalancheTransaction {
            network,
            source,
            target,
            amount,
            fee_basis,
            inputs: Vec::with_capacity(utxos.len()),
            outputs: Vec::with_capacity(2),
            memo: memo.to_string(),
            hash: None,
            signature: None,
            serialization: Vec::new(),
        };

        // Turn UTXOs into inputs until `amount + fee` is covered.
        let mut total_utxos: u64 = 0;
        for utxo in utxos {
            let address_index = utxo
                .address_index(&source)
                .expect("validated utxo holds source") as u32;

            transaction.inputs.push(TransactionInput {
                txid: utxo.txid,
                index: utxo.index,
                asset,
                amount: utxo.amount,
                address_indices: vec![address_index],
            });

            total_utxos += utxo.amount;
            if total_utxos >= amount_total {
                break;
            }
        }

        let amount_change = total_utxos - amount_total;

        transaction.outputs.push(TransactionOutput {
            asset,
            locktime: 0,
            threshold: 1,
            amount,
            addresses: vec![target.x_bytes()?],
        });

        if amount_change > 0 {
            transaction.outputs.push(TransactionOutput {
                asset,
                locktime: 0,
                threshold: 1,
                amount: amount_change,
                addresses: vec![change.x_bytes()?],
            });
        }

        Ok(transaction)
    }

    /// A placeholder transaction recovered from an indexer bundle: no inputs
    /// or outputs, just the endpoints and amounts.
    pub fn from_bundle(
        source: AvalancheAddress,
        target: AvalancheAddress,
        amount: u64,
        fee_basis: AvalancheFeeBasis,
        network: AvalancheNetworkParams,
    ) -> Self {
        AvalancheTransaction {
            network,
            source,
            target,
            amount,
            fee_basis,
            inputs: Vec::new(),
            outputs: Vec::new(),
            memo: String::new(),
            hash: None,
            signature: None,
            serialization: Vec::new(),
        }
    }

    pub fn hash(&self) -> Option<[u8; 32]> {
        self.hash
    }

    pub fn set_hash(&mut self, hash: [u8; 32]) {
        self.hash = Some(hash);
    }

    pub fn signature(&self) -> Option<AvalancheSignature> {
        self.signature
    }

    pub fn serialization(&self) -> &[u8] {
        &self.serialization
    }

    /// The unsigned body:
    /// `codec || purpose || network-id || blockchain-id || outputs || inputs || memo`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);

        out.extend_from_slice(&CODEC_VERSION.to_be_bytes());
        out.extend_from_slice(&PURPOSE_BASE.to_be_bytes());
        out.extend_from_slice(&self.network.network_id.to_be_bytes());
        out.extend_from_slice(&self.network.blockchain_id);

        // Outputs sort by their serialized bytes.
        let mut output_encodings: Vec<Vec<u8>> = self
            .outputs
            .iter()
            .map(|output| {
                let mut bytes = Vec::new();
                output.encode(&mut bytes);
                bytes
            })
            .collect();
        output_encodings.sort();

        out.extend_from_slice(&(output_encodings.len() as u32).to_be_bytes());
        for encoding in &output_encodings {
            out.extend_from_slice(encoding);
        }

        // Inputs sort by (txid, index).
        let mut inputs = self.inputs.clone();
        inputs.sort_by(|a, b| a.txid.cmp(&b.txid).then(a.index.cmp(&b.index)));

        out.extend_from_slice(&(inputs.len() as u32).to_be_bytes());
        for input in &inputs {
            input.encode(&mut out);
        }

        out.extend_from_slice(&(self.memo.len() as u32).to_be_bytes());
        out.extend_from_slice(self.memo.as_bytes());

        out
    }

    /// Serialization handed to the fee-estimation dry run: the unsigned body.
    pub fn serialize_for_fee_estimation(&self) -> Vec<u8> {
        self.encode()
    }

    /// Sign and serialize for submission.  One credential per input is
    /// appended to the body; the transaction hash is SHA-256 over the signed
    /// serialization and is only known from this point on.
    pub fn serialize_for_submission(
        &mut self,
        account: &AvalancheAccount,
        seed: &[u8; 64],
    ) -> Result<Vec<u8>> {
        if self.inputs.is_empty() {
            return Err(eyre!("cannot sign a transaction without inputs"));
        }

        let body = self.encode();
        let signature = account.sign_data(&body, seed)?;

        let signatures: Vec<AvalancheSignature> =
            std::iter::repeat(signature).take(self.inputs.len()).collect();

        let mut serialization = body;
        serialization.extend_from_slice(&encode_signature_array(&signatures));

        self.signature = Some(signature);
        self.hash = Some(sha256(&serialization));
        self.serialization = serialization.clone();

        Ok(serialization)
    }
}

/// Credentials: a 4-byte count, then per signature the credential purpose
/// tag, a 1-count, and the 65 signature bytes.
pub fn encode_signature_array(signatures: &[AvalancheSignature]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + signatures.len() * (4 + 4 + 65));

    out.extend_from_slice(&(signatures.len() as u32).to_be_bytes());
    for signature in signatures {
        out.extend_from_slice(&PURPOSE_CREDENTIAL.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&signature.to_bytes());
    }

    out
}
