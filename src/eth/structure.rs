//! Typed-structure encoding and signing over a JSON typed-data document.
//!
//! The document has four fields: `types` (type name → ordered member list),
//! `primaryType`, `domain` (an instance of `EIP712Domain`) and `message`
//! (an instance of the primary type).  A validated document yields the
//! canonical type encoding, 32-byte-per-member value encodings, and the
//! domain-separated digest
//! `keccak256(0x19 || 0x01 || hash(domain) || hash(message))`, signed
//! recoverably with v in {27, 28}.

use alloy::primitives::{Address, U256};
use k256::ecdsa::SigningKey;
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;

use crate::codec::validate_hex;
use crate::error::TypedDataError;
use crate::eth::signature::{self, EthSignature, SignatureType};
use crate::hash::keccak256;

const DOMAIN_TYPE_NAME: &str = "EIP712Domain";

/// The product of signing a typed-data document: the raw signed bytes, their
/// keccak digest, and the recoverable signature.
#[derive(Debug, Clone)]
pub struct StructureSignResult {
    pub message: Vec<u8>,
    pub digest: [u8; 32],
    pub signature: EthSignature,
}

/// A validated typed-data document, ready to encode and sign.
#[derive(Debug)]
pub struct StructureCoder {
    types: Value,
    domain: Value,
    message: Value,
    primary_type: String,
}

// ============================================================================
// Atomic types
// ============================================================================

/// Bits for `uintN`/`intN`, when N is a valid width.
fn integer_bits(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    let bits: usize = digits.parse().ok()?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return None;
    }
    Some(bits)
}

/// Byte count for fixed-size byte types; both `bytesN` and the legacy
/// `byteN` spelling occur in the wild.
fn fixed_bytes_count(name: &str) -> Option<usize> {
    let digits = name
        .strip_prefix("bytes")
        .or_else(|| name.strip_prefix("byte"))?;
    let count: usize = digits.parse().ok()?;
    if count == 0 || count > 32 {
        return None;
    }
    Some(count)
}

fn is_atomic_type(name: &str) -> bool {
    name == "address"
        || name == "bool"
        || fixed_bytes_count(name).is_some()
        || integer_bits(name, "uint").is_some()
        || integer_bits(name, "int").is_some()
}

fn is_dynamic_type(name: &str) -> bool {
    name == "string" || name == "bytes"
}

/// Parse an integer value that may arrive as a JSON number or, as is common
/// in practice, a decimal/hex string.  Returns (magnitude, negative).
fn parse_integer(value: &Value) -> Option<(U256, bool)> {
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                Some((U256::from(unsigned), false))
            } else {
                number
                    .as_i64()
                    .map(|signed| (U256::from(signed.unsigned_abs()), signed < 0))
            }
        }
        Value::String(text) => {
            let mut text = text.trim();
            let mut negative = false;
            if let Some(rest) = text.strip_prefix('-') {
                negative = true;
                text = rest;
            } else if let Some(rest) = text.strip_prefix('+') {
                text = rest;
            }

            let magnitude = if let Some(hex) = text.strip_prefix("0x") {
                U256::from_str_radix(hex, 16).ok()?
            } else {
                U256::from_str_radix(text, 10).ok()?
            };
            Some((magnitude, negative))
        }
        _ => None,
    }
}

/// Range check against a declared bit width.  `signed_range` selects the
/// two's-complement bounds.
fn integer_in_range(magnitude: U256, negative: bool, bits: usize, signed_range: bool) -> bool {
    if !signed_range {
        !negative && magnitude.bit_len() <= bits
    } else if negative {
        // -2^(bits-1) <= value
        magnitude <= U256::from(1u8) << (bits - 1)
    } else {
        // value <= 2^(bits-1) - 1
        magnitude.bit_len() <= bits - 1
    }
}

fn extract_fixed_bytes(value: &Value, count: usize) -> Option<Vec<u8>> {
    let text = value.as_str()?;
    let text = text.strip_prefix("0x").unwrap_or(text);
    if !validate_hex(text) {
        return None;
    }
    let bytes = hex::decode(text).ok()?;
    if bytes.len() != count {
        return None;
    }
    Some(bytes)
}

fn confirm_atomic_value(value: &Value, type_name: &str) -> bool {
    if type_name == "address" {
        return value
            .as_str()
            .and_then(|text| Address::from_str(text).ok())
            .map(|address| address != Address::ZERO)
            .unwrap_or(false);
    }

    if type_name == "bool" {
        return value.is_boolean();
    }

    if let Some(count) = fixed_bytes_count(type_name) {
        return extract_fixed_bytes(value, count).is_some();
    }

    if let Some(bits) = integer_bits(type_name, "uint") {
        return parse_integer(value)
            .map(|(magnitude, negative)| integer_in_range(magnitude, negative, bits, false))
            .unwrap_or(false);
    }

    if let Some(bits) = integer_bits(type_name, "int") {
        return parse_integer(value)
            .map(|(magnitude, negative)| integer_in_range(magnitude, negative, bits, true))
            .unwrap_or(false);
    }

    false
}

/// Encode a validated atomic value to exactly 32 bytes.
fn encode_atomic_value(value: &Value, type_name: &str) -> [u8; 32] {
    let mut out = [0u8; 32];

    if type_name == "address" {
        let address = Address::from_str(value.as_str().unwrap_or_default()).unwrap_or_default();
        out[12..].copy_from_slice(address.as_slice());
        return out;
    }

    if type_name == "bool" {
        if value.as_bool().unwrap_or(false) {
            out[31] = 1;
        }
        return out;
    }

    if let Some(count) = fixed_bytes_count(type_name) {
        // Left-aligned, zero-padded to the right.
        if let Some(bytes) = extract_fixed_bytes(value, count) {
            out[..count].copy_from_slice(&bytes);
        }
        return out;
    }

    if integer_bits(type_name, "uint").is_some() {
        if let Some((magnitude, _)) = parse_integer(value) {
            out = magnitude.to_be_bytes::<32>();
        }
        return out;
    }

    if integer_bits(type_name, "int").is_some() {
        if let Some((magnitude, negative)) = parse_integer(value) {
            let raw = if negative {
                magnitude.wrapping_neg()
            } else {
                magnitude
            };
            out = raw.to_be_bytes::<32>();
        }
        return out;
    }

    out
}

fn confirm_dynamic_value(value: &Value, type_name: &str) -> bool {
    match type_name {
        "string" => value.is_string(),
        "bytes" => value
            .as_str()
            .map(|text| validate_hex(text.strip_prefix("0x").unwrap_or(text)))
            .unwrap_or(false),
        _ => false,
    }
}

/// Dynamic values encode as the keccak of their contents.
fn encode_dynamic_value(value: &Value, type_name: &str) -> [u8; 32] {
    match type_name {
        "string" => keccak256(value.as_str().unwrap_or_default().as_bytes()),
        "bytes" => {
            let text = value.as_str().unwrap_or_default();
            let text = text.strip_prefix("0x").unwrap_or(text);
            let bytes = hex::decode(text).unwrap_or_default();
            keccak256(&bytes)
        }
        _ => [0u8; 32],
    }
}

// ============================================================================
// Reference types
// ============================================================================

/// The parse of a reference-typed member: the bare type name, whether it is
/// an array, and the fixed element count (`None` for `[]`).
struct ReferenceType {
    name: String,
    array: bool,
    array_count: Option<usize>,
}

/// Parse "Type", "Type[]" or "Type[n]" where `Type` is present in `types`.
fn extract_reference_type(types: &Value, type_decl: &str) -> Option<ReferenceType> {
    if type_decl.is_empty() {
        return None;
    }

    let (name, array, array_count) = match type_decl.find('[') {
        None => (type_decl, false, None),
        Some(open) => {
            let name = &type_decl[..open];
            let rest = &type_decl[open + 1..];
            let close = rest.find(']')?;
            if close + 1 != rest.len() || name.is_empty() {
                return None;
            }
            let count_text = &rest[..close];
            if count_text.is_empty() {
                (name, true, None)
            } else {
                let count: usize = count_text.parse().ok()?;
                if count == 0 {
                    return None;
                }
                (name, true, Some(count))
            }
        }
    };

    if types.get(name).is_none() {
        return None;
    }

    Some(ReferenceType {
        name: name.to_string(),
        array,
        array_count,
    })
}

fn member_name_and_type(member: &Value) -> Option<(&str, &str)> {
    let name = member.get("name")?.as_str()?;
    let type_decl = member.get("type")?.as_str()?;
    Some((name, type_decl))
}

// ============================================================================
// Structure types
// ============================================================================

fn confirm_type_name(types: &Value, name: &str) -> bool {
    is_atomic_type(name) || is_dynamic_type(name) || extract_reference_type(types, name).is_some()
}

/// A structure type is an array of `{name, type}` members, each type known.
fn confirm_structure_type(type_def: &Value, types: &Value) -> bool {
    let members = match type_def.as_array() {
        Some(members) => members,
        None => return false,
    };

    members.iter().all(|member| {
        member_name_and_type(member)
            .map(|(_, type_decl)| confirm_type_name(types, type_decl))
            .unwrap_or(false)
    })
}

/// A value instance is valid when every member the type declares is present
/// and itself valid.
fn confirm_structure_value(value: &Value, type_def: &Value, types: &Value) -> bool {
    if !value.is_object() {
        return false;
    }
    let members = match type_def.as_array() {
        Some(members) => members,
        None => return false,
    };

    members.iter().all(|member| {
        let (member_name, member_type) = match member_name_and_type(member) {
            Some(pair) => pair,
            None => return false,
        };
        let member_value = match value.get(member_name) {
            Some(member_value) => member_value,
            None => return false,
        };
        confirm_value(member_value, types, member_type)
    })
}

fn confirm_value(value: &Value, types: &Value, type_decl: &str) -> bool {
    if is_atomic_type(type_decl) {
        return confirm_atomic_value(value, type_decl);
    }
    if is_dynamic_type(type_decl) {
        return confirm_dynamic_value(value, type_decl);
    }

    let reference = match extract_reference_type(types, type_decl) {
        Some(reference) => reference,
        None => return false,
    };
    let type_def = &types[&reference.name];

    if !reference.array {
        return confirm_structure_value(value, type_def, types);
    }

    let elements = match value.as_array() {
        Some(elements) => elements,
        None => return false,
    };
    if let Some(count) = reference.array_count {
        if elements.len() != count {
            return false;
        }
    }
    elements
        .iter()
        .all(|element| confirm_structure_value(element, type_def, types))
}

/// `Name(type1 name1,type2 name2,…)` for one structure type.
fn encode_structure_type_one(type_def: &Value, type_name: &str) -> String {
    let members = type_def.as_array().cloned().unwrap_or_default();

    let member_encodings: Vec<String> = members
        .iter()
        .filter_map(member_name_and_type)
        .map(|(name, type_decl)| format!("{} {}", type_decl, name))
        .collect();

    format!("{}({})", type_name, member_encodings.join(","))
}

/// Collect every structure type reachable from `type_name`, memoizing
/// visited names so cyclic type graphs terminate.
fn find_dependent_types(types: &Value, type_name: &str, visited: &mut HashSet<String>) {
    if !visited.insert(type_name.to_string()) {
        return;
    }

    let members = match types.get(type_name).and_then(Value::as_array) {
        Some(members) => members,
        None => return,
    };

    for member in members {
        if let Some((_, member_type)) = member_name_and_type(member) {
            if let Some(reference) = extract_reference_type(types, member_type) {
                find_dependent_types(types, &reference.name, visited);
            }
        }
    }
}

/// The full type encoding: the named type first, then every reachable
/// dependent in ascending ASCII order.
fn encode_structure_type(types: &Value, type_name: &str) -> String {
    let mut visited = HashSet::new();
    find_dependent_types(types, type_name, &mut visited);
    visited.remove(type_name);

    let mut dependents: Vec<String> = visited.into_iter().collect();
    dependents.sort();

    let mut ordered = vec![type_name.to_string()];
    ordered.extend(dependents);

    ordered
        .iter()
        .map(|name| encode_structure_type_one(&types[name], name))
        .collect::<Vec<_>>()
        .concat()
}

fn hash_structure_type(types: &Value, type_name: &str) -> [u8; 32] {
    keccak256(encode_structure_type(types, type_name).as_bytes())
}

/// Encode a structure value: the type hash, then each member at exactly 32
/// bytes, in declaration order.
fn encode_structure_value(value: &Value, types: &Value, type_name: &str) -> Vec<u8> {
    let type_def = &types[type_name];
    let members = type_def.as_array().cloned().unwrap_or_default();

    let mut out = Vec::with_capacity(32 * (1 + members.len()));
    out.extend_from_slice(&hash_structure_type(types, type_name));

    for member in &members {
        if let Some((member_name, member_type)) = member_name_and_type(member) {
            let member_value = value.get(member_name).unwrap_or(&Value::Null);
            out.extend_from_slice(&encode_value(member_value, types, member_type, true));
        }
    }

    out
}

/// Encode any value.  At the top level (`recursive == false`) a structure
/// yields its full encoding; nested structures and arrays collapse to the
/// keccak of their encoding, per the 32-bytes-per-member rule.
fn encode_value(value: &Value, types: &Value, type_decl: &str, recursive: bool) -> Vec<u8> {
    if is_atomic_type(type_decl) {
        return encode_atomic_value(value, type_decl).to_vec();
    }
    if is_dynamic_type(type_decl) {
        return encode_dynamic_value(value, type_decl).to_vec();
    }

    let reference = match extract_reference_type(types, type_decl) {
        Some(reference) => reference,
        None => return Vec::new(),
    };

    let encoding = if !reference.array {
        encode_structure_value(value, types, &reference.name)
    } else {
        let elements = value.as_array().cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(32 * elements.len());
        for element in &elements {
            out.extend_from_slice(&encode_value(element, types, &reference.name, true));
        }
        out
    };

    if recursive {
        keccak256(&encoding).to_vec()
    } else {
        encoding
    }
}

// ============================================================================
// Coder
// ============================================================================

impl StructureCoder {
    /// Validate a typed-data document.  The checks run in a fixed order so a
    /// document with several problems reports the earliest one.
    pub fn from_typed_data(typed_data: Value) -> Result<Self, TypedDataError> {
        let types = typed_data
            .get("types")
            .ok_or(TypedDataError::MissingTypes)?;

        let type_map = types
            .as_object()
            .ok_or(TypedDataError::InvalidTypesValue)?;
        for type_def in type_map.values() {
            if !confirm_structure_type(type_def, types) {
                return Err(TypedDataError::InvalidTypesValue);
            }
        }

        let domain_type = types
            .get(DOMAIN_TYPE_NAME)
            .ok_or(TypedDataError::MissingDomainType)?;

        let domain = typed_data
            .get("domain")
            .ok_or(TypedDataError::MissingDomain)?;
        if !confirm_structure_value(domain, domain_type, types) {
            return Err(TypedDataError::InvalidDomainValue);
        }

        let primary_type = typed_data
            .get("primaryType")
            .and_then(Value::as_str)
            .ok_or(TypedDataError::MissingPrimaryType)?;
        if types.get(primary_type).is_none() {
            return Err(TypedDataError::UnknownPrimaryType);
        }

        let message = typed_data
            .get("message")
            .ok_or(TypedDataError::MissingMessage)?;
        if !confirm_value(message, types, primary_type) {
            return Err(TypedDataError::InvalidMessageValue);
        }

        Ok(StructureCoder {
            types: types.clone(),
            domain: domain.clone(),
            message: message.clone(),
            primary_type: primary_type.to_string(),
        })
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    /// The canonical type encoding of `name`, or None when unknown.
    pub fn encode_type(&self, name: &str) -> Option<String> {
        if !confirm_type_name(&self.types, name) {
            return None;
        }
        if is_atomic_type(name) || is_dynamic_type(name) {
            return Some(name.to_string());
        }

        let reference = extract_reference_type(&self.types, name)?;
        if reference.array {
            Some(name.to_string())
        } else {
            Some(encode_structure_type(&self.types, &reference.name))
        }
    }

    pub fn hash_type(&self, name: &str) -> Option<[u8; 32]> {
        self.encode_type(name)
            .map(|encoding| keccak256(encoding.as_bytes()))
    }

    pub fn encode_domain(&self) -> Vec<u8> {
        encode_value(&self.domain, &self.types, DOMAIN_TYPE_NAME, false)
    }

    pub fn hash_domain(&self) -> [u8; 32] {
        keccak256(&self.encode_domain())
    }

    pub fn encode_message(&self) -> Vec<u8> {
        encode_value(&self.message, &self.types, &self.primary_type, false)
    }

    pub fn hash_message(&self) -> [u8; 32] {
        keccak256(&self.encode_message())
    }

    /// The bytes actually signed: `0x19 || 0x01 || domainHash || messageHash`.
    pub fn signing_message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(2 + 64);
        message.push(0x19);
        message.push(0x01);
        message.extend_from_slice(&self.hash_domain());
        message.extend_from_slice(&self.hash_message());
        message
    }

    pub fn digest(&self) -> [u8; 32] {
        keccak256(&self.signing_message())
    }

    /// Sign the domain-separated digest with v in {27, 28}.
    pub fn sign(&self, key: &SigningKey) -> eyre::Result<StructureSignResult> {
        let message = self.signing_message();
        let (digest, sig) =
            signature::sign_bytes(SignatureType::RecoverableVrsEip, &message, key)?;
        Ok(StructureSignResult {
            message,
            digest,
            signature: sig,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mail_document() -> Value {
        json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "Person": [
                    { "name": "name", "type": "string" },
                    { "name": "wallet", "type": "address" }
                ],
                "Mail": [
                    { "name": "from", "type": "Person" },
                    { "name": "to", "type": "Person" },
                    { "name": "contents", "type": "string" }
                ]
            },
            "primaryType": "Mail",
            "domain": {
                "name": "Ether Mail",
                "version": "1",
                "chainId": 1,
                "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
            },
            "message": {
                "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
                "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
                "contents": "Hello, Bob!"
            }
        })
    }

    #[test]
    fn test_encode_type_mail() {
        let coder = StructureCoder::from_typed_data(mail_document()).unwrap();
        assert_eq!(
            coder.encode_type("Mail").unwrap(),
            "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
        );
        assert_eq!(
            hex::encode(coder.hash_type("Mail").unwrap()),
            "a0cedeb2dc280ba39b857546d74f5549c3a1d7bdc2dd96bf881f76108e23dac2"
        );
    }

    #[test]
    fn test_domain_hash() {
        let coder = StructureCoder::from_typed_data(mail_document()).unwrap();
        assert_eq!(
            hex::encode(coder.hash_domain()),
            "f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
        );
    }

    #[test]
    fn test_sign_and_recover_cow() {
        let coder = StructureCoder::from_typed_data(mail_document()).unwrap();
        let key = SigningKey::from_slice(&keccak256(b"cow")).unwrap();
        let result = coder.sign(&key).unwrap();

        assert_eq!(result.signature.v, 28);
        assert_eq!(
            hex::encode(result.signature.r),
            "4355c47d63924e8a72e509b65029052eb6c299d53a04e167c5775fd466751c9d"
        );
        assert_eq!(
            hex::encode(result.signature.s),
            "07299936d304c153f6443dfa05f40ff007d72911b6f72307f996231605b91562"
        );

        let signer = signature::recover_address(&result.signature, &result.digest).unwrap();
        assert_eq!(
            format!("{:#x}", signer),
            "0xcd2a3d9f938e13cd947ec05abc7fe734df8dd826"
        );
    }

    #[test]
    fn test_validation_errors() {
        let assert_error = |mutate: fn(&mut Value), expected: TypedDataError| {
            let mut document = mail_document();
            mutate(&mut document);
            assert_eq!(
                StructureCoder::from_typed_data(document).unwrap_err(),
                expected
            );
        };

        assert_error(
            |d| {
                d.as_object_mut().unwrap().remove("types");
            },
            TypedDataError::MissingTypes,
        );
        assert_error(
            |d| d["types"] = json!([]),
            TypedDataError::InvalidTypesValue,
        );
        assert_error(
            |d| {
                d["types"].as_object_mut().unwrap().remove("EIP712Domain");
            },
            TypedDataError::MissingDomainType,
        );
        assert_error(
            |d| {
                d.as_object_mut().unwrap().remove("domain");
            },
            TypedDataError::MissingDomain,
        );
        assert_error(
            |d| d["domain"]["chainId"] = json!("not a number"),
            TypedDataError::InvalidDomainValue,
        );
        assert_error(
            |d| {
                d.as_object_mut().unwrap().remove("primaryType");
            },
            TypedDataError::MissingPrimaryType,
        );
        assert_error(
            |d| d["primaryType"] = json!("Missive"),
            TypedDataError::UnknownPrimaryType,
        );
        assert_error(
            |d| {
                d.as_object_mut().unwrap().remove("message");
            },
            TypedDataError::MissingMessage,
        );
        assert_error(
            |d| {
                d["message"].as_object_mut().unwrap().remove("contents");
            },
            TypedDataError::InvalidMessageValue,
        );
    }

    #[test]
    fn test_integer_ranges() {
        assert!(integer_in_range(U256::from(255u16), false, 8, false));
        assert!(!integer_in_range(U256::from(256u16), false, 8, false));
        assert!(!integer_in_range(U256::from(1u8), true, 8, false));

        assert!(integer_in_range(U256::from(127u8), false, 8, true));
        assert!(!integer_in_range(U256::from(128u16), false, 8, true));
        assert!(integer_in_range(U256::from(128u16), true, 8, true));
        assert!(!integer_in_range(U256::from(129u16), true, 8, true));
    }

    #[test]
    fn test_integers_as_strings() {
        // Indexers commonly quote integers; both spellings must validate.
        let mut document = mail_document();
        document["domain"]["chainId"] = json!("0x1");
        let coder = StructureCoder::from_typed_data(document).unwrap();
        assert_eq!(
            hex::encode(coder.hash_domain()),
            "f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
        );
    }

    #[test]
    fn test_signed_integer_encoding() {
        let value = json!("-1");
        let encoded = encode_atomic_value(&value, "int256");
        assert_eq!(encoded, [0xff; 32]);
    }

    #[test]
    fn test_reference_arrays() {
        let mut document = mail_document();
        document["types"]["Mail"] = json!([
            { "name": "from", "type": "Person" },
            { "name": "to", "type": "Person[2]" },
            { "name": "contents", "type": "string" }
        ]);
        document["message"]["to"] = json!([
            { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
            { "name": "Eve", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" }
        ]);

        let coder = StructureCoder::from_typed_data(document.clone()).unwrap();
        // Array-suffixed declarations encode as their literal declaration.
        assert_eq!(coder.encode_type("Person[2]").unwrap(), "Person[2]");

        // A wrong element count is rejected.
        document["message"]["to"].as_array_mut().unwrap().pop();
        assert_eq!(
            StructureCoder::from_typed_data(document).unwrap_err(),
            TypedDataError::InvalidMessageValue
        );
    }
}
