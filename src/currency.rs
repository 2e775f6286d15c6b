//! Currencies, units and checked amounts.
//!
//! An [`Amount`] couples a signed 256-bit integer of base units with the
//! [`Unit`] it should be displayed in.  All arithmetic is checked; overflow
//! is an error, never a wrap.

use alloy::primitives::I256;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What kind of asset a currency is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencyKind {
    /// The chain's own asset.
    Native,
    /// A token embedded in another chain; `issuer` identifies it.
    Token,
}

#[derive(Debug, PartialEq, Eq)]
struct CurrencyInner {
    uids: String,
    name: String,
    code: String,
    kind: CurrencyKind,
    /// Issuing contract / asset identifier for tokens.
    issuer: Option<String>,
}

/// A currency: identifier, name, code, kind and optional issuer.
///
/// Equality is by `uids`.
#[derive(Debug, Clone)]
pub struct Currency(Arc<CurrencyInner>);

impl Currency {
    pub fn new(
        uids: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
        kind: CurrencyKind,
        issuer: Option<String>,
    ) -> Self {
        Currency(Arc::new(CurrencyInner {
            uids: uids.into(),
            name: name.into(),
            code: code.into(),
            kind,
            issuer,
        }))
    }

    pub fn uids(&self) -> &str {
        &self.0.uids
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn code(&self) -> &str {
        &self.0.code
    }

    pub fn kind(&self) -> CurrencyKind {
        self.0.kind
    }

    pub fn issuer(&self) -> Option<&str> {
        self.0.issuer.as_deref()
    }

    pub fn is_native(&self) -> bool {
        self.0.kind == CurrencyKind::Native
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.0.uids == other.0.uids
    }
}

impl Eq for Currency {}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.code)
    }
}

/// A decimal scaling of a currency relative to its base unit.
#[derive(Debug, Clone)]
pub struct Unit {
    currency: Currency,
    code: String,
    name: String,
    decimals: u8,
}

impl Unit {
    pub fn new(
        currency: Currency,
        code: impl Into<String>,
        name: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Unit {
            currency,
            code: code.into(),
            name: name.into(),
            decimals,
        }
    }

    /// The base (integer) unit of a currency: zero decimals.
    pub fn base(currency: Currency, code: impl Into<String>, name: impl Into<String>) -> Self {
        Unit::new(currency, code, name, 0)
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Two units are compatible when they scale the same currency.
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.currency == other.currency
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.currency == other.currency && self.code == other.code
    }
}

impl Eq for Unit {}

/// A signed quantity of a currency, held as base-unit integer.
///
/// Invariant: `amount.currency() == amount.unit().currency()` by
/// construction, since the unit carries the currency.
#[derive(Debug, Clone)]
pub struct Amount {
    unit: Unit,
    /// Value in base units.
    value: I256,
}

impl Amount {
    pub fn new(unit: Unit, value: I256) -> Self {
        Amount { unit, value }
    }

    pub fn zero(unit: Unit) -> Self {
        Amount {
            unit,
            value: I256::ZERO,
        }
    }

    pub fn from_u64(unit: Unit, value: u64) -> Self {
        Amount {
            unit,
            value: I256::try_from(value).expect("u64 fits in I256"),
        }
    }

    /// Parse a base-unit decimal string, as reported by an indexer.
    pub fn from_string(unit: Unit, value: &str) -> Result<Self> {
        let value = I256::from_dec_str(value.trim())
            .map_err(|e| eyre!("invalid amount '{}': {}", value, e))?;
        Ok(Amount { unit, value })
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn currency(&self) -> &Currency {
        self.unit.currency()
    }

    pub fn value(&self) -> I256 {
        self.value
    }

    /// Base-unit value as u64, when non-negative and in range.
    pub fn value_as_u64(&self) -> Result<u64> {
        u64::try_from(self.value).map_err(|_| eyre!("amount {} out of u64 range", self.value))
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_negative()
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount> {
        self.require_compatible(other)?;
        let value = self
            .value
            .checked_add(other.value)
            .ok_or_else(|| eyre!("amount overflow"))?;
        Ok(Amount {
            unit: self.unit.clone(),
            value,
        })
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount> {
        self.require_compatible(other)?;
        let value = self
            .value
            .checked_sub(other.value)
            .ok_or_else(|| eyre!("amount overflow"))?;
        Ok(Amount {
            unit: self.unit.clone(),
            value,
        })
    }

    pub fn checked_mul_u64(&self, factor: u64) -> Result<Amount> {
        let factor = I256::try_from(factor).expect("u64 fits in I256");
        let value = self
            .value
            .checked_mul(factor)
            .ok_or_else(|| eyre!("amount overflow"))?;
        Ok(Amount {
            unit: self.unit.clone(),
            value,
        })
    }

    pub fn negate(&self) -> Result<Amount> {
        let value = self
            .value
            .checked_neg()
            .ok_or_else(|| eyre!("amount overflow"))?;
        Ok(Amount {
            unit: self.unit.clone(),
            value,
        })
    }

    fn require_compatible(&self, other: &Amount) -> Result<()> {
        if !self.unit.is_compatible(&other.unit) {
            return Err(eyre!(
                "incompatible currencies: {} vs {}",
                self.currency(),
                other.currency()
            ));
        }
        Ok(())
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.unit.is_compatible(&other.unit) && self.value == other.value
    }
}

impl Eq for Amount {}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avax() -> Currency {
        Currency::new("avalanche-mainnet:avax", "Avalanche", "AVAX", CurrencyKind::Native, None)
    }

    fn navax_unit() -> Unit {
        Unit::base(avax(), "nAVAX", "nanoavax")
    }

    #[test]
    fn test_amount_arithmetic() {
        let a = Amount::from_u64(navax_unit(), 700);
        let b = Amount::from_u64(navax_unit(), 42);

        assert_eq!(a.checked_add(&b).unwrap().value_as_u64().unwrap(), 742);
        assert_eq!(a.checked_sub(&b).unwrap().value_as_u64().unwrap(), 658);
        assert!(b.checked_sub(&a).unwrap().is_negative());
    }

    #[test]
    fn test_amount_incompatible_currencies() {
        let other = Currency::new("x:other", "Other", "OTH", CurrencyKind::Token, Some("0xdead".into()));
        let a = Amount::from_u64(navax_unit(), 1);
        let b = Amount::from_u64(Unit::base(other, "OTH", "other"), 1);
        assert!(a.checked_add(&b).is_err());
    }

    #[test]
    fn test_amount_overflow_checked() {
        let max = Amount::new(navax_unit(), I256::MAX);
        let one = Amount::from_u64(navax_unit(), 1);
        assert!(max.checked_add(&one).is_err());
    }

    #[test]
    fn test_amount_parse() {
        let a = Amount::from_string(navax_unit(), "-12345").unwrap();
        assert!(a.is_negative());
        assert!(Amount::from_string(navax_unit(), "12x").is_err());
    }
}
