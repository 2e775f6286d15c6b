//! Fee bases: the structured, per-chain description of how a fee is
//! computed.

use eyre::Result;

use crate::currency::{Amount, Unit};

/// One operation's fee components on a structured-fee chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFeeBasis {
    pub gas: u64,
    pub storage: u64,
    pub counter: u64,
    pub burn: u64,
    /// Flat fee for this operation, in base units of the fee currency.
    pub fee: u64,
}

impl OperationFeeBasis {
    pub fn total(&self) -> u64 {
        self.fee.saturating_add(self.burn)
    }
}

/// The per-chain fee descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum FeeBasis {
    /// UTXO chains: a price per kilobyte and a size estimate.
    Utxo {
        price_per_kb: Amount,
        size_bytes: u64,
        fee: Amount,
    },
    /// Gas chains: a limit and a price per unit.
    Gas { limit: u64, price: Amount },
    /// Fixed-fee chains: a flat price per operation.
    Fixed {
        fee_per_operation: Amount,
        operations: u32,
    },
    /// Structured chains: per-operation components, with an optional
    /// one-time reveal operation prepended before the first outgoing
    /// transfer.
    Structured {
        unit: Unit,
        operations: Vec<OperationFeeBasis>,
        reveal: Option<OperationFeeBasis>,
    },
}

impl FeeBasis {
    /// The total fee this basis implies.
    pub fn fee(&self) -> Result<Amount> {
        match self {
            FeeBasis::Utxo { fee, .. } => Ok(fee.clone()),
            FeeBasis::Gas { limit, price } => price.checked_mul_u64(*limit),
            FeeBasis::Fixed {
                fee_per_operation,
                operations,
            } => fee_per_operation.checked_mul_u64(*operations as u64),
            FeeBasis::Structured {
                unit,
                operations,
                reveal,
            } => {
                let total = operations
                    .iter()
                    .chain(reveal.iter())
                    .fold(0u64, |acc, op| acc.saturating_add(op.total()));
                Ok(Amount::from_u64(unit.clone(), total))
            }
        }
    }

    /// The unit the fee is denominated in.
    pub fn fee_unit(&self) -> &Unit {
        match self {
            FeeBasis::Utxo { price_per_kb, .. } => price_per_kb.unit(),
            FeeBasis::Gas { price, .. } => price.unit(),
            FeeBasis::Fixed {
                fee_per_operation, ..
            } => fee_per_operation.unit(),
            FeeBasis::Structured { unit, .. } => unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{Currency, CurrencyKind};

    fn unit() -> Unit {
        let currency = Currency::new("eth:eth", "Ether", "ETH", CurrencyKind::Native, None);
        Unit::base(currency, "WEI", "wei")
    }

    #[test]
    fn test_gas_fee() {
        let basis = FeeBasis::Gas {
            limit: 21_000,
            price: Amount::from_u64(unit(), 2),
        };
        assert_eq!(basis.fee().unwrap().value_as_u64().unwrap(), 42_000);
    }

    #[test]
    fn test_fixed_fee() {
        let basis = FeeBasis::Fixed {
            fee_per_operation: Amount::from_u64(unit(), 1_000_000),
            operations: 3,
        };
        assert_eq!(basis.fee().unwrap().value_as_u64().unwrap(), 3_000_000);
    }

    #[test]
    fn test_structured_fee_includes_reveal_and_burn() {
        let op = OperationFeeBasis {
            gas: 10_000,
            storage: 100,
            counter: 7,
            burn: 50,
            fee: 420,
        };
        let reveal = OperationFeeBasis {
            gas: 1_000,
            storage: 0,
            counter: 6,
            burn: 0,
            fee: 270,
        };
        let basis = FeeBasis::Structured {
            unit: unit(),
            operations: vec![op],
            reveal: Some(reveal),
        };
        assert_eq!(basis.fee().unwrap().value_as_u64().unwrap(), 420 + 50 + 270);
    }
}
