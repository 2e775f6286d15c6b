//! One movement of value, and its state machine.
//!
//! A transfer is identified by the indexer-assigned `uids` once known;
//! before that, by its hash, which some chains only compute at sign time
//! and some only learn from the submit reply.  State makes monotone
//! progress, with a single back-edge `Included -> Submitted` on reorg.

use alloy::primitives::I256;
use std::fmt;
use std::sync::Mutex;

use crate::address::Address;
use crate::avax::transaction::AvalancheTransaction;
use crate::currency::{Amount, Currency, Unit};
use crate::error::SubmitError;
use crate::eth::transaction::EthereumTransaction;
use crate::fee::FeeBasis;
use crate::txhash::TxHash;

/// Which way the value moved relative to the wallet's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Sent,
    Received,
    /// Source and target are both ours; only the fee leaves.
    Recovered,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Sent => "sent",
            TransferDirection::Received => "received",
            TransferDirection::Recovered => "recovered",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The transfer life cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferState {
    Created,
    Signed,
    Submitted,
    Included {
        block_number: u64,
        transaction_index: u64,
        timestamp: u64,
        success: bool,
        error: Option<String>,
    },
    Errored(SubmitError),
    Deleted,
}

impl TransferState {
    pub fn kind_str(&self) -> &'static str {
        match self {
            TransferState::Created => "created",
            TransferState::Signed => "signed",
            TransferState::Submitted => "submitted",
            TransferState::Included { .. } => "included",
            TransferState::Errored(_) => "errored",
            TransferState::Deleted => "deleted",
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, TransferState::Included { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, TransferState::Errored(_))
    }

    /// Whether `self -> next` is a legal transition.  Progress is monotone:
    /// the one back-edge is `Included -> Submitted` on a reorg, and
    /// `Errored` is terminal (short of deletion).
    pub fn allows(&self, next: &TransferState) -> bool {
        use TransferState::*;

        if matches!(next, Deleted) {
            return true;
        }

        match self {
            Created => matches!(next, Created | Signed | Submitted | Included { .. } | Errored(_)),
            Signed => matches!(next, Signed | Submitted | Included { .. } | Errored(_)),
            Submitted => matches!(next, Submitted | Included { .. } | Errored(_)),
            Included { .. } => matches!(next, Included { .. } | Submitted),
            Errored(_) => matches!(next, Errored(_)),
            Deleted => false,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind_str())
    }
}

/// The chain-specific transaction a transfer originates from.
#[derive(Debug, Clone)]
pub enum OriginatingTransaction {
    Avalanche(AvalancheTransaction),
    Ethereum(EthereumTransaction),
}

#[derive(Debug)]
struct TransferInner {
    uids: Option<String>,
    hash: Option<TxHash>,
    state: TransferState,
    confirmed_fee_basis: Option<FeeBasis>,
    attributes: Vec<(String, String)>,
    originating: Option<OriginatingTransaction>,
}

/// One movement of value.
#[derive(Debug)]
pub struct Transfer {
    unit: Unit,
    unit_for_fee: Unit,
    source: Address,
    target: Address,
    amount: Amount,
    direction: TransferDirection,
    estimated_fee_basis: Option<FeeBasis>,
    inner: Mutex<TransferInner>,
}

impl Transfer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit: Unit,
        unit_for_fee: Unit,
        source: Address,
        target: Address,
        amount: Amount,
        direction: TransferDirection,
        estimated_fee_basis: Option<FeeBasis>,
        originating: Option<OriginatingTransaction>,
    ) -> Self {
        Transfer {
            unit,
            unit_for_fee,
            source,
            target,
            amount,
            direction,
            estimated_fee_basis,
            inner: Mutex::new(TransferInner {
                uids: None,
                hash: None,
                state: TransferState::Created,
                confirmed_fee_basis: None,
                attributes: Vec::new(),
                originating,
            }),
        }
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn unit_for_fee(&self) -> &Unit {
        &self.unit_for_fee
    }

    pub fn currency(&self) -> &Currency {
        self.unit.currency()
    }

    pub fn fee_currency(&self) -> &Currency {
        self.unit_for_fee.currency()
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn estimated_fee_basis(&self) -> Option<FeeBasis> {
        self.estimated_fee_basis.clone()
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn uids(&self) -> Option<String> {
        self.inner.lock().unwrap().uids.clone()
    }

    pub fn set_uids(&self, uids: impl Into<String>) {
        self.inner.lock().unwrap().uids = Some(uids.into());
    }

    pub fn hash(&self) -> Option<TxHash> {
        self.inner.lock().unwrap().hash
    }

    /// Adopt a hash; returns true when the stored hash changed.
    pub fn set_hash(&self, hash: TxHash) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let changed = inner.hash != Some(hash);
        inner.hash = Some(hash);
        changed
    }

    /// The identifier offered to the submit client: the uids when known,
    /// else the hash's text form.
    pub fn identifier(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .uids
            .clone()
            .or_else(|| inner.hash.map(|hash| hash.to_string()))
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state(&self) -> TransferState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Apply a transition; returns `Some((old, new))` when it took effect,
    /// `None` when illegal (logged) or a no-op.
    pub fn set_state(&self, next: TransferState) -> Option<(TransferState, TransferState)> {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == next {
            return None;
        }
        if !inner.state.allows(&next) {
            tracing::warn!(
                from = inner.state.kind_str(),
                to = next.kind_str(),
                "ignoring illegal transfer state transition"
            );
            return None;
        }

        let old = std::mem::replace(&mut inner.state, next.clone());
        Some((old, next))
    }

    pub fn confirmed_fee_basis(&self) -> Option<FeeBasis> {
        self.inner.lock().unwrap().confirmed_fee_basis.clone()
    }

    pub fn set_confirmed_fee_basis(&self, basis: FeeBasis) {
        self.inner.lock().unwrap().confirmed_fee_basis = Some(basis);
    }

    /// The fee actually paid when known, else the estimate.
    pub fn fee_basis(&self) -> Option<FeeBasis> {
        self.confirmed_fee_basis()
            .or_else(|| self.estimated_fee_basis.clone())
    }

    pub fn fee(&self) -> Option<Amount> {
        self.fee_basis().and_then(|basis| basis.fee().ok())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attributes(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().attributes.clone()
    }

    pub fn set_attributes(&self, attributes: Vec<(String, String)>) {
        self.inner.lock().unwrap().attributes = attributes;
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    }

    // ========================================================================
    // Originating transaction
    // ========================================================================

    pub fn with_originating<R>(&self, f: impl FnOnce(Option<&mut OriginatingTransaction>) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(inner.originating.as_mut())
    }

    pub fn serialization(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        match &inner.originating {
            Some(OriginatingTransaction::Avalanche(tx)) if !tx.serialization().is_empty() => {
                Some(tx.serialization().to_vec())
            }
            Some(OriginatingTransaction::Ethereum(tx)) if !tx.serialization().is_empty() => {
                Some(tx.serialization().to_vec())
            }
            _ => None,
        }
    }

    // ========================================================================
    // Balance effect
    // ========================================================================

    /// The signed effect of this transfer on a wallet holding `currency`:
    /// `+amount` received, `-amount - fee` sent (fee only when paid in
    /// `currency`), `0` errored.  A transfer included without success still
    /// pays its fee.
    pub fn effect_on(&self, currency: &Currency) -> I256 {
        let state = self.state();

        if matches!(state, TransferState::Errored(_) | TransferState::Deleted) {
            return I256::ZERO;
        }

        let failed_inclusion = matches!(state, TransferState::Included { success: false, .. });

        let mut effect = I256::ZERO;

        if !failed_inclusion && self.currency() == currency {
            match self.direction {
                TransferDirection::Received => effect += self.amount.value(),
                TransferDirection::Sent => effect -= self.amount.value(),
                TransferDirection::Recovered => {}
            }
        }

        if self.direction != TransferDirection::Received && self.fee_currency() == currency {
            if let Some(fee) = self.fee() {
                effect -= fee.value();
            }
        }

        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avax::address::AvalancheAddress;
    use crate::currency::CurrencyKind;

    fn unit() -> Unit {
        let currency =
            Currency::new("avalanche-mainnet:avax", "Avalanche", "AVAX", CurrencyKind::Native, None);
        Unit::base(currency, "nAVAX", "nanoavax")
    }

    fn transfer(direction: TransferDirection) -> Transfer {
        Transfer::new(
            unit(),
            unit(),
            Address::Avalanche(AvalancheAddress::X([1; 20])),
            Address::Avalanche(AvalancheAddress::X([2; 20])),
            Amount::from_u64(unit(), 700),
            direction,
            Some(FeeBasis::Fixed {
                fee_per_operation: Amount::from_u64(unit(), 100),
                operations: 1,
            }),
            None,
        )
    }

    fn included(success: bool) -> TransferState {
        TransferState::Included {
            block_number: 10,
            transaction_index: 0,
            timestamp: 1_700_000_000,
            success,
            error: None,
        }
    }

    #[test]
    fn test_state_machine_monotone() {
        let t = transfer(TransferDirection::Sent);
        assert!(t.set_state(TransferState::Signed).is_some());
        assert!(t.set_state(TransferState::Submitted).is_some());
        assert!(t.set_state(included(true)).is_some());

        // No rewinding to signed.
        assert!(t.set_state(TransferState::Signed).is_none());
        assert_eq!(t.state(), included(true));
    }

    #[test]
    fn test_state_machine_reorg_back_edge() {
        let t = transfer(TransferDirection::Sent);
        t.set_state(TransferState::Submitted);
        t.set_state(included(true));

        // A reorg pushes the transfer back to submitted, and it may be
        // included again afterwards.
        assert!(t.set_state(TransferState::Submitted).is_some());
        assert!(t.set_state(included(true)).is_some());
    }

    #[test]
    fn test_errored_is_terminal() {
        let t = transfer(TransferDirection::Sent);
        t.set_state(TransferState::Errored(SubmitError::Unknown));
        assert!(t.set_state(TransferState::Submitted).is_none());
        assert!(t.set_state(TransferState::Deleted).is_some());
        assert!(t.set_state(TransferState::Created).is_none());
    }

    #[test]
    fn test_effect_sent_and_received() {
        let sent = transfer(TransferDirection::Sent);
        assert_eq!(sent.effect_on(unit().currency()), I256::try_from(-800).unwrap());

        let received = transfer(TransferDirection::Received);
        assert_eq!(received.effect_on(unit().currency()), I256::try_from(700).unwrap());

        let recovered = transfer(TransferDirection::Recovered);
        assert_eq!(recovered.effect_on(unit().currency()), I256::try_from(-100).unwrap());
    }

    #[test]
    fn test_effect_errored_is_zero() {
        let t = transfer(TransferDirection::Sent);
        t.set_state(TransferState::Errored(SubmitError::Unknown));
        assert_eq!(t.effect_on(unit().currency()), I256::ZERO);
    }

    #[test]
    fn test_effect_failed_inclusion_pays_fee_only() {
        let t = transfer(TransferDirection::Sent);
        t.set_state(included(false));
        assert_eq!(t.effect_on(unit().currency()), I256::try_from(-100).unwrap());
    }

    #[test]
    fn test_identifier_prefers_uids() {
        let t = transfer(TransferDirection::Sent);
        assert_eq!(t.identifier(), None);

        assert!(t.set_hash(TxHash::Avalanche([0x42; 32])));
        let by_hash = t.identifier().unwrap();

        t.set_uids("indexer:42");
        assert_eq!(t.identifier().unwrap(), "indexer:42");
        assert_ne!(by_hash, "indexer:42");
    }
}
