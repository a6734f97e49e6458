// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - MULTI-CURRENCY AMOUNT
//
// Sparse map currency-id -> quantity. Absent key means zero and zero-valued
// entries are never stored, so equality, hashing and serialization only ever
// see the non-zero part. All arithmetic is checked (no wrapping, no clamping).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Currency identifier (one per issuing jurisdiction, 0..=255)
pub type CurrencyId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    /// Subtraction would push a tracked currency below zero
    NegativeBalance,
    Overflow,
}

impl std::fmt::Display for AmountError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AmountError::NegativeBalance => write!(f, "Amount would become negative"),
            AmountError::Overflow => write!(f, "Amount overflow"),
        }
    }
}

impl std::error::Error for AmountError {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<CurrencyId, u64>", into = "BTreeMap<CurrencyId, u64>")]
pub struct Amount {
    map: BTreeMap<CurrencyId, u64>,
}

impl From<BTreeMap<CurrencyId, u64>> for Amount {
    fn from(mut map: BTreeMap<CurrencyId, u64>) -> Self {
        map.retain(|_, v| *v > 0);
        Self { map }
    }
}

impl From<Amount> for BTreeMap<CurrencyId, u64> {
    fn from(amount: Amount) -> Self {
        amount.map
    }
}

impl Amount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount holding a single currency
    pub fn single(currency: CurrencyId, quantity: u64) -> Self {
        let mut amount = Self::new();
        amount.set(currency, quantity);
        amount
    }

    pub fn from_pairs<I: IntoIterator<Item = (CurrencyId, u64)>>(pairs: I) -> Result<Self, AmountError> {
        let mut amount = Self::new();
        for (currency, quantity) in pairs {
            amount = amount.checked_add(&Self::single(currency, quantity))?;
        }
        Ok(amount)
    }

    pub fn get(&self, currency: CurrencyId) -> u64 {
        self.map.get(&currency).copied().unwrap_or(0)
    }

    fn set(&mut self, currency: CurrencyId, quantity: u64) {
        if quantity == 0 {
            self.map.remove(&currency);
        } else {
            self.map.insert(currency, quantity);
        }
    }

    /// Non-zero entries in currency order
    pub fn iter(&self) -> impl Iterator<Item = (CurrencyId, u64)> + '_ {
        self.map.iter().map(|(c, q)| (*c, *q))
    }

    pub fn is_zero(&self) -> bool {
        self.map.is_empty()
    }

    /// True if at least one currency is above zero
    pub fn is_positive(&self) -> bool {
        !self.map.is_empty()
    }

    /// Per-currency sum
    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        let mut out = self.clone();
        for (currency, quantity) in other.iter() {
            let sum = out
                .get(currency)
                .checked_add(quantity)
                .ok_or(AmountError::Overflow)?;
            out.set(currency, sum);
        }
        Ok(out)
    }

    /// Per-currency difference. Fails without partial effect if any currency
    /// of `other` exceeds the same currency in `self`.
    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        if !self.dominates(other) {
            return Err(AmountError::NegativeBalance);
        }
        let mut out = self.clone();
        for (currency, quantity) in other.iter() {
            out.set(currency, out.get(currency) - quantity);
        }
        Ok(out)
    }

    /// Per-currency difference floored at zero
    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        let mut out = self.clone();
        for (currency, quantity) in other.iter() {
            out.set(currency, out.get(currency).saturating_sub(quantity));
        }
        out
    }

    /// Per-currency minimum of the two amounts
    pub fn min_per_currency(&self, other: &Amount) -> Amount {
        let mut out = Amount::new();
        for (currency, quantity) in self.iter() {
            out.set(currency, quantity.min(other.get(currency)));
        }
        out
    }

    /// `self >= other` in every currency present in either amount
    pub fn dominates(&self, other: &Amount) -> bool {
        other.iter().all(|(currency, quantity)| self.get(currency) >= quantity)
    }

    /// Checked sum of a sequence of amounts
    pub fn sum<'a, I: IntoIterator<Item = &'a Amount>>(amounts: I) -> Result<Amount, AmountError> {
        amounts
            .into_iter()
            .try_fold(Amount::new(), |acc, a| acc.checked_add(a))
    }
}

/// Amounts are only comparable when one dominates the other in every currency.
/// Otherwise `partial_cmp` is `None`, so `<` and `>` are both false.
impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else if self.dominates(other) {
            Some(Ordering::Greater)
        } else if other.dominates(self) {
            Some(Ordering::Less)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (currency, quantity)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", currency, quantity)?;
        }
        write!(f, "}}")
    }
}
