use serde::{Deserialize, Serialize};
use std::ops::Add;

pub const NANOS_PER_UNIT: i64 = 1_000_000_000;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Debug, Hash)]
pub struct Amount {
    nanos: i64,
}

impl Amount {
    pub fn from_nanos(nanos: i64) -> Self {
        Amount { nanos }
    }

    pub fn units(units: i64) -> Self {
        Amount {
            nanos: units * NANOS_PER_UNIT,
        }
    }

    pub fn nanos(&self) -> i64 {
        self.nanos
    }

    pub fn sum(amounts: impl IntoIterator<Item = Amount>) -> Amount {
        amounts
            .into_iter()
            .fold(Amount::from_nanos(0), |acc, a| acc + a)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount::from_nanos(self.nanos + rhs.nanos)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{:09}",
            self.nanos / NANOS_PER_UNIT,
            (self.nanos % NANOS_PER_UNIT).abs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_converts_to_nanos() {
        assert_eq!(Amount::units(2).nanos(), 2 * NANOS_PER_UNIT);
    }

    #[test]
    fn addition_sums_nanos() {
        let a = Amount::units(3);
        let b = Amount::from_nanos(500);
        assert_eq!((a + b).nanos(), 3 * NANOS_PER_UNIT + 500);
    }

    #[test]
    fn equality_is_by_nanos() {
        assert_eq!(Amount::units(1), Amount::from_nanos(NANOS_PER_UNIT));
    }

    #[test]
    fn sum_over_empty_is_zero() {
        assert_eq!(Amount::sum(vec![]), Amount::from_nanos(0));
    }
}
