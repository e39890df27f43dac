use serde::{Deserialize, Serialize};

/// Money amount in minor currency units (paise) to avoid floating point issues.
///
/// The storefront trades in a single currency, so no currency code is carried.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units (e.g. 4000 = ₹40.00).
    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole major units.
    pub fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion.
    pub fn major(&self) -> i64 {
        self.0 / 100
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0 * i64::from(quantity))
    }

    /// Applies a rate, rounding half away from zero to the nearest minor unit.
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let product = i128::from(self.0) * i128::from(rate.bps());
        let half = i128::from(Rate::SCALE / 2);
        let scale = i128::from(Rate::SCALE);
        let rounded = if product >= 0 {
            (product + half) / scale
        } else {
            (product - half) / scale
        };
        Money(rounded as i64)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A proportional rate in basis points (1800 = 18%).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    /// Basis points in one whole.
    pub const SCALE: u32 = 10_000;

    pub fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    pub fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Money::from_major(100);
        let b = Money::from_minor(4_000);
        assert_eq!((a + b).minor(), 14_000);
        assert_eq!((a - b).minor(), 6_000);
        assert_eq!(a.multiply(2), Money::from_major(200));
    }

    #[test]
    fn apply_rate_eighteen_percent() {
        let subtotal = Money::from_major(200);
        assert_eq!(subtotal.apply_rate(Rate::from_percent(18)), Money::from_major(36));
    }

    #[test]
    fn apply_rate_rounds_half_up() {
        // 0.05 * 18% = 0.009 -> 1 paisa
        assert_eq!(Money::from_minor(5).apply_rate(Rate::from_percent(18)), Money::from_minor(1));
        // 0.02 * 18% = 0.0036 -> 0
        assert_eq!(Money::from_minor(2).apply_rate(Rate::from_percent(18)), Money::zero());
    }

    #[test]
    fn display() {
        assert_eq!(Money::from_minor(27_600).to_string(), "₹276.00");
        assert_eq!(Money::from_minor(-505).to_string(), "-₹5.05");
        assert_eq!(Rate::from_bps(1850).to_string(), "18.50%");
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [100, 250, 650].into_iter().map(Money::from_minor).sum();
        assert_eq!(total.minor(), 1_000);
    }
}
