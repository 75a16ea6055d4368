//! [`Percent`]-related definitions.

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;

/// Floating-point percentage in the `[0; 100]` range.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Percent(Decimal);

impl Percent {
    /// Zero [`Percent`].
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a new [`Percent`] by checking the provided value is in the
    /// `[0; 100]` range.
    #[must_use]
    pub fn new(val: Decimal) -> Option<Self> {
        (Decimal::ZERO..=Decimal::ONE_HUNDRED)
            .contains(&val)
            .then_some(Self(val))
    }

    /// Calculates the `numerator / denominator` ratio as a [`Percent`],
    /// rounded to 2 decimal places.
    ///
    /// [`None`] is returned if the `denominator` is zero or the ratio is out
    /// of the `[0; 100]` range.
    #[must_use]
    pub fn ratio(numerator: u32, denominator: u32) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let val = Decimal::from(numerator) * Decimal::ONE_HUNDRED
            / Decimal::from(denominator);
        Self::new(val.round_dp(2))
    }

    /// Applies this [`Percent`] to the provided `value`.
    #[must_use]
    pub fn of(self, value: Decimal) -> Decimal {
        value * self.0 / Decimal::ONE_HUNDRED
    }

    /// Returns the underlying [`Decimal`] value of this [`Percent`].
    #[must_use]
    pub fn value(self) -> Decimal {
        self.0
    }
}

impl FromStr for Percent {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .ok()
            .and_then(Self::new)
            .ok_or("invalid percent value")
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use std::str::FromStr as _;

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Floating-point percentage.
    #[graphql_scalar(with = Self, parse_token(String))]
    type Percent = super::Percent;

    impl Percent {
        fn to_output<S: ScalarValue>(m: &Percent) -> Value<S> {
            Value::scalar(m.to_string())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `Percent` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_str(s).map_err(|e| {
                        format!("Cannot parse `Percent` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use rust_decimal::Decimal;

    use super::Percent;

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn bounds() {
        assert!(Percent::new(decimal("-0.1")).is_none());
        assert!(Percent::new(decimal("100.1")).is_none());
        assert!(Percent::new(Decimal::ZERO).is_some());
        assert!(Percent::new(Decimal::ONE_HUNDRED).is_some());
        assert!("12.5".parse::<Percent>().is_ok());
        assert!("abc".parse::<Percent>().is_err());
    }

    #[test]
    fn ratio() {
        assert_eq!(Percent::ratio(1, 0), None);
        assert_eq!(Percent::ratio(3, 2), None);
        assert_eq!(Percent::ratio(3, 10).unwrap().value(), decimal("30"));
        assert_eq!(Percent::ratio(1, 3).unwrap().value(), decimal("33.33"));
    }

    #[test]
    fn applies_to_value() {
        let tax = Percent::new(decimal("10")).unwrap();

        assert_eq!(tax.of(decimal("350")), decimal("35"));
        assert_eq!(Percent::ZERO.of(decimal("350")), Decimal::ZERO);
    }
}
