//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal, RoundingStrategy};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Number of decimal places every [`Money`] amount is rounded to.
    pub const SCALE: u32 = 2;

    /// Creates a new [`Money`] out of the provided `amount` and `currency`.
    #[must_use]
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero [`Money`] in the provided [`Currency`].
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Indicates whether this [`Money`] is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Indicates whether this [`Money`] is less than zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Adds the `other` [`Money`] to this one.
    ///
    /// [`None`] is returned if the currencies differ or on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        (self.currency == other.currency).then_some(())?;
        Some(Self::new(
            self.amount.checked_add(other.amount)?,
            self.currency,
        ))
    }

    /// Subtracts the `other` [`Money`] from this one.
    ///
    /// [`None`] is returned if the currencies differ or on overflow.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        (self.currency == other.currency).then_some(())?;
        Some(Self::new(
            self.amount.checked_sub(other.amount)?,
            self.currency,
        ))
    }

    /// Multiplies this [`Money`] by the provided integer `factor`.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_mul(self, factor: u32) -> Option<Self> {
        Some(Self::new(
            self.amount.checked_mul(Decimal::from(factor))?,
            self.currency,
        ))
    }

    /// Rounds this [`Money`] to [`Money::SCALE`] decimal places using
    /// banker's rounding.
    #[must_use]
    pub fn round(self) -> Self {
        Self::new(
            self.amount.round_dp_with_strategy(
                Self::SCALE,
                RoundingStrategy::MidpointNearestEven,
            ),
            self.currency,
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{}{currency}", amount.normalize())
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount, as an ISO 4217 code."]
    enum Currency {
        #[doc = "US Dollar."]
        Usd = 1,

        #[doc = "Euro."]
        Eur = 2,

        #[doc = "Pound Sterling."]
        Gbp = 3,
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use std::str::FromStr as _;

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Money in `{major}.{minor}{currency}` format, where:
    /// - `major` is an integer;
    /// - `minor` is an optional integer;
    /// - `currency` is a three-letter ISO 4217 currency code.
    #[graphql_scalar(with = Self, parse_token(String))]
    type Money = super::Money;

    impl Money {
        fn to_output<S: ScalarValue>(m: &Money) -> Value<S> {
            Value::scalar(m.to_string())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `Money` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_str(s).map_err(|e| {
                        format!("Cannot parse `Money` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn usd(s: &str) -> Money {
        Money::new(s.parse().unwrap(), Currency::Usd)
    }

    #[test]
    fn parses_and_prints() {
        assert_eq!(Money::from_str("123.45USD").unwrap(), usd("123.45"));
        assert_eq!(
            Money::from_str("10GBP").unwrap(),
            Money::new(Decimal::TEN, Currency::Gbp),
        );
        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("123.45RUB").is_err());

        assert_eq!(usd("350.00").to_string(), "350USD");
        assert_eq!(usd("12.50").to_string(), "12.5USD");
    }

    #[test]
    fn arithmetic_requires_same_currency() {
        let eur = Money::new(Decimal::ONE, Currency::Eur);

        assert_eq!(usd("1.5").checked_add(usd("2")), Some(usd("3.5")));
        assert_eq!(usd("1.5").checked_sub(usd("2")), Some(usd("-0.5")));
        assert_eq!(usd("1.5").checked_add(eur), None);
        assert_eq!(usd("1.5").checked_sub(eur), None);
        assert_eq!(usd("100").checked_mul(3), Some(usd("300")));
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(usd("1.005").round(), usd("1.00"));
        assert_eq!(usd("1.015").round(), usd("1.02"));
        assert_eq!(usd("7.4449").round(), usd("7.44"));
        assert!(usd("0.01").is_positive());
        assert!(usd("-0.01").is_negative());
        assert!(!Money::zero(Currency::Usd).is_positive());
    }
}
