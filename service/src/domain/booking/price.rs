//! Pricing of a [`Booking`].
//!
//! [`Booking`]: crate::domain::Booking

use common::{Money, Percent};
use derive_more::{Display, Error as StdError};

/// Fees of a property applied on top of its nightly price.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FeeSchedule {
    /// One-time cleaning fee.
    pub cleaning_fee: Option<Money>,

    /// One-time platform service fee.
    pub service_fee: Option<Money>,

    /// Refundable security deposit held for the stay.
    ///
    /// It's not a part of the [`Breakdown::total()`].
    pub security_deposit: Option<Money>,

    /// Tax rate applied to the discounted subtotal.
    pub tax_rate: Option<Percent>,
}

/// Input of the [`calculate()`] function.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Quote {
    /// Price of a single night.
    pub nightly_rate: Money,

    /// Number of nights to stay.
    pub nights: u32,

    /// [`FeeSchedule`] to apply.
    pub fees: FeeSchedule,

    /// Flat discount subtracted from the subtotal, if any.
    pub discount: Option<Money>,
}

/// Price breakdown of a [`Booking`].
///
/// Can only be created by [`calculate()`] (or restored from the storage via
/// [`Breakdown::restore()`]), so its [`Breakdown::total()`] is always derived
/// from the components.
///
/// [`Booking`]: crate::domain::Booking
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Breakdown {
    /// Nightly rate multiplied by the number of nights.
    base: Money,

    /// One-time cleaning fee.
    cleaning_fee: Option<Money>,

    /// One-time service fee.
    service_fee: Option<Money>,

    /// Refundable security deposit.
    security_deposit: Option<Money>,

    /// Tax on the discounted subtotal.
    tax: Option<Money>,

    /// Flat discount.
    discount: Option<Money>,
}

impl Breakdown {
    /// Restores a previously [`calculate()`]d [`Breakdown`] from its stored
    /// components.
    ///
    /// # Errors
    ///
    /// If the components are inconsistent (mixed currencies, negative amounts
    /// or a non-positive total).
    pub fn restore(
        base: Money,
        cleaning_fee: Option<Money>,
        service_fee: Option<Money>,
        security_deposit: Option<Money>,
        tax: Option<Money>,
        discount: Option<Money>,
    ) -> Result<Self, Error> {
        let this = Self {
            base,
            cleaning_fee,
            service_fee,
            security_deposit,
            tax,
            discount,
        };
        for m in [cleaning_fee, service_fee, security_deposit, tax, discount]
            .into_iter()
            .flatten()
        {
            if m.currency != base.currency {
                return Err(Error::CurrencyMismatch);
            }
            if m.is_negative() {
                return Err(Error::NegativeAmount);
            }
        }
        if !this.total().is_positive() {
            return Err(Error::NonPositiveTotal);
        }
        Ok(this)
    }

    /// Returns the nightly rate multiplied by the number of nights.
    #[must_use]
    pub fn base(&self) -> Money {
        self.base
    }

    /// Returns the cleaning fee, if any.
    #[must_use]
    pub fn cleaning_fee(&self) -> Option<Money> {
        self.cleaning_fee
    }

    /// Returns the service fee, if any.
    #[must_use]
    pub fn service_fee(&self) -> Option<Money> {
        self.service_fee
    }

    /// Returns the security deposit, if any.
    #[must_use]
    pub fn security_deposit(&self) -> Option<Money> {
        self.security_deposit
    }

    /// Returns the tax, if any.
    #[must_use]
    pub fn tax(&self) -> Option<Money> {
        self.tax
    }

    /// Returns the discount, if any.
    #[must_use]
    pub fn discount(&self) -> Option<Money> {
        self.discount
    }

    /// Returns the total price to be paid:
    /// `base + cleaning + service + tax - discount`.
    #[expect(clippy::missing_panics_doc, reason = "checked on creation")]
    #[must_use]
    pub fn total(&self) -> Money {
        self.subtotal()
            .and_then(|s| {
                s.checked_add(self.tax.unwrap_or(Money::zero(s.currency)))
            })
            .expect("checked on creation")
    }

    /// Returns `base + cleaning + service - discount`.
    fn subtotal(&self) -> Option<Money> {
        let zero = Money::zero(self.base.currency);
        self.base
            .checked_add(self.cleaning_fee.unwrap_or(zero))?
            .checked_add(self.service_fee.unwrap_or(zero))?
            .checked_sub(self.discount.unwrap_or(zero))
    }
}

/// Calculates the [`Breakdown`] of the provided [`Quote`].
///
/// # Errors
///
/// If the [`Quote`] violates any input constraint (see [`Error`]).
pub fn calculate(quote: Quote) -> Result<Breakdown, Error> {
    use Error as E;

    let Quote {
        nightly_rate,
        nights,
        fees,
        discount,
    } = quote;
    let currency = nightly_rate.currency;

    if nights == 0 {
        return Err(E::ZeroNights);
    }
    if !nightly_rate.is_positive() {
        return Err(E::NonPositiveRate);
    }
    for m in [
        fees.cleaning_fee,
        fees.service_fee,
        fees.security_deposit,
        discount,
    ]
    .into_iter()
    .flatten()
    {
        if m.currency != currency {
            return Err(E::CurrencyMismatch);
        }
        if m.is_negative() {
            return Err(E::NegativeAmount);
        }
    }

    let base = nightly_rate.checked_mul(nights).ok_or(E::Overflow)?;
    if let Some(d) = discount {
        if d.amount > base.amount {
            return Err(E::DiscountExceedsBase);
        }
    }

    let mut breakdown = Breakdown {
        base,
        cleaning_fee: fees.cleaning_fee,
        service_fee: fees.service_fee,
        security_deposit: fees.security_deposit,
        tax: None,
        discount: discount.filter(Money::is_positive),
    };
    let subtotal = breakdown.subtotal().ok_or(E::Overflow)?;
    breakdown.tax = fees
        .tax_rate
        .filter(|r| *r > Percent::ZERO)
        .map(|r| Money::new(r.of(subtotal.amount), currency).round());

    if !breakdown.total().is_positive() {
        return Err(E::NonPositiveTotal);
    }
    Ok(breakdown)
}

/// Error of a [`Breakdown`] calculation.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, StdError)]
pub enum Error {
    /// Zero nights requested.
    #[display("price cannot be calculated for zero nights")]
    ZeroNights,

    /// Nightly rate is zero or negative.
    #[display("nightly rate must be positive")]
    NonPositiveRate,

    /// Some fee or discount is negative.
    #[display("fees and discounts cannot be negative")]
    NegativeAmount,

    /// Components are in different currencies.
    #[display("all price components must be in the same currency")]
    CurrencyMismatch,

    /// Discount is greater than the base price.
    #[display("discount exceeds the base price")]
    DiscountExceedsBase,

    /// Total price is zero or negative.
    #[display("total price must be positive")]
    NonPositiveTotal,

    /// Amount overflowed.
    #[display("price amount overflow")]
    Overflow,
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money, Percent};

    use super::{calculate, Breakdown, Error, FeeSchedule, Quote};

    fn usd(s: &str) -> Money {
        Money::new(s.parse().unwrap(), Currency::Usd)
    }

    fn quote(rate: &str, nights: u32) -> Quote {
        Quote {
            nightly_rate: usd(rate),
            nights,
            fees: FeeSchedule::default(),
            discount: None,
        }
    }

    #[test]
    fn sums_base_and_fees() {
        let breakdown = calculate(Quote {
            fees: FeeSchedule {
                cleaning_fee: Some(usd("50.00")),
                ..FeeSchedule::default()
            },
            ..quote("100.00", 3)
        })
        .unwrap();

        assert_eq!(breakdown.base(), usd("300"));
        assert_eq!(breakdown.total(), usd("350.00"));
        assert_eq!(breakdown.tax(), None);
    }

    #[test]
    fn subtracts_discount_and_excludes_deposit() {
        let breakdown = calculate(Quote {
            fees: FeeSchedule {
                cleaning_fee: Some(usd("40")),
                service_fee: Some(usd("25.50")),
                security_deposit: Some(usd("500")),
                tax_rate: None,
            },
            discount: Some(usd("60")),
            ..quote("80", 5)
        })
        .unwrap();

        // 400 + 40 + 25.50 - 60
        assert_eq!(breakdown.total(), usd("405.50"));
        assert_eq!(breakdown.security_deposit(), Some(usd("500")));
    }

    #[test]
    fn applies_tax_to_discounted_subtotal() {
        let breakdown = calculate(Quote {
            fees: FeeSchedule {
                cleaning_fee: Some(usd("50")),
                tax_rate: Some(Percent::new("12.5".parse().unwrap()).unwrap()),
                ..FeeSchedule::default()
            },
            discount: Some(usd("30")),
            ..quote("100", 2)
        })
        .unwrap();

        // (200 + 50 - 30) * 12.5% = 27.50
        assert_eq!(breakdown.tax(), Some(usd("27.50")));
        assert_eq!(breakdown.total(), usd("247.50"));
    }

    #[test]
    fn rejects_invalid_input() {
        assert_eq!(calculate(quote("100", 0)), Err(Error::ZeroNights));
        assert_eq!(calculate(quote("0", 2)), Err(Error::NonPositiveRate));
        assert_eq!(
            calculate(Quote {
                discount: Some(usd("200.01")),
                ..quote("100", 2)
            }),
            Err(Error::DiscountExceedsBase),
        );
        assert_eq!(
            calculate(Quote {
                discount: Some(usd("200")),
                ..quote("100", 2)
            }),
            Err(Error::NonPositiveTotal),
        );
        assert_eq!(
            calculate(Quote {
                fees: FeeSchedule {
                    cleaning_fee: Some(Money::new(
                        "10".parse().unwrap(),
                        Currency::Eur,
                    )),
                    ..FeeSchedule::default()
                },
                ..quote("100", 2)
            }),
            Err(Error::CurrencyMismatch),
        );
        assert_eq!(
            calculate(Quote {
                fees: FeeSchedule {
                    service_fee: Some(usd("-1")),
                    ..FeeSchedule::default()
                },
                ..quote("100", 2)
            }),
            Err(Error::NegativeAmount),
        );
    }

    #[test]
    fn total_matches_components_for_many_stays() {
        for nights in 1..=30 {
            for discount in ["0", "10", "99.99"] {
                let b = calculate(Quote {
                    fees: FeeSchedule {
                        cleaning_fee: Some(usd("35")),
                        service_fee: Some(usd("12.34")),
                        ..FeeSchedule::default()
                    },
                    discount: Some(usd(discount)),
                    ..quote("99.99", nights)
                })
                .unwrap();

                let expected = b.base().amount
                    + b.cleaning_fee().unwrap().amount
                    + b.service_fee().unwrap().amount
                    - usd(discount).amount;
                assert_eq!(b.total().amount, expected);
                assert!(b.total().is_positive());
            }
        }
    }

    #[test]
    fn restores_consistent_breakdown() {
        let b = calculate(Quote {
            fees: FeeSchedule {
                cleaning_fee: Some(usd("50")),
                ..FeeSchedule::default()
            },
            ..quote("100", 3)
        })
        .unwrap();

        let restored = Breakdown::restore(
            b.base(),
            b.cleaning_fee(),
            b.service_fee(),
            b.security_deposit(),
            b.tax(),
            b.discount(),
        )
        .unwrap();
        assert_eq!(restored, b);

        assert_eq!(
            Breakdown::restore(
                usd("100"),
                None,
                None,
                None,
                None,
                Some(usd("100")),
            ),
            Err(Error::NonPositiveTotal),
        );
    }
}
