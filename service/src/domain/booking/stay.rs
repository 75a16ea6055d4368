//! Validation of a requested stay against [`Property`] constraints.

use common::{date, Date};
use derive_more::{Display, Error};

use crate::domain::Property;

/// Validated stay of a [`Property`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stay {
    /// Half-open `[check_in; check_out)` range of the stay.
    pub dates: date::Range,

    /// Number of guests staying.
    pub guests: u16,
}

impl Stay {
    /// Returns the number of nights of this [`Stay`].
    #[must_use]
    pub fn nights(&self) -> u32 {
        self.dates.nights()
    }
}

/// Validates the requested stay against the static constraints of the
/// provided [`Property`].
///
/// `today` is the current date the check-in is compared with.
///
/// # Errors
///
/// With the [`ValidationError`] naming the first failed constraint.
pub fn validate(
    property: &Property,
    check_in: Date,
    check_out: Date,
    guests: u16,
    today: Date,
) -> Result<Stay, ValidationError> {
    use ValidationError as E;

    if check_in < today {
        return Err(E::CheckInInPast);
    }
    let dates = date::Range::new(check_in, check_out)
        .ok_or(E::CheckOutNotAfterCheckIn)?;

    let nights = dates.nights();
    if nights < u32::from(property.min_nights) {
        return Err(E::TooFewNights(property.min_nights));
    }
    if nights > u32::from(property.max_nights) {
        return Err(E::TooManyNights(property.max_nights));
    }

    if guests == 0 {
        return Err(E::NoGuests);
    }
    if guests > property.max_guests {
        return Err(E::TooManyGuests(property.max_guests));
    }

    Ok(Stay { dates, guests })
}

/// Error of a stay [`validate()`]ion.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum ValidationError {
    /// Check-in date is in the past.
    #[display("check-in date cannot be in the past")]
    CheckInInPast,

    /// Check-out date doesn't come after the check-in date.
    #[display("check-out date must be after the check-in date")]
    CheckOutNotAfterCheckIn,

    /// Stay is shorter than the [`Property`] allows.
    #[display("stay must be at least {_0} nights long")]
    TooFewNights(#[error(not(source))] u16),

    /// Stay is longer than the [`Property`] allows.
    #[display("stay must be at most {_0} nights long")]
    TooManyNights(#[error(not(source))] u16),

    /// No guests are staying.
    #[display("at least one guest is required")]
    NoGuests,

    /// More guests than the [`Property`] accommodates.
    #[display("property accommodates at most {_0} guests")]
    TooManyGuests(#[error(not(source))] u16),
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Date, Money};

    use crate::domain::{booking::price::FeeSchedule, property, user, Property};

    use super::{validate, ValidationError};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn property() -> Property {
        Property {
            id: property::Id::new(),
            host_id: user::Id::new(),
            max_guests: 4,
            min_nights: 2,
            max_nights: 14,
            nightly_rate: Money::new("100".parse().unwrap(), Currency::Usd),
            fees: FeeSchedule::default(),
            instant_book: false,
        }
    }

    #[test]
    fn accepts_valid_stay() {
        let stay = validate(
            &property(),
            date("2025-06-01"),
            date("2025-06-04"),
            2,
            date("2025-05-01"),
        )
        .unwrap();

        assert_eq!(stay.nights(), 3);
        assert_eq!(stay.guests, 2);
    }

    #[test]
    fn accepts_check_in_today() {
        assert!(validate(
            &property(),
            date("2025-06-01"),
            date("2025-06-03"),
            1,
            date("2025-06-01"),
        )
        .is_ok());
    }

    #[test]
    fn names_failed_constraint() {
        let p = property();
        let today = date("2025-05-01");

        for (check_in, check_out, guests, expected) in [
            ("2025-04-30", "2025-05-03", 2, ValidationError::CheckInInPast),
            (
                "2025-06-04",
                "2025-06-04",
                2,
                ValidationError::CheckOutNotAfterCheckIn,
            ),
            (
                "2025-06-04",
                "2025-06-01",
                2,
                ValidationError::CheckOutNotAfterCheckIn,
            ),
            ("2025-06-01", "2025-06-02", 2, ValidationError::TooFewNights(2)),
            (
                "2025-06-01",
                "2025-06-16",
                2,
                ValidationError::TooManyNights(14),
            ),
            ("2025-06-01", "2025-06-03", 0, ValidationError::NoGuests),
            ("2025-06-01", "2025-06-03", 5, ValidationError::TooManyGuests(4)),
        ] {
            assert_eq!(
                validate(&p, date(check_in), date(check_out), guests, today),
                Err(expected),
                "{check_in}..{check_out} with {guests} guests",
            );
        }
    }

    #[test]
    fn accepts_bounds_inclusive() {
        let p = property();
        let today = date("2025-05-01");

        assert!(
            validate(&p, date("2025-06-01"), date("2025-06-03"), 4, today)
                .is_ok()
        );
        assert!(
            validate(&p, date("2025-06-01"), date("2025-06-15"), 1, today)
                .is_ok()
        );
    }
}
