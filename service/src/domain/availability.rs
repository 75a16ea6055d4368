//! Per-date availability of a [`Property`].
//!
//! Only non-[`Status::Available`] dates are stored: a missing [`Day`] means
//! the [`Property`] is available on that date.

use common::{date, define_kind, Date};

use crate::domain::{booking, property, Booking};
#[cfg(doc)]
use crate::domain::Property;

define_kind! {
    #[doc = "Occupancy status of a [`Property`] on a single date."]
    enum Status {
        #[doc = "Date is free for reservation."]
        Available = 1,

        #[doc = "Date is held by an active [`Booking`]."]
        Booked = 2,

        #[doc = "Date is blocked by the host."]
        Blocked = 3,

        #[doc = "Property is under maintenance on this date."]
        Maintenance = 4,

        #[doc = "Property is unavailable on this date for any other reason."]
        Unavailable = 5,
    }
}

/// Indicates whether the provided [`Status`] is set by a host rather than by
/// a [`Booking`].
#[must_use]
pub fn is_block(status: Status) -> bool {
    matches!(
        status,
        Status::Blocked | Status::Maintenance | Status::Unavailable,
    )
}

/// Availability of a [`Property`] on a single date.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Day {
    /// Date this [`Day`] describes.
    pub date: Date,

    /// [`Status`] of the [`Property`] on this date.
    pub status: Status,

    /// ID of the [`Booking`] holding this date, if [`Status::Booked`].
    pub booking_id: Option<booking::Id>,
}

/// Rewrite of the availability of a [`Property`] for a range of dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Mark {
    /// ID of the [`Property`] to rewrite the availability of.
    pub property_id: property::Id,

    /// Dates to rewrite.
    pub dates: date::Range,

    /// New [`Status`] of the dates.
    pub status: Status,

    /// ID of the [`Booking`] holding the dates, if [`Status::Booked`].
    pub booking_id: Option<booking::Id>,
}

impl Mark {
    /// Creates a [`Mark`] of the dates held by the provided [`Booking`].
    #[must_use]
    pub fn booked(booking: &Booking) -> Self {
        Self {
            property_id: booking.property_id,
            dates: booking.stay,
            status: Status::Booked,
            booking_id: Some(booking.id),
        }
    }

    /// Creates a [`Mark`] of releasing the dates held by the provided
    /// [`Booking`].
    #[must_use]
    pub fn released(booking: &Booking) -> Self {
        Self {
            property_id: booking.property_id,
            dates: booking.stay,
            status: Status::Available,
            booking_id: None,
        }
    }

    /// Iterates over the [`Day`]s this [`Mark`] results in.
    pub fn days(&self) -> impl Iterator<Item = Day> + '_ {
        self.dates.days().map(|date| Day {
            date,
            status: self.status,
            booking_id: self.booking_id,
        })
    }
}

/// Selector of a [`Calendar`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Selector {
    /// ID of the [`Property`] to select the [`Calendar`] of.
    pub property_id: property::Id,

    /// Dates to select.
    pub dates: date::Range,
}

/// Availability of a [`Property`] for every date of a range.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Calendar {
    /// ID of the [`Property`] this [`Calendar`] describes.
    pub property_id: property::Id,

    /// Dates this [`Calendar`] covers.
    pub dates: date::Range,

    /// [`Day`]s of this [`Calendar`], one for each date of the range.
    days: Vec<Day>,
}

impl Calendar {
    /// Creates a new [`Calendar`] from the `stored` [`Day`]s, filling the
    /// missing ones with [`Status::Available`].
    ///
    /// Stored [`Day`]s outside of the `dates` are ignored.
    #[must_use]
    pub fn new(
        Selector {
            property_id,
            dates,
        }: Selector,
        stored: impl IntoIterator<Item = Day>,
    ) -> Self {
        let mut stored = stored
            .into_iter()
            .filter(|d| dates.contains(d.date))
            .collect::<Vec<_>>();
        stored.sort_by_key(|d| d.date);

        let mut stored = stored.into_iter().peekable();
        let days = dates
            .days()
            .map(|date| {
                while stored.next_if(|d| d.date < date).is_some() {}
                stored.next_if(|d| d.date == date).unwrap_or(Day {
                    date,
                    status: Status::Available,
                    booking_id: None,
                })
            })
            .collect();

        Self {
            property_id,
            dates,
            days,
        }
    }

    /// Returns all the [`Day`]s of this [`Calendar`] in chronological order.
    #[must_use]
    pub fn days(&self) -> &[Day] {
        &self.days
    }

    /// Indicates whether every date of this [`Calendar`] is available.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.days.iter().all(|d| d.status == Status::Available)
    }

    /// Returns contiguous ranges of dates of this [`Calendar`] having a
    /// status matching the provided predicate.
    #[must_use]
    pub fn runs(&self, pred: impl Fn(Status) -> bool) -> Vec<date::Range> {
        let mut runs = Vec::new();
        let mut start = None;
        for day in &self.days {
            match (start, pred(day.status)) {
                (None, true) => start = Some(day.date),
                (Some(s), false) => {
                    runs.extend(date::Range::new(s, day.date));
                    start = None;
                }
                (None, false) | (Some(_), true) => {}
            }
        }
        if let Some(s) = start {
            runs.extend(date::Range::new(s, self.dates.end()));
        }
        runs
    }
}

#[cfg(test)]
mod spec {
    use common::{date, Date};

    use crate::domain::{booking, property};

    use super::{is_block, Calendar, Day, Selector, Status};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn range(start: &str, end: &str) -> date::Range {
        date::Range::new(date(start), date(end)).unwrap()
    }

    fn day(s: &str, status: Status) -> Day {
        Day {
            date: date(s),
            status,
            booking_id: (status == Status::Booked).then(booking::Id::new),
        }
    }

    #[test]
    fn fills_missing_days() {
        let cal = Calendar::new(
            Selector {
                property_id: property::Id::new(),
                dates: range("2025-06-01", "2025-06-05"),
            },
            [
                day("2025-06-03", Status::Booked),
                day("2025-05-31", Status::Blocked),
                day("2025-06-02", Status::Maintenance),
            ],
        );

        let statuses = cal.days().iter().map(|d| d.status).collect::<Vec<_>>();
        assert_eq!(
            statuses,
            [
                Status::Available,
                Status::Maintenance,
                Status::Booked,
                Status::Available,
            ],
        );
        assert!(!cal.is_free());
    }

    #[test]
    fn finds_runs() {
        let cal = Calendar::new(
            Selector {
                property_id: property::Id::new(),
                dates: range("2025-06-01", "2025-06-08"),
            },
            [
                day("2025-06-01", Status::Blocked),
                day("2025-06-02", Status::Maintenance),
                day("2025-06-03", Status::Booked),
                day("2025-06-05", Status::Unavailable),
                day("2025-06-07", Status::Blocked),
            ],
        );

        assert_eq!(
            cal.runs(is_block),
            [
                range("2025-06-01", "2025-06-03"),
                range("2025-06-05", "2025-06-06"),
                range("2025-06-07", "2025-06-08"),
            ],
        );
        assert_eq!(
            cal.runs(|s| s == Status::Booked),
            [range("2025-06-03", "2025-06-04")],
        );
    }

    #[test]
    fn empty_calendar_is_free() {
        let cal = Calendar::new(
            Selector {
                property_id: property::Id::new(),
                dates: range("2025-06-01", "2025-06-03"),
            },
            [],
        );

        assert!(cal.is_free());
        assert_eq!(cal.days().len(), 2);
    }
}
