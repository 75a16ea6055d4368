//! Availability-related definitions.

use common::Date;
use derive_more::From;
use juniper::{graphql_object, GraphQLEnum};
use service::domain::availability;

use crate::{api, Context};

/// Availability of a `Property` over a range of dates.
#[derive(Clone, Debug, From)]
pub struct Calendar(availability::Calendar);

/// Availability of a `Property` over a range of dates.
#[graphql_object(context = Context)]
impl Calendar {
    /// `Property` this `Calendar` is about.
    #[must_use]
    pub fn property_id(&self) -> api::property::Id {
        self.0.property_id.into()
    }

    /// First date of this `Calendar`.
    #[must_use]
    pub fn start(&self) -> Date {
        self.0.dates.start()
    }

    /// First date after this `Calendar`.
    #[must_use]
    pub fn end(&self) -> Date {
        self.0.dates.end()
    }

    /// Indicator whether every date of this `Calendar` is available.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.0.is_free()
    }

    /// Every date of this `Calendar`, in order.
    #[must_use]
    pub fn days(&self) -> Vec<Day> {
        self.0.days().iter().copied().map(Day).collect()
    }
}

/// Availability of a `Property` on a single date.
#[derive(Clone, Copy, Debug)]
pub struct Day(availability::Day);

/// Availability of a `Property` on a single date.
#[graphql_object(name = "CalendarDay", context = Context)]
impl Day {
    /// Date this `CalendarDay` describes.
    #[must_use]
    pub fn date(&self) -> Date {
        self.0.date
    }

    /// Status of the `Property` on this date.
    #[must_use]
    pub fn status(&self) -> Status {
        self.0.status.into()
    }

    /// `Booking` holding this date, if `BOOKED`.
    #[must_use]
    pub fn booking_id(&self) -> Option<api::booking::Id> {
        self.0.booking_id.map(Into::into)
    }
}

/// Occupancy status of a `Property` on a single date.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "AvailabilityStatus")]
pub enum Status {
    /// Date is free for reservation.
    Available,

    /// Date is held by an active `Booking`.
    Booked,

    /// Date is blocked by the host.
    Blocked,

    /// `Property` is under maintenance.
    Maintenance,

    /// `Property` is unavailable for any other reason.
    Unavailable,
}

impl From<availability::Status> for Status {
    fn from(status: availability::Status) -> Self {
        use availability::Status as S;
        match status {
            S::Available => Self::Available,
            S::Booked => Self::Booked,
            S::Blocked => Self::Blocked,
            S::Maintenance => Self::Maintenance,
            S::Unavailable => Self::Unavailable,
        }
    }
}

impl From<Status> for availability::Status {
    fn from(status: Status) -> Self {
        match status {
            Status::Available => Self::Available,
            Status::Booked => Self::Booked,
            Status::Blocked => Self::Blocked,
            Status::Maintenance => Self::Maintenance,
            Status::Unavailable => Self::Unavailable,
        }
    }
}
