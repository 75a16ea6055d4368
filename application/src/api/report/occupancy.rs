//! [`Occupancy`] report definition.

use common::{Date, Percent};
use derive_more::From;
use juniper::graphql_object;
use service::read;

use crate::{api, Context};

/// Report of a `Property` occupancy over a range of dates.
#[derive(Clone, Copy, Debug, From)]
pub struct Occupancy(read::report::Occupancy);

/// Report of a `Property` occupancy over a range of dates.
///
/// Only confirmed, checked in, checked out and completed `Booking`s are
/// counted.
#[graphql_object(name = "OccupancyReport", context = Context)]
impl Occupancy {
    /// `Property` this report is about.
    #[must_use]
    pub fn property_id(&self) -> api::property::Id {
        self.0.property_id.into()
    }

    /// First date of the report period.
    #[must_use]
    pub fn start(&self) -> Date {
        self.0.dates.start()
    }

    /// First date after the report period.
    #[must_use]
    pub fn end(&self) -> Date {
        self.0.dates.end()
    }

    /// Number of the report period nights held by `Booking`s.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "OccupancyReport.bookedNights",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    #[must_use]
    pub fn booked_nights(&self) -> i32 {
        i32::try_from(self.0.booked_nights).unwrap_or(i32::MAX)
    }

    /// Booked nights to the report period nights ratio.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "OccupancyReport.rate",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    #[must_use]
    pub fn rate(&self) -> Percent {
        self.0.rate
    }
}
