//! Report read model definitions.

use common::{date, Percent};

use crate::domain::property;
#[cfg(doc)]
use crate::domain::{Booking, Property};

/// Occupancy of a [`Property`] over a range of dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Occupancy {
    /// ID of the [`Property`] this [`Occupancy`] is about.
    pub property_id: property::Id,

    /// Dates this [`Occupancy`] is calculated over.
    pub dates: date::Range,

    /// Number of nights of the dates held by [`Booking`]s.
    pub booked_nights: u32,

    /// Booked nights to days of the range ratio.
    pub rate: Percent,
}
