//! [`Booking`] read model definitions.

use common::date;

use crate::domain::property;
#[cfg(doc)]
use crate::domain::{Booking, Property};

/// Wrapper around [`Booking`] indicating that it [`is_active()`].
///
/// [`is_active()`]: Booking::is_active
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Active<T>(pub T);

/// Selector of the [`Active`] [`Booking`]s of a [`Property`] overlapping the
/// provided dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Overlapping {
    /// ID of the [`Property`] to select [`Booking`]s of.
    pub property_id: property::Id,

    /// Dates the selected [`Booking`]s overlap.
    pub dates: date::Range,
}
