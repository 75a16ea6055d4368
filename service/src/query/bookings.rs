//! [`Query`] collection related to the multiple [`Booking`]s.

use common::operations::By;

use crate::domain::{property, Booking};
#[cfg(doc)]
use crate::{domain::Property, Query};

use super::DatabaseQuery;

/// Queries all the [`Booking`]s of a [`Property`], ordered by their check-in
/// dates.
pub type OfProperty = DatabaseQuery<By<Vec<Booking>, property::Id>>;
