//! [`Property`] definitions.

use common::Money;
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{booking::price::FeeSchedule, user};
#[cfg(doc)]
use crate::domain::{user::User, Booking};

/// Read-only snapshot of a rental property's constraints.
///
/// Properties are managed by the property-management collaborator. The
/// reservation engine only consumes this snapshot and never mutates it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Property {
    /// ID of this [`Property`].
    pub id: Id,

    /// ID of the [`User`] hosting this [`Property`].
    pub host_id: user::Id,

    /// Maximum number of guests allowed in a single [`Booking`].
    pub max_guests: u16,

    /// Minimum number of nights of a single [`Booking`].
    pub min_nights: u16,

    /// Maximum number of nights of a single [`Booking`].
    pub max_nights: u16,

    /// Price of a single night.
    pub nightly_rate: Money,

    /// [`FeeSchedule`] applied on top of the nightly price.
    pub fees: FeeSchedule,

    /// Indicator whether [`Booking`]s of this [`Property`] are confirmed
    /// automatically once paid, without a host approval.
    pub instant_book: bool,
}

/// ID of a [`Property`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
