//! [`Booking`] definitions.

pub mod price;
pub mod stay;
pub mod status;

use std::str;

use common::{date, define_kind, unit, DateTimeOf};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{payment, property, user};
#[cfg(doc)]
use crate::domain::{Payment, Property, User};

pub use self::{
    price::Breakdown,
    stay::Stay,
    status::{StateError, Status},
};

/// Reservation of a [`Property`] for a range of dates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// Human-readable unique [`Reference`] of this [`Booking`].
    pub reference: Reference,

    /// ID of the booked [`Property`].
    pub property_id: property::Id,

    /// ID of the [`User`] staying as a guest.
    pub guest_id: user::Id,

    /// Half-open `[check_in; check_out)` range of the stay.
    pub stay: date::Range,

    /// Number of guests staying.
    pub guests: u16,

    /// Price [`Breakdown`] fixed at the moment of reservation.
    pub price: Breakdown,

    /// Current [`Status`] of this [`Booking`].
    pub status: Status,

    /// [`payment::Status`] of the latest [`Payment`] of this [`Booking`], if
    /// any.
    pub payment_status: Option<payment::Status>,

    /// [`Cancellation`] details, if this [`Booking`] is cancelled.
    pub cancellation: Option<Cancellation>,

    /// [`DateTime`] when this [`Booking`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Booking`] was last modified.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: ModificationDateTime,
}

impl Booking {
    /// Returns the number of nights of this [`Booking`].
    #[must_use]
    pub fn nights(&self) -> u32 {
        self.stay.nights()
    }

    /// Indicates whether this [`Booking`] holds its dates.
    #[must_use]
    pub fn is_active(&self) -> bool {
        status::is_active(self.status)
    }
}

/// ID of a [`Booking`].
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

/// Human-readable unique reference of a [`Booking`], like `BK-3F9A1C27B04E`.
#[derive(Clone, Debug, Display, Eq, Hash, Into, PartialEq)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Reference(String);

impl Reference {
    /// Prefix of every [`Reference`].
    pub const PREFIX: &'static str = "BK-";

    /// Generates a new random [`Reference`].
    #[must_use]
    pub fn generate() -> Self {
        let mut s = Uuid::new_v4().simple().to_string();
        s.truncate(12);
        Self(format!("{}{}", Self::PREFIX, s.to_uppercase()))
    }

    /// Creates a new [`Reference`] out of the provided string, if it's a
    /// valid one.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        let code = s.strip_prefix(Self::PREFIX)?;
        let valid = !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        valid.then_some(Self(s))
    }
}

impl str::FromStr for Reference {
    type Err = InvalidReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or(InvalidReferenceError)
    }
}

/// Error of parsing an invalid [`Reference`].
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("invalid `Booking` reference")]
pub struct InvalidReferenceError;

impl AsRef<str> for Reference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Details of a [`Booking`] cancellation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cancellation {
    /// Free-form reason of the cancellation.
    pub reason: String,

    /// [`Actor`] who cancelled the [`Booking`].
    pub actor: Actor,

    /// [`DateTime`] when the [`Booking`] was cancelled.
    ///
    /// [`DateTime`]: common::DateTime
    pub at: CancellationDateTime,
}

define_kind! {
    #[doc = "Party acting upon a [`Booking`]."]
    enum Actor {
        #[doc = "Guest of the [`Booking`]."]
        Guest = 1,

        #[doc = "Host of the booked [`Property`]."]
        Host = 2,

        #[doc = "System itself (payment reconciliation, expiration, etc)."]
        System = 3,
    }
}

/// [`DateTime`] when a [`Booking`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// [`DateTime`] when a [`Booking`] was last modified.
///
/// [`DateTime`]: common::DateTime
pub type ModificationDateTime = DateTimeOf<(Booking, unit::Modification)>;

/// [`DateTime`] when a [`Booking`] was cancelled.
///
/// [`DateTime`]: common::DateTime
pub type CancellationDateTime = DateTimeOf<(Booking, unit::Cancellation)>;
