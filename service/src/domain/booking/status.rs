//! Lifecycle of a [`Booking`].

use common::define_kind;
use derive_more::{Display, Error};

#[cfg(doc)]
use crate::domain::Booking;

define_kind! {
    #[doc = "Status of a [`Booking`] in its lifecycle."]
    enum Status {
        #[doc = "Dates are reserved, awaiting confirmation."]
        Pending = 1,

        #[doc = "Booking is confirmed by the host or by a completed payment."]
        Confirmed = 2,

        #[doc = "Guest has arrived."]
        CheckedIn = 3,

        #[doc = "Guest has left."]
        CheckedOut = 4,

        #[doc = "Stay is settled."]
        Completed = 5,

        #[doc = "Booking is cancelled by a guest, a host or the system."]
        Cancelled = 6,

        #[doc = "Guest never arrived."]
        NoShow = 7,
    }
}

/// Indicates whether a [`Booking`] in the provided [`Status`] holds its dates.
#[must_use]
pub fn is_active(status: Status) -> bool {
    matches!(
        status,
        Status::Pending | Status::Confirmed | Status::CheckedIn,
    )
}

/// Indicates whether no transition is possible out of the provided
/// [`Status`].
#[must_use]
pub fn is_terminal(status: Status) -> bool {
    matches!(
        status,
        Status::Completed | Status::Cancelled | Status::NoShow,
    )
}

/// Indicates whether a [`Booking`] may move `from` one [`Status`] `to`
/// another.
#[must_use]
pub fn can_transition(from: Status, to: Status) -> bool {
    use Status as S;

    match from {
        S::Pending => matches!(to, S::Confirmed | S::Cancelled),
        S::Confirmed => {
            matches!(to, S::CheckedIn | S::Cancelled | S::NoShow)
        }
        S::CheckedIn => matches!(to, S::CheckedOut | S::NoShow),
        S::CheckedOut => matches!(to, S::Completed),
        S::Completed | S::Cancelled | S::NoShow => false,
    }
}

/// Moves a [`Booking`] `from` one [`Status`] `to` another.
///
/// # Errors
///
/// With a [`StateError`] if the transition is illegal.
pub fn transition(from: Status, to: Status) -> Result<Status, StateError> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(StateError { from, to })
    }
}

/// Error of an illegal [`Status`] [`transition()`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[display("cannot move `Booking` from `{from}` to `{to}`")]
pub struct StateError {
    /// [`Status`] the [`Booking`] is in.
    pub from: Status,

    /// Requested [`Status`].
    pub to: Status,
}
