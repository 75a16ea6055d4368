//! GraphQL API definitions.

pub mod availability;
pub mod booking;
mod mutation;
pub mod payment;
pub mod property;
mod query;
pub mod report;
pub mod user;

use common::{date, Date};
use juniper::EmptySubscription;

use crate::{define_error, Context, Error};

pub use self::{
    availability::Calendar, booking::Booking, mutation::Mutation,
    payment::Payment, property::Property, query::Query,
};

/// GraphQL schema.
pub type Schema =
    juniper::RootNode<'static, Query, Mutation, EmptySubscription<Context>>;

define_error! {
    enum DatesError {
        #[code = "INVALID_REQUEST"]
        #[status = BAD_REQUEST]
        #[message = "`to` date must come after the `from` date"]
        EmptyRange,
    }
}

/// Creates a new [`date::Range`] out of the provided dates.
///
/// # Errors
///
/// If `to` doesn't come after `from`.
pub(crate) fn dates(from: Date, to: Date) -> Result<date::Range, Error> {
    date::Range::new(from, to).ok_or_else(|| DatesError::EmptyRange.into())
}
