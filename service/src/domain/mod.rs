//! Domain definitions.

pub mod availability;
pub mod booking;
pub mod payment;
pub mod property;
pub mod user;

pub use self::{
    booking::Booking, payment::Payment, property::Property, user::User,
};
