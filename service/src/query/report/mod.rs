//! Report [`Query`]s.
//!
//! [`Query`]: crate::Query

pub mod occupancy;

pub use self::occupancy::Occupancy;
