//! Report definitions.

pub mod occupancy;

pub use self::occupancy::Occupancy;
