//! [`Database`]-related implementations.

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

#[cfg(feature = "memory")]
pub use self::memory::Memory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    #[cfg(feature = "memory")]
    /// [`Memory`] error.
    Memory(memory::Error),

    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),
}

impl Error {
    /// Indicates whether the failed operation may succeed if retried later
    /// (lock timeout, unavailable storage, serialization failure).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(e) => e.is_transient(),
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.is_transient(),
        }
    }

    /// Indicates whether the failed operation violated the exclusion of
    /// overlapping active bookings.
    #[must_use]
    pub fn is_exclusion_violation(&self) -> bool {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(e) => e.is_exclusion_violation(),
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.is_exclusion_violation(),
        }
    }

    /// Indicates whether the failed operation violated a uniqueness
    /// constraint, optionally the one with the provided name.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(e) => e.is_unique_violation(constraint),
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.is_unique_violation(constraint),
        }
    }
}
