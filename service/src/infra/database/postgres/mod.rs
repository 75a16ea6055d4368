//! Postgres [`Database`] implementation.

pub mod client;
pub mod connection;
mod impls;

use std::time::Duration;

use deadpool_postgres::Runtime;
use derive_more::{Deref, Display, Error as StdError, From};
use tokio_postgres::{error::SqlState, NoTls};
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use self::{
    client::{NonTx, Tx},
    connection::Connection,
};

pub use deadpool_postgres::Config;

/// Postgres [`Database`] client.
#[derive(Clone, Copy, Debug, Deref)]
pub struct Postgres<T = NonTx>(T);

impl Postgres {
    /// Creates a new [`Postgres`] client with the provided [`Config`].
    ///
    /// Row locks taken inside transactions are waited for no longer than the
    /// provided `lock_timeout`.
    ///
    /// # Errors
    ///
    /// If failed to create a new [`Postgres`] client.
    pub fn new(
        conf: &Config,
        lock_timeout: Duration,
    ) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self(NonTx::from_pool(pool, lock_timeout)))
    }
}

/// Postgres database [`Error`].
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// [`Connection`] error.
    #[display("`Connection` error: {_0}")]
    Connection(connection::Error),

    /// Error of creating a new [`connection::Pool`] client.
    #[display("Failed to create a new `connection::Pool`: {_0}")]
    PoolCreationError(connection::PoolCreationError),

    /// [`connection::Pool`] error.
    #[display("`connection::Pool` error: {_0}")]
    PoolError(connection::PoolError),
}

impl Error {
    /// Returns the [`SqlState`] of this [`Error`], if it's a database one.
    fn code(&self) -> Option<&SqlState> {
        match self {
            Self::Connection(e) => e.code(),
            Self::PoolError(..) | Self::PoolCreationError(..) => None,
        }
    }

    /// Indicates whether the failed operation may succeed if retried later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(e) => {
                e.is_closed()
                    || [
                        SqlState::LOCK_NOT_AVAILABLE,
                        SqlState::T_R_SERIALIZATION_FAILURE,
                        SqlState::T_R_DEADLOCK_DETECTED,
                        SqlState::QUERY_CANCELED,
                        SqlState::ADMIN_SHUTDOWN,
                        SqlState::CANNOT_CONNECT_NOW,
                    ]
                    .iter()
                    .any(|c| e.code() == Some(c))
            }
            Self::PoolError(..) => true,
            Self::PoolCreationError(..) => false,
        }
    }

    /// Indicates whether the failed operation violated an exclusion
    /// constraint.
    #[must_use]
    pub fn is_exclusion_violation(&self) -> bool {
        self.code() == Some(&SqlState::EXCLUSION_VIOLATION)
    }

    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::Connection(e) => {
                e.code() == Some(&SqlState::UNIQUE_VIOLATION)
                    && constraint.map_or(true, |c| {
                        e.as_db_error().and_then(|e| e.constraint()) == Some(c)
                    })
            }
            Self::PoolError(..) | Self::PoolCreationError(..) => false,
        }
    }
}
