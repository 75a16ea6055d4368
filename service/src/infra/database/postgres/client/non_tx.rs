//! [`NonTx`] client definitions.

use std::{sync::Arc, time::Duration};

use tokio::sync::RwLockReadGuard;
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection},
};

use super::Slot;

/// Non-transactional Postgres database client.
///
/// Acquires a pooled connection on its first statement and keeps it, so a
/// [`Tx`] started from this client reuses the same connection.
///
/// [`Tx`]: super::Tx
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to acquire connections from.
    pub(crate) pool: connection::Pool,

    /// Maximum time a transaction started from this client waits for a row
    /// lock.
    pub(crate) lock_timeout: Duration,

    /// Acquired connection, if any.
    slot: Arc<Slot<connection::NonTx>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client acquiring connections from the provided
    /// [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(
        pool: connection::Pool,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            lock_timeout,
            slot: Arc::new(Slot::new(None)),
        }
    }

    /// Returns the connection of this [`NonTx`] client, acquiring it from the
    /// [`connection::Pool`] if needed.
    pub(crate) async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::NonTx>, Traced<database::Error>>
    {
        self.slot
            .get_or_connect(|| async {
                self.pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)
            })
            .await
    }

    /// Takes the acquired connection out of this [`NonTx`] client, if any.
    pub(crate) async fn take_connection(&self) -> Option<connection::NonTx> {
        self.slot.take().await
    }
}

delegate_connection!(NonTx);
