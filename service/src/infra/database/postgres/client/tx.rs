//! [`Tx`] client definitions.

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLockReadGuard};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection},
};

use super::{NonTx, Slot};

/// Transactional Postgres database client.
///
/// Opens its transaction on the first statement, reusing the connection of
/// the [`NonTx`] client it was started from, if that one has any.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to acquire a connection from, if the [`NonTx`]
    /// client has none.
    pool: connection::Pool,

    /// Maximum time to wait for a row lock inside the transaction.
    lock_timeout: Duration,

    /// [`NonTx`] client this [`Tx`] client was started from.
    ///
    /// Taken once the transaction is open.
    origin: Arc<Mutex<Option<NonTx>>>,

    /// Open transaction, if any.
    slot: Arc<Slot<connection::Tx>>,
}

impl Tx {
    /// Creates a new [`Tx`] client from the provided [`NonTx`] client.
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            pool: client.pool.clone(),
            lock_timeout: client.lock_timeout,
            origin: Arc::new(Mutex::new(Some(client))),
            slot: Arc::new(Slot::new(None)),
        }
    }

    /// Returns the open transaction of this [`Tx`] client, opening it if
    /// needed.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        self.slot.get_or_connect(|| self.begin()).await
    }

    /// Opens a new transaction, reusing the connection of the [`NonTx`]
    /// client this [`Tx`] client was started from, if there is one.
    async fn begin(&self) -> Result<connection::Tx, Traced<database::Error>> {
        let reused = match self.origin.lock().await.take() {
            Some(origin) => origin.take_connection().await,
            None => None,
        };
        let conn = match reused {
            Some(c) => c,
            None => self
                .pool
                .get()
                .await
                .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                .map_err(tracerr::map_from)?,
        };

        connection::Tx::begin(conn, self.lock_timeout)
            .await
            .map_err(tracerr::wrap!())
    }

    /// Commits this [`Tx`] client.
    ///
    /// Committing a [`Tx`] client which has run no statements is a no-op.
    ///
    /// # Errors
    ///
    /// If failed to commit transaction of this [`Tx`] client.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        match self.slot.take().await {
            Some(tx) => tx.commit().await.map_err(tracerr::wrap!()),
            None => Ok(()),
        }
    }
}

delegate_connection!(Tx);
