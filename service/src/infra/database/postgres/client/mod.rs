//! Postgres database client definitions.

/// Implements [`Connection`] for the provided client by running statements on
/// its lazily established `connection()`.
///
/// [`Connection`]: crate::infra::database::postgres::Connection
macro_rules! delegate_connection {
    ($client:ty) => {
        const _: () = {
            use tokio_postgres::{types::ToSql, Row, ToStatement};
            use tracerr::Traced;

            use $crate::infra::database::{self, postgres::Connection};

            impl Connection for $client {
                async fn query<T>(
                    &self,
                    stmt: &T,
                    params: &[&(dyn ToSql + Sync)],
                ) -> Result<Vec<Row>, Traced<database::Error>>
                where
                    T: ToStatement + ?Sized,
                {
                    self.connection()
                        .await
                        .map_err(tracerr::wrap!())?
                        .query(stmt, params)
                        .await
                        .map_err(tracerr::wrap!())
                }

                async fn query_opt<T>(
                    &self,
                    stmt: &T,
                    params: &[&(dyn ToSql + Sync)],
                ) -> Result<Option<Row>, Traced<database::Error>>
                where
                    T: ToStatement + ?Sized,
                {
                    self.connection()
                        .await
                        .map_err(tracerr::wrap!())?
                        .query_opt(stmt, params)
                        .await
                        .map_err(tracerr::wrap!())
                }

                async fn exec<T>(
                    &self,
                    stmt: &T,
                    params: &[&(dyn ToSql + Sync)],
                ) -> Result<u64, Traced<database::Error>>
                where
                    T: ToStatement + ?Sized,
                {
                    self.connection()
                        .await
                        .map_err(tracerr::wrap!())?
                        .exec(stmt, params)
                        .await
                        .map_err(tracerr::wrap!())
                }
            }
        };
    };
}

pub mod non_tx;
pub mod tx;

use std::future::Future;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracerr::Traced;

use crate::infra::database;

pub use self::{non_tx::NonTx, tx::Tx};

/// Slot holding a lazily established connection of a client.
#[derive(Debug)]
pub struct Slot<C>(RwLock<Option<C>>);

impl<C> Slot<C> {
    /// Creates a new [`Slot`] holding the provided connection, if any.
    #[must_use]
    pub(crate) fn new(conn: Option<C>) -> Self {
        Self(RwLock::new(conn))
    }

    /// Returns the connection held by this [`Slot`], establishing it with the
    /// provided `connect` function if there is none yet.
    ///
    /// # Errors
    ///
    /// If the `connect` function fails.
    pub(crate) async fn get_or_connect<F, Fut>(
        &self,
        connect: F,
    ) -> Result<RwLockReadGuard<'_, C>, Traced<database::Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, Traced<database::Error>>>,
    {
        {
            let held = self.0.read().await;
            if held.is_some() {
                return Ok(Self::occupied(held));
            }
        }

        let mut held = self.0.write().await;
        if held.is_none() {
            *held = Some(connect().await.map_err(tracerr::wrap!())?);
        }
        Ok(Self::occupied(held.downgrade()))
    }

    /// Takes the connection out of this [`Slot`], so the next
    /// [`Slot::get_or_connect()`] call establishes a new one.
    pub(crate) async fn take(&self) -> Option<C> {
        self.0.write().await.take()
    }

    /// Maps the provided guard of an occupied [`Slot`] to its connection.
    fn occupied(
        guard: RwLockReadGuard<'_, Option<C>>,
    ) -> RwLockReadGuard<'_, C> {
        RwLockReadGuard::map(guard, |conn| {
            conn.as_ref()
                .expect("connection cannot be dropped while guard is alive")
        })
    }
}
