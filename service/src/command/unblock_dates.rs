//! [`Command`] for releasing blocked dates of a [`Property`].

use common::{
    date,
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Calendar, Selector},
        property, Property,
    },
    infra::{database, Database},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for making the dates of a [`Property`] blocked by its host
/// available again.
///
/// Dates held by [`Booking`]s are left untouched.
///
/// [`Booking`]: crate::domain::Booking
#[derive(Clone, Copy, Debug)]
pub struct UnblockDates {
    /// ID of the [`Property`] to unblock dates of.
    pub property_id: property::Id,

    /// Dates to unblock.
    pub dates: date::Range,
}

impl<Db> Command<UnblockDates> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Calendar, Selector>>,
            Ok = Calendar,
            Err = Traced<database::Error>,
        > + Database<Update<availability::Mark>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Calendar;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: UnblockDates) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UnblockDates { property_id, dates } = cmd;
        let selector = Selector { property_id, dates };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::<Property, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let calendar = tx
            .execute(Select(By::<Calendar, _>::new(selector)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let runs = calendar.runs(availability::is_block);
        if runs.is_empty() {
            return Ok(calendar);
        }

        for run in runs {
            tx.execute(Update(availability::Mark {
                property_id,
                dates: run,
                status: availability::Status::Available,
                booking_id: None,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        }

        let calendar = tx
            .execute(Select(By::<Calendar, _>::new(selector)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache().invalidate(property_id);

        Ok(calendar)
    }
}

/// Error of [`UnblockDates`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        command::BlockDates,
        domain::availability::Status,
        testing::Fixture,
        Command as _,
    };

    use super::UnblockDates;

    #[tokio::test]
    async fn releases_blocks_keeping_bookings() {
        let f = Fixture::new().await;
        for (from, to, status) in [
            (1, 3, Status::Blocked),
            (6, 7, Status::Unavailable),
        ] {
            drop(
                f.service
                    .execute(BlockDates {
                        property_id: f.property.id,
                        dates: Fixture::dates(from, to),
                        status,
                    })
                    .await
                    .unwrap(),
            );
        }
        let b = f.book(3, 6).await;

        let calendar = f
            .service
            .execute(UnblockDates {
                property_id: f.property.id,
                dates: Fixture::dates(0, 8),
            })
            .await
            .unwrap();

        assert_eq!(
            calendar.runs(|s| s != Status::Available),
            [Fixture::dates(3, 6)],
        );
        assert!(calendar
            .days()
            .iter()
            .filter(|d| d.status == Status::Booked)
            .all(|d| d.booking_id == Some(b.id)));
    }
}
