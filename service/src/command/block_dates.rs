//! [`Command`] for blocking dates of a [`Property`].

use common::{
    date,
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        availability::{self, Calendar, Selector},
        property, Booking, Property,
    },
    infra::{database, Database},
    query,
    read::booking::{Active, Overlapping},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for marking dates of a [`Property`] as not available for
/// reservation by its host.
#[derive(Clone, Copy, Debug)]
pub struct BlockDates {
    /// ID of the [`Property`] to block dates of.
    pub property_id: property::Id,

    /// Dates to block.
    pub dates: date::Range,

    /// [`availability::Status`] to mark the dates with.
    ///
    /// Must be one of the host block statuses: [`Blocked`], [`Maintenance`]
    /// or [`Unavailable`].
    ///
    /// [`Blocked`]: availability::Status::Blocked
    /// [`Maintenance`]: availability::Status::Maintenance
    /// [`Unavailable`]: availability::Status::Unavailable
    pub status: availability::Status,
}

impl<Db> Command<BlockDates> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Active<Booking>>, Overlapping>>,
            Ok = Vec<Active<Booking>>,
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

    async fn execute(&self, cmd: BlockDates) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let BlockDates {
            property_id,
            dates,
            status,
        } = cmd;

        if !availability::is_block(status) {
            return Err(tracerr::new!(E::NotBlockStatus(status)));
        }

        self.execute(query::property::ById(property_id))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::<Property, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let overlapping = tx
            .execute(Select(By::<Vec<Active<Booking>>, _>::new(Overlapping {
                property_id,
                dates,
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(Active(b)) = overlapping.first() {
            log::debug!(
                "blocking {dates} of `Property(id: {property_id})` rejected: \
                 held by `Booking({})`",
                b.reference,
            );
            return Err(tracerr::new!(E::DatesUnavailable(dates)));
        }

        tx.execute(Update(availability::Mark {
            property_id,
            dates,
            status,
            booking_id: None,
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        let calendar = tx
            .execute(Select(By::<Calendar, _>::new(Selector {
                property_id,
                dates,
            })))
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

/// Error of [`BlockDates`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Property`] with the provided ID doesn't exist.
    #[display("`Property(id: {_0})` doesn't exist")]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// Provided [`availability::Status`] is not a host block one.
    #[display("`{_0}` is not a block status")]
    NotBlockStatus(#[error(not(source))] availability::Status),

    /// Some of the dates are held by an active [`Booking`].
    #[display("Dates {_0} are held by a `Booking`")]
    DatesUnavailable(#[error(not(source))] date::Range),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
            Self::PropertyNotExists(_) => ErrorKind::NotFound,
            Self::NotBlockStatus(_) => ErrorKind::Validation,
            Self::DatesUnavailable(_) => ErrorKind::Conflict,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::availability::Status,
        testing::Fixture,
        Command as _, ErrorKind,
    };

    use super::{BlockDates, ExecutionError};

    #[tokio::test]
    async fn blocks_free_dates() {
        let f = Fixture::new().await;

        let calendar = f
            .service
            .execute(BlockDates {
                property_id: f.property.id,
                dates: Fixture::dates(10, 13),
                status: Status::Maintenance,
            })
            .await
            .unwrap();

        assert_eq!(calendar.days().len(), 3);
        assert!(calendar.days().iter().all(|d| {
            d.status == Status::Maintenance && d.booking_id.is_none()
        }));
    }

    #[tokio::test]
    async fn rejects_dates_held_by_booking() {
        let f = Fixture::new().await;
        drop(f.book(1, 4).await);

        let err = f
            .service
            .execute(BlockDates {
                property_id: f.property.id,
                dates: Fixture::dates(3, 5),
                status: Status::Blocked,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::DatesUnavailable(_)));
        assert_eq!(err.as_ref().kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn rejects_non_block_status() {
        let f = Fixture::new().await;

        for status in [Status::Available, Status::Booked] {
            let err = f
                .service
                .execute(BlockDates {
                    property_id: f.property.id,
                    dates: Fixture::dates(1, 2),
                    status,
                })
                .await
                .unwrap_err();

            assert!(matches!(err.as_ref(), ExecutionError::NotBlockStatus(_)));
        }
    }
}
