//! [`Command`] for creating a new [`Booking`].

use common::{
    date,
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    Date, DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Calendar},
        booking::{self, price, stay},
        property, user, Booking, Property, User,
    },
    event,
    infra::{database, Database},
    query,
    read::booking::{Active, Overlapping},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for creating a new [`Booking`] in [`booking::Status::Pending`].
#[derive(Clone, Copy, Debug)]
pub struct CreateBooking {
    /// ID of the [`Property`] to book.
    pub property_id: property::Id,

    /// ID of the [`User`] staying as a guest.
    pub guest_id: user::Id,

    /// Check-in [`Date`].
    pub check_in: Date,

    /// Check-out [`Date`].
    pub check_out: Date,

    /// Number of guests staying.
    pub guests: u16,

    /// Flat discount to apply, if any.
    pub discount: Option<Money>,
}

impl<Db> Command<CreateBooking> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
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
            Select<By<Calendar, availability::Selector>>,
            Ok = Calendar,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Update<availability::Mark>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBooking {
            property_id,
            guest_id,
            check_in,
            check_out,
            guests,
            discount,
        } = cmd;

        let property = self
            .execute(query::property::ById(property_id))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())?;

        self.database()
            .execute(Select(By::<Option<User>, _>::new(guest_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::GuestNotExists(guest_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let stay = stay::validate(
            &property,
            check_in,
            check_out,
            guests,
            Date::today(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;
        let price = price::calculate(price::Quote {
            nightly_rate: property.nightly_rate,
            nights: stay.nights(),
            fees: property.fees,
            discount,
        })
        .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Serialize reservations of the same `Property`.
        tx.execute(Lock(By::new(property.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let overlapping = tx
            .execute(Select(By::<Vec<Active<Booking>>, _>::new(Overlapping {
                property_id: property.id,
                dates: stay.dates,
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !overlapping.is_empty() {
            return Err(tracerr::new!(E::DatesUnavailable(stay.dates)));
        }

        let calendar = tx
            .execute(Select(By::<Calendar, _>::new(availability::Selector {
                property_id: property.id,
                dates: stay.dates,
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !calendar.is_free() {
            return Err(tracerr::new!(E::DatesUnavailable(stay.dates)));
        }

        let now = DateTime::now();
        let booking = Booking {
            id: booking::Id::new(),
            reference: booking::Reference::generate(),
            property_id: property.id,
            guest_id,
            stay: stay.dates,
            guests: stay.guests,
            price,
            status: booking::Status::Pending,
            payment_status: None,
            cancellation: None,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };
        unavailable_on_exclusion(
            tx.execute(Insert(booking.clone())).await,
            stay.dates,
        )?;
        tx.execute(Update(availability::Mark::booked(&booking)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        unavailable_on_exclusion(tx.execute(Commit).await, stay.dates)?;

        self.cache().invalidate(property.id);
        self.publish(event::BookingCreated::from(&booking));

        Ok(booking)
    }
}

/// Converts an exclusion violation of the provided [`Database`] result into
/// the [`ExecutionError::DatesUnavailable`].
fn unavailable_on_exclusion<T>(
    res: Result<T, Traced<database::Error>>,
    dates: date::Range,
) -> Result<(), Traced<ExecutionError>> {
    match res {
        Err(e) if e.as_ref().is_exclusion_violation() => {
            Err(tracerr::new!(ExecutionError::DatesUnavailable(dates)))
        }
        res => res
            .map(drop)
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError)),
    }
}

/// Error of [`CreateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Property`] with the provided ID doesn't exist.
    #[display("`Property(id: {_0})` doesn't exist")]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// [`User`] with the provided ID doesn't exist.
    #[display("Guest `User(id: {_0})` doesn't exist")]
    GuestNotExists(#[error(not(source))] user::Id),

    /// Requested stay violates the [`Property`] constraints.
    #[display("Invalid stay: {_0}")]
    #[from]
    Invalid(stay::ValidationError),

    /// Price cannot be calculated.
    #[display("Invalid price: {_0}")]
    #[from]
    Pricing(price::Error),

    /// Some of the requested dates are not available.
    #[display("Dates {_0} are not available")]
    DatesUnavailable(#[error(not(source))] date::Range),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
            Self::PropertyNotExists(_) | Self::GuestNotExists(_) => {
                ErrorKind::NotFound
            }
            Self::Invalid(_) | Self::Pricing(_) => ErrorKind::Validation,
            Self::DatesUnavailable(_) => ErrorKind::Conflict,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Lock, Transact};

    use crate::{
        command::{BlockDates, RegisterProperty},
        domain::{availability, booking, property, user, Property},
        infra::Database as _,
        query,
        testing::{usd, Fixture},
        Command as _, ErrorKind, Query as _,
    };

    use super::ExecutionError;

    #[tokio::test]
    async fn creates_pending_booking() {
        let f = Fixture::new().await;

        let b = f.book(1, 4).await;

        assert_eq!(b.status, booking::Status::Pending);
        assert_eq!(b.nights(), 3);
        assert_eq!(b.price.base(), usd(300));
        assert_eq!(b.price.total(), usd(350));
        assert!(b.payment_status.is_none());

        let calendar = f
            .service
            .execute(query::availability::Calendar {
                property_id: f.property.id,
                dates: Fixture::dates(0, 5),
            })
            .await
            .unwrap();
        let booked = calendar
            .days()
            .iter()
            .filter(|d| d.booking_id == Some(b.id))
            .count();
        assert_eq!(booked, 3);
        assert_eq!(
            calendar.runs(|s| s == availability::Status::Booked),
            [Fixture::dates(1, 4)],
        );
    }

    #[tokio::test]
    async fn applies_discount() {
        let f = Fixture::new().await;
        let mut cmd = f.booking(1, 4);
        cmd.discount = Some(usd(20));

        let b = f.service.execute(cmd).await.unwrap();

        assert_eq!(b.price.discount(), Some(usd(20)));
        assert_eq!(b.price.total(), usd(330));
    }

    #[tokio::test]
    async fn rejects_overlapping_dates() {
        let f = Fixture::new().await;
        drop(f.book(1, 4).await);

        let err = f.service.execute(f.booking(3, 6)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::DatesUnavailable(_)));
        assert_eq!(err.as_ref().kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn allows_back_to_back_stays() {
        let f = Fixture::new().await;
        let first = f.book(1, 4).await;

        let second = f.book(4, 6).await;

        assert_eq!(first.stay.end(), second.stay.start());
    }

    #[tokio::test]
    async fn rejects_blocked_dates() {
        let f = Fixture::new().await;
        drop(
            f.service
                .execute(BlockDates {
                    property_id: f.property.id,
                    dates: Fixture::dates(5, 6),
                    status: availability::Status::Maintenance,
                })
                .await
                .unwrap(),
        );

        let err = f.service.execute(f.booking(3, 7)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::DatesUnavailable(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_stay() {
        let f = Fixture::new().await;
        let mut cmd = f.booking(1, 4);
        cmd.guests = 5;

        let err = f.service.execute(cmd).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Invalid(_)));
        assert_eq!(err.as_ref().kind(), ErrorKind::Validation);

        let err = f.service.execute(f.booking(1, 2)).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Invalid(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_parties() {
        let f = Fixture::new().await;

        let mut cmd = f.booking(1, 4);
        cmd.property_id = property::Id::new();
        let err = f.service.execute(cmd).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::PropertyNotExists(_)));

        let mut cmd = f.booking(1, 4);
        cmd.guest_id = user::Id::new();
        let err = f.service.execute(cmd).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::GuestNotExists(_)));
        assert_eq!(err.as_ref().kind(), ErrorKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn admits_single_of_concurrent_overlapping() {
        let f = Fixture::new().await;

        let (a, b, c) = tokio::join!(
            f.service.execute(f.booking(1, 4)),
            f.service.execute(f.booking(2, 5)),
            f.service.execute(f.booking(3, 6)),
        );

        let created = [&a, &b, &c].iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1);
        for err in [a, b, c].into_iter().filter_map(Result::err) {
            assert!(matches!(
                err.as_ref(),
                ExecutionError::DatesUnavailable(_),
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn books_other_property_while_one_is_locked() {
        let f = Fixture::new().await;
        let mut other = f.property.clone();
        other.id = property::Id::new();
        drop(
            f.service
                .execute(RegisterProperty {
                    property: other.clone(),
                })
                .await
                .unwrap(),
        );
        let held = f.service.database().execute(Transact).await.unwrap();
        held.execute(Lock(By::<Property, _>::new(f.property.id)))
            .await
            .unwrap();

        let mut cmd = f.booking(1, 4);
        cmd.property_id = other.id;
        let b = f.service.execute(cmd).await.unwrap();
        assert_eq!(b.property_id, other.id);

        let err = f.service.execute(f.booking(1, 4)).await.unwrap_err();
        assert_eq!(err.as_ref().kind(), ErrorKind::Transient);
    }
}
