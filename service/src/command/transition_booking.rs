//! [`Command`] for moving a [`Booking`] through its lifecycle.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        availability,
        booking::{self, status, StateError},
        property, Booking, Property,
    },
    event,
    infra::{database, Database},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for moving a [`Booking`] to another [`booking::Status`].
#[derive(Clone, Debug)]
pub struct TransitionBooking {
    /// ID of the [`Booking`] to move.
    pub booking_id: booking::Id,

    /// [`Transition`] to perform.
    pub transition: Transition,
}

/// Lifecycle transition of a [`Booking`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transition {
    /// Confirms a pending [`Booking`].
    Confirm,

    /// Records the guest arrival.
    CheckIn,

    /// Records the guest departure.
    CheckOut,

    /// Settles the stay.
    Complete,

    /// Records the guest never arrived.
    NoShow,

    /// Cancels the [`Booking`].
    Cancel {
        /// Free-form reason of the cancellation.
        reason: String,

        /// [`booking::Actor`] cancelling the [`Booking`].
        actor: booking::Actor,
    },
}

impl Transition {
    /// Returns the [`booking::Status`] this [`Transition`] moves a [`Booking`]
    /// to.
    #[must_use]
    pub fn target(&self) -> booking::Status {
        use booking::Status as S;

        match self {
            Self::Confirm => S::Confirmed,
            Self::CheckIn => S::CheckedIn,
            Self::CheckOut => S::CheckedOut,
            Self::Complete => S::Completed,
            Self::NoShow => S::NoShow,
            Self::Cancel { .. } => S::Cancelled,
        }
    }
}

impl<Db> Command<TransitionBooking> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Update<availability::Mark>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: TransitionBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let TransitionBooking {
            booking_id,
            transition,
        } = cmd;

        if let Transition::Cancel { reason, .. } = &transition {
            if reason.trim().is_empty() {
                return Err(tracerr::new!(E::EmptyCancellationReason));
            }
        }

        let property_id = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?
            .property_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Releasing dates must not race with new reservations.
        tx.execute(Lock(By::<Property, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Lock(By::<Booking, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        let from = booking.status;
        let to = status::transition(from, transition.target()).map_err(|e| {
            log::debug!(
                "`Booking({})` transition rejected: {e}",
                booking.reference,
            );
            tracerr::new!(E::IllegalTransition(e))
        })?;

        let now = DateTime::now();
        let was_active = booking.is_active();
        booking.status = to;
        booking.updated_at = now.coerce();
        if let Transition::Cancel { reason, actor } = transition {
            booking.cancellation = Some(booking::Cancellation {
                reason,
                actor,
                at: now.coerce(),
            });
        }

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        if was_active && !booking.is_active() {
            tx.execute(Update(availability::Mark::released(&booking)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache().invalidate(booking.property_id);
        self.publish(event::BookingStatusChanged {
            booking_reference: booking.reference.clone(),
            from,
            to,
        });

        Ok(booking)
    }
}

/// Error of [`TransitionBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] with the provided ID doesn't exist.
    #[display("`Booking(id: {_0})` doesn't exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Booking`] cannot be moved to the requested [`booking::Status`].
    #[display("{_0}")]
    #[from]
    IllegalTransition(StateError),

    /// Cancellation reason is empty.
    #[display("Cancellation reason cannot be empty")]
    EmptyCancellationReason,
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
            Self::BookingNotExists(_) => ErrorKind::NotFound,
            Self::IllegalTransition(_) => ErrorKind::State,
            Self::EmptyCancellationReason => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{availability, booking},
        query,
        testing::Fixture,
        Command as _, ErrorKind, Query as _,
    };

    use super::{ExecutionError, Transition, TransitionBooking};

    async fn transition(
        f: &Fixture,
        booking: &booking::Booking,
        transition: Transition,
    ) -> Result<booking::Booking, tracerr::Traced<ExecutionError>> {
        f.service
            .execute(TransitionBooking {
                booking_id: booking.id,
                transition,
            })
            .await
    }

    fn cancel() -> Transition {
        Transition::Cancel {
            reason: "plans changed".into(),
            actor: booking::Actor::Guest,
        }
    }

    #[tokio::test]
    async fn walks_happy_path() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;

        for (t, status) in [
            (Transition::Confirm, booking::Status::Confirmed),
            (Transition::CheckIn, booking::Status::CheckedIn),
            (Transition::CheckOut, booking::Status::CheckedOut),
            (Transition::Complete, booking::Status::Completed),
        ] {
            let b = transition(&f, &b, t).await.unwrap();
            assert_eq!(b.status, status);
        }
    }

    #[tokio::test]
    async fn rejects_illegal_transition() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        for t in [
            Transition::Confirm,
            Transition::CheckIn,
            Transition::CheckOut,
            Transition::Complete,
        ] {
            drop(transition(&f, &b, t).await.unwrap());
        }

        let err = transition(&f, &b, Transition::CheckIn).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::IllegalTransition(_)));
        assert_eq!(err.as_ref().kind(), ErrorKind::State);
        let stored = f
            .service
            .execute(query::booking::ById::by(b.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, booking::Status::Completed);
    }

    #[tokio::test]
    async fn cancel_frees_dates() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;

        let cancelled = transition(&f, &b, cancel()).await.unwrap();

        assert_eq!(cancelled.status, booking::Status::Cancelled);
        let cancellation = cancelled.cancellation.unwrap();
        assert_eq!(cancellation.actor, booking::Actor::Guest);
        assert_eq!(cancellation.reason, "plans changed");

        let calendar = f
            .service
            .execute(query::availability::Calendar {
                property_id: f.property.id,
                dates: Fixture::dates(1, 4),
            })
            .await
            .unwrap();
        assert!(calendar.is_free());

        let again = f.book(1, 4).await;
        assert_ne!(again.id, b.id);
    }

    #[tokio::test]
    async fn no_show_frees_dates() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        drop(transition(&f, &b, Transition::Confirm).await.unwrap());

        drop(transition(&f, &b, Transition::NoShow).await.unwrap());

        let calendar = f
            .service
            .execute(query::availability::Calendar {
                property_id: f.property.id,
                dates: Fixture::dates(0, 5),
            })
            .await
            .unwrap();
        assert!(calendar
            .runs(|s| s == availability::Status::Booked)
            .is_empty());
    }

    #[tokio::test]
    async fn requires_cancellation_reason() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;

        let err = transition(
            &f,
            &b,
            Transition::Cancel {
                reason: "  ".into(),
                actor: booking::Actor::Host,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::EmptyCancellationReason,
        ));
    }

    #[tokio::test]
    async fn fails_on_unknown_booking() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        let mut unknown = b.clone();
        unknown.id = booking::Id::new();

        let err = transition(&f, &unknown, Transition::Confirm)
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::BookingNotExists(_)));
    }
}
