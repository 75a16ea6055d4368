//! [`Command`] for reconciling a [`Payment`] with a payment provider event.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking::{self, status},
        payment::{self, event::Outcome},
        property, Booking, Payment, Property,
    },
    event::{BookingStatusChanged, PaymentStatusChanged},
    infra::{database, Database},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for applying a [`payment::Event`] to the [`Payment`] it's
/// about.
///
/// Applying the same [`payment::Event`] more than once leaves the same
/// final state. A pending [`Booking`] of an instantly bookable [`Property`]
/// is confirmed in the same transaction its [`Payment`] completes in.
#[derive(Clone, Debug)]
pub struct ProcessPaymentEvent {
    /// [`payment::Event`] to apply.
    pub event: payment::Event,
}

/// Output of [`ProcessPaymentEvent`] [`Command`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Output {
    /// [`payment::Event`] is applied, resulting in the provided [`Payment`].
    Applied(Payment),

    /// [`payment::Event`] is already reflected in the [`Payment`] with the
    /// provided ID.
    Duplicate(payment::Id),

    /// [`payment::Event`] contradicts the [`Payment`] with the provided ID.
    Mismatch(payment::Id),
}

impl<Db> Command<ProcessPaymentEvent> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Payment>, payment::ProviderId>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Lock<By<Payment, payment::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, booking::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Update<Payment>, Err = Traced<database::Error>>
        + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ProcessPaymentEvent,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ProcessPaymentEvent { event } = cmd;

        let mut found = None;
        for id in event.lookup() {
            found = self
                .database()
                .execute(Select(By::<Option<Payment>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if found.is_some() {
                break;
            }
        }
        let Payment { id, booking_id, .. } = found
            .ok_or_else(|| E::PaymentNotFound(event.resource_id.clone()))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::<Booking, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Lock(By::<Payment, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let current = tx
            .execute(Select(By::<Option<Payment>, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::PaymentNotFound(event.resource_id.clone()))
            .map_err(tracerr::wrap!())?;

        let mut payment = match event.apply(&current) {
            Outcome::Applied(p) => p,
            Outcome::Duplicate => {
                log::debug!(
                    "payment event `{}` is already reflected in \
                     `Payment({})`",
                    event.resource_id,
                    current.reference,
                );
                return Ok(Output::Duplicate(id));
            }
            Outcome::Mismatch => {
                log::warn!(
                    "payment event `{}` contradicts `Payment({})`, discarded",
                    event.resource_id,
                    current.reference,
                );
                return Ok(Output::Mismatch(id));
            }
        };
        let now = DateTime::now();
        payment.updated_at = now.coerce();

        match tx.execute(Update(payment.clone())).await {
            Err(e)
                if e.as_ref()
                    .is_unique_violation(Some("payments_capture_id_key")) =>
            {
                log::warn!(
                    "payment event `{}` reports a capture of another \
                     `Payment`, discarded",
                    event.resource_id,
                );
                return Ok(Output::Mismatch(id));
            }
            res => res.map_err(tracerr::map_from_and_wrap!(=> E)).map(drop)?,
        }

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        let before = booking.clone();

        // Only the latest attempt is mirrored on the `Booking`.
        let latest = tx
            .execute(Select(By::<Option<Payment>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if latest.is_some_and(|p| p.id == payment.id) {
            booking.payment_status = Some(payment.status);
        }

        if payment.status == payment::Status::Completed
            && booking.status == booking::Status::Pending
        {
            let instant = self
                .database()
                .execute(Select(By::<Option<Property>, _>::new(
                    booking.property_id,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .is_some_and(|p| p.instant_book);
            if instant {
                match status::transition(
                    booking.status,
                    booking::Status::Confirmed,
                ) {
                    Ok(to) => booking.status = to,
                    Err(e) => log::debug!(
                        "paid `Booking({})` is not confirmed: {e}",
                        booking.reference,
                    ),
                }
            }
        }

        if booking != before {
            booking.updated_at = now.coerce();
            tx.execute(Update(booking.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if current.status != payment.status {
            self.publish(PaymentStatusChanged {
                payment_reference: payment.reference.clone(),
                booking_id,
                from: current.status,
                to: payment.status,
            });
        }
        if booking.status != before.status {
            self.cache().invalidate(booking.property_id);
            self.publish(BookingStatusChanged {
                booking_reference: booking.reference.clone(),
                from: before.status,
                to: booking.status,
            });
        }

        Ok(Output::Applied(payment))
    }
}

/// Error of [`ProcessPaymentEvent`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No [`Payment`] matches the provider resource.
    #[display("No `Payment` matches provider resource `{_0}`")]
    PaymentNotFound(#[error(not(source))] String),

    /// [`Booking`] of the [`Payment`] doesn't exist.
    #[display("`Booking(id: {_0})` doesn't exist")]
    BookingNotExists(#[error(not(source))] booking::Id),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
            Self::PaymentNotFound(_) => ErrorKind::NotFound,
            Self::BookingNotExists(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::pin::pin;

    use common::{
        money::Currency,
        operations::{By, Lock, Transact},
        Money,
    };

    use crate::{
        command::RegisterProperty,
        domain::{booking, payment, property, Booking, Property},
        infra::Database as _,
        query,
        testing::{self, usd, Fixture},
        Command as _, ErrorKind, Query as _,
    };

    use super::{ExecutionError, Output, ProcessPaymentEvent};

    async fn process(
        f: &Fixture,
        event: payment::Event,
    ) -> Result<Output, tracerr::Traced<ExecutionError>> {
        f.service.execute(ProcessPaymentEvent { event }).await
    }

    async fn booking(f: &Fixture, id: booking::Id) -> booking::Booking {
        f.service
            .execute(query::booking::ById::by(id))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn confirms_instant_booking_on_capture() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        drop(f.pay(&b, "ORDER-1").await);

        let out = process(&f, testing::capture_completed("CAP-1", "ORDER-1"))
            .await
            .unwrap();

        let Output::Applied(p) = out else {
            panic!("expected applied, got: {out:?}");
        };
        assert_eq!(p.status, payment::Status::Completed);
        assert_eq!(p.capture_id.unwrap().as_ref(), "CAP-1");
        let b = booking(&f, b.id).await;
        assert_eq!(b.status, booking::Status::Confirmed);
        assert_eq!(b.payment_status, Some(payment::Status::Completed));
    }

    #[tokio::test]
    async fn keeps_booking_pending_without_instant_book() {
        let f = Fixture::new().await;
        let mut property = f.property.clone();
        property.id = property::Id::new();
        property.instant_book = false;
        drop(
            f.service
                .execute(RegisterProperty {
                    property: property.clone(),
                })
                .await
                .unwrap(),
        );
        let mut cmd = f.booking(1, 4);
        cmd.property_id = property.id;
        let b = f.service.execute(cmd).await.unwrap();
        drop(f.pay(&b, "ORDER-1").await);

        drop(
            process(&f, testing::capture_completed("CAP-1", "ORDER-1"))
                .await
                .unwrap(),
        );

        let b = booking(&f, b.id).await;
        assert_eq!(b.status, booking::Status::Pending);
        assert_eq!(b.payment_status, Some(payment::Status::Completed));
    }

    #[tokio::test]
    async fn discards_replayed_event() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        let p = f.pay(&b, "ORDER-1").await;
        let event = testing::capture_completed("CAP-1", "ORDER-1");
        drop(process(&f, event.clone()).await.unwrap());
        let before = f
            .service
            .execute(query::payment::ById::by(p.id))
            .await
            .unwrap();

        let out = process(&f, event).await.unwrap();

        assert_eq!(out, Output::Duplicate(p.id));
        let after = f
            .service
            .execute(query::payment::ById::by(p.id))
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn never_regresses_early_refund() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        drop(f.pay(&b, "ORDER-1").await);

        let refund = testing::capture_refunded("REF-1", "ORDER-1", 100);
        let out = process(&f, refund).await.unwrap();
        let Output::Applied(p) = out else {
            panic!("expected applied, got: {out:?}");
        };
        assert_eq!(p.status, payment::Status::Refunded);
        assert_eq!(p.refunded, Some(usd(100)));
        assert!(p.is_partially_refunded());

        let out = process(&f, testing::capture_completed("CAP-1", "ORDER-1"))
            .await
            .unwrap();
        let Output::Applied(p) = out else {
            panic!("expected applied, got: {out:?}");
        };
        assert_eq!(p.status, payment::Status::Refunded);
        assert_eq!(p.capture_id.unwrap().as_ref(), "CAP-1");
        assert_eq!(booking(&f, b.id).await.status, booking::Status::Pending);
    }

    #[tokio::test]
    async fn discards_refund_in_other_currency() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        let p = f.pay(&b, "ORDER-1").await;
        let mut event = testing::capture_refunded("REF-1", "ORDER-1", 100);
        event.amount = Some(Money::new(100.into(), Currency::Eur));

        let out = process(&f, event).await.unwrap();

        assert_eq!(out, Output::Mismatch(p.id));
    }

    #[tokio::test]
    async fn fails_on_unknown_payment() {
        let f = Fixture::new().await;

        let err = process(&f, testing::capture_completed("CAP-1", "ORDER-X"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::PaymentNotFound(_)));
        assert_eq!(err.as_ref().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn confirms_instant_booking_while_property_is_locked() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        drop(f.pay(&b, "ORDER-1").await);
        let held = f.service.database().execute(Transact).await.unwrap();
        held.execute(Lock(By::<Property, _>::new(f.property.id)))
            .await
            .unwrap();
        let event = testing::capture_completed("CAP-1", "ORDER-1");

        let first = process(&f, event.clone()).await.unwrap();
        assert!(matches!(first, Output::Applied(_)));
        assert_eq!(booking(&f, b.id).await.status, booking::Status::Confirmed);

        drop(held);
        let again = process(&f, event).await.unwrap();

        assert!(matches!(again, Output::Duplicate(_)));
        let b = booking(&f, b.id).await;
        assert_eq!(b.status, booking::Status::Confirmed);
        assert_eq!(b.payment_status, Some(payment::Status::Completed));
    }

    #[tokio::test]
    async fn discards_capture_of_other_payment() {
        let f = Fixture::new().await;
        let (one, two) = (f.book(1, 4).await, f.book(5, 8).await);
        let first = f.pay(&one, "ORDER-1").await;
        let second = f.pay(&two, "ORDER-2").await;
        let held = f.service.database().execute(Transact).await.unwrap();
        held.execute(Lock(By::<Booking, _>::new(two.id)))
            .await
            .unwrap();

        // Looks the second payment up by its order, then waits for the lock.
        let mut late =
            pin!(process(&f, testing::capture_completed("CAP-1", "ORDER-2")));
        assert!(futures::poll!(late.as_mut()).is_pending());

        let out = process(&f, testing::capture_completed("CAP-1", "ORDER-1"))
            .await
            .unwrap();
        assert!(matches!(out, Output::Applied(_)));
        drop(held);

        assert_eq!(late.await.unwrap(), Output::Mismatch(second.id));
        let second = f
            .service
            .execute(query::payment::ById::by(second.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.status, payment::Status::Created);
        assert!(second.capture_id.is_none());
        let first = f
            .service
            .execute(query::payment::ById::by(first.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.capture_id.unwrap().as_ref(), "CAP-1");
    }
}
