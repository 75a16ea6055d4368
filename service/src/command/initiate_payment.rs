//! [`Command`] for initiating a new [`Payment`] of a [`Booking`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, status},
        payment, Booking, Payment,
    },
    infra::{database, Database},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for registering a new [`Payment`] of a [`Booking`] once the
/// checkout collaborator has created a provider order for it.
#[derive(Clone, Debug)]
pub struct InitiatePayment {
    /// ID of the [`Booking`] to pay.
    pub booking_id: booking::Id,

    /// Provider order created for the [`Payment`].
    pub order_id: payment::OrderId,
}

impl<Db> Command<InitiatePayment> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, booking::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: InitiatePayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let InitiatePayment {
            booking_id,
            order_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

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
        if status::is_terminal(booking.status) {
            return Err(tracerr::new!(E::BookingNotPayable(booking.status)));
        }

        let latest = tx
            .execute(Select(By::<Option<Payment>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let retry_count = match latest {
            None => 0,
            Some(p) if payment::is_in_progress(p.status) => {
                return Err(tracerr::new!(E::PaymentInProgress(p.id)));
            }
            Some(p) => p.retry_count.saturating_add(1),
        };
        if retry_count > self.config().payment_max_retries {
            return Err(tracerr::new!(E::RetriesExhausted(booking_id)));
        }

        let now = DateTime::now();
        let payment = Payment {
            id: payment::Id::new(),
            reference: payment::Reference::generate(),
            booking_id,
            amount: booking.price.total(),
            status: payment::Status::Created,
            order_id,
            capture_id: None,
            transaction_id: None,
            refund_ids: vec![],
            refunded: None,
            retry_count,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };
        tx.execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        booking.payment_status = Some(payment.status);
        booking.updated_at = now.coerce();
        tx.execute(Update(booking))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(payment)
    }
}

/// Error of [`InitiatePayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] with the provided ID doesn't exist.
    #[display("`Booking(id: {_0})` doesn't exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Booking`] is in a terminal [`booking::Status`].
    #[display("`Booking` in `{_0}` status cannot be paid")]
    BookingNotPayable(#[error(not(source))] booking::Status),

    /// Another [`Payment`] of the [`Booking`] is in progress or completed.
    #[display("`Payment(id: {_0})` is in progress")]
    PaymentInProgress(#[error(not(source))] payment::Id),

    /// [`Booking`] has failed too many [`Payment`]s.
    #[display("`Booking(id: {_0})` has exhausted its payment retries")]
    RetriesExhausted(#[error(not(source))] booking::Id),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
            Self::BookingNotExists(_) => ErrorKind::NotFound,
            Self::BookingNotPayable(_) | Self::RetriesExhausted(_) => {
                ErrorKind::State
            }
            Self::PaymentInProgress(_) => ErrorKind::Conflict,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            transition_booking::Transition, ProcessPaymentEvent,
            TransitionBooking,
        },
        domain::{
            booking,
            payment::{self, event::Kind},
        },
        query,
        testing::{usd, Fixture},
        Command as _, Query as _,
    };

    use super::{ExecutionError, InitiatePayment};

    async fn cancel_order(f: &Fixture, order: &str) {
        drop(
            f.service
                .execute(ProcessPaymentEvent {
                    event: payment::Event {
                        kind: Kind::OrderCancelled,
                        resource_id: order.to_owned(),
                        order_id: None,
                        amount: None,
                        unsupported_currency: None,
                    },
                })
                .await
                .unwrap(),
        );
    }

    #[tokio::test]
    async fn creates_payment_of_booking_total() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;

        let p = f.pay(&b, "ORDER-1").await;

        assert_eq!(p.status, payment::Status::Created);
        assert_eq!(p.amount, usd(350));
        assert_eq!(p.retry_count, 0);
        let b = f
            .service
            .execute(query::booking::ById::by(b.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.payment_status, Some(payment::Status::Created));
    }

    #[tokio::test]
    async fn rejects_second_payment_in_progress() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        let first = f.pay(&b, "ORDER-1").await;

        let err = f
            .service
            .execute(InitiatePayment {
                booking_id: b.id,
                order_id: payment::OrderId::from("ORDER-2".to_owned()),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::PaymentInProgress(id) if *id == first.id,
        ));
    }

    #[tokio::test]
    async fn retries_failed_payment_until_exhausted() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        let max = f.service.config().payment_max_retries;

        for attempt in 0..=max {
            let order = format!("ORDER-{attempt}");
            let p = f.pay(&b, &order).await;
            assert_eq!(p.retry_count, attempt);
            cancel_order(&f, &order).await;
        }

        let err = f
            .service
            .execute(InitiatePayment {
                booking_id: b.id,
                order_id: payment::OrderId::from("ORDER-LAST".to_owned()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::RetriesExhausted(_)));
    }

    #[tokio::test]
    async fn rejects_terminal_booking() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        drop(
            f.service
                .execute(TransitionBooking {
                    booking_id: b.id,
                    transition: Transition::Cancel {
                        reason: "changed plans".into(),
                        actor: booking::Actor::Guest,
                    },
                })
                .await
                .unwrap(),
        );

        let err = f
            .service
            .execute(InitiatePayment {
                booking_id: b.id,
                order_id: payment::OrderId::from("ORDER-1".to_owned()),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::BookingNotPayable(booking::Status::Cancelled),
        ));
    }
}
