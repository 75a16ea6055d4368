//! [`RetryPaymentEvents`] [`Task`].

use std::{convert::Infallible, error::Error, time::Duration};

use common::operations::{By, Perform, Start};
use smart_default::SmartDefault;
use tokio::{sync::mpsc, time::Instant};
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{self, process_payment_event},
    domain::payment,
    ErrorKind, Service,
};

use super::Task;

/// Configuration for [`RetryPaymentEvents`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Delay before another processing attempt of a queued payment event.
    #[default(Duration::from_secs(10))]
    pub interval: Duration,

    /// Maximum number of processing attempts of a single payment event,
    /// including the first one.
    #[default(5)]
    pub max_attempts: u8,
}

/// Payment event queued for another processing attempt.
#[derive(Clone, Debug)]
pub struct Retry {
    /// [`payment::Event`] to process.
    pub event: payment::Event,

    /// Number of the processing attempts already made.
    pub attempts: u8,

    /// [`Instant`] the payment event was queued at.
    queued_at: Instant,
}

impl Retry {
    /// Creates a new [`Retry`] of the provided [`payment::Event`] after the
    /// provided number of failed `attempts`.
    #[must_use]
    pub fn new(event: payment::Event, attempts: u8) -> Self {
        Self {
            event,
            attempts,
            queued_at: Instant::now(),
        }
    }
}

/// Sending half of the [`Retry`]s queue.
pub type Sender = mpsc::UnboundedSender<Retry>;

/// Receiving half of the [`Retry`]s queue.
pub type Receiver = mpsc::UnboundedReceiver<Retry>;

/// [`Task`] re-processing payment events failed with a transient error.
#[derive(Clone, Copy, Debug)]
pub struct RetryPaymentEvents<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<RetryPaymentEvents<Self>, Receiver>>> for Service<Db>
where
    RetryPaymentEvents<Service<Db>>: Task<Perform<Retry>, Ok = (), Err: Error>,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<RetryPaymentEvents<Self>, Receiver>>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut queue = by.into_inner();
        let task = RetryPaymentEvents {
            config: self.config().retry_payment_events,
            service: self.clone(),
        };

        // All the retries are delayed equally, so FIFO order is kept.
        while let Some(retry) = queue.recv().await {
            tokio::time::sleep_until(retry.queued_at + task.config.interval)
                .await;
            _ = task.execute(Perform(retry)).await.map_err(|e| {
                log::error!("`task::RetryPaymentEvents` failed: {e}");
            });
        }
        Ok(())
    }
}

impl<Db> Task<Perform<Retry>> for RetryPaymentEvents<Service<Db>>
where
    Service<Db>: command::Command<
        command::ProcessPaymentEvent,
        Ok = process_payment_event::Output,
        Err = Traced<process_payment_event::ExecutionError>,
    >,
{
    type Ok = ();
    type Err = Traced<process_payment_event::ExecutionError>;

    async fn execute(
        &self,
        Perform(retry): Perform<Retry>,
    ) -> Result<Self::Ok, Self::Err> {
        let Retry {
            event, attempts, ..
        } = retry;
        let attempts = attempts.saturating_add(1);

        match self
            .service
            .execute(command::ProcessPaymentEvent {
                event: event.clone(),
            })
            .await
        {
            Ok(out) => {
                log::debug!(
                    "payment event `{}` processed on attempt {attempts}: \
                     {out:?}",
                    event.resource_id,
                );
                Ok(())
            }
            Err(e) if e.as_ref().kind() == ErrorKind::Transient => {
                if attempts < self.config.max_attempts {
                    log::warn!(
                        "payment event `{}` failed on attempt {attempts}, \
                         retrying: {e}",
                        event.resource_id,
                    );
                    self.service.retry(Retry::new(event, attempts));
                } else {
                    log::error!(
                        "payment event `{}` dropped after {attempts} \
                         attempts: {e}",
                        event.resource_id,
                    );
                }
                Ok(())
            }
            Err(e) if e.as_ref().kind() == ErrorKind::NotFound => {
                log::warn!(
                    "payment event `{}` dropped: {e}",
                    event.resource_id,
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::Perform;

    use crate::{
        domain::payment,
        query,
        testing::{self, Fixture},
        Query as _,
    };

    use super::{Config, Retry, RetryPaymentEvents, Task as _};

    #[tokio::test]
    async fn processes_retried_event() {
        let f = Fixture::new().await;
        let booking = f.book(1, 4).await;
        drop(f.pay(&booking, "ORDER-1").await);

        let task = RetryPaymentEvents {
            config: Config {
                interval: Duration::ZERO,
                max_attempts: 3,
            },
            service: f.service.clone(),
        };
        task.execute(Perform(Retry::new(
            testing::capture_completed("CAP-1", "ORDER-1"),
            1,
        )))
        .await
        .unwrap();

        let payment = f
            .service
            .execute(query::payment::OfBooking::by(booking.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, payment::Status::Completed);
    }

    #[tokio::test]
    async fn drops_event_of_unknown_payment() {
        let f = Fixture::new().await;
        let task = RetryPaymentEvents {
            config: Config::default(),
            service: f.service.clone(),
        };

        task.execute(Perform(Retry::new(
            testing::capture_completed("CAP-404", "ORDER-404"),
            1,
        )))
        .await
        .unwrap();
    }
}
