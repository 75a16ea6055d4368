//! [`Command`] for receiving a payment provider webhook notification.

use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{process_payment_event, ProcessPaymentEvent},
    domain::payment::webhook::{MalformedError, Payload},
    task::retry_payment_events::Retry,
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for receiving a payment provider webhook notification.
///
/// Any well-formed notification is acknowledged: processing failures are
/// logged, and the transient ones are queued for another attempt.
#[derive(Clone, Debug)]
pub struct ReceivePaymentWebhook {
    /// [`Payload`] of the notification.
    pub payload: Payload,
}

/// Result of a [`ReceivePaymentWebhook`] [`Command`] execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Receipt {
    /// Notification type is not relevant to payments.
    Ignored,

    /// Notification is processed.
    Processed(process_payment_event::Output),

    /// No [`Payment`] matches the notification.
    ///
    /// [`Payment`]: crate::domain::Payment
    NotFound,

    /// Processing failed transiently and is queued for another attempt.
    Queued,

    /// Processing failed and won't be retried.
    Failed,
}

impl<Db> Command<ReceivePaymentWebhook> for Service<Db>
where
    Self: Command<
        ProcessPaymentEvent,
        Ok = process_payment_event::Output,
        Err = Traced<process_payment_event::ExecutionError>,
    >,
{
    type Ok = Receipt;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ReceivePaymentWebhook,
    ) -> Result<Self::Ok, Self::Err> {
        let ReceivePaymentWebhook { payload } = cmd;

        let notification_id = payload.id.clone().unwrap_or_default();
        let event = payload.into_event().map_err(|e| {
            log::warn!("malformed payment webhook `{notification_id}`: {e}");
            tracerr::new!(ExecutionError::Malformed(e))
        })?;
        let Some(event) = event else {
            log::debug!("payment webhook `{notification_id}` ignored");
            return Ok(Receipt::Ignored);
        };

        let res = self
            .execute(ProcessPaymentEvent {
                event: event.clone(),
            })
            .await;
        Ok(match res {
            Ok(out) => Receipt::Processed(out),
            Err(e) => match e.as_ref().kind() {
                ErrorKind::NotFound => {
                    log::warn!(
                        "payment webhook `{notification_id}` acknowledged: {e}",
                    );
                    Receipt::NotFound
                }
                ErrorKind::Transient => {
                    log::warn!(
                        "payment webhook `{notification_id}` queued for \
                         retry: {e}",
                    );
                    self.retry(Retry::new(event, 1));
                    Receipt::Queued
                }
                ErrorKind::Validation
                | ErrorKind::Conflict
                | ErrorKind::State
                | ErrorKind::Internal => {
                    log::error!(
                        "payment webhook `{notification_id}` failed: {e}",
                    );
                    Receipt::Failed
                }
            },
        })
    }
}

/// Error of [`ReceivePaymentWebhook`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Notification [`Payload`] is malformed.
    #[display("Malformed payment webhook: {_0}")]
    #[from]
    Malformed(MalformedError),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Lock, Transact};

    use crate::{
        command::process_payment_event::Output,
        domain::{payment::webhook::Payload, Booking},
        infra::Database as _,
        testing::Fixture,
        Command as _,
    };

    use super::{ExecutionError, Receipt, ReceivePaymentWebhook};

    fn payload(json: &serde_json::Value) -> Payload {
        serde_json::from_value(json.clone()).unwrap()
    }

    fn capture_completed(capture: &str, order: &str) -> Payload {
        payload(&serde_json::json!({
            "id": "WH-1",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": capture,
                "custom_id": order,
                "amount": {"currency_code": "USD", "value": "350.00"},
            },
        }))
    }

    #[tokio::test]
    async fn processes_capture() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        drop(f.pay(&b, "ORDER-1").await);

        let receipt = f
            .service
            .execute(ReceivePaymentWebhook {
                payload: capture_completed("CAP-1", "ORDER-1"),
            })
            .await
            .unwrap();

        assert!(matches!(receipt, Receipt::Processed(Output::Applied(_))));
    }

    #[tokio::test]
    async fn ignores_unknown_event_type() {
        let f = Fixture::new().await;

        let receipt = f
            .service
            .execute(ReceivePaymentWebhook {
                payload: payload(&serde_json::json!({
                    "event_type": "BILLING.SUBSCRIPTION.CREATED",
                    "resource": {"id": "SUB-1"},
                })),
            })
            .await
            .unwrap();

        assert_eq!(receipt, Receipt::Ignored);
    }

    #[tokio::test]
    async fn rejects_malformed_payload() {
        let f = Fixture::new().await;

        let err = f
            .service
            .execute(ReceivePaymentWebhook {
                payload: payload(&serde_json::json!({
                    "event_type": "PAYMENT.CAPTURE.COMPLETED",
                    "resource": {},
                })),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Malformed(_)));
    }

    #[tokio::test]
    async fn acknowledges_refund_in_unsupported_currency() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        let p = f.pay(&b, "ORDER-1").await;

        let receipt = f
            .service
            .execute(ReceivePaymentWebhook {
                payload: payload(&serde_json::json!({
                    "event_type": "PAYMENT.CAPTURE.REFUNDED",
                    "resource": {
                        "id": "REF-1",
                        "custom_id": "ORDER-1",
                        "amount": {"currency_code": "JPY", "value": "5000"},
                    },
                })),
            })
            .await
            .unwrap();

        assert_eq!(receipt, Receipt::Processed(Output::Mismatch(p.id)));
    }

    #[tokio::test]
    async fn acknowledges_unknown_payment() {
        let f = Fixture::new().await;

        let receipt = f
            .service
            .execute(ReceivePaymentWebhook {
                payload: capture_completed("CAP-404", "ORDER-404"),
            })
            .await
            .unwrap();

        assert_eq!(receipt, Receipt::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn queues_event_on_lock_timeout() {
        let f = Fixture::new().await;
        let b = f.book(1, 4).await;
        drop(f.pay(&b, "ORDER-1").await);
        let tx = f.service.database().execute(Transact).await.unwrap();
        tx.execute(Lock(By::<Booking, _>::new(b.id))).await.unwrap();

        let receipt = f
            .service
            .execute(ReceivePaymentWebhook {
                payload: capture_completed("CAP-1", "ORDER-1"),
            })
            .await
            .unwrap();

        assert_eq!(receipt, Receipt::Queued);
        drop(tx);
    }
}
