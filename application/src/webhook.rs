//! Payment provider webhook endpoint.

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use service::{
    command::{
        process_payment_event::Output,
        receive_payment_webhook::{self, Receipt},
        ReceivePaymentWebhook,
    },
    domain::payment::webhook::Payload,
    Command,
};
use tracerr::Traced;
use tracing as log;

use crate::{define_error, AsError, Error};

/// Payment provider webhook handler.
///
/// Every well-formed notification is answered with `200 OK`, whatever the
/// outcome of its processing is, so the provider doesn't redeliver it. Only a
/// malformed notification is answered with `400 Bad Request`.
#[tracing::instrument(skip_all, fields(otel.name = "payment webhook"))]
pub async fn payment<S>(
    Extension(service): Extension<S>,
    payload: Result<Json<Payload>, JsonRejection>,
) -> Response
where
    S: Command<
        ReceivePaymentWebhook,
        Ok = Receipt,
        Err = Traced<receive_payment_webhook::ExecutionError>,
    >,
{
    let payload = match payload {
        Ok(Json(p)) => p,
        Err(e) => {
            log::warn!("unparsable payment webhook: {e}");
            return Error::from(WebhookError::Unparsable).into_response();
        }
    };

    match service.execute(ReceivePaymentWebhook { payload }).await {
        Ok(receipt) => Json(Acknowledgement::from(&receipt)).into_response(),
        Err(e) => e.into_error().into_response(),
    }
}

/// Body of a successful webhook [`Response`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Acknowledgement {
    /// Indicator whether the notification was received.
    pub received: bool,

    /// [`Outcome`] of the notification processing.
    pub outcome: Outcome,
}

impl From<&Receipt> for Acknowledgement {
    fn from(receipt: &Receipt) -> Self {
        let outcome = match receipt {
            Receipt::Ignored => Outcome::Ignored,
            Receipt::Processed(Output::Applied(_)) => Outcome::Applied,
            Receipt::Processed(Output::Duplicate(_)) => Outcome::Duplicate,
            Receipt::Processed(Output::Mismatch(_)) => Outcome::Mismatch,
            Receipt::NotFound => Outcome::NotFound,
            Receipt::Queued => Outcome::Queued,
            Receipt::Failed => Outcome::Failed,
        };
        Self {
            received: true,
            outcome,
        }
    }
}

/// Outcome of a webhook notification processing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Notification type is not relevant to payments.
    Ignored,

    /// Notification changed a payment.
    Applied,

    /// Notification was already applied.
    Duplicate,

    /// Notification contradicts the payment it refers to.
    Mismatch,

    /// No payment matches the notification.
    NotFound,

    /// Processing is postponed.
    Queued,

    /// Processing failed.
    Failed,
}

impl AsError for receive_payment_webhook::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Malformed(_) => Some(WebhookError::Malformed.into()),
        }
    }
}

define_error! {
    enum WebhookError {
        #[code = "INVALID_REQUEST"]
        #[status = BAD_REQUEST]
        #[message = "Webhook body is not a valid JSON notification"]
        Unparsable,

        #[code = "INVALID_REQUEST"]
        #[status = BAD_REQUEST]
        #[message = "Webhook notification misses required fields"]
        Malformed,
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use axum::{Extension, Json};
    use service::{
        command::{process_payment_event::Output, receive_payment_webhook},
        domain::payment,
        infra::Memory,
        Service,
    };

    use super::{payment, Acknowledgement, Outcome};

    fn service() -> Service<Memory> {
        let (service, _background) = Service::new(
            service::Config::default(),
            Memory::new(Duration::from_secs(1)),
        );
        service
    }

    fn payload(json: &serde_json::Value) -> payment::webhook::Payload {
        serde_json::from_value(json.clone()).unwrap()
    }

    #[tokio::test]
    async fn acknowledges_irrelevant_notification() {
        let resp = payment(
            Extension(service()),
            Ok(Json(payload(&serde_json::json!({
                "id": "WH-1",
                "event_type": "CUSTOMER.DISPUTE.CREATED",
                "resource": {"id": "DSP-1"},
            })))),
        )
        .await;

        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn acknowledges_unknown_payment() {
        let resp = payment(
            Extension(service()),
            Ok(Json(payload(&serde_json::json!({
                "event_type": "PAYMENT.CAPTURE.COMPLETED",
                "resource": {
                    "id": "CAP-404",
                    "custom_id": "ORDER-404",
                    "amount": {"currency_code": "USD", "value": "10.00"},
                },
            })))),
        )
        .await;

        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_malformed_notification() {
        let resp = payment(
            Extension(service()),
            Ok(Json(payload(&serde_json::json!({
                "event_type": "PAYMENT.CAPTURE.COMPLETED",
                "resource": {"custom_id": "ORDER-1"},
            })))),
        )
        .await;

        assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn describes_processing_outcome() {
        let id = payment::Id::new();

        for (receipt, outcome) in [
            (receive_payment_webhook::Receipt::Ignored, Outcome::Ignored),
            (
                receive_payment_webhook::Receipt::Processed(Output::Duplicate(
                    id,
                )),
                Outcome::Duplicate,
            ),
            (
                receive_payment_webhook::Receipt::Processed(Output::Mismatch(
                    id,
                )),
                Outcome::Mismatch,
            ),
            (receive_payment_webhook::Receipt::Queued, Outcome::Queued),
        ] {
            assert_eq!(
                Acknowledgement::from(&receipt),
                Acknowledgement {
                    received: true,
                    outcome,
                },
            );
        }
    }
}
