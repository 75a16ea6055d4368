//! Payment provider webhook [`Payload`].

use std::str::FromStr as _;

use common::{money::Currency, Money};
use derive_more::{Display, Error};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{event::Kind, Event, OrderId};

/// JSON payload of a payment provider webhook notification.
///
/// Its signature is expected to be verified before it reaches the service.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Payload {
    /// Provider ID of the notification.
    #[serde(default)]
    pub id: Option<String>,

    /// Type of the notification, like `PAYMENT.CAPTURE.COMPLETED`.
    #[serde(default)]
    pub event_type: Option<String>,

    /// [`Resource`] the notification is about.
    #[serde(default)]
    pub resource: Option<Resource>,
}

/// Provider resource (capture, sale, refund or order) of a [`Payload`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Resource {
    /// Provider ID of this [`Resource`].
    #[serde(default)]
    pub id: Option<String>,

    /// Merchant-supplied ID, carrying the provider order ID.
    #[serde(default)]
    pub custom_id: Option<String>,

    /// [`Amount`] of this [`Resource`].
    #[serde(default)]
    pub amount: Option<Amount>,

    /// [`Details`] of this [`Resource`].
    #[serde(default)]
    pub details: Option<Details>,
}

/// Amount of a [`Resource`].
#[derive(Clone, Debug, Deserialize)]
pub struct Amount {
    /// ISO 4217 currency code.
    pub currency_code: String,

    /// Decimal amount, like `350.00`.
    pub value: String,
}

/// Free-form details of a [`Resource`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Details {
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Payload {
    /// Parses this [`Payload`] into an [`Event`].
    ///
    /// [`None`] is returned for the notification types not relevant to
    /// payments reconciliation.
    ///
    /// # Errors
    ///
    /// With a [`MalformedError`] if this [`Payload`] misses required fields or
    /// carries an unparsable amount value. An amount in a currency not
    /// supported by [`Currency`] is not malformed: the [`Event`] then carries
    /// its code instead.
    pub fn into_event(self) -> Result<Option<Event>, MalformedError> {
        use MalformedError as E;

        let event_type = self
            .event_type
            .filter(|t| !t.is_empty())
            .ok_or(E::MissingEventType)?;
        let resource = self.resource.ok_or(E::MissingResourceId)?;
        let resource_id = resource
            .id
            .filter(|id| !id.is_empty())
            .ok_or(E::MissingResourceId)?;
        let (mut amount, mut unsupported_currency) = (None, None);
        if let Some(a) = resource.amount {
            let value = Decimal::from_str(a.value.trim())
                .map_err(|_| E::InvalidAmount)?;
            match Currency::from_str(a.currency_code.trim()) {
                Ok(currency) => amount = Some(Money::new(value, currency)),
                Err(_) => unsupported_currency = Some(a.currency_code),
            }
        }

        let Some(kind) = Kind::from_event_type(&event_type) else {
            return Ok(None);
        };

        Ok(Some(Event {
            kind,
            resource_id,
            order_id: resource
                .custom_id
                .filter(|id| !id.is_empty())
                .map(OrderId::from),
            amount,
            unsupported_currency,
        }))
    }
}

/// Error of parsing a malformed [`Payload`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum MalformedError {
    /// `event_type` is missing.
    #[display("`event_type` is missing")]
    MissingEventType,

    /// `resource.id` is missing.
    #[display("`resource.id` is missing")]
    MissingResourceId,

    /// `resource.amount` cannot be parsed.
    #[display("`resource.amount` is invalid")]
    InvalidAmount,
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};

    use crate::domain::payment::event::Kind;

    use super::{MalformedError, Payload};

    fn parse(json: &str) -> Result<Option<super::Event>, MalformedError> {
        serde_json::from_str::<Payload>(json).unwrap().into_event()
    }

    #[test]
    fn parses_capture_completed() {
        let event = parse(
            r#"{
                "id": "WH-1",
                "event_type": "PAYMENT.CAPTURE.COMPLETED",
                "resource": {
                    "id": "CAP-1",
                    "custom_id": "ORDER-1",
                    "amount": {"currency_code": "USD", "value": "350.00"},
                    "details": {"description": "Booking BK-1"}
                }
            }"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(event.kind, Kind::CaptureCompleted);
        assert_eq!(event.resource_id, "CAP-1");
        assert_eq!(event.order_id.unwrap().as_ref(), "ORDER-1");
        assert_eq!(
            event.amount,
            Some(Money::new("350.00".parse().unwrap(), Currency::Usd)),
        );
    }

    #[test]
    fn ignores_unknown_event_types() {
        assert_eq!(
            parse(
                r#"{
                    "event_type": "BILLING.PLAN.CREATED",
                    "resource": {"id": "P-1"}
                }"#,
            ),
            Ok(None),
        );
    }

    #[test]
    fn detects_malformed_payloads() {
        assert_eq!(
            parse(r#"{"resource": {"id": "CAP-1"}}"#),
            Err(MalformedError::MissingEventType),
        );
        assert_eq!(
            parse(r#"{"event_type": "PAYMENT.CAPTURE.COMPLETED"}"#),
            Err(MalformedError::MissingResourceId),
        );
        assert_eq!(
            parse(
                r#"{
                    "event_type": "PAYMENT.CAPTURE.REFUNDED",
                    "resource": {
                        "id": "REF-1",
                        "amount": {"currency_code": "USD", "value": "ten"}
                    }
                }"#,
            ),
            Err(MalformedError::InvalidAmount),
        );
    }

    #[test]
    fn keeps_amounts_in_unsupported_currency() {
        let event = parse(
            r#"{
                "event_type": "PAYMENT.CAPTURE.COMPLETED",
                "resource": {
                    "id": "CAP-1",
                    "custom_id": "ORDER-1",
                    "amount": {"currency_code": "JPY", "value": "5000"}
                }
            }"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(event.kind, Kind::CaptureCompleted);
        assert_eq!(event.amount, None);
        assert_eq!(event.unsupported_currency.as_deref(), Some("JPY"));
    }
}
