//! Payment provider [`Event`]s and their application to a [`Payment`].

use common::Money;

use super::{
    CaptureId, OrderId, Payment, ProviderId, RefundId, Status, TransactionId,
};

/// Kind of a payment provider [`Event`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    /// `PAYMENT.CAPTURE.COMPLETED` event.
    CaptureCompleted,

    /// `PAYMENT.CAPTURE.DENIED` event.
    CaptureDenied,

    /// `PAYMENT.CAPTURE.REVERSED` event.
    CaptureReversed,

    /// `PAYMENT.CAPTURE.REFUNDED` event.
    CaptureRefunded,

    /// `PAYMENT.SALE.COMPLETED` event.
    SaleCompleted,

    /// `PAYMENT.SALE.DENIED` event.
    SaleDenied,

    /// `PAYMENT.SALE.REFUNDED` event.
    SaleRefunded,

    /// `CHECKOUT.ORDER.APPROVED` event.
    OrderApproved,

    /// `CHECKOUT.ORDER.CANCELLED` event.
    OrderCancelled,
}

impl Kind {
    /// Parses the provided provider event type.
    ///
    /// [`None`] is returned for the event types not relevant to payments
    /// reconciliation.
    #[must_use]
    pub fn from_event_type(s: &str) -> Option<Self> {
        Some(match s {
            "PAYMENT.CAPTURE.COMPLETED" => Self::CaptureCompleted,
            "PAYMENT.CAPTURE.DENIED" => Self::CaptureDenied,
            "PAYMENT.CAPTURE.REVERSED" => Self::CaptureReversed,
            "PAYMENT.CAPTURE.REFUNDED" => Self::CaptureRefunded,
            "PAYMENT.SALE.COMPLETED" => Self::SaleCompleted,
            "PAYMENT.SALE.DENIED" => Self::SaleDenied,
            "PAYMENT.SALE.REFUNDED" => Self::SaleRefunded,
            "CHECKOUT.ORDER.APPROVED" => Self::OrderApproved,
            "CHECKOUT.ORDER.CANCELLED" => Self::OrderCancelled,
            _ => return None,
        })
    }

    /// Returns the [`Status`] this [`Kind`] of [`Event`] drives a [`Payment`]
    /// to.
    #[must_use]
    pub fn target_status(self) -> Status {
        match self {
            Self::CaptureCompleted | Self::SaleCompleted => Status::Completed,
            Self::CaptureDenied
            | Self::CaptureReversed
            | Self::SaleDenied
            | Self::OrderCancelled => Status::Failed,
            Self::CaptureRefunded | Self::SaleRefunded => Status::Refunded,
            Self::OrderApproved => Status::Pending,
        }
    }
}

/// Notification of the payment provider about a payment state change.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Event {
    /// [`Kind`] of this [`Event`].
    pub kind: Kind,

    /// ID of the provider resource this [`Event`] is about.
    ///
    /// Its meaning depends on the [`Kind`]: a capture, a sale transaction, a
    /// refund or an order.
    pub resource_id: String,

    /// [`OrderId`] the resource belongs to, if reported.
    pub order_id: Option<OrderId>,

    /// Amount of the resource, if reported in a supported currency.
    pub amount: Option<Money>,

    /// Currency code of the reported amount, if it's not a supported one.
    ///
    /// The [`Event::amount`] is [`None`] then.
    pub unsupported_currency: Option<String>,
}

impl Event {
    /// Returns the [`CaptureId`] reported by this [`Event`], if any.
    #[must_use]
    pub fn capture_id(&self) -> Option<CaptureId> {
        matches!(
            self.kind,
            Kind::CaptureCompleted
                | Kind::CaptureDenied
                | Kind::CaptureReversed,
        )
        .then(|| CaptureId::from(self.resource_id.clone()))
    }

    /// Returns the [`TransactionId`] reported by this [`Event`], if any.
    #[must_use]
    pub fn transaction_id(&self) -> Option<TransactionId> {
        matches!(self.kind, Kind::SaleCompleted | Kind::SaleDenied)
            .then(|| TransactionId::from(self.resource_id.clone()))
    }

    /// Returns the [`RefundId`] reported by this [`Event`], if any.
    #[must_use]
    pub fn refund_id(&self) -> Option<RefundId> {
        matches!(self.kind, Kind::CaptureRefunded | Kind::SaleRefunded)
            .then(|| RefundId::from(self.resource_id.clone()))
    }

    /// Returns the [`OrderId`] reported by this [`Event`], if any.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        if matches!(self.kind, Kind::OrderApproved | Kind::OrderCancelled) {
            Some(OrderId::from(self.resource_id.clone()))
        } else {
            self.order_id.clone()
        }
    }

    /// Returns [`ProviderId`]s to look a [`Payment`] up by, in order of
    /// preference: capture, order, transaction.
    #[must_use]
    pub fn lookup(&self) -> Vec<ProviderId> {
        self.capture_id()
            .map(ProviderId::from)
            .into_iter()
            .chain(self.order_id().map(ProviderId::from))
            .chain(self.transaction_id().map(ProviderId::from))
            .collect()
    }

    /// Applies this [`Event`] to the provided [`Payment`].
    ///
    /// Never regresses a [`Status::Refunded`] [`Payment`], and never
    /// overwrites an already set [`CaptureId`].
    #[must_use]
    pub fn apply(&self, payment: &Payment) -> Outcome {
        let mut next = payment.clone();
        let status = payment.status;

        match self.kind.target_status() {
            Status::Completed => {
                if let (Some(current), Some(new)) =
                    (&payment.capture_id, self.capture_id())
                {
                    if *current != new {
                        return Outcome::Mismatch;
                    }
                }
                if next.capture_id.is_none() {
                    next.capture_id = self.capture_id();
                }
                if next.transaction_id.is_none() {
                    next.transaction_id = self.transaction_id();
                }
                if !matches!(status, Status::Completed | Status::Refunded) {
                    next.status = Status::Completed;
                }
            }
            Status::Failed => match status {
                Status::Created | Status::Pending => {
                    next.status = Status::Failed;
                }
                Status::Completed if self.kind == Kind::CaptureReversed => {
                    next.status = Status::Failed;
                }
                Status::Completed | Status::Failed | Status::Refunded => {}
            },
            Status::Refunded => {
                let Some(refund_id) = self.refund_id() else {
                    return Outcome::Duplicate;
                };
                if payment.refund_ids.contains(&refund_id) {
                    return Outcome::Duplicate;
                }
                if self.unsupported_currency.is_some() {
                    return Outcome::Mismatch;
                }
                let refund = self.amount.unwrap_or(payment.amount);
                if refund.currency != payment.amount.currency {
                    return Outcome::Mismatch;
                }
                let refunded = payment
                    .refunded
                    .and_then(|r| r.checked_add(refund))
                    .unwrap_or(refund);
                let overpaid = refunded.amount > payment.amount.amount;
                next.refunded =
                    Some(if overpaid { payment.amount } else { refunded });
                next.refund_ids.push(refund_id);
                next.status = Status::Refunded;
            }
            Status::Pending => {
                if status == Status::Created {
                    next.status = Status::Pending;
                }
            }
            Status::Created => {}
        }

        if next == *payment {
            Outcome::Duplicate
        } else {
            Outcome::Applied(next)
        }
    }
}

/// Outcome of [`Event::apply()`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// [`Event`] changes the [`Payment`] into the provided one.
    Applied(Payment),

    /// [`Event`] is already reflected in the [`Payment`] (or is stale), so
    /// it's discarded.
    Duplicate,

    /// [`Event`] contradicts the [`Payment`] (another capture, another
    /// currency), so it's discarded.
    Mismatch,
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, DateTime, Money};

    use crate::domain::{
        booking,
        payment::{self, OrderId, Payment, Reference, Status},
    };

    use super::{Event, Kind, Outcome};

    fn usd(s: &str) -> Money {
        Money::new(s.parse().unwrap(), Currency::Usd)
    }

    fn payment(status: Status) -> Payment {
        Payment {
            id: payment::Id::new(),
            reference: Reference::generate(),
            booking_id: booking::Id::new(),
            amount: usd("350"),
            status,
            order_id: OrderId::from("ORDER-1".to_owned()),
            capture_id: None,
            transaction_id: None,
            refund_ids: vec![],
            refunded: None,
            retry_count: 0,
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
        }
    }

    fn event(kind: Kind, resource_id: &str, amount: Option<&str>) -> Event {
        Event {
            kind,
            resource_id: resource_id.to_owned(),
            order_id: Some(OrderId::from("ORDER-1".to_owned())),
            amount: amount.map(usd),
            unsupported_currency: None,
        }
    }

    fn applied(outcome: Outcome) -> Payment {
        match outcome {
            Outcome::Applied(p) => p,
            o @ (Outcome::Duplicate | Outcome::Mismatch) => {
                panic!("expected `Outcome::Applied`, got: {o:?}")
            }
        }
    }

    #[test]
    fn completes_payment_once() {
        let ev = event(Kind::CaptureCompleted, "CAP-1", Some("350"));

        let completed = applied(ev.apply(&payment(Status::Pending)));
        assert_eq!(completed.status, Status::Completed);
        assert_eq!(completed.capture_id.as_ref().unwrap().as_ref(), "CAP-1");

        assert_eq!(ev.apply(&completed), Outcome::Duplicate);
    }

    #[test]
    fn never_overwrites_capture_id() {
        let completed = applied(
            event(Kind::CaptureCompleted, "CAP-1", None)
                .apply(&payment(Status::Created)),
        );

        assert_eq!(
            event(Kind::CaptureCompleted, "CAP-2", None).apply(&completed),
            Outcome::Mismatch,
        );
    }

    #[test]
    fn refund_before_capture_is_not_regressed() {
        let refund = event(Kind::CaptureRefunded, "REF-1", Some("100"));
        let capture = event(Kind::CaptureCompleted, "CAP-1", Some("350"));

        let refunded = applied(refund.apply(&payment(Status::Pending)));
        assert_eq!(refunded.status, Status::Refunded);
        assert!(refunded.is_partially_refunded());
        assert_eq!(refunded.capture_id, None);

        let late = applied(capture.apply(&refunded));
        assert_eq!(late.status, Status::Refunded);
        assert!(late.is_partially_refunded());
        assert_eq!(late.capture_id.as_ref().unwrap().as_ref(), "CAP-1");

        assert_eq!(capture.apply(&late), Outcome::Duplicate);
        assert_eq!(refund.apply(&late), Outcome::Duplicate);
    }

    #[test]
    fn accumulates_refunds() {
        let first = applied(
            event(Kind::CaptureRefunded, "REF-1", Some("100"))
                .apply(&payment(Status::Completed)),
        );
        let second = applied(
            event(Kind::CaptureRefunded, "REF-2", Some("250")).apply(&first),
        );

        assert_eq!(second.refunded, Some(usd("350")));
        assert!(!second.is_partially_refunded());
        assert_eq!(second.refund_ids.len(), 2);
    }

    #[test]
    fn full_refund_without_amount() {
        let refunded = applied(
            event(Kind::SaleRefunded, "REF-1", None)
                .apply(&payment(Status::Completed)),
        );

        assert_eq!(refunded.refunded, Some(usd("350")));
        assert!(!refunded.is_partially_refunded());
    }

    #[test]
    fn discards_refund_in_unsupported_currency() {
        let refund = Event {
            unsupported_currency: Some("JPY".to_owned()),
            ..event(Kind::CaptureRefunded, "REF-1", None)
        };

        assert_eq!(
            refund.apply(&payment(Status::Completed)),
            Outcome::Mismatch,
        );
    }

    #[test]
    fn failure_does_not_override_settled_payments() {
        let denied = event(Kind::CaptureDenied, "CAP-1", None);

        assert_eq!(
            applied(denied.apply(&payment(Status::Pending))).status,
            Status::Failed,
        );
        assert_eq!(
            denied.apply(&payment(Status::Completed)),
            Outcome::Duplicate,
        );
        assert_eq!(
            denied.apply(&payment(Status::Refunded)),
            Outcome::Duplicate,
        );
        assert_eq!(
            applied(
                event(Kind::CaptureReversed, "CAP-1", None)
                    .apply(&payment(Status::Completed)),
            )
            .status,
            Status::Failed,
        );
    }

    #[test]
    fn approval_only_moves_created_payments() {
        let approved = event(Kind::OrderApproved, "ORDER-1", None);

        assert_eq!(
            applied(approved.apply(&payment(Status::Created))).status,
            Status::Pending,
        );
        assert_eq!(
            approved.apply(&payment(Status::Completed)),
            Outcome::Duplicate,
        );
    }

    #[test]
    fn looks_up_by_capture_then_order_then_transaction() {
        let capture = event(Kind::CaptureCompleted, "CAP-1", None);
        let sale = event(Kind::SaleCompleted, "TX-1", None);
        let order = Event {
            order_id: None,
            ..event(Kind::OrderCancelled, "ORDER-2", None)
        };

        assert_eq!(
            capture
                .lookup()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["capture `CAP-1`", "order `ORDER-1`"],
        );
        assert_eq!(
            sale.lookup()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["order `ORDER-1`", "transaction `TX-1`"],
        );
        assert_eq!(
            order
                .lookup()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["order `ORDER-2`"],
        );
    }
}
