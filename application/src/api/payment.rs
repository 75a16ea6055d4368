//! [`Payment`]-related definitions.

use common::{DateTime, Money};
use derive_more::{Display, From, Into};
use juniper::{graphql_object, GraphQLEnum, GraphQLScalar};
use service::domain;
use uuid::Uuid;

use crate::{api, Context};

/// A payment of a `Booking`.
#[derive(Clone, Debug)]
pub struct Payment {
    /// Underlying [`domain::Payment`].
    payment: domain::Payment,

    /// Paid [`api::Booking`].
    booking: api::Booking,
}

impl From<domain::Payment> for Payment {
    fn from(payment: domain::Payment) -> Self {
        Self {
            // SAFETY: `Payment` always references an existing `Booking`.
            #[expect(
                clippy::allow_attributes,
                reason = "TODO: Remove once clippy is fixed"
            )]
            #[allow(unsafe_code, reason = "invariants are preserved")]
            booking: unsafe {
                api::Booking::new_unchecked(payment.booking_id)
            },
            payment,
        }
    }
}

/// A payment of a `Booking`.
#[graphql_object(context = Context)]
impl Payment {
    /// Unique identifier of this `Payment`.
    #[must_use]
    pub fn id(&self) -> Id {
        self.payment.id.into()
    }

    /// Human-readable unique reference of this `Payment`.
    #[must_use]
    pub fn reference(&self) -> String {
        self.payment.reference.to_string()
    }

    /// Paid `Booking`.
    #[must_use]
    pub fn booking(&self) -> &api::Booking {
        &self.booking
    }

    /// Amount to be paid.
    #[must_use]
    pub fn amount(&self) -> Money {
        self.payment.amount
    }

    /// Current status of this `Payment`.
    #[must_use]
    pub fn status(&self) -> Status {
        self.payment.status.into()
    }

    /// Provider order created for this `Payment`.
    #[must_use]
    pub fn order_id(&self) -> OrderId {
        OrderId(self.payment.order_id.to_string())
    }

    /// Provider capture of the order, once captured.
    #[must_use]
    pub fn capture_id(&self) -> Option<String> {
        self.payment.capture_id.as_ref().map(ToString::to_string)
    }

    /// Provider sale transaction, for the payments settled as a sale.
    #[must_use]
    pub fn transaction_id(&self) -> Option<String> {
        self.payment.transaction_id.as_ref().map(ToString::to_string)
    }

    /// Provider refunds applied to this `Payment`, in order of arrival.
    #[must_use]
    pub fn refund_ids(&self) -> Vec<String> {
        self.payment.refund_ids.iter().map(ToString::to_string).collect()
    }

    /// Total amount refunded so far, if any.
    #[must_use]
    pub fn refunded(&self) -> Option<Money> {
        self.payment.refunded
    }

    /// Indicator whether this `Payment` is refunded only partially.
    #[must_use]
    pub fn is_partially_refunded(&self) -> bool {
        self.payment.is_partially_refunded()
    }

    /// Number of previous failed attempts to pay the same `Booking`.
    #[must_use]
    pub fn retry_count(&self) -> i32 {
        self.payment.retry_count.into()
    }

    /// `DateTime` when this `Payment` was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime {
        self.payment.created_at.coerce()
    }

    /// `DateTime` when this `Payment` was last modified.
    #[must_use]
    pub fn updated_at(&self) -> DateTime {
        self.payment.updated_at.coerce()
    }
}

/// Unique identifier of a `Payment`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::payment::Id)]
#[into(domain::payment::Id)]
#[graphql(name = "PaymentId", transparent)]
pub struct Id(Uuid);

/// ID of an order created by the payment provider.
#[derive(Clone, Debug, Display, GraphQLScalar)]
#[graphql(name = "PaymentOrderId", transparent)]
pub struct OrderId(String);

impl From<OrderId> for domain::payment::OrderId {
    fn from(OrderId(id): OrderId) -> Self {
        id.into()
    }
}

/// Status of a `Payment`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "PaymentStatus")]
pub enum Status {
    /// Provider order is created, awaiting the payer.
    Created,

    /// Order is approved by the payer, awaiting capture.
    Pending,

    /// Funds are captured.
    Completed,

    /// Payment is denied, reversed or cancelled.
    Failed,

    /// Funds are returned to the payer, fully or partially.
    Refunded,
}

impl From<domain::payment::Status> for Status {
    fn from(status: domain::payment::Status) -> Self {
        use domain::payment::Status as S;
        match status {
            S::Created => Self::Created,
            S::Pending => Self::Pending,
            S::Completed => Self::Completed,
            S::Failed => Self::Failed,
            S::Refunded => Self::Refunded,
        }
    }
}
