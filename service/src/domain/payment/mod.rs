//! [`Payment`] definitions.

pub mod event;
pub mod webhook;

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking;
#[cfg(doc)]
use crate::domain::Booking;

pub use self::event::Event;

/// Payment of a [`Booking`] processed by the payment provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// Human-readable unique [`Reference`] of this [`Payment`].
    pub reference: Reference,

    /// ID of the paid [`Booking`].
    pub booking_id: booking::Id,

    /// Amount to be paid.
    pub amount: Money,

    /// Current [`Status`] of this [`Payment`].
    pub status: Status,

    /// Provider order created for this [`Payment`].
    pub order_id: OrderId,

    /// Provider capture of the order, once captured.
    ///
    /// Immutable once set.
    pub capture_id: Option<CaptureId>,

    /// Provider sale transaction, for the payments settled as a sale.
    pub transaction_id: Option<TransactionId>,

    /// Provider refunds applied to this [`Payment`], in order of arrival.
    pub refund_ids: Vec<RefundId>,

    /// Total amount refunded so far, if any.
    pub refunded: Option<Money>,

    /// Number of previous failed attempts to pay the same [`Booking`].
    pub retry_count: u16,

    /// [`DateTime`] when this [`Payment`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Payment`] was last modified.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: ModificationDateTime,
}

impl Payment {
    /// Indicates whether this [`Payment`] is refunded only partially.
    #[must_use]
    pub fn is_partially_refunded(&self) -> bool {
        self.status == Status::Refunded
            && self
                .refunded
                .is_some_and(|r| r.amount < self.amount.amount)
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Provider order is created, awaiting the payer."]
        Created = 1,

        #[doc = "Order is approved by the payer, awaiting capture."]
        Pending = 2,

        #[doc = "Funds are captured."]
        Completed = 3,

        #[doc = "Payment is denied, reversed or cancelled."]
        Failed = 4,

        #[doc = "Funds are returned to the payer, fully or partially."]
        Refunded = 5,
    }
}

/// Indicates whether a [`Payment`] in the provided [`Status`] prevents
/// starting a new one for the same [`Booking`].
#[must_use]
pub fn is_in_progress(status: Status) -> bool {
    matches!(
        status,
        Status::Created | Status::Pending | Status::Completed,
    )
}

/// ID of a [`Payment`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Human-readable unique reference of a [`Payment`], like `PAY-9C01D2E3F4A5`.
#[derive(Clone, Debug, Display, Eq, Hash, Into, PartialEq)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Reference(String);

impl Reference {
    /// Prefix of every [`Reference`].
    pub const PREFIX: &'static str = "PAY-";

    /// Generates a new random [`Reference`].
    #[must_use]
    pub fn generate() -> Self {
        let mut s = Uuid::new_v4().simple().to_string();
        s.truncate(12);
        Self(format!("{}{}", Self::PREFIX, s.to_uppercase()))
    }
}

/// Defines a newtype for a provider-issued identifier.
macro_rules! define_provider_id {
    ($(#[doc = $doc:literal] $name:ident),* $(,)?) => {$(
        #[doc = $doc]
        #[derive(
            Clone, Debug, Deserialize, Display, Eq, From, Hash, Into,
            PartialEq, Serialize,
        )]
        #[cfg_attr(
            feature = "postgres",
            derive(ToSql, FromSql),
            postgres(transparent),
        )]
        pub struct $name(String);

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    )*};
}

define_provider_id! {
    #[doc = "ID of a provider order."]
    OrderId,

    #[doc = "ID of a provider capture of an order."]
    CaptureId,

    #[doc = "ID of a provider sale transaction."]
    TransactionId,

    #[doc = "ID of a provider refund."]
    RefundId,
}

/// Provider-issued identifier a [`Payment`] can be found by.
#[derive(Clone, Debug, Display, Eq, From, Hash, PartialEq)]
pub enum ProviderId {
    /// [`CaptureId`] of the [`Payment`].
    #[display("capture `{_0}`")]
    Capture(CaptureId),

    /// [`OrderId`] of the [`Payment`].
    #[display("order `{_0}`")]
    Order(OrderId),

    /// [`TransactionId`] of the [`Payment`].
    #[display("transaction `{_0}`")]
    Transaction(TransactionId),
}

/// [`DateTime`] when a [`Payment`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;

/// [`DateTime`] when a [`Payment`] was last modified.
///
/// [`DateTime`]: common::DateTime
pub type ModificationDateTime = DateTimeOf<(Payment, unit::Modification)>;
