//! Lifecycle [`Event`]s emitted by the [`Service`].
//!
//! [`Service`]: crate::Service

use common::{Date, Money};
use derive_more::{Display, From};
use tokio::sync::mpsc;

use crate::domain::{booking, payment, property, user, Booking, Payment};

/// Lifecycle event of a [`Booking`] or a [`Payment`].
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum Event {
    /// New [`Booking`] is created.
    BookingCreated(BookingCreated),

    /// [`Booking`] moved to another [`booking::Status`].
    BookingStatusChanged(BookingStatusChanged),

    /// [`Payment`] moved to another [`payment::Status`].
    PaymentStatusChanged(PaymentStatusChanged),
}

/// [`Event`] of a new [`Booking`] created in [`booking::Status::Pending`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display(
    "`Booking({booking_reference})` of `Property(id: {property_id})` for \
     [{check_in}, {check_out}) created, total {total_price}"
)]
pub struct BookingCreated {
    /// [`booking::Reference`] of the created [`Booking`].
    pub booking_reference: booking::Reference,

    /// ID of the booked [`Property`].
    ///
    /// [`Property`]: crate::domain::Property
    pub property_id: property::Id,

    /// ID of the guest [`User`].
    ///
    /// [`User`]: crate::domain::User
    pub guest_id: user::Id,

    /// Check-in [`Date`].
    pub check_in: Date,

    /// Check-out [`Date`].
    pub check_out: Date,

    /// Total price of the [`Booking`].
    pub total_price: Money,
}

impl From<&Booking> for BookingCreated {
    fn from(b: &Booking) -> Self {
        Self {
            booking_reference: b.reference.clone(),
            property_id: b.property_id,
            guest_id: b.guest_id,
            check_in: b.stay.start(),
            check_out: b.stay.end(),
            total_price: b.price.total(),
        }
    }
}

/// [`Event`] of a [`Booking`] status change.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("`Booking({booking_reference})` moved from `{from}` to `{to}`")]
pub struct BookingStatusChanged {
    /// [`booking::Reference`] of the [`Booking`].
    pub booking_reference: booking::Reference,

    /// Previous [`booking::Status`].
    pub from: booking::Status,

    /// New [`booking::Status`].
    pub to: booking::Status,
}

/// [`Event`] of a [`Payment`] status change.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("`Payment({payment_reference})` moved from `{from}` to `{to}`")]
pub struct PaymentStatusChanged {
    /// [`payment::Reference`] of the [`Payment`].
    pub payment_reference: payment::Reference,

    /// ID of the paid [`Booking`].
    pub booking_id: booking::Id,

    /// Previous [`payment::Status`].
    pub from: payment::Status,

    /// New [`payment::Status`].
    pub to: payment::Status,
}

/// Sending half of the [`Event`]s channel.
pub type Sender = mpsc::UnboundedSender<Event>;

/// Receiving half of the [`Event`]s channel.
pub type Receiver = mpsc::UnboundedReceiver<Event>;
