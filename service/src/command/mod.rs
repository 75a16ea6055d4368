//! [`Command`] definition.

pub mod block_dates;
pub mod create_booking;
pub mod initiate_payment;
pub mod process_payment_event;
pub mod receive_payment_webhook;
pub mod register_property;
pub mod register_user;
pub mod transition_booking;
pub mod unblock_dates;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    block_dates::BlockDates, create_booking::CreateBooking,
    initiate_payment::InitiatePayment,
    process_payment_event::ProcessPaymentEvent,
    receive_payment_webhook::ReceivePaymentWebhook,
    register_property::RegisterProperty, register_user::RegisterUser,
    transition_booking::TransitionBooking, unblock_dates::UnblockDates,
};
