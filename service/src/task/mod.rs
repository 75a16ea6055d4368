//! Background [`Task`]s definitions.

mod background;
pub mod publish_events;
pub mod retry_payment_events;

pub use common::Handler as Task;

pub use self::{
    background::Background, publish_events::PublishEvents,
    retry_payment_events::RetryPaymentEvents,
};
