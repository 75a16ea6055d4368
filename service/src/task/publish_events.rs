//! [`PublishEvents`] [`Task`].

use std::{convert::Infallible, error::Error, marker::PhantomData};

use common::operations::{By, Perform, Start};
use tracing as log;

use crate::{event, Event, Service};

use super::Task;

/// [`Task`] handing the published [`Event`]s over to the notification
/// collaborators.
///
/// Collaborators consume the [`Event`]s from the structured log output.
#[derive(Debug)]
pub struct PublishEvents<S> {
    /// Type of the [`Service`] publishing the [`Event`]s.
    _service: PhantomData<S>,
}

impl<Db> Task<Start<By<PublishEvents<Self>, event::Receiver>>> for Service<Db>
where
    PublishEvents<Service<Db>>: Task<Perform<Event>, Ok = (), Err: Error>,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<PublishEvents<Self>, event::Receiver>>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut events = by.into_inner();
        let task = PublishEvents {
            _service: PhantomData::<Self>,
        };

        while let Some(ev) = events.recv().await {
            _ = task.execute(Perform(ev)).await.map_err(|e| {
                log::error!("`task::PublishEvents` failed: {e}");
            });
        }
        Ok(())
    }
}

impl<Db> Task<Perform<Event>> for PublishEvents<Service<Db>> {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Perform(ev): Perform<Event>,
    ) -> Result<Self::Ok, Self::Err> {
        match &ev {
            Event::BookingCreated(e) => log::info!(
                event = "BookingCreated",
                booking_reference = %e.booking_reference,
                property_id = %e.property_id,
                guest_id = %e.guest_id,
                check_in = %e.check_in,
                check_out = %e.check_out,
                total_price = %e.total_price,
                "{ev}",
            ),
            Event::BookingStatusChanged(e) => log::info!(
                event = "BookingStatusChanged",
                booking_reference = %e.booking_reference,
                from = %e.from,
                to = %e.to,
                "{ev}",
            ),
            Event::PaymentStatusChanged(e) => log::info!(
                event = "PaymentStatusChanged",
                payment_reference = %e.payment_reference,
                booking_id = %e.booking_id,
                from = %e.from,
                to = %e.to,
                "{ev}",
            ),
        }
        Ok(())
    }
}
