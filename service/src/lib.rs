//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod event;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;
#[cfg(test)]
mod testing;

use std::{error::Error as StdError, time::Duration};

use common::operations::{By, Start};
use derive_more::Display;
use smart_default::SmartDefault;
use tokio::sync::mpsc;
use tracing as log;

#[cfg(doc)]
use infra::Database;

pub use self::{
    command::Command, event::Event, infra::Cache, query::Query, task::Task,
};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Maximum time to wait for a property, booking or payment lock.
    #[default(Duration::from_secs(5))]
    pub lock_timeout: Duration,

    /// Time-to-live of [`Cache`] entries.
    #[default(Duration::from_secs(30))]
    pub cache_ttl: Duration,

    /// Maximum number of retried payments of a single booking.
    #[default(3)]
    pub payment_max_retries: u16,

    /// [`task::RetryPaymentEvents`] configuration.
    pub retry_payment_events: task::retry_payment_events::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Cache`] of this [`Service`].
    cache: Cache,

    /// Channel to publish [`Event`]s into.
    events: event::Sender,

    /// Queue of payment events to retry processing of.
    retries: task::retry_payment_events::Sender,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters.
    ///
    /// Returned [`task::Background`] must be driven for the published
    /// [`Event`]s and queued payment events retries to be processed.
    pub fn new(config: Config, database: Db) -> (Self, task::Background)
    where
        Self: Task<
                Start<By<task::PublishEvents<Self>, event::Receiver>>,
                Ok = (),
                Err: StdError + 'static,
            > + Task<
                Start<
                    By<
                        task::RetryPaymentEvents<Self>,
                        task::retry_payment_events::Receiver,
                    >,
                >,
                Ok = (),
                Err: StdError + 'static,
            > + Clone
            + 'static,
    {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (retries, retries_rx) = mpsc::unbounded_channel();
        let this = Service {
            cache: Cache::new(config.cache_ttl),
            config,
            database,
            events,
            retries,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("PublishEvents", async move {
            svc.execute(Start(By::<task::PublishEvents<Self>, _>::new(
                events_rx,
            )))
            .await
        });
        let svc = this.clone();
        bg.spawn("RetryPaymentEvents", async move {
            svc.execute(Start(By::<task::RetryPaymentEvents<Self>, _>::new(
                retries_rx,
            )))
            .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Cache`] of this [`Service`].
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Publishes the provided [`Event`] for the [`task::PublishEvents`].
    pub fn publish(&self, event: impl Into<Event>) {
        if let Err(e) = self.events.send(event.into()) {
            log::warn!("`Event` is dropped, as no one listens: {}", e.0);
        }
    }

    /// Queues the provided payment event for another processing attempt by
    /// the [`task::RetryPaymentEvents`].
    pub fn retry(&self, retry: task::retry_payment_events::Retry) {
        if let Err(e) = self.retries.send(retry) {
            log::error!(
                "payment event is dropped, as retries queue is closed: {}",
                e.0.event.resource_id,
            );
        }
    }
}

/// Kind of a [`Service`] operation error.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
    /// Input is invalid, retrying it makes no sense.
    Validation,

    /// Input conflicts with the current state, may succeed with another input.
    Conflict,

    /// Operation is illegal in the current state of an entity.
    State,

    /// Required entity doesn't exist.
    NotFound,

    /// Operation may succeed if retried later.
    Transient,

    /// Unexpected failure.
    Internal,
}

impl ErrorKind {
    /// Returns the [`ErrorKind`] of the provided [`database::Error`].
    ///
    /// [`database::Error`]: infra::database::Error
    #[must_use]
    pub fn of_database(e: &infra::database::Error) -> Self {
        if e.is_transient() {
            Self::Transient
        } else {
            Self::Internal
        }
    }
}
