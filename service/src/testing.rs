//! Shared fixtures of the [`Service`] tests.

use std::time::Duration;

use common::{date, money::Currency, operations::Insert, Date, Money};

use crate::{
    command::{CreateBooking, InitiatePayment},
    domain::{
        booking::price::FeeSchedule,
        payment::{self, event::Kind},
        property, user, Booking, Payment, Property, User,
    },
    infra::{Database as _, Memory},
    task, Command as _, Config, Service,
};

/// [`Service`] over a [`Memory`] database with a registered [`Property`] and
/// a guest.
#[derive(Debug)]
pub(crate) struct Fixture {
    /// [`Service`] under test.
    pub(crate) service: Service<Memory>,

    /// Registered [`Property`]: 2..=14 nights, up to 4 guests, 100 USD per
    /// night plus 50 USD of cleaning, instant book.
    pub(crate) property: Property,

    /// Registered guest.
    pub(crate) guest: user::Id,

    /// Background [`task`]s of the [`Service`], never driven.
    _background: task::Background,
}

impl Fixture {
    /// Creates a new [`Fixture`].
    pub(crate) async fn new() -> Self {
        let db = Memory::new(Duration::from_secs(1));
        let (service, background) = Service::new(Config::default(), db);

        let property = Property {
            id: property::Id::new(),
            host_id: user::Id::new(),
            max_guests: 4,
            min_nights: 2,
            max_nights: 14,
            nightly_rate: usd(100),
            fees: FeeSchedule {
                cleaning_fee: Some(usd(50)),
                ..FeeSchedule::default()
            },
            instant_book: true,
        };
        let guest = user::Id::new();
        service
            .database()
            .execute(Insert(property.clone()))
            .await
            .unwrap();
        service
            .database()
            .execute(Insert(User { id: guest }))
            .await
            .unwrap();

        Self {
            service,
            property,
            guest,
            _background: background,
        }
    }

    /// Returns the [`date::Range`] between the provided offsets (in days)
    /// from today.
    pub(crate) fn dates(from: i64, to: i64) -> date::Range {
        let today = Date::today();
        date::Range::new(
            today.add_days(from).unwrap(),
            today.add_days(to).unwrap(),
        )
        .unwrap()
    }

    /// Returns a [`CreateBooking`] of the [`Fixture::property`] for the
    /// provided offsets (in days) from today by 2 guests.
    pub(crate) fn booking(&self, from: i64, to: i64) -> CreateBooking {
        let dates = Self::dates(from, to);
        CreateBooking {
            property_id: self.property.id,
            guest_id: self.guest,
            check_in: dates.start(),
            check_out: dates.end(),
            guests: 2,
            discount: None,
        }
    }

    /// Books the [`Fixture::property`] for the provided offsets (in days)
    /// from today.
    pub(crate) async fn book(&self, from: i64, to: i64) -> Booking {
        self.service.execute(self.booking(from, to)).await.unwrap()
    }

    /// Initiates a [`Payment`] of the provided [`Booking`] with the provided
    /// provider order.
    pub(crate) async fn pay(&self, booking: &Booking, order: &str) -> Payment {
        self.service
            .execute(InitiatePayment {
                booking_id: booking.id,
                order_id: payment::OrderId::from(order.to_owned()),
            })
            .await
            .unwrap()
    }
}

/// Creates a [`Money`] amount of the provided USD.
pub(crate) fn usd(amount: i64) -> Money {
    Money::new(amount.into(), Currency::Usd)
}

/// Creates a [`payment::Event`] of the provided capture completed for the
/// provided order by 350 USD (3 nights of the [`Fixture::property`]).
pub(crate) fn capture_completed(capture: &str, order: &str) -> payment::Event {
    payment::Event {
        kind: Kind::CaptureCompleted,
        resource_id: capture.to_owned(),
        order_id: Some(payment::OrderId::from(order.to_owned())),
        amount: Some(usd(350)),
        unsupported_currency: None,
    }
}

/// Creates a [`payment::Event`] of the provided capture refunded by the
/// provided refund.
pub(crate) fn capture_refunded(
    refund: &str,
    order: &str,
    amount: i64,
) -> payment::Event {
    payment::Event {
        kind: Kind::CaptureRefunded,
        resource_id: refund.to_owned(),
        order_id: Some(payment::OrderId::from(order.to_owned())),
        amount: Some(usd(amount)),
        unsupported_currency: None,
    }
}
