//! [`Occupancy`] definition.

use std::collections::BTreeSet;

use common::{
    date,
    operations::{By, Select},
    Percent,
};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::Property;
use crate::{
    domain::{booking, property, Booking},
    infra::{database, Database},
    read, Query, Service,
};

/// [`Query`] to calculate occupancy of a [`Property`] over a range of dates.
///
/// Only the [`Booking`]s that were actually honored are counted: confirmed,
/// checked in, checked out and completed ones.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Occupancy {
    /// ID of the [`Property`] to calculate occupancy of.
    pub property_id: property::Id,

    /// Dates to calculate occupancy over.
    pub dates: date::Range,
}

/// Indicates whether a [`Booking`] in the provided [`booking::Status`] counts
/// towards [`Occupancy`].
fn is_occupying(status: booking::Status) -> bool {
    use booking::Status as S;

    matches!(
        status,
        S::Confirmed | S::CheckedIn | S::CheckedOut | S::Completed,
    )
}

impl<Db> Query<Occupancy> for Service<Db>
where
    Db: Database<
        Select<By<Vec<Booking>, property::Id>>,
        Ok = Vec<Booking>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::report::Occupancy;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Occupancy { property_id, dates }: Occupancy,
    ) -> Result<Self::Ok, Self::Err> {
        let bookings = self
            .database()
            .execute(Select(By::<Vec<Booking>, _>::new(property_id)))
            .await
            .map_err(tracerr::wrap!())?;

        let booked = bookings
            .iter()
            .filter(|b| is_occupying(b.status))
            .filter_map(|b| b.stay.intersection(&dates))
            .flat_map(|r| r.days())
            .collect::<BTreeSet<_>>();
        let booked_nights = u32::try_from(booked.len()).unwrap_or(u32::MAX);

        Ok(read::report::Occupancy {
            property_id,
            dates,
            booked_nights,
            rate: Percent::ratio(booked_nights, dates.nights())
                .unwrap_or(Percent::ZERO),
        })
    }
}

#[cfg(test)]
mod spec {
    use common::Percent;
    use rust_decimal::Decimal;

    use crate::{
        command::{transition_booking::Transition, TransitionBooking},
        testing::Fixture,
        Command as _, Query as _,
    };

    use super::Occupancy;

    #[tokio::test]
    async fn counts_only_honored_bookings() {
        let f = Fixture::new().await;
        let confirmed = f.book(1, 4).await;
        f.service
            .execute(TransitionBooking {
                booking_id: confirmed.id,
                transition: Transition::Confirm,
            })
            .await
            .unwrap();
        // Pending bookings don't count.
        drop(f.book(6, 8).await);

        let report = f
            .service
            .execute(Occupancy {
                property_id: f.property.id,
                dates: Fixture::dates(0, 10),
            })
            .await
            .unwrap();

        assert_eq!(report.booked_nights, 3);
        assert_eq!(report.rate, Percent::new(Decimal::from(30)).unwrap());
    }

    #[tokio::test]
    async fn clips_bookings_to_range() {
        let f = Fixture::new().await;
        let b = f.book(1, 5).await;
        f.service
            .execute(TransitionBooking {
                booking_id: b.id,
                transition: Transition::Confirm,
            })
            .await
            .unwrap();

        let report = f
            .service
            .execute(Occupancy {
                property_id: f.property.id,
                dates: Fixture::dates(3, 7),
            })
            .await
            .unwrap();

        assert_eq!(report.booked_nights, 2);
        assert_eq!(report.rate, Percent::new(Decimal::from(50)).unwrap());
    }
}
