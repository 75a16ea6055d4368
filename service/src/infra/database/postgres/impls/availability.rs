//! Availability-related [`Database`] implementations.

use common::operations::{By, Select, Update};
use tracerr::Traced;

use crate::{
    domain::availability::{self, Calendar, Day},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Calendar, availability::Selector>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Calendar;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Calendar, availability::Selector>>,
    ) -> Result<Self::Ok, Self::Err> {
        let selector = by.into_inner();

        const SQL: &str = "\
            SELECT date, status, booking_id \
            FROM availability \
            WHERE property_id = $1::UUID \
              AND date >= $2::DATE \
              AND date < $3::DATE \
            ORDER BY date ASC";
        let stored = self
            .query(
                SQL,
                &[
                    &selector.property_id,
                    &selector.dates.start(),
                    &selector.dates.end(),
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| Day {
                date: row.get("date"),
                status: row.get("status"),
                booking_id: row.get("booking_id"),
            });
        Ok(Calendar::new(selector, stored))
    }
}

impl<C> Database<Update<availability::Mark>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(mark): Update<availability::Mark>,
    ) -> Result<Self::Ok, Self::Err> {
        let availability::Mark {
            property_id,
            dates,
            status,
            booking_id,
        } = mark;

        // Available dates are not stored.
        if status == availability::Status::Available {
            const SQL: &str = "\
                DELETE FROM availability \
                WHERE property_id = $1::UUID \
                  AND date >= $2::DATE \
                  AND date < $3::DATE";
            return self
                .exec(SQL, &[&property_id, &dates.start(), &dates.end()])
                .await
                .map_err(tracerr::wrap!())
                .map(drop);
        }

        const SQL: &str = "\
            INSERT INTO availability (property_id, date, status, booking_id) \
            SELECT $1::UUID, d::DATE, $4::INT2, $5::UUID \
            FROM generate_series(\
                $2::DATE::TIMESTAMP, \
                ($3::DATE - 1)::TIMESTAMP, \
                '1 day'::INTERVAL \
            ) AS d \
            ON CONFLICT (property_id, date) DO UPDATE \
            SET status = EXCLUDED.status, \
                booking_id = EXCLUDED.booking_id";
        self.exec(
            SQL,
            &[
                &property_id,
                &dates.start(),
                &dates.end(),
                &status,
                &booking_id,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
