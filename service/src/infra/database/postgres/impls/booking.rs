//! [`Booking`]-related [`Database`] implementations.

use common::{
    date,
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, price::Breakdown, status, Cancellation},
        property, Booking,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::booking::{Active, Overlapping},
};

use super::property::money;

/// Columns of the `bookings` table, in the order [`from_row()`] expects.
macro_rules! columns {
    () => {
        "id, reference, property_id, guest_id, \
         check_in, check_out, guests, \
         currency, base, cleaning_fee, service_fee, security_deposit, \
         tax, discount, \
         status, payment_status, \
         cancellation_reason, cancelled_by, cancelled_at, \
         created_at, updated_at"
    };
}

/// Restores a [`Booking`] from the provided [`Row`].
fn from_row(row: &Row) -> Booking {
    let currency = row.get("currency");
    let reason: Option<String> = row.get("cancellation_reason");
    Booking {
        id: row.get("id"),
        reference: row.get("reference"),
        property_id: row.get("property_id"),
        guest_id: row.get("guest_id"),
        stay: date::Range::new(row.get("check_in"), row.get("check_out"))
            .expect("`bookings_dates_check` constraint"),
        guests: u16::try_from(row.get::<_, i32>("guests"))
            .expect("`guests` overflow"),
        price: Breakdown::restore(
            Money::new(row.get("base"), currency),
            money(row, "cleaning_fee", currency),
            money(row, "service_fee", currency),
            money(row, "security_deposit", currency),
            money(row, "tax", currency),
            money(row, "discount", currency),
        )
        .expect("stored `Breakdown` is consistent"),
        status: row.get("status"),
        payment_status: row.get("payment_status"),
        cancellation: reason.map(|reason| Cancellation {
            reason,
            actor: row.get("cancelled_by"),
            at: row.get("cancelled_at"),
        }),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM bookings \
              WHERE id = $1::UUID",
        );
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Reference>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM bookings \
              WHERE reference = $1::VARCHAR",
        );
        Ok(self
            .query_opt(SQL, &[&reference])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Vec<Booking>, property::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let property_id: property::Id = by.into_inner();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM bookings \
              WHERE property_id = $1::UUID \
              ORDER BY check_in ASC, created_at ASC",
        );
        Ok(self
            .query(SQL, &[&property_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Select<By<Vec<Active<Booking>>, Overlapping>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Active<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Active<Booking>>, Overlapping>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Overlapping { property_id, dates } = by.into_inner();
        let active = booking::Status::ALL
            .iter()
            .copied()
            .filter(|s| status::is_active(*s))
            .collect::<Vec<_>>();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM bookings \
              WHERE property_id = $1::UUID \
                AND status = ANY($2::INT2[]) \
                AND check_in < $4::DATE \
                AND $3::DATE < check_out \
              ORDER BY check_in ASC",
        );
        Ok(self
            .query(SQL, &[&property_id, &active, &dates.start(), &dates.end()])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| Active(from_row(row)))
            .collect())
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            reference,
            property_id,
            guest_id,
            stay,
            guests,
            price,
            status,
            payment_status,
            cancellation,
            created_at,
            updated_at,
        } = booking;

        let guests = i32::from(guests);
        let amount = |m: Option<Money>| m.map(|m| m.amount);
        let (reason, actor, at) = cancellation
            .map(|c| (Some(c.reason), Some(c.actor), Some(c.at)))
            .unwrap_or_default();

        // Plain `INSERT` so that `bookings_no_overlap` and
        // `bookings_reference_key` violations are reported.
        const SQL: &str = "\
            INSERT INTO bookings (\
                id, reference, property_id, guest_id, \
                check_in, check_out, guests, \
                currency, base, cleaning_fee, service_fee, security_deposit, \
                tax, discount, total, \
                status, payment_status, \
                cancellation_reason, cancelled_by, cancelled_at, \
                created_at, updated_at \
            ) VALUES (\
                $1::UUID, $2::VARCHAR, $3::UUID, $4::UUID, \
                $5::DATE, $6::DATE, $7::INT4, \
                $8::INT2, $9::NUMERIC, $10::NUMERIC, $11::NUMERIC, \
                $12::NUMERIC, \
                $13::NUMERIC, $14::NUMERIC, $15::NUMERIC, \
                $16::INT2, $17::INT2, \
                $18::VARCHAR, $19::INT2, $20::TIMESTAMPTZ, \
                $21::TIMESTAMPTZ, $22::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &reference,
                &property_id,
                &guest_id,
                &stay.start(),
                &stay.end(),
                &guests,
                &price.base().currency,
                &price.base().amount,
                &amount(price.cleaning_fee()),
                &amount(price.service_fee()),
                &amount(price.security_deposit()),
                &amount(price.tax()),
                &amount(price.discount()),
                &price.total().amount,
                &status,
                &payment_status,
                &reason,
                &actor,
                &at,
                &created_at,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            status,
            payment_status,
            cancellation,
            updated_at,
            ..
        } = booking;

        let (reason, actor, at) = cancellation
            .map(|c| (Some(c.reason), Some(c.actor), Some(c.at)))
            .unwrap_or_default();

        const SQL: &str = "\
            UPDATE bookings \
            SET status = $2::INT2, \
                payment_status = $3::INT2, \
                cancellation_reason = $4::VARCHAR, \
                cancelled_by = $5::INT2, \
                cancelled_at = $6::TIMESTAMPTZ, \
                updated_at = $7::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[&id, &status, &payment_status, &reason, &actor, &at, &updated_at],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Booking, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
