//! [`Property`]-related [`Database`] implementations.

use common::{
    money::Currency,
    operations::{By, Insert, Lock, Select},
    Money,
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking::price::FeeSchedule, property, Property},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Reads an optional [`Money`] amount from the `col`umn of the provided
/// [`Row`].
pub(super) fn money(row: &Row, col: &str, currency: Currency) -> Option<Money> {
    row.get::<_, Option<Decimal>>(col)
        .map(|amount| Money::new(amount, currency))
}

impl<C> Database<Select<By<Option<Property>, property::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: property::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, host_id, \
                   max_guests, min_nights, max_nights, \
                   currency, nightly_rate, \
                   cleaning_fee, service_fee, security_deposit, tax_rate, \
                   instant_book \
            FROM properties \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| {
                let currency = row.get("currency");
                let count = |col: &str| {
                    u16::try_from(row.get::<_, i32>(col))
                        .unwrap_or_else(|_| panic!("`{col}` overflow"))
                };
                Property {
                    id: row.get("id"),
                    host_id: row.get("host_id"),
                    max_guests: count("max_guests"),
                    min_nights: count("min_nights"),
                    max_nights: count("max_nights"),
                    nightly_rate: Money::new(row.get("nightly_rate"), currency),
                    fees: FeeSchedule {
                        cleaning_fee: money(&row, "cleaning_fee", currency),
                        service_fee: money(&row, "service_fee", currency),
                        security_deposit: money(
                            &row,
                            "security_deposit",
                            currency,
                        ),
                        tax_rate: row.get("tax_rate"),
                    },
                    instant_book: row.get("instant_book"),
                }
            }))
    }
}

impl<C> Database<Insert<Property>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        let Property {
            id,
            host_id,
            max_guests,
            min_nights,
            max_nights,
            nightly_rate,
            fees:
                FeeSchedule {
                    cleaning_fee,
                    service_fee,
                    security_deposit,
                    tax_rate,
                },
            instant_book,
        } = property;

        let max_guests = i32::from(max_guests);
        let min_nights = i32::from(min_nights);
        let max_nights = i32::from(max_nights);
        let amount = |m: Option<Money>| m.map(|m| m.amount);
        let (cleaning_fee, service_fee, security_deposit) = (
            amount(cleaning_fee),
            amount(service_fee),
            amount(security_deposit),
        );

        const SQL: &str = "\
            INSERT INTO properties (\
                id, host_id, \
                max_guests, min_nights, max_nights, \
                currency, nightly_rate, \
                cleaning_fee, service_fee, security_deposit, tax_rate, \
                instant_book \
            ) VALUES (\
                $1::UUID, $2::UUID, \
                $3::INT4, $4::INT4, $5::INT4, \
                $6::INT2, $7::NUMERIC, \
                $8::NUMERIC, $9::NUMERIC, $10::NUMERIC, $11::NUMERIC, \
                $12::BOOL \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET host_id = EXCLUDED.host_id, \
                max_guests = EXCLUDED.max_guests, \
                min_nights = EXCLUDED.min_nights, \
                max_nights = EXCLUDED.max_nights, \
                currency = EXCLUDED.currency, \
                nightly_rate = EXCLUDED.nightly_rate, \
                cleaning_fee = EXCLUDED.cleaning_fee, \
                service_fee = EXCLUDED.service_fee, \
                security_deposit = EXCLUDED.security_deposit, \
                tax_rate = EXCLUDED.tax_rate, \
                instant_book = EXCLUDED.instant_book";
        self.exec(
            SQL,
            &[
                &id,
                &host_id,
                &max_guests,
                &min_nights,
                &max_nights,
                &nightly_rate.currency,
                &nightly_rate.amount,
                &cleaning_fee,
                &service_fee,
                &security_deposit,
                &tax_rate,
                &instant_book,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Property, property::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: property::Id = by.into_inner();

        // `DO UPDATE` row-locks the existing row until the transaction ends.
        const SQL: &str = "\
            INSERT INTO property_locks (id) \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
