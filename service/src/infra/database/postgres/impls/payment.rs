//! [`Payment`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking, payment, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

use super::property::money;

/// Columns of the `payments` table, in the order [`from_row()`] expects.
macro_rules! columns {
    () => {
        "id, reference, booking_id, currency, amount, status, \
         order_id, capture_id, transaction_id, refund_ids, refunded, \
         retry_count, created_at, updated_at"
    };
}

/// Restores a [`Payment`] from the provided [`Row`].
fn from_row(row: &Row) -> Payment {
    let currency = row.get("currency");
    Payment {
        id: row.get("id"),
        reference: row.get("reference"),
        booking_id: row.get("booking_id"),
        amount: Money::new(row.get("amount"), currency),
        status: row.get("status"),
        order_id: row.get("order_id"),
        capture_id: row.get("capture_id"),
        transaction_id: row.get("transaction_id"),
        refund_ids: row.get("refund_ids"),
        refunded: money(row, "refunded", currency),
        retry_count: u16::try_from(row.get::<_, i32>("retry_count"))
            .expect("`retry_count` overflow"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: payment::Id = by.into_inner();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM payments \
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

impl<C> Database<Select<By<Option<Payment>, payment::ProviderId>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::ProviderId>>,
    ) -> Result<Self::Ok, Self::Err> {
        use payment::ProviderId as Id;

        const BY_CAPTURE: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM payments \
              WHERE capture_id = $1::VARCHAR \
              ORDER BY created_at DESC \
              LIMIT 1",
        );
        const BY_ORDER: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM payments \
              WHERE order_id = $1::VARCHAR \
              ORDER BY created_at DESC \
              LIMIT 1",
        );
        const BY_TRANSACTION: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM payments \
              WHERE transaction_id = $1::VARCHAR \
              ORDER BY created_at DESC \
              LIMIT 1",
        );
        let row = match by.into_inner() {
            Id::Capture(id) => self.query_opt(BY_CAPTURE, &[&id]).await,
            Id::Order(id) => self.query_opt(BY_ORDER, &[&id]).await,
            Id::Transaction(id) => {
                self.query_opt(BY_TRANSACTION, &[&id]).await
            }
        }
        .map_err(tracerr::wrap!())?;
        Ok(row.as_ref().map(from_row))
    }
}

impl<C> Database<Select<By<Option<Payment>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let booking_id: booking::Id = by.into_inner();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM payments \
              WHERE booking_id = $1::UUID \
              ORDER BY retry_count DESC, created_at DESC \
              LIMIT 1",
        );
        Ok(self
            .query_opt(SQL, &[&booking_id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            reference,
            booking_id,
            amount,
            status,
            order_id,
            capture_id,
            transaction_id,
            refund_ids,
            refunded,
            retry_count,
            created_at,
            updated_at,
        } = payment;

        let refunded = refunded.map(|m| m.amount);
        let retry_count = i32::from(retry_count);

        const SQL: &str = "\
            INSERT INTO payments (\
                id, reference, booking_id, currency, amount, status, \
                order_id, capture_id, transaction_id, refund_ids, refunded, \
                retry_count, created_at, updated_at \
            ) VALUES (\
                $1::UUID, $2::VARCHAR, $3::UUID, $4::INT2, $5::NUMERIC, \
                $6::INT2, \
                $7::VARCHAR, $8::VARCHAR, $9::VARCHAR, $10::TEXT[], \
                $11::NUMERIC, \
                $12::INT4, $13::TIMESTAMPTZ, $14::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &reference,
                &booking_id,
                &amount.currency,
                &amount.amount,
                &status,
                &order_id,
                &capture_id,
                &transaction_id,
                &refund_ids,
                &refunded,
                &retry_count,
                &created_at,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            status,
            capture_id,
            transaction_id,
            refund_ids,
            refunded,
            retry_count,
            updated_at,
            ..
        } = payment;

        let refunded = refunded.map(|m| m.amount);
        let retry_count = i32::from(retry_count);

        const SQL: &str = "\
            UPDATE payments \
            SET status = $2::INT2, \
                capture_id = $3::VARCHAR, \
                transaction_id = $4::VARCHAR, \
                refund_ids = $5::TEXT[], \
                refunded = $6::NUMERIC, \
                retry_count = $7::INT4, \
                updated_at = $8::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &id,
                &status,
                &capture_id,
                &transaction_id,
                &refund_ids,
                &refunded,
                &retry_count,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Payment, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Payment, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: payment::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM payments \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
