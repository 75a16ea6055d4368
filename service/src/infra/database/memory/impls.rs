//! [`Database`] implementations.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Update,
};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Calendar},
        booking, payment, property, user, Booking, Payment, Property, User,
    },
    infra::{database, Database},
    read::booking::{Active, Overlapping},
};

use super::{Key, Memory, NonTx, Store, Tx, Write};

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Memory(Tx::from_non_tx(&self.0)))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.commit().map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Select<By<Option<User>, user::Id>>> for Memory<C> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|d| d.users.contains(&id).then_some(User { id })))
    }
}

impl<C: Store> Database<Insert<User>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Write::User(user.id)).map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Select<By<Option<Property>, property::Id>>>
    for Memory<C>
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|d| d.properties.get(&id).cloned()))
    }
}

impl<C: Store> Database<Insert<Property>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Write::Property(property))
            .map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Lock<By<Property, property::Id>>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(Key::Property(by.into_inner()))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Select<By<Option<Booking>, booking::Id>>>
    for Memory<C>
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|d| d.bookings.get(&id).cloned()))
    }
}

impl<C: Store> Database<Select<By<Option<Booking>, booking::Reference>>>
    for Memory<C>
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();
        Ok(self.read(|d| {
            d.bookings
                .values()
                .find(|b| b.reference == reference)
                .cloned()
        }))
    }
}

impl<C: Store> Database<Select<By<Vec<Booking>, property::Id>>> for Memory<C> {
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let mut bookings = self.read(|d| {
            d.bookings
                .values()
                .filter(|b| b.property_id == id)
                .cloned()
                .collect::<Vec<_>>()
        });
        bookings.sort_by_key(|b| (b.stay.start(), b.created_at));
        Ok(bookings)
    }
}

impl<C: Store> Database<Select<By<Vec<Active<Booking>>, Overlapping>>>
    for Memory<C>
{
    type Ok = Vec<Active<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Active<Booking>>, Overlapping>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Overlapping { property_id, dates } = by.into_inner();
        let mut bookings = self.read(|d| {
            d.bookings
                .values()
                .filter(|b| {
                    b.property_id == property_id
                        && b.is_active()
                        && b.stay.overlaps(&dates)
                })
                .cloned()
                .collect::<Vec<_>>()
        });
        bookings.sort_by_key(|b| b.stay.start());
        Ok(bookings.into_iter().map(Active).collect())
    }
}

impl<C: Store> Database<Insert<Booking>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Write::Booking(Box::new(booking)))
            .map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Update<Booking>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Write::Booking(Box::new(booking)))
            .map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Lock<By<Booking, booking::Id>>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(Key::Booking(by.into_inner()))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Select<By<Calendar, availability::Selector>>>
    for Memory<C>
{
    type Ok = Calendar;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Calendar, availability::Selector>>,
    ) -> Result<Self::Ok, Self::Err> {
        let selector = by.into_inner();
        let id = selector.property_id;
        let stored = self.read(|d| {
            d.availability
                .range(
                    (id, selector.dates.start())..(id, selector.dates.end()),
                )
                .map(|(_, day)| *day)
                .collect::<Vec<_>>()
        });
        Ok(Calendar::new(selector, stored))
    }
}

impl<C: Store> Database<Update<availability::Mark>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(mark): Update<availability::Mark>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Write::Mark(mark)).map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Select<By<Option<Payment>, payment::Id>>>
    for Memory<C>
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|d| d.payments.get(&id).cloned()))
    }
}

impl<C: Store> Database<Select<By<Option<Payment>, payment::ProviderId>>>
    for Memory<C>
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::ProviderId>>,
    ) -> Result<Self::Ok, Self::Err> {
        use payment::ProviderId as Id;

        let id = by.into_inner();
        Ok(self.read(|d| {
            d.payments
                .values()
                .filter(|p| match &id {
                    Id::Capture(c) => p.capture_id.as_ref() == Some(c),
                    Id::Order(o) => p.order_id == *o,
                    Id::Transaction(t) => p.transaction_id.as_ref() == Some(t),
                })
                .max_by_key(|p| p.created_at)
                .cloned()
        }))
    }
}

impl<C: Store> Database<Select<By<Option<Payment>, booking::Id>>>
    for Memory<C>
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|d| {
            d.payments
                .values()
                .filter(|p| p.booking_id == id)
                .max_by_key(|p| (p.retry_count, p.created_at))
                .cloned()
        }))
    }
}

impl<C: Store> Database<Insert<Payment>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Write::Payment(Box::new(payment)))
            .map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Update<Payment>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(Write::Payment(Box::new(payment)))
            .map_err(tracerr::wrap!())
    }
}

impl<C: Store> Database<Lock<By<Payment, payment::Id>>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Payment, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(Key::Payment(by.into_inner()))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        money::Currency,
        operations::{By, Commit, Insert, Lock, Select, Transact},
        Date, DateTime, Money,
    };

    use crate::{
        domain::{
            availability,
            booking::{self, price},
            property, user, Booking, Property,
        },
        infra::Database,
    };

    use super::Memory;

    fn booking(property_id: property::Id, from: i64, to: i64) -> Booking {
        let today = Date::today();
        let breakdown = price::calculate(price::Quote {
            nightly_rate: Money::new("100".parse().unwrap(), Currency::Usd),
            nights: 1,
            fees: price::FeeSchedule::default(),
            discount: None,
        })
        .unwrap();
        Booking {
            id: booking::Id::new(),
            reference: booking::Reference::generate(),
            property_id,
            guest_id: user::Id::new(),
            stay: common::date::Range::new(
                today.add_days(from).unwrap(),
                today.add_days(to).unwrap(),
            )
            .unwrap(),
            guests: 1,
            price: breakdown,
            status: booking::Status::Pending,
            payment_status: None,
            cancellation: None,
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
        }
    }

    #[tokio::test]
    async fn stages_writes_until_commit() {
        let db = Memory::new(Duration::from_secs(1));
        let b = booking(property::Id::new(), 1, 3);

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(b.clone())).await.unwrap();

        let seen = tx
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap();
        assert_eq!(seen.as_ref(), Some(&b));
        let unseen = db
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap();
        assert_eq!(unseen, None);

        tx.execute(Commit).await.unwrap();
        let committed = db
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap();
        assert_eq!(committed, Some(b));
    }

    #[tokio::test]
    async fn rejects_overlapping_active_bookings() {
        let db = Memory::new(Duration::from_secs(1));
        let property_id = property::Id::new();

        db.execute(Insert(booking(property_id, 1, 4))).await.unwrap();
        db.execute(Insert(booking(property_id, 4, 6))).await.unwrap();

        let err = db
            .execute(Insert(booking(property_id, 3, 5)))
            .await
            .unwrap_err();
        assert!(err.as_ref().is_exclusion_violation());

        let mut cancelled = booking(property_id, 3, 5);
        cancelled.status = booking::Status::Cancelled;
        db.execute(Insert(cancelled)).await.unwrap();
    }

    #[tokio::test]
    async fn rolls_back_dropped_transactions() {
        let db = Memory::new(Duration::from_secs(1));
        let id = property::Id::new();

        {
            let tx = db.execute(Transact).await.unwrap();
            tx.execute(Lock(By::<Property, _>::new(id))).await.unwrap();
            tx.execute(Insert(user::User { id: user::Id::new() }))
                .await
                .unwrap();
        }

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Lock(By::<Property, _>::new(id))).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_waiting_for_lock() {
        let db = Memory::new(Duration::from_millis(100));
        let id = property::Id::new();

        let first = db.execute(Transact).await.unwrap();
        first.execute(Lock(By::<Property, _>::new(id))).await.unwrap();

        let second = db.execute(Transact).await.unwrap();
        let err = second
            .execute(Lock(By::<Property, _>::new(id)))
            .await
            .unwrap_err();
        assert!(err.as_ref().is_transient());

        first.execute(Commit).await.unwrap();
        second
            .execute(Lock(By::<Property, _>::new(id)))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn forgets_released_locks() {
        let db = Memory::new(Duration::from_millis(100));
        let (one, other) = (property::Id::new(), property::Id::new());

        let first = db.execute(Transact).await.unwrap();
        first.execute(Lock(By::<Property, _>::new(one))).await.unwrap();
        first.execute(Lock(By::<Property, _>::new(other))).await.unwrap();
        let second = db.execute(Transact).await.unwrap();
        drop(second.execute(Lock(By::<Property, _>::new(one))).await);
        assert_eq!(db.0 .0.locks.len(), 2);

        first.execute(Commit).await.unwrap();
        assert!(db.0 .0.locks.is_empty());

        {
            let tx = db.execute(Transact).await.unwrap();
            tx.execute(Lock(By::<Property, _>::new(one))).await.unwrap();
        }
        assert!(db.0 .0.locks.is_empty());
    }

    #[tokio::test]
    async fn stores_only_unavailable_days() {
        let db = Memory::new(Duration::from_secs(1));
        let b = booking(property::Id::new(), 1, 4);
        let selector = availability::Selector {
            property_id: b.property_id,
            dates: b.stay,
        };

        db.execute(common::operations::Update(availability::Mark::booked(
            &b,
        )))
        .await
        .unwrap();
        let cal = db
            .execute(Select(By::<availability::Calendar, _>::new(selector)))
            .await
            .unwrap();
        assert!(cal
            .days()
            .iter()
            .all(|d| d.status == availability::Status::Booked
                && d.booking_id == Some(b.id)));

        db.execute(common::operations::Update(
            availability::Mark::released(&b),
        ))
        .await
        .unwrap();
        let cal = db
            .execute(Select(By::<availability::Calendar, _>::new(selector)))
            .await
            .unwrap();
        assert!(cal.is_free());
    }
}
