//! In-process [`Database`] implementation.
//!
//! Keeps all the data in memory, so is lost on restart. Provides the same
//! transactional guarantees the [`Postgres`] implementation does: per-key
//! locks held until a transaction ends, writes staged until commit, and the
//! same constraints checked on every write.
//!
//! [`Postgres`]: crate::infra::Postgres

mod impls;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    future::Future,
    mem,
    sync::{Arc, Mutex as StdMutex, PoisonError, RwLock},
    time::Duration,
};

use common::Date;
use dashmap::DashMap;
use derive_more::{Debug, Deref, Display, Error as StdError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Day},
        booking, payment, property, user, Booking, Payment, Property,
    },
    infra::database,
};
#[cfg(doc)]
use crate::infra::Database;

/// In-process [`Database`] client.
#[derive(Clone, Debug, Deref)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new empty [`Memory`] database, timing out lock acquisitions
    /// after the provided `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self(NonTx(Arc::new(State {
            data: RwLock::new(Data::default()),
            locks: DashMap::new(),
            lock_timeout,
        })))
    }
}

/// Shared state of a [`Memory`] database.
#[derive(Debug)]
struct State {
    /// Committed [`Data`].
    data: RwLock<Data>,

    /// Registry of per-[`Key`] locks.
    locks: DashMap<Key, Arc<Mutex<()>>>,

    /// Maximum time to wait for a lock.
    lock_timeout: Duration,
}

impl State {
    /// Applies the provided [`Write`]s atomically, checking the constraints
    /// on each of them.
    fn apply(&self, writes: Vec<Write>) -> Result<(), Error> {
        let mut data =
            self.data.write().unwrap_or_else(PoisonError::into_inner);
        if let [write] = writes.as_slice() {
            data.check(write)?;
            data.apply(writes.into_iter().next().into_iter());
            return Ok(());
        }

        let mut next = data.clone();
        for w in writes {
            next.check(&w)?;
            next.apply([w].into_iter());
        }
        *data = next;
        Ok(())
    }

    /// Removes the lock of the provided [`Key`] from the registry, unless it's
    /// held or awaited by someone.
    fn forget(&self, key: Key) {
        _ = self
            .locks
            .remove_if(&key, |_, m| Arc::strong_count(m) == 1);
    }
}

/// Non-transactional [`Memory`] client.
///
/// Every write is applied immediately.
#[derive(Clone, Debug)]
pub struct NonTx(Arc<State>);

/// Transactional [`Memory`] client.
///
/// Writes are staged and applied on [`Tx::commit()`], locks are held until
/// then. Dropping all the clones of a [`Tx`] without committing rolls it back.
#[derive(Clone, Debug)]
pub struct Tx {
    /// Shared state of the database.
    state: Arc<State>,

    /// [`Staged`] changes of this transaction.
    staged: Arc<StdMutex<Staged>>,
}

/// Changes of a [`Tx`] not committed yet.
#[derive(Debug, Default)]
struct Staged {
    /// [`Write`]s to apply on commit.
    writes: Vec<Write>,

    /// Locks held by the transaction.
    guards: Vec<Held>,

    /// [`Key`]s of the held locks.
    held: HashSet<Key>,
}

impl Tx {
    /// Creates a new [`Tx`] over the provided [`NonTx`] client.
    fn from_non_tx(NonTx(state): &NonTx) -> Self {
        Self {
            state: Arc::clone(state),
            staged: Arc::default(),
        }
    }

    /// Returns the [`Staged`] changes of this [`Tx`].
    fn staged(&self) -> std::sync::MutexGuard<'_, Staged> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits this [`Tx`], releasing all its locks.
    ///
    /// # Errors
    ///
    /// If any of the staged writes violates a constraint. Nothing is applied
    /// then.
    pub fn commit(&self) -> Result<(), Traced<database::Error>> {
        let Staged { writes, guards, held } = mem::take(&mut *self.staged());
        let res = self
            .state
            .apply(writes)
            .map_err(tracerr::from_and_wrap!(=> database::Error));
        drop((guards, held));
        res
    }
}

/// Lock of a [`Key`] held by a [`Tx`].
///
/// Removes the lock from the [`State::locks`] registry on release, unless
/// someone else waits for it.
#[derive(Debug)]
struct Held {
    /// [`Key`] of the held lock.
    key: Key,

    /// Guard of the held lock.
    guard: Option<OwnedMutexGuard<()>>,

    /// [`State`] with the registry of the lock.
    state: Arc<State>,
}

impl Drop for Held {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.state.forget(self.key);
    }
}

/// Key of a lock in a [`Memory`] database.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Key {
    /// Lock of a [`Property`].
    #[display("`Property(id: {_0})`")]
    Property(property::Id),

    /// Lock of a [`Booking`].
    #[display("`Booking(id: {_0})`")]
    Booking(booking::Id),

    /// Lock of a [`Payment`].
    #[display("`Payment(id: {_0})`")]
    Payment(payment::Id),
}

/// Data stored in a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct Data {
    /// Known [`user::Id`]s.
    users: HashSet<user::Id>,

    /// Known [`Property`] snapshots.
    properties: HashMap<property::Id, Property>,

    /// All the [`Booking`]s.
    bookings: HashMap<booking::Id, Booking>,

    /// All the [`Payment`]s.
    payments: HashMap<payment::Id, Payment>,

    /// Non-available [`Day`]s of [`Property`]s.
    availability: BTreeMap<(property::Id, Date), Day>,
}

impl Data {
    /// Applies the provided [`Write`]s without any checks.
    fn apply(&mut self, writes: impl Iterator<Item = Write>) {
        for w in writes {
            match w {
                Write::User(id) => {
                    _ = self.users.insert(id);
                }
                Write::Property(p) => {
                    _ = self.properties.insert(p.id, p);
                }
                Write::Booking(b) => {
                    _ = self.bookings.insert(b.id, *b);
                }
                Write::Payment(p) => {
                    _ = self.payments.insert(p.id, *p);
                }
                Write::Mark(mark) => {
                    for day in mark.days() {
                        let key = (mark.property_id, day.date);
                        if day.status == availability::Status::Available {
                            _ = self.availability.remove(&key);
                        } else {
                            _ = self.availability.insert(key, day);
                        }
                    }
                }
            }
        }
    }

    /// Checks whether the provided [`Write`] keeps this [`Data`] consistent.
    fn check(&self, write: &Write) -> Result<(), Error> {
        match write {
            Write::Booking(b) => {
                if self
                    .bookings
                    .values()
                    .any(|o| o.id != b.id && o.reference == b.reference)
                {
                    return Err(Error::UniqueViolation(
                        "bookings_reference_key",
                    ));
                }
                if !b.is_active() {
                    return Ok(());
                }
                if let Some(other) = self.bookings.values().find(|o| {
                    o.id != b.id
                        && o.property_id == b.property_id
                        && o.is_active()
                        && o.stay.overlaps(&b.stay)
                }) {
                    return Err(Error::ExclusionViolation(other.id));
                }
                Ok(())
            }
            Write::Payment(p) => {
                let duplicate = |f: &dyn Fn(&Payment) -> bool| {
                    self.payments.values().any(|o| o.id != p.id && f(o))
                };
                if p.capture_id.is_some()
                    && duplicate(&|o| o.capture_id == p.capture_id)
                {
                    return Err(Error::UniqueViolation(
                        "payments_capture_id_key",
                    ));
                }
                if duplicate(&|o| o.reference == p.reference) {
                    return Err(Error::UniqueViolation(
                        "payments_reference_key",
                    ));
                }
                Ok(())
            }
            Write::User(_) | Write::Property(_) | Write::Mark(_) => Ok(()),
        }
    }
}

/// Single write operation upon a [`Memory`] database.
#[derive(Clone, Debug)]
pub enum Write {
    /// Upsert of a [`user::User`].
    User(user::Id),

    /// Upsert of a [`Property`].
    Property(Property),

    /// Upsert of a [`Booking`].
    Booking(Box<Booking>),

    /// Upsert of a [`Payment`].
    Payment(Box<Payment>),

    /// Rewrite of [`Property`] availability.
    Mark(availability::Mark),
}

/// Storage of a [`Memory`] database the operations are performed upon.
pub trait Store {
    /// Reads the [`Data`] visible to this [`Store`].
    fn read<R>(&self, f: impl FnOnce(&Data) -> R) -> R;

    /// Writes to this [`Store`].
    ///
    /// # Errors
    ///
    /// If the [`Write`] violates a constraint.
    fn write(&self, write: Write) -> Result<(), Traced<database::Error>>;

    /// Locks the provided [`Key`] until the end of the current transaction.
    ///
    /// # Errors
    ///
    /// If the lock cannot be acquired in time.
    fn lock(
        &self,
        key: Key,
    ) -> impl Future<Output = Result<(), Traced<database::Error>>>;
}

impl Store for NonTx {
    fn read<R>(&self, f: impl FnOnce(&Data) -> R) -> R {
        f(&self.0.data.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self, write: Write) -> Result<(), Traced<database::Error>> {
        self.0
            .apply(vec![write])
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }

    async fn lock(&self, _: Key) -> Result<(), Traced<database::Error>> {
        // Outside of a transaction a lock is released immediately.
        Ok(())
    }
}

impl Store for Tx {
    fn read<R>(&self, f: impl FnOnce(&Data) -> R) -> R {
        let committed =
            self.state.data.read().unwrap_or_else(PoisonError::into_inner);
        let staged = self.staged();
        if staged.writes.is_empty() {
            return f(&committed);
        }

        let mut view = committed.clone();
        drop(committed);
        view.apply(staged.writes.iter().cloned());
        drop(staged);
        f(&view)
    }

    fn write(&self, write: Write) -> Result<(), Traced<database::Error>> {
        self.read(|data| data.check(&write))
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;
        self.staged().writes.push(write);
        Ok(())
    }

    async fn lock(&self, key: Key) -> Result<(), Traced<database::Error>> {
        if self.staged().held.contains(&key) {
            return Ok(());
        }

        let mutex = Arc::clone(&self.state.locks.entry(key).or_default());
        let guard = tokio::time::timeout(
            self.state.lock_timeout,
            mutex.lock_owned(),
        )
        .await
        .map_err(|_| {
            self.state.forget(key);
            Error::LockTimeout(key)
        })
        .map_err(tracerr::from_and_wrap!(=> database::Error))?;

        let mut staged = self.staged();
        staged.guards.push(Held {
            key,
            guard: Some(guard),
            state: Arc::clone(&self.state),
        });
        _ = staged.held.insert(key);
        Ok(())
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Lock wasn't acquired in time.
    #[display("Timed out waiting for the lock of {_0}")]
    LockTimeout(#[error(not(source))] Key),

    /// Active [`Booking`]s overlap.
    #[display("Overlaps active `Booking(id: {_0})`")]
    ExclusionViolation(#[error(not(source))] booking::Id),

    /// Uniqueness constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Indicates whether this [`Error`] is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }

    /// Indicates whether this [`Error`] is an exclusion violation.
    #[must_use]
    pub fn is_exclusion_violation(&self) -> bool {
        matches!(self, Self::ExclusionViolation(_))
    }

    /// Indicates whether this [`Error`] is a unique violation of the
    /// provided constraint (or any, if [`None`]).
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |n| n == *c),
            Self::LockTimeout(_) | Self::ExclusionViolation(_) => false,
        }
    }
}
