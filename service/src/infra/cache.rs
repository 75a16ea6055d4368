//! Read-through [`Cache`] of [`Property`] snapshots and availability
//! [`Calendar`]s.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

use crate::domain::{
    availability::{Calendar, Selector},
    property, Property,
};

/// Read-through cache of [`Property`] snapshots and availability
/// [`Calendar`]s.
///
/// Entries live no longer than the configured TTL, and are dropped eagerly
/// on [`Cache::invalidate()`]. Values loaded before an invalidation are never
/// stored after it: a loader takes a [`Generation`] before reading the
/// database and passes it on put.
#[derive(Clone, Debug)]
pub struct Cache {
    /// Time-to-live of every entry.
    ttl: Duration,

    /// Cached [`Property`] snapshots.
    properties: Arc<DashMap<property::Id, Entry<Property>>>,

    /// Cached [`Calendar`]s.
    calendars: Arc<DashMap<Selector, Entry<Calendar>>>,

    /// Current [`Generation`]s of [`Property`]s, bumped on every
    /// invalidation.
    generations: Arc<DashMap<property::Id, u64>>,
}

/// Generation of the cached data of a single [`Property`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Generation(u64);

/// Value stored in a [`Cache`].
#[derive(Debug)]
struct Entry<T> {
    /// Cached value.
    value: T,

    /// [`Instant`] this [`Entry`] becomes stale at.
    expires_at: Instant,
}

impl Cache {
    /// Creates a new empty [`Cache`] with the provided entries `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            properties: Arc::default(),
            calendars: Arc::default(),
            generations: Arc::default(),
        }
    }

    /// Returns the current [`Generation`] of the [`Property`] with the
    /// provided ID.
    #[must_use]
    pub fn generation(&self, property_id: property::Id) -> Generation {
        Generation(self.generations.get(&property_id).map_or(0, |g| *g))
    }

    /// Returns the cached [`Property`], if any.
    #[must_use]
    pub fn property(&self, id: property::Id) -> Option<Property> {
        Self::get(&self.properties, &id)
    }

    /// Caches the provided [`Property`], unless it was invalidated since the
    /// provided [`Generation`].
    pub fn put_property(&self, property: Property, generation: Generation) {
        let id = property.id;
        self.put_if_current(id, generation, || {
            _ = self.properties.insert(id, self.entry(property));
        });
    }

    /// Returns the cached [`Calendar`] matching the provided [`Selector`], if
    /// any.
    #[must_use]
    pub fn calendar(&self, selector: &Selector) -> Option<Calendar> {
        Self::get(&self.calendars, selector)
    }

    /// Caches the provided [`Calendar`], unless it was invalidated since the
    /// provided [`Generation`].
    pub fn put_calendar(&self, calendar: Calendar, generation: Generation) {
        let selector = Selector {
            property_id: calendar.property_id,
            dates: calendar.dates,
        };
        self.put_if_current(selector.property_id, generation, || {
            _ = self.calendars.insert(selector, self.entry(calendar));
        });
    }

    /// Drops all the [`Calendar`]s of the [`Property`] with the provided ID.
    pub fn invalidate(&self, property_id: property::Id) {
        *self.generations.entry(property_id).or_default() += 1;
        self.calendars.retain(|s, _| s.property_id != property_id);
    }

    /// Drops the [`Property`] snapshot and all the [`Calendar`]s of the
    /// [`Property`] with the provided ID.
    pub fn invalidate_property(&self, property_id: property::Id) {
        self.invalidate(property_id);
        _ = self.properties.remove(&property_id);
    }

    /// Runs the provided `put` if the [`Property`] with the provided ID is
    /// still at the provided [`Generation`].
    ///
    /// The generation is kept read-locked while putting, so a concurrent
    /// [`Cache::invalidate()`] either waits for the put and drops its result,
    /// or bumps the generation before it and makes it a no-op.
    fn put_if_current(
        &self,
        property_id: property::Id,
        Generation(expected): Generation,
        put: impl FnOnce(),
    ) {
        let current = self.generations.get(&property_id);
        if current.as_deref().map_or(0, |g| *g) == expected {
            put();
        }
    }

    /// Wraps the provided `value` into a fresh [`Entry`].
    fn entry<T>(&self, value: T) -> Entry<T> {
        Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        }
    }

    /// Returns a non-stale value from the provided `map`, dropping the stale
    /// one.
    fn get<K, T>(map: &DashMap<K, Entry<T>>, key: &K) -> Option<T>
    where
        K: Eq + std::hash::Hash,
        T: Clone,
    {
        let now = Instant::now();
        if let Some(e) = map.get(key) {
            if e.expires_at > now {
                return Some(e.value.clone());
            }
        }
        _ = map.remove_if(key, |_, e| e.expires_at <= now);
        None
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{date, money::Currency, Date, Money};

    use crate::domain::{
        availability::{Calendar, Selector},
        booking::price::FeeSchedule,
        property, user, Property,
    };

    use super::Cache;

    fn property() -> Property {
        Property {
            id: property::Id::new(),
            host_id: user::Id::new(),
            max_guests: 4,
            min_nights: 1,
            max_nights: 30,
            nightly_rate: Money::new(100.into(), Currency::Usd),
            fees: FeeSchedule::default(),
            instant_book: false,
        }
    }

    fn selector(property_id: property::Id, from: i64) -> Selector {
        let today = Date::today();
        Selector {
            property_id,
            dates: date::Range::new(
                today.add_days(from).unwrap(),
                today.add_days(from + 7).unwrap(),
            )
            .unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expires_entries() {
        let cache = Cache::new(Duration::from_secs(60));
        let p = property();
        cache.put_property(p.clone(), cache.generation(p.id));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.property(p.id), Some(p.clone()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.property(p.id), None);
    }

    #[tokio::test]
    async fn invalidates_calendars_of_property() {
        let cache = Cache::new(Duration::from_secs(60));
        let (one, other) = (property::Id::new(), property::Id::new());
        for s in [selector(one, 1), selector(one, 10), selector(other, 1)] {
            cache.put_calendar(
                Calendar::new(s, []),
                cache.generation(s.property_id),
            );
        }

        cache.invalidate(one);

        assert!(cache.calendar(&selector(one, 1)).is_none());
        assert!(cache.calendar(&selector(one, 10)).is_none());
        assert!(cache.calendar(&selector(other, 1)).is_some());
    }

    #[tokio::test]
    async fn drops_values_loaded_before_invalidation() {
        let cache = Cache::new(Duration::from_secs(60));
        let p = property();
        let s = selector(p.id, 1);
        let loaded_at = cache.generation(p.id);

        cache.invalidate(p.id);
        cache.put_calendar(Calendar::new(s, []), loaded_at);
        cache.put_property(p.clone(), loaded_at);

        assert!(cache.calendar(&s).is_none());
        assert!(cache.property(p.id).is_none());

        cache.put_calendar(Calendar::new(s, []), cache.generation(p.id));
        assert!(cache.calendar(&s).is_some());
    }
}
