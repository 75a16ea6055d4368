//! Calendar [`Date`] and half-open [`Range`] of dates.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, iter, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::macros::format_description;

/// Calendar date without a time zone.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Date(time::Date);

impl Date {
    /// Returns the current UTC [`Date`].
    #[must_use]
    pub fn today() -> Self {
        Self(time::OffsetDateTime::now_utc().date())
    }

    /// Creates a new [`Date`] out of the provided calendar components.
    ///
    /// [`None`] is returned if the components don't form a valid date.
    #[must_use]
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = time::Month::try_from(month).ok()?;
        time::Date::from_calendar_date(year, month, day).ok().map(Self)
    }

    /// Returns the [`Date`] `days` after (or before, if negative) this one.
    ///
    /// [`None`] is returned if the resulting date is out of range.
    #[must_use]
    pub fn add_days(self, days: i64) -> Option<Self> {
        self.0.checked_add(time::Duration::days(days)).map(Self)
    }

    /// Returns the next [`Date`] after this one.
    ///
    /// [`None`] is returned for the maximum representable date.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    /// Returns the number of days from this [`Date`] until the `other` one.
    ///
    /// Negative if the `other` [`Date`] precedes this one.
    #[must_use]
    pub fn days_until(self, other: Self) -> i64 {
        (other.0 - self.0).whole_days()
    }
}

impl From<time::Date> for Date {
    fn from(date: time::Date) -> Self {
        Self(date)
    }
}

impl From<Date> for time::Date {
    fn from(date: Date) -> Self {
        date.0
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self
            .0
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl FromStr for Date {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time::Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|_| "invalid `Date`, expected `YYYY-MM-DD`")
    }
}

/// Half-open `[start; end)` range of [`Date`]s.
///
/// For a stay, `start` is the check-in date and `end` is the check-out date,
/// so the number of [`Range::nights()`] equals `end - start`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Range {
    /// First [`Date`] included in this [`Range`].
    start: Date,

    /// First [`Date`] not included in this [`Range`].
    end: Date,
}

impl Range {
    /// Creates a new [`Range`] if the provided `start` precedes the `end`.
    #[must_use]
    pub fn new(start: Date, end: Date) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Returns the first [`Date`] included in this [`Range`].
    #[must_use]
    pub fn start(&self) -> Date {
        self.start
    }

    /// Returns the first [`Date`] not included in this [`Range`].
    #[must_use]
    pub fn end(&self) -> Date {
        self.end
    }

    /// Returns the number of nights (days) covered by this [`Range`].
    #[expect(clippy::missing_panics_doc, reason = "`start < end` invariant")]
    #[must_use]
    pub fn nights(&self) -> u32 {
        u32::try_from(self.start.days_until(self.end))
            .expect("`start < end` invariant")
    }

    /// Indicates whether this [`Range`] shares at least one [`Date`] with the
    /// `other` one.
    ///
    /// `[a1; a2)` and `[b1; b2)` overlap iff `a1 < b2 && b1 < a2`, so ranges
    /// touching at a check-out/check-in boundary don't overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Indicates whether the provided [`Date`] belongs to this [`Range`].
    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date < self.end
    }

    /// Returns the intersection of this [`Range`] with the `other` one, if
    /// they overlap.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        Self::new(self.start.max(other.start), self.end.min(other.end))
    }

    /// Iterates over all the [`Date`]s of this [`Range`].
    pub fn days(&self) -> impl Iterator<Item = Date> {
        let end = self.end;
        iter::successors(Some(self.start), |d| d.next())
            .take_while(move |d| *d < end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Date {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Date {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{
        de::Error as _, Deserialize, Deserializer, Serialize, Serializer,
    };

    use super::Date;

    impl Serialize for Date {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Date {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            let s = String::deserialize(d)?;
            Self::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use std::str::FromStr as _;

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Calendar date in `YYYY-MM-DD` format.
    #[graphql_scalar(with = Self, parse_token(String))]
    type Date = super::Date;

    impl Date {
        fn to_output<S: ScalarValue>(d: &Date) -> Value<S> {
            Value::scalar(d.to_string())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `Date` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_str(s).map_err(|e| {
                        format!("Cannot parse `Date` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use super::{Date, Range};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn range(start: &str, end: &str) -> Range {
        Range::new(date(start), date(end)).unwrap()
    }

    #[test]
    fn parses_and_prints() {
        assert_eq!(date("2025-06-01"), Date::from_ymd(2025, 6, 1).unwrap());
        assert_eq!(date("2025-06-01").to_string(), "2025-06-01");
        assert!("2025-13-01".parse::<Date>().is_err());
        assert!("01.06.2025".parse::<Date>().is_err());
    }

    #[test]
    fn counts_nights() {
        assert_eq!(range("2025-06-01", "2025-06-04").nights(), 3);
        assert_eq!(range("2024-02-28", "2024-03-01").nights(), 2);
        assert!(Range::new(date("2025-06-04"), date("2025-06-04")).is_none());
        assert!(Range::new(date("2025-06-04"), date("2025-06-01")).is_none());
    }

    #[test]
    fn overlap_is_half_open() {
        let stay = range("2025-06-01", "2025-06-04");

        assert!(stay.overlaps(&range("2025-06-03", "2025-06-05")));
        assert!(stay.overlaps(&range("2025-05-30", "2025-06-02")));
        assert!(stay.overlaps(&range("2025-06-02", "2025-06-03")));
        assert!(stay.overlaps(&range("2025-05-01", "2025-07-01")));
        assert!(!stay.overlaps(&range("2025-06-04", "2025-06-06")));
        assert!(!stay.overlaps(&range("2025-05-29", "2025-06-01")));
    }

    #[test]
    fn iterates_days() {
        let stay = range("2025-06-30", "2025-07-02");
        let days = stay.days().collect::<Vec<_>>();

        assert_eq!(days, vec![date("2025-06-30"), date("2025-07-01")]);
        assert!(stay.contains(date("2025-07-01")));
        assert!(!stay.contains(date("2025-07-02")));
    }

    #[test]
    fn intersects() {
        let stay = range("2025-06-01", "2025-06-10");

        assert_eq!(
            stay.intersection(&range("2025-06-05", "2025-06-20")),
            Some(range("2025-06-05", "2025-06-10")),
        );
        assert_eq!(stay.intersection(&range("2025-06-10", "2025-06-20")), None);
    }
}
