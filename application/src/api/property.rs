//! [`Property`]-related definitions.

use common::{Date, Money, Percent};
use derive_more::{Display, From, Into};
use futures::TryFutureExt as _;
use juniper::{graphql_object, GraphQLInputObject, GraphQLScalar};
use service::{domain, query, Query as _};
use uuid::Uuid;

use crate::{api, define_error, AsError, Context, Error};

/// A rental property.
#[derive(Clone, Debug, From)]
pub struct Property(domain::Property);

/// A rental property.
#[graphql_object(context = Context)]
impl Property {
    /// Unique identifier of this `Property`.
    #[must_use]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// `User` hosting this `Property`.
    #[must_use]
    pub fn host_id(&self) -> api::user::Id {
        self.0.host_id.into()
    }

    /// Maximum number of guests of a single `Booking`.
    #[must_use]
    pub fn max_guests(&self) -> i32 {
        self.0.max_guests.into()
    }

    /// Minimum number of nights of a single `Booking`.
    #[must_use]
    pub fn min_nights(&self) -> i32 {
        self.0.min_nights.into()
    }

    /// Maximum number of nights of a single `Booking`.
    #[must_use]
    pub fn max_nights(&self) -> i32 {
        self.0.max_nights.into()
    }

    /// Price of a single night.
    #[must_use]
    pub fn nightly_rate(&self) -> Money {
        self.0.nightly_rate
    }

    /// One-time cleaning fee.
    #[must_use]
    pub fn cleaning_fee(&self) -> Option<Money> {
        self.0.fees.cleaning_fee
    }

    /// One-time platform service fee.
    #[must_use]
    pub fn service_fee(&self) -> Option<Money> {
        self.0.fees.service_fee
    }

    /// Refundable security deposit.
    #[must_use]
    pub fn security_deposit(&self) -> Option<Money> {
        self.0.fees.security_deposit
    }

    /// Tax rate applied to the discounted subtotal.
    #[must_use]
    pub fn tax_rate(&self) -> Option<Percent> {
        self.0.fees.tax_rate
    }

    /// Indicator whether `Booking`s of this `Property` are confirmed once
    /// paid, without a host approval.
    #[must_use]
    pub fn instant_book(&self) -> bool {
        self.0.instant_book
    }

    /// `Booking`s of this `Property`, ordered by their check-in dates.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.bookings",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn bookings(
        &self,
        ctx: &Context,
    ) -> Result<Vec<api::Booking>, Error> {
        ctx.service()
            .execute(query::bookings::OfProperty::by(self.0.id))
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map_ok(|bs| bs.into_iter().map(Into::into).collect())
            .await
    }

    /// Availability `Calendar` of this `Property` for the `[from; to)`
    /// dates.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_REQUEST` - `to` date doesn't come after the `from` date.
    #[tracing::instrument(
        skip_all,
        fields(
            from = %from,
            gql.name = "Property.calendar",
            otel.name = api::Query::SPAN_NAME,
            to = %to,
        ),
    )]
    pub async fn calendar(
        &self,
        from: Date,
        to: Date,
        ctx: &Context,
    ) -> Result<api::Calendar, Error> {
        let dates = api::dates(from, to).map_err(ctx.error())?;
        ctx.service()
            .execute(query::availability::Calendar {
                property_id: self.0.id,
                dates,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

/// Unique identifier of a `Property`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::property::Id)]
#[into(domain::property::Id)]
#[graphql(name = "PropertyId", transparent)]
pub struct Id(Uuid);

/// Snapshot of a `Property` constraints, as managed by the property
/// management.
#[derive(Clone, Debug, GraphQLInputObject)]
pub struct PropertyInput {
    /// Unique identifier of the `Property`.
    pub id: Id,

    /// `User` hosting the `Property`.
    pub host_id: api::user::Id,

    /// Maximum number of guests of a single `Booking`.
    pub max_guests: i32,

    /// Minimum number of nights of a single `Booking`.
    pub min_nights: i32,

    /// Maximum number of nights of a single `Booking`.
    pub max_nights: i32,

    /// Price of a single night.
    pub nightly_rate: Money,

    /// One-time cleaning fee.
    pub cleaning_fee: Option<Money>,

    /// One-time platform service fee.
    pub service_fee: Option<Money>,

    /// Refundable security deposit.
    pub security_deposit: Option<Money>,

    /// Tax rate applied to the discounted subtotal.
    pub tax_rate: Option<Percent>,

    /// Indicator whether `Booking`s of the `Property` are confirmed once
    /// paid, without a host approval.
    pub instant_book: bool,
}

impl TryFrom<PropertyInput> for domain::Property {
    type Error = Error;

    fn try_from(input: PropertyInput) -> Result<Self, Self::Error> {
        let PropertyInput {
            id,
            host_id,
            max_guests,
            min_nights,
            max_nights,
            nightly_rate,
            cleaning_fee,
            service_fee,
            security_deposit,
            tax_rate,
            instant_book,
        } = input;

        let count = |n: i32| {
            u16::try_from(n).map_err(|_| Error::from(InputError::OutOfRange))
        };
        Ok(Self {
            id: id.into(),
            host_id: host_id.into(),
            max_guests: count(max_guests)?,
            min_nights: count(min_nights)?,
            max_nights: count(max_nights)?,
            nightly_rate,
            fees: domain::booking::price::FeeSchedule {
                cleaning_fee,
                service_fee,
                security_deposit,
                tax_rate,
            },
            instant_book,
        })
    }
}

define_error! {
    enum InputError {
        #[code = "INVALID_REQUEST"]
        #[status = BAD_REQUEST]
        #[message = "Guests and nights counts must be within `0..=65535`"]
        OutOfRange,
    }
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};
    use service::domain;

    use super::PropertyInput;

    fn input() -> PropertyInput {
        PropertyInput {
            id: domain::property::Id::new().into(),
            host_id: domain::user::Id::new().into(),
            max_guests: 4,
            min_nights: 2,
            max_nights: 14,
            nightly_rate: Money::new(100.into(), Currency::Usd),
            cleaning_fee: Some(Money::new(50.into(), Currency::Usd)),
            service_fee: None,
            security_deposit: None,
            tax_rate: None,
            instant_book: true,
        }
    }

    #[test]
    fn converts_into_snapshot() {
        let p = domain::Property::try_from(input()).unwrap();

        assert_eq!(p.max_guests, 4);
        assert_eq!((p.min_nights, p.max_nights), (2, 14));
        assert_eq!(
            p.fees.cleaning_fee,
            Some(Money::new(50.into(), Currency::Usd)),
        );
    }

    #[test]
    fn rejects_out_of_range_counts() {
        for input in [
            PropertyInput {
                max_guests: -1,
                ..input()
            },
            PropertyInput {
                max_nights: 70_000,
                ..input()
            },
        ] {
            let err = domain::Property::try_from(input).unwrap_err();
            assert_eq!(err.code, "INVALID_REQUEST");
        }
    }
}
