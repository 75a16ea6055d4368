//! [`Booking`]-related definitions.

use std::future;

use common::{Date, DateTime, Money};
use derive_more::{Display, From, Into};
use futures::TryFutureExt as _;
use juniper::{
    graphql_object, GraphQLEnum, GraphQLObject, GraphQLScalar, InputValue,
    ScalarValue, Value,
};
use service::{domain, query, Query as _};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{api, AsError, Context, Error};

/// A reservation of a `Property`.
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    id: Id,

    /// Underlying [`domain::Booking`].
    booking: OnceCell<domain::Booking>,
}

impl From<domain::Booking> for Booking {
    fn from(booking: domain::Booking) -> Self {
        Self {
            id: booking.id.into(),
            booking: OnceCell::new_with(Some(booking)),
        }
    }
}

impl Booking {
    /// Creates a new [`Booking`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Booking`] with the provided ID exists,
    /// otherwise accessing this [`Booking`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            booking: OnceCell::new(),
        }
    }

    /// Returns the underlying [`domain::Booking`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Booking`] doesn't exist.
    async fn booking(&self, ctx: &Context) -> Result<&domain::Booking, Error> {
        let id = self.id.into();
        self.booking
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::booking::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|b| {
                        future::ready(b.ok_or_else(|| {
                            api::query::BookingError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A reservation of a `Property`.
#[graphql_object(context = Context)]
impl Booking {
    /// Unique identifier of this `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Human-readable unique reference of this `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.reference",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn reference(&self, ctx: &Context) -> Result<Reference, Error> {
        Ok(self.booking(ctx).await?.reference.clone().into())
    }

    /// Booked `Property`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PROPERTY_NOT_EXISTS` - the `Property` is no longer known.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.property",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn property(
        &self,
        ctx: &Context,
    ) -> Result<api::Property, Error> {
        let id = self.booking(ctx).await?.property_id;
        ctx.service()
            .execute(query::property::ById(id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| api::query::PropertyError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// `User` staying as a guest.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.guestId",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn guest_id(
        &self,
        ctx: &Context,
    ) -> Result<api::user::Id, Error> {
        Ok(self.booking(ctx).await?.guest_id.into())
    }

    /// Date of the arrival.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.checkIn",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn check_in(&self, ctx: &Context) -> Result<Date, Error> {
        Ok(self.booking(ctx).await?.stay.start())
    }

    /// Date of the departure.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.checkOut",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn check_out(&self, ctx: &Context) -> Result<Date, Error> {
        Ok(self.booking(ctx).await?.stay.end())
    }

    /// Number of nights of the stay.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.nights",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn nights(&self, ctx: &Context) -> Result<i32, Error> {
        let nights = self.booking(ctx).await?.nights();
        Ok(i32::try_from(nights).unwrap_or(i32::MAX))
    }

    /// Number of guests staying.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.guests",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn guests(&self, ctx: &Context) -> Result<i32, Error> {
        Ok(self.booking(ctx).await?.guests.into())
    }

    /// Price of this `Booking` fixed at the moment of reservation.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.price",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn price(&self, ctx: &Context) -> Result<Price, Error> {
        Ok(self.booking(ctx).await?.price.into())
    }

    /// Current status of this `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.status",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn status(&self, ctx: &Context) -> Result<Status, Error> {
        Ok(self.booking(ctx).await?.status.into())
    }

    /// Status of the latest `Payment` of this `Booking`, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.paymentStatus",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn payment_status(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::payment::Status>, Error> {
        Ok(self.booking(ctx).await?.payment_status.map(Into::into))
    }

    /// Latest `Payment` of this `Booking`, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.payment",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn payment(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::Payment>, Error> {
        ctx.service()
            .execute(query::payment::OfBooking::by(self.id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|p| p.map(Into::into))
    }

    /// Details of this `Booking` cancellation, if it's cancelled.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.cancellation",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn cancellation(
        &self,
        ctx: &Context,
    ) -> Result<Option<Cancellation>, Error> {
        Ok(self.booking(ctx).await?.cancellation.clone().map(Into::into))
    }

    /// `DateTime` when this `Booking` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.booking(ctx).await?.created_at.coerce())
    }

    /// `DateTime` when this `Booking` was last modified.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.updatedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn updated_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.booking(ctx).await?.updated_at.coerce())
    }
}

/// Unique identifier of a `Booking`.
#[derive(Clone, Copy, Debug, Display, Into, From, GraphQLScalar)]
#[from(domain::booking::Id)]
#[into(domain::booking::Id)]
#[graphql(name = "BookingId", transparent)]
pub struct Id(Uuid);

/// Human-readable unique reference of a `Booking`, like `BK-3F9A1C27B04E`.
#[derive(Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "BookingReference",
    to_output_with = Self::to_output,
    from_input_with = Self::from_input,
    parse_token(String),
)]
pub struct Reference(domain::booking::Reference);

impl Reference {
    /// Converts this [`Reference`] into a scalar [`Value`].
    fn to_output<S: ScalarValue>(&self) -> Value<S> {
        Value::scalar(self.0.to_string())
    }

    /// Parses a [`Reference`] out of the provided [`InputValue`].
    fn from_input<S: ScalarValue>(
        input: &InputValue<S>,
    ) -> Result<Self, String> {
        let s = input.as_string_value().ok_or_else(|| {
            format!(
                "Cannot parse `BookingReference` input scalar from \
                 non-string value: {input}",
            )
        })?;
        s.parse().map(Self).map_err(|e| {
            format!("Cannot parse `BookingReference` input scalar: {e}")
        })
    }
}

/// Price breakdown of a `Booking`.
#[derive(Clone, Copy, Debug, GraphQLObject)]
#[graphql(name = "BookingPrice")]
pub struct Price {
    /// Nightly rate multiplied by the number of nights.
    pub base: Money,

    /// One-time cleaning fee.
    pub cleaning_fee: Option<Money>,

    /// One-time service fee.
    pub service_fee: Option<Money>,

    /// Refundable security deposit, not included into the `total`.
    pub security_deposit: Option<Money>,

    /// Tax on the discounted subtotal.
    pub tax: Option<Money>,

    /// Flat discount.
    pub discount: Option<Money>,

    /// Total price to pay.
    pub total: Money,
}

impl From<domain::booking::Breakdown> for Price {
    fn from(b: domain::booking::Breakdown) -> Self {
        Self {
            base: b.base(),
            cleaning_fee: b.cleaning_fee(),
            service_fee: b.service_fee(),
            security_deposit: b.security_deposit(),
            tax: b.tax(),
            discount: b.discount(),
            total: b.total(),
        }
    }
}

/// Details of a `Booking` cancellation.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(name = "BookingCancellation")]
pub struct Cancellation {
    /// Free-form reason of the cancellation.
    pub reason: String,

    /// Party who cancelled the `Booking`.
    pub actor: Actor,

    /// `DateTime` when the `Booking` was cancelled.
    pub at: DateTime,
}

impl From<domain::booking::Cancellation> for Cancellation {
    fn from(c: domain::booking::Cancellation) -> Self {
        Self {
            reason: c.reason,
            actor: c.actor.into(),
            at: c.at.coerce(),
        }
    }
}

/// Status of a `Booking` in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "BookingStatus")]
pub enum Status {
    /// Dates are reserved, awaiting confirmation.
    Pending,

    /// Booking is confirmed.
    Confirmed,

    /// Guest has arrived.
    CheckedIn,

    /// Guest has left.
    CheckedOut,

    /// Stay is settled.
    Completed,

    /// Booking is cancelled.
    Cancelled,

    /// Guest never arrived.
    NoShow,
}

impl From<domain::booking::Status> for Status {
    fn from(status: domain::booking::Status) -> Self {
        use domain::booking::Status as S;
        match status {
            S::Pending => Self::Pending,
            S::Confirmed => Self::Confirmed,
            S::CheckedIn => Self::CheckedIn,
            S::CheckedOut => Self::CheckedOut,
            S::Completed => Self::Completed,
            S::Cancelled => Self::Cancelled,
            S::NoShow => Self::NoShow,
        }
    }
}

/// Party acting upon a `Booking`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "BookingActor")]
pub enum Actor {
    /// Guest of the `Booking`.
    Guest,

    /// Host of the booked `Property`.
    Host,

    /// System itself.
    System,
}

impl From<domain::booking::Actor> for Actor {
    fn from(actor: domain::booking::Actor) -> Self {
        use domain::booking::Actor as A;
        match actor {
            A::Guest => Self::Guest,
            A::Host => Self::Host,
            A::System => Self::System,
        }
    }
}

impl From<Actor> for domain::booking::Actor {
    fn from(actor: Actor) -> Self {
        match actor {
            Actor::Guest => Self::Guest,
            Actor::Host => Self::Host,
            Actor::System => Self::System,
        }
    }
}
