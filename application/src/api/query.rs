//! GraphQL [`Query`]s definitions.

use common::Date;
use juniper::graphql_object;
use service::{query, Query as _};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the `Property` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PROPERTY_NOT_EXISTS` - the `Property` with the specified ID does not
    ///                           exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "property",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn property(
        id: api::property::Id,
        ctx: &Context,
    ) -> Result<api::Property, Error> {
        ctx.service()
            .execute(query::property::ById(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| PropertyError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Booking` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "booking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        ctx.service()
            .execute(query::booking::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| BookingError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Booking` with the specified `BookingReference`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified
    ///                          `BookingReference` does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "bookingByReference",
            otel.name = Self::SPAN_NAME,
            reference = %reference,
        ),
    )]
    pub async fn booking_by_reference(
        reference: api::booking::Reference,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        ctx.service()
            .execute(query::booking::ByReference::by(reference.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| BookingError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns all the `Booking`s of the specified `Property`, ordered by
    /// their check-in dates.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "bookings",
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
        ),
    )]
    pub async fn bookings(
        property_id: api::property::Id,
        ctx: &Context,
    ) -> Result<Vec<api::Booking>, Error> {
        ctx.service()
            .execute(query::bookings::OfProperty::by(property_id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|bs| bs.into_iter().map(Into::into).collect())
    }

    /// Returns the `Payment` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PAYMENT_NOT_EXISTS` - the `Payment` with the specified ID does not
    ///                          exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "payment",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn payment(
        id: api::payment::Id,
        ctx: &Context,
    ) -> Result<api::Payment, Error> {
        ctx.service()
            .execute(query::payment::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| PaymentError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the availability `Calendar` of the specified `Property` for the
    /// `[from; to)` dates.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_REQUEST` - `to` date doesn't come after the `from` date;
    /// - `PROPERTY_NOT_EXISTS` - the `Property` with the specified ID does not
    ///                           exist.
    #[tracing::instrument(
        skip_all,
        fields(
            from = %from,
            gql.name = "calendar",
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
            to = %to,
        ),
    )]
    pub async fn calendar(
        property_id: api::property::Id,
        from: Date,
        to: Date,
        ctx: &Context,
    ) -> Result<api::Calendar, Error> {
        let dates = api::dates(from, to).map_err(ctx.error())?;
        _ = Self::property(property_id, ctx).await?;

        ctx.service()
            .execute(query::availability::Calendar {
                property_id: property_id.into(),
                dates,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Calculates the `OccupancyReport` of the specified `Property` for the
    /// `[from; to)` dates.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_REQUEST` - `to` date doesn't come after the `from` date;
    /// - `PROPERTY_NOT_EXISTS` - the `Property` with the specified ID does not
    ///                           exist.
    #[tracing::instrument(
        skip_all,
        fields(
            from = %from,
            gql.name = "occupancyReport",
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
            to = %to,
        ),
    )]
    pub async fn occupancy_report(
        property_id: api::property::Id,
        from: Date,
        to: Date,
        ctx: &Context,
    ) -> Result<api::report::Occupancy, Error> {
        let dates = api::dates(from, to).map_err(ctx.error())?;
        _ = Self::property(property_id, ctx).await?;

        ctx.service()
            .execute(query::report::Occupancy {
                property_id: property_id.into(),
                dates,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

define_error! {
    enum BookingError {
        #[code = "BOOKING_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Booking` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum PaymentError {
        #[code = "PAYMENT_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Payment` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum PropertyError {
        #[code = "PROPERTY_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Property` with the specified ID does not exist"]
        NotExists,
    }
}
