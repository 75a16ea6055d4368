//! GraphQL [`Mutation`]s definitions.

use common::{Date, Money};
use juniper::graphql_object;
use service::{
    command::{self, transition_booking::Transition},
    Command as _,
};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";

    /// Moves the `Booking` with the provided ID along its lifecycle.
    async fn transition(
        id: api::booking::Id,
        transition: Transition,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        ctx.service()
            .execute(command::TransitionBooking {
                booking_id: id.into(),
                transition,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Registers the `User` known to the identity provider, so it can book
    /// `Property`s.
    ///
    /// Registering an already known `User` is a no-op.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "registerUser",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn register_user(
        id: api::user::Id,
        ctx: &Context,
    ) -> Result<api::user::Id, Error> {
        ctx.service()
            .execute(command::RegisterUser { id: id.into() })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|u| u.id.into())
    }

    /// Registers the provided `Property` snapshot, replacing the previous one
    /// with the same ID, if any.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_REQUEST` - the provided snapshot is inconsistent.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "registerProperty",
            id = %input.id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn register_property(
        input: api::property::PropertyInput,
        ctx: &Context,
    ) -> Result<api::Property, Error> {
        let property = input.try_into().map_err(ctx.error())?;

        ctx.service()
            .execute(command::RegisterProperty { property })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Reserves the `Property` for the `[checkIn; checkOut)` nights.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PROPERTY_NOT_EXISTS` - the `Property` with the specified ID does not
    ///                           exist;
    /// - `GUEST_NOT_EXISTS` - the guest `User` is not registered;
    /// - `INVALID_STAY` - the stay violates the `Property` constraints;
    /// - `INVALID_PRICE` - the price of the stay cannot be calculated;
    /// - `DATES_UNAVAILABLE` - some of the dates are not available.
    #[tracing::instrument(
        skip_all,
        fields(
            check_in = %check_in,
            check_out = %check_out,
            gql.name = "createBooking",
            guest_id = %guest_id,
            guests = guests,
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
        ),
    )]
    pub async fn create_booking(
        property_id: api::property::Id,
        guest_id: api::user::Id,
        check_in: Date,
        check_out: Date,
        guests: i32,
        discount: Option<Money>,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        let guests = u16::try_from(guests)
            .map_err(|_| InputError::GuestsOutOfRange.into())
            .map_err(ctx.error())?;

        ctx.service()
            .execute(command::CreateBooking {
                property_id: property_id.into(),
                guest_id: guest_id.into(),
                check_in,
                check_out,
                guests,
                discount,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Confirms the `PENDING` `Booking`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `ILLEGAL_TRANSITION` - the `Booking` cannot be confirmed.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "confirmBooking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn confirm_booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        Self::transition(id, Transition::Confirm, ctx).await
    }

    /// Records the guest arrival for the `CONFIRMED` `Booking`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `ILLEGAL_TRANSITION` - the `Booking` cannot be checked in.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "checkInBooking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn check_in_booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        Self::transition(id, Transition::CheckIn, ctx).await
    }

    /// Records the guest departure for the `CHECKED_IN` `Booking`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `ILLEGAL_TRANSITION` - the `Booking` cannot be checked out.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "checkOutBooking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn check_out_booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        Self::transition(id, Transition::CheckOut, ctx).await
    }

    /// Settles the `CHECKED_OUT` `Booking`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `ILLEGAL_TRANSITION` - the `Booking` cannot be completed.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "completeBooking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn complete_booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        Self::transition(id, Transition::Complete, ctx).await
    }

    /// Records the guest never arrived, releasing the `Booking` dates.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `ILLEGAL_TRANSITION` - the `Booking` cannot be marked as a no-show.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "markBookingNoShow",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn mark_booking_no_show(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        Self::transition(id, Transition::NoShow, ctx).await
    }

    /// Cancels the `Booking`, releasing its dates.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `ILLEGAL_TRANSITION` - the `Booking` cannot be cancelled;
    /// - `INVALID_REQUEST` - the `reason` is empty.
    #[tracing::instrument(
        skip_all,
        fields(
            actor = ?actor,
            gql.name = "cancelBooking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn cancel_booking(
        id: api::booking::Id,
        reason: String,
        actor: api::booking::Actor,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        let transition = Transition::Cancel {
            reason,
            actor: actor.into(),
        };
        Self::transition(id, transition, ctx).await
    }

    /// Blocks the `[from; to)` dates of the `Property` with the provided
    /// `status`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_REQUEST` - `to` date doesn't come after the `from` date, or
    ///                       the `status` is not a block one;
    /// - `PROPERTY_NOT_EXISTS` - the `Property` with the specified ID does not
    ///                           exist;
    /// - `DATES_UNAVAILABLE` - some of the dates are held by a `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            from = %from,
            gql.name = "blockDates",
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
            status = ?status,
            to = %to,
        ),
    )]
    pub async fn block_dates(
        property_id: api::property::Id,
        from: Date,
        to: Date,
        status: api::availability::Status,
        ctx: &Context,
    ) -> Result<api::Calendar, Error> {
        let dates = api::dates(from, to).map_err(ctx.error())?;

        ctx.service()
            .execute(command::BlockDates {
                property_id: property_id.into(),
                dates,
                status: status.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Releases the host blocks of the `[from; to)` dates of the `Property`.
    ///
    /// Dates held by `Booking`s are left intact.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_REQUEST` - `to` date doesn't come after the `from` date.
    #[tracing::instrument(
        skip_all,
        fields(
            from = %from,
            gql.name = "unblockDates",
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
            to = %to,
        ),
    )]
    pub async fn unblock_dates(
        property_id: api::property::Id,
        from: Date,
        to: Date,
        ctx: &Context,
    ) -> Result<api::Calendar, Error> {
        let dates = api::dates(from, to).map_err(ctx.error())?;

        ctx.service()
            .execute(command::UnblockDates {
                property_id: property_id.into(),
                dates,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Starts a new `Payment` of the `Booking` for the order created by the
    /// payment provider.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `BOOKING_NOT_PAYABLE` - the `Booking` is cancelled or finished;
    /// - `PAYMENT_IN_PROGRESS` - another `Payment` of the `Booking` is in
    ///                           progress or completed;
    /// - `RETRIES_EXHAUSTED` - the `Booking` has failed too many `Payment`s.
    #[tracing::instrument(
        skip_all,
        fields(
            booking_id = %booking_id,
            gql.name = "initiatePayment",
            order_id = %order_id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn initiate_payment(
        booking_id: api::booking::Id,
        order_id: api::payment::OrderId,
        ctx: &Context,
    ) -> Result<api::Payment, Error> {
        ctx.service()
            .execute(command::InitiatePayment {
                booking_id: booking_id.into(),
                order_id: order_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

define_error! {
    enum InputError {
        #[code = "INVALID_REQUEST"]
        #[status = BAD_REQUEST]
        #[message = "Number of guests must be within `0..=65535`"]
        GuestsOutOfRange,
    }
}

define_error! {
    enum ConflictError {
        #[code = "DATES_UNAVAILABLE"]
        #[status = CONFLICT]
        #[message = "Some of the requested dates are not available"]
        DatesUnavailable,
    }
}

impl AsError for command::register_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::register_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_REQUEST"]
                #[status = BAD_REQUEST]
                #[message = "`Property` is invalid"]
                Invalid,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Invalid(reason) => {
                Some(crate::Error::from(Error::Invalid).explained(reason))
            }
        }
    }
}

impl AsError for command::create_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "GUEST_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "Guest `User` with the specified ID is not \
                             registered"]
                GuestNotExists,

                #[code = "INVALID_STAY"]
                #[status = BAD_REQUEST]
                #[message = "Stay violates the `Property` constraints"]
                InvalidStay,

                #[code = "INVALID_PRICE"]
                #[status = BAD_REQUEST]
                #[message = "Price of the stay cannot be calculated"]
                InvalidPrice,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::PropertyNotExists(_) => {
                Some(api::query::PropertyError::NotExists.into())
            }
            Self::GuestNotExists(_) => Some(Error::GuestNotExists.into()),
            Self::Invalid(e) => {
                Some(crate::Error::from(Error::InvalidStay).explained(e))
            }
            Self::Pricing(e) => {
                Some(crate::Error::from(Error::InvalidPrice).explained(e))
            }
            Self::DatesUnavailable(_) => {
                Some(ConflictError::DatesUnavailable.into())
            }
        }
    }
}

impl AsError for command::transition_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "ILLEGAL_TRANSITION"]
                #[status = CONFLICT]
                #[message = "`Booking` cannot be moved to the requested \
                             status"]
                IllegalTransition,

                #[code = "INVALID_REQUEST"]
                #[status = BAD_REQUEST]
                #[message = "Cancellation reason cannot be empty"]
                EmptyCancellationReason,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::BookingNotExists(_) => {
                Some(api::query::BookingError::NotExists.into())
            }
            Self::IllegalTransition(e) => {
                Some(crate::Error::from(Error::IllegalTransition).explained(e))
            }
            Self::EmptyCancellationReason => {
                Some(Error::EmptyCancellationReason.into())
            }
        }
    }
}

impl AsError for command::block_dates::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_REQUEST"]
                #[status = BAD_REQUEST]
                #[message = "Dates can be blocked only as `BLOCKED`, \
                             `MAINTENANCE` or `UNAVAILABLE`"]
                NotBlockStatus,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::PropertyNotExists(_) => {
                Some(api::query::PropertyError::NotExists.into())
            }
            Self::NotBlockStatus(_) => Some(Error::NotBlockStatus.into()),
            Self::DatesUnavailable(_) => {
                Some(ConflictError::DatesUnavailable.into())
            }
        }
    }
}

impl AsError for command::unblock_dates::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::initiate_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "BOOKING_NOT_PAYABLE"]
                #[status = CONFLICT]
                #[message = "`Booking` is cancelled or finished"]
                BookingNotPayable,

                #[code = "PAYMENT_IN_PROGRESS"]
                #[status = CONFLICT]
                #[message = "Another `Payment` of the `Booking` is in progress \
                             or completed"]
                PaymentInProgress,

                #[code = "RETRIES_EXHAUSTED"]
                #[status = CONFLICT]
                #[message = "`Booking` has failed too many `Payment`s"]
                RetriesExhausted,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::BookingNotExists(_) => {
                Some(api::query::BookingError::NotExists.into())
            }
            Self::BookingNotPayable(_) => {
                Some(Error::BookingNotPayable.into())
            }
            Self::PaymentInProgress(_) => {
                Some(Error::PaymentInProgress.into())
            }
            Self::RetriesExhausted(_) => Some(Error::RetriesExhausted.into()),
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{date, Date};
    use service::{
        command::{
            block_dates, create_booking, initiate_payment, register_property,
            transition_booking,
        },
        domain::{availability, booking, payment, property},
    };

    use crate::AsError as _;

    fn dates() -> date::Range {
        date::Range::new(
            Date::from_ymd(2030, 7, 1).unwrap(),
            Date::from_ymd(2030, 7, 4).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn reports_unavailable_dates_as_conflict() {
        let err = create_booking::ExecutionError::DatesUnavailable(dates())
            .into_error();

        assert_eq!(err.code, "DATES_UNAVAILABLE");
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);

        let err = block_dates::ExecutionError::DatesUnavailable(dates())
            .into_error();

        assert_eq!(err.code, "DATES_UNAVAILABLE");
    }

    #[test]
    fn explains_invalid_stay() {
        let err = create_booking::ExecutionError::Invalid(
            booking::stay::ValidationError::TooManyGuests(4),
        )
        .into_error();

        assert_eq!(err.code, "INVALID_STAY");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "property accommodates at most 4 guests");
    }

    #[test]
    fn explains_illegal_transition() {
        let err = transition_booking::ExecutionError::IllegalTransition(
            booking::StateError {
                from: booking::Status::Completed,
                to: booking::Status::Cancelled,
            },
        )
        .into_error();

        assert_eq!(err.code, "ILLEGAL_TRANSITION");
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);
        assert!(err.message.contains("cannot move `Booking`"));
    }

    #[test]
    fn reports_missing_entities_as_not_found() {
        for err in [
            create_booking::ExecutionError::PropertyNotExists(
                property::Id::new(),
            )
            .into_error(),
            block_dates::ExecutionError::PropertyNotExists(
                property::Id::new(),
            )
            .into_error(),
            transition_booking::ExecutionError::BookingNotExists(
                booking::Id::new(),
            )
            .into_error(),
            initiate_payment::ExecutionError::BookingNotExists(
                booking::Id::new(),
            )
            .into_error(),
        ] {
            assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn reports_payment_conflicts() {
        for (err, code) in [
            (
                initiate_payment::ExecutionError::PaymentInProgress(
                    payment::Id::new(),
                ),
                "PAYMENT_IN_PROGRESS",
            ),
            (
                initiate_payment::ExecutionError::RetriesExhausted(
                    booking::Id::new(),
                ),
                "RETRIES_EXHAUSTED",
            ),
            (
                initiate_payment::ExecutionError::BookingNotPayable(
                    booking::Status::Cancelled,
                ),
                "BOOKING_NOT_PAYABLE",
            ),
        ] {
            let err = err.into_error();

            assert_eq!(err.code, code);
            assert_eq!(err.status_code, http::StatusCode::CONFLICT);
        }
    }

    #[test]
    fn rejects_non_block_status() {
        let err = block_dates::ExecutionError::NotBlockStatus(
            availability::Status::Booked,
        )
        .into_error();

        assert_eq!(err.code, "INVALID_REQUEST");
    }

    #[test]
    fn explains_invalid_property() {
        let err = register_property::ExecutionError::Invalid(
            "minimum nights exceed maximum nights",
        )
        .into_error();

        assert_eq!(err.code, "INVALID_REQUEST");
        assert_eq!(err.message, "minimum nights exceed maximum nights");
    }
}
