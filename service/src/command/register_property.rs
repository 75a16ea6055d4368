//! [`Command`] for registering a [`Property`] constraints snapshot.

use common::operations::Insert;
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::Property,
    infra::{database, Database},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for registering (or replacing) a [`Property`] constraints
/// snapshot supplied by the property management collaborator.
#[derive(Clone, Debug)]
pub struct RegisterProperty {
    /// [`Property`] snapshot to register.
    pub property: Property,
}

impl<Db> Command<RegisterProperty> for Service<Db>
where
    Db: Database<Insert<Property>, Err = Traced<database::Error>>,
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RegisterProperty,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RegisterProperty { property } = cmd;

        if property.max_guests == 0 {
            return Err(tracerr::new!(E::Invalid("`max_guests` is zero")));
        }
        if property.min_nights == 0 || property.min_nights > property.max_nights
        {
            return Err(tracerr::new!(E::Invalid(
                "`min_nights` is not in `[1; max_nights]` range",
            )));
        }
        if !property.nightly_rate.is_positive() {
            return Err(tracerr::new!(E::Invalid(
                "`nightly_rate` is not positive",
            )));
        }
        let fees = &property.fees;
        for fee in [fees.cleaning_fee, fees.service_fee, fees.security_deposit]
            .into_iter()
            .flatten()
        {
            if fee.currency != property.nightly_rate.currency {
                return Err(tracerr::new!(E::Invalid(
                    "fees currency differs from `nightly_rate` one",
                )));
            }
            if fee.is_negative() {
                return Err(tracerr::new!(E::Invalid("fee is negative")));
            }
        }

        self.database()
            .execute(Insert(property.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache().invalidate_property(property.id);

        Ok(property)
    }
}

/// Error of [`RegisterProperty`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Property`] snapshot is inconsistent.
    #[display("`Property` is invalid: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
            Self::Invalid(_) => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};

    use crate::{testing::Fixture, Command as _};

    use super::{ExecutionError, RegisterProperty};

    #[tokio::test]
    async fn rejects_inconsistent_snapshot() {
        let f = Fixture::new().await;
        let mut property = f.property.clone();
        property.min_nights = 10;
        property.max_nights = 5;

        let err = f
            .service
            .execute(RegisterProperty { property })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Invalid(_)));

        let mut property = f.property.clone();
        property.fees.cleaning_fee =
            Some(Money::new(10.into(), Currency::Eur));
        let err = f
            .service
            .execute(RegisterProperty { property })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Invalid(_)));
    }
}
