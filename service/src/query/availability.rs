//! [`Query`] collection related to a [`Property`] availability.
//!
//! [`Property`]: crate::domain::Property

use common::{
    date,
    operations::{By, Select},
};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Selector},
        property,
    },
    infra::{database, Database},
    Query, Service,
};

/// Queries an [`availability::Calendar`] of a [`Property`], reading it
/// through the [`Cache`].
///
/// [`Cache`]: crate::Cache
/// [`Property`]: crate::domain::Property
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Calendar {
    /// ID of the [`Property`] to query the calendar of.
    ///
    /// [`Property`]: crate::domain::Property
    pub property_id: property::Id,

    /// Dates to query.
    pub dates: date::Range,
}

impl<Db> Query<Calendar> for Service<Db>
where
    Db: Database<
        Select<By<availability::Calendar, Selector>>,
        Ok = availability::Calendar,
        Err = Traced<database::Error>,
    >,
{
    type Ok = availability::Calendar;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Calendar { property_id, dates }: Calendar,
    ) -> Result<Self::Ok, Self::Err> {
        let selector = Selector { property_id, dates };
        if let Some(c) = self.cache().calendar(&selector) {
            return Ok(c);
        }

        let generation = self.cache().generation(property_id);
        let calendar = self
            .database()
            .execute(Select(By::new(selector)))
            .await
            .map_err(tracerr::wrap!())?;
        self.cache().put_calendar(calendar.clone(), generation);
        Ok(calendar)
    }
}
