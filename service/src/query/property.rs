//! [`Query`] collection related to a single [`Property`].

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{property, Property},
    infra::{database, Database},
    Query, Service,
};

/// Queries a [`Property`] by its [`property::Id`], reading it through the
/// [`Cache`].
///
/// [`Cache`]: crate::Cache
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ById(pub property::Id);

impl<Db> Query<ById> for Service<Db>
where
    Db: Database<
        Select<By<Option<Property>, property::Id>>,
        Ok = Option<Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        ById(id): ById,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(p) = self.cache().property(id) {
            return Ok(Some(p));
        }

        let generation = self.cache().generation(id);
        let property = self
            .database()
            .execute(Select(By::new(id)))
            .await
            .map_err(tracerr::wrap!())?;
        if let Some(p) = &property {
            self.cache().put_property(p.clone(), generation);
        }
        Ok(property)
    }
}
