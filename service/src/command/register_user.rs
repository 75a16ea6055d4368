//! [`Command`] for registering a [`User`] known to the identity
//! collaborator.

use common::operations::Insert;
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{database, Database},
    ErrorKind, Service,
};

use super::Command;

/// [`Command`] for registering a [`User`] known to the identity
/// collaborator.
///
/// Registering an already known [`User`] is a no-op.
#[derive(Clone, Copy, Debug)]
pub struct RegisterUser {
    /// ID of the [`User`] to register.
    pub id: user::Id,
}

impl<Db> Command<RegisterUser> for Service<Db>
where
    Db: Database<Insert<User>, Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RegisterUser) -> Result<Self::Ok, Self::Err> {
        let user = User { id: cmd.id };
        self.database()
            .execute(Insert(user))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))
            .map(drop)?;
        Ok(user)
    }
}

/// Error of [`RegisterUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

impl ExecutionError {
    /// Returns [`ErrorKind`] of this [`ExecutionError`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => ErrorKind::of_database(e),
        }
    }
}
