//! Background environment driving the [`Service`] [`Task`]s.
//!
//! [`Service`]: crate::Service

use std::{
    convert,
    error::Error,
    future::{Future, IntoFuture},
    iter,
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Type-erased error of a [`Task`].
type BoxError = Box<dyn Error + 'static>;

/// Background environment driving the [`Service`] [`Task`]s.
///
/// Resolves once all the spawned [`Task`]s finish, or as soon as any of them
/// fails.
///
/// [`Service`]: crate::Service
#[derive(Debug, Default)]
pub struct Background {
    /// Local set the [`Task`]s are spawned onto.
    set: task::LocalSet,

    /// Spawned [`Task`]s.
    tasks: Vec<Spawned>,
}

/// [`Task`] spawned onto a [`Background`].
#[derive(Debug)]
struct Spawned {
    /// Name of the [`Task`] to report its outcome with.
    name: &'static str,

    /// Handle to await the [`Task`] outcome with.
    handle: task::JoinHandle<Result<(), BoxError>>,
}

impl Background {
    /// Spawns a new named [`Task`] inside this [`Background`] environment.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        let handle = self.set.spawn_local(async move {
            log::debug!(task = name, "background task started");
            future.await.map_err(|e| BoxError::from(Box::new(e)))
        });
        self.tasks.push(Spawned { name, handle });
    }

    /// Returns names of the [`Task`]s spawned inside this [`Background`].
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.iter().map(|t| t.name)
    }
}

impl IntoFuture for Background {
    type Output = Result<(), BoxError>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;

        let outcomes = tasks.into_iter().map(|Spawned { name, handle }| {
            handle
                .map(move |joined| {
                    let res = joined
                        .map_err(|e| BoxError::from(Box::new(e)))
                        .and_then(convert::identity);
                    match &res {
                        Ok(()) => {
                            log::info!(task = name, "background task done");
                        }
                        Err(e) => {
                            log::error!(
                                task = name,
                                "background task failed: {e}",
                            );
                        }
                    }
                    res
                })
                .boxed_local()
        });

        let set = set.map(Ok).boxed_local();
        future::try_join_all(iter::once(set).chain(outcomes))
            .map_ok(drop)
            .boxed_local()
    }
}

#[cfg(test)]
mod spec {
    use std::{convert::Infallible, io};

    use super::Background;

    #[tokio::test]
    async fn resolves_once_tasks_finish() {
        let mut bg = Background::default();
        bg.spawn("first", async { Ok::<_, Infallible>(()) });
        bg.spawn("second", async { Ok::<_, Infallible>(()) });

        assert_eq!(bg.names().collect::<Vec<_>>(), ["first", "second"]);
        assert!(bg.await.is_ok());
    }

    #[tokio::test]
    async fn fails_with_failed_task() {
        let mut bg = Background::default();
        bg.spawn("ok", async { Ok::<_, io::Error>(()) });
        bg.spawn("broken", async {
            Err(io::Error::other("boom"))
        });

        let err = bg.await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
    }
}
