//! Services is a core layer for the app business logic like
//! validation, authorization, etc.

pub mod evaluator;
pub mod promo_codes;
pub mod redemptions;
pub mod reports;
pub mod types;

pub use self::evaluator::*;
pub use self::promo_codes::*;
pub use self::redemptions::*;
pub use self::reports::*;
pub use self::types::*;

use std::sync::Arc;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use failure::Fail;
use futures_cpupool::CpuPool;
use r2d2::{ManageConnection, Pool, PooledConnection};
use validator::Validate;

use config::Config;
use errors::Error;
use models::Caller;
use repos::repo_factory::ReposFactory;

/// Static context for all app
pub struct StaticContext<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    pub db_pool: Pool<M>,
    pub cpu_pool: CpuPool,
    pub config: Arc<Config>,
    pub repo_factory: F,
}

impl<M, F> StaticContext<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    pub fn new(db_pool: Pool<M>, cpu_pool: CpuPool, config: Arc<Config>, repo_factory: F) -> Self {
        Self {
            db_pool,
            cpu_pool,
            config,
            repo_factory,
        }
    }
}

impl<M, F> Clone for StaticContext<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    fn clone(&self) -> Self {
        Self {
            db_pool: self.db_pool.clone(),
            cpu_pool: self.cpu_pool.clone(),
            config: self.config.clone(),
            repo_factory: self.repo_factory.clone(),
        }
    }
}

/// Dynamic context for each request, `caller` is `None` for anonymous requests
#[derive(Clone, Debug, Default)]
pub struct DynamicContext {
    pub caller: Option<Caller>,
}

impl DynamicContext {
    pub fn new(caller: Option<Caller>) -> Self {
        Self { caller }
    }
}

pub struct Service<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    pub static_context: StaticContext<M, F>,
    pub dynamic_context: DynamicContext,
}

impl<M, F> Service<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    pub fn new(static_context: StaticContext<M, F>, dynamic_context: DynamicContext) -> Self {
        Self {
            static_context,
            dynamic_context,
        }
    }

    /// Runs `f` on the cpu pool with a connection taken from the db pool
    pub fn spawn_on_pool<R, Func>(&self, f: Func) -> ServiceFuture<R>
    where
        Func: FnOnce(PooledConnection<M>) -> Result<R, FailureError> + Send + 'static,
        R: Send + 'static,
    {
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();

        Box::new(cpu_pool.spawn_fn(move || {
            db_pool
                .get()
                .map_err(|e| e.context(Error::Connection).into())
                .and_then(f)
        }))
    }
}

/// Runs `validator` checks of a payload, failing with `Error::Validate`
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), FailureError> {
    payload
        .validate()
        .map_err(|e| format_err!("Validation of payload failed").context(Error::Validate(e)).into())
}
