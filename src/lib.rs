//! Promos is a service responsible for promo codes: administration of codes,
//! discount previews and redemptions against orders.
//! The layered structure of the app is
//!
//! `Binary -> Service -> Repo`
//!
//! Each layer can throw Error with context or cover occurred error with
//! Error in the context. When error is not covered with Error it is
//! treated as an internal error with code 500.

#![allow(proc_macro_derive_resolution_fallback)]
#![recursion_limit = "128"]
extern crate chrono;
extern crate config as config_crate;
extern crate csv;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate failure;
extern crate futures;
extern crate futures_cpupool;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate r2d2;
extern crate regex;
extern crate sentry;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate tokio_core;
extern crate tracing_subscriber;
extern crate uuid;
extern crate validator;
#[macro_use]
extern crate validator_derive;

#[macro_use]
pub mod macros;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod repos;
pub mod schema;
pub mod sentry_integration;
pub mod services;

use std::sync::Arc;

use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use failure::{Error as FailureError, Fail};
use futures_cpupool::CpuPool;

use config::Config;
use errors::Error;
use models::Caller;
use repos::repo_factory::ReposFactoryImpl;
use services::{DynamicContext, Service, StaticContext};

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Prepares database pool sized after the cpu pool
pub fn create_db_pool(config: &Config) -> Result<DbPool, FailureError> {
    let db_manager = ConnectionManager::<PgConnection>::new(config.server.database.clone());
    r2d2::Pool::builder()
        .max_size(config.server.thread_count as u32)
        .build(db_manager)
        .map_err(|e| e.context(Error::Connection).into())
}

/// Builds the service on top of postgres for `caller`
pub fn create_service(config: Config, caller: Option<Caller>) -> Result<Service<ConnectionManager<PgConnection>, ReposFactoryImpl>, FailureError> {
    let db_pool = create_db_pool(&config)?;
    let cpu_pool = CpuPool::new(config.server.thread_count);

    info!("Service is ready, threads: {}", config.server.thread_count);
    let static_context = StaticContext::new(db_pool, cpu_pool, Arc::new(config), ReposFactoryImpl::default());
    Ok(Service::new(static_context, DynamicContext::new(caller)))
}
