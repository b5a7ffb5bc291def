//! Reports Services, stats and CSV export of promo codes for admins

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::ReposFactory;
use services::Service;

const TOP_PROMO_CODES: i64 = 5;

pub const EXPORT_HEADER: [&str; 12] = [
    "code",
    "description",
    "discount_type",
    "discount_value",
    "min_order_amount",
    "max_discount",
    "start_date",
    "end_date",
    "usage_limit",
    "used_count",
    "is_active",
    "created_at",
];

pub trait ReportsService {
    /// Totals by status, usage and granted discounts
    fn promo_codes_stats(&self) -> ServiceFuture<PromoCodesStats>;
    /// All promo codes as CSV
    fn export_promo_codes(&self) -> ServiceFuture<String>;
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

pub fn write_csv(promo_codes: &[PromoCode]) -> Result<String, FailureError> {
    let mut writer = WriterBuilder::new().from_writer(vec![]);
    writer.write_record(&EXPORT_HEADER)?;

    for promo_code in promo_codes {
        writer.write_record(vec![
            promo_code.code.clone(),
            promo_code.description.clone(),
            promo_code.discount_type.to_string(),
            promo_code.discount_value.to_string(),
            promo_code.min_order_amount.to_string(),
            optional(promo_code.max_discount),
            rfc3339(promo_code.start_date),
            rfc3339(promo_code.end_date),
            optional(promo_code.usage_limit),
            promo_code.used_count.to_string(),
            promo_code.is_active.to_string(),
            rfc3339(promo_code.created_at),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| format_err!("Could not flush csv: {}", e))?;
    String::from_utf8(bytes).map_err(From::from)
}

impl<M, F> ReportsService for Service<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    fn promo_codes_stats(&self) -> ServiceFuture<PromoCodesStats> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            let orders_repo = repo_factory.create_orders_repo(&*conn, caller);
            let now = SystemTime::now();

            let stats = || -> Result<PromoCodesStats, FailureError> {
                let count = |status: Option<PromoCodeStatus>| {
                    let terms = PromoCodesSearchTerms {
                        status,
                        ..Default::default()
                    };
                    promo_codes_repo.count(&terms, now)
                };

                Ok(PromoCodesStats {
                    total: count(None)?,
                    active: count(Some(PromoCodeStatus::Active))?,
                    expired: count(Some(PromoCodeStatus::Expired))?,
                    upcoming: count(Some(PromoCodeStatus::Upcoming))?,
                    total_usage: promo_codes_repo.total_usage()?,
                    total_discount: orders_repo.total_discount()?,
                    top_promo_codes: promo_codes_repo
                        .most_used(TOP_PROMO_CODES)?
                        .iter()
                        .map(TopPromoCode::from)
                        .collect(),
                })
            };

            stats().map_err(|e| e.context("Service Reports, stats endpoint error occurred.").into())
        })
    }

    fn export_promo_codes(&self) -> ServiceFuture<String> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        if !caller.map(|caller| caller.is_admin()).unwrap_or(false) {
            return Box::new(future::err(
                format_err!("Denied request to export promo codes").context(Error::Forbidden).into(),
            ));
        }

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);

            promo_codes_repo
                .list()
                .and_then(|promo_codes| write_csv(&promo_codes))
                .map_err(|e| e.context("Service Reports, export endpoint error occurred.").into())
        })
    }
}
