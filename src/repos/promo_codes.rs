//! Promo codes repo, presents CRUD operations with promo codes and their usage records
use std::time::SystemTime;

use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::dsl::{exists, sql, sum};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Bool;
use diesel::Connection;
use failure::Error as FailureError;

use errors::{from_diesel, Error};
use models::*;
use repos::acl;
use repos::legacy_acl::CheckScope;
use repos::types::{RepoAcl, RepoResult};
use schema::promo_code_usages::dsl as PromoCodeUsages;
use schema::promo_codes::dsl as PromoCodes;

type PromoCodeFilter = Box<BoxableExpression<PromoCodes::promo_codes, Pg, SqlType = Bool> + Send>;

/// Promo codes repository, responsible for handling promo codes
pub struct PromoCodesRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
    pub acl: Box<RepoAcl<PromoCode>>,
    pub usages_acl: Box<RepoAcl<PromoCodeUsage>>,
}

pub trait PromoCodesRepo {
    /// Creates new promo code
    fn create(&self, payload: NewPromoCode, created_by: UserId) -> RepoResult<PromoCode>;

    /// Get promo code
    fn get(&self, id_arg: PromoCodeId) -> RepoResult<Option<PromoCode>>;

    /// Get promo code by code, case insensitive
    fn get_by_code(&self, code_arg: &str) -> RepoResult<Option<PromoCode>>;

    /// Checks whether a promo code other than `except` uses the code
    fn code_exists(&self, code_arg: &str, except: Option<PromoCodeId>) -> RepoResult<bool>;

    /// Page of promo codes matching search terms
    fn search(&self, terms: &PromoCodesSearchTerms, now: SystemTime) -> RepoResult<Vec<PromoCode>>;

    /// Number of promo codes matching search terms, pagination ignored
    fn count(&self, terms: &PromoCodesSearchTerms, now: SystemTime) -> RepoResult<i64>;

    /// List all promo codes, newest first
    fn list(&self) -> RepoResult<Vec<PromoCode>>;

    /// Promo codes usable at `now`
    fn list_valid(&self, now: SystemTime) -> RepoResult<Vec<PromoCode>>;

    /// Promo codes with listed ids
    fn find_many(&self, ids: &[PromoCodeId]) -> RepoResult<Vec<PromoCode>>;

    /// Most used promo codes
    fn most_used(&self, limit: i64) -> RepoResult<Vec<PromoCode>>;

    /// Sum of `used_count` over all promo codes
    fn total_usage(&self) -> RepoResult<i64>;

    /// Update promo code
    fn update(&self, id_arg: PromoCodeId, payload: UpdatePromoCode) -> RepoResult<PromoCode>;

    /// Sets `is_active` of listed promo codes, returns how many were updated
    fn set_active(&self, ids: &[PromoCodeId], is_active: bool) -> RepoResult<usize>;

    /// Delete promo code that was never used
    fn delete(&self, id_arg: PromoCodeId) -> RepoResult<PromoCode>;

    /// Delete listed promo codes that were never used, returns how many were deleted
    fn delete_many(&self, ids: &[PromoCodeId]) -> RepoResult<usize>;

    /// Usage records of a promo code
    fn usages(&self, id_arg: PromoCodeId) -> RepoResult<Vec<PromoCodeUsage>>;

    /// Usage record of a user
    fn find_usage(&self, id_arg: PromoCodeId, user_id_arg: UserId) -> RepoResult<Option<PromoCodeUsage>>;

    /// Counts a redemption of the promo code by the user: increments `used_count` and the
    /// usage record of the user, both only while the promo code still allows it.
    /// Fails with `Error::Conflict` when it does not.
    fn record_usage(&self, id_arg: PromoCodeId, user_id_arg: UserId, now: SystemTime) -> RepoResult<PromoCode>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> PromoCodesRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T, acl: Box<RepoAcl<PromoCode>>, usages_acl: Box<RepoAcl<PromoCodeUsage>>) -> Self {
        Self { db_conn, acl, usages_acl }
    }

    fn check_all(&self, action: Action, values: &[PromoCode]) -> RepoResult<()> {
        for value in values {
            acl::check(&*self.acl, Resource::PromoCodes, action, self, Some(value))?;
        }
        Ok(())
    }
}

fn search_filter(terms: &PromoCodesSearchTerms, now: SystemTime) -> PromoCodeFilter {
    let mut filter: PromoCodeFilter = Box::new(sql::<Bool>("TRUE"));

    if let Some(pattern) = terms.search_pattern() {
        filter = Box::new(filter.and(PromoCodes::code.ilike(pattern.clone()).or(PromoCodes::description.ilike(pattern))));
    }

    if let Some(status) = terms.status {
        filter = Box::new(filter.and(status_filter(status, now)));
    }

    if let Some(discount_type) = terms.discount_type {
        filter = Box::new(filter.and(PromoCodes::discount_type.eq(discount_type)));
    }

    filter
}

fn status_filter(status: PromoCodeStatus, now: SystemTime) -> PromoCodeFilter {
    match status {
        PromoCodeStatus::Active => Box::new(
            PromoCodes::is_active
                .eq(true)
                .and(PromoCodes::start_date.le(now))
                .and(PromoCodes::end_date.ge(now)),
        ),
        PromoCodeStatus::Inactive => Box::new(PromoCodes::is_active.eq(false)),
        PromoCodeStatus::Expired => Box::new(PromoCodes::end_date.lt(now)),
        PromoCodeStatus::Upcoming => Box::new(PromoCodes::start_date.gt(now)),
    }
}

fn conflict(message: String) -> FailureError {
    format_err!("{}", message).context(Error::Conflict).into()
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> PromoCodesRepo for PromoCodesRepoImpl<'a, T> {
    /// Creates new promo code
    fn create(&self, payload: NewPromoCode, created_by: UserId) -> RepoResult<PromoCode> {
        debug!("Create new promo code {:?}.", payload);
        let row = DbNewPromoCode::new(payload, created_by);

        let query = diesel::insert_into(PromoCodes::promo_codes).values(&row);
        query
            .get_result::<PromoCode>(self.db_conn)
            .map_err(from_diesel)
            .and_then(|value| {
                acl::check(&*self.acl, Resource::PromoCodes, Action::Create, self, Some(&value))?;

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Creates new promo code: {:?} error occurred", row)).into())
    }

    /// Get promo code
    fn get(&self, id_arg: PromoCodeId) -> RepoResult<Option<PromoCode>> {
        debug!("Find in promo codes with id {}.", id_arg);
        let query = PromoCodes::promo_codes.filter(PromoCodes::id.eq(id_arg));
        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value: Option<PromoCode>| {
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.acl, Resource::PromoCodes, Action::Read, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Find promo code by id: {} error occurred", id_arg)).into())
    }

    /// Get promo code by code, case insensitive
    fn get_by_code(&self, code_arg: &str) -> RepoResult<Option<PromoCode>> {
        let code_arg = PromoCode::normalize_code(code_arg);
        debug!("Find in promo codes with code {}.", code_arg);
        let query = PromoCodes::promo_codes.filter(PromoCodes::code.eq(&code_arg));
        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value: Option<PromoCode>| {
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.acl, Resource::PromoCodes, Action::Read, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Find promo code by code: {} error occurred", code_arg)).into())
    }

    /// Checks whether a promo code other than `except` uses the code
    fn code_exists(&self, code_arg: &str, except: Option<PromoCodeId>) -> RepoResult<bool> {
        let code_arg = PromoCode::normalize_code(code_arg);
        debug!("Check promo code {} exists, except {:?}.", code_arg, except);
        let query = PromoCodes::promo_codes.filter(PromoCodes::code.eq(&code_arg)).select(PromoCodes::id);
        query
            .get_results::<PromoCodeId>(self.db_conn)
            .map_err(From::from)
            .and_then(|ids| {
                acl::check(&*self.acl, Resource::PromoCodes, Action::Read, self, None)?;

                Ok(ids.into_iter().any(|id| Some(id) != except))
            }).map_err(|e: FailureError| e.context(format!("Check promo code {} exists error occurred", code_arg)).into())
    }

    /// Page of promo codes matching search terms
    fn search(&self, terms: &PromoCodesSearchTerms, now: SystemTime) -> RepoResult<Vec<PromoCode>> {
        debug!("Search promo codes by terms: {:?}.", terms);
        let query = PromoCodes::promo_codes.into_boxed().filter(search_filter(terms, now));

        let query = match (terms.sort_by, terms.sort_order) {
            (PromoCodesSortBy::CreatedAt, SortOrder::Asc) => query.order((PromoCodes::created_at.asc(), PromoCodes::id.asc())),
            (PromoCodesSortBy::CreatedAt, SortOrder::Desc) => query.order((PromoCodes::created_at.desc(), PromoCodes::id.desc())),
            (PromoCodesSortBy::Code, SortOrder::Asc) => query.order(PromoCodes::code.asc()),
            (PromoCodesSortBy::Code, SortOrder::Desc) => query.order(PromoCodes::code.desc()),
            (PromoCodesSortBy::UsedCount, SortOrder::Asc) => query.order((PromoCodes::used_count.asc(), PromoCodes::id.asc())),
            (PromoCodesSortBy::UsedCount, SortOrder::Desc) => query.order((PromoCodes::used_count.desc(), PromoCodes::id.desc())),
            (PromoCodesSortBy::EndDate, SortOrder::Asc) => query.order((PromoCodes::end_date.asc(), PromoCodes::id.asc())),
            (PromoCodesSortBy::EndDate, SortOrder::Desc) => query.order((PromoCodes::end_date.desc(), PromoCodes::id.desc())),
        };

        query
            .offset(terms.offset())
            .limit(terms.limit)
            .get_results(self.db_conn)
            .map_err(From::from)
            .and_then(|values: Vec<PromoCode>| {
                self.check_all(Action::Read, &values)?;

                Ok(values)
            }).map_err(|e: FailureError| e.context(format!("Search promo codes by terms: {:?} error occurred", terms)).into())
    }

    /// Number of promo codes matching search terms, pagination ignored
    fn count(&self, terms: &PromoCodesSearchTerms, now: SystemTime) -> RepoResult<i64> {
        debug!("Count promo codes by terms: {:?}.", terms);
        let query = PromoCodes::promo_codes.into_boxed().filter(search_filter(terms, now)).count();

        query
            .get_result::<i64>(self.db_conn)
            .map_err(From::from)
            .and_then(|count| {
                acl::check(&*self.acl, Resource::PromoCodes, Action::Read, self, None)?;

                Ok(count)
            }).map_err(|e: FailureError| e.context(format!("Count promo codes by terms: {:?} error occurred", terms)).into())
    }

    /// List all promo codes, newest first
    fn list(&self) -> RepoResult<Vec<PromoCode>> {
        debug!("Find all promo codes.");
        let query = PromoCodes::promo_codes.order((PromoCodes::created_at.desc(), PromoCodes::id.desc()));

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .and_then(|values: Vec<PromoCode>| {
                self.check_all(Action::Read, &values)?;

                Ok(values)
            }).map_err(|e: FailureError| e.context("List all promo codes").into())
    }

    /// Promo codes usable at `now`
    fn list_valid(&self, now: SystemTime) -> RepoResult<Vec<PromoCode>> {
        debug!("Find valid promo codes.");
        let query = PromoCodes::promo_codes
            .filter(PromoCodes::is_active.eq(true))
            .filter(PromoCodes::start_date.le(now))
            .filter(PromoCodes::end_date.ge(now))
            .filter(
                PromoCodes::usage_limit
                    .is_null()
                    .or(PromoCodes::used_count.nullable().lt(PromoCodes::usage_limit)),
            ).order((PromoCodes::created_at.desc(), PromoCodes::id.desc()));

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .and_then(|values: Vec<PromoCode>| {
                self.check_all(Action::Read, &values)?;

                Ok(values)
            }).map_err(|e: FailureError| e.context("List valid promo codes").into())
    }

    /// Promo codes with listed ids
    fn find_many(&self, ids: &[PromoCodeId]) -> RepoResult<Vec<PromoCode>> {
        debug!("Find promo codes with ids {:?}.", ids);
        let query = PromoCodes::promo_codes
            .filter(PromoCodes::id.eq_any(ids.to_vec()))
            .order(PromoCodes::id);

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .and_then(|values: Vec<PromoCode>| {
                self.check_all(Action::Read, &values)?;

                Ok(values)
            }).map_err(|e: FailureError| e.context(format!("Find promo codes with ids {:?} error occurred", ids)).into())
    }

    /// Most used promo codes
    fn most_used(&self, limit: i64) -> RepoResult<Vec<PromoCode>> {
        debug!("Find {} most used promo codes.", limit);
        let query = PromoCodes::promo_codes
            .order((PromoCodes::used_count.desc(), PromoCodes::id.asc()))
            .limit(limit);

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .and_then(|values: Vec<PromoCode>| {
                self.check_all(Action::Read, &values)?;

                Ok(values)
            }).map_err(|e: FailureError| e.context("Find most used promo codes").into())
    }

    /// Sum of `used_count` over all promo codes
    fn total_usage(&self) -> RepoResult<i64> {
        debug!("Sum usage of promo codes.");
        let query = PromoCodes::promo_codes.select(sum(PromoCodes::used_count));

        query
            .get_result::<Option<i64>>(self.db_conn)
            .map_err(From::from)
            .and_then(|total| {
                acl::check(&*self.acl, Resource::PromoCodes, Action::Read, self, None)?;

                Ok(total.unwrap_or(0))
            }).map_err(|e: FailureError| e.context("Sum usage of promo codes").into())
    }

    /// Update promo code
    fn update(&self, id_arg: PromoCodeId, payload: UpdatePromoCode) -> RepoResult<PromoCode> {
        debug!("Updating promo code with id {} and payload {:?}.", id_arg, payload);
        let payload = payload.normalized();
        let query = PromoCodes::promo_codes.find(id_arg);

        query
            .get_result(self.db_conn)
            .map_err(from_diesel)
            .and_then(|value: PromoCode| acl::check(&*self.acl, Resource::PromoCodes, Action::Update, self, Some(&value)))
            .and_then(|_| {
                let filtered = PromoCodes::promo_codes.filter(PromoCodes::id.eq(id_arg));
                let query = diesel::update(filtered).set((&payload, PromoCodes::updated_at.eq(SystemTime::now())));
                query.get_result::<PromoCode>(self.db_conn).map_err(from_diesel)
            }).map_err(|e: FailureError| {
                e.context(format!("Updating promo code with id {} and payload {:?} error occurred", id_arg, payload))
                    .into()
            })
    }

    /// Sets `is_active` of listed promo codes, returns how many were updated
    fn set_active(&self, ids: &[PromoCodeId], is_active: bool) -> RepoResult<usize> {
        debug!("Set is_active {} for promo codes with ids {:?}.", is_active, ids);

        acl::check(&*self.acl, Resource::PromoCodes, Action::Update, self, None)
            .and_then(|_| {
                let filtered = PromoCodes::promo_codes.filter(PromoCodes::id.eq_any(ids.to_vec()));
                let query = diesel::update(filtered).set((
                    PromoCodes::is_active.eq(is_active),
                    PromoCodes::updated_at.eq(SystemTime::now()),
                ));
                query.execute(self.db_conn).map_err(From::from)
            }).map_err(|e: FailureError| {
                e.context(format!("Set is_active {} for promo codes with ids {:?} error occurred", is_active, ids))
                    .into()
            })
    }

    /// Delete promo code that was never used
    fn delete(&self, id_arg: PromoCodeId) -> RepoResult<PromoCode> {
        debug!("Delete promo code with id {}.", id_arg);
        let query = PromoCodes::promo_codes.find(id_arg);

        query
            .get_result(self.db_conn)
            .map_err(from_diesel)
            .and_then(|value: PromoCode| acl::check(&*self.acl, Resource::PromoCodes, Action::Delete, self, Some(&value)))
            .and_then(|_| {
                let filtered = PromoCodes::promo_codes
                    .filter(PromoCodes::id.eq(id_arg))
                    .filter(PromoCodes::used_count.eq(0));
                diesel::delete(filtered)
                    .get_result::<PromoCode>(self.db_conn)
                    .optional()
                    .map_err(From::from)
            }).and_then(|deleted| deleted.ok_or_else(|| conflict(format!("Promo code {} was used before deletion", id_arg))))
            .map_err(|e: FailureError| e.context(format!("Delete promo code with id {} error occurred", id_arg)).into())
    }

    /// Delete listed promo codes that were never used, returns how many were deleted
    fn delete_many(&self, ids: &[PromoCodeId]) -> RepoResult<usize> {
        debug!("Delete promo codes with ids {:?}.", ids);

        acl::check(&*self.acl, Resource::PromoCodes, Action::Delete, self, None)
            .and_then(|_| {
                let filtered = PromoCodes::promo_codes
                    .filter(PromoCodes::id.eq_any(ids.to_vec()))
                    .filter(PromoCodes::used_count.eq(0));
                diesel::delete(filtered).execute(self.db_conn).map_err(From::from)
            }).map_err(|e: FailureError| e.context(format!("Delete promo codes with ids {:?} error occurred", ids)).into())
    }

    /// Usage records of a promo code
    fn usages(&self, id_arg: PromoCodeId) -> RepoResult<Vec<PromoCodeUsage>> {
        debug!("Find usages of promo code with id {}.", id_arg);
        let query = PromoCodeUsages::promo_code_usages
            .filter(PromoCodeUsages::promo_code_id.eq(id_arg))
            .order(PromoCodeUsages::used_at.desc());

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .and_then(|values: Vec<PromoCodeUsage>| {
                for value in &values {
                    acl::check(&*self.usages_acl, Resource::PromoCodeUsages, Action::Read, self, Some(value))?;
                }

                Ok(values)
            }).map_err(|e: FailureError| e.context(format!("Find usages of promo code with id {} error occurred", id_arg)).into())
    }

    /// Usage record of a user
    fn find_usage(&self, id_arg: PromoCodeId, user_id_arg: UserId) -> RepoResult<Option<PromoCodeUsage>> {
        debug!("Find usage of promo code with id {} by user {}.", id_arg, user_id_arg);
        let query = PromoCodeUsages::promo_code_usages
            .filter(PromoCodeUsages::promo_code_id.eq(id_arg))
            .filter(PromoCodeUsages::user_id.eq(user_id_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value: Option<PromoCodeUsage>| {
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.usages_acl, Resource::PromoCodeUsages, Action::Read, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| {
                e.context(format!(
                    "Find usage of promo code with id {} by user {} error occurred",
                    id_arg, user_id_arg
                )).into()
            })
    }

    /// Counts a redemption of the promo code by the user
    fn record_usage(&self, id_arg: PromoCodeId, user_id_arg: UserId, now: SystemTime) -> RepoResult<PromoCode> {
        debug!("Record usage of promo code with id {} by user {}.", id_arg, user_id_arg);

        let record = || -> RepoResult<PromoCode> {
            // Row lock taken here serializes concurrent redemptions of the promo code
            let redeemable = PromoCodes::promo_codes
                .filter(PromoCodes::id.eq(id_arg))
                .filter(PromoCodes::is_active.eq(true))
                .filter(PromoCodes::start_date.le(now))
                .filter(PromoCodes::end_date.ge(now))
                .filter(
                    PromoCodes::usage_limit
                        .is_null()
                        .or(PromoCodes::used_count.nullable().lt(PromoCodes::usage_limit)),
                ).filter(PromoCodes::first_time_only.eq(false).or(PromoCodes::used_count.eq(0)));

            let promo = diesel::update(redeemable)
                .set((
                    PromoCodes::used_count.eq(PromoCodes::used_count + 1),
                    PromoCodes::updated_at.eq(now),
                )).get_result::<PromoCode>(self.db_conn)
                .optional()?
                .ok_or_else(|| conflict(format!("Promo code {} can not be redeemed anymore", id_arg)))?;

            acl::check(&*self.acl, Resource::PromoCodes, Action::Update, self, Some(&promo))?;

            let own_usage = PromoCodeUsages::promo_code_usages
                .filter(PromoCodeUsages::promo_code_id.eq(id_arg))
                .filter(PromoCodeUsages::user_id.eq(user_id_arg));

            let bumped = diesel::update(own_usage.clone().filter(PromoCodeUsages::count.lt(promo.per_user_limit)))
                .set((
                    PromoCodeUsages::count.eq(PromoCodeUsages::count + 1),
                    PromoCodeUsages::used_at.eq(now),
                )).get_result::<PromoCodeUsage>(self.db_conn)
                .optional()?;

            let usage = match bumped {
                Some(usage) => usage,
                None => {
                    let has_usage = diesel::select(exists(own_usage.clone())).get_result::<bool>(self.db_conn)?;
                    if has_usage {
                        return Err(conflict(format!(
                            "User {} reached the limit of promo code {}",
                            user_id_arg, id_arg
                        )));
                    }

                    diesel::insert_into(PromoCodeUsages::promo_code_usages)
                        .values(&NewPromoCodeUsage::first(id_arg, user_id_arg, now))
                        .get_result::<PromoCodeUsage>(self.db_conn)
                        .map_err(|e| match e {
                            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                                conflict(format!("Usage of promo code {} by user {} was recorded concurrently", id_arg, user_id_arg))
                            }
                            e => FailureError::from(e),
                        })?
                }
            };

            acl::check(&*self.usages_acl, Resource::PromoCodeUsages, Action::Update, self, Some(&usage))?;

            Ok(promo)
        };

        record().map_err(|e: FailureError| {
            e.context(format!(
                "Record usage of promo code with id {} by user {} error occurred",
                id_arg, user_id_arg
            )).into()
        })
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CheckScope<Scope, PromoCode>
    for PromoCodesRepoImpl<'a, T>
{
    fn is_in_scope(&self, _user_id: UserId, scope: &Scope, _obj: Option<&PromoCode>) -> bool {
        match *scope {
            Scope::All => true,
            Scope::Owned => false,
        }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CheckScope<Scope, PromoCodeUsage>
    for PromoCodesRepoImpl<'a, T>
{
    fn is_in_scope(&self, user_id: UserId, scope: &Scope, obj: Option<&PromoCodeUsage>) -> bool {
        match *scope {
            Scope::All => true,
            Scope::Owned => obj.map(|usage| usage.user_id == user_id).unwrap_or(false),
        }
    }
}
