//! Promo codes Services, presents CRUD operations with promo codes for admins
//! and the public list of valid codes

use std::time::SystemTime;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;
use uuid::Uuid;
use validator::ValidationErrors;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::ReposFactory;
use services::{validate_payload, Service};

const GENERATE_CODE_ATTEMPTS: usize = 10;

pub trait PromoCodesService {
    /// Creates new promo code
    fn create_promo_code(&self, payload: NewPromoCode) -> ServiceFuture<PromoCode>;
    /// Search promo codes with pagination
    fn list_promo_codes(&self, terms: PromoCodesSearchTerms) -> ServiceFuture<PromoCodesPage>;
    /// Returns promo code with its usages
    fn get_promo_code(&self, id_arg: PromoCodeId) -> ServiceFuture<PromoCodeWithUsages>;
    /// Updates promo code
    fn update_promo_code(&self, id_arg: PromoCodeId, payload: UpdatePromoCode) -> ServiceFuture<PromoCode>;
    /// Switches promo code on or off
    fn toggle_promo_code(&self, id_arg: PromoCodeId) -> ServiceFuture<PromoCode>;
    /// Deletes promo code that was never used
    fn delete_promo_code(&self, id_arg: PromoCodeId) -> ServiceFuture<PromoCode>;
    /// Deletes promo codes, none of them may be used
    fn bulk_delete_promo_codes(&self, payload: BulkPromoCodesPayload) -> ServiceFuture<usize>;
    /// Switches promo codes on or off
    fn bulk_update_status(&self, payload: BulkStatusPayload) -> ServiceFuture<usize>;
    /// Returns promo codes that can be redeemed right now
    fn valid_promo_codes(&self) -> ServiceFuture<Vec<PromoCode>>;
    /// Generates code that is not taken yet
    fn generate_promo_code(&self) -> ServiceFuture<String>;
}

fn not_found(id_arg: PromoCodeId) -> FailureError {
    format_err!("Promo code with id {} not found", id_arg).context(Error::NotFound).into()
}

fn duplicate_code(code: &str) -> FailureError {
    format_err!("Promo code {} already exists", code)
        .context(Error::Validate(
            validation_errors!({"code": ["code" => "Promo code already exists"]}),
        )).into()
}

fn used_code(code: &str) -> FailureError {
    format_err!("Promo code {} has been used", code)
        .context(Error::Validate(
            validation_errors!({"used_count": ["used" => "Cannot delete a promo code that has been used"]}),
        )).into()
}

impl<M, F> PromoCodesService for Service<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    fn create_promo_code(&self, payload: NewPromoCode) -> ServiceFuture<PromoCode> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        let created_by = match caller {
            Some(caller) => caller.user_id,
            None => {
                return Box::new(future::err(
                    format_err!("Denied request to create promo code for anonymous user")
                        .context(Error::Forbidden)
                        .into(),
                ))
            }
        };
        if let Err(e) = validate_payload(&payload) {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            conn.transaction::<PromoCode, FailureError, _>(move || {
                if promo_codes_repo.code_exists(&payload.code, None)? {
                    return Err(duplicate_code(&payload.code));
                }
                let promo_code = promo_codes_repo.create(payload, created_by)?;
                info!("Promo code {} created by user {}", promo_code.code, created_by);
                Ok(promo_code)
            }).map_err(|e| e.context("Service PromoCodes, create endpoint error occurred.").into())
        })
    }

    fn list_promo_codes(&self, terms: PromoCodesSearchTerms) -> ServiceFuture<PromoCodesPage> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = validate_payload(&terms) {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            let now = SystemTime::now();

            promo_codes_repo
                .search(&terms, now)
                .and_then(|promo_codes| {
                    promo_codes_repo.count(&terms, now).map(|total| PromoCodesPage {
                        promo_codes,
                        pagination: Pagination::new(terms.page, terms.limit, total),
                    })
                }).map_err(|e| e.context("Service PromoCodes, list endpoint error occurred.").into())
        })
    }

    fn get_promo_code(&self, id_arg: PromoCodeId) -> ServiceFuture<PromoCodeWithUsages> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);

            promo_codes_repo
                .get(id_arg)
                .and_then(|promo_code| promo_code.ok_or_else(|| not_found(id_arg)))
                .and_then(|promo_code| {
                    promo_codes_repo
                        .usages(promo_code.id)
                        .map(|usages| PromoCodeWithUsages { promo_code, usages })
                }).map_err(|e| e.context("Service PromoCodes, get endpoint error occurred.").into())
        })
    }

    fn update_promo_code(&self, id_arg: PromoCodeId, payload: UpdatePromoCode) -> ServiceFuture<PromoCode> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = validate_payload(&payload) {
            return Box::new(future::err(e));
        }
        let payload = payload.normalized();

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            conn.transaction::<PromoCode, FailureError, _>(move || {
                let current = promo_codes_repo.get(id_arg)?.ok_or_else(|| not_found(id_arg))?;

                if let Some(ref code) = payload.code {
                    if promo_codes_repo.code_exists(code, Some(id_arg))? {
                        return Err(duplicate_code(code));
                    }
                }

                let merged = payload.merge_into(&current);
                validate_dates(merged.start_date, merged.end_date).map_err(|e| {
                    let mut errors = ValidationErrors::new();
                    errors.add("end_date", e);
                    format_err!("Promo code {} would end before it starts", id_arg).context(Error::Validate(errors))
                })?;
                if !merged.usage_limit.map_or(true, |limit| limit >= merged.used_count) {
                    return Err(format_err!("Promo code {} was used {} times already", id_arg, merged.used_count)
                        .context(Error::Validate(
                            validation_errors!({"usage_limit": ["usage_limit" => "Usage limit is below the number of uses"]}),
                        )).into());
                }

                promo_codes_repo.update(id_arg, payload)
            }).map_err(|e| e.context("Service PromoCodes, update endpoint error occurred.").into())
        })
    }

    fn toggle_promo_code(&self, id_arg: PromoCodeId) -> ServiceFuture<PromoCode> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            conn.transaction::<PromoCode, FailureError, _>(move || {
                let current = promo_codes_repo.get(id_arg)?.ok_or_else(|| not_found(id_arg))?;
                let payload = UpdatePromoCode {
                    is_active: Some(!current.is_active),
                    ..Default::default()
                };
                promo_codes_repo.update(id_arg, payload)
            }).map_err(|e| e.context("Service PromoCodes, toggle endpoint error occurred.").into())
        })
    }

    fn delete_promo_code(&self, id_arg: PromoCodeId) -> ServiceFuture<PromoCode> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            conn.transaction::<PromoCode, FailureError, _>(move || {
                let current = promo_codes_repo.get(id_arg)?.ok_or_else(|| not_found(id_arg))?;
                if current.used_count > 0 {
                    return Err(used_code(&current.code));
                }
                let deleted = promo_codes_repo.delete(id_arg)?;
                info!("Promo code {} deleted", deleted.code);
                Ok(deleted)
            }).map_err(|e| e.context("Service PromoCodes, delete endpoint error occurred.").into())
        })
    }

    fn bulk_delete_promo_codes(&self, payload: BulkPromoCodesPayload) -> ServiceFuture<usize> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = validate_payload(&payload) {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            conn.transaction::<usize, FailureError, _>(move || {
                let used = promo_codes_repo
                    .find_many(&payload.ids)?
                    .into_iter()
                    .filter(|promo_code| promo_code.used_count > 0)
                    .map(|promo_code| promo_code.code)
                    .collect::<Vec<String>>();

                if !used.is_empty() {
                    let message = format!("Cannot delete promo codes that have been used: {}", used.join(", "));
                    return Err(format_err!("{}", message)
                        .context(Error::Validate(validation_errors!({"ids": ["used" => message]})))
                        .into());
                }

                promo_codes_repo.delete_many(&payload.ids)
            }).map_err(|e| e.context("Service PromoCodes, bulk_delete endpoint error occurred.").into())
        })
    }

    fn bulk_update_status(&self, payload: BulkStatusPayload) -> ServiceFuture<usize> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = validate_payload(&payload) {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);
            conn.transaction::<usize, FailureError, _>(move || promo_codes_repo.set_active(&payload.ids, payload.is_active))
                .map_err(|e| e.context("Service PromoCodes, bulk_update_status endpoint error occurred.").into())
        })
    }

    fn valid_promo_codes(&self) -> ServiceFuture<Vec<PromoCode>> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);

            promo_codes_repo
                .list_valid(SystemTime::now())
                .map_err(|e| e.context("Service PromoCodes, valid endpoint error occurred.").into())
        })
    }

    fn generate_promo_code(&self) -> ServiceFuture<String> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);

            for _ in 0..GENERATE_CODE_ATTEMPTS {
                let new_uuid = Uuid::new_v4().simple().to_string().to_uppercase();
                let code = new_uuid.chars().take(PromoCode::GENERATED_CODE_LENGTH).collect::<String>();
                if !promo_codes_repo.code_exists(&code, None)? {
                    return Ok(code);
                }
                warn!("Generated promo code {} is taken, retrying", code);
            }

            Err(format_err!("Could not generate a free promo code in {} attempts", GENERATE_CODE_ATTEMPTS)
                .context(Error::Conflict)
                .into())
        })
    }
}
