//! Redemptions Services, previews and applies promo codes to orders

use std::time::SystemTime;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::{OrdersRepo, PromoCodesRepo, ReposFactory};
use services::evaluator::check_promo_code;
use services::{validate_payload, Service};

pub trait RedemptionsService {
    /// Discount the code would give for an order amount, nothing is written
    fn validate_promo_code(&self, payload: ValidatePromoCodePayload) -> ServiceFuture<PromoCodeDiscount>;
    /// Redeems the code against an order of the caller
    fn apply_promo_code(&self, payload: ApplyPromoCodePayload) -> ServiceFuture<RedeemedOrder>;
}

fn code_not_found(code: &str) -> FailureError {
    format_err!("Promo code {} not found", code).context(Error::NotFound).into()
}

fn is_conflict(e: &FailureError) -> bool {
    match Error::kind_of(e) {
        Some(Error::Conflict) => true,
        _ => false,
    }
}

/// One redemption attempt, has to run inside a transaction
fn redeem(
    promo_codes_repo: &PromoCodesRepo,
    usages_repo: &PromoCodesRepo,
    orders_repo: &OrdersRepo,
    caller: Caller,
    payload: &ApplyPromoCodePayload,
    clamp_fixed_discount: bool,
) -> Result<RedeemedOrder, FailureError> {
    let promo_code = promo_codes_repo
        .get_by_code(&payload.code)?
        .ok_or_else(|| code_not_found(&payload.code))?;

    let order = orders_repo
        .get(payload.order_id)?
        .ok_or_else(|| format_err!("Order {} not found", payload.order_id).context(Error::NotFound))?;
    if order.user_id != caller.user_id {
        return Err(format_err!("Order {} does not belong to user {}", order.id, caller.user_id)
            .context(Error::Forbidden)
            .into());
    }
    if order.is_discounted() {
        return Err(format_err!("Order {} already has a discount", order.id)
            .context(Error::Validate(
                validation_errors!({"order_id": ["discounted" => "Order already has a promo code applied"]}),
            )).into());
    }

    let now = SystemTime::now();
    let usage = usages_repo.find_usage(promo_code.id, caller.user_id)?;
    let discount_amount = check_promo_code(&promo_code, usage.as_ref(), order.total, now, clamp_fixed_discount).into_discount()?;

    let promo_code = usages_repo.record_usage(promo_code.id, caller.user_id, now)?;
    let final_total = order.total - discount_amount;
    let order = orders_repo.apply_discount(
        order.id,
        OrderDiscount {
            discount_code: promo_code.code.clone(),
            discount_type: promo_code.discount_type,
            discount_value: promo_code.discount_value,
            discount_amount,
            final_total,
        },
    )?;

    Ok(RedeemedOrder {
        order_id: order.id,
        promo_code: promo_code.code,
        original_total: order.total,
        discount_amount,
        final_total,
    })
}

impl<M, F> RedemptionsService for Service<M, F>
where
    M: ManageConnection,
    M::Connection: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
    F: ReposFactory<M::Connection>,
{
    fn validate_promo_code(&self, payload: ValidatePromoCodePayload) -> ServiceFuture<PromoCodeDiscount> {
        let caller = self.dynamic_context.caller;
        let repo_factory = self.static_context.repo_factory.clone();
        let clamp_fixed_discount = self.static_context.config.promo.clamp_fixed_discount;

        if let Err(e) = validate_payload(&payload) {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, caller);

            let preview = || -> Result<PromoCodeDiscount, FailureError> {
                let promo_code = promo_codes_repo
                    .get_by_code(&payload.code)?
                    .ok_or_else(|| code_not_found(&payload.code))?;
                // anonymous previews skip the per-user check
                let usage = match caller {
                    Some(caller) => promo_codes_repo.find_usage(promo_code.id, caller.user_id)?,
                    None => None,
                };
                check_promo_code(
                    &promo_code,
                    usage.as_ref(),
                    payload.order_amount,
                    SystemTime::now(),
                    clamp_fixed_discount,
                ).into_discount()
                .map(|discount_amount| PromoCodeDiscount::new(&promo_code, discount_amount))
            };

            preview().map_err(|e| e.context("Service Redemptions, validate endpoint error occurred.").into())
        })
    }

    fn apply_promo_code(&self, payload: ApplyPromoCodePayload) -> ServiceFuture<RedeemedOrder> {
        let repo_factory = self.static_context.repo_factory.clone();
        let clamp_fixed_discount = self.static_context.config.promo.clamp_fixed_discount;
        let attempts = self.static_context.config.promo.attempts();

        let caller = match self.dynamic_context.caller {
            Some(caller) => caller,
            None => {
                return Box::new(future::err(
                    format_err!("Denied request to apply promo code for anonymous user")
                        .context(Error::Forbidden)
                        .into(),
                ))
            }
        };
        if let Err(e) = validate_payload(&payload) {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let promo_codes_repo = repo_factory.create_promo_codes_repo(&*conn, Some(caller));
            let usages_repo = repo_factory.create_promo_codes_repo_with_sys_acl(&*conn);
            let orders_repo = repo_factory.create_orders_repo(&*conn, Some(caller));

            let mut attempt = 1;
            loop {
                let result = conn.transaction::<RedeemedOrder, FailureError, _>(|| {
                    redeem(
                        &*promo_codes_repo,
                        &*usages_repo,
                        &*orders_repo,
                        caller,
                        &payload,
                        clamp_fixed_discount,
                    )
                });

                match result {
                    Err(ref e) if attempt < attempts && is_conflict(e) => {
                        warn!(
                            "Redemption of promo code {} for order {} lost a race, attempt {} of {}",
                            payload.code, payload.order_id, attempt, attempts
                        );
                        attempt += 1;
                    }
                    Ok(redeemed) => {
                        info!(
                            "Promo code {} applied to order {} by user {}, discount {}",
                            redeemed.promo_code, redeemed.order_id, caller.user_id, redeemed.discount_amount
                        );
                        return Ok(redeemed);
                    }
                    Err(e) => return Err(e.context("Service Redemptions, apply endpoint error occurred.").into()),
                }
            }
        })
    }
}
