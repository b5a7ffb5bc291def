//! Promo code rules shared by preview and redemption. Nothing here touches storage.
use std::time::SystemTime;

use failure::Error as FailureError;

use errors::Error;
use models::{DiscountType, PromoCode, PromoCodeUsage};

/// Outcome of checking a promo code against an order
#[derive(Clone, Debug, PartialEq)]
pub enum PromoCodeValidate {
    /// Switched off, outside of its window or globally exhausted
    Inactive,
    /// Order amount is below the threshold carried here
    BelowMinimum(f64),
    /// First-time-only code that somebody already redeemed
    UsageLimitReached,
    /// The user redeemed the code `per_user_limit` times
    PerUserLimitReached,
    /// Discount amount the code gives
    Valid(f64),
}

impl PromoCodeValidate {
    /// Turns a failed check into an error of the matching kind
    pub fn into_discount(self) -> Result<f64, FailureError> {
        match self {
            PromoCodeValidate::Valid(amount) => Ok(amount),
            PromoCodeValidate::Inactive => Err(format_err!("Promo code is expired or inactive").context(Error::Inactive).into()),
            PromoCodeValidate::BelowMinimum(min_order_amount) => Err(format_err!(
                "Minimum order amount of {:.2} required",
                min_order_amount
            ).context(Error::BelowMinimum(min_order_amount))
            .into()),
            PromoCodeValidate::UsageLimitReached => Err(format_err!("Promo code was already redeemed")
                .context(Error::UsageLimitReached)
                .into()),
            PromoCodeValidate::PerUserLimitReached => Err(format_err!("Per user limit of promo code is reached")
                .context(Error::PerUserLimitReached)
                .into()),
        }
    }
}

/// Switched on, inside `[start_date, end_date]` and below the global usage limit
pub fn check_validity(promo: &PromoCode, now: SystemTime) -> bool {
    if !promo.is_active {
        return false;
    }

    if now < promo.start_date || now > promo.end_date {
        return false;
    }

    match promo.usage_limit {
        Some(usage_limit) => promo.used_count < usage_limit,
        None => true,
    }
}

/// `usage` is the record of the user the redemption is for, if any
pub fn can_user_redeem(promo: &PromoCode, usage: Option<&PromoCodeUsage>) -> bool {
    redeem_violation(promo, usage).is_none()
}

fn redeem_violation(promo: &PromoCode, usage: Option<&PromoCodeUsage>) -> Option<PromoCodeValidate> {
    if promo.first_time_only && promo.used_count > 0 {
        return Some(PromoCodeValidate::UsageLimitReached);
    }

    match usage {
        Some(usage) if usage.count >= promo.per_user_limit => Some(PromoCodeValidate::PerUserLimitReached),
        _ => None,
    }
}

/// Discount for `order_amount`. Fixed discounts are not capped by the order amount,
/// a zero `max_discount` means no cap.
pub fn compute_discount(promo: &PromoCode, order_amount: f64) -> f64 {
    let discount = match promo.discount_type {
        DiscountType::Fixed => promo.discount_value,
        DiscountType::Percentage => {
            let discount = order_amount * promo.discount_value / 100f64;
            match promo.max_discount {
                Some(max_discount) if max_discount > 0f64 => discount.min(max_discount),
                _ => discount,
            }
        }
    };

    discount.max(0f64)
}

/// Runs every check in the order the errors are reported
pub fn check_promo_code(
    promo: &PromoCode,
    usage: Option<&PromoCodeUsage>,
    order_amount: f64,
    now: SystemTime,
    clamp_fixed_discount: bool,
) -> PromoCodeValidate {
    if !check_validity(promo, now) {
        return PromoCodeValidate::Inactive;
    }

    if order_amount < promo.min_order_amount {
        return PromoCodeValidate::BelowMinimum(promo.min_order_amount);
    }

    if let Some(violation) = redeem_violation(promo, usage) {
        return violation;
    }

    let discount = compute_discount(promo, order_amount);
    if clamp_fixed_discount && promo.discount_type == DiscountType::Fixed {
        PromoCodeValidate::Valid(discount.min(order_amount.max(0f64)))
    } else {
        PromoCodeValidate::Valid(discount)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use errors::Error;
    use models::*;

    use super::*;

    fn promo_code(discount_type: DiscountType, discount_value: f64) -> PromoCode {
        let now = SystemTime::now();
        PromoCode {
            id: PromoCodeId(1),
            code: "TEST".to_string(),
            description: String::new(),
            discount_type,
            discount_value,
            min_order_amount: 0f64,
            max_discount: None,
            start_date: now - Duration::from_secs(3600),
            end_date: now + Duration::from_secs(3600),
            usage_limit: None,
            used_count: 0,
            per_user_limit: 1,
            first_time_only: false,
            is_active: true,
            created_by: UserId(1),
            created_at: now,
            updated_at: now,
        }
    }

    fn usage(count: i32) -> PromoCodeUsage {
        PromoCodeUsage {
            promo_code_id: PromoCodeId(1),
            user_id: UserId(2),
            count,
            used_at: SystemTime::now(),
        }
    }

    #[test]
    fn percentage_discount_is_capped() {
        let mut promo = promo_code(DiscountType::Percentage, 20f64);
        promo.max_discount = Some(30f64);
        assert_eq!(compute_discount(&promo, 200f64), 30f64);
        assert_eq!(compute_discount(&promo, 100f64), 20f64);
    }

    #[test]
    fn zero_cap_means_no_cap() {
        let mut promo = promo_code(DiscountType::Percentage, 20f64);
        promo.max_discount = Some(0f64);
        assert_eq!(compute_discount(&promo, 200f64), 40f64);
    }

    #[test]
    fn fixed_discount_ignores_order_amount() {
        let promo = promo_code(DiscountType::Fixed, 15f64);
        assert_eq!(compute_discount(&promo, 5f64), 15f64);
        assert_eq!(compute_discount(&promo, 500f64), 15f64);
        assert_eq!(compute_discount(&promo, 0f64), 15f64);
    }

    #[test]
    fn fixed_discount_clamped_when_asked() {
        let promo = promo_code(DiscountType::Fixed, 15f64);
        let now = SystemTime::now();
        assert_eq!(check_promo_code(&promo, None, 5f64, now, true), PromoCodeValidate::Valid(5f64));
        assert_eq!(check_promo_code(&promo, None, 5f64, now, false), PromoCodeValidate::Valid(15f64));
    }

    #[test]
    fn future_start_date_is_not_valid() {
        let now = SystemTime::now();
        let mut promo = promo_code(DiscountType::Fixed, 10f64);
        promo.start_date = now + Duration::from_secs(60);
        assert!(promo.is_active);
        assert!(!check_validity(&promo, now));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let promo = promo_code(DiscountType::Fixed, 10f64);
        assert!(check_validity(&promo, promo.start_date));
        assert!(check_validity(&promo, promo.end_date));
        assert!(!check_validity(&promo, promo.end_date + Duration::from_secs(1)));
    }

    #[test]
    fn exhausted_or_switched_off_code_is_not_valid() {
        let now = SystemTime::now();
        let mut promo = promo_code(DiscountType::Fixed, 10f64);
        promo.usage_limit = Some(3);
        promo.used_count = 2;
        assert!(check_validity(&promo, now));
        promo.used_count = 3;
        assert!(!check_validity(&promo, now));

        let mut promo = promo_code(DiscountType::Fixed, 10f64);
        promo.is_active = false;
        assert!(!check_validity(&promo, now));
    }

    #[test]
    fn first_time_only_code_is_single_use_for_everyone() {
        let mut promo = promo_code(DiscountType::Fixed, 10f64);
        promo.first_time_only = true;
        promo.per_user_limit = 5;
        assert!(can_user_redeem(&promo, None));

        promo.used_count = 1;
        assert!(!can_user_redeem(&promo, None));
        assert!(!can_user_redeem(&promo, Some(&usage(0))));
    }

    #[test]
    fn per_user_limit_is_respected() {
        let mut promo = promo_code(DiscountType::Fixed, 10f64);
        promo.per_user_limit = 2;
        assert!(can_user_redeem(&promo, None));
        assert!(can_user_redeem(&promo, Some(&usage(1))));
        assert!(!can_user_redeem(&promo, Some(&usage(2))));
    }

    #[test]
    fn checks_are_reported_in_order() {
        let now = SystemTime::now();
        let mut promo = promo_code(DiscountType::Percentage, 10f64);
        promo.min_order_amount = 50f64;

        assert_eq!(check_promo_code(&promo, None, 49.99, now, false), PromoCodeValidate::BelowMinimum(50f64));
        assert_eq!(check_promo_code(&promo, None, 50f64, now, false), PromoCodeValidate::Valid(5f64));
        assert_eq!(
            check_promo_code(&promo, Some(&usage(1)), 100f64, now, false),
            PromoCodeValidate::PerUserLimitReached
        );

        promo.is_active = false;
        assert_eq!(check_promo_code(&promo, Some(&usage(1)), 10f64, now, false), PromoCodeValidate::Inactive);
    }

    #[test]
    fn failed_checks_carry_their_kind() {
        let err = PromoCodeValidate::PerUserLimitReached.into_discount().unwrap_err();
        match Error::kind_of(&err) {
            Some(Error::PerUserLimitReached) => {}
            other => panic!("unexpected kind {:?}", other),
        }

        let err = PromoCodeValidate::BelowMinimum(25f64).into_discount().unwrap_err();
        assert_eq!(Error::kind_of(&err).map(Error::code), Some(400));
        assert_eq!(PromoCodeValidate::Valid(12f64).into_discount().unwrap(), 12f64);
    }
}
