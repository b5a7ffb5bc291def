//! Model promo_code_usages
use std::time::SystemTime;

use models::{PromoCodeId, UserId};
use schema::promo_code_usages;

/// How many times a user redeemed a promo code
#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq)]
pub struct PromoCodeUsage {
    pub promo_code_id: PromoCodeId,
    pub user_id: UserId,
    pub count: i32,
    pub used_at: SystemTime,
}

/// First redemption of a promo code by a user
#[derive(Insertable, Debug, Clone)]
#[table_name = "promo_code_usages"]
pub struct NewPromoCodeUsage {
    pub promo_code_id: PromoCodeId,
    pub user_id: UserId,
    pub count: i32,
    pub used_at: SystemTime,
}

impl NewPromoCodeUsage {
    pub fn first(promo_code_id: PromoCodeId, user_id: UserId, used_at: SystemTime) -> Self {
        Self {
            promo_code_id,
            user_id,
            count: 1,
            used_at,
        }
    }
}
