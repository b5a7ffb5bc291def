//! Payloads and results of promo code preview and redemption
use validator::Validate;

use models::validation_rules::*;
use models::{DiscountType, OrderId, PromoCode, PromoCodeId};

/// Preview of the discount a code gives for an order amount
#[derive(Serialize, Deserialize, Clone, Debug, Validate)]
pub struct ValidatePromoCodePayload {
    #[validate(length(min = "1"))]
    pub code: String,
    #[validate(custom = "validate_non_negative")]
    pub order_amount: f64,
}

/// Redemption of a code against an order of the caller
#[derive(Serialize, Deserialize, Clone, Debug, Validate)]
pub struct ApplyPromoCodePayload {
    #[validate(length(min = "1"))]
    pub code: String,
    pub order_id: OrderId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromoCodeDiscount {
    pub promo_code_id: PromoCodeId,
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub discount_amount: f64,
    pub max_discount: Option<f64>,
    pub min_order_amount: f64,
}

impl PromoCodeDiscount {
    pub fn new(promo: &PromoCode, discount_amount: f64) -> Self {
        Self {
            promo_code_id: promo.id,
            code: promo.code.clone(),
            description: promo.description.clone(),
            discount_type: promo.discount_type,
            discount_value: promo.discount_value,
            discount_amount,
            max_discount: promo.max_discount,
            min_order_amount: promo.min_order_amount,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RedeemedOrder {
    pub order_id: OrderId,
    pub promo_code: String,
    pub original_total: f64,
    pub discount_amount: f64,
    pub final_total: f64,
}
