//! Model promo_codes
use std::time::SystemTime;

use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError};

use models::validation_rules::*;
use models::{DiscountType, PromoCodeId, PromoCodeUsage, UserId};
use schema::promo_codes;

/// DB presenting by promo code
#[derive(Debug, Serialize, Deserialize, Queryable, Identifiable, Clone, PartialEq)]
#[table_name = "promo_codes"]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub min_order_amount: f64,
    pub max_discount: Option<f64>,
    pub start_date: SystemTime,
    pub end_date: SystemTime,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub per_user_limit: i32,
    pub first_time_only: bool,
    pub is_active: bool,
    pub created_by: UserId,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl PromoCode {
    pub const MAX_CODE_LENGTH: usize = 50;
    pub const GENERATED_CODE_LENGTH: usize = 8;

    /// Codes are compared trimmed and upper-cased
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }
}

/// Payload for creating promo code
#[derive(Serialize, Deserialize, Clone, Validate, Debug)]
#[validate(schema(function = "validate_new_promo_code"))]
pub struct NewPromoCode {
    #[validate(custom = "validate_promo_code")]
    pub code: String,
    #[serde(default)]
    #[validate(length(max = "200"))]
    pub description: String,
    pub discount_type: DiscountType,
    #[validate(custom = "validate_non_negative")]
    pub discount_value: f64,
    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub min_order_amount: f64,
    #[validate(custom = "validate_non_negative")]
    pub max_discount: Option<f64>,
    pub start_date: SystemTime,
    pub end_date: SystemTime,
    #[validate(custom = "validate_positive_limit")]
    pub usage_limit: Option<i32>,
    #[serde(default = "default_per_user_limit")]
    #[validate(custom = "validate_positive_limit")]
    pub per_user_limit: i32,
    #[serde(default)]
    pub first_time_only: bool,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_per_user_limit() -> i32 {
    1
}

fn default_is_active() -> bool {
    true
}

fn validate_new_promo_code(payload: &NewPromoCode) -> Result<(), ValidationError> {
    validate_dates(payload.start_date, payload.end_date)
}

/// `end_date` must be strictly after `start_date`
pub fn validate_dates(start_date: SystemTime, end_date: SystemTime) -> Result<(), ValidationError> {
    if end_date > start_date {
        Ok(())
    } else {
        let mut error = ValidationError::new("dates");
        error.message = Some("End date must be after start date".into());
        Err(error)
    }
}

/// Insertable row, built from `NewPromoCode` by the repo
#[derive(Insertable, Debug, Clone)]
#[table_name = "promo_codes"]
pub struct DbNewPromoCode {
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub min_order_amount: f64,
    pub max_discount: Option<f64>,
    pub start_date: SystemTime,
    pub end_date: SystemTime,
    pub usage_limit: Option<i32>,
    pub per_user_limit: i32,
    pub first_time_only: bool,
    pub is_active: bool,
    pub created_by: UserId,
}

impl DbNewPromoCode {
    pub fn new(payload: NewPromoCode, created_by: UserId) -> Self {
        Self {
            code: PromoCode::normalize_code(&payload.code),
            description: payload.description.trim().to_string(),
            discount_type: payload.discount_type,
            discount_value: payload.discount_value,
            min_order_amount: payload.min_order_amount,
            max_discount: payload.max_discount,
            start_date: payload.start_date,
            end_date: payload.end_date,
            usage_limit: payload.usage_limit,
            per_user_limit: payload.per_user_limit,
            first_time_only: payload.first_time_only,
            is_active: payload.is_active,
            created_by,
        }
    }
}

/// Payload for updating promo code. Nullable columns take `Some(None)` to be cleared.
#[derive(Serialize, Deserialize, AsChangeset, Validate, Debug, Clone, Default)]
#[table_name = "promo_codes"]
#[validate(schema(function = "validate_update_promo_code"))]
pub struct UpdatePromoCode {
    #[validate(custom = "validate_promo_code")]
    pub code: Option<String>,
    #[validate(length(max = "200"))]
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    #[validate(custom = "validate_non_negative")]
    pub discount_value: Option<f64>,
    #[validate(custom = "validate_non_negative")]
    pub min_order_amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub max_discount: Option<Option<f64>>,
    pub start_date: Option<SystemTime>,
    pub end_date: Option<SystemTime>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub usage_limit: Option<Option<i32>>,
    #[validate(custom = "validate_positive_limit")]
    pub per_user_limit: Option<i32>,
    pub first_time_only: Option<bool>,
    pub is_active: Option<bool>,
}

fn validate_update_promo_code(payload: &UpdatePromoCode) -> Result<(), ValidationError> {
    if let Some(Some(max_discount)) = payload.max_discount {
        validate_non_negative(max_discount)?;
    }
    if let Some(Some(usage_limit)) = payload.usage_limit {
        validate_positive_limit(usage_limit)?;
    }
    if let (Some(start_date), Some(end_date)) = (payload.start_date, payload.end_date) {
        validate_dates(start_date, end_date)?;
    }
    Ok(())
}

impl UpdatePromoCode {
    /// Normalizes the code the same way creation does
    pub fn normalized(mut self) -> Self {
        self.code = self.code.map(|code| PromoCode::normalize_code(&code));
        self.description = self.description.map(|description| description.trim().to_string());
        self
    }

    /// Applies the update on top of `promo`, used to re-check the merged record
    pub fn merge_into(&self, promo: &PromoCode) -> PromoCode {
        let mut merged = promo.clone();
        if let Some(ref code) = self.code {
            merged.code = code.clone();
        }
        if let Some(ref description) = self.description {
            merged.description = description.clone();
        }
        if let Some(discount_type) = self.discount_type {
            merged.discount_type = discount_type;
        }
        if let Some(discount_value) = self.discount_value {
            merged.discount_value = discount_value;
        }
        if let Some(min_order_amount) = self.min_order_amount {
            merged.min_order_amount = min_order_amount;
        }
        if let Some(max_discount) = self.max_discount {
            merged.max_discount = max_discount;
        }
        if let Some(start_date) = self.start_date {
            merged.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            merged.end_date = end_date;
        }
        if let Some(usage_limit) = self.usage_limit {
            merged.usage_limit = usage_limit;
        }
        if let Some(per_user_limit) = self.per_user_limit {
            merged.per_user_limit = per_user_limit;
        }
        if let Some(first_time_only) = self.first_time_only {
            merged.first_time_only = first_time_only;
        }
        if let Some(is_active) = self.is_active {
            merged.is_active = is_active;
        }
        merged
    }
}

/// Distinguishes an explicit `null` from a missing field
fn deserialize_nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

/// Promo code with the usage records of its customers
#[derive(Serialize, Debug, Clone)]
pub struct PromoCodeWithUsages {
    #[serde(flatten)]
    pub promo_code: PromoCode,
    pub usages: Vec<PromoCodeUsage>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json;
    use validator::Validate;

    use super::*;

    fn new_promo_code() -> NewPromoCode {
        let now = SystemTime::now();
        NewPromoCode {
            code: "summer20".to_string(),
            description: "Summer sale".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 20f64,
            min_order_amount: 0f64,
            max_discount: Some(30f64),
            start_date: now,
            end_date: now + Duration::from_secs(3600),
            usage_limit: None,
            per_user_limit: 1,
            first_time_only: false,
            is_active: true,
        }
    }

    #[test]
    fn new_promo_code_requires_end_after_start() {
        let mut payload = new_promo_code();
        assert!(payload.validate().is_ok());
        payload.end_date = payload.start_date;
        assert!(payload.validate().is_err());
    }

    #[test]
    fn new_promo_code_rejects_negative_values() {
        let mut payload = new_promo_code();
        payload.discount_value = -1f64;
        assert!(payload.validate().is_err());

        let mut payload = new_promo_code();
        payload.usage_limit = Some(0);
        assert!(payload.validate().is_err());

        let mut payload = new_promo_code();
        payload.description = "d".repeat(201);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn db_row_is_normalized() {
        let mut payload = new_promo_code();
        payload.code = "  summer20 ".to_string();
        let row = DbNewPromoCode::new(payload, UserId(7));
        assert_eq!(row.code, "SUMMER20");
        assert_eq!(row.created_by, UserId(7));
    }

    #[test]
    fn update_tells_null_from_missing() {
        let update: UpdatePromoCode = serde_json::from_str(r#"{"max_discount": null}"#).unwrap();
        assert_eq!(update.max_discount, Some(None));
        assert_eq!(update.usage_limit, None);

        let update: UpdatePromoCode = serde_json::from_str(r#"{"usage_limit": 5}"#).unwrap();
        assert_eq!(update.usage_limit, Some(Some(5)));
    }

    #[test]
    fn update_checks_nested_values() {
        let update = UpdatePromoCode {
            usage_limit: Some(Some(0)),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = UpdatePromoCode {
            max_discount: Some(None),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }
}
