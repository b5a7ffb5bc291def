use std::borrow::{Borrow, Cow};
use std::collections::HashMap;

use regex::Regex;
use validator::ValidationError;

use models::PromoCode;

pub fn validate_promo_code(code: &str) -> Result<(), ValidationError> {
    lazy_static! {
        static ref PROMO_CODE_VALIDATION_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
    }

    let code = code.trim();

    if code.is_empty() || code.chars().count() > PromoCode::MAX_CODE_LENGTH {
        return Err(ValidationError {
            code: Cow::from("length"),
            message: Some(Cow::from("Promo code must be between 1 and 50 characters.")),
            params: HashMap::new(),
        });
    }

    if PROMO_CODE_VALIDATION_RE.is_match(code) {
        Ok(())
    } else {
        Err(ValidationError {
            code: Cow::from("code"),
            message: Some(Cow::from("Promo code may contain only letters, digits, dash and underscore.")),
            params: HashMap::new(),
        })
    }
}

pub fn validate_non_negative<T: Borrow<f64>>(val: T) -> Result<(), ValidationError> {
    let val = *val.borrow();
    if val >= 0f64 && val.is_finite() {
        Ok(())
    } else {
        Err(ValidationError {
            code: Cow::from("value"),
            message: Some(Cow::from("Value must be non negative.")),
            params: HashMap::new(),
        })
    }
}

pub fn validate_positive_limit<T: Borrow<i32>>(val: T) -> Result<(), ValidationError> {
    if *val.borrow() >= 1 {
        Ok(())
    } else {
        Err(ValidationError {
            code: Cow::from("range"),
            message: Some(Cow::from("Limit must be at least 1.")),
            params: HashMap::new(),
        })
    }
}
