//! Models contains all structures that are used in different
//! modules of the app

pub mod authorization;
pub mod orders;
pub mod promo_code_search;
pub mod promo_code_usages;
pub mod promo_codes;
pub mod redemption;
pub mod types;
pub mod validation_rules;

pub use self::authorization::*;
pub use self::orders::*;
pub use self::promo_code_search::*;
pub use self::promo_code_usages::*;
pub use self::promo_codes::*;
pub use self::redemption::*;
pub use self::types::*;
pub use self::validation_rules::*;
