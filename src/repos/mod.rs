//! Repos is a module responsible for interacting with postgres db
#[macro_use]
pub mod acl;
pub mod orders;
pub mod promo_codes;
pub mod repo_factory;
pub mod types;

pub use self::acl::legacy_acl;
pub use self::acl::*;
pub use self::orders::*;
pub use self::promo_codes::*;
pub use self::repo_factory::*;
pub use self::types::*;
