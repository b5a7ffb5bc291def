//! Enum for resources available in ACLs
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resource {
    PromoCodes,
    PromoCodeUsages,
    Orders,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Resource::PromoCodes => write!(f, "promo codes"),
            Resource::PromoCodeUsages => write!(f, "promo code usages"),
            Resource::Orders => write!(f, "orders"),
        }
    }
}
