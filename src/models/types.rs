//! Identifier newtypes and enums stored in the database
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::{Integer, VarChar};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsExpression, FromSqlRow)]
        #[sql_type = "Integer"]
        pub struct $name(pub i32);

        impl ToSql<Integer, Pg> for $name {
            fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
                ToSql::<Integer, Pg>::to_sql(&self.0, out)
            }
        }

        impl FromSql<Integer, Pg> for $name {
            fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
                FromSql::<Integer, Pg>::from_sql(bytes).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PromoCodeId);
id_newtype!(UserId);
id_newtype!(OrderId);

/// How `discount_value` of a promo code is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// Share of the order amount, 0..100
    Percentage,
    /// Flat currency amount
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match *self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            other => Err(format!("Unrecognized discount type: {}", other)),
        }
    }
}

impl ToSql<VarChar, Pg> for DiscountType {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        ToSql::<VarChar, Pg>::to_sql(self.as_str(), out)
    }
}

impl FromSql<VarChar, Pg> for DiscountType {
    fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
        let value: String = FromSql::<VarChar, Pg>::from_sql(bytes)?;
        value.parse::<DiscountType>().map_err(From::from)
    }
}
