//! Model orders, only the columns the discount is written to
use models::{DiscountType, OrderId, UserId};
use schema::orders;

#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: f64,
    pub discount_code: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<f64>,
    pub discount_amount: Option<f64>,
    pub final_total: Option<f64>,
}

impl Order {
    pub fn is_discounted(&self) -> bool {
        self.discount_code.is_some()
    }
}

/// Discount written back to the order on redemption
#[derive(AsChangeset, Serialize, Debug, Clone, PartialEq)]
#[table_name = "orders"]
pub struct OrderDiscount {
    pub discount_code: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub discount_amount: f64,
    pub final_total: f64,
}
