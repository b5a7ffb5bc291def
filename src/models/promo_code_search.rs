//! Admin listing, bulk operations and reporting over promo codes
use std::time::SystemTime;

use validator::Validate;

use models::{DiscountType, PromoCode, PromoCodeId};

/// Lifecycle state a promo code is in at a given moment
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromoCodeStatus {
    Active,
    Inactive,
    Expired,
    Upcoming,
}

impl PromoCodeStatus {
    pub fn matches(&self, promo: &PromoCode, now: SystemTime) -> bool {
        match *self {
            PromoCodeStatus::Active => promo.is_active && promo.start_date <= now && promo.end_date >= now,
            PromoCodeStatus::Inactive => !promo.is_active,
            PromoCodeStatus::Expired => promo.end_date < now,
            PromoCodeStatus::Upcoming => promo.start_date > now,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromoCodesSortBy {
    CreatedAt,
    Code,
    UsedCount,
    EndDate,
}

impl Default for PromoCodesSortBy {
    fn default() -> Self {
        PromoCodesSortBy::CreatedAt
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// Search terms of the admin listing
#[derive(Serialize, Deserialize, Clone, Debug, Validate)]
pub struct PromoCodesSearchTerms {
    /// Substring of code or description, case insensitive
    pub search: Option<String>,
    pub status: Option<PromoCodeStatus>,
    pub discount_type: Option<DiscountType>,
    #[serde(default)]
    pub sort_by: PromoCodesSortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_page")]
    #[validate(range(min = "1", max = "1000000"))]
    pub page: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = "1", max = "100"))]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

impl Default for PromoCodesSearchTerms {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            discount_type: None,
            sort_by: PromoCodesSortBy::default(),
            sort_order: SortOrder::default(),
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PromoCodesSearchTerms {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Search text wrapped for `ILIKE`, `None` when blank. Wildcards typed by the user match literally.
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_ref()
            .map(|search| search.trim())
            .filter(|search| !search.is_empty())
            .map(|search| {
                let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
                format!("%{}%", escaped)
            })
    }

    /// In-memory counterpart of the filters the repo applies in SQL
    pub fn matches(&self, promo: &PromoCode, now: SystemTime) -> bool {
        let search_matches = match self.search.as_ref().map(|search| search.trim().to_lowercase()) {
            Some(ref search) if !search.is_empty() => {
                promo.code.to_lowercase().contains(search.as_str()) || promo.description.to_lowercase().contains(search.as_str())
            }
            _ => true,
        };
        let status_matches = self.status.map(|status| status.matches(promo, now)).unwrap_or(true);
        let type_matches = self
            .discount_type
            .map(|discount_type| discount_type == promo.discount_type)
            .unwrap_or(true);

        search_matches && status_matches && type_matches
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self { page, limit, total, pages }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PromoCodesPage {
    pub promo_codes: Vec<PromoCode>,
    pub pagination: Pagination,
}

#[derive(Serialize, Deserialize, Clone, Debug, Validate)]
pub struct BulkPromoCodesPayload {
    #[validate(length(min = "1"))]
    pub ids: Vec<PromoCodeId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Validate)]
pub struct BulkStatusPayload {
    #[validate(length(min = "1"))]
    pub ids: Vec<PromoCodeId>,
    pub is_active: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TopPromoCode {
    pub code: String,
    pub used_count: i32,
    pub discount_type: DiscountType,
    pub discount_value: f64,
}

impl<'a> From<&'a PromoCode> for TopPromoCode {
    fn from(promo: &'a PromoCode) -> Self {
        Self {
            code: promo.code.clone(),
            used_count: promo.used_count,
            discount_type: promo.discount_type,
            discount_value: promo.discount_value,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromoCodesStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
    pub upcoming: i64,
    pub total_usage: i64,
    pub total_discount: f64,
    pub top_promo_codes: Vec<TopPromoCode>,
}
