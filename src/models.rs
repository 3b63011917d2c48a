//! Row types shared across modules.
//!
//! Money is a whole-currency integer amount throughout; there is no
//! multi-currency support. View types that exist for a single endpoint
//! live next to their handler instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. The password hash is never selected into this
/// type; modules that verify credentials fetch the hash column directly.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Brand {
    pub id: i64,
    pub name: String,
    pub logo_url: Option<String>,
}

/// Catalog listing row. The effective unit price a buyer pays is
/// `our_price` when set, else `official_price`, else zero.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PhoneSummary {
    pub id: i64,
    pub model_name: String,
    pub brand_name: String,
    pub our_price: Option<i64>,
    pub official_price: Option<i64>,
    pub image_url: Option<String>,
}

/// Full spec sheet for the product page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PhoneDetail {
    pub id: i64,
    pub brand_name: String,
    pub model_name: String,
    pub release_date: Option<String>,
    pub official_price: Option<i64>,
    pub our_price: Option<i64>,
    pub display_size: Option<String>,
    pub resolution: Option<String>,
    pub weight: Option<String>,
    pub cpu: Option<String>,
    pub ram: Option<String>,
    pub storage: Option<String>,
    pub main_camera: Option<String>,
    pub front_camera: Option<String>,
    pub battery: Option<String>,
    pub os: Option<String>,
    pub image_url: Option<String>,
}

/// Order lifecycle. `cancelled` is reachable only while the order has not
/// shipped; `shipped` and `delivered` are terminal for cancellation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Paid | Self::Processing)
    }
}

/// An order record. Immutable after checkout except for `status` and the
/// timestamps that accompany status transitions.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Snapshot of one purchased line. Copies of the phone name, brand and
/// price are taken at checkout so later catalog edits never rewrite
/// purchase history. `subtotal == price * quantity` always holds.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub phone_id: i64,
    pub phone_name: String,
    pub brand_name: String,
    pub price: i64,
    pub quantity: i64,
    pub subtotal: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellable_states() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Paid.is_cancellable());
        assert!(OrderStatus::Processing.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(!OrderStatus::Delivered.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");
    }
}
