use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Canonical fulfillment sequence. `Cancelled` is reachable from any
/// non-terminal status; `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Accepted,
    Processing,
    Packed,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The single legal next step for a tenant caller, or `None` from a
    /// terminal status.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Accepted),
            OrderStatus::Accepted => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Packed),
            OrderStatus::Packed => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::OutForDelivery),
            OrderStatus::OutForDelivery => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Processing => "Processing",
            OrderStatus::Packed => "Packed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "Pending" => Some(OrderStatus::Pending),
            "Accepted" => Some(OrderStatus::Accepted),
            "Processing" => Some(OrderStatus::Processing),
            "Packed" => Some(OrderStatus::Packed),
            "Shipped" => Some(OrderStatus::Shipped),
            "Out for Delivery" => Some(OrderStatus::OutForDelivery),
            "Delivered" => Some(OrderStatus::Delivered),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line item with name/price snapshotted at purchase time.
/// Immutable once the order is placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    /// Unit price in the smallest currency unit (paise).
    pub price: i64,
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub gift_wrap: bool,
    #[serde(default)]
    pub custom_photo: Option<String>,
}

/// Priced components of an order. All amounts are paise.
///
/// `total_price` is derived, never independently mutated; consistency is
/// validated at the API boundary and re-checked before the order is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub items_price: i64,
    #[serde(default)]
    pub packing_price: i64,
    #[serde(default)]
    pub gift_wrap_price: i64,
    #[serde(default)]
    pub shipping_price: i64,
    #[serde(default)]
    pub tax_price: i64,
    #[serde(default)]
    pub discount_price: i64,
    #[serde(default)]
    pub combo_discount: Option<i64>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub coupon_discount: i64,
    pub total_price: i64,
}

impl Pricing {
    /// Sum of priced components minus discounts.
    pub fn computed_total(&self) -> i64 {
        self.items_price
            + self.packing_price
            + self.gift_wrap_price
            + self.shipping_price
            + self.tax_price
            - self.discount_price
            - self.combo_discount.unwrap_or(0)
            - self.coupon_discount
    }

    pub fn is_consistent(&self) -> bool {
        self.total_price == self.computed_total()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

// ============================================================================
// Unit Tests
// ============================================================================
