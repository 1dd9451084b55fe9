mod entity;
mod errors;
mod notification;
mod routing;
#[cfg(test)]
pub mod testing;
mod value_objects;

pub use entity::Order;
pub use errors::OrderError;
pub use notification::{dedup_key, NotificationOutcome, NotificationRecord, NotifyChannel};
pub use routing::{AssignmentClaim, ClaimOutcome};
pub use value_objects::{
    CustomerContact, OrderItem, OrderStatus, PaymentStatus, Pricing, ShippingAddress,
};
