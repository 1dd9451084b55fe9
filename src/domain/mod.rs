pub mod order;
pub mod tenant;
