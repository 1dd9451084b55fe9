use uuid::Uuid;

use super::{CustomerContact, Order, OrderItem, PaymentStatus, Pricing, ShippingAddress};

// Shared fixtures for engine and API tests.

pub fn pricing(total: i64) -> Pricing {
    Pricing {
        items_price: total,
        packing_price: 0,
        gift_wrap_price: 0,
        shipping_price: 0,
        tax_price: 0,
        discount_price: 0,
        combo_discount: None,
        coupon_code: None,
        coupon_discount: 0,
        total_price: total,
    }
}

pub fn order(total: i64, tenant_id: Option<Uuid>) -> Order {
    Order::place(
        CustomerContact {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone: "+919900112233".into(),
        },
        ShippingAddress {
            address: "12 MG Road".into(),
            city: "Bengaluru".into(),
            postal_code: "560001".into(),
            country: "IN".into(),
        },
        vec![OrderItem {
            product_id: Uuid::new_v4(),
            name: "Handmade mug".into(),
            price: total,
            quantity: 1,
            size: None,
            gift_wrap: false,
            custom_photo: None,
        }],
        "card".into(),
        PaymentStatus::Paid,
        pricing(total),
        tenant_id,
        false,
    )
    .unwrap()
}
