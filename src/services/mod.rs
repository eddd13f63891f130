pub mod cart_service;
pub mod checkout_service;
pub mod discount_service;
pub mod notification_service;
pub mod order_service;
pub mod promo_service;
