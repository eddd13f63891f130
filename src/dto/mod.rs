pub mod cart;
pub mod checkout;
pub mod discounts;
pub mod notifications;
pub mod orders;
