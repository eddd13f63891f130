pub mod device_tokens;
pub mod discount_codes;
pub mod orders;
pub mod products;
pub mod users;

pub use device_tokens::Entity as DeviceTokens;
pub use discount_codes::Entity as DiscountCodes;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use users::Entity as Users;
