use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::AddToCartRequest,
        checkout::{CheckoutRequest, PromoCheck, PromoCheckRequest, Quote},
        discounts::{CreateDiscountRequest, DiscountList, UpdateDiscountRequest},
        notifications::{DispatchKind, DispatchRequest, PushConfig, RegisterTokenRequest},
        orders::OrderList,
    },
    error::ErrorData,
    models::{
        CartLine, Contact, DeviceToken, DiscountCode, DiscountKind, Order, OrderStatus,
        OrderTotals,
    },
    notifications::{DispatchReport, PushPayload, TokenDelivery},
    response::{ApiResponse, Meta},
    routes::{admin, cart, checkout, health, notifications, orders, params},
    services::{
        cart_service::CartView,
        checkout_service::{CheckoutState, FieldError, PlacedOrder},
        promo_service::PromoRejection,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::increment_line,
        cart::decrement_line,
        cart::remove_from_cart,
        cart::clear_cart,
        checkout::check_promo,
        checkout::quote,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        admin::list_all_orders,
        admin::list_discounts,
        admin::create_discount,
        admin::update_discount,
        notifications::register_token,
        notifications::dispatch,
        notifications::push_config
    ),
    components(
        schemas(
            CartLine,
            CartView,
            AddToCartRequest,
            DiscountKind,
            DiscountCode,
            DiscountList,
            CreateDiscountRequest,
            UpdateDiscountRequest,
            PromoRejection,
            PromoCheckRequest,
            PromoCheck,
            Quote,
            OrderTotals,
            OrderStatus,
            Contact,
            Order,
            OrderList,
            CheckoutRequest,
            CheckoutState,
            PlacedOrder,
            FieldError,
            ErrorData,
            DeviceToken,
            RegisterTokenRequest,
            DispatchKind,
            DispatchRequest,
            PushPayload,
            TokenDelivery,
            DispatchReport,
            PushConfig,
            params::Pagination,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<PlacedOrder>,
            ApiResponse<OrderList>,
            ApiResponse<DispatchReport>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Server-side cart"),
        (name = "Checkout", description = "Promo checks and order quotes"),
        (name = "Orders", description = "Order placement and history"),
        (name = "Admin", description = "Order overview and discount codes"),
        (name = "Notifications", description = "Web push registration and dispatch"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
