use std::{sync::Arc, time::Duration};

use anyhow::Context;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    notifications::{
        AccessTokenSource, Dispatcher, FcmGateway, Notifier, PushGateway,
        ServiceAccountTokenSource, UnconfiguredTokenSource,
    },
    repositories::{
        CartStore, DeviceTokenStore, DiscountStore, OrderStore, PgCartStore, PgCatalog,
        PgDeviceTokenStore, PgDiscountStore, PgOrderStore,
    },
    services::{cart_service::CartService, checkout_service::CheckoutService},
};

const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub discounts: Arc<dyn DiscountStore>,
    pub orders: Arc<dyn OrderStore>,
    pub device_tokens: Arc<dyn DeviceTokenStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Wires the Postgres stores and the push dispatcher. Without an FCM
    /// service account every dispatch that has targets fails with a
    /// credential error, which checkout logs and ignores.
    pub fn build(pool: DbPool, orm: OrmConn, config: AppConfig) -> anyhow::Result<Self> {
        let carts: Arc<dyn CartStore> = Arc::new(PgCartStore::new(pool.clone()));
        let discounts: Arc<dyn DiscountStore> = Arc::new(PgDiscountStore::new(orm.clone()));
        let orders: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(orm.clone()));
        let device_tokens: Arc<dyn DeviceTokenStore> =
            Arc::new(PgDeviceTokenStore::new(orm.clone()));

        let http = reqwest::Client::builder()
            .timeout(PUSH_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let (credentials, gateway): (Arc<dyn AccessTokenSource>, Arc<dyn PushGateway>) =
            match &config.fcm {
                Some(fcm) => {
                    tracing::info!(project = %fcm.project_id, "push notifications enabled");
                    (
                        Arc::new(ServiceAccountTokenSource::new(http.clone(), fcm)),
                        Arc::new(FcmGateway::new(http, &fcm.project_id)),
                    )
                }
                None => {
                    tracing::warn!("FCM service account not configured, push notifications disabled");
                    (
                        Arc::new(UnconfiguredTokenSource),
                        Arc::new(FcmGateway::new(http, "unconfigured")),
                    )
                }
            };

        let notifier: Arc<dyn Notifier> = Arc::new(Dispatcher::new(
            device_tokens.clone(),
            credentials,
            gateway,
        ));

        let checkout = CheckoutService::new(
            carts.clone(),
            discounts.clone(),
            orders.clone(),
            notifier.clone(),
            config.pricing,
            config.storefront_url.clone(),
        );

        Ok(Self {
            carts: CartService::new(carts, Arc::new(PgCatalog::new(orm.clone()))),
            checkout,
            discounts,
            orders,
            device_tokens,
            notifier,
            pool,
            orm,
            config: Arc::new(config),
        })
    }
}
