use std::sync::Arc;
use std::time::Instant;

use crate::auth::provider::IdentityProvider;
use crate::auth::session::SessionVerifier;
use crate::auth::AuthGate;
use crate::config::AppConfig;
use crate::db::Store;
use crate::events::EventBus;
use crate::services::{BlogService, PromoCodeService, RedemptionService};

/// Everything the handlers share, built once by the composition root
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub events: EventBus,
    pub auth: Arc<AuthGate>,
    pub codes: Arc<PromoCodeService>,
    pub redemptions: Arc<RedemptionService>,
    pub blog: Arc<BlogService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let events = EventBus::new();

        let auth = AuthGate::new(
            store.clone(),
            SessionVerifier::new(&config.auth.jwt_secret),
            provider,
            events.clone(),
            config.auth.redirect_url.clone(),
        );

        Self {
            codes: Arc::new(PromoCodeService::new(
                store.clone(),
                events.clone(),
                config.promo_unit_price,
            )),
            redemptions: Arc::new(RedemptionService::new(store.clone(), events.clone())),
            blog: Arc::new(BlogService::new(store.clone(), events.clone())),
            auth: Arc::new(auth),
            config: Arc::new(config),
            store,
            events,
            started_at: Instant::now(),
        }
    }
}
