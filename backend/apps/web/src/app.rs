//! Router Assembly

use axum::Router;
use axum::http::{HeaderValue, header};
use identity::application::{ExternalProviders, IdentityServices, NoOpEmailSender};
use identity::{PgIdentityStore, identity_router};
use sqlx::PgPool;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::WebSettings;
use crate::health::health_router;

/// 30 days.
const HSTS_VALUE: &str = "max-age=2592000";

pub fn build_app(settings: &WebSettings, pool: PgPool) -> Router {
    let services = IdentityServices::new(
        PgIdentityStore::new(pool.clone()),
        settings.identity.clone(),
        NoOpEmailSender,
        ExternalProviders::new(settings.providers.clone()),
    );

    let mut app = identity_router(services);

    if settings.environment.is_development() {
        app = app.merge(health_router(pool));
    } else {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_VALUE),
        ));
    }

    app.layer(TraceLayer::new_for_http())
}
