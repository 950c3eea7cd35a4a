pub mod auth;
pub mod client_ip;
pub mod config;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod newsletter;
pub mod rate_limit;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::crypto::SecretCipher;
use crate::email::MailerSource;
use crate::email::settings::SettingsMailerSource;
use crate::rate_limit::{DispatchLimiter, SubscribeRateLimiter};
use crate::state::{AppState, SharedState};

/// Application state with mail resolved from stored settings and the environment.
pub fn build_state(pool: PgPool, config: Config) -> Result<SharedState, String> {
    let cipher = SecretCipher::new(&config.encryption_key)?;
    let mailer = Arc::new(SettingsMailerSource::new(
        pool.clone(),
        config.clone(),
        cipher.clone(),
    ));
    Ok(assemble_state(pool, config, cipher, mailer))
}

/// Application state with a caller-chosen mail source.
pub fn build_state_with_mailer(
    pool: PgPool,
    config: Config,
    mailer: Arc<dyn MailerSource>,
) -> Result<SharedState, String> {
    let cipher = SecretCipher::new(&config.encryption_key)?;
    Ok(assemble_state(pool, config, cipher, mailer))
}

fn assemble_state(
    pool: PgPool,
    config: Config,
    cipher: SecretCipher,
    mailer: Arc<dyn MailerSource>,
) -> SharedState {
    let dispatch_limiter = DispatchLimiter::per_second(config.dispatch.rate_per_second);

    Arc::new(AppState {
        pool,
        config,
        cipher,
        mailer,
        dispatch_limiter,
        subscribe_limiter: SubscribeRateLimiter::default(),
    })
}

pub fn build_app(pool: PgPool, config: Config) -> Result<Router, String> {
    let state = build_state(pool, config)?;
    Ok(build_router(state))
}

pub fn build_router(state: SharedState) -> Router {
    let max_body_size = state.config.max_body_size;
    let cors = cors_layer(&state.config.app_url);

    Router::new()
        .merge(routes::public_routes().layer(cors))
        .merge(routes::admin_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

/// The site's own origin may call the public endpoints from the browser.
fn cors_layer(app_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match site_origin(app_url).and_then(|o| HeaderValue::from_str(&o).ok()) {
        // Other origins get no allow-origin header at all
        Some(site) => layer.allow_origin(AllowOrigin::predicate(move |origin, _| *origin == site)),
        None => {
            tracing::warn!("APP_URL has no usable origin; cross-origin requests are refused");
            layer
        }
    }
}

/// `scheme://host[:port]` of a URL, without path.
fn site_origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    if scheme.is_empty() || authority.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{authority}"))
}

async fn health() -> &'static str {
    "ok"
}
