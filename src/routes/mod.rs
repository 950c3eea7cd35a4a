pub mod careers;
pub mod certificates;
pub mod email_settings;
pub mod newsletter;
pub mod newsletters;
pub mod projects;
pub mod skills;
pub mod subscribers;

use axum::Router;
use axum::routing::{delete, get, post};
use serde::Serialize;

use crate::newsletter::DispatchReport;
use crate::state::SharedState;

/// A newly created record, plus the dispatch report when subscribers were notified.
#[derive(Serialize)]
pub struct Created<T> {
    #[serde(flatten)]
    pub record: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newsletter: Option<DispatchReport>,
}

/// Endpoints reached from the site and from links inside emails.
pub fn public_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/newsletter/subscribe", post(newsletter::subscribe))
        .route(
            "/api/newsletter/confirm",
            get(newsletter::confirm_link).post(newsletter::confirm),
        )
        .route("/api/newsletter/verify", get(newsletter::verify))
        .route("/api/newsletter/preferences", post(newsletter::update_preferences))
        .route("/api/newsletter/unsubscribe", post(newsletter::unsubscribe))
}

pub fn admin_routes() -> Router<SharedState> {
    Router::new()
        // Subscribers
        .route("/api/admin/subscribers", get(subscribers::list))
        .route("/api/admin/subscribers/{id}", delete(subscribers::delete))
        .route(
            "/api/admin/subscribers/{id}/rotate-token",
            post(subscribers::rotate_token),
        )
        // Newsletters
        .route(
            "/api/admin/newsletters",
            get(newsletters::list).post(newsletters::send),
        )
        .route("/api/admin/newsletters/{id}", get(newsletters::get))
        .route(
            "/api/admin/newsletters/preview/{kind}/{id}",
            get(newsletters::preview),
        )
        .route(
            "/api/admin/newsletters/notify/{kind}/{id}",
            post(newsletters::notify),
        )
        // Content
        .route(
            "/api/admin/projects",
            get(projects::list).post(projects::create),
        )
        .route(
            "/api/admin/projects/{id}",
            get(projects::get).delete(projects::delete),
        )
        .route(
            "/api/admin/certificates",
            get(certificates::list).post(certificates::create),
        )
        .route(
            "/api/admin/certificates/{id}",
            get(certificates::get).delete(certificates::delete),
        )
        .route("/api/admin/skills", get(skills::list).post(skills::create))
        .route(
            "/api/admin/skills/{id}",
            get(skills::get).delete(skills::delete),
        )
        .route(
            "/api/admin/careers",
            get(careers::list).post(careers::create),
        )
        .route(
            "/api/admin/careers/{id}",
            get(careers::get).delete(careers::delete),
        )
        // Email settings
        .route(
            "/api/admin/email-settings",
            get(email_settings::get)
                .put(email_settings::update)
                .delete(email_settings::delete),
        )
        .route("/api/admin/email-settings/test", post(email_settings::test))
}
