use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::SharedState;

/// Caller presented the admin API token as a bearer credential.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser;

impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("Missing authentication token".to_string()))?;

        if token_matches(bearer.token(), &state.config.admin_token) {
            Ok(AdminUser)
        } else {
            tracing::warn!("Rejected admin request with invalid token");
            Err(AppError::Unauthorized("Invalid token".to_string()))
        }
    }
}

fn token_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
