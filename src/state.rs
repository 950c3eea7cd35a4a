use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::crypto::SecretCipher;
use crate::email::MailerSource;
use crate::rate_limit::{DispatchLimiter, SubscribeRateLimiter};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cipher: SecretCipher,
    pub mailer: Arc<dyn MailerSource>,
    pub dispatch_limiter: DispatchLimiter,
    pub subscribe_limiter: SubscribeRateLimiter,
}
