use std::net::IpAddr;
use std::time::Duration;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub admin_token: String,
    pub encryption_key: String,
    pub host: IpAddr,
    pub port: u16,
    pub app_url: String,
    pub environment: Environment,
    pub max_body_size: usize,
    pub trusted_proxies: Vec<IpNet>,
    pub log_level: String,
    pub mail: MailDefaults,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

/// Mail configuration used when no settings row is stored.
#[derive(Debug, Clone)]
pub struct MailDefaults {
    pub from: String,
    pub admin_email: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub ethereal: Option<EtherealConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct EtherealConfig {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub token_ttl: Option<chrono::Duration>,
    pub max_concurrency: usize,
    pub rate_per_second: u32,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            token_ttl: None,
            max_concurrency: 4,
            rate_per_second: 10,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let admin_token = env_required("ADMIN_API_TOKEN")?;
        let encryption_key = env_required("PORTFOLIO_ENCRYPTION_KEY")?;

        let host: IpAddr = env_or("PORTFOLIO_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid PORTFOLIO_HOST: {e}"))?;

        let port: u16 = env_or("PORTFOLIO_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid PORTFOLIO_PORT: {e}"))?;

        let app_url = std::env::var("APP_URL")
            .or_else(|_| std::env::var("NEXT_PUBLIC_APP_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let environment = parse_environment(&env_or("APP_ENV", "development"));

        let max_body_size: usize = env_or("PORTFOLIO_MAX_BODY_SIZE", "262144")
            .parse()
            .map_err(|e| format!("Invalid PORTFOLIO_MAX_BODY_SIZE: {e}"))?;

        let trusted_proxies = parse_cidrs(&env_or("PORTFOLIO_TRUSTED_PROXIES", ""))?;

        let log_level = env_or("PORTFOLIO_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("SMTP_HOST").ok(),
            std::env::var("SMTP_PORT").ok(),
            std::env::var("SMTP_USER").ok(),
            std::env::var("SMTP_PASS").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid SMTP_PORT: {e}"))?,
                user,
                pass,
            }),
            _ => None,
        };

        let ethereal = match (
            std::env::var("ETHEREAL_EMAIL").ok(),
            std::env::var("ETHEREAL_PASSWORD").ok(),
        ) {
            (Some(user), Some(pass)) => Some(EtherealConfig { user, pass }),
            _ => None,
        };

        let mail = MailDefaults {
            from: env_or("EMAIL_FROM", "Portfolio <noreply@localhost>"),
            admin_email: std::env::var("ADMIN_EMAIL").ok().filter(|s| !s.trim().is_empty()),
            smtp,
            ethereal,
        };

        let token_ttl = match std::env::var("NEWSLETTER_TOKEN_TTL_DAYS").ok() {
            Some(days) => {
                let days: i64 = days
                    .parse()
                    .map_err(|e| format!("Invalid NEWSLETTER_TOKEN_TTL_DAYS: {e}"))?;
                if days <= 0 {
                    return Err("NEWSLETTER_TOKEN_TTL_DAYS must be positive".to_string());
                }
                Some(chrono::Duration::days(days))
            }
            None => None,
        };

        let max_concurrency: usize = env_or("NEWSLETTER_MAX_CONCURRENCY", "4")
            .parse()
            .map_err(|e| format!("Invalid NEWSLETTER_MAX_CONCURRENCY: {e}"))?;
        let rate_per_second: u32 = env_or("NEWSLETTER_RATE_PER_SECOND", "10")
            .parse()
            .map_err(|e| format!("Invalid NEWSLETTER_RATE_PER_SECOND: {e}"))?;
        let max_retries: u32 = env_or("NEWSLETTER_MAX_RETRIES", "2")
            .parse()
            .map_err(|e| format!("Invalid NEWSLETTER_MAX_RETRIES: {e}"))?;
        let backoff_ms: u64 = env_or("NEWSLETTER_RETRY_BACKOFF_MS", "500")
            .parse()
            .map_err(|e| format!("Invalid NEWSLETTER_RETRY_BACKOFF_MS: {e}"))?;

        if max_concurrency == 0 || rate_per_second == 0 {
            return Err(
                "NEWSLETTER_MAX_CONCURRENCY and NEWSLETTER_RATE_PER_SECOND must be at least 1"
                    .to_string(),
            );
        }

        Ok(Config {
            database_url,
            admin_token,
            encryption_key,
            host,
            port,
            app_url: app_url.trim_end_matches('/').to_string(),
            environment,
            max_body_size,
            trusted_proxies,
            log_level,
            mail,
            dispatch: DispatchConfig {
                token_ttl,
                max_concurrency,
                rate_per_second,
                max_retries,
                retry_backoff: Duration::from_millis(backoff_ms),
            },
        })
    }
}

fn parse_environment(value: &str) -> Environment {
    match value.trim().to_ascii_lowercase().as_str() {
        "production" | "prod" => Environment::Production,
        _ => Environment::Development,
    }
}

fn parse_cidrs(value: &str) -> Result<Vec<IpNet>, String> {
    value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|e| format!("Invalid PORTFOLIO_TRUSTED_PROXIES entry '{s}': {e}"))
        })
        .collect()
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
