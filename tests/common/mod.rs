use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lettre::Message;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use portfolio_newsletter::config::{Config, DispatchConfig, Environment, MailDefaults};
use portfolio_newsletter::email::{MailError, Mailer, OutgoingMail, StaticMailer, Transport};

pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";
pub const ADMIN_EMAIL: &str = "owner@test.com";
pub const APP_URL: &str = "https://portfolio.test";

/// Captures every outgoing mail; addresses in `failing` are rejected permanently.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutgoingMail> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }

    pub fn fail_for(&self, to: &str) {
        self.failing.lock().unwrap().insert(to.to_string());
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(
        &self,
        mail: &OutgoingMail,
        _message: Message,
    ) -> Result<Option<String>, MailError> {
        if self.failing.lock().unwrap().contains(&mail.to) {
            return Err(MailError::Permanent(format!("550 mailbox unavailable: {}", mail.to)));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(Some("250 OK".to_string()))
    }
}

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub mail: Arc<RecordingTransport>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Subscribe `email` with optional preference flags, return (body, status).
    pub async fn subscribe(&self, email: &str, preferences: Option<Value>) -> (Value, StatusCode) {
        let mut body = json!({ "email": email });
        if let Some(p) = preferences {
            body["preferences"] = p;
        }
        self.post("/api/newsletter/subscribe", &body).await
    }

    /// Token currently stored for `email`.
    pub async fn token_for(&self, email: &str) -> String {
        sqlx::query_scalar::<_, String>("SELECT token FROM subscribers WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("subscriber token lookup failed")
    }

    /// Subscribe and confirm, return the subscriber's token.
    pub async fn confirmed_subscriber(&self, email: &str, preferences: Option<Value>) -> String {
        let (body, status) = self.subscribe(email, preferences).await;
        assert_eq!(status, StatusCode::CREATED, "subscribe failed: {body}");

        let token = self.token_for(email).await;
        let (body, status) = self
            .post(&format!("/api/newsletter/confirm?token={token}"), &json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "confirm failed: {body}");
        token
    }

    /// Create a content record through the admin API, return its JSON.
    pub async fn create_content(&self, kind: &str, body: &Value) -> Value {
        let (body, status) = self.post_admin(&format!("/api/admin/{kind}"), body).await;
        assert_eq!(status, StatusCode::CREATED, "create {kind} failed: {body}");
        body
    }

    /// Unauthenticated GET.
    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Unauthenticated POST with JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get_admin(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .expect("admin get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_admin(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .json(body)
            .send()
            .await
            .expect("admin post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_admin(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .json(body)
            .send()
            .await
            .expect("admin put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete_admin(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .expect("admin delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

pub fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        admin_token: ADMIN_TOKEN.to_string(),
        encryption_key: "test-encryption-key-32-chars-ok!".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        app_url: APP_URL.to_string(),
        environment: Environment::Development,
        max_body_size: 1_048_576,
        trusted_proxies: vec![],
        log_level: "warn".to_string(),
        mail: MailDefaults {
            from: "Portfolio <news@portfolio.test>".to_string(),
            admin_email: Some(ADMIN_EMAIL.to_string()),
            smtp: None,
            ethereal: None,
        },
        dispatch: DispatchConfig {
            token_ttl: None,
            max_concurrency: 4,
            rate_per_second: 1000,
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
        },
    }
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Spawn a test app, adjusting the config before the server starts.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    // Create a unique test database
    let db_name = format!("portfolio_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    // Connect to default postgres DB to create test DB
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    // Connect to test DB and run migrations
    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let mut config = test_config(test_url);
    configure(&mut config);

    let mail = Arc::new(RecordingTransport::default());
    let mailer = Mailer::new(mail.clone(), &config.mail.from)
        .expect("test mailer")
        .with_admin_email(config.mail.admin_email.clone());

    let state = portfolio_newsletter::build_state_with_mailer(
        pool.clone(),
        config,
        Arc::new(StaticMailer(Arc::new(mailer))),
    )
    .expect("Failed to build state");
    let app = portfolio_newsletter::build_router(state);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        mail,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
