pub mod settings;
pub mod templates;

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::stub::AsyncStubTransport;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use regex::Regex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum MailError {
    /// No usable transport, or the stored settings cannot be used.
    Config(String),
    Address(String),
    Build(String),
    /// Worth retrying: 4xx replies, timeouts.
    Transient(String),
    Permanent(String),
}

impl MailError {
    pub fn is_transient(&self) -> bool {
        matches!(self, MailError::Transient(_))
    }
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::Config(msg) => write!(f, "Mail configuration error: {msg}"),
            MailError::Address(msg) => write!(f, "Invalid address: {msg}"),
            MailError::Build(msg) => write!(f, "Failed to build email: {msg}"),
            MailError::Transient(msg) => write!(f, "Temporary delivery failure: {msg}"),
            MailError::Permanent(msg) => write!(f, "Delivery failed: {msg}"),
        }
    }
}

impl std::error::Error for MailError {}

/// Unencoded content of one outgoing email.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `message`, built from `mail`. Returns the server reply, if any.
    async fn deliver(&self, mail: &OutgoingMail, message: Message)
        -> Result<Option<String>, MailError>;
}

#[async_trait]
impl Transport for AsyncSmtpTransport<Tokio1Executor> {
    async fn deliver(
        &self,
        _mail: &OutgoingMail,
        message: Message,
    ) -> Result<Option<String>, MailError> {
        match AsyncTransport::send(self, message).await {
            Ok(response) => Ok(Some(
                response
                    .message()
                    .map(|line| line.to_string())
                    .collect::<Vec<String>>()
                    .join(" "),
            )),
            Err(e) if e.is_transient() || e.is_timeout() => {
                Err(MailError::Transient(e.to_string()))
            }
            Err(e) => Err(MailError::Permanent(e.to_string())),
        }
    }
}

/// Development sink: accepts everything and only logs.
#[async_trait]
impl Transport for AsyncStubTransport {
    async fn deliver(
        &self,
        mail: &OutgoingMail,
        message: Message,
    ) -> Result<Option<String>, MailError> {
        AsyncTransport::send(self, message)
            .await
            .map_err(|e| MailError::Permanent(e.to_string()))?;
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            "Mail transport not configured; message logged only"
        );
        Ok(None)
    }
}

static ETHEREAL_MSGID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MSGID=([^\s\]]+)").unwrap());

/// Web preview link for a message accepted by the Ethereal test SMTP service.
pub fn ethereal_preview_url(server_reply: &str) -> Option<String> {
    ETHEREAL_MSGID_RE
        .captures(server_reply)
        .map(|caps| format!("https://ethereal.email/message/{}", &caps[1]))
}

pub struct Mailer {
    transport: Arc<dyn Transport>,
    from: Mailbox,
    admin_email: Option<String>,
    preview: bool,
}

impl Mailer {
    pub fn new(transport: Arc<dyn Transport>, from: &str) -> Result<Self, MailError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| MailError::Config(format!("Invalid from address '{from}': {e}")))?;
        Ok(Self {
            transport,
            from,
            admin_email: None,
            preview: false,
        })
    }

    pub fn with_admin_email(mut self, admin_email: Option<String>) -> Self {
        self.admin_email = admin_email.filter(|a| !a.trim().is_empty());
        self
    }

    /// Log an Ethereal preview URL after each send.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }

    /// Send one email and return its `Message-ID`.
    pub async fn send(&self, mail: &OutgoingMail) -> Result<String, MailError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| MailError::Address(format!("{}: {e}", mail.to)))?;

        let message_id = format!("<{}@{}>", Uuid::now_v7(), self.from.email.domain());

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .message_id(Some(message_id.clone()))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html.clone()),
                    ),
            )
            .map_err(|e| MailError::Build(e.to_string()))?;

        let reply = self.transport.deliver(mail, message).await?;

        if self.preview {
            if let Some(url) = reply.as_deref().and_then(ethereal_preview_url) {
                tracing::info!(to = %mail.to, "Preview URL: {url}");
            }
        }

        Ok(message_id)
    }
}

/// Supplies the mailer to use for the next send.
#[async_trait]
pub trait MailerSource: Send + Sync {
    async fn mailer(&self) -> Result<Arc<Mailer>, MailError>;
}

/// A fixed mailer, independent of stored settings.
pub struct StaticMailer(pub Arc<Mailer>);

#[async_trait]
impl MailerSource for StaticMailer {
    async fn mailer(&self) -> Result<Arc<Mailer>, MailError> {
        Ok(self.0.clone())
    }
}

pub struct SmtpParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: &'a str,
    pub password: &'a str,
    pub tls_mode: &'a str,
}

pub fn build_smtp_transport(
    params: &SmtpParams<'_>,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let creds = Credentials::new(params.username.to_string(), params.password.to_string());

    let transport = match params.tls_mode {
        "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(params.host)
            .map_err(|e| MailError::Config(format!("SMTP relay error: {e}")))?
            .port(params.port)
            .credentials(creds)
            .build(),
        "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(params.host)
            .port(params.port)
            .credentials(creds)
            .build(),
        _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(params.host)
            .map_err(|e| MailError::Config(format!("SMTP starttls error: {e}")))?
            .port(params.port)
            .credentials(creds)
            .build(),
    };

    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutgoingMail>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn deliver(
            &self,
            mail: &OutgoingMail,
            _message: Message,
        ) -> Result<Option<String>, MailError> {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(Some("250 Accepted [STATUS=new MSGID=abc123]".to_string()))
        }
    }

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hello</p>".to_string(),
            text: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn send_returns_message_id_on_sender_domain() {
        let recorder = Arc::new(Recorder::default());
        let mailer = Mailer::new(recorder.clone(), "Portfolio <news@example.org>").unwrap();

        let id = mailer.send(&mail("reader@example.com")).await.unwrap();

        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.org>"));
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_recipient_is_an_address_error() {
        let mailer = Mailer::new(Arc::new(Recorder::default()), "news@example.org").unwrap();
        let err = mailer.send(&mail("not an address")).await.unwrap_err();
        assert!(matches!(err, MailError::Address(_)));
    }

    #[test]
    fn invalid_sender_is_a_config_error() {
        let err = Mailer::new(Arc::new(Recorder::default()), "nope").err().unwrap();
        assert!(matches!(err, MailError::Config(_)));
    }

    #[test]
    fn preview_url_from_ethereal_reply() {
        assert_eq!(
            ethereal_preview_url("2.0.0 Accepted [STATUS=new MSGID=Yx1.abc-Z]"),
            Some("https://ethereal.email/message/Yx1.abc-Z".to_string())
        );
        assert_eq!(ethereal_preview_url("2.0.0 OK queued"), None);
    }
}
