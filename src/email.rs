use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

/// Verification email dispatcher.
///
/// Dispatch failures are reported to the caller but never roll back an
/// already-persisted user record; resending is the recovery path.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, verification_token: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    /// Returns None when SMTP is not configured; the caller falls back to
    /// the logging mailer.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            host: std::env::var("SMTP_HOST").ok()?,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME").ok()?,
            password: std::env::var("SMTP_PASSWORD").ok()?,
            from: std::env::var("FROM_EMAIL").ok()?,
        })
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    base_url: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, base_url: String) -> anyhow::Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
            base_url,
        })
    }
}

fn verification_body(base_url: &str, token: &str) -> String {
    let link = format!("{}/users/verify/{}", base_url, token);
    format!(
        r#"<p>Your verification code: {}</p><a href="{}" target="_blank">Or click here</a>"#,
        token, link
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, verification_token: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject("Verification Mail")
            .header(ContentType::TEXT_HTML)
            .body(verification_body(&self.base_url, verification_token))?;

        self.transport.send(message).await?;
        info!(to = %to, "verification email sent");
        Ok(())
    }
}

/// Logging stand-in used when SMTP is unconfigured and in tests.
pub struct NoopMailer {
    pub base_url: String,
}

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_verification(&self, to: &str, verification_token: &str) -> anyhow::Result<()> {
        info!(
            to = %to,
            link = %format!("{}/users/verify/{}", self.base_url, verification_token),
            "verification email (noop mailer)"
        );
        Ok(())
    }
}
