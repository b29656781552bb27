use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use crate::{
    config::SmtpConfig,
    users::{Role, User},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl WelcomeMessage {
    pub fn registered(user: &User) -> Self {
        let body = match user.role {
            Role::Patient => format!(
                "Welcome {}, thanks for joining!",
                user.display_name.as_deref().unwrap_or(&user.email)
            ),
            role => format!(
                "Welcome {role} {}, your account has been created successfully!",
                user.email
            ),
        };
        Self {
            to: user.email.clone(),
            subject: "Welcome to the Platform".into(),
            body,
        }
    }

    pub fn federated(user: &User) -> Self {
        Self {
            to: user.email.clone(),
            subject: "Welcome to AyurSutra".into(),
            body: format!(
                "Welcome {}, thanks for joining with Google!",
                user.display_name.as_deref().unwrap_or(&user.email)
            ),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &WelcomeMessage) -> anyhow::Result<()>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .with_context(|| format!("smtp relay {}", config.host))?
            .port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let from = config
            .from
            .parse()
            .with_context(|| format!("invalid SMTP_FROM address {}", config.from))?;
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &WelcomeMessage) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message.to.parse().context("invalid recipient address")?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("build email")?;
        self.transport.send(email).await.context("smtp send")?;
        Ok(())
    }
}

/// Used when no SMTP server is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &WelcomeMessage) -> anyhow::Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "smtp not configured; welcome email skipped"
        );
        Ok(())
    }
}

/// Sends in the background. Failures are logged and never reach the caller.
pub fn spawn_welcome(notifier: Arc<dyn Notifier>, message: WelcomeMessage) {
    tokio::spawn(async move {
        match notifier.send(&message).await {
            Ok(()) => info!(to = %message.to, "welcome email sent"),
            Err(e) => error!(to = %message.to, error = ?e, "welcome email failed"),
        }
    });
}
