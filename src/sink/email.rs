use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Notification, Notifier};

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// Built from SMTP_HOST, SMTP_USER, SMTP_PASS, NOTIFY_EMAIL_FROM and
    /// NOTIFY_EMAIL_TO. `Ok(None)` when SMTP_HOST is unset; an error when it is
    /// set but the rest is missing or invalid.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let var = |k: &str| std::env::var(k).with_context(|| format!("{k} missing"));
        let user = var("SMTP_USER")?;
        let pass = var("SMTP_PASS")?;
        let from: Mailbox = var("NOTIFY_EMAIL_FROM")?
            .parse()
            .context("invalid NOTIFY_EMAIL_FROM")?;
        let to: Mailbox = var("NOTIFY_EMAIL_TO")?
            .parse()
            .context("invalid NOTIFY_EMAIL_TO")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(Credentials::new(user, pass))
            .build();

        Ok(Some(Self { mailer, from, to }))
    }
}

pub(crate) fn email_body(n: &Notification) -> String {
    format!("{}\n{}\n\n{}\n", n.message, n.subtitle, n.link)
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format!("{}: {}", n.title, n.message))
            .header(header::ContentType::TEXT_PLAIN)
            .body(email_body(n))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
