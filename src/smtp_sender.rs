use crate::config::{AccountConfig, SmtpConfig};
use crate::error::MailError;
use crate::message::OutboundEmail;
use crate::traits::MailSender;
use async_trait::async_trait;
use lettre::Message;
use lettre::address::Envelope;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::response::{Category, Code, Severity};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use log::info;
use std::sync::Arc;
use std::time::Duration;

// Abstract the mailer so we can mock it
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmtpMailer: Send + Sync {
    async fn send(&self, envelope: Envelope, email: &[u8]) -> Result<(), MailError>;
}

// Wrapper for Real Lettre Transport
pub struct RealSmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

// 53x replies are authentication problems. Any other reply, or a client-side
// refusal after the server answered (e.g. no common AUTH mechanism), is protocol.
fn classify_smtp_failure(code: Option<Code>, server_answered: bool, detail: String) -> MailError {
    match code {
        Some(code)
            if code.severity == Severity::PermanentNegativeCompletion
                && code.category == Category::Unspecified3 =>
        {
            MailError::Authentication(detail)
        }
        Some(_) => MailError::Protocol(format!("SMTP send error: {}", detail)),
        None if server_answered => MailError::Protocol(format!("SMTP send error: {}", detail)),
        None => MailError::Connection(format!("SMTP send error: {}", detail)),
    }
}

fn smtp_error(e: lettre::transport::smtp::Error) -> MailError {
    let server_answered = e.is_permanent() || e.is_transient() || e.is_client();
    classify_smtp_failure(e.status(), server_answered, e.to_string())
}

#[async_trait]
impl SmtpMailer for RealSmtpMailer {
    async fn send(&self, envelope: Envelope, email: &[u8]) -> Result<(), MailError> {
        self.transport
            .send_raw(&envelope, email)
            .await
            .map_err(smtp_error)
            .map(|_| ())
    }
}

// Factory trait
#[cfg_attr(test, mockall::automock)]
pub trait SmtpMailerFactory: Send + Sync {
    fn create(
        &self,
        config: &SmtpConfig,
        account: &AccountConfig,
    ) -> Result<Box<dyn SmtpMailer>, MailError>;
}

pub struct RealSmtpMailerFactory {
    timeout: Option<Duration>,
}

impl SmtpMailerFactory for RealSmtpMailerFactory {
    fn create(
        &self,
        config: &SmtpConfig,
        account: &AccountConfig,
    ) -> Result<Box<dyn SmtpMailer>, MailError> {
        let creds = Credentials::new(account.address.clone(), account.password.clone());
        let tls_params = TlsParameters::new(config.host.clone())
            .map_err(|e| MailError::Connection(format!("Invalid TLS parameters: {}", e)))?;

        // Implicit TLS, no pool: every send opens and closes its own session
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailError::Connection(format!("Invalid SMTP host: {}", e)))?
            .port(config.port)
            .tls(Tls::Wrapper(tls_params))
            .credentials(creds);

        // keep lettre's own default unless one is configured
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(Some(timeout));
        }

        let transport = builder.build();

        Ok(Box::new(RealSmtpMailer { transport }))
    }
}

#[cfg(test)]
#[path = "./smtp_sender_tests.rs"]
mod smtp_sender_tests;

pub struct SmtpSender {
    config: SmtpConfig,
    account: AccountConfig,
    factory: Arc<dyn SmtpMailerFactory>,
}

impl SmtpSender {
    pub fn new(config: SmtpConfig, account: AccountConfig, timeout: Option<Duration>) -> Self {
        Self {
            config,
            account,
            factory: Arc::new(RealSmtpMailerFactory { timeout }),
        }
    }

    #[allow(dead_code)]
    pub fn new_with_factory(
        config: SmtpConfig,
        account: AccountConfig,
        factory: Arc<dyn SmtpMailerFactory>,
    ) -> Self {
        Self {
            config,
            account,
            factory,
        }
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, MailError> {
        let recipient = email.validate()?;

        let sender: Mailbox = self.account.address.parse().map_err(|e| {
            MailError::Validation(format!("Invalid sender address (account): {}", e))
        })?;

        Message::builder()
            .from(sender)
            .to(recipient)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| MailError::Validation(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send_email(&self, email: &OutboundEmail) -> Result<(), MailError> {
        // Rejected before any network round trip
        let message = self.build_message(email)?;

        let mailer = self.factory.create(&self.config, &self.account)?;
        mailer
            .send(message.envelope().clone(), &message.formatted())
            .await?;

        info!(
            "[{}] Email \"{}\" accepted for {} by {}:{}",
            self.account.address,
            email.subject,
            email.to.trim(),
            self.config.host,
            self.config.port
        );
        Ok(())
    }
}
