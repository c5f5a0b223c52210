use crate::error::{MailError, NotifyError};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::PoolConfig;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use shared::{EmailConfig, ObserverLocation, Recipient};
use std::future::Future;
use tracing::{info, instrument, warn};

pub const ALERT_SUBJECT: &str = "ISS Tracker Alert";

/// Mail submission seam: one authenticated session, then one `send` per message.
pub trait Mailer {
    fn open(&self) -> impl Future<Output = Result<(), MailError>> + Send;
    fn send(&self, message: Message) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// SMTP over implicit TLS with password authentication.
///
/// Every `send` goes through a pool capped at one connection, so all the
/// alerts of a round share one authenticated TLS session. `open` is a
/// preflight on its own short-lived connection (connect, TLS, AUTH, QUIT)
/// so a rejected login fails the round once instead of once per recipient.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.sender.clone(),
                config.password.expose().to_owned(),
            ))
            .pool_config(PoolConfig::new().max_size(1))
            .build();
        Ok(Self { transport })
    }
}

impl Mailer for SmtpMailer {
    async fn open(&self) -> Result<(), MailError> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            Err(MailError::Unavailable)
        }
    }

    async fn send(&self, message: Message) -> Result<(), MailError> {
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Outcome of one notification round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Notifier<M> {
    mailer: M,
    sender: String,
    recipients: Vec<Recipient>,
    observer: ObserverLocation,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(
        mailer: M,
        sender: impl Into<String>,
        recipients: Vec<Recipient>,
        observer: ObserverLocation,
    ) -> Self {
        Self {
            mailer,
            sender: sender.into(),
            recipients,
            observer,
        }
    }

    /// Sends one alert to every recipient over a single session.
    ///
    /// A recipient that cannot be addressed or is rejected is recorded in
    /// the report and the remaining recipients are still attempted.
    #[instrument(skip(self), fields(recipients = self.recipients.len()))]
    pub async fn notify(&self) -> Result<NotifyReport, NotifyError> {
        let from = self
            .sender
            .parse::<Address>()
            .map(|address| Mailbox::new(None, address))
            .map_err(NotifyError::Sender)?;

        self.mailer.open().await.map_err(NotifyError::Session)?;

        let mut report = NotifyReport::default();
        for recipient in &self.recipients {
            let result = match alert_message(from.clone(), recipient, self.observer) {
                Ok(message) => self.mailer.send(message).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    info!(recipient = %recipient.email, "sent ISS alert");
                    report.delivered.push(recipient.email.clone());
                }
                Err(e) => {
                    warn!(error = ?e, recipient = %recipient.email, "failed to send ISS alert");
                    report.failed.push(recipient.email.clone());
                }
            }
        }

        Ok(report)
    }
}

pub fn alert_body(name: &str, observer: ObserverLocation) -> String {
    format!(
        "Dear {name},\n\n\
         The International Space Station is currently over your location.\n\
         Latitude: {}, Longitude: {}\n\n\
         Look up at the sky to catch a glimpse of it!",
        observer.latitude, observer.longitude
    )
}

fn alert_message(
    from: Mailbox,
    recipient: &Recipient,
    observer: ObserverLocation,
) -> Result<Message, MailError> {
    let to = Mailbox::new(Some(recipient.name.clone()), recipient.email.parse()?);
    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(ALERT_SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(alert_body(&recipient.name, observer))?)
}
