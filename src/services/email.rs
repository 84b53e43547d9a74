//! Outbound mail: the mailer interface, its SMTP implementation and the
//! templated messages the circulation flows send

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::NotificationPayload,
};

/// Hand-off point to a mail transport.
///
/// `send` returns once the message is accepted for delivery; a successful
/// return says nothing about the message reaching the recipient.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str, is_html: bool) -> AppResult<()>;
}

/// SMTP mailer; delivery runs on the blocking pool and is not awaited
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let from_name = config.smtp_from_name.as_deref().unwrap_or("Library");
        let from = Mailbox::from_str(&format!("{} <{}>", from_name, config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let builder = if config.smtp_use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str, is_html: bool) -> AppResult<()> {
        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Mail(format!("Invalid to address {}: {}", to, e)))?;

        let content_type = if is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        let email = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(content_type)
            .body(body.to_string())
            .map_err(|e| AppError::Mail(format!("Failed to build email: {}", e)))?;

        let transport = self.transport.clone();
        let recipient = to.to_string();
        tokio::task::spawn_blocking(move || match transport.send(&email) {
            Ok(_) => tracing::info!("Mail delivered to {}", recipient),
            Err(e) => tracing::warn!("Mail delivery to {} failed: {}", recipient, e),
        });

        Ok(())
    }
}

/// Messages the server knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTemplate {
    BookAvailable,
    ReturnReminder,
}

impl MailTemplate {
    pub fn subject(&self, payload: &NotificationPayload) -> String {
        match self {
            MailTemplate::BookAvailable => format!("\"{}\" is available", payload.book_title),
            MailTemplate::ReturnReminder => format!("\"{}\" is due soon", payload.book_title),
        }
    }

    pub fn render(&self, payload: &NotificationPayload, base_url: &str) -> String {
        match self {
            MailTemplate::BookAvailable => format!(
                "<html><body>\
                 <p>Dear {username},</p>\
                 <p>The book <b>{title}</b> you were waiting for is available again.</p>\
                 <p><a href=\"{url}\">Reserve it now</a> before someone else does.</p>\
                 </body></html>",
                username = payload.username,
                title = payload.book_title,
                url = base_url,
            ),
            MailTemplate::ReturnReminder => format!(
                "<html><body>\
                 <p>Dear {username},</p>\
                 <p>Your checkout of <b>{title}</b> is due soon. Please return or renew it.</p>\
                 <p><a href=\"{url}\">Manage your checkouts</a></p>\
                 </body></html>",
                username = payload.username,
                title = payload.book_title,
                url = base_url,
            ),
        }
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, base_url: impl Into<String>) -> Self {
        Self {
            mailer,
            base_url: base_url.into(),
        }
    }

    /// Send a raw message
    pub async fn send(&self, to: &str, subject: &str, body: &str, is_html: bool) -> AppResult<()> {
        self.mailer.send(to, subject, body, is_html).await
    }

    /// Render a template for the payload and hand it to the mailer.
    ///
    /// Payloads without an address are skipped.
    pub async fn send_template(&self, template: MailTemplate, payload: &NotificationPayload) -> AppResult<()> {
        let Some(to) = payload.email.as_deref() else {
            tracing::debug!("{} has no email address, skipping {:?}", payload.username, template);
            return Ok(());
        };
        let subject = template.subject(payload);
        let body = template.render(payload, &self.base_url);
        self.mailer.send(to, &subject, &body, true).await
    }

    pub async fn send_book_available(&self, payload: &NotificationPayload) -> AppResult<()> {
        self.send_template(MailTemplate::BookAvailable, payload).await
    }

    pub async fn send_return_reminder(&self, payload: &NotificationPayload) -> AppResult<()> {
        self.send_template(MailTemplate::ReturnReminder, payload).await
    }
}
