use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, warn};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email not configured")]
    NotConfigured,

    #[error("invalid address: {0}")]
    Address(String),

    #[error("smtp: {0}")]
    Transport(String),
}

/// Outbound notifications. Callers treat every failure as non-fatal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// SMTP notifier.
pub struct EmailService {
    host: String,
    user: String,
    password: String,
    from: String,
}

impl EmailService {
    pub fn from_config() -> Self {
        EmailService {
            host: Config::mail_host(),
            user: Config::mail_user(),
            password: Config::mail_password(),
            from: Config::mail_from(),
        }
    }

    fn build(&self, address: &str, subject: &str, body: &str) -> Result<Message, NotifyError> {
        let from_mailbox: Mailbox = self
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Address(e.to_string()))?;
        let to_mailbox: Mailbox = address
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Address(e.to_string()))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        if self.user.is_empty() || self.password.is_empty() {
            warn!("Email credentials not configured. Skipping email send.");
            return Err(NotifyError::NotConfigured);
        }

        let message = self.build(address, subject, body)?;
        let creds = Credentials::new(self.user.clone(), self.password.clone());
        let mailer = SmtpTransport::relay(&self.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .credentials(creds)
            .build();

        // lettre's SMTP transport blocks
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!("Email '{}' sent to {}", subject, address);
        Ok(())
    }
}

pub fn otp_email(otp: &str, ttl_minutes: i64) -> (String, String) {
    let body = format!(
        r#"
        <!DOCTYPE html>
        <html>
        <body style="font-family: Arial, sans-serif; color: #333;">
            <h2>Your Hireline login code</h2>
            <p style="font-size: 28px; font-weight: bold; letter-spacing: 4px;">{}</p>
            <p>Valid for {} minutes. Never share this code with anyone.</p>
            <p>If you didn't request this code, please ignore this email.</p>
        </body>
        </html>
        "#,
        otp, ttl_minutes
    );
    ("Your Hireline login code".to_string(), body)
}

pub fn subscription_confirmation(
    name: &str,
    plan_name: &str,
    card_number: &str,
    valid_from: &str,
    valid_until: &str,
) -> (String, String) {
    let display_name = if name.is_empty() { "there" } else { name };
    let body = format!(
        r#"
        <!DOCTYPE html>
        <html>
        <body style="font-family: Arial, sans-serif; color: #333;">
            <h2>Your {} membership is active 🎉</h2>
            <p>Hi {},</p>
            <p>Thank you for your payment. Your membership details:</p>
            <table>
                <tr><td>Membership number</td><td><strong>{}</strong></td></tr>
                <tr><td>Valid from</td><td>{}</td></tr>
                <tr><td>Valid until</td><td>{}</td></tr>
            </table>
            <p>Best regards,<br><strong>Hireline Team</strong></p>
        </body>
        </html>
        "#,
        plan_name, display_name, card_number, valid_from, valid_until
    );
    (format!("Your {} membership is active", plan_name), body)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records sends instead of delivering them; optionally fails every send.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, String)>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            RecordingNotifier { fail: true, ..Default::default() }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport("connection refused".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((address.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }
}
