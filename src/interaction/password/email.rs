use async_trait::async_trait;
use tracing::info;

use crate::types::Result;

/// An outgoing email
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub recipient: String,
    pub subject: String,
    pub text: String,
}

/// Delivers emails
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Writes emails to the log instead of delivering them
#[derive(Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &Email) -> Result<()> {
        info!(
            recipient = %email.recipient,
            subject = %email.subject,
            "Email not delivered (no mail transport configured): {}",
            email.text
        );
        Ok(())
    }
}
