//! Log-only email sender for development.

use async_trait::async_trait;

use crate::ports::{EmailError, EmailMessage, EmailSender};

/// Writes outgoing email to the log instead of sending it.
///
/// Used when no email provider key is configured.
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

impl LogEmailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email not sent (no provider configured)"
        );
        Ok(())
    }
}
