//! EmailSender port - transactional email.

use async_trait::async_trait;
use thiserror::Error;

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Email provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Email provider unreachable: {0}")]
    Network(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}
