//! Email adapters.

mod log;
mod resend;

pub use log::LogEmailSender;
pub use resend::ResendEmailSender;
