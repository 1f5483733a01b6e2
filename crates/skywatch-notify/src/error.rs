/// Errors raised by the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// A sender or recipient address failed to parse.
    #[error("notify: invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Building the MIME message failed.
    #[error("notify: message build failed: {0}")]
    Message(#[from] lettre::error::Error),

    /// The SMTP transport rejected the message or could not be reached.
    #[error("notify: SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}
