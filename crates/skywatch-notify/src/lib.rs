//! Email notification for alarm transitions: renders triggered/cleared
//! messages and sends them over async SMTP. When SMTP credentials are not
//! configured the rendered message is logged instead, so the worker stays
//! useful in development setups.

mod email;
mod error;
mod worker;

pub use email::EmailNotifier;
pub use error::NotifyError;
pub use worker::NotifyWorker;

#[cfg(test)]
mod tests;
