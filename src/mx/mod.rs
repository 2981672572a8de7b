//! DNS MX resolution.
//!
//! The public entry point is [`resolve_mx`], which performs a synchronous
//! lookup using the system resolver configuration and returns the mail
//! exchangers of a domain, most preferred first.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{DEFAULT_DNS_TIMEOUT, resolve_mx, resolve_mx_with_timeout};
pub use types::MailExchanger;

pub(crate) use resolver::{LookupMx, build_resolver, classify_failure, resolve_with};
