use thiserror::Error;

use crate::address::AddressError;
use crate::mx::Error as MxError;

use super::types::{SmtpReply, Stage};

/// Errors that stop a verification before a verdict could be reached.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),
    #[error("{domain} does not exist")]
    DomainNotFound { domain: String },
    #[error(transparent)]
    Resolver(MxError),
    #[error("no mail server for {email}")]
    NoMailServer { email: String },
    #[error("unable to connect to any one of the mail servers for {email}")]
    OutOfServers { email: String },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not connected to a mail server")]
    NotConnected,
    #[error("{message}")]
    CommandFailure { message: String },
}

impl VerifyError {
    pub(crate) fn connect(host: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            host: host.into(),
            source,
        }
    }

    pub(crate) fn command_failure(message: impl Into<String>) -> Self {
        Self::CommandFailure {
            message: message.into(),
        }
    }

    pub(crate) fn unexpected_reply(stage: Stage, reply: &SmtpReply) -> Self {
        Self::command_failure(format!(
            "{stage} failed: server responded with {reply} when 250 was expected"
        ))
    }

    pub(crate) fn io(stage: Stage, source: &std::io::Error) -> Self {
        Self::command_failure(format!("{stage} failed: {source}"))
    }
}

impl From<MxError> for VerifyError {
    fn from(err: MxError) -> Self {
        match err {
            MxError::DomainNotFound { domain } => Self::DomainNotFound { domain },
            other => Self::Resolver(other),
        }
    }
}
