use std::fmt;

use crate::mx::MailExchanger;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Greeting,
    Ehlo,
    Helo,
    MailFrom,
    RcptTo,
    Quit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greeting => "greeting",
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Quit => "QUIT",
        })
    }
}

/// A raw SMTP reply, preserving the numeric status code and message text.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub message: String,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_ok(&self) -> bool {
        self.code == 250
    }

    pub fn is_mailbox_unavailable(&self) -> bool {
        self.code == 550
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.message)
        }
    }
}

/// A recorded SMTP transcript event used for diagnostics.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpEvent {
    Sent { stage: Stage, command: String },
    Received { stage: Stage, reply: SmtpReply },
    Error { stage: Stage, message: String },
}

impl fmt::Display for SmtpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent { command, .. } => write!(f, "C: {command}"),
            Self::Received { reply, .. } => write!(f, "S: {reply}"),
            Self::Error { stage, message } => write!(f, "!  {stage}: {message}"),
        }
    }
}

/// Outcome of a completed verification.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The server answered 250 to `RCPT TO`: the mailbox exists.
    Accepted,
    /// The server answered 550 to `RCPT TO`: the mailbox is unavailable.
    Rejected,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// A candidate exchanger abandoned while looking for a working server.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedServer {
    pub exchanger: MailExchanger,
    pub reason: String,
}

/// Detailed result of [`verify_report`](crate::verify_report).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub origin: String,
    pub destination: String,
    pub verdict: Verdict,
    pub exchanger: String,
    pub skipped: Vec<SkippedServer>,
    pub transcript: Vec<SmtpEvent>,
}
