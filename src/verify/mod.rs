//! SMTP mailbox verification.
//!
//! The public entry point is [`verify`], which resolves the destination's mail
//! exchangers, opens an SMTP session with the first one that answers, issues
//! `MAIL FROM` and `RCPT TO`, and hangs up before `DATA`. Every call owns its
//! whole state, so verifications may run concurrently from several threads.

mod connect;
mod error;
mod options;
mod queue;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connect::{Dialer, TcpDialer};
pub use error::VerifyError;
pub use options::VerifyOptions;
pub use session::SmtpSession;
pub use types::{SkippedServer, SmtpEvent, SmtpReply, Stage, Verdict, VerificationReport};

use std::io::{Read, Write};

use tracing::info;

use crate::address::EmailAddress;
use crate::mx::{self, LookupMx};

use connect::Probe;

/// Checks whether `destination` is deliverable, presenting `origin` as the
/// envelope sender. Many servers refuse probes from a null or unknown sender,
/// so `origin` should be a real mailbox.
pub fn verify(origin: &str, destination: &str) -> Result<Verdict, VerifyError> {
    verify_with_options(origin, destination, &VerifyOptions::default())
}

/// Identical to [`verify`], but allows tweaking the port, timeouts and the
/// `EHLO` identity.
pub fn verify_with_options(
    origin: &str,
    destination: &str,
    options: &VerifyOptions,
) -> Result<Verdict, VerifyError> {
    verify_report(origin, destination, options).map(|report| report.verdict)
}

/// Runs a verification and returns the verdict together with the exchanger
/// that answered, the skipped candidates and the SMTP transcript.
#[tracing::instrument(level = "info", skip(options))]
pub fn verify_report(
    origin: &str,
    destination: &str,
    options: &VerifyOptions,
) -> Result<VerificationReport, VerifyError> {
    let origin = EmailAddress::parse(origin)?;
    let destination = EmailAddress::parse(destination)?;
    if destination.domain().trim().is_empty() {
        return Err(no_mail_server(&destination));
    }

    let dialer = TcpDialer::new(options.dns_timeout)?;
    verify_with(&origin, &destination, options, dialer.resolver(), &dialer)
}

pub(crate) fn verify_with<R, D>(
    origin: &EmailAddress,
    destination: &EmailAddress,
    options: &VerifyOptions,
    resolver: &R,
    dialer: &D,
) -> Result<VerificationReport, VerifyError>
where
    R: LookupMx,
    D: Dialer,
{
    let exchangers = mx::resolve_with(resolver, destination.domain())?;
    let mut probe = Probe::new(origin, destination, exchangers);
    if probe.candidates.is_empty() {
        return Err(no_mail_server(destination));
    }

    let mut session = probe.connect(dialer, options)?;
    let outcome = run_commands(&mut session, origin, destination);
    session.close();
    let verdict = outcome?;

    info!(exchanger = session.host(), %verdict, "verification finished");
    Ok(VerificationReport {
        origin: origin.to_string(),
        destination: destination.to_string(),
        verdict,
        exchanger: session.host().to_string(),
        skipped: probe.skipped,
        transcript: session.take_transcript(),
    })
}

fn run_commands<S: Read + Write>(
    session: &mut SmtpSession<S>,
    origin: &EmailAddress,
    destination: &EmailAddress,
) -> Result<Verdict, VerifyError> {
    session.mail_from(origin.as_str())?;
    session.rcpt_to(destination.as_str())
}

fn no_mail_server(destination: &EmailAddress) -> VerifyError {
    VerifyError::NoMailServer {
        email: destination.to_string(),
    }
}
