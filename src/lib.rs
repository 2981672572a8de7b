#![forbid(unsafe_code)]
//! mail_verifier : vérifie qu'une boîte mail existe sans envoyer de message
//! (MX + `MAIL FROM` / `RCPT TO`, abandon avant `DATA`).

pub mod address;
pub mod mx;
pub mod verify;

pub use address::{AddressError, EmailAddress};
pub use mx::{Error as MxError, MailExchanger, resolve_mx};
pub use verify::{
    Dialer, SkippedServer, SmtpEvent, SmtpReply, SmtpSession, Stage, TcpDialer, Verdict,
    VerificationReport, VerifyError, VerifyOptions, verify, verify_report, verify_with_options,
};
