use std::io::{self, BufRead, BufReader, Read, Write};
use std::mem;
use std::net::TcpStream;

use tracing::debug;

use super::error::VerifyError;
use super::types::{SmtpEvent, SmtpReply, Stage, Verdict};

/// One SMTP dialogue with a mail exchanger.
///
/// A session is *unconnected* until [`open`](Self::open) succeeds, then
/// *connected* until [`close`](Self::close) sends `QUIT` or an I/O error
/// breaks the stream. Commands on a session that is not connected fail with
/// [`VerifyError::NotConnected`]. Dropping a connected session closes it.
pub struct SmtpSession<S: Read + Write = TcpStream> {
    host: String,
    conn: Option<BufReader<S>>,
    transcript: Vec<SmtpEvent>,
}

impl<S: Read + Write> Default for SmtpSession<S> {
    fn default() -> Self {
        Self {
            host: String::new(),
            conn: None,
            transcript: Vec::new(),
        }
    }
}

impl<S: Read + Write> SmtpSession<S> {
    /// Takes ownership of an established stream, reads the server greeting and
    /// introduces the client as `helo` (`EHLO`, falling back to `HELO`).
    pub fn open(host: impl Into<String>, stream: S, helo: &str) -> Result<Self, VerifyError> {
        let mut session = Self {
            host: host.into(),
            conn: Some(BufReader::new(stream)),
            transcript: Vec::new(),
        };
        match session.handshake(helo) {
            Ok(()) => Ok(session),
            Err(err) => {
                session.close();
                Err(err)
            }
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn transcript(&self) -> &[SmtpEvent] {
        &self.transcript
    }

    pub fn take_transcript(&mut self) -> Vec<SmtpEvent> {
        mem::take(&mut self.transcript)
    }

    /// Declares the envelope sender. Anything but 250 is a failure.
    pub fn mail_from(&mut self, address: &str) -> Result<(), VerifyError> {
        let reply = self.command(Stage::MailFrom, &format!("MAIL FROM:<{address}>"))?;
        ensure_250(Stage::MailFrom, &reply)
    }

    /// Declares the envelope recipient. 250 means the mailbox exists, 550
    /// means it does not; anything else is a failure.
    pub fn rcpt_to(&mut self, address: &str) -> Result<Verdict, VerifyError> {
        let reply = self.command(Stage::RcptTo, &format!("RCPT TO:<{address}>"))?;
        if reply.is_mailbox_unavailable() {
            return Ok(Verdict::Rejected);
        }
        ensure_250(Stage::RcptTo, &reply)?;
        Ok(Verdict::Accepted)
    }

    /// Sends `QUIT` if the session is connected. Idempotent.
    pub fn close(&mut self) {
        if self.conn.is_none() {
            return;
        }
        if let Err(err) = self.exchange(Stage::Quit, Some("QUIT")) {
            debug!(host = %self.host, error = %err, "QUIT failed");
        }
        self.conn = None;
    }

    fn handshake(&mut self, helo: &str) -> Result<(), VerifyError> {
        let greeting = self.exchange(Stage::Greeting, None)?;
        if !greeting.is_positive_completion() {
            return Err(VerifyError::command_failure(format!(
                "greeting rejected: {greeting}"
            )));
        }

        let ehlo = self.command(Stage::Ehlo, &format!("EHLO {helo}"))?;
        if ehlo.is_positive_completion() {
            return Ok(());
        }
        let reply = self.command(Stage::Helo, &format!("HELO {helo}"))?;
        if reply.is_positive_completion() {
            Ok(())
        } else {
            Err(VerifyError::command_failure(format!("HELO rejected: {reply}")))
        }
    }

    fn command(&mut self, stage: Stage, command: &str) -> Result<SmtpReply, VerifyError> {
        self.exchange(stage, Some(command))
    }

    fn exchange(&mut self, stage: Stage, command: Option<&str>) -> Result<SmtpReply, VerifyError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(VerifyError::NotConnected);
        };
        if let Some(command) = command {
            debug!(host = %self.host, "C: {command}");
            self.transcript.push(SmtpEvent::Sent {
                stage,
                command: command.to_string(),
            });
        }

        match roundtrip(conn, command) {
            Ok(reply) => {
                debug!(host = %self.host, "S: {reply}");
                self.transcript.push(SmtpEvent::Received {
                    stage,
                    reply: reply.clone(),
                });
                Ok(reply)
            }
            Err(err) => {
                debug!(host = %self.host, %stage, error = %err, "SMTP exchange failed");
                self.transcript.push(SmtpEvent::Error {
                    stage,
                    message: err.to_string(),
                });
                // the stream is unusable after a failed read or write
                self.conn = None;
                Err(VerifyError::io(stage, &err))
            }
        }
    }
}

impl<S: Read + Write> Drop for SmtpSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

fn ensure_250(stage: Stage, reply: &SmtpReply) -> Result<(), VerifyError> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(VerifyError::unexpected_reply(stage, reply))
    }
}

fn roundtrip<S: Read + Write>(
    conn: &mut BufReader<S>,
    command: Option<&str>,
) -> io::Result<SmtpReply> {
    if let Some(command) = command {
        let mut line = command.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        let stream = conn.get_mut();
        stream.write_all(&line)?;
        stream.flush()?;
    }
    read_reply(conn)
}

/// RFC 5321 §4.5.3.1.5, CRLF included.
const MAX_REPLY_LINE: usize = 512;
const MAX_REPLY_LINES: usize = 100;

pub(crate) fn read_reply<R: BufRead>(reader: &mut R) -> io::Result<SmtpReply> {
    let mut code = None;
    let mut message_lines = Vec::new();
    loop {
        let mut raw = String::new();
        let bytes = reader
            .by_ref()
            .take(MAX_REPLY_LINE as u64)
            .read_line(&mut raw)?;
        if bytes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while reading reply",
            ));
        }
        if bytes == MAX_REPLY_LINE && !raw.ends_with('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("SMTP reply line exceeds {MAX_REPLY_LINE} bytes"),
            ));
        }
        if raw.ends_with('\n') {
            raw.pop();
            if raw.ends_with('\r') {
                raw.pop();
            }
        }

        if raw.len() < 3 || !raw.is_char_boundary(3) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid SMTP reply: '{raw}'"),
            ));
        }
        let code_part = &raw[..3];
        let parsed_code = code_part
            .parse::<u16>()
            .ok()
            .filter(|code| (100..600).contains(code))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid SMTP status code: '{code_part}'"),
                )
            })?;
        match code {
            Some(existing) if existing != parsed_code => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("inconsistent SMTP reply codes: {existing} vs {parsed_code}"),
                ));
            }
            Some(_) => {}
            None => code = Some(parsed_code),
        }
        let continuation = raw.as_bytes().get(3).copied() == Some(b'-');
        let text = raw.get(4..).unwrap_or_default().to_string();
        message_lines.push(text);
        if !continuation {
            break;
        }
        if message_lines.len() >= MAX_REPLY_LINES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("SMTP reply exceeds {MAX_REPLY_LINES} lines"),
            ));
        }
    }
    Ok(SmtpReply {
        code: code.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "SMTP reply missing status code")
        })?,
        message: message_lines.join("\n"),
    })
}
