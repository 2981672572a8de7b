use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use crate::mx::MailExchanger;

use super::connect::Dialer;
use super::error::VerifyError;
use super::options::VerifyOptions;

type SentLog = Arc<Mutex<Vec<u8>>>;

/// In-memory stream replaying canned server replies and capturing what the
/// client writes.
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    sent: SentLog,
}

impl ScriptedStream {
    pub(crate) fn new(replies: &[&str]) -> Self {
        Self::with_log(replies, SentLog::default())
    }

    fn with_log(replies: &[&str], sent: SentLog) -> Self {
        Self {
            input: Cursor::new(replies.concat().into_bytes()),
            sent,
        }
    }

    pub(crate) fn written(&self) -> String {
        let sent = self.sent.lock().expect("sent log");
        String::from_utf8_lossy(&sent).into_owned()
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sent.lock().expect("sent log").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Dialer answering from per-host scripts; hosts without a script refuse the
/// connection.
#[derive(Default)]
pub(crate) struct ScriptedDialer {
    scripts: HashMap<String, Vec<&'static str>>,
    dialed: Mutex<Vec<String>>,
    logs: Mutex<HashMap<String, SentLog>>,
}

impl ScriptedDialer {
    pub(crate) fn with_script(mut self, host: &str, replies: &[&'static str]) -> Self {
        self.scripts.insert(host.to_string(), replies.to_vec());
        self
    }

    pub(crate) fn dialed(&self) -> Vec<String> {
        self.dialed.lock().expect("dial log").clone()
    }

    /// Everything the client wrote to `host`, across all connections.
    pub(crate) fn sent_to(&self, host: &str) -> String {
        let logs = self.logs.lock().expect("stream logs");
        logs.get(host)
            .map(|log| String::from_utf8_lossy(&log.lock().expect("sent log")).into_owned())
            .unwrap_or_default()
    }
}

impl Dialer for ScriptedDialer {
    type Stream = ScriptedStream;

    fn dial(
        &self,
        exchanger: &MailExchanger,
        _options: &VerifyOptions,
    ) -> Result<ScriptedStream, VerifyError> {
        let host = exchanger.exchange.as_str();
        self.dialed.lock().expect("dial log").push(host.to_string());
        let Some(script) = self.scripts.get(host) else {
            return Err(VerifyError::connect(
                host,
                io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            ));
        };
        let log = self
            .logs
            .lock()
            .expect("stream logs")
            .entry(host.to_string())
            .or_default()
            .clone();
        Ok(ScriptedStream::with_log(script, log))
    }
}
