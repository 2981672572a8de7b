use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::{debug, warn};
use trust_dns_resolver::{Resolver, error::ResolveError};

use crate::address::EmailAddress;
use crate::mx::{self, MailExchanger};

use super::error::VerifyError;
use super::options::VerifyOptions;
use super::queue::CandidateQueue;
use super::session::SmtpSession;
use super::types::SkippedServer;

/// Opens the transport to a mail exchanger.
///
/// Implementations must apply [`VerifyOptions::connect_timeout`] to the
/// connection and [`VerifyOptions::command_timeout`] to every later read and
/// write on the returned stream.
pub trait Dialer {
    type Stream: Read + Write;

    fn dial(
        &self,
        exchanger: &MailExchanger,
        options: &VerifyOptions,
    ) -> Result<Self::Stream, VerifyError>;
}

/// Plain TCP to `exchange:port`, trying each resolved socket address in turn.
///
/// Exchanger host names are resolved with the same DNS resolver as the MX
/// query, so the host lookup is bounded by the DNS timeout too.
pub struct TcpDialer {
    resolver: Resolver,
}

impl TcpDialer {
    /// Uses the system DNS configuration, each query bounded by `dns_timeout`.
    pub fn new(dns_timeout: Duration) -> Result<Self, VerifyError> {
        Ok(Self::with_resolver(mx::build_resolver(dns_timeout)?))
    }

    pub fn with_resolver(resolver: Resolver) -> Self {
        Self { resolver }
    }

    pub(crate) fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn dial(
        &self,
        exchanger: &MailExchanger,
        options: &VerifyOptions,
    ) -> Result<TcpStream, VerifyError> {
        let host = exchanger.exchange.as_str();
        let addrs = socket_addrs(host, options.port, |name| {
            let fqdn = format!("{name}.");
            self.resolver
                .lookup_ip(fqdn.as_str())
                .map(|lookup| lookup.iter().collect())
        })?;
        first_connected(&addrs, |addr| open_stream(addr, options))
            .map_err(|err| VerifyError::connect(host, err))
    }
}

fn socket_addrs<F>(host: &str, port: u16, lookup: F) -> Result<Vec<SocketAddr>, VerifyError>
where
    F: FnOnce(&str) -> Result<Vec<IpAddr>, ResolveError>,
{
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }
    let ips = lookup(host).map_err(|err| VerifyError::connect(host, io::Error::other(err)))?;
    Ok(ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect())
}

/// Returns the first address `connect` succeeds on, else the last error.
fn first_connected<T, F>(addrs: &[SocketAddr], mut connect: F) -> io::Result<T>
where
    F: FnMut(&SocketAddr) -> io::Result<T>,
{
    let mut last_err = None;
    for addr in addrs {
        match connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(%addr, error = %err, "socket address failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no socket address available",
        )
    }))
}

fn open_stream(addr: &SocketAddr, options: &VerifyOptions) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(addr, options.connect_timeout)?;
    stream.set_read_timeout(Some(options.command_timeout))?;
    stream.set_write_timeout(Some(options.command_timeout))?;
    debug!(%addr, "connected");
    Ok(stream)
}

/// State owned by one verification call.
pub(crate) struct Probe<'a> {
    pub(crate) origin: &'a EmailAddress,
    pub(crate) destination: &'a EmailAddress,
    pub(crate) candidates: CandidateQueue,
    pub(crate) skipped: Vec<SkippedServer>,
}

impl<'a> Probe<'a> {
    pub(crate) fn new(
        origin: &'a EmailAddress,
        destination: &'a EmailAddress,
        exchangers: Vec<MailExchanger>,
    ) -> Self {
        Self {
            origin,
            destination,
            candidates: CandidateQueue::new(exchangers),
            skipped: Vec::new(),
        }
    }

    /// Returns a session with the first candidate that accepts the
    /// connection and the greeting. Failing candidates are skipped and never
    /// retried; an exhausted queue fails with [`VerifyError::OutOfServers`].
    pub(crate) fn connect<D: Dialer>(
        &mut self,
        dialer: &D,
        options: &VerifyOptions,
    ) -> Result<SmtpSession<D::Stream>, VerifyError> {
        let origin = self.origin;
        let helo = options.helo_name(origin.domain());

        while let Some(candidate) = self.candidates.pop_front() {
            let opened = dialer.dial(&candidate, options).and_then(|stream| {
                SmtpSession::open(candidate.exchange.clone(), stream, &helo)
            });
            match opened {
                Ok(session) => return Ok(session),
                Err(err) => {
                    warn!(
                        exchanger = %candidate,
                        remaining = self.candidates.len(),
                        error = %err,
                        "skipping mail exchanger"
                    );
                    self.skipped.push(SkippedServer {
                        exchanger: candidate,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(VerifyError::OutOfServers {
            email: self.destination.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::testing::ScriptedDialer;

    fn addr(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).expect("valid address")
    }

    #[test]
    fn every_candidate_refused_exhausts_queue_once_each() {
        let origin = addr("me@origin.example");
        let dest = addr("you@dest.example");
        let dialer = ScriptedDialer::default();
        let mut probe = Probe::new(
            &origin,
            &dest,
            vec![
                MailExchanger::new(10, "mx1.dest.example"),
                MailExchanger::new(20, "mx2.dest.example"),
                MailExchanger::new(30, "mx3.dest.example"),
            ],
        );

        let err = probe
            .connect(&dialer, &VerifyOptions::default())
            .err()
            .expect("no server accepts");
        assert!(matches!(
            err,
            VerifyError::OutOfServers { ref email } if email == "you@dest.example"
        ));
        assert_eq!(
            dialer.dialed(),
            vec!["mx1.dest.example", "mx2.dest.example", "mx3.dest.example"]
        );
        assert_eq!(probe.skipped.len(), 3);
        assert!(probe.candidates.is_empty());
    }

    #[test]
    fn skips_to_next_candidate_after_failure() {
        let origin = addr("me@origin.example");
        let dest = addr("you@dest.example");
        let dialer = ScriptedDialer::default()
            .with_script("mx2.dest.example", &["554 go away\r\n", "221 bye\r\n"])
            .with_script("mx3.dest.example", &["220 ready\r\n", "250 hello\r\n"]);
        let mut probe = Probe::new(
            &origin,
            &dest,
            vec![
                MailExchanger::new(10, "mx1.dest.example"),
                MailExchanger::new(20, "mx2.dest.example"),
                MailExchanger::new(30, "mx3.dest.example"),
                MailExchanger::new(40, "mx4.dest.example"),
            ],
        );

        let session = probe
            .connect(&dialer, &VerifyOptions::default())
            .expect("mx3 answers");
        assert_eq!(session.host(), "mx3.dest.example");
        let skipped: Vec<&str> = probe
            .skipped
            .iter()
            .map(|s| s.exchanger.exchange.as_str())
            .collect();
        assert_eq!(skipped, vec!["mx1.dest.example", "mx2.dest.example"]);
        assert_eq!(probe.candidates.len(), 1);
    }

    #[test]
    fn ip_literal_exchanger_skips_dns() {
        let addrs = socket_addrs("192.0.2.7", 2525, |_| panic!("no DNS lookup expected"))
            .expect("literal address");
        assert_eq!(addrs, vec!["192.0.2.7:2525".parse::<SocketAddr>().expect("addr")]);
    }

    #[test]
    fn host_names_resolve_through_the_resolver() {
        let addrs = socket_addrs("mx.dest.example", 25, |name| {
            assert_eq!(name, "mx.dest.example");
            Ok(vec![
                "192.0.2.1".parse().expect("v4"),
                "2001:db8::1".parse().expect("v6"),
            ])
        })
        .expect("resolved");
        let rendered: Vec<String> = addrs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["192.0.2.1:25", "[2001:db8::1]:25"]);
    }

    #[test]
    fn failed_host_lookup_is_a_connect_error() {
        let err = socket_addrs("mx.dest.example", 25, |_| Err(ResolveError::from("timed out")))
            .expect_err("lookup fails");
        match err {
            VerifyError::Connect { host, .. } => assert_eq!(host, "mx.dest.example"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn setup_failure_on_one_address_moves_to_the_next() {
        let addrs: Vec<SocketAddr> = vec![
            "192.0.2.1:25".parse().expect("addr"),
            "192.0.2.2:25".parse().expect("addr"),
        ];
        let mut attempts = Vec::new();
        let chosen = first_connected(&addrs, |addr| {
            attempts.push(*addr);
            if *addr == addrs[0] {
                Err(io::Error::new(io::ErrorKind::InvalidInput, "cannot set timeout"))
            } else {
                Ok(*addr)
            }
        })
        .expect("second address works");
        assert_eq!(chosen, addrs[1]);
        assert_eq!(attempts, addrs);
    }

    #[test]
    fn every_address_failing_reports_the_last_error() {
        let addrs: Vec<SocketAddr> = vec![
            "192.0.2.1:25".parse().expect("addr"),
            "192.0.2.2:25".parse().expect("addr"),
        ];
        let err = first_connected(&addrs, |addr| -> io::Result<()> {
            let kind = if *addr == addrs[0] {
                io::ErrorKind::ConnectionRefused
            } else {
                io::ErrorKind::TimedOut
            };
            Err(io::Error::new(kind, "unreachable"))
        })
        .expect_err("nothing connects");
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        let err = first_connected(&[], |_| -> io::Result<()> { Ok(()) }).expect_err("no address");
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
    }

    #[test]
    fn empty_queue_is_out_of_servers_without_dialing() {
        let origin = addr("me@origin.example");
        let dest = addr("you@dest.example");
        let dialer = ScriptedDialer::default();
        let mut probe = Probe::new(&origin, &dest, Vec::new());
        let err = probe.connect(&dialer, &VerifyOptions::default()).err();
        assert!(matches!(err, Some(VerifyError::OutOfServers { .. })));
        assert!(dialer.dialed().is_empty());
    }
}
