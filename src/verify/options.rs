use std::borrow::Cow;
use std::time::Duration;

use crate::mx::DEFAULT_DNS_TIMEOUT;

/// Controls how [`verify_with_options`](crate::verify_with_options) talks to
/// DNS and to the mail exchangers.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    pub port: u16,
    pub helo_domain: Option<String>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub dns_timeout: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            port: 25,
            helo_domain: None,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            dns_timeout: DEFAULT_DNS_TIMEOUT,
        }
    }
}

impl VerifyOptions {
    /// Returns the client identity used in `EHLO`/`HELO`. Defaults to the
    /// origin domain, then to `localhost` when that is empty.
    pub fn helo_name<'a>(&'a self, origin_domain: &'a str) -> Cow<'a, str> {
        self.helo_domain
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| Some(origin_domain.trim()).filter(|value| !value.is_empty()))
            .map(Cow::Borrowed)
            .unwrap_or(Cow::Borrowed("localhost"))
    }
}
