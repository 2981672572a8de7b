use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;
use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
    proto::op::ResponseCode,
    system_conf::read_system_conf,
};

use super::{Error, MailExchanger};

pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Lookup the mail exchangers of `domain` using the system resolver.
///
/// An empty domain yields an empty list. The domain is normalized via IDNA
/// before querying DNS; the result is sorted by ascending preference, ties
/// keeping the order in which the records were resolved.
pub fn resolve_mx(domain: &str) -> Result<Vec<MailExchanger>, Error> {
    resolve_mx_with_timeout(domain, DEFAULT_DNS_TIMEOUT)
}

/// Same as [`resolve_mx`] with an explicit DNS query timeout.
pub fn resolve_mx_with_timeout(
    domain: &str,
    timeout: Duration,
) -> Result<Vec<MailExchanger>, Error> {
    if domain.trim().is_empty() {
        return Ok(Vec::new());
    }
    let resolver = build_resolver(timeout)?;
    resolve_with(&resolver, domain)
}

pub(crate) fn build_resolver(timeout: Duration) -> Result<Resolver, Error> {
    let (config, mut opts) = read_system_conf().map_err(Error::resolver_init)?;
    opts.timeout = timeout;
    opts.attempts = 1;
    Resolver::new(config, opts).map_err(Error::resolver_init)
}

pub(crate) fn resolve_with<R>(resolver: &R, domain: &str) -> Result<Vec<MailExchanger>, Error>
where
    R: LookupMx,
{
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let ascii = idna::domain_to_ascii(trimmed).map_err(Error::idna)?;

    let mut records = resolver.lookup_mx(&ascii)?;
    order_exchangers(&mut records);

    debug!(domain = %ascii, count = records.len(), "resolved mail exchangers");
    Ok(records)
}

/// Stable sort by preference, then drop null MX entries and exact duplicates.
pub(crate) fn order_exchangers(records: &mut Vec<MailExchanger>) {
    records.sort_by_key(|record| record.preference);
    let mut seen = HashSet::new();
    records.retain(|record| !record.exchange.is_empty() && seen.insert(record.clone()));
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

pub(crate) trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MailExchanger>, Error>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MailExchanger>, Error> {
        // absolute name, so search domains never mask an NXDOMAIN
        let fqdn = format!("{domain}.");
        let lookup = match Resolver::mx_lookup(self, fqdn.as_str()) {
            Ok(lookup) => lookup,
            Err(err) => return classify_failure(domain, err),
        };
        let records = lookup
            .iter()
            .map(|mx| {
                MailExchanger::new(mx.preference(), normalize_exchange(mx.exchange().to_utf8()))
            })
            .collect();
        Ok(records)
    }
}

pub(crate) fn classify_failure(
    domain: &str,
    err: ResolveError,
) -> Result<Vec<MailExchanger>, Error> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            Err(Error::domain_not_found(domain))
        }
        ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
        _ => Err(Error::lookup(domain, err)),
    }
}
