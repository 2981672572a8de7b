use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MxError {
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("{domain} does not exist")]
    DomainNotFound { domain: String },
    #[error("MX lookup for {domain} failed: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
}

impl MxError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::ResolverInit {
            source: source.into(),
        }
    }

    pub(crate) fn domain_not_found(domain: impl Into<String>) -> Self {
        Self::DomainNotFound {
            domain: domain.into(),
        }
    }

    pub(crate) fn lookup(
        domain: impl Into<String>,
        source: trust_dns_resolver::error::ResolveError,
    ) -> Self {
        Self::Lookup {
            domain: domain.into(),
            source,
        }
    }
}
