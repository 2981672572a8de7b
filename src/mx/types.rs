use std::fmt;

/// A mail exchanger advertised by an MX record. Lower preference wins.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MailExchanger {
    pub preference: u16,
    pub exchange: String,
}

impl MailExchanger {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

impl fmt::Display for MailExchanger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.preference, self.exchange)
    }
}
