use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid email address '{address}': must contain exactly one '@'")]
    MissingSeparator { address: String },
    #[error("invalid email address '{address}': forbidden character {character:?}")]
    ForbiddenCharacter { address: String, character: char },
}

/// An e-mail address holding exactly one `@`.
///
/// Control characters, whitespace, `<` and `>` are refused so the address can
/// be written verbatim inside an SMTP path.
/// The local part and the domain are split on demand; the domain may be empty,
/// in which case no mail server can ever be resolved for it.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(try_from = "String", into = "String"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    raw: String,
}

impl EmailAddress {
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let raw = input.trim();
        if raw.matches('@').count() != 1 {
            return Err(AddressError::MissingSeparator {
                address: raw.to_string(),
            });
        }
        if let Some(character) = raw.chars().find(|&c| is_forbidden(c)) {
            return Err(AddressError::ForbiddenCharacter {
                address: raw.escape_debug().to_string(),
                character,
            });
        }
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn local_part(&self) -> &str {
        self.split().0
    }

    pub fn domain(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        // parse() guarantees the separator
        self.raw.split_once('@').unwrap_or((self.raw.as_str(), ""))
    }
}

fn is_forbidden(c: char) -> bool {
    c.is_control() || c.is_whitespace() || matches!(c, '<' | '>')
}

impl FromStr for EmailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(address: EmailAddress) -> Self {
        address.raw
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_local_and_domain() {
        let addr = EmailAddress::parse("  alice@example.com ").expect("valid address");
        assert_eq!(addr.as_str(), "alice@example.com");
        assert_eq!(addr.local_part(), "alice");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn rejects_missing_or_repeated_separator() {
        for input in ["alice", "a@b@example.com", ""] {
            let err = EmailAddress::parse(input).expect_err("should fail");
            assert!(matches!(err, AddressError::MissingSeparator { .. }), "{input}");
        }
    }

    #[test]
    fn rejects_characters_that_break_an_smtp_path() {
        for (input, forbidden) in [
            ("you>\r\nRSET\r\nRCPT TO:<postmaster@dest.example", '>'),
            ("you\r\nRSET@dest.example", '\r'),
            ("you@dest.example\nQUIT", '\n'),
            ("you <x>@dest.example", ' '),
            ("<you@dest.example", '<'),
            ("you\t@dest.example", '\t'),
            ("you\u{0}@dest.example", '\u{0}'),
        ] {
            let err = EmailAddress::parse(input).expect_err("should fail");
            match err {
                AddressError::ForbiddenCharacter { character, .. } => {
                    assert_eq!(character, forbidden, "{input:?}")
                }
                other => panic!("unexpected error for {input:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn surrounding_whitespace_is_still_trimmed() {
        let addr = EmailAddress::parse("\talice@example.com\r\n").expect("valid address");
        assert_eq!(addr.as_str(), "alice@example.com");
    }

    #[test]
    fn empty_domain_is_kept() {
        let addr: EmailAddress = "alice@".parse().expect("one separator");
        assert_eq!(addr.local_part(), "alice");
        assert_eq!(addr.domain(), "");
    }
}
