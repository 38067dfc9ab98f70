//! Normalized email address.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

const MAX_EMAIL_LEN: usize = 254;

/// A syntactically valid, case-normalized email address.
///
/// Email is the correlation key between users and access requests, so two
/// spellings of the same address must compare equal: input is trimmed and
/// lower-cased before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(DomainError::validation("email is required"));
        }
        if normalized.len() > MAX_EMAIL_LEN {
            return Err(DomainError::validation("email is too long"));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("invalid email format"));
        }

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(DomainError::validation("invalid email format"));
        };
        if local.is_empty() || domain.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || domain.contains("..")
        {
            return Err(DomainError::validation("invalid email format"));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after `@`.
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or_default()
    }
}

impl ValueObject for Email {}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let email = Email::parse("  Ann@Co.COM ").unwrap();
        assert_eq!(email.as_str(), "ann@co.com");
        assert_eq!(email.domain(), "co.com");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in [
            "",
            "ann",
            "ann@",
            "@co.com",
            "ann@co",
            "ann@@co.com",
            "a nn@co.com",
            "ann@.co",
            "ann@co..com",
        ] {
            assert!(Email::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn deserialize_validates() {
        let ok: Email = serde_json::from_str("\"Bob@Example.org\"").unwrap();
        assert_eq!(ok.as_str(), "bob@example.org");
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn parsing_is_case_insensitive(local in "[a-z][a-z0-9]{0,10}", domain in "[a-z]{1,8}\\.[a-z]{2,4}") {
            let lower = format!("{local}@{domain}");
            let upper = lower.to_uppercase();
            prop_assert_eq!(Email::parse(&lower).unwrap(), Email::parse(&upper).unwrap());
        }
    }
}
