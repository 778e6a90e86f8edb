//! Attendee names as typed at the prompt, normalized for the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,
    #[error("name may not contain {0:?} — the attendance ledger has no escaping")]
    ForbiddenChar(char),
}

/// Trimmed, upper-cased attendee name that is safe to store as a ledger field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttendeeName(String);

impl AttendeeName {
    /// Normalize raw user input: trim surrounding whitespace, upper-case.
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }
        if let Some(c) = trimmed.chars().find(|c| matches!(c, ',' | '\n' | '\r')) {
            return Err(NameError::ForbiddenChar(c));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form used in image artifact file names.
    pub fn file_stem(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for AttendeeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AttendeeName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AttendeeName> for String {
    fn from(name: AttendeeName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_uppercases() {
        let name = AttendeeName::parse("  alice smith \n").unwrap();
        assert_eq!(name.as_str(), "ALICE SMITH");
        assert_eq!(name.to_string(), "ALICE SMITH");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(AttendeeName::parse(""), Err(NameError::Empty));
        assert_eq!(AttendeeName::parse("   \t"), Err(NameError::Empty));
    }

    #[test]
    fn test_parse_rejects_comma() {
        assert_eq!(AttendeeName::parse("smith, bob"), Err(NameError::ForbiddenChar(',')));
    }

    #[test]
    fn test_parse_rejects_inner_newline() {
        assert_eq!(AttendeeName::parse("bob\nALICE"), Err(NameError::ForbiddenChar('\n')));
    }

    #[test]
    fn test_file_stem_is_lowercase() {
        let name = AttendeeName::parse("Bob").unwrap();
        assert_eq!(name.file_stem(), "bob");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let once = AttendeeName::parse("éva").unwrap();
        let twice = AttendeeName::parse(once.as_str()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.as_str(), "ÉVA");
    }
}
