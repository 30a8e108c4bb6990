//! Opaque public identifiers for relayed messages.
//!
//! Staff and users reference relayed messages by these ids instead of
//! platform snowflakes, so a report never needs to reveal which guild a
//! message came from.

use std::{fmt, str::FromStr};

use {
    rand::Rng,
    serde::{Deserialize, Serialize},
};

/// Characters a relay id may contain.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the compact form.
pub const RELAY_ID_LEN: usize = 8;

/// Opaque id assigned to every relayed message.
///
/// Eight characters from `A-Z0-9`, stored compact and displayed with a
/// hyphen after the fourth character (`4K7Q-PX2M`). Ids are drawn at
/// random and are not checked against previously issued ids; the 36^8
/// space keeps collisions rare but not impossible.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelayId([u8; RELAY_ID_LEN]);

impl RelayId {
    /// Draws a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut bytes = [0u8; RELAY_ID_LEN];
        for slot in &mut bytes {
            *slot = ALPHABET[rng.random_range(0..ALPHABET.len())];
        }
        Self(bytes)
    }

    /// Parses user input. Whitespace and hyphens are ignored and the id
    /// is case-insensitive, so `4k7q-px2m` and `4K7QPX2M` are the same id.
    pub fn parse(input: &str) -> Result<Self, ParseRelayIdError> {
        let cleaned: Vec<char> = input
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if cleaned.len() != RELAY_ID_LEN {
            return Err(ParseRelayIdError::Length(cleaned.len()));
        }
        let mut bytes = [0u8; RELAY_ID_LEN];
        for (slot, c) in bytes.iter_mut().zip(cleaned) {
            if !(c.is_ascii_uppercase() || c.is_ascii_digit()) {
                return Err(ParseRelayIdError::Charset(c));
            }
            *slot = c as u8;
        }
        Ok(Self(bytes))
    }

    /// Compact 8-character form used for storage keys.
    #[must_use]
    pub fn compact(&self) -> String {
        self.0.iter().map(|&b| char::from(b)).collect()
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &b) in self.0.iter().enumerate() {
            if i == RELAY_ID_LEN / 2 {
                write!(f, "-")?;
            }
            write!(f, "{}", char::from(b))?;
        }
        Ok(())
    }
}

impl fmt::Debug for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayId({self})")
    }
}

impl FromStr for RelayId {
    type Err = ParseRelayIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RelayId {
    type Error = ParseRelayIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelayId> for String {
    fn from(id: RelayId) -> Self {
        id.compact()
    }
}

/// Rejected relay id input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseRelayIdError {
    #[error("relay id must be {RELAY_ID_LEN} characters, got {0}")]
    Length(usize),
    #[error("relay id may only contain letters and digits, got {0:?}")]
    Charset(char),
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_use_the_alphabet() {
        for _ in 0..64 {
            let id = RelayId::generate();
            let compact = id.compact();
            assert_eq!(compact.len(), RELAY_ID_LEN);
            assert!(compact.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn display_is_hyphenated() {
        let id = RelayId::parse("4K7QPX2M").unwrap();
        assert_eq!(id.to_string(), "4K7Q-PX2M");
        assert_eq!(id.compact(), "4K7QPX2M");
    }

    #[test]
    fn parse_normalizes_case_hyphens_and_whitespace() {
        let canonical = RelayId::parse("4K7QPX2M").unwrap();
        for input in ["4k7q-px2m", " 4K7Q-PX2M ", "4k7qpx2m", "4-K7QPX2-M"] {
            assert_eq!(RelayId::parse(input).unwrap(), canonical, "input {input:?}");
        }
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            RelayId::parse("ABC-123"),
            Err(ParseRelayIdError::Length(6))
        );
        assert_eq!(
            RelayId::parse("ABCD-12345"),
            Err(ParseRelayIdError::Length(9))
        );
        assert_eq!(RelayId::parse(""), Err(ParseRelayIdError::Length(0)));
    }

    #[test]
    fn parse_rejects_symbols() {
        assert_eq!(
            RelayId::parse("ABCD_123"),
            Err(ParseRelayIdError::Charset('_'))
        );
        assert!(RelayId::parse("ABCD€123").is_err());
    }

    #[test]
    fn serde_uses_the_compact_form() {
        let id = RelayId::parse("AAAA1111").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"AAAA1111\"");
        let back: RelayId = serde_json::from_str("\"aaaa-1111\"").unwrap();
        assert_eq!(back, id);
    }
}
