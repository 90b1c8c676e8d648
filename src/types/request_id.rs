//! Request identifier.
//!
//! Every call made through [`LlmCaller`](crate::caller::LlmCaller) is tagged
//! with a `RequestId` so that all attempts, validator runs and provider calls
//! belonging to it can be grouped in the logs. Format: `req_01h455vb4pex5vsknk084sn02q`

use mti::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A time-sortable identifier for one top-level LLM request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(MagicTypeId);

/// Error returned when a string is not a valid request ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRequestId {
    /// The string is not a TypeID at all
    Parse(String),
    /// The TypeID carries a prefix other than `req`
    WrongPrefix {
        /// The prefix that was found
        actual: String,
    },
}

impl fmt::Display for InvalidRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "invalid request ID: {e}"),
            Self::WrongPrefix { actual } => {
                write!(f, "expected prefix '{}', got '{actual}'", RequestId::PREFIX)
            }
        }
    }
}

impl std::error::Error for InvalidRequestId {}

impl RequestId {
    /// The TypeID prefix for request identifiers.
    pub const PREFIX: &'static str = "req";

    /// Creates a fresh request ID backed by a UUIDv7.
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// Parses a request ID, checking the prefix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequestId::Parse` for malformed input and
    /// `InvalidRequestId::WrongPrefix` for TypeIDs of another kind.
    pub fn parse(s: &str) -> Result<Self, InvalidRequestId> {
        let id = MagicTypeId::from_str(s).map_err(|e| InvalidRequestId::Parse(e.to_string()))?;

        let prefix = id.prefix().as_str();
        if prefix != Self::PREFIX {
            return Err(InvalidRequestId::WrongPrefix {
                actual: prefix.to_string(),
            });
        }

        Ok(Self(id))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = InvalidRequestId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_carry_prefix_and_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert!(a.to_string().starts_with("req_"));
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_own_output() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        let result = RequestId::parse("corr_01h455vb4pex5vsknk084sn02q");
        assert!(matches!(
            result,
            Err(InvalidRequestId::WrongPrefix { actual }) if actual == "corr"
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            RequestId::parse("definitely not an id"),
            Err(InvalidRequestId::Parse(_))
        ));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
