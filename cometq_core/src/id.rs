//! Opaque identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Client identifier assigned by the server during handshake.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap a raw client id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-generated token correlating pushed messages with the query that caused them.
///
/// Independent of the [`ClientId`], so it survives a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap a raw request id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random request id.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u64>().to_string())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_request_ids_differ() {
        let a = RequestId::random();
        let b = RequestId::random();
        assert_ne!(a, b);
        assert!(a.as_str().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn ids_serialize_as_plain_strings() -> testresult::TestResult {
        let json = serde_json::to_string(&ClientId::new("abc"))?;
        assert_eq!(json, "\"abc\"");
        let id: RequestId = serde_json::from_str("\"42\"")?;
        assert_eq!(id.as_str(), "42");
        Ok(())
    }
}
