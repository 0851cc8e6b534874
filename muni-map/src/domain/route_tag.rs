//! Route tag type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid route tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid route tag: {reason}")]
pub struct InvalidRouteTag {
    reason: &'static str,
}

/// An opaque transit route identifier, e.g. `"N"`, `"6"` or `"KT"`.
///
/// Equality is exact string match. Tags are never normalized or case-folded:
/// `"n"` and `"N"` are different routes. The only strings rejected are ones that
/// could not be used as a feed query parameter or a map source id.
///
/// # Examples
///
/// ```
/// use muni_map::domain::RouteTag;
///
/// let n = RouteTag::parse("N").unwrap();
/// assert_eq!(n.as_str(), "N");
///
/// // No case folding
/// assert_ne!(RouteTag::parse("n").unwrap(), n);
///
/// // Empty and whitespace-bearing tags are rejected
/// assert!(RouteTag::parse("").is_err());
/// assert!(RouteTag::parse("N X").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteTag(String);

impl RouteTag {
    /// Parse a route tag from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidRouteTag> {
        if s.is_empty() {
            return Err(InvalidRouteTag {
                reason: "must not be empty",
            });
        }

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(InvalidRouteTag {
                reason: "must not contain whitespace or control characters",
            });
        }

        Ok(RouteTag(s.to_string()))
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RouteTag {
    type Error = InvalidRouteTag;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RouteTag> for String {
    fn from(tag: RouteTag) -> Self {
        tag.0
    }
}

impl fmt::Debug for RouteTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteTag({})", self.0)
    }
}

impl fmt::Display for RouteTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
