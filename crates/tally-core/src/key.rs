//! Compound identity of a reported value.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::KeyParseError;

/// Separator between the producer name and the value name.
pub const KEY_SEPARATOR: char = '/';

/// Identifies one value in a registry: the producing object's name plus
/// the name of the value it produces.
///
/// Equality, ordering and hashing all use the combined
/// `"<producer>/<value>"` string, so a `ValueKey` sorts the same way its
/// display form does. Keys are immutable once built.
///
/// # Examples
///
/// ```
/// use tally_core::ValueKey;
///
/// let key = ValueKey::new("solver", "residual");
/// assert_eq!(key.to_string(), "solver/residual");
///
/// let parsed: ValueKey = "solver/residual".parse().unwrap();
/// assert_eq!(parsed, key);
/// ```
#[derive(Clone, Debug)]
pub struct ValueKey {
    producer: String,
    value: String,
    combined: String,
}

impl ValueKey {
    /// Build a key from a producer name and a value name.
    pub fn new(producer: impl Into<String>, value: impl Into<String>) -> Self {
        let producer = producer.into();
        let value = value.into();
        let combined = format!("{producer}{KEY_SEPARATOR}{value}");
        Self {
            producer,
            value,
            combined,
        }
    }

    /// Parse `"<producer>/<value>"`.
    ///
    /// The split happens at the last `/`, so producer names may themselves
    /// contain separators (`"app/sub/value"` is producer `"app/sub"`).
    pub fn parse(input: &str) -> Result<Self, KeyParseError> {
        match input.rfind(KEY_SEPARATOR) {
            Some(pos) => Ok(Self::new(&input[..pos], &input[pos + 1..])),
            None => Err(KeyParseError {
                input: input.to_string(),
            }),
        }
    }

    /// Name of the object that produces this value.
    pub fn producer_name(&self) -> &str {
        &self.producer
    }

    /// Name of the value within its producer.
    pub fn value_name(&self) -> &str {
        &self.value
    }

    /// The combined `"<producer>/<value>"` string.
    pub fn combined(&self) -> &str {
        &self.combined
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.combined)
    }
}

impl FromStr for ValueKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.combined == other.combined
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.combined.hash(state);
    }
}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.combined.cmp(&other.combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn combined_string_joins_with_separator() {
        let key = ValueKey::new("pp", "value");
        assert_eq!(key.combined(), "pp/value");
        assert_eq!(key.producer_name(), "pp");
        assert_eq!(key.value_name(), "value");
    }

    #[test]
    fn parse_splits_at_last_separator() {
        let key = ValueKey::parse("app/sub/flux").unwrap();
        assert_eq!(key.producer_name(), "app/sub");
        assert_eq!(key.value_name(), "flux");
    }

    #[test]
    fn parse_without_separator_names_input() {
        let err = ValueKey::parse("no_separator").unwrap_err();
        assert_eq!(err.input, "no_separator");
        assert!(err.to_string().contains("no_separator"));
    }

    #[test]
    fn ordering_follows_combined_string() {
        let keys: BTreeSet<ValueKey> = [
            ValueKey::new("b", "x"),
            ValueKey::new("a", "z"),
            ValueKey::new("a", "y"),
        ]
        .into_iter()
        .collect();
        let order: Vec<&str> = keys.iter().map(ValueKey::combined).collect();
        assert_eq!(order, ["a/y", "a/z", "b/x"]);
    }

    #[test]
    fn equality_ignores_split_point() {
        // Same combined string, different split: same identity.
        assert_eq!(ValueKey::new("a/b", "c"), ValueKey::new("a", "b/c"));
    }
}
