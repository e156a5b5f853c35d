use serde::Deserialize;

pub const MAX_SCHEMA_NAME_LEN: usize = 50;

/// An isolated-namespace identifier derived from a tenant's display name.
/// Always matches `[a-z0-9_]{1,50}` with no leading or trailing underscore,
/// so it can be spliced into DDL without further quoting concerns.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Serialize)]
pub struct SchemaName(String);

impl<'de> Deserialize<'de> for SchemaName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SchemaName::new(s).ok_or_else(|| {
            serde::de::Error::custom("schema name must match [a-z0-9_]{1,50} without edge underscores")
        })
    }
}

impl SchemaName {
    /// Wraps an already-sanitized name, verifying the invariant holds.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= MAX_SCHEMA_NAME_LEN
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
            && !name.starts_with('_')
            && !name.ends_with('_');
        valid.then_some(SchemaName(name))
    }

    /// Sanitizes a human-supplied tenant name into a candidate namespace
    /// identifier. Returns `None` when nothing usable remains (empty or
    /// all-symbol input); uniqueness is the caller's problem.
    pub fn sanitize(raw: &str) -> Option<Self> {
        Self::new(sanitize_schema_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for SchemaName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for SchemaName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<SchemaName> for str {
    fn eq(&self, other: &SchemaName) -> bool {
        self == other.0
    }
}

/// Lower-cases, maps every char outside `[a-z0-9]` to `_`, trims edge
/// underscores, and bounds the length. Truncation happens before the final
/// trailing trim so the result never ends in `_` and re-sanitizing is a
/// no-op.
pub fn sanitize_schema_name(raw: &str) -> String {
    let replaced: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('_');
    let truncated: String = trimmed.chars().take(MAX_SCHEMA_NAME_LEN).collect();
    truncated.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_basic_sanitization() {
        assert_eq!(sanitize_schema_name("Acme Corp"), "acme_corp");
        assert_eq!(sanitize_schema_name("  Acme!! Corp  "), "acme___corp");
        assert_eq!(sanitize_schema_name("___"), "");
        assert_eq!(sanitize_schema_name(""), "");
        assert_eq!(sanitize_schema_name("42 Widgets"), "42_widgets");
    }

    #[test]
    fn test_truncation_never_leaves_trailing_underscore() {
        let raw = format!("{} tail", "a".repeat(49));
        let out = sanitize_schema_name(&raw);
        assert_eq!(out, "a".repeat(49));
        assert!(!out.ends_with('_'));
    }

    #[test]
    fn test_newtype_rejects_invalid() {
        assert!(SchemaName::new("acme_corp").is_some());
        assert!(SchemaName::new("").is_none());
        assert!(SchemaName::new("_acme").is_none());
        assert!(SchemaName::new("acme_").is_none());
        assert!(SchemaName::new("Acme").is_none());
        assert!(SchemaName::new("a".repeat(51)).is_none());
    }

    #[test]
    fn test_sanitize_rejects_all_symbol_input() {
        assert!(SchemaName::sanitize("!!!").is_none());
        assert!(SchemaName::sanitize("日本語").is_none());
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(raw in ".*") {
            let once = sanitize_schema_name(&raw);
            prop_assert_eq!(sanitize_schema_name(&once), once.clone());
        }

        #[test]
        fn prop_sanitize_output_shape(raw in ".*") {
            let out = sanitize_schema_name(&raw);
            prop_assert!(out.len() <= MAX_SCHEMA_NAME_LEN);
            prop_assert!(out
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_'));
            prop_assert!(!out.starts_with('_'));
            prop_assert!(!out.ends_with('_'));
        }
    }
}
