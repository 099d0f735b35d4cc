//! Table index components and the name-to-OID index encoder.

use std::fmt;

/// One component of a conceptual row's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexComponent {
    /// Used as-is, e.g. `1` or `3.7`.
    Literal(String),
    /// A string index, encoded as the decimal code point of each character.
    EncodedName(String),
}

impl IndexComponent {
    /// Returns this component's OID suffix, with leading dot.
    pub fn suffix(&self) -> String {
        match self {
            IndexComponent::Literal(value) => format!(".{}", value.trim_start_matches('.')),
            IndexComponent::EncodedName(name) => encode_name_index(name),
        }
    }
}

impl fmt::Display for IndexComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexComponent::Literal(value) => write!(f, "{}", value),
            IndexComponent::EncodedName(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Encodes a string table index as an OID suffix.
///
/// Each character becomes its decimal code point, dot-separated, with a
/// leading dot: `"AB"` encodes to `.65.66`. No length prefix is added.
pub fn encode_name_index(name: &str) -> String {
    name.chars().map(|c| format!(".{}", c as u32)).collect()
}

/// Concatenates the suffixes of all components, in order.
pub fn instance_suffix(components: &[IndexComponent]) -> String {
    components.iter().map(IndexComponent::suffix).collect()
}
