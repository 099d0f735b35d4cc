//! Type definitions for table-entry configuration

use rowprobe_common::defaults::{PLACEHOLDER_PAD, PLACEHOLDER_PREFIX};
use rowprobe_common::{SyntaxType, VarBind};

use crate::index::{instance_suffix, IndexComponent};

/// Suffix that marks a leaf as the row's RowStatus column.
pub const ROW_STATUS_SUFFIX: &str = "rowstatus";

/// Value of a configured leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafValue {
    /// Set exactly this value
    Literal(String),
    /// Exercise the leaf with generated probe values
    Probe,
}

/// Syntax tag and value of one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSpec {
    pub syntax: SyntaxType,
    pub value: LeafValue,
}

/// A named leaf of a table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub name: String,
    pub spec: LeafSpec,
}

impl Leaf {
    /// Create a leaf with a literal value
    pub fn literal(name: impl Into<String>, syntax: SyntaxType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: LeafSpec {
                syntax,
                value: LeafValue::Literal(value.into()),
            },
        }
    }

    /// Create a string leaf selected for probing
    pub fn probe(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: LeafSpec {
                syntax: SyntaxType::String,
                value: LeafValue::Probe,
            },
        }
    }

    /// True if this leaf is exercised with probe values
    pub fn is_probe(&self) -> bool {
        self.spec.value == LeafValue::Probe
    }

    /// True if the leaf name marks it as the RowStatus column
    pub fn is_row_status(&self) -> bool {
        self.name.to_ascii_lowercase().ends_with(ROW_STATUS_SUFFIX)
    }

    /// The configured literal value, if any
    pub fn literal_value(&self) -> Option<&str> {
        match &self.spec.value {
            LeafValue::Literal(v) => Some(v),
            LeafValue::Probe => None,
        }
    }
}

/// A conceptual table row: module, entry name, index and ordered leaves.
///
/// The RowStatus leaf, when present, is always the last leaf; the loader
/// rejects any other placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntryDescriptor {
    pub module: String,
    pub name: String,
    pub index: Vec<IndexComponent>,
    pub leaves: Vec<Leaf>,
}

impl TableEntryDescriptor {
    /// Create an empty descriptor
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            index: Vec::new(),
            leaves: Vec::new(),
        }
    }

    /// Add an index component
    pub fn with_index(mut self, component: IndexComponent) -> Self {
        self.index.push(component);
        self
    }

    /// Append a leaf
    pub fn with_leaf(mut self, leaf: Leaf) -> Self {
        self.leaves.push(leaf);
        self
    }

    /// `MODULE::entry`, for logs
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }

    /// OID suffix shared by every leaf of this row
    pub fn instance_suffix(&self) -> String {
        instance_suffix(&self.index)
    }

    /// Leaf name with the index suffix, e.g. `ifAlias.1`
    pub fn instance_name(&self, leaf: &Leaf) -> String {
        format!("{}{}", leaf.name, self.instance_suffix())
    }

    /// Fully qualified object instance, e.g. `IF-MIB::ifAlias.1`
    pub fn object(&self, leaf: &Leaf) -> String {
        format!("{}::{}", self.module, self.instance_name(leaf))
    }

    /// Object type without instance, for MIB lookups
    pub fn object_type(&self, leaf: &Leaf) -> String {
        format!("{}::{}", self.module, leaf.name)
    }

    /// The RowStatus leaf, if the table has one
    pub fn row_status(&self) -> Option<&Leaf> {
        self.leaves.last().filter(|leaf| leaf.is_row_status())
    }

    /// Instance of the RowStatus leaf
    pub fn row_status_object(&self) -> Option<String> {
        self.row_status().map(|leaf| self.object(leaf))
    }

    /// Leaves selected for probing, in configuration order
    pub fn probe_leaves(&self) -> Vec<&Leaf> {
        self.leaves.iter().filter(|leaf| leaf.is_probe()).collect()
    }

    /// True if at least one leaf is selected for probing
    pub fn has_probe_leaves(&self) -> bool {
        self.leaves.iter().any(Leaf::is_probe)
    }

    /// Varbinds for a create request: one per leaf, in order. Probe leaves
    /// take their value from `probe_value(ordinal, leaf)`, where `ordinal`
    /// counts probe leaves from 0.
    pub fn create_varbinds<F>(&self, mut probe_value: F) -> Vec<VarBind>
    where
        F: FnMut(usize, &Leaf) -> String,
    {
        let mut ordinal = 0;
        self.leaves
            .iter()
            .map(|leaf| {
                let value = match &leaf.spec.value {
                    LeafValue::Literal(v) => v.clone(),
                    LeafValue::Probe => {
                        let v = probe_value(ordinal, leaf);
                        ordinal += 1;
                        v
                    }
                };
                VarBind::new(self.object(leaf), leaf.spec.syntax, value)
            })
            .collect()
    }

    /// Varbinds for a write to an existing row: probe leaves only.
    pub fn probe_varbinds<F>(&self, mut probe_value: F) -> Vec<VarBind>
    where
        F: FnMut(usize, &Leaf) -> String,
    {
        self.probe_leaves()
            .into_iter()
            .enumerate()
            .map(|(ordinal, leaf)| {
                VarBind::new(self.object(leaf), leaf.spec.syntax, probe_value(ordinal, leaf))
            })
            .collect()
    }
}

/// Placeholder held by a probe leaf that is not currently being probed.
///
/// `ph1`, `ph2`, ... right-padded with `x` up to `min_len` and cut to
/// `max_len`. Placeholders are alphanumeric so they never collide with a
/// probe value.
pub fn placeholder_value(ordinal: usize, min_len: usize, max_len: Option<usize>) -> String {
    let mut value = format!("{}{}", PLACEHOLDER_PREFIX, ordinal + 1);
    while value.len() < min_len {
        value.push(PLACEHOLDER_PAD);
    }
    if let Some(max_len) = max_len {
        value.truncate(max_len.max(min_len));
    }
    value
}

/// Parsed row configuration: entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowConfig {
    pub entries: Vec<TableEntryDescriptor>,
}

impl RowConfig {
    /// Number of configured entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are configured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_entry() -> TableEntryDescriptor {
        TableEntryDescriptor::new("WWP-LEOS-FLOW-MIB", "wwpLeosFlowCpuRateLimitEntry")
            .with_index(IndexComponent::Literal("1".to_string()))
            .with_index(IndexComponent::EncodedName("AB".to_string()))
            .with_leaf(Leaf::literal("wwpLeosFlowMode", SyntaxType::Integer, "2"))
            .with_leaf(Leaf::probe("wwpLeosFlowName"))
            .with_leaf(Leaf::probe("wwpLeosFlowDescr"))
            .with_leaf(Leaf::literal("wwpLeosFlowRowStatus", SyntaxType::Integer, "4"))
    }

    #[test]
    fn test_object_names() {
        let entry = sample_entry();
        let leaf = &entry.leaves[1];
        assert_eq!(entry.instance_suffix(), ".1.65.66");
        assert_eq!(entry.instance_name(leaf), "wwpLeosFlowName.1.65.66");
        assert_eq!(entry.object(leaf), "WWP-LEOS-FLOW-MIB::wwpLeosFlowName.1.65.66");
        assert_eq!(entry.object_type(leaf), "WWP-LEOS-FLOW-MIB::wwpLeosFlowName");
        assert_eq!(
            entry.row_status_object().as_deref(),
            Some("WWP-LEOS-FLOW-MIB::wwpLeosFlowRowStatus.1.65.66")
        );
    }

    #[test]
    fn test_row_status_must_be_last() {
        let entry = TableEntryDescriptor::new("M", "e")
            .with_leaf(Leaf::literal("fooRowStatus", SyntaxType::Integer, "4"))
            .with_leaf(Leaf::probe("fooName"));
        assert!(entry.row_status().is_none());
    }

    #[test]
    fn test_create_varbinds() {
        let entry = sample_entry();
        let vbs = entry.create_varbinds(|ordinal, _| placeholder_value(ordinal, 0, None));
        let values: Vec<&str> = vbs.iter().map(|vb| vb.value.as_str()).collect();
        assert_eq!(values, vec!["2", "ph1", "ph2", "4"]);
        assert_eq!(vbs[3].syntax, SyntaxType::Integer);
    }

    #[test]
    fn test_probe_varbinds() {
        let entry = sample_entry();
        let vbs = entry.probe_varbinds(|ordinal, _| if ordinal == 1 { "#".into() } else { "ph1".into() });
        assert_eq!(vbs.len(), 2);
        assert_eq!(vbs[0].object, "WWP-LEOS-FLOW-MIB::wwpLeosFlowName.1.65.66");
        assert_eq!(vbs[0].value, "ph1");
        assert_eq!(vbs[1].value, "#");
    }

    #[test]
    fn test_placeholder_value() {
        assert_eq!(placeholder_value(0, 0, None), "ph1");
        assert_eq!(placeholder_value(1, 6, Some(32)), "ph2xxx");
        assert_eq!(placeholder_value(9, 2, None), "ph10");
        assert_eq!(placeholder_value(0, 1, Some(2)), "ph");
        assert_eq!(placeholder_value(11, 0, Some(3)), "ph1");
    }
}
