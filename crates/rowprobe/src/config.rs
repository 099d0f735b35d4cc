//! Configuration file loaders.
//!
//! Row configuration format (key order is significant):
//! ```json
//! {
//!   "SOME-MODULE-MIB": {
//!     "mibObjectEntry": {
//!       "index": { "mibObjectIndex": "1", "mibObjectName": "cpu" },
//!       "requiredMibLeaf1": { "type": "i", "value": "1" },
//!       "mibDisplayString": { "type": "s", "value": null },
//!       "mibEntryRowStatus": { "type": "i", "value": "4" }
//!     }
//!   }
//! }
//! ```
//!
//! Index components whose key contains `Name` are name-encoded. A `null`
//! value on an `s` leaf selects it for probing.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, info};

use rowprobe_common::{RowProbeError, RowProbeResult, SyntaxType};

use crate::index::IndexComponent;
use crate::report::split_csv_line;
use crate::types::{Leaf, LeafSpec, LeafValue, RowConfig, TableEntryDescriptor};

/// Reserved key holding the index components of an entry.
pub const INDEX_KEY: &str = "index";

/// Index component keys containing this marker are name-encoded.
pub const NAME_INDEX_MARKER: &str = "Name";

/// Load and validate a row configuration file.
pub fn parse_row_config_file(path: &str) -> RowProbeResult<RowConfig> {
    let mut text = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut text))
        .map_err(|e| RowProbeError::config(path, format!("could not read file: {}", e)))?;

    let config = parse_row_config(&text, path)?;
    info!("Loaded {} table entries from {}", config.len(), path);
    Ok(config)
}

/// Parse and validate row configuration text. `source` names the input in
/// error messages.
pub fn parse_row_config(text: &str, source: &str) -> RowProbeResult<RowConfig> {
    let json: Value = serde_json::from_str(text)
        .map_err(|e| RowProbeError::config(source, format!("invalid JSON: {}", e)))?;

    let Value::Object(modules) = json else {
        return Err(RowProbeError::config(
            source,
            "top level must be an object keyed by MIB module",
        ));
    };

    let mut config = RowConfig::default();
    for (module, entries) in &modules {
        let Value::Object(entries) = entries else {
            return Err(RowProbeError::config(
                module.as_str(),
                "module must map entry names to objects",
            ));
        };
        for (entry_name, entry_obj) in entries {
            let field = format!("{}::{}", module, entry_name);
            let Value::Object(entry_obj) = entry_obj else {
                return Err(RowProbeError::config(field, "entry must be an object"));
            };
            let entry = parse_entry(module, entry_name, entry_obj)?;
            debug!(
                "Parsed {} with {} leaves, index {}",
                field,
                entry.leaves.len(),
                entry.instance_suffix()
            );
            config.entries.push(entry);
        }
    }

    Ok(config)
}

fn parse_entry(
    module: &str,
    name: &str,
    obj: &Map<String, Value>,
) -> RowProbeResult<TableEntryDescriptor> {
    let field = format!("{}::{}", module, name);
    let mut entry = TableEntryDescriptor::new(module, name);

    let mut keys = obj.iter();
    match keys.next() {
        Some((key, Value::Object(index))) if key == INDEX_KEY => {
            entry.index = parse_index(&field, index)?;
        }
        Some((key, _)) if key == INDEX_KEY => {
            return Err(RowProbeError::config(field, "index must be an object"));
        }
        _ => {
            return Err(RowProbeError::config(
                field,
                "'index' must be present and must be the first key",
            ));
        }
    }

    for (leaf_name, leaf_obj) in keys {
        if leaf_name == INDEX_KEY {
            return Err(RowProbeError::config(field, "duplicate 'index' key"));
        }
        entry.leaves.push(parse_leaf(&field, leaf_name, leaf_obj)?);
    }

    if entry.leaves.is_empty() {
        return Err(RowProbeError::config(field, "entry has no leaves"));
    }

    let status_positions: Vec<usize> = entry
        .leaves
        .iter()
        .enumerate()
        .filter(|(_, leaf)| leaf.is_row_status())
        .map(|(i, _)| i)
        .collect();
    match status_positions.as_slice() {
        [] => {}
        [pos] if *pos + 1 == entry.leaves.len() => {
            let leaf = &entry.leaves[*pos];
            if leaf.spec.syntax != SyntaxType::Integer || leaf.is_probe() {
                return Err(RowProbeError::config(
                    format!("{}.{}", field, leaf.name),
                    "RowStatus leaf must be type 'i' with a literal value",
                ));
            }
        }
        [_] => {
            return Err(RowProbeError::config(
                field,
                "RowStatus leaf must be the last leaf",
            ));
        }
        _ => {
            return Err(RowProbeError::config(
                field,
                "more than one RowStatus leaf",
            ));
        }
    }

    Ok(entry)
}

fn parse_index(field: &str, obj: &Map<String, Value>) -> RowProbeResult<Vec<IndexComponent>> {
    let mut components = Vec::new();
    for (key, value) in obj {
        let text = scalar_to_string(value).ok_or_else(|| {
            RowProbeError::config(
                format!("{}.index.{}", field, key),
                "index component must be a string or integer",
            )
        })?;
        if key.contains(NAME_INDEX_MARKER) {
            if !text.is_ascii() {
                return Err(RowProbeError::config(
                    format!("{}.index.{}", field, key),
                    "name-encoded index must be ASCII",
                ));
            }
            components.push(IndexComponent::EncodedName(text));
        } else {
            components.push(IndexComponent::Literal(text));
        }
    }
    Ok(components)
}

fn parse_leaf(field: &str, name: &str, obj: &Value) -> RowProbeResult<Leaf> {
    let leaf_field = format!("{}.{}", field, name);
    let Value::Object(attrs) = obj else {
        return Err(RowProbeError::config(leaf_field, "leaf must be an object"));
    };

    let syntax: SyntaxType = match attrs.get("type") {
        Some(Value::String(tag)) => tag
            .parse()
            .map_err(|e: RowProbeError| RowProbeError::config(leaf_field.clone(), e.to_string()))?,
        _ => return Err(RowProbeError::config(leaf_field, "missing string 'type'")),
    };

    let value = match attrs.get("value") {
        None => return Err(RowProbeError::config(leaf_field, "missing 'value'")),
        Some(Value::Null) if syntax == SyntaxType::String => LeafValue::Probe,
        Some(Value::Null) => {
            return Err(RowProbeError::config(
                leaf_field,
                "null value is only allowed on 's' leaves",
            ))
        }
        Some(v) => LeafValue::Literal(scalar_to_string(v).ok_or_else(|| {
            RowProbeError::config(leaf_field.clone(), "value must be a string or number")
        })?),
    };

    Ok(Leaf {
        name: name.to_string(),
        spec: LeafSpec { syntax, value },
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Batch leaf list in JSON form: `{ "MODULE": ["leaf", ...] }` or
/// `{ "MODULE": { "leaf": ..., ... } }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModuleLeaves {
    List(Vec<String>),
    Keys(Map<String, Value>),
}

/// Load the object list for batch single-leaf probing.
///
/// `.csv` files use the discovery output format (an `oid` column, or
/// `module` + `leafName` columns); anything else is read as JSON. Objects
/// are returned as `MODULE::leaf` or numeric OIDs, in file order.
pub fn parse_leaf_list_file(path: &str) -> RowProbeResult<Vec<String>> {
    let file = File::open(path)
        .map_err(|e| RowProbeError::config(path, format!("could not open file: {}", e)))?;

    let objects = if path.to_ascii_lowercase().ends_with(".csv") {
        parse_leaf_list_csv(BufReader::new(file), path)?
    } else {
        let modules: Map<String, Value> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RowProbeError::config(path, format!("invalid JSON: {}", e)))?;
        let mut objects = Vec::new();
        for (module, leaves) in modules {
            let leaves: ModuleLeaves = serde_json::from_value(leaves).map_err(|e| {
                RowProbeError::config(format!("{}:{}", path, module), e.to_string())
            })?;
            let names: Vec<String> = match leaves {
                ModuleLeaves::List(names) => names,
                ModuleLeaves::Keys(map) => map.into_iter().map(|(k, _)| k).collect(),
            };
            objects.extend(names.into_iter().map(|leaf| format!("{}::{}", module, leaf)));
        }
        objects
    };

    info!("Loaded {} objects from {}", objects.len(), path);
    Ok(objects)
}

fn parse_leaf_list_csv<R: BufRead>(reader: R, path: &str) -> RowProbeResult<Vec<String>> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line.map_err(|e| RowProbeError::io(path, e))?,
        None => return Err(RowProbeError::config(path, "empty CSV file")),
    };
    let columns = split_csv_line(&header)
        .ok_or_else(|| RowProbeError::config(path, format!("malformed CSV header: '{}'", header)))?;
    let position = |name: &str| columns.iter().position(|c| c == name);

    let oid_col = position("oid");
    let module_col = position("module");
    let leaf_col = position("leafName");
    if oid_col.is_none() && (module_col.is_none() || leaf_col.is_none()) {
        return Err(RowProbeError::config(
            path,
            "CSV header needs an 'oid' column or 'module' and 'leafName' columns",
        ));
    }

    let mut objects = Vec::new();
    for line in lines {
        let line = line.map_err(|e| RowProbeError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_csv_line(&line)
            .ok_or_else(|| RowProbeError::config(path, format!("malformed CSV row: '{}'", line)))?;
        let cell = |col: Option<usize>| {
            col.and_then(|c| cells.get(c))
                .map(String::as_str)
                .filter(|s| !s.is_empty())
        };
        match (cell(module_col), cell(leaf_col), cell(oid_col)) {
            (Some(module), Some(leaf), _) => objects.push(format!("{}::{}", module, leaf)),
            (_, _, Some(oid)) => objects.push(oid.to_string()),
            _ => {
                return Err(RowProbeError::config(
                    path,
                    format!("row without an object: '{}'", line),
                ))
            }
        }
    }
    Ok(objects)
}
