//! MIB discovery: lists the writable string leaves under configured roots.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use tracing::{debug, info, warn};

use rowprobe_common::{RowProbeError, RowProbeResult, SnmpTransport};

use crate::report::{split_csv_line, ReportWriter};

/// Access levels worth probing.
const WRITABLE_ACCESS: [&str; 2] = ["CR", "RW"];

/// Type column shown by `snmptranslate -Tp` for textual leaves.
const STRING_TYPE: &str = "String";

/// Output header.
pub const DISCOVERY_COLUMNS: [&str; 4] = ["access", "module", "leafName", "oid"];

/// One (module, root) line of the discovery input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRoot {
    pub module: String,
    pub root: String,
}

/// A writable string leaf found in a MIB tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLeaf {
    pub access: String,
    pub module: String,
    pub leaf_name: String,
    pub oid: String,
}

impl DiscoveredLeaf {
    /// Output row in [`DISCOVERY_COLUMNS`] order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.access.clone(),
            self.module.clone(),
            self.leaf_name.clone(),
            self.oid.clone(),
        ]
    }
}

/// Parses one `-Tp` line, returning `(access, leaf)` for a read-create or
/// read-write String leaf.
///
/// ```text
/// |  |  +-- -RW- String    ifAlias(18)
/// ```
pub fn parse_tree_line(line: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let n = tokens.len();
    let access = tokens[n - 3].replace('-', "");
    if !WRITABLE_ACCESS.contains(&access.as_str()) || tokens[n - 2] != STRING_TYPE {
        return None;
    }
    let leaf = match tokens[n - 1].find('(') {
        Some(pos) if tokens[n - 1].ends_with(')') => &tokens[n - 1][..pos],
        _ => tokens[n - 1],
    };
    if leaf.is_empty() {
        return None;
    }
    Some((access, leaf.to_string()))
}

/// Reads the discovery input: a CSV with `moduleName` and `rootOid` columns.
pub fn parse_roots_file(path: &str) -> RowProbeResult<Vec<DiscoveryRoot>> {
    let file = File::open(path)
        .map_err(|e| RowProbeError::config(path, format!("could not open file: {}", e)))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line.map_err(|e| RowProbeError::io(path, e))?,
        None => return Err(RowProbeError::config(path, "empty CSV file")),
    };
    let columns = split_csv_line(&header)
        .ok_or_else(|| RowProbeError::config(path, format!("malformed CSV header: '{}'", header)))?;
    let (Some(module_col), Some(root_col)) = (
        columns.iter().position(|c| c == "moduleName"),
        columns.iter().position(|c| c == "rootOid"),
    ) else {
        return Err(RowProbeError::config(
            path,
            "CSV header needs 'moduleName' and 'rootOid' columns",
        ));
    };

    let mut roots = Vec::new();
    for line in lines {
        let line = line.map_err(|e| RowProbeError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_csv_line(&line)
            .ok_or_else(|| RowProbeError::config(path, format!("malformed CSV row: '{}'", line)))?;
        match (cells.get(module_col), cells.get(root_col)) {
            (Some(module), Some(root)) if !module.is_empty() && !root.is_empty() => {
                roots.push(DiscoveryRoot {
                    module: module.clone(),
                    root: root.clone(),
                })
            }
            _ => {
                return Err(RowProbeError::config(
                    path,
                    format!("row without module and root: '{}'", line),
                ))
            }
        }
    }
    info!("Loaded {} discovery roots from {}", roots.len(), path);
    Ok(roots)
}

/// Lists the writable string leaves under `root` and resolves their OIDs.
///
/// A leaf whose OID lookup fails is still returned, with an empty OID.
pub async fn discover_root<T>(transport: &T, root: &DiscoveryRoot) -> RowProbeResult<Vec<DiscoveredLeaf>>
where
    T: SnmpTransport + ?Sized,
{
    let listing = transport.subtree(&root.module, &root.root).await?;
    let mut leaves = Vec::new();
    for (access, leaf_name) in listing.lines().filter_map(parse_tree_line) {
        let object = format!("{}::{}", root.module, leaf_name);
        let oid = match transport.translate(&object).await {
            Ok(info) => info.oid,
            Err(e) => {
                warn!("Could not resolve {}: {}", object, e);
                String::new()
            }
        };
        debug!("Found {} {} {}", access, object, oid);
        leaves.push(DiscoveredLeaf {
            access,
            module: root.module.clone(),
            leaf_name,
            oid,
        });
    }
    Ok(leaves)
}

/// Walks every root and writes one CSV row per leaf. A root whose tree
/// cannot be listed is logged and skipped. Returns the number of leaves
/// written.
pub async fn run_discovery<T, W>(
    transport: &T,
    roots: &[DiscoveryRoot],
    writer: &mut ReportWriter<W>,
) -> RowProbeResult<usize>
where
    T: SnmpTransport + ?Sized,
    W: Write,
{
    writer
        .write_header()
        .map_err(|e| RowProbeError::io("discovery output", e))?;

    let mut written = 0;
    for root in roots {
        info!("Parsing {} from {}", root.module, root.root);
        let leaves = match discover_root(transport, root).await {
            Ok(leaves) => leaves,
            Err(e) => {
                warn!("Skipping {} {}: {}", root.module, root.root, e);
                continue;
            }
        };
        for leaf in &leaves {
            writer
                .write_row(&leaf.to_row())
                .map_err(|e| RowProbeError::io("discovery output", e))?;
        }
        written += leaves.len();
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_tree_line() {
        assert_eq!(
            parse_tree_line("|  |  +-- -RW- String    ifAlias(18)"),
            Some(("RW".to_string(), "ifAlias".to_string()))
        );
        assert_eq!(
            parse_tree_line("   +-- CR-- String    wwpLeosFlowName(3)"),
            Some(("CR".to_string(), "wwpLeosFlowName".to_string()))
        );
        assert_eq!(parse_tree_line("|  +-- -R-- String    sysDescr(1)"), None);
        assert_eq!(parse_tree_line("|  +-- -RW- INTEGER   ifAdminStatus(7)"), None);
        assert_eq!(parse_tree_line("|  |  Textual Convention: DisplayString"), None);
        assert_eq!(parse_tree_line("+--system(1)"), None);
    }

    #[test]
    fn test_parse_roots_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "moduleName,rootOid\nIF-MIB,.1.3.6.1.2.1.31\n\n\"SNMPv2-MIB\", system\n").unwrap();
        let roots = parse_roots_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(
            roots,
            vec![
                DiscoveryRoot {
                    module: "IF-MIB".to_string(),
                    root: ".1.3.6.1.2.1.31".to_string()
                },
                DiscoveryRoot {
                    module: "SNMPv2-MIB".to_string(),
                    root: "system".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_roots_file_bad_header() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "module,root\nIF-MIB,ifMIB\n").unwrap();
        let err = parse_roots_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("moduleName"));
    }
}
