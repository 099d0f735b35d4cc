//! Reusable configuration fixtures.

use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

/// Module used by the fixtures.
pub const FLOW_MIB: &str = "WWP-LEOS-FLOW-MIB";

/// Numeric OIDs the fixtures register with the fake agent.
pub const FLOW_NAME_OID: &str = ".1.3.6.1.4.1.6141.2.60.6.1.1.1.2";
pub const FLOW_DESCR_OID: &str = ".1.3.6.1.4.1.6141.2.60.6.1.1.1.3";

/// Entry with one probe leaf and a createAndGo RowStatus.
pub fn single_probe_leaf_entry() -> Value {
    json!({
        FLOW_MIB: {
            "wwpLeosFlowCpuRateLimitEntry": {
                "index": { "wwpLeosFlowCpuRateLimitPort": "1" },
                "wwpLeosFlowCpuRateLimitMode": { "type": "i", "value": "2" },
                "wwpLeosFlowCpuRateLimitName": { "type": "s", "value": null },
                "wwpLeosFlowCpuRateLimitRowStatus": { "type": "i", "value": "4" }
            }
        }
    })
}

/// Entry with two probe leaves and a createAndWait RowStatus.
pub fn two_probe_leaf_entry() -> Value {
    json!({
        FLOW_MIB: {
            "wwpLeosFlowCpuRateLimitEntry": {
                "index": { "wwpLeosFlowCpuRateLimitPort": "1" },
                "wwpLeosFlowCpuRateLimitName": { "type": "s", "value": null },
                "wwpLeosFlowCpuRateLimitDescr": { "type": "s", "value": null },
                "wwpLeosFlowCpuRateLimitRowStatus": { "type": "i", "value": "5" }
            }
        }
    })
}

/// Two entries: a dependency with nothing to probe, then a probed entry
/// indexed by a name.
pub fn dependent_entries() -> Value {
    json!({
        FLOW_MIB: {
            "wwpLeosFlowServiceEntry": {
                "index": { "wwpLeosFlowServiceIndex": "7" },
                "wwpLeosFlowServiceMode": { "type": "i", "value": "1" },
                "wwpLeosFlowServiceRowStatus": { "type": "i", "value": "4" }
            },
            "wwpLeosFlowCpuRateLimitEntry": {
                "index": { "wwpLeosFlowServiceIndex": "7", "wwpLeosFlowCpuRateLimitName": "AB" },
                "wwpLeosFlowCpuRateLimitDescr": { "type": "s", "value": null },
                "wwpLeosFlowCpuRateLimitRowStatus": { "type": "i", "value": "4" }
            }
        }
    })
}

/// Writes `value` to a temporary file and returns the handle (the file is
/// removed when it is dropped).
pub fn write_temp_json(value: &Value) -> NamedTempFile {
    write_temp(&value.to_string(), ".json")
}

/// Writes `text` to a temporary file with `suffix`.
pub fn write_temp(text: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(text.as_bytes())
        .expect("Failed to write temp file");
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_keep_key_order() {
        let value = two_probe_leaf_entry();
        let keys: Vec<&String> = value[FLOW_MIB]["wwpLeosFlowCpuRateLimitEntry"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(keys[0], "index");
        assert_eq!(keys[3], "wwpLeosFlowCpuRateLimitRowStatus");
    }
}
