//! End-to-end runs: configuration files in, report text out.

use pretty_assertions::assert_eq;

use rowprobe::discover::{parse_roots_file, run_discovery, DiscoveryRoot, DISCOVERY_COLUMNS};
use rowprobe::runner::{run_creation_probe, run_leaf_probe, run_provision};
use rowprobe::{
    parse_leaf_list_file, parse_row_config_file, ProbeSettings, ReportLayout, ReportWriter,
};
use rowprobe_test::{
    dependent_entries, write_temp, write_temp_json, FakeAgent, RejectKind, RuleScope, FLOW_MIB,
};

const DESCR: &str = "WWP-LEOS-FLOW-MIB::wwpLeosFlowCpuRateLimitDescr.7.65.66";

#[tokio::test]
async fn test_provision_creates_every_entry() {
    let file = write_temp_json(&dependent_entries());
    let config = parse_row_config_file(file.path().to_str().unwrap()).unwrap();
    let agent = FakeAgent::new();

    let summary = run_provision(&agent, &config).await;
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        agent.value(&format!("{}::wwpLeosFlowServiceRowStatus.7", FLOW_MIB)),
        Some("active".to_string())
    );
    assert_eq!(agent.value(DESCR), Some("ph1".to_string()));
}

#[tokio::test]
async fn test_provision_continues_after_refusal() {
    let config = parse_row_config_file(write_temp_json(&dependent_entries()).path().to_str().unwrap())
        .unwrap();
    let agent = FakeAgent::new().reject(
        "wwpLeosFlowServiceMode",
        RejectKind::Value("1".to_string()),
        RuleScope::Any,
    );

    let summary = run_provision(&agent, &config).await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(agent.value(DESCR), Some("ph1".to_string()));
}

#[tokio::test]
async fn test_creation_probe_report() {
    let file = write_temp_json(&dependent_entries());
    let config = parse_row_config_file(file.path().to_str().unwrap()).unwrap();
    let agent = FakeAgent::new().reject(
        "wwpLeosFlowCpuRateLimitDescr",
        RejectKind::Contains('\''),
        RuleScope::Any,
    );
    let settings = ProbeSettings::default().with_chars("#'");
    let mut writer = ReportWriter::tsv(Vec::new(), ReportLayout::CreationProbe.columns(false));

    let summary = run_creation_probe(&agent, &config, &settings, false, &mut writer)
        .await
        .unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.rows, 1);

    let text = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(
        text,
        format!(
            "MODULE::leafName\tdisallowed-chars(CREATE)\tdisallowed-chars(POST-CREATE)\n{}\t''''\t''''\n",
            DESCR
        )
    );
}

#[tokio::test]
async fn test_leaf_probe_batch_report() {
    let alias_oid = ".1.3.6.1.2.1.31.1.1.1.18";
    let agent = FakeAgent::new()
        .with_string_leaf("IF-MIB", "ifAlias", alias_oid, "DisplayString (SIZE (0..64))")
        .with_next(alias_oid, ".1.3.6.1.2.1.31.1.1.1.18.1", "uplink")
        .reject("ifAlias", RejectKind::Standalone('$'), RuleScope::Any)
        .reject("ifAlias", RejectKind::Contains('|'), RuleScope::Any);
    let list = write_temp(r#"{ "IF-MIB": ["ifAlias", "ifDescrUnknown"] }"#, ".json");
    let objects = parse_leaf_list_file(list.path().to_str().unwrap()).unwrap();
    let settings = ProbeSettings::single_leaf().with_chars("$%|");
    let mut writer = ReportWriter::tsv(Vec::new(), ReportLayout::LeafProbe.columns(true));

    let summary = run_leaf_probe(&agent, &objects, &settings, true, &mut writer)
        .await
        .unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);

    let text = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(
        text,
        "MODULE::leafName\tdisallowed-chars\tplacement-sensitive\nIF-MIB::ifAlias\t|\t$c1\n"
    );
}

#[tokio::test]
async fn test_discovery_writes_writable_string_leaves() {
    let listing = "\
+--ifXTable(1)
   |
   +--ifXEntry(1)
      |  Index: ifIndex
      |
      +-- -R-- String    ifName(1)
      +-- -RW- EnumVal   ifLinkUpDownTrapEnable(14)
      +-- -RW- String    ifAlias(18)
               Textual Convention: DisplayString
";
    let agent = FakeAgent::new()
        .with_tree("IF-MIB", "ifXTable", listing)
        .with_string_leaf(
            "IF-MIB",
            "ifAlias",
            ".1.3.6.1.2.1.31.1.1.1.18",
            "DisplayString (SIZE (0..64))",
        );
    let roots_file = write_temp("moduleName,rootOid\nIF-MIB,ifXTable\nMISSING-MIB,nowhere\n", ".csv");
    let roots = parse_roots_file(roots_file.path().to_str().unwrap()).unwrap();
    assert_eq!(
        roots[0],
        DiscoveryRoot {
            module: "IF-MIB".to_string(),
            root: "ifXTable".to_string()
        }
    );

    let columns = DISCOVERY_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut writer = ReportWriter::csv(Vec::new(), columns);
    let written = run_discovery(&agent, &roots, &mut writer).await.unwrap();
    assert_eq!(written, 1);

    let text = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(
        text,
        "access,module,leafName,oid\nRW,IF-MIB,ifAlias,.1.3.6.1.2.1.31.1.1.1.18\n"
    );

    let leaves_csv = write_temp(&text, ".csv");
    let objects = parse_leaf_list_file(leaves_csv.path().to_str().unwrap()).unwrap();
    assert_eq!(objects, vec!["IF-MIB::ifAlias"]);
}
