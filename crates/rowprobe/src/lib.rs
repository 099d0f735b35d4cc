//! rowprobe - SNMP table-row provisioning and string-leaf character probing
//!
//! Drives an SNMP agent through the net-snmp command-line tools to create
//! conceptual table rows (RowStatus create / validate / destroy) and to find
//! which ASCII punctuation characters the agent refuses in read-create and
//! read-write string leaves, at creation time and on later writes.
//!
//! # Architecture
//!
//! ```text
//! config ──► RowConfig ──► runner ──► EntryProber ──► RowLifecycle ─┐
//!                            │            │                        │
//!                            │            └──► ReportAggregator    ▼
//!                            └──────────────► ReportWriter    SnmpTransport
//!                                                              (NetSnmpTransport)
//! ```
//!
//! Everything talks to the agent through [`SnmpTransport`], so the drivers
//! can be exercised against an in-memory agent.

pub mod config;
pub mod discover;
pub mod index;
pub mod lifecycle;
pub mod netsnmp;
pub mod probe;
pub mod report;
pub mod runner;
pub mod types;

pub use config::{parse_leaf_list_file, parse_row_config, parse_row_config_file};
pub use index::{encode_name_index, IndexComponent};
pub use lifecycle::{RowLifecycle, RowState};
pub use netsnmp::{NetSnmpConfig, NetSnmpTransport};
pub use probe::{EntryProber, FillPolicy, ProbeOutcome, ProbeSettings, ValueStrategy};
pub use report::{Phase, ReportAggregator, ReportLayout, ReportWriter};
pub use types::{Leaf, LeafSpec, LeafValue, RowConfig, TableEntryDescriptor};

pub use rowprobe_common::{
    ObjectInfo, RowProbeError, RowProbeResult, RowStatus, SnmpTransport, SyntaxType, VarBind,
};
