//! Test infrastructure for rowprobe
//!
//! Provides:
//! - An in-memory SNMP agent implementing `SnmpTransport`, with RowStatus
//!   handling and configurable value refusals
//! - Row configuration fixtures
//! - Set-log verification helpers

pub mod fake_agent;
pub mod fixtures;
mod verification;

pub use fake_agent::{FakeAgent, RejectKind, RejectRule, RuleScope, SetRecord};
pub use fixtures::*;
pub use verification::*;
