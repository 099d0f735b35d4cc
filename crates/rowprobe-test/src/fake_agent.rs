//! In-memory SNMP agent for driving the lifecycle and probe engines.
//!
//! The agent keeps object instances by their symbolic name
//! (`MODULE::leaf.suffix`). A SET carrying a RowStatus varbind is handled as
//! a row operation:
//!
//! | value | row absent                     | row present            |
//! |-------|--------------------------------|------------------------|
//! | 4     | create, RowStatus = active     | destroy (legacy)       |
//! | 5     | create, RowStatus = notInService | refused              |
//! | 1     | refused                        | RowStatus = active     |
//! | 2     | refused                        | RowStatus = notInService |
//! | 6     | refused                        | destroy                |
//!
//! Every other SET writes its varbinds. A request with any refused varbind
//! changes nothing. Every request is appended to the set log, refused or not.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

use rowprobe_common::{
    ObjectInfo, RowProbeError, RowProbeResult, RowStatus, SnmpTransport, SyntaxType, VarBind,
};

/// Which requests a [`RejectRule`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Every request.
    Any,
    /// Requests that create a row.
    CreateOnly,
    /// Requests that write an existing row or scalar.
    WriteOnly,
}

/// Value shapes a [`RejectRule`] refuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectKind {
    /// Exactly this value.
    Value(String),
    /// Any value containing the character.
    Contains(char),
    /// A value made only of the character.
    Standalone(char),
    /// The character as first or last character.
    AtEdge(char),
    /// Values shorter than the length.
    ShorterThan(usize),
    /// Values longer than the length.
    LongerThan(usize),
}

impl RejectKind {
    fn refuses(&self, value: &str) -> bool {
        match self {
            RejectKind::Value(v) => value == v,
            RejectKind::Contains(c) => value.contains(*c),
            RejectKind::Standalone(c) => !value.is_empty() && value.chars().all(|ch| ch == *c),
            RejectKind::AtEdge(c) => value.starts_with(*c) || value.ends_with(*c),
            RejectKind::ShorterThan(n) => value.chars().count() < *n,
            RejectKind::LongerThan(n) => value.chars().count() > *n,
        }
    }
}

/// Refuses values of one leaf (matched by leaf name, without module or
/// index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectRule {
    pub leaf: String,
    pub kind: RejectKind,
    pub scope: RuleScope,
}

/// One SET request as the agent saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRecord {
    pub varbinds: Vec<VarBind>,
    pub accepted: bool,
}

impl SetRecord {
    /// Value sent for `object`, if the request carried it.
    pub fn value_of(&self, object: &str) -> Option<&str> {
        self.varbinds
            .iter()
            .find(|vb| vb.object == object)
            .map(|vb| vb.value.as_str())
    }
}

#[derive(Debug, Default)]
struct AgentState {
    values: BTreeMap<String, String>,
    /// RowStatus object -> member objects.
    rows: HashMap<String, Vec<String>>,
    rules: Vec<RejectRule>,
    refused_destroy: Vec<i64>,
    /// Objects whose GET fails even when they hold a value.
    unreadable: Vec<String>,
    objects: HashMap<String, ObjectInfo>,
    next: HashMap<String, (String, String)>,
    trees: HashMap<(String, String), String>,
    log: Vec<SetRecord>,
}

/// Splits `MODULE::leaf.suffix` into `(leaf, suffix)`.
fn leaf_of(object: &str) -> (&str, &str) {
    let unqualified = object.split_once("::").map(|(_, rest)| rest).unwrap_or(object);
    match unqualified.find('.') {
        Some(pos) => (&unqualified[..pos], &unqualified[pos..]),
        None => (unqualified, ""),
    }
}

fn is_row_status(object: &str) -> bool {
    leaf_of(object).0.to_ascii_lowercase().ends_with("rowstatus")
}

fn refused(object: &str, reason: &str) -> RowProbeError {
    RowProbeError::CommandFailed {
        command: format!("snmpset {}", object),
        exit_code: 2,
        output: format!("Error in packet.\nReason: {}\nFailed object: {}", reason, object),
    }
}

/// Shared in-memory agent; clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeAgent {
    state: Arc<Mutex<AgentState>>,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, f: impl FnOnce(&mut AgentState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    /// Adds a refusal rule.
    pub fn reject(self, leaf: &str, kind: RejectKind, scope: RuleScope) -> Self {
        self.with_state(|s| {
            s.rules.push(RejectRule {
                leaf: leaf.to_string(),
                kind,
                scope,
            })
        })
    }

    /// Refuses `destroy` requests carrying `value` (6 or 4).
    pub fn refuse_destroy_with(self, value: i64) -> Self {
        self.with_state(|s| s.refused_destroy.push(value))
    }

    /// Refuses every destroy request, so rows cannot be removed.
    pub fn refuse_destroy(self) -> Self {
        self.refuse_destroy_with(RowStatus::Destroy.value())
            .refuse_destroy_with(RowStatus::DESTROY_FALLBACK)
    }

    /// Makes GETs of `object` fail while SETs still apply.
    pub fn unreadable(self, object: &str) -> Self {
        self.with_state(|s| s.unreadable.push(object.to_string()))
    }

    /// Registers a string leaf for MIB lookups.
    pub fn with_string_leaf(self, module: &str, leaf: &str, oid: &str, syntax: &str) -> Self {
        let info = ObjectInfo {
            oid: oid.to_string(),
            label: Some(leaf.to_string()),
            module: Some(module.to_string()),
            syntax: Some(syntax.to_string()),
            access: Some("read-create".to_string()),
        };
        self.with_state(|s| {
            s.objects.insert(format!("{}::{}", module, leaf), info.clone());
            s.objects.insert(oid.to_string(), info);
        })
    }

    /// Stores an existing instance.
    pub fn with_value(self, object: &str, value: &str) -> Self {
        self.with_state(|s| {
            s.values.insert(object.to_string(), value.to_string());
        })
    }

    /// Answers GET-NEXT on `oid` with `(next_oid, value)`.
    pub fn with_next(self, oid: &str, next_oid: &str, value: &str) -> Self {
        self.with_state(|s| {
            s.next
                .insert(oid.to_string(), (next_oid.to_string(), value.to_string()));
        })
    }

    /// Answers `-Tp` listings of `root` in `module`.
    pub fn with_tree(self, module: &str, root: &str, listing: &str) -> Self {
        self.with_state(|s| {
            s.trees
                .insert((module.to_string(), root.to_string()), listing.to_string());
        })
    }

    /// Creates a row directly, bypassing the rules.
    pub fn with_row(self, row_status_object: &str, status: RowStatus, leaves: &[(&str, &str)]) -> Self {
        self.with_state(|s| {
            let mut members = vec![row_status_object.to_string()];
            for (object, value) in leaves {
                s.values.insert(object.to_string(), value.to_string());
                members.push(object.to_string());
            }
            s.values
                .insert(row_status_object.to_string(), status.as_str().to_string());
            s.rows.insert(row_status_object.to_string(), members);
        })
    }

    /// Current value of `object`.
    pub fn value(&self, object: &str) -> Option<String> {
        self.state.lock().unwrap().values.get(object).cloned()
    }

    /// True if the row controlled by `row_status_object` exists.
    pub fn row_exists(&self, row_status_object: &str) -> bool {
        self.state.lock().unwrap().rows.contains_key(row_status_object)
    }

    /// Every SET request so far, in order.
    pub fn set_log(&self) -> Vec<SetRecord> {
        self.state.lock().unwrap().log.clone()
    }

    /// Forgets the set log.
    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }
}

impl AgentState {
    fn check_rules(&self, varbinds: &[VarBind], creating: bool) -> Result<(), RowProbeError> {
        for vb in varbinds {
            let (leaf, _) = leaf_of(&vb.object);
            let refusal = self.rules.iter().find(|rule| {
                rule.leaf == leaf
                    && match rule.scope {
                        RuleScope::Any => true,
                        RuleScope::CreateOnly => creating,
                        RuleScope::WriteOnly => !creating,
                    }
                    && rule.kind.refuses(&vb.value)
            });
            if refusal.is_some() {
                return Err(refused(&vb.object, "wrongValue (The set value is illegal or unsupported in some way)"));
            }
        }
        Ok(())
    }

    fn destroy(&mut self, row_status_object: &str) {
        if let Some(members) = self.rows.remove(row_status_object) {
            for object in members {
                self.values.remove(&object);
            }
        }
    }

    fn apply(&mut self, varbinds: &[VarBind]) -> RowProbeResult<()> {
        let Some(control) = varbinds.iter().find(|vb| is_row_status(&vb.object)) else {
            self.check_rules(varbinds, false)?;
            for vb in varbinds {
                self.values.insert(vb.object.clone(), vb.value.clone());
            }
            return Ok(());
        };

        let status: i64 = control
            .value
            .parse()
            .map_err(|_| refused(&control.object, "wrongType"))?;
        let exists = self.rows.contains_key(&control.object);
        let others: Vec<VarBind> = varbinds
            .iter()
            .filter(|vb| vb.object != control.object)
            .cloned()
            .collect();

        match (status, exists) {
            (4, false) | (5, false) => {
                self.check_rules(&others, true)?;
                let initial = if status == 4 {
                    RowStatus::Active
                } else {
                    RowStatus::NotInService
                };
                let mut members = vec![control.object.clone()];
                for vb in &others {
                    self.values.insert(vb.object.clone(), vb.value.clone());
                    members.push(vb.object.clone());
                }
                self.values
                    .insert(control.object.clone(), initial.as_str().to_string());
                self.rows.insert(control.object.clone(), members);
                Ok(())
            }
            (6, true) | (4, true) => {
                if self.refused_destroy.contains(&status) {
                    return Err(refused(&control.object, "inconsistentValue"));
                }
                self.destroy(&control.object);
                Ok(())
            }
            (1, true) | (2, true) => {
                self.check_rules(&others, false)?;
                for vb in &others {
                    self.values.insert(vb.object.clone(), vb.value.clone());
                }
                let status = RowStatus::from_value(status).unwrap_or(RowStatus::Active);
                self.values
                    .insert(control.object.clone(), status.as_str().to_string());
                Ok(())
            }
            _ => Err(refused(&control.object, "inconsistentValue")),
        }
    }
}

#[async_trait]
impl SnmpTransport for FakeAgent {
    async fn get(&self, object: &str) -> RowProbeResult<String> {
        let state = self.state.lock().unwrap();
        if state.unreadable.iter().any(|o| o == object) {
            return Err(RowProbeError::CommandFailed {
                command: format!("snmpget {}", object),
                exit_code: 1,
                output: "Timeout: No Response from agent".to_string(),
            });
        }
        state
            .values
            .get(object)
            .cloned()
            .ok_or_else(|| RowProbeError::NoSuchObject {
                object: object.to_string(),
            })
    }

    async fn get_next(&self, object: &str) -> RowProbeResult<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .next
            .get(object)
            .cloned()
            .ok_or_else(|| RowProbeError::NoSuchObject {
                object: object.to_string(),
            })
    }

    async fn set(&self, varbinds: &[VarBind]) -> RowProbeResult<()> {
        let mut state = self.state.lock().unwrap();
        let result = state.apply(varbinds);
        debug!("fake set {:?} -> {}", varbinds, result.is_ok());
        state.log.push(SetRecord {
            varbinds: varbinds.to_vec(),
            accepted: result.is_ok(),
        });
        result
    }

    async fn translate(&self, object: &str) -> RowProbeResult<ObjectInfo> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(object)
            .cloned()
            .ok_or_else(|| RowProbeError::parse("snmptranslate", format!("Unknown object identifier: {}", object)))
    }

    async fn subtree(&self, module: &str, root: &str) -> RowProbeResult<String> {
        self.state
            .lock()
            .unwrap()
            .trees
            .get(&(module.to_string(), root.to_string()))
            .cloned()
            .ok_or_else(|| RowProbeError::parse("snmptranslate", format!("Unknown root {}", root)))
    }
}

/// Varbind helper for tests that build requests by hand.
pub fn string_varbind(object: &str, value: &str) -> VarBind {
    VarBind::new(object, SyntaxType::String, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RS: &str = "M-MIB::fooRowStatus.1";

    #[tokio::test]
    async fn test_create_and_wait_then_activate() {
        let agent = FakeAgent::new();
        agent
            .set(&[string_varbind("M-MIB::fooName.1", "a"), VarBind::integer(RS, 5)])
            .await
            .unwrap();
        assert_eq!(agent.get(RS).await.unwrap(), "notInService");
        agent.set(&[VarBind::integer(RS, 1)]).await.unwrap();
        assert_eq!(agent.get(RS).await.unwrap(), "active");
    }

    #[tokio::test]
    async fn test_create_on_existing_row_is_refused() {
        let agent = FakeAgent::new().with_row(RS, RowStatus::Active, &[]);
        assert!(agent.set(&[VarBind::integer(RS, 5)]).await.is_err());
    }

    #[tokio::test]
    async fn test_destroy_removes_members() {
        let agent = FakeAgent::new().with_row(RS, RowStatus::Active, &[("M-MIB::fooName.1", "x")]);
        agent.set(&[VarBind::integer(RS, 6)]).await.unwrap();
        assert!(!agent.row_exists(RS));
        assert_eq!(agent.value("M-MIB::fooName.1"), None);
    }

    #[tokio::test]
    async fn test_refused_request_changes_nothing() {
        let agent = FakeAgent::new().reject("fooName", RejectKind::Contains('#'), RuleScope::Any);
        let err = agent
            .set(&[string_varbind("M-MIB::fooName.1", "a#"), VarBind::integer(RS, 4)])
            .await
            .unwrap_err();
        assert!(err.is_transport_failure());
        assert!(!agent.row_exists(RS));
        assert!(!agent.set_log()[0].accepted);
    }

    #[test]
    fn test_reject_kinds() {
        assert!(RejectKind::Standalone('#').refuses("####"));
        assert!(!RejectKind::Standalone('#').refuses("a#"));
        assert!(RejectKind::AtEdge('#').refuses("a#"));
        assert!(!RejectKind::AtEdge('#').refuses("a#b"));
        assert!(RejectKind::ShorterThan(4).refuses("a#b"));
        assert!(RejectKind::LongerThan(2).refuses("ph1"));
        assert!(!RejectKind::LongerThan(2).refuses("ph"));
    }

    #[tokio::test]
    async fn test_refuse_destroy_keeps_row() {
        let agent = FakeAgent::new()
            .with_row(RS, RowStatus::Active, &[])
            .refuse_destroy();
        assert!(agent.set(&[VarBind::integer(RS, 6)]).await.is_err());
        assert!(agent.set(&[VarBind::integer(RS, 4)]).await.is_err());
        assert!(agent.row_exists(RS));
    }

    #[tokio::test]
    async fn test_unreadable_object_still_accepts_sets() {
        let agent = FakeAgent::new().unreadable(RS);
        agent.set(&[VarBind::integer(RS, 5)]).await.unwrap();
        assert!(agent.get(RS).await.is_err());
        assert_eq!(agent.value(RS), Some("notInService".to_string()));
    }
}
