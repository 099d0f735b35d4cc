//! Row Lifecycle Driver.
//!
//! Drives one conceptual row through create → (validate) → exercise →
//! destroy using its RowStatus leaf as the control variable. Remote
//! failures are logged and folded into [`RowState`]; nothing here aborts a
//! run.

use tracing::{debug, info, instrument, warn};

use rowprobe_common::{RowProbeResult, RowStatus, SnmpTransport, VarBind};

use crate::types::TableEntryDescriptor;

/// Locally tracked state of the remote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// No row on the agent (never created, create failed, or destroyed).
    Absent,
    /// Created but not yet known to be active.
    UnderCreation,
    /// RowStatus reads or was set to active(1).
    Active,
    /// Destroy was refused twice; the agent holds a row we cannot remove.
    Invalid,
}

impl RowState {
    /// Returns the state name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RowState::Absent => "absent",
            RowState::UnderCreation => "underCreation",
            RowState::Active => "active",
            RowState::Invalid => "invalid",
        }
    }
}

/// Lifecycle driver for one table entry.
pub struct RowLifecycle<'a, T: SnmpTransport + ?Sized> {
    transport: &'a T,
    entry: &'a TableEntryDescriptor,
    state: RowState,
}

impl<'a, T: SnmpTransport + ?Sized> RowLifecycle<'a, T> {
    /// Creates a driver; the row is assumed absent until observed otherwise.
    pub fn new(transport: &'a T, entry: &'a TableEntryDescriptor) -> Self {
        Self {
            transport,
            entry,
            state: RowState::Absent,
        }
    }

    /// Current local view of the row.
    pub fn state(&self) -> RowState {
        self.state
    }

    /// The entry this driver manages.
    pub fn entry(&self) -> &TableEntryDescriptor {
        self.entry
    }

    /// Sends one create request carrying a varbind per leaf.
    ///
    /// On success the row is `UnderCreation` (a createAndGo row turns active
    /// on its own; [`Self::validate`] finds out). On failure the row is
    /// `Absent` and the error is returned so probes can react to it.
    #[instrument(skip(self, varbinds), fields(entry = %self.entry.qualified_name()))]
    pub async fn create(&mut self, varbinds: &[VarBind]) -> RowProbeResult<()> {
        match self.transport.set(varbinds).await {
            Ok(()) => {
                self.state = if self.entry.row_status().is_some() {
                    RowState::UnderCreation
                } else {
                    RowState::Active
                };
                debug!("Created {}", self.entry.qualified_name());
                Ok(())
            }
            Err(e) => {
                if self.entry.row_status().is_some() {
                    self.state = RowState::Absent;
                }
                Err(e)
            }
        }
    }

    /// Reads RowStatus and returns true unless it reads active.
    ///
    /// An unreadable RowStatus counts as "needs validation": the create path
    /// keeps moving and a redundant validate is harmless. Tables without a
    /// RowStatus leaf never need validation.
    pub async fn needs_validation(&mut self) -> bool {
        let Some(object) = self.entry.row_status_object() else {
            return false;
        };
        match self.transport.get(&object).await {
            Ok(value) => match RowStatus::parse(&value) {
                Some(RowStatus::Active) => {
                    self.state = RowState::Active;
                    false
                }
                Some(status) => {
                    debug!("{} reads {}", object, status);
                    if self.state == RowState::Absent {
                        self.state = RowState::UnderCreation;
                    }
                    true
                }
                None => {
                    warn!("Unrecognised RowStatus '{}' on {}, assuming not active", value, object);
                    true
                }
            },
            Err(e) => {
                warn!("Could not read {}: {}, assuming validation needed", object, e);
                true
            }
        }
    }

    /// Reads RowStatus and reports whether the row exists on the agent.
    pub async fn exists(&mut self) -> bool {
        let Some(object) = self.entry.row_status_object() else {
            return true;
        };
        match self.transport.get(&object).await {
            Ok(value) => match RowStatus::parse(&value) {
                Some(RowStatus::Active) => {
                    self.state = RowState::Active;
                    true
                }
                Some(_) => {
                    self.state = RowState::UnderCreation;
                    true
                }
                None => false,
            },
            Err(_) => {
                self.state = RowState::Absent;
                false
            }
        }
    }

    /// Sets RowStatus to active(1) if the row is not already active.
    ///
    /// Safe on an active row: no request is sent. A rejected set is logged
    /// and leaves the state unchanged.
    #[instrument(skip(self), fields(entry = %self.entry.qualified_name()))]
    pub async fn validate(&mut self) -> RowState {
        if !self.needs_validation().await {
            return self.state;
        }
        let Some(object) = self.entry.row_status_object() else {
            return self.state;
        };
        match self
            .transport
            .set(&[VarBind::integer(&object, RowStatus::Active.value())])
            .await
        {
            Ok(()) => {
                info!("Validated {}", self.entry.qualified_name());
                self.state = RowState::Active;
            }
            Err(e) => warn!("ERROR validating {}: {}", object, e),
        }
        self.state
    }

    /// Sets RowStatus to destroy(6), falling back to invalid(4) once.
    ///
    /// Returns true if either request was accepted. A double failure is
    /// logged and leaves the row `Invalid`.
    #[instrument(skip(self), fields(entry = %self.entry.qualified_name()))]
    pub async fn destroy(&mut self) -> bool {
        let Some(object) = self.entry.row_status_object() else {
            debug!("{} has no RowStatus leaf, nothing to destroy", self.entry.qualified_name());
            return false;
        };

        for value in [RowStatus::Destroy.value(), RowStatus::DESTROY_FALLBACK] {
            match self.transport.set(&[VarBind::integer(&object, value)]).await {
                Ok(()) => {
                    debug!("Destroyed {} with {}", object, value);
                    self.state = RowState::Absent;
                    return true;
                }
                Err(e) => debug!("Destroy of {} with {} refused: {}", object, value, e),
            }
        }

        warn!("ERROR deleting {}", object);
        self.state = RowState::Invalid;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexComponent;
    use crate::types::Leaf;
    use async_trait::async_trait;
    use rowprobe_common::{ObjectInfo, RowProbeError, SyntaxType};
    use std::sync::Mutex;

    /// Scripted transport: answers GETs from a fixed reply and records SETs.
    struct Scripted {
        get_reply: Option<String>,
        refuse_values: Vec<String>,
        sets: Mutex<Vec<Vec<VarBind>>>,
    }

    impl Scripted {
        fn new(get_reply: Option<&str>) -> Self {
            Self {
                get_reply: get_reply.map(str::to_string),
                refuse_values: Vec::new(),
                sets: Mutex::new(Vec::new()),
            }
        }

        fn refusing(mut self, values: &[&str]) -> Self {
            self.refuse_values = values.iter().map(|v| v.to_string()).collect();
            self
        }

        fn sent(&self) -> Vec<Vec<VarBind>> {
            self.sets.lock().unwrap().clone()
        }
    }

    fn refused() -> RowProbeError {
        RowProbeError::CommandFailed {
            command: "snmpset".to_string(),
            exit_code: 2,
            output: "Reason: wrongValue".to_string(),
        }
    }

    #[async_trait]
    impl SnmpTransport for Scripted {
        async fn get(&self, object: &str) -> RowProbeResult<String> {
            self.get_reply.clone().ok_or(RowProbeError::NoSuchObject {
                object: object.to_string(),
            })
        }
        async fn get_next(&self, _object: &str) -> RowProbeResult<(String, String)> {
            Err(refused())
        }
        async fn set(&self, varbinds: &[VarBind]) -> RowProbeResult<()> {
            self.sets.lock().unwrap().push(varbinds.to_vec());
            if varbinds.iter().any(|vb| self.refuse_values.contains(&vb.value)) {
                Err(refused())
            } else {
                Ok(())
            }
        }
        async fn translate(&self, _object: &str) -> RowProbeResult<ObjectInfo> {
            Err(refused())
        }
        async fn subtree(&self, _module: &str, _root: &str) -> RowProbeResult<String> {
            Err(refused())
        }
    }

    fn entry() -> TableEntryDescriptor {
        TableEntryDescriptor::new("M-MIB", "fooEntry")
            .with_index(IndexComponent::Literal("3".to_string()))
            .with_leaf(Leaf::literal("fooMode", SyntaxType::Integer, "1"))
            .with_leaf(Leaf::literal("fooRowStatus", SyntaxType::Integer, "5"))
    }

    #[tokio::test]
    async fn test_needs_validation() {
        let entry = entry();
        let active = Scripted::new(Some("active"));
        assert!(!RowLifecycle::new(&active, &entry).needs_validation().await);

        let waiting = Scripted::new(Some("notInService"));
        assert!(RowLifecycle::new(&waiting, &entry).needs_validation().await);

        let unreadable = Scripted::new(None);
        assert!(RowLifecycle::new(&unreadable, &entry).needs_validation().await);
    }

    #[tokio::test]
    async fn test_validate_active_row_sends_nothing() {
        let entry = entry();
        let agent = Scripted::new(Some("active(1)"));
        let mut row = RowLifecycle::new(&agent, &entry);
        assert_eq!(row.validate().await, RowState::Active);
        assert!(agent.sent().is_empty());
    }

    #[tokio::test]
    async fn test_validate_sets_active() {
        let entry = entry();
        let agent = Scripted::new(Some("notReady"));
        let mut row = RowLifecycle::new(&agent, &entry);
        assert_eq!(row.validate().await, RowState::Active);
        assert_eq!(
            agent.sent(),
            vec![vec![VarBind::integer("M-MIB::fooRowStatus.3", 1)]]
        );
    }

    #[tokio::test]
    async fn test_destroy_falls_back_to_invalid() {
        let entry = entry();
        let agent = Scripted::new(Some("active")).refusing(&["6"]);
        let mut row = RowLifecycle::new(&agent, &entry);
        assert!(row.destroy().await);
        assert_eq!(row.state(), RowState::Absent);
        let values: Vec<String> = agent.sent().iter().map(|s| s[0].value.clone()).collect();
        assert_eq!(values, vec!["6", "4"]);
    }

    #[tokio::test]
    async fn test_destroy_double_failure_is_reported() {
        let entry = entry();
        let agent = Scripted::new(Some("active")).refusing(&["6", "4"]);
        let mut row = RowLifecycle::new(&agent, &entry);
        assert!(!row.destroy().await);
        assert_eq!(row.state(), RowState::Invalid);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_row_absent() {
        let entry = entry();
        let agent = Scripted::new(None).refusing(&["5"]);
        let mut row = RowLifecycle::new(&agent, &entry);
        let vbs = entry.create_varbinds(|_, _| String::new());
        assert!(row.create(&vbs).await.is_err());
        assert_eq!(row.state(), RowState::Absent);
    }

    #[tokio::test]
    async fn test_table_without_row_status() {
        let entry = TableEntryDescriptor::new("M-MIB", "barEntry")
            .with_index(IndexComponent::Literal("1".to_string()))
            .with_leaf(Leaf::probe("barName"));
        let agent = Scripted::new(None);
        let mut row = RowLifecycle::new(&agent, &entry);
        assert!(!row.needs_validation().await);
        assert!(!row.destroy().await);
        assert!(row.exists().await);
        assert!(agent.sent().is_empty());
    }
}
