//! Leaf Value Probe.
//!
//! For every probe character the agent is offered up to three values, in
//! order, stopping at the first accepted one:
//!
//! 1. plain: the character repeated to the leaf's baseline length
//! 2. prefixed: `"a" + c`
//! 3. sandwiched: `"a" + c + "b"`
//!
//! The number of refused attempts is the [`ProbeOutcome`]. A character
//! refused three times is disallowed; one accepted after a placement change
//! is reported separately.
//!
//! Creation-time probing ([`EntryProber::creation_pass`]) pushes the values
//! through row creation, one probe leaf per request with every other probe
//! leaf held at its placeholder. Post-creation probing
//! ([`EntryProber::post_creation_pass`]) writes the same values to the live
//! row. [`probe_single_leaf`] exercises one existing instance found by
//! GET-NEXT.

use tracing::{debug, info, instrument, warn};

use rowprobe_common::defaults::{FIXED_FILL_LEN, PROBE_CHARS};
use rowprobe_common::{
    RowProbeError, RowProbeResult, SnmpTransport, SyntaxType, VarBind,
};

use crate::lifecycle::{RowLifecycle, RowState};
use crate::report::{Phase, ReportAggregator};
use crate::types::{placeholder_value, TableEntryDescriptor};

/// Result of offering one character to one leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    /// The plain value was accepted.
    Accepted,
    /// Refused standalone, accepted with a prefix.
    RejectedStage1,
    /// Accepted only sandwiched.
    RejectedStage2,
    /// Refused in every placement.
    RejectedStage3,
}

impl ProbeOutcome {
    /// Outcome after `failures` refused attempts.
    pub fn after_failures(failures: usize) -> Self {
        match failures {
            0 => ProbeOutcome::Accepted,
            1 => ProbeOutcome::RejectedStage1,
            2 => ProbeOutcome::RejectedStage2,
            _ => ProbeOutcome::RejectedStage3,
        }
    }

    /// Last refused stage, if any.
    pub fn stage(&self) -> Option<u8> {
        match self {
            ProbeOutcome::Accepted => None,
            ProbeOutcome::RejectedStage1 => Some(1),
            ProbeOutcome::RejectedStage2 => Some(2),
            ProbeOutcome::RejectedStage3 => Some(3),
        }
    }

    /// True if no placement was accepted.
    pub fn is_disallowed(&self) -> bool {
        *self == ProbeOutcome::RejectedStage3
    }

    /// True if the agent accepted some value, i.e. the set went through.
    pub fn was_accepted(&self) -> bool {
        !self.is_disallowed()
    }
}

/// How a candidate value is built from the probe character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueStrategy {
    Plain,
    Prefixed,
    Sandwiched,
}

impl ValueStrategy {
    /// Strategies in the order they are tried.
    pub const LADDER: [ValueStrategy; 3] = [
        ValueStrategy::Plain,
        ValueStrategy::Prefixed,
        ValueStrategy::Sandwiched,
    ];

    /// Stage number (1-based).
    pub fn stage(&self) -> u8 {
        match self {
            ValueStrategy::Plain => 1,
            ValueStrategy::Prefixed => 2,
            ValueStrategy::Sandwiched => 3,
        }
    }

    /// Builds the candidate value.
    pub fn build(&self, c: char, baseline_len: usize) -> String {
        match self {
            ValueStrategy::Plain => std::iter::repeat(c).take(baseline_len.max(1)).collect(),
            ValueStrategy::Prefixed => format!("a{}", c),
            ValueStrategy::Sandwiched => format!("a{}b", c),
        }
    }
}

/// Candidate values for `c`, in ladder order.
pub fn ladder_values(c: char, baseline_len: usize) -> impl Iterator<Item = (ValueStrategy, String)> {
    ValueStrategy::LADDER
        .into_iter()
        .map(move |s| (s, s.build(c, baseline_len)))
}

/// Length of the plain (stage 1) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// The leaf's minimum length, at least 1.
    MinLength,
    /// `n` characters whenever the leaf needs more than one.
    Fixed(usize),
}

impl FillPolicy {
    /// Baseline length for a leaf with minimum length `min_len`.
    pub fn baseline_len(&self, min_len: usize) -> usize {
        match self {
            FillPolicy::MinLength => min_len.max(1),
            FillPolicy::Fixed(n) if min_len > 1 => (*n).max(min_len),
            FillPolicy::Fixed(_) => 1,
        }
    }
}

/// Probe character set and fill policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub chars: Vec<char>,
    pub fill: FillPolicy,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            chars: PROBE_CHARS.chars().collect(),
            fill: FillPolicy::MinLength,
        }
    }
}

impl ProbeSettings {
    /// Settings for probing a single existing leaf.
    pub fn single_leaf() -> Self {
        Self {
            fill: FillPolicy::Fixed(FIXED_FILL_LEN),
            ..Self::default()
        }
    }

    /// Restricts the probe to `chars`, keeping their order.
    pub fn with_chars(mut self, chars: &str) -> Self {
        self.chars = chars.chars().collect();
        self
    }
}

/// Runs the ladder with direct SETs built by `build(value)`.
pub async fn run_ladder<T, F>(
    transport: &T,
    c: char,
    baseline_len: usize,
    mut build: F,
) -> ProbeOutcome
where
    T: SnmpTransport + ?Sized,
    F: FnMut(&str) -> Vec<VarBind>,
{
    let mut failures = 0;
    for (strategy, value) in ladder_values(c, baseline_len) {
        match transport.set(&build(&value)).await {
            Ok(()) => break,
            Err(e) => {
                debug!("Stage {} value '{}' refused: {}", strategy.stage(), value, e);
                failures += 1;
            }
        }
    }
    ProbeOutcome::after_failures(failures)
}

/// Minimum and maximum string length of `object_type` from its SYNTAX
/// clause; no bounds when the MIB lookup fails.
pub async fn string_bounds<T>(transport: &T, object_type: &str) -> (usize, Option<usize>)
where
    T: SnmpTransport + ?Sized,
{
    match transport.translate(object_type).await {
        Ok(info) => (info.min_string_length(), info.max_string_length()),
        Err(e) => {
            warn!("Could not look up SYNTAX of {}: {}, assuming no minimum", object_type, e);
            (0, None)
        }
    }
}

/// Known-good placeholder values for every probe leaf of `entry`.
pub async fn placeholders_for<T>(transport: &T, entry: &TableEntryDescriptor) -> Vec<String>
where
    T: SnmpTransport + ?Sized,
{
    let mut values = Vec::new();
    for (ordinal, leaf) in entry.probe_leaves().into_iter().enumerate() {
        let (min_len, max_len) = string_bounds(transport, &entry.object_type(leaf)).await;
        values.push(placeholder_value(ordinal, min_len, max_len));
    }
    values
}

/// Creation-time and post-creation prober for one table entry.
pub struct EntryProber<'a, T: SnmpTransport + ?Sized> {
    transport: &'a T,
    entry: &'a TableEntryDescriptor,
    settings: &'a ProbeSettings,
    min_lengths: Vec<usize>,
    placeholders: Vec<String>,
}

impl<'a, T: SnmpTransport + ?Sized> EntryProber<'a, T> {
    /// Looks up the size bounds of every probe leaf.
    pub async fn new(
        transport: &'a T,
        entry: &'a TableEntryDescriptor,
        settings: &'a ProbeSettings,
    ) -> EntryProber<'a, T> {
        let mut min_lengths = Vec::new();
        let mut placeholders = Vec::new();
        for (ordinal, leaf) in entry.probe_leaves().into_iter().enumerate() {
            let (min_len, max_len) = string_bounds(transport, &entry.object_type(leaf)).await;
            min_lengths.push(min_len);
            placeholders.push(placeholder_value(ordinal, min_len, max_len));
        }
        Self {
            transport,
            entry,
            settings,
            min_lengths,
            placeholders,
        }
    }

    /// Placeholder values, one per probe leaf.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Create request with probe leaf `probed` set to `value`.
    fn create_request(&self, probed: usize, value: &str) -> Vec<VarBind> {
        self.entry.create_varbinds(|ordinal, _| {
            if ordinal == probed {
                value.to_string()
            } else {
                self.placeholders[ordinal].clone()
            }
        })
    }

    /// Create request with placeholders only.
    fn placeholder_request(&self) -> Vec<VarBind> {
        self.entry
            .create_varbinds(|ordinal, _| self.placeholders[ordinal].clone())
    }

    /// Write request to the live row with probe leaf `probed` set to `value`.
    fn write_request(&self, probed: usize, value: &str) -> Vec<VarBind> {
        self.entry.probe_varbinds(|ordinal, _| {
            if ordinal == probed {
                value.to_string()
            } else {
                self.placeholders[ordinal].clone()
            }
        })
    }

    /// Both passes: creation-time first, then post-creation on the row the
    /// creation pass leaves behind.
    pub async fn run(&self, report: &mut ReportAggregator) -> RowState {
        info!("exercising special chars DURING table create...");
        let state = self.creation_pass(report).await;
        info!("exercising special chars POST create...");
        self.post_creation_pass(report).await;
        state
    }

    /// Probes every character against row creation.
    ///
    /// With a RowStatus leaf, each accepted create is validated and then
    /// destroyed so the next attempt starts from an absent row, except after
    /// the final probe. If the row is absent at the end it is recreated with
    /// placeholders so the post-creation pass has a live row.
    ///
    /// A row that cannot be destroyed ends the pass: every later create would
    /// be refused because the row exists, so no further characters are
    /// recorded for this phase.
    #[instrument(skip(self, report), fields(entry = %self.entry.qualified_name()))]
    pub async fn creation_pass(&self, report: &mut ReportAggregator) -> RowState {
        let probes = self.entry.probe_leaves();
        let has_row_status = self.entry.row_status().is_some();
        let mut row = RowLifecycle::new(self.transport, self.entry);

        if has_row_status && row.exists().await {
            info!(
                "{} already exists, destroying it before the creation pass",
                self.entry.qualified_name()
            );
            if !row.destroy().await {
                warn!(
                    "{} could not be destroyed, skipping creation probes",
                    self.entry.qualified_name()
                );
                return row.state();
            }
        }

        let last_char = self.settings.chars.len().saturating_sub(1);
        let last_leaf = probes.len().saturating_sub(1);

        for (ci, &c) in self.settings.chars.iter().enumerate() {
            for (li, leaf) in probes.iter().enumerate() {
                let is_final = ci == last_char && li == last_leaf;
                let baseline = self.settings.fill.baseline_len(self.min_lengths[li]);

                let mut failures = 0;
                for (strategy, value) in ladder_values(c, baseline) {
                    match row.create(&self.create_request(li, &value)).await {
                        Ok(()) => break,
                        Err(e) => {
                            debug!(
                                "Create with {}='{}' (stage {}) refused: {}",
                                leaf.name,
                                value,
                                strategy.stage(),
                                e
                            );
                            failures += 1;
                        }
                    }
                }
                let outcome = ProbeOutcome::after_failures(failures);
                report.record(&self.entry.object(leaf), Phase::Creation, c, outcome);

                if has_row_status && outcome.was_accepted() {
                    row.validate().await;
                    if !is_final && !row.destroy().await {
                        warn!(
                            "{} could not be destroyed, stopping creation probes after '{}' on {}",
                            self.entry.qualified_name(),
                            c,
                            leaf.name
                        );
                        return row.state();
                    }
                }
            }
        }

        if has_row_status && row.state() == RowState::Absent {
            match row.create(&self.placeholder_request()).await {
                Ok(()) => {
                    row.validate().await;
                }
                Err(e) => warn!(
                    "ERROR recreating {} with placeholders: {}",
                    self.entry.qualified_name(),
                    e
                ),
            }
        }

        row.state()
    }

    /// Probes every character with writes to the existing row.
    #[instrument(skip(self, report), fields(entry = %self.entry.qualified_name()))]
    pub async fn post_creation_pass(&self, report: &mut ReportAggregator) {
        let probes = self.entry.probe_leaves();
        for &c in &self.settings.chars {
            for (li, leaf) in probes.iter().enumerate() {
                let baseline = self.settings.fill.baseline_len(self.min_lengths[li]);
                let outcome = run_ladder(self.transport, c, baseline, |value| {
                    self.write_request(li, value)
                })
                .await;
                report.record(&self.entry.object(leaf), Phase::PostCreation, c, outcome);
            }
        }
    }

    /// Creates and validates an entry that has nothing to probe, unless it is
    /// already active. Other tables may depend on it.
    #[instrument(skip(self), fields(entry = %self.entry.qualified_name()))]
    pub async fn ensure_created(&self) -> RowState {
        let mut row = RowLifecycle::new(self.transport, self.entry);
        if self.entry.row_status().is_some() && !row.needs_validation().await {
            debug!("{} is already active", self.entry.qualified_name());
            return row.state();
        }
        if let Err(e) = row.create(&self.placeholder_request()).await {
            warn!("ERROR setting {}: {}", self.entry.qualified_name(), e);
        }
        row.validate().await
    }
}

/// Returns the instance suffix of `instance_oid` under `object_oid`.
pub fn instance_suffix_of(object_oid: &str, instance_oid: &str) -> Option<String> {
    let suffix = instance_oid.strip_prefix(object_oid)?;
    if suffix.starts_with('.') && suffix.len() > 1 {
        Some(suffix.to_string())
    } else {
        None
    }
}

/// Findings for one probed existing leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleLeafProbe {
    /// `MODULE::leaf` (or the object as given when the MIB lookup has no
    /// module).
    pub leaf: String,
    /// The instance that was written, e.g. `IF-MIB::ifAlias.1`.
    pub instance: String,
}

/// Probes the first existing instance of `object` with direct writes.
#[instrument(skip(transport, settings, report))]
pub async fn probe_single_leaf<T>(
    transport: &T,
    object: &str,
    settings: &ProbeSettings,
    report: &mut ReportAggregator,
) -> RowProbeResult<SingleLeafProbe>
where
    T: SnmpTransport + ?Sized,
{
    let info = transport.translate(object).await?;
    let leaf = info.qualified_name().unwrap_or_else(|| object.to_string());

    let (next_oid, _) = transport.get_next(&info.oid).await?;
    let suffix = instance_suffix_of(&info.oid, &next_oid).ok_or_else(|| {
        RowProbeError::NoSuchObject {
            object: format!("{} (first instance is {})", leaf, next_oid),
        }
    })?;
    let instance = format!("{}{}", leaf, suffix);
    let baseline = settings.fill.baseline_len(info.min_string_length());
    info!("Probing {} with baseline length {}", instance, baseline);

    for &c in &settings.chars {
        let outcome = run_ladder(transport, c, baseline, |value| {
            vec![VarBind::new(&instance, SyntaxType::String, value)]
        })
        .await;
        report.record(&leaf, Phase::PostCreation, c, outcome);
    }

    Ok(SingleLeafProbe { leaf, instance })
}
