//! Run drivers behind the CLI subcommands.
//!
//! Each driver walks its inputs strictly in order, one request at a time.
//! Remote failures are logged and the run moves on; only report I/O errors
//! end a run early.

use std::io::Write;
use tracing::{info, warn};

use rowprobe_common::{RowProbeError, RowProbeResult, SnmpTransport};

use crate::lifecycle::{RowLifecycle, RowState};
use crate::probe::{placeholders_for, probe_single_leaf, EntryProber, ProbeSettings};
use crate::report::{ReportAggregator, ReportLayout, ReportWriter};
use crate::types::{RowConfig, TableEntryDescriptor};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries or leaves processed to completion.
    pub completed: usize,
    /// Entries left not active, or leaves that could not be resolved.
    pub failed: usize,
    /// Report rows written.
    pub rows: usize,
}

fn report_error(e: std::io::Error) -> RowProbeError {
    RowProbeError::io("report", e)
}

fn flush_report<W: Write>(
    report: &mut ReportAggregator,
    layout: ReportLayout,
    detail: bool,
    writer: &mut ReportWriter<W>,
) -> RowProbeResult<usize> {
    let mut rows = 0;
    for findings in report.drain() {
        writer
            .write_row(&layout.row(&findings, detail))
            .map_err(report_error)?;
        rows += 1;
    }
    Ok(rows)
}

/// Creates one entry with its literal values and placeholders, then
/// validates it.
pub async fn provision_entry<T>(transport: &T, entry: &TableEntryDescriptor) -> RowState
where
    T: SnmpTransport + ?Sized,
{
    let placeholders = placeholders_for(transport, entry).await;
    let request = entry.create_varbinds(|ordinal, _| placeholders[ordinal].clone());

    let mut row = RowLifecycle::new(transport, entry);
    if let Err(e) = row.create(&request).await {
        warn!("ERROR setting {}: {}", entry.qualified_name(), e);
    }
    row.validate().await
}

/// Provisions every configured entry in file order ("one of everything").
pub async fn run_provision<T>(transport: &T, config: &RowConfig) -> RunSummary
where
    T: SnmpTransport + ?Sized,
{
    let mut summary = RunSummary::default();
    for entry in &config.entries {
        info!("Provisioning {}", entry.qualified_name());
        match provision_entry(transport, entry).await {
            RowState::Active => summary.completed += 1,
            state => {
                warn!("{} left {}", entry.qualified_name(), state.as_str());
                summary.failed += 1;
            }
        }
    }
    summary
}

/// Creation-time and post-creation probing of every configured entry.
///
/// Entries without probe leaves are only created, so tables that depend on
/// them can be. One report row per probed leaf is written as soon as its
/// entry is finished.
pub async fn run_creation_probe<T, W>(
    transport: &T,
    config: &RowConfig,
    settings: &ProbeSettings,
    detail: bool,
    writer: &mut ReportWriter<W>,
) -> RowProbeResult<RunSummary>
where
    T: SnmpTransport + ?Sized,
    W: Write,
{
    let layout = ReportLayout::CreationProbe;
    let mut summary = RunSummary::default();
    let mut report = ReportAggregator::new();
    writer.write_header().map_err(report_error)?;

    for entry in &config.entries {
        let prober = EntryProber::new(transport, entry, settings).await;
        let state = if entry.has_probe_leaves() {
            info!("Probing {}", entry.qualified_name());
            prober.run(&mut report).await
        } else {
            info!("Creating {} (nothing to probe)", entry.qualified_name());
            prober.ensure_created().await
        };

        match state {
            RowState::Active => summary.completed += 1,
            state => {
                warn!("{} left {}", entry.qualified_name(), state.as_str());
                summary.failed += 1;
            }
        }
        summary.rows += flush_report(&mut report, layout, detail, writer)?;
    }
    Ok(summary)
}

/// Probes existing instances of each object in `objects`.
///
/// An object that cannot be resolved, or has no instance, is logged and
/// skipped.
pub async fn run_leaf_probe<T, W>(
    transport: &T,
    objects: &[String],
    settings: &ProbeSettings,
    detail: bool,
    writer: &mut ReportWriter<W>,
) -> RowProbeResult<RunSummary>
where
    T: SnmpTransport + ?Sized,
    W: Write,
{
    let layout = ReportLayout::LeafProbe;
    let mut summary = RunSummary::default();
    let mut report = ReportAggregator::new();
    writer.write_header().map_err(report_error)?;

    for object in objects {
        match probe_single_leaf(transport, object, settings, &mut report).await {
            Ok(probed) => {
                info!("Probed {}", probed.instance);
                summary.completed += 1;
            }
            Err(e) => {
                warn!("Skipping {}: {}", object, e);
                summary.failed += 1;
            }
        }
        summary.rows += flush_report(&mut report, layout, detail, writer)?;
    }
    Ok(summary)
}
