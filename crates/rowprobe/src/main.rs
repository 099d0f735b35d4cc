//! rowprobe entry point.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use rowprobe::discover::{parse_roots_file, run_discovery, DISCOVERY_COLUMNS};
use rowprobe::runner::{run_creation_probe, run_leaf_probe, run_provision};
use rowprobe::{
    parse_leaf_list_file, parse_row_config_file, NetSnmpConfig, NetSnmpTransport, ProbeSettings,
    ReportLayout, ReportWriter,
};
use rowprobe_common::defaults::{READ_COMMUNITY, SNMP_VERSION, WRITE_COMMUNITY};

/// Provision SNMP table rows and probe string leaves for rejected characters
#[derive(Parser, Debug)]
#[command(name = "rowprobe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info", global = true)]
    log_level: String,

    /// SNMP version passed to the net-snmp tools
    #[arg(long, default_value = SNMP_VERSION, global = true)]
    snmp_version: String,

    /// Community for GET and GET-NEXT
    #[arg(long, default_value = READ_COMMUNITY, global = true)]
    read_community: String,

    /// Community for SET
    #[arg(long, default_value = WRITE_COMMUNITY, global = true)]
    write_community: String,

    /// Directory holding the net-snmp binaries (default: search PATH)
    #[arg(long, global = true)]
    tools_dir: Option<PathBuf>,

    /// Extra MIB module to load (repeatable)
    #[arg(long = "mib", global = true)]
    mibs: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create and validate one row per configured table entry
    Provision {
        /// SNMP agent IPv4 address
        agent: Ipv4Addr,

        /// Row configuration (JSON)
        #[arg(short, long)]
        config: String,
    },

    /// Probe string leaves during row creation and on the live row
    CreateProbe {
        /// SNMP agent IPv4 address
        agent: Ipv4Addr,

        /// Report file (tab-delimited)
        output: PathBuf,

        /// Row configuration (JSON); `"value": null` marks a leaf to probe
        #[arg(short, long)]
        config: String,

        /// Add columns for characters accepted only after a placement change
        #[arg(long)]
        detail: bool,
    },

    /// Probe the first existing instance of one or more leaves
    LeafProbe {
        /// SNMP agent IPv4 address
        agent: Ipv4Addr,

        /// Report file (tab-delimited)
        output: PathBuf,

        #[command(flatten)]
        target: LeafTarget,

        /// Add a column for characters accepted only after a placement change
        #[arg(long)]
        detail: bool,
    },

    /// List read-create and read-write string leaves of local MIB trees
    Discover {
        /// CSV with moduleName and rootOid columns
        input: String,

        /// Output CSV
        #[arg(short, long, default_value = "mibLeaves.csv")]
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct LeafTarget {
    /// Single object, symbolic (MODULE::leaf) or numeric
    #[arg(long)]
    oid: Option<String>,

    /// JSON or CSV list of leaves
    #[arg(long)]
    batch: Option<String>,
}

/// Installs the global tracing subscriber. Logs go to stderr.
fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn create_report(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to open output file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let snmp_config = NetSnmpConfig {
        version: args.snmp_version,
        read_community: args.read_community,
        write_community: args.write_community,
        tools_dir: args.tools_dir,
        mibs: args.mibs,
    };

    match args.command {
        Command::Provision { agent, config } => {
            let config = parse_row_config_file(&config)?;
            let transport = NetSnmpTransport::new(agent, snmp_config);

            let summary = run_provision(&transport, &config).await;
            info!(
                "Provisioning done: {} active, {} not active",
                summary.completed, summary.failed
            );
        }

        Command::CreateProbe {
            agent,
            output,
            config,
            detail,
        } => {
            let config = parse_row_config_file(&config)?;
            let out = create_report(&output)?;
            let transport = NetSnmpTransport::new(agent, snmp_config);
            let mut writer = ReportWriter::tsv(out, ReportLayout::CreationProbe.columns(detail));

            let summary =
                run_creation_probe(&transport, &config, &ProbeSettings::default(), detail, &mut writer)
                    .await
                    .context("Creation probe aborted")?;
            writer
                .finish()
                .with_context(|| format!("Could not write {}", output.display()))?;
            info!(
                "done. {} leaves written to {} ({} entries not active)",
                summary.rows,
                output.display(),
                summary.failed
            );
        }

        Command::LeafProbe {
            agent,
            output,
            target,
            detail,
        } => {
            let (objects, single) = match (target.oid, target.batch) {
                (Some(oid), _) => (vec![oid], true),
                (None, Some(batch)) => (parse_leaf_list_file(&batch)?, false),
                (None, None) => bail!("one of --oid or --batch is required"),
            };
            let out = create_report(&output)?;
            let transport = NetSnmpTransport::new(agent, snmp_config);
            let mut writer = ReportWriter::tsv(out, ReportLayout::LeafProbe.columns(detail));

            let summary = run_leaf_probe(
                &transport,
                &objects,
                &ProbeSettings::single_leaf(),
                detail,
                &mut writer,
            )
            .await
            .context("Leaf probe aborted")?;
            writer
                .finish()
                .with_context(|| format!("Could not write {}", output.display()))?;
            if single && summary.completed == 0 {
                bail!("could not probe {}", objects[0]);
            }
            info!(
                "done. {} leaves written to {} ({} skipped)",
                summary.rows,
                output.display(),
                summary.failed
            );
        }

        Command::Discover { input, output } => {
            let roots = parse_roots_file(&input)?;
            let out = create_report(&output)?;
            // snmptranslate never contacts an agent.
            let transport = NetSnmpTransport::new(Ipv4Addr::UNSPECIFIED, snmp_config);
            let columns = DISCOVERY_COLUMNS.iter().map(|c| c.to_string()).collect();
            let mut writer = ReportWriter::csv(out, columns);

            info!("reading {}...", input);
            let written = run_discovery(&transport, &roots, &mut writer).await?;
            writer
                .finish()
                .with_context(|| format!("Could not write {}", output.display()))?;
            info!("done. {} leaves written to {}", written, output.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_leaf_probe_needs_one_target() {
        assert!(Args::try_parse_from(["rowprobe", "leaf-probe", "10.0.0.1", "out.tsv"]).is_err());
        assert!(Args::try_parse_from([
            "rowprobe", "leaf-probe", "10.0.0.1", "out.tsv", "--oid", "IF-MIB::ifAlias", "--batch",
            "leaves.json"
        ])
        .is_err());
        let args = Args::try_parse_from([
            "rowprobe",
            "leaf-probe",
            "10.0.0.1",
            "out.tsv",
            "--oid",
            "IF-MIB::ifAlias",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::LeafProbe { .. }));
    }

    #[test]
    fn test_invalid_agent_is_rejected() {
        assert!(Args::try_parse_from(["rowprobe", "provision", "10.0.0", "-c", "a.conf"]).is_err());
    }

    #[test]
    fn test_global_options() {
        let args = Args::try_parse_from([
            "rowprobe",
            "create-probe",
            "192.168.1.5",
            "report.tsv",
            "--config",
            "rows.conf",
            "--write-community",
            "secret",
            "--mib",
            "WWP-LEOS-FLOW-MIB",
            "--mib",
            "IF-MIB",
        ])
        .unwrap();
        assert_eq!(args.write_community, "secret");
        assert_eq!(args.read_community, "public");
        assert_eq!(args.mibs, vec!["WWP-LEOS-FLOW-MIB", "IF-MIB"]);
    }
}
