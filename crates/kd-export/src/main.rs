//! `kvdesk-incident`: command-line front end for the incident bundle engine.
//!
//! Operates on a telemetry dump (JSONL, one record per line) loaded into the
//! in-memory store, against the same durable job/bundle store the desktop
//! service uses. Useful for reproducing an export outside the UI and for
//! cross-checking a preview against an exported artifact.

use clap::{Args, Parser, Subcommand};
use kd_bundle::AssembleRequest;
use kd_common::{ConnectionId, JobId, NamespaceId, TimeWindow};
use kd_export::{init_logging, ExportConfig, ExportJobManager, ExportStore, LogFormat, LogLevel};
use kd_redact::RedactionProfile;
use kd_telemetry::{ArtifactKind, InMemoryTelemetryStore, IncludeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How long `export`/`resume` wait for the job before giving up the poll.
const WAIT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(
    name = "kvdesk-incident",
    version,
    about = "Preview and export redacted incident bundles from a telemetry dump"
)]
struct Cli {
    /// Log level (trace|debug|info|warn|error)
    #[arg(long, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format (human|jsonl)
    #[arg(long, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    /// Data directory override (defaults to KVDESK_DATA or the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Telemetry dump to load (JSONL, one record per line)
    #[arg(long, global = true)]
    telemetry: Option<PathBuf>,

    /// Export configuration file (caps, redaction policy)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Preview a bundle without persisting anything
    Preview(RequestArgs),

    /// Start an export job and wait for its terminal status
    Export {
        #[command(flatten)]
        request: RequestArgs,

        /// Destination path (defaults to <data-dir>/exports/<job-id>.ibundle)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Return as soon as the job is running instead of waiting
        #[arg(long)]
        no_wait: bool,
    },

    /// Show one export job
    Status { job_id: String },

    /// Request cancellation of a job
    Cancel { job_id: String },

    /// Resume a cancelled or failed job (re-runs the persisted request)
    Resume { job_id: String },

    /// List exported bundles, most recent first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Filter by namespace ID
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Window start (RFC 3339, inclusive)
    #[arg(long)]
    from: String,

    /// Window end (RFC 3339, exclusive)
    #[arg(long)]
    to: String,

    /// Artifact kinds to include (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "timeline,logs,diagnostics,metrics"
    )]
    include: Vec<String>,

    /// Redaction profile (default|strict)
    #[arg(long, default_value = "default")]
    profile: String,

    /// Restrict to these connection IDs (repeatable)
    #[arg(long = "connection")]
    connections: Vec<String>,

    /// Restrict to one namespace ID
    #[arg(long)]
    namespace: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format);

    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &cli.data_dir {
        Some(dir) => ExportStore::at(dir.clone()),
        None => ExportStore::from_env()?,
    };

    let telemetry = match &cli.telemetry {
        Some(path) => InMemoryTelemetryStore::load_jsonl(path)?,
        None => InMemoryTelemetryStore::new(),
    };
    let telemetry = Arc::new(telemetry);

    let config = match &cli.config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };

    let manager = ExportJobManager::new(
        store,
        Arc::clone(&telemetry) as Arc<dyn kd_telemetry::TelemetrySource>,
        telemetry as Arc<dyn kd_telemetry::ConnectionDirectory>,
        config,
    )?;

    match cli.command {
        Command::Preview(args) => {
            require_telemetry(&cli.telemetry, "preview")?;
            let request = build_request(&args)?;
            let preview = manager.preview(&request)?;
            print_json(&preview)?;
        }
        Command::Export {
            request,
            dest,
            no_wait,
        } => {
            require_telemetry(&cli.telemetry, "export")?;
            let request = build_request(&request)?;
            let job = manager.start_export(request, dest)?;
            if no_wait {
                print_json(&job)?;
            } else {
                let finished = manager.wait_for_terminal(&job.id, WAIT_TIMEOUT)?;
                print_json(&finished)?;
            }
        }
        Command::Status { job_id } => {
            let job = manager.get_job(&parse_job_id(&job_id)?)?;
            print_json(&job)?;
        }
        Command::Cancel { job_id } => {
            let job = manager.cancel_job(&parse_job_id(&job_id)?)?;
            print_json(&job)?;
        }
        Command::Resume { job_id } => {
            require_telemetry(&cli.telemetry, "resume")?;
            // A job left running by a crashed process becomes failed first,
            // then flows through the normal resume path.
            manager.recover_interrupted()?;
            let job = manager.resume_job(&parse_job_id(&job_id)?)?;
            let finished = manager.wait_for_terminal(&job.id, WAIT_TIMEOUT)?;
            print_json(&finished)?;
        }
        Command::List { limit, namespace } => {
            let ns = namespace.map(NamespaceId);
            let bundles = manager.list_bundles(limit, ns.as_ref())?;
            print_json(&bundles)?;
        }
    }

    Ok(())
}

fn require_telemetry(
    telemetry: &Option<PathBuf>,
    operation: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if telemetry.is_none() {
        return Err(format!("--telemetry is required for {}", operation).into());
    }
    Ok(())
}

fn build_request(args: &RequestArgs) -> Result<AssembleRequest, Box<dyn std::error::Error>> {
    let from = chrono::DateTime::parse_from_rfc3339(&args.from)
        .map_err(|e| format!("invalid --from timestamp: {}", e))?
        .with_timezone(&chrono::Utc);
    let to = chrono::DateTime::parse_from_rfc3339(&args.to)
        .map_err(|e| format!("invalid --to timestamp: {}", e))?
        .with_timezone(&chrono::Utc);

    let mut kinds = Vec::new();
    for name in &args.include {
        let kind = ArtifactKind::parse_str(name)
            .ok_or_else(|| format!("unknown artifact kind: {}", name))?;
        kinds.push(kind);
    }

    let profile = RedactionProfile::parse_str(&args.profile)
        .ok_or_else(|| format!("unknown redaction profile: {}", args.profile))?;

    let connection_ids = if args.connections.is_empty() {
        None
    } else {
        Some(
            args.connections
                .iter()
                .map(|c| ConnectionId::new(c.clone()))
                .collect(),
        )
    };

    Ok(AssembleRequest {
        window: TimeWindow::new(from, to),
        connection_ids,
        namespace_id: args.namespace.clone().map(NamespaceId),
        includes: IncludeSet::from_kinds(kinds),
        profile,
    })
}

fn parse_job_id(s: &str) -> Result<JobId, Box<dyn std::error::Error>> {
    JobId::parse(s).ok_or_else(|| format!("invalid job ID: {}", s).into())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
