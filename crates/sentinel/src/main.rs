use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};

use sentinel::{initialize_root, to_json, RootConfig, RootError, RootState, StorageBackend};
use sentinel_checkpoint::ScanOutcome;
use sentinel_core::{IncidentLog, Modality, Verdict};
use sentinel_policy::{display_label, guidance, Audience};

/// Sentinel: checkpoint access control
///
/// Scans subjects at stations, evaluates them against zone tiers and
/// keeps the invitation, clearance and incident records.
#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory, database and default configuration
    Init {
        /// Data directory for sentinel state
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Keep everything in memory instead of SQLite
        #[arg(long)]
        memory: bool,
    },

    /// Register a cross-zone invitation for a subject
    Invite {
        /// Subject id, national id or staff code
        subject: String,
    },

    /// Scan a subject at a station
    Scan {
        /// Subject id, national id or staff code
        #[arg(long)]
        subject: String,

        /// Requested tier (GREEN, ORANGE, RED_1, RED_2) or a destination name
        #[arg(long)]
        tier: String,

        /// Scan modality (QR, FACE, PLATE)
        #[arg(long, default_value = "QR")]
        modality: String,

        /// Station identifier
        #[arg(long, default_value = "station-1")]
        station: String,

        /// Resolve a manual review immediately
        #[arg(long, value_enum)]
        resolve: Option<Resolution>,

        /// Operator recorded on the resolution
        #[arg(long, default_value = "operator")]
        operator: String,
    },

    /// Show recent incidents, newest first
    Incidents {
        /// Maximum number of entries to display
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print the entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// List persisted clearance grants
    Grants {
        /// Print the grants as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify the incident log hash chain
    VerifyLog,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Resolution {
    Approve,
    Reject,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "sentinel=debug,sentinel_store=debug,sentinel_policy=debug,sentinel_checkpoint=debug",
        )
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentinel=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RootError> {
    match cli.command {
        Commands::Init { data_dir, memory } => cmd_init(cli.config.as_ref(), data_dir, memory),
        Commands::Invite { subject } => cmd_invite(cli.config.as_ref(), &subject),
        Commands::Scan {
            subject,
            tier,
            modality,
            station,
            resolve,
            operator,
        } => {
            cmd_scan(
                cli.config.as_ref(),
                &station,
                &subject,
                &tier,
                &modality,
                resolve,
                &operator,
            )
            .await
        }
        Commands::Incidents { limit, json } => cmd_incidents(cli.config.as_ref(), limit, json),
        Commands::Grants { json } => cmd_grants(cli.config.as_ref(), json),
        Commands::VerifyLog => cmd_verify_log(cli.config.as_ref()),
    }
}

fn open(config_path: Option<&PathBuf>) -> Result<RootState, RootError> {
    initialize_root(load_config(config_path)?)
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    data_dir: Option<PathBuf>,
    memory: bool,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;
    if let Some(dd) = data_dir {
        config.data_dir = dd;
    }
    if memory {
        config.storage.backend = StorageBackend::Memory;
    }

    info!("initializing sentinel");
    let state = initialize_root(config.clone())?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    println!("Sentinel initialized successfully.");
    println!("  Data dir: {}", state.config.data_dir.display());
    if state.config.storage.backend == StorageBackend::Sqlite {
        println!("  Database: {}", state.config.database_path().display());
    }
    println!("  Config:   {}", save_path.display());
    let tiers: Vec<String> = state.catalog().tiers().iter().map(|t| t.to_string()).collect();
    println!("  Tiers:    {}", tiers.join(", "));
    Ok(())
}

fn cmd_invite(config_path: Option<&PathBuf>, subject: &str) -> Result<(), RootError> {
    let state = open(config_path)?;
    let record = state.invite(subject)?;
    println!(
        "Invitation active for {} (registered {})",
        record.subject_id,
        record.registered_at.to_rfc3339()
    );
    Ok(())
}

fn print_verdict(tier: sentinel_core::Tier, verdict: &Verdict) {
    println!("  Verdict:  {}", verdict);
    println!("  Zone:     {}", display_label(tier, Audience::Visitor));
    println!("  Guidance: {}", guidance(tier, verdict.is_pending()));
}

async fn cmd_scan(
    config_path: Option<&PathBuf>,
    station: &str,
    subject: &str,
    tier: &str,
    modality: &str,
    resolve: Option<Resolution>,
    operator: &str,
) -> Result<(), RootError> {
    let state = open(config_path)?;
    let modality: Modality = modality.parse()?;

    match state.scan(station, subject, tier, modality)? {
        ScanOutcome::Completed(session) => {
            println!(
                "Scan {} at {}: {} -> {}",
                session.session_id,
                session.station_id,
                session.subject.display_name,
                display_label(session.requested_tier, Audience::Operator)
            );
            if let Some(detail) = &session.detail {
                println!("  Detail:   {}", detail);
            }
            if let Some(verdict) = &session.verdict {
                print_verdict(session.requested_tier, verdict);
            }
        }
        ScanOutcome::Pending(pending) => {
            let review = pending.review().clone();
            println!(
                "Scan {} at {}: {} -> {}",
                review.session_id,
                review.station_id,
                review.subject.display_name,
                display_label(review.tier, Audience::Operator)
            );
            print_verdict(
                review.tier,
                &Verdict::pending(sentinel_policy::reasons::MANUAL_CLEARANCE_REQUIRED),
            );

            let Some(resolution) = resolve else {
                println!(
                    "  Review {} left open; pass --resolve approve|reject to decide it.",
                    review.review_id
                );
                return Ok(());
            };
            match resolution {
                Resolution::Approve => state.approve(&review.review_id, operator)?,
                Resolution::Reject => state.reject(&review.review_id, operator)?,
            };
            let verdict = pending.wait().await?;
            println!("Review {} resolved by {}:", review.review_id, operator);
            print_verdict(review.tier, &verdict);
        }
    }
    Ok(())
}

fn cmd_incidents(config_path: Option<&PathBuf>, limit: usize, json: bool) -> Result<(), RootError> {
    let state = open(config_path)?;
    let records = state.recent_incidents(limit)?;
    if json {
        println!("{}", to_json(&records)?);
        return Ok(());
    }

    let total = state.incidents.count()?;
    println!("Incident Log ({} entries):", total);
    if records.is_empty() {
        println!("  (no entries)");
    }
    for record in records {
        println!(
            "  {}  {}  {}  {}",
            record.id,
            record.timestamp.to_rfc3339(),
            record.subject_ref,
            record.description()
        );
    }
    Ok(())
}

fn cmd_grants(config_path: Option<&PathBuf>, json: bool) -> Result<(), RootError> {
    let state = open(config_path)?;
    let grants = state.grants()?;
    if json {
        println!("{}", to_json(&grants)?);
        return Ok(());
    }
    println!("Clearance Grants ({} entries):", grants.len());
    if grants.is_empty() {
        println!("  (no entries)");
    }
    for grant in grants {
        println!(
            "  #{}  {}  {}  {}  by {} at {}",
            grant.sequence,
            grant.subject_id,
            grant.tier,
            grant.decision,
            grant.resolved_by,
            grant.resolved_at.to_rfc3339()
        );
    }
    Ok(())
}

fn cmd_verify_log(config_path: Option<&PathBuf>) -> Result<(), RootError> {
    let state = open(config_path)?;
    let count = state.incidents.count()?;
    if state.verify_log()? {
        println!("Incident log intact ({} records).", count);
        Ok(())
    } else {
        Err(RootError::Internal(
            "incident log hash chain is broken".into(),
        ))
    }
}
