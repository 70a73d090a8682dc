//! sitewise-sweep: dependency-ordered cleanup of AWS IoT SiteWise resources
//!
//! Scans a region for asset models, assets, portals and time series, prints
//! the deletion plan, and (with `--execute`) deletes everything in order.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use sitewise_sweep::aws::SiteWiseClient;
use sitewise_sweep::cleanup::{CleanupReport, Plan, Sweeper};
use sitewise_sweep::config::{AwsConfig, RuntimeFlags, SweepConfig};
use sitewise_sweep::rate_limit::{RateLimitConfig, RateLimitedApi};
use sitewise_sweep::scanner::CleanupScope;
use sitewise_sweep::state::{MemoryRecordStore, RecordStore, SqliteRecordStore, open_db};
use sitewise_sweep::wait::{PollConfig, TokioSleeper};
use sitewise_sweep_common::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READ_TPS, DEFAULT_REGION,
    DEFAULT_WRITE_TPS,
};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sitewise-sweep")]
#[command(about = "Dependency-ordered cleanup of AWS IoT SiteWise resources")]
#[command(version)]
struct Args {
    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long, global = true)]
    aws_profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Table,
    Json,
}

/// Which resources a command covers
#[derive(clap::Args, Debug)]
struct ScopeArgs {
    /// Only root resources (models, portals, time series aliases) with this
    /// name prefix
    #[arg(long)]
    name_prefix: Option<String>,

    /// Leave asset models, interface models and assets alone
    #[arg(long)]
    skip_asset_models: bool,

    /// Leave portals, projects, dashboards and access policies alone
    #[arg(long)]
    skip_portals: bool,

    /// Leave time series alone
    #[arg(long)]
    skip_time_series: bool,
}

impl From<ScopeArgs> for CleanupScope {
    fn from(args: ScopeArgs) -> Self {
        Self {
            asset_models: !args.skip_asset_models,
            portals: !args.skip_portals,
            time_series: !args.skip_time_series,
            name_prefix: args.name_prefix,
        }
    }
}

/// Arguments for the cleanup command (boxed to reduce enum size)
#[derive(clap::Args, Debug)]
struct CleanupArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Actually delete resources (default is dry-run)
    #[arg(long)]
    execute: bool,

    /// Resources deleted concurrently within one batch
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Delay between describe polls while waiting for a deletion
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Override every per-kind poll budget
    #[arg(long)]
    max_poll_attempts: Option<u32>,

    /// List/describe calls per second (0 disables the limit)
    #[arg(long, default_value_t = DEFAULT_READ_TPS)]
    read_tps: u32,

    /// Delete/disassociate calls per second (0 disables the limit)
    #[arg(long, default_value_t = DEFAULT_WRITE_TPS)]
    write_tps: u32,

    /// State database path
    #[arg(long, conflicts_with = "no_state")]
    state_db: Option<PathBuf>,

    /// Don't persist removed associations or run summaries
    #[arg(long)]
    no_state: bool,

    /// Output JSON file for the run report
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl CleanupArgs {
    fn into_config(self, aws: AwsConfig) -> SweepConfig {
        SweepConfig {
            aws,
            scope: self.scope.into(),
            poll: PollConfig {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_attempts: self.max_poll_attempts,
            },
            rate: RateLimitConfig {
                read_tps: self.read_tps,
                write_tps: self.write_tps,
            },
            flags: RuntimeFlags {
                dry_run: !self.execute,
                concurrency: self.concurrency,
                output: self.output,
                state_db: self.state_db,
                no_state: self.no_state,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List in-scope SiteWise resources
    Scan {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },

    /// Print the deletion batches without deleting anything
    Plan {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },

    /// Delete in-scope resources in dependency order
    Cleanup(Box<CleanupArgs>),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,aws_config=warn,aws_sdk_iotsitewise=warn,aws_smithy_runtime=warn",
        )
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let aws = AwsConfig {
        region: args.region,
        aws_profile: args.aws_profile,
    };
    if let Some(profile) = &aws.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }

    match args.command {
        Command::Scan { scope, format } => {
            let plan = plan(&aws, scope.into()).await?;
            print_scan(&plan, format)?;
        }
        Command::Plan { scope, format } => {
            let plan = plan(&aws, scope.into()).await?;
            print_plan(&plan, format)?;
        }
        Command::Cleanup(cleanup_args) => {
            let config = cleanup_args.into_config(aws);
            handle_cleanup(config).await?;
        }
    }

    Ok(())
}

async fn client(aws: &AwsConfig) -> SiteWiseClient {
    SiteWiseClient::new(&aws.region, aws.aws_profile.as_deref()).await
}

async fn plan(aws: &AwsConfig, scope: CleanupScope) -> Result<Plan> {
    info!(region = %aws.region, prefix = ?scope.name_prefix, "Scanning SiteWise resources");
    let api = RateLimitedApi::new(client(aws).await, RateLimitConfig::default());
    let sweeper = Sweeper::new(
        api,
        TokioSleeper,
        MemoryRecordStore::new(),
        SweepConfig::default().sweep_options(),
    );
    Ok(sweeper.plan(&scope).await?)
}

/// Handle the cleanup command
async fn handle_cleanup(config: SweepConfig) -> Result<()> {
    let mode = if config.dry_run() { "DRY-RUN" } else { "EXECUTE" };
    info!(
        region = %config.region(),
        prefix = ?config.scope.name_prefix,
        concurrency = config.flags.concurrency,
        mode,
        "Cleaning up SiteWise resources"
    );

    let report = if config.flags.no_state || config.dry_run() {
        sweep(&config, MemoryRecordStore::new()).await?
    } else {
        let pool = open_db(config.flags.state_db.as_deref()).await?;
        sweep(&config, SqliteRecordStore::new(pool)).await?
    };

    print_report(&report, config.region());

    if let Some(path) = &config.flags.output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        info!(path = %path.display(), "Wrote run report");
    }

    if !report.is_success() {
        bail!("{} resources could not be deleted", report.failures.len());
    }
    Ok(())
}

async fn sweep<R: RecordStore>(config: &SweepConfig, store: R) -> Result<CleanupReport> {
    let api = RateLimitedApi::new(client(&config.aws).await, config.rate);
    let sweeper = Sweeper::new(api, TokioSleeper, store, config.sweep_options());
    Ok(sweeper.run_cleanup(&config.scope).await?)
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(Cell::new).collect::<Vec<_>>());
    table
}

fn print_scan(plan: &Plan, format: Format) -> Result<()> {
    let nodes = plan.graph.nodes();

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(nodes)?);
        return Ok(());
    }

    if nodes.is_empty() {
        println!("No SiteWise resources found matching criteria.");
        return Ok(());
    }

    let mut resources = table(&["Kind", "ID", "Name"]);
    for node in nodes {
        resources.add_row(vec![
            Cell::new(node.kind.label()),
            Cell::new(&node.id),
            Cell::new(&node.name),
        ]);
    }
    println!("{resources}");

    let mut counts = table(&["Kind", "Count"]);
    for (kind, count) in plan.inventory.counts() {
        counts.add_row(vec![Cell::new(kind.label()), Cell::new(count)]);
    }
    println!("{counts}");
    println!(
        "Total: {} resources, {} hierarchy associations",
        nodes.len(),
        plan.inventory.associations.len()
    );
    Ok(())
}

fn print_plan(plan: &Plan, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&plan.batches)?);
        return Ok(());
    }

    let mut batches = table(&["Batch", "Kind", "ID", "Name", "After"]);
    for batch in &plan.batches {
        for node in &batch.nodes {
            batches.add_row(vec![
                Cell::new(batch.index),
                Cell::new(node.kind.label()),
                Cell::new(&node.id),
                Cell::new(&node.name),
                Cell::new(plan.graph.blockers_of(&node.id).join(", ")),
            ]);
        }
    }
    println!("{batches}");
    println!(
        "{} resources in {} batches",
        plan.graph.len(),
        plan.batches.len()
    );
    Ok(())
}

fn print_report(report: &CleanupReport, region: &str) {
    let mode = if report.dry_run { "DRY-RUN" } else { "EXECUTE" };
    let planned: usize = report.batches.iter().map(|b| b.nodes.len()).sum();

    println!("\n=== Cleanup Report ===");
    println!("Run:    {}", report.run_id);
    println!("Mode:   {mode}");
    println!("Region: {region}");
    println!();
    println!("Resources planned: {planned} in {} batches", report.batches.len());
    if report.dry_run {
        println!();
        println!("Run with --execute to actually delete resources.");
        return;
    }
    println!("  Deleted:          {}", report.deleted.len());
    println!("  Already deleted:  {}", report.already_deleted.len());
    println!("  Disassociated:    {}", report.disassociated.len());
    println!("  Failed:           {}", report.failures.len());

    if !report.failures.is_empty() {
        let mut failures = table(&["Kind", "ID", "Name", "Reason"]);
        for failure in &report.failures {
            failures.add_row(vec![
                Cell::new(failure.kind.label()),
                Cell::new(&failure.id),
                Cell::new(&failure.name),
                Cell::new(&failure.reason),
            ]);
        }
        println!("\n{failures}");
    }
}
