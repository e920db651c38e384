//! recsys-coordinator: provision and tear down recommendation resource chains
//!
//! Creates the dataset group → campaign chain from an interaction file,
//! records every identifier in a local state file, and removes everything
//! again in reverse order.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use recsys_common::defaults::{
    DEFAULT_BUCKET_SUFFIX, DEFAULT_CAMPAIGN_NAME, DEFAULT_DATA_KEY, DEFAULT_DATASET_GROUP_NAME,
    DEFAULT_DATASET_NAME, DEFAULT_IMPORT_JOB_NAME, DEFAULT_RECIPE_ARN, DEFAULT_REGION,
    DEFAULT_ROLE_NAME, DEFAULT_SCHEMA_NAME, DEFAULT_SOLUTION_NAME, MIN_DISTINCT_ITEMS,
    MIN_DISTINCT_USERS, MIN_INTERACTIONS,
};
use recsys_coordinator::aws::{AwsContext, AwsResourceClient, get_current_account_id};
use recsys_coordinator::config::{AwsConfig, DataConfig, ProvisionConfig};
use recsys_coordinator::dataset::ValidationThresholds;
use recsys_coordinator::logging;
use recsys_coordinator::orchestrator::{
    CheckpointObserver, LifecycleOrchestrator, LogObserver, ProvisionReport, ProvisionRequest,
    RunObserver, StageTimeouts, TeardownReport, derived_support,
};
use recsys_coordinator::retry::RetryPolicy;
use recsys_coordinator::state::{ResourceNames, RunState, StateStore, print_status};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "recsys-coordinator")]
#[command(about = "Recommendation-service resource lifecycle")]
#[command(version)]
struct Args {
    /// Debug logging for this tool (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Names of the resources in the chain
#[derive(clap::Args, Debug)]
struct NameArgs {
    #[arg(long, default_value = DEFAULT_DATASET_GROUP_NAME)]
    dataset_group_name: String,

    #[arg(long, default_value = DEFAULT_SCHEMA_NAME)]
    schema_name: String,

    #[arg(long, default_value = DEFAULT_DATASET_NAME)]
    dataset_name: String,

    #[arg(long, default_value = DEFAULT_IMPORT_JOB_NAME)]
    import_job_name: String,

    #[arg(long, default_value = DEFAULT_SOLUTION_NAME)]
    solution_name: String,

    #[arg(long, default_value = DEFAULT_CAMPAIGN_NAME)]
    campaign_name: String,

    /// IAM role the import job assumes
    #[arg(long, default_value = DEFAULT_ROLE_NAME)]
    role_name: String,

    /// Training bucket is named <account>-<region>-<suffix>
    #[arg(long, default_value = DEFAULT_BUCKET_SUFFIX)]
    bucket_suffix: String,
}

impl From<&NameArgs> for ResourceNames {
    fn from(args: &NameArgs) -> Self {
        Self {
            dataset_group: args.dataset_group_name.clone(),
            schema: args.schema_name.clone(),
            dataset: args.dataset_name.clone(),
            import_job: args.import_job_name.clone(),
            solution: args.solution_name.clone(),
            campaign: args.campaign_name.clone(),
        }
    }
}

/// Where and as whom to talk to AWS
#[derive(clap::Args, Debug)]
struct AwsArgs {
    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long, env = "AWS_PROFILE")]
    aws_profile: Option<String>,
}

/// Arguments for the provision command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct ProvisionArgs {
    /// Interaction CSV (USER_ID,ITEM_ID,EVENT_TYPE,TIMESTAMP)
    #[arg(short, long)]
    data: PathBuf,

    /// Continue the run recorded in the state file
    #[arg(long)]
    resume: bool,

    /// Run state file (default: per-user data directory)
    #[arg(long)]
    state: Option<PathBuf>,

    #[command(flatten)]
    aws: AwsArgs,

    #[command(flatten)]
    names: NameArgs,

    /// Recipe the solution trains with
    #[arg(long, default_value = DEFAULT_RECIPE_ARN)]
    recipe_arn: String,

    /// Object key of the uploaded interaction file
    #[arg(long, default_value = DEFAULT_DATA_KEY)]
    data_key: String,

    /// Minimum number of interaction rows
    #[arg(long, default_value_t = MIN_INTERACTIONS)]
    min_interactions: usize,

    /// Minimum number of distinct users
    #[arg(long, default_value_t = MIN_DISTINCT_USERS)]
    min_users: usize,

    /// Minimum number of distinct items
    #[arg(long, default_value_t = MIN_DISTINCT_ITEMS)]
    min_items: usize,

    /// Maximum attempts for in-use and throttled calls
    #[arg(long, default_value_t = RetryPolicy::default().max_attempts)]
    max_attempts: u32,
}

impl From<ProvisionArgs> for ProvisionConfig {
    fn from(args: ProvisionArgs) -> Self {
        Self {
            names: ResourceNames::from(&args.names),
            recipe_arn: args.recipe_arn,
            role_name: args.names.role_name,
            aws: AwsConfig {
                region: args.aws.region,
                aws_profile: args.aws.aws_profile,
            },
            data: DataConfig {
                path: args.data,
                thresholds: ValidationThresholds {
                    min_interactions: args.min_interactions,
                    min_users: args.min_users,
                    min_items: args.min_items,
                },
                bucket_suffix: args.names.bucket_suffix,
                key: args.data_key,
            },
            timeouts: StageTimeouts::default(),
            retry: RetryPolicy {
                max_attempts: args.max_attempts,
                ..RetryPolicy::default()
            },
            resume: args.resume,
            state_path: args.state,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate training data and create the resource chain
    Provision(Box<ProvisionArgs>),

    /// Delete everything the run state records, in reverse order
    Teardown {
        /// Run state file (default: per-user data directory)
        #[arg(long)]
        state: Option<PathBuf>,

        /// AWS profile to use (overrides AWS_PROFILE env var)
        #[arg(long, env = "AWS_PROFILE")]
        aws_profile: Option<String>,
    },

    /// Show what the run state records
    Status {
        /// Run state file (default: per-user data directory)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Find leftover resources by name and delete them
    CleanupOrphans {
        #[command(flatten)]
        aws: AwsArgs,

        #[command(flatten)]
        names: NameArgs,

        /// Actually delete resources (default is dry-run)
        #[arg(long)]
        execute: bool,
    },
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

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match args.command {
        Command::Provision(provision_args) => {
            let config: ProvisionConfig = (*provision_args).into();
            handle_provision(config, cancel).await?;
        }

        Command::Teardown { state, aws_profile } => {
            handle_teardown(state, aws_profile, cancel).await?;
        }

        Command::Status { state } => {
            let store = state_store(state)?;
            match store.load()? {
                Some(state) => print_status(&state),
                None => println!("No run state at {}", store.path().display()),
            }
        }

        Command::CleanupOrphans {
            aws,
            names,
            execute,
        } => {
            handle_cleanup_orphans(aws, names, execute, cancel).await?;
        }
    }

    Ok(())
}

/// First Ctrl-C cancels in-flight waits; the pipelines stop at the next step
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current call");
            cancel.cancel();
        }
    });
}

fn state_store(path: Option<PathBuf>) -> Result<StateStore> {
    match path {
        Some(path) => Ok(StateStore::new(path)),
        None => StateStore::default_location(),
    }
}

/// Handle the provision command
async fn handle_provision(config: ProvisionConfig, cancel: CancellationToken) -> Result<()> {
    let store = state_store(config.state_path.clone())?;

    let mut state = match (config.resume, store.load()?) {
        (true, Some(state)) => {
            info!(run_id = %state.run_id, "Resuming run");
            state
        }
        (true, None) => bail!("No run state at {} to resume", store.path().display()),
        (false, Some(existing)) if !existing.is_empty() => bail!(
            "Run {} still has resources recorded in {}; run teardown or pass --resume",
            existing.run_id,
            store.path().display()
        ),
        (false, _) => RunState::new(config.settings()),
    };

    if let Some(profile) = config.aws_profile() {
        info!(profile = %profile, "Using AWS profile");
    }
    let aws = AwsContext::with_profile(&state.settings.region, config.aws_profile()).await;
    let account = get_current_account_id(&aws).await?;
    let bucket = state.settings.bucket_name(&account);

    info!(
        run_id = %state.run_id,
        region = %state.settings.region,
        dataset_group = %state.settings.names.dataset_group,
        data = %config.data.path.display(),
        "Starting provisioning"
    );

    let orchestrator = LifecycleOrchestrator::new(AwsResourceClient::from_context(&aws), cancel)
        .with_retry(config.retry.clone())
        .with_timeouts(config.timeouts);
    let observer = CheckpointObserver::new(store.clone());
    let request = ProvisionRequest {
        data_path: config.data.path.clone(),
        thresholds: config.data.thresholds,
        bucket,
    };

    match orchestrator.provision(&mut state, &request, &observer).await {
        Ok(report) => {
            observer.state_changed(&state);
            print_provision_report(&report);
            Ok(())
        }
        Err(e) => {
            if !state.is_empty() {
                observer.state_changed(&state);
                eprintln!(
                    "Partial run recorded in {}; resume with --resume or remove it with teardown",
                    store.path().display()
                );
            }
            Err(e).context("Provisioning stopped")
        }
    }
}

/// Handle the teardown command
async fn handle_teardown(
    state_path: Option<PathBuf>,
    aws_profile: Option<String>,
    cancel: CancellationToken,
) -> Result<()> {
    let store = state_store(state_path)?;
    let Some(mut state) = store.load()? else {
        println!("No run state at {}; nothing to tear down", store.path().display());
        return Ok(());
    };

    let aws = AwsContext::with_profile(&state.settings.region, aws_profile.as_deref()).await;
    let orchestrator = LifecycleOrchestrator::new(AwsResourceClient::from_context(&aws), cancel);
    let observer = CheckpointObserver::new(store.clone());

    let report = orchestrator.teardown(&mut state, &observer).await;
    print_teardown_report(&report);

    if report.is_success() {
        store.remove()?;
        info!(run_id = %state.run_id, "Run state removed");
    } else {
        store.save(&state)?;
    }

    report.into_result()?;
    Ok(())
}

/// Handle the cleanup-orphans command
async fn handle_cleanup_orphans(
    aws_args: AwsArgs,
    names: NameArgs,
    execute: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let mode = if execute { "EXECUTE" } else { "DRY-RUN" };
    info!(region = %aws_args.region, mode, "Looking for leftover resources");

    let aws = AwsContext::with_profile(&aws_args.region, aws_args.aws_profile.as_deref()).await;
    let account = get_current_account_id(&aws).await?;
    let orchestrator = LifecycleOrchestrator::new(AwsResourceClient::from_context(&aws), cancel);

    let discovered = orchestrator.discover(&ResourceNames::from(&names)).await?;
    let support = derived_support(
        account.bucket_name(&aws_args.region, &names.bucket_suffix),
        names.role_name.clone(),
    );

    println!("\n=== Cleanup ===");
    println!("Mode:   {mode}");
    println!("Region: {}", aws_args.region);
    println!();
    if discovered.is_empty() {
        println!("No recommendation resources found.");
    } else {
        println!("{}", discovered.table());
    }
    println!("Bucket: {}", support.bucket.as_deref().unwrap_or_default());
    println!("Role:   {}", names.role_name);

    if !execute {
        println!();
        println!("Run with --execute to actually delete resources.");
        return Ok(());
    }

    let report = orchestrator
        .remove_discovered(&discovered, &support, &LogObserver)
        .await;
    print_teardown_report(&report);
    report.into_result()?;
    Ok(())
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_provision_report(report: &ProvisionReport) {
    println!("\n=== Provisioning complete ===");
    println!("Run: {}", report.run_id);
    println!(
        "Training data: {} interactions, {} users, {} items",
        report.training_data.interactions,
        report.training_data.distinct_users,
        report.training_data.distinct_items
    );

    let mut resources = table();
    resources.set_header(vec![Cell::new("Resource"), Cell::new("Identifier")]);
    for resource in &report.resources {
        resources.add_row(vec![
            Cell::new(resource.kind.as_str()),
            Cell::new(&resource.identifier),
        ]);
    }
    println!("{resources}");

    if report.metrics.is_empty() {
        println!("Solution metrics unavailable");
    } else {
        let mut metrics = table();
        metrics.set_header(vec![Cell::new("Metric"), Cell::new("Value")]);
        for (name, value) in &report.metrics {
            metrics.add_row(vec![Cell::new(name), Cell::new(format!("{value:.4}"))]);
        }
        println!("{metrics}");
    }
}

fn print_teardown_report(report: &TeardownReport) {
    let mut outcomes = table();
    outcomes.set_header(vec![
        Cell::new("Target"),
        Cell::new("Identifier"),
        Cell::new("Result"),
        Cell::new("Attempts"),
    ]);
    for outcome in &report.outcomes {
        outcomes.add_row(vec![
            Cell::new(outcome.target),
            Cell::new(outcome.identifier.as_deref().unwrap_or_default()),
            Cell::new(outcome.result),
            Cell::new(outcome.attempts),
        ]);
    }
    println!("{outcomes}");

    if !report.is_success() {
        println!("{} target(s) left behind", report.failures.len());
    }
}
