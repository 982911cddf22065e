//! Journey CLI - checkout journey acceptance runs
//!
//! Usage:
//!   journey run <start-url> <charter>   Execute a charter against a live site
//!   journey check <charter>             Validate a charter without a browser

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use journey_browser::{BrowserConfig, BrowserSession};
use journey_core::{Charter, RunConfig, StepKind};
use journey_runner::{load_credentials, Orchestrator, RunInputs, CREDENTIALS_FILE};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "journey")]
#[command(author, version, about = "Checkout journey acceptance runner")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a charter against a start URL
    Run(RunArgs),

    /// Load and validate a charter, then list its steps
    Check {
        /// Charter file (JSON array of scenarios)
        charter: PathBuf,

        /// Print the normalized charter as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Configurator or shop URL the run starts from
    start_url: String,

    /// Charter file (JSON array of scenarios)
    charter: PathBuf,

    /// Config file (defaults to ./journey.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory that receives run directories
    #[arg(long, value_name = "DIR", env = "JOURNEY_RESULTS")]
    results_root: Option<PathBuf>,

    /// Run id (defaults to a local timestamp)
    #[arg(long)]
    run_id: Option<String>,

    /// Stop after this many steps (open_url steps are not counted)
    #[arg(long)]
    max_steps: Option<usize>,

    /// Keep going after a failed blocking step
    #[arg(long)]
    no_stop_on_blocker: bool,

    /// Disable the discovery click fallback
    #[arg(long)]
    no_discovery: bool,

    /// Disable the auto-repair click pre-pass
    #[arg(long)]
    no_auto_repair: bool,

    /// Disable auto-advance after journey-driving test cases
    #[arg(long)]
    no_auto_advance: bool,

    /// Disable form auto-fill during auto-advance
    #[arg(long)]
    no_auto_fill: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Pause after setup for a manual login (implies --headed)
    #[arg(long)]
    pause_for_login: bool,

    /// Seconds to wait for the login when stdin is not a terminal
    #[arg(long, value_name = "SECONDS")]
    pause_for_login_seconds: Option<u64>,

    /// Skip the authproxy check after the login pause
    #[arg(long)]
    no_verify_login: bool,

    /// Login verification timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    verify_login_timeout: Option<u64>,

    /// Navigation timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    navigation_timeout: Option<u64>,

    /// Element wait timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    element_timeout: Option<u64>,

    /// Credentials file for HTTP basic auth
    #[arg(long, value_name = "FILE", default_value = CREDENTIALS_FILE)]
    credentials: PathBuf,
}

impl RunArgs {
    /// Layer the flags over the file/default config
    fn apply(&self, config: &mut RunConfig) {
        if let Some(root) = &self.results_root {
            config.results_root = root.clone();
        }
        if self.max_steps.is_some() {
            config.max_steps = self.max_steps;
        }
        if self.no_stop_on_blocker {
            config.stop_on_blocker = false;
        }
        if self.no_discovery {
            config.discovery_click = false;
        }
        if self.no_auto_repair {
            config.auto_repair_click = false;
        }
        if self.no_auto_advance {
            config.auto_advance = false;
        }
        if self.no_auto_fill {
            config.auto_fill = false;
        }
        if self.headed || self.pause_for_login {
            config.headless = false;
        }
        if self.pause_for_login {
            config.pause_for_login = true;
        }
        if let Some(seconds) = self.pause_for_login_seconds {
            config.pause_for_login_seconds = seconds;
        }
        if self.no_verify_login {
            config.verify_login = false;
        }
        if let Some(seconds) = self.verify_login_timeout {
            config.timeouts.verify_login_ms = seconds * 1000;
        }
        if let Some(seconds) = self.navigation_timeout {
            config.timeouts.navigation_ms = seconds * 1000;
        }
        if let Some(seconds) = self.element_timeout {
            config.timeouts.element_ms = seconds * 1000;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Check { charter, json } => cmd_check(&charter, json),
    }
}

async fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let mut config = RunConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);

    let charter = Charter::load(&args.charter)
        .with_context(|| format!("Failed to load charter {}", args.charter.display()))?;
    info!(
        "Loaded charter {} ({} scenarios, {} steps)",
        args.charter.display(),
        charter.scenarios.len(),
        charter.step_count()
    );

    let credentials = load_credentials(&args.credentials, &args.start_url)
        .context("Failed to load credentials")?;
    let http_auth = credentials.is_some();

    let session = BrowserSession::launch_with_config(BrowserConfig {
        headless: config.headless,
        viewport: config.viewport,
        timeouts: config.timeouts,
        credentials,
        ..BrowserConfig::default()
    })
    .await
    .context("Failed to launch browser")?;

    let orchestrator = Orchestrator::new(config);
    let abort = orchestrator.abort_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing the current step");
            abort.abort();
        }
    });

    let inputs = RunInputs {
        start_url: args.start_url.clone(),
        charter_path: args.charter.clone(),
        run_id: args.run_id.clone(),
        http_auth,
    };
    let outcome = orchestrator.run(&charter, inputs, session.page()).await;

    // Always shut the browser down, even when the run itself errored
    if let Err(e) = session.close().await {
        error!("Failed to close browser: {}", e);
    }
    let report = outcome.context("Run failed")?;

    println!("Run:      {}", report.run_id);
    println!("Results:  {}", report.run_dir.display());
    println!(
        "Steps:    {} (Pass={} Warn={} Fail={})",
        report.totals.steps_total, report.totals.pass, report.totals.warn, report.totals.fail
    );
    if let Some(reason) = &report.totals.abort_reason {
        println!("Aborted:  {}", reason);
    }
    println!("Findings: {}", report.findings.len());

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_check(path: &Path, json: bool) -> Result<ExitCode> {
    let charter = Charter::load(path)
        .with_context(|| format!("Failed to load charter {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&charter)?);
        return Ok(ExitCode::SUCCESS);
    }

    for scenario in &charter.scenarios {
        println!("{}", scenario.name);
        for case in &scenario.test_cases {
            let driver = if case.is_journey_driver() { " [driver]" } else { "" };
            println!("  {}{}", case.id, driver);
            for (index, step) in case.steps.iter().enumerate() {
                let detail = match &step.kind {
                    StepKind::Intent(intent) => format!(" ({})", intent.intent),
                    _ => String::new(),
                };
                println!(
                    "    {:>2}. {}{}",
                    index + 1,
                    step.normalized_action(),
                    detail
                );
            }
        }
    }
    println!("{} steps OK", charter.step_count());
    Ok(ExitCode::SUCCESS)
}
