use anyhow::{Context, Result};
use chainscan::{
    collector::Collector,
    config::Config,
    model::{ScanReport, ScanTarget, TargetKind},
    output::{format_result_to_string, print_result, OutputFormat},
    run_scan,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "chainscan")]
#[command(
    author,
    version,
    about = "Detect supply-chain attack indicators in packages, repositories and container builds"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project's dependencies and installed packages
    Packages(ScanArgs),

    /// Compare a package's metadata against the configured baseline
    Metadata(ScanArgs),

    /// Validate a package's signing information
    Signature(ScanArgs),

    /// Validate the submodules declared by a git repository
    Submodules(ScanArgs),

    /// Inspect a container build specification
    Image(ScanArgs),

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output format (table, json, sarif)
    #[arg(short, long)]
    format: Option<String>,

    /// Write output to file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Submit the JSON report to a collector at <URL>/collect
    #[arg(long, value_name = "URL")]
    report_to: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let (kind, args) = match cli.command {
        Commands::Packages(args) => (TargetKind::PackageTree, args),
        Commands::Metadata(args) => (TargetKind::Package, args),
        Commands::Signature(args) => (TargetKind::SignedPackage, args),
        Commands::Submodules(args) => (TargetKind::Repository, args),
        Commands::Image(args) => (TargetKind::ContainerBuild, args),
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            return Ok(exit_codes::SUCCESS);
        }
    };

    let config = load_config(cli.config)?;
    scan(kind, args, config).await
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(&path),
        None => Ok(Config::load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable config file: {:#}", e);
            Config::default()
        })),
    }
}

async fn scan(kind: TargetKind, args: ScanArgs, config: Config) -> Result<u8> {
    let format_str = args.format.unwrap_or_else(|| config.default_format.clone());
    let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table;

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Running {}...", kind.display_name()));
        Some(pb)
    } else {
        None
    };

    let target = ScanTarget::new(args.path, kind);
    let report = tokio::task::spawn_blocking(move || run_scan(&target, &config))
        .await
        .context("Scan task failed")?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    // Handle output
    if let Some(path) = &args.output {
        let content = format_result_to_string(&report, format)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if is_interactive {
            println!("Results written to: {}", path.display());
        }
    } else {
        print_result(&report, format)?;
    }

    if let Some(url) = &args.report_to {
        submit_report(url, &report).await;
    }

    let status = report.exit_status();
    debug!("Exit status: {:?}", status);
    Ok(status.code())
}

/// Collector failures are logged and never affect the exit code.
async fn submit_report(url: &str, report: &ScanReport) {
    let result = match Collector::new(url) {
        Ok(collector) => collector.submit(report).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        warn!("Failed to submit report: {:#}", e);
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'chainscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
