use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use simtlint::config::{Check, CheckConfig, IndexPolicy};
use simtlint::driver::{self, FileReport};
use simtlint::report;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "simtlint",
    version,
    about = "simtlint — checks SIMT kernel sources for divergent loops, unreachable barriers and recursion"
)]
struct Cli {
    /// Kernel source files
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identity function name (repeatable; replaces the defaults)
    #[arg(long = "identity-fn")]
    identity_fn: Vec<String>,

    /// Barrier function name (repeatable; replaces the defaults)
    #[arg(long = "barrier-fn")]
    barrier_fn: Vec<String>,

    /// Longest call cycle, in hops, that is reported
    #[arg(long)]
    max_recursion_depth: Option<usize>,

    /// Whether an identity-dependent array index taints the access
    #[arg(long, value_enum)]
    index_policy: Option<IndexPolicy>,

    /// Check to skip (repeatable)
    #[arg(long, value_enum)]
    disable: Vec<Check>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log analysis progress to stderr
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    /// Config file first, then command-line overrides.
    fn check_config(&self) -> anyhow::Result<CheckConfig> {
        let mut config = match &self.config {
            Some(path) => driver::load_config(path)?,
            None => CheckConfig::default(),
        };
        if !self.identity_fn.is_empty() {
            config.identity_functions = self.identity_fn.clone();
        }
        if !self.barrier_fn.is_empty() {
            config.barrier_functions = self.barrier_fn.clone();
        }
        if let Some(depth) = self.max_recursion_depth {
            config.max_recursion_depth = depth;
        }
        if let Some(policy) = self.index_policy {
            config.index_policy = policy;
        }
        for check in &self.disable {
            config.checks.disable(*check);
        }
        Ok(config)
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = cli.check_config().context("loading configuration")?;
    log::debug!("configuration: {:?}", config);

    let reports: Vec<FileReport> = driver::check_files(&cli.sources, &config)
        .into_iter()
        .collect::<Result<_, _>>()?;

    match cli.format {
        Format::Text => {
            print!("{}", report::render_text(&reports));
            eprintln!("simtlint: {}", report::summary(&reports));
        }
        Format::Json => {
            println!("{}", report::render_json(&reports).context("rendering JSON")?);
        }
    }
    Ok(reports.iter().any(FileReport::has_errors))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            eprintln!("simtlint: error: {e:#}");
            ExitCode::from(2)
        }
    }
}
