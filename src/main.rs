mod check;
mod collectors;
mod config;
mod filter;
mod metrics;
mod models;
mod status;
mod threshold;
mod util;

use anyhow::Result;
use check::{RunVerdict, CHECK_NAME};
use clap::Parser;
use collectors::filesystem::ProcMounts;
use config::{CheckConfig, ConfigFile};
use filter::ListFilter;
use log::debug;
use metrics::MetricsFormat;
use status::Status;
use std::io;
use std::path::PathBuf;

/// Cross platform disk usage check for Sensu
///
/// Every flag can also be set in the [thresholds], [filters] and [output]
/// sections of a TOML config file; flags take precedence.
#[derive(Parser, Debug)]
#[command(name = "check-disk-usage", version)]
struct Cli {
    /// Comma separated list of file system types to check
    #[arg(short = 'i', long, value_delimiter = ',')]
    include_fs_type: Vec<String>,

    /// Comma separated list of file system types to exclude from checking
    #[arg(short = 'e', long, value_delimiter = ',')]
    exclude_fs_type: Vec<String>,

    /// Comma separated list of file system paths to check
    #[arg(short = 'I', long, value_delimiter = ',')]
    include_fs_path: Vec<String>,

    /// Comma separated list of file system paths to exclude from checking
    #[arg(short = 'E', long, value_delimiter = ',')]
    exclude_fs_path: Vec<String>,

    /// Warning threshold for file system usage [default: 85]
    #[arg(short, long, allow_negative_numbers = true)]
    warning: Option<f64>,

    /// Critical threshold for file system usage [default: 95]
    #[arg(short, long, allow_negative_numbers = true)]
    critical: Option<f64>,

    /// Value in GiB. Levels are not adapted for filesystems of exactly this
    /// size, they are reduced for smaller and raised for larger filesystems [default: 20]
    #[arg(short, long)]
    normal: Option<f64>,

    /// Magic factor to adjust warn/crit thresholds. Example: .9 [default: 1]
    #[arg(short, long)]
    magic: Option<f64>,

    /// Minimum size to adjust (in GiB) [default: 100]
    #[arg(short = 'l', long)]
    minimum: Option<f64>,

    /// Include pseudo-filesystems (e.g. tmpfs)
    #[arg(short = 'p', long)]
    include_pseudo_fs: bool,

    /// Include read-only filesystems
    #[arg(short = 'r', long)]
    include_read_only: bool,

    /// Fail and exit on errors getting file system usage (e.g. permission denied)
    #[arg(short, long)]
    fail_on_error: bool,

    /// Print sizes in powers of 1024
    #[arg(short = 'H', long)]
    human_readable: bool,

    /// Output metrics instead of human readable output
    #[arg(long)]
    metrics: bool,

    /// Metrics output format: opentsdb_line or prometheus_text [default: opentsdb_line]
    #[arg(long)]
    metrics_format: Option<String>,

    /// Comma separated list of additional metric tags in key=value form
    #[arg(short, long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Config file (default: <config dir>/check-disk-usage/check-disk-usage.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let status = match run(&cli) {
        Ok(verdict) => verdict.status(),
        Err(e) => {
            println!("{} {}: {:#}", CHECK_NAME, Status::Critical, e);
            Status::Critical
        }
    };
    status.exit();
}

fn init_logging(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli) -> Result<RunVerdict> {
    let file = ConfigFile::load(cli.config.as_deref())?;
    let cfg = build_config(cli, &file)?;
    cfg.check_args()?;
    debug!("effective configuration: {:?}", cfg);
    if cfg.metrics {
        debug!("emitting metrics as {}", cfg.metrics_format.name());
    }

    let now = chrono::Utc::now().timestamp_millis();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let verdict = check::execute_check(&cfg, &ProcMounts::default(), &mut out, now)?;
    debug!(
        "{} filesystems checked: {} critical, {} warning",
        verdict.checked, verdict.criticals, verdict.warnings
    );
    Ok(verdict)
}

/// Layer command line flags over the config file.
fn build_config(cli: &Cli, file: &ConfigFile) -> Result<CheckConfig> {
    let mut cfg = CheckConfig::from_file(file)?;

    // a flag for one dimension replaces both of the file's lists for it
    if !cli.include_fs_type.is_empty() || !cli.exclude_fs_type.is_empty() {
        cfg.filters.fs_type = ListFilter::new(cli.include_fs_type.clone(), cli.exclude_fs_type.clone());
    }
    if !cli.include_fs_path.is_empty() || !cli.exclude_fs_path.is_empty() {
        cfg.filters.fs_path = ListFilter::new(cli.include_fs_path.clone(), cli.exclude_fs_path.clone());
    }
    cfg.filters.include_pseudo    |= cli.include_pseudo_fs;
    cfg.filters.include_read_only |= cli.include_read_only;

    let t = &mut cfg.thresholds;
    if let Some(v) = cli.warning  { t.warning = v; }
    if let Some(v) = cli.critical { t.critical = v; }
    if let Some(v) = cli.normal   { t.normal_gib = v; }
    if let Some(v) = cli.magic    { t.magic = v; }
    if let Some(v) = cli.minimum  { t.minimum_gib = v; }

    cfg.fail_on_error  |= cli.fail_on_error;
    cfg.human_readable |= cli.human_readable;
    cfg.metrics        |= cli.metrics;
    if let Some(name) = &cli.metrics_format {
        cfg.metrics_format = MetricsFormat::from_name(name);
    }
    cfg.tags.extend(config::parse_tags(&cli.tags)?);

    Ok(cfg)
}
