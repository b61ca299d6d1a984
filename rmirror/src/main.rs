use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::instrument;

use common::journal::{self, Journal, Severity};
use common::{batch, mirror, process, validate};

const DEFAULT_CONFIG: &str = "mirrors.json";
const DEFAULT_LOG: &str = "rmirror.log";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rmirror",
    version,
    about = "Mirror a configured list of directories with robocopy",
    long_about = "`rmirror` reads a list of mirror entries from a JSON file and mirrors every enabled entry with `robocopy /mir`, one at a time, in file order.

The configuration is a JSON array of objects with the fields `name`, `source`, `relativeDestination` and `enabled`. Destinations are resolved against the directory containing the `rmirror` executable (or --base-dir), never the current working directory.

Each run appends to a log file and echoes it to the console. The first failing entry stops the batch.

EXIT CODES:
    0 - All enabled entries mirrored
    1 - Configuration missing or invalid, or a mirror failed

EXAMPLES:
    # Mirror everything listed in mirrors.json next to the executable
    rmirror

    # Use an explicit configuration and show what would run
    rmirror --config /etc/rmirror/mirrors.json --dry-run"
)]
struct Args {
    // Mirror options
    /// Mirror configuration file
    ///
    /// Defaults to `mirrors.json` in the base directory.
    #[arg(long, value_name = "PATH", help_heading = "Mirror options")]
    config: Option<std::path::PathBuf>,

    /// Directory relative destinations are resolved against
    ///
    /// Defaults to the directory containing the `rmirror` executable.
    #[arg(long, value_name = "PATH", help_heading = "Mirror options")]
    base_dir: Option<std::path::PathBuf>,

    /// Mirroring tool executable
    #[arg(
        long,
        default_value = process::DEFAULT_PROGRAM,
        value_name = "PROGRAM",
        help_heading = "Mirror options"
    )]
    tool: std::ffi::OsString,

    /// Kill the mirroring tool if a single entry takes longer than this
    ///
    /// Accepts human-readable durations like "90s", "30min", "2h". Without it the tool may run
    /// indefinitely.
    #[arg(long, value_name = "DURATION", help_heading = "Mirror options")]
    timeout: Option<String>,

    /// Log the commands that would run without running them
    #[arg(long, help_heading = "Mirror options")]
    dry_run: bool,

    // Progress & output
    /// Log file the run is appended to
    ///
    /// Defaults to `rmirror.log` in the base directory.
    #[arg(long, value_name = "PATH", help_heading = "Progress & output")]
    log: Option<std::path::PathBuf>,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    ///
    /// Any verbosity also writes DEBUG lines to the log.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't echo the log to the console or report errors
    ///
    /// The log file is still written.
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,
}

async fn mirror_all(
    args: &Args,
    base_dir: &std::path::Path,
    journal: &Journal,
) -> Result<batch::Summary> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| base_dir.join(DEFAULT_CONFIG));
    let collection = common::MirrorSpecCollection::load(&config_path).await?;
    let errors = validate::validate_all(&collection);
    if !errors.is_empty() {
        journal
            .log_all(Severity::Error, errors.iter().map(ToString::to_string))
            .await?;
        return Err(anyhow!(
            "configuration {:?} failed validation with {} error(s)",
            &config_path,
            errors.len()
        ));
    }
    tracing::info!(
        "{} of {} mirror entries enabled",
        collection.enabled().count(),
        collection.len()
    );
    let timeout = args
        .timeout
        .as_deref()
        .map(humantime::parse_duration)
        .transpose()
        .context("invalid --timeout value")?;
    let settings = mirror::Settings {
        process: process::Settings {
            program: args.tool.clone(),
            base_dir: base_dir.to_path_buf(),
            timeout,
        },
        dry_run: args.dry_run,
    };
    match batch::run(&collection, &settings, journal).await {
        Ok(summary) => Ok(summary),
        Err(error) => {
            if args.summary {
                return Err(anyhow!("{}\n\n{}", error, &error.summary));
            }
            Err(error.into())
        }
    }
}

#[instrument]
async fn async_main(args: Args) -> Result<batch::Summary> {
    let base_dir = match &args.base_dir {
        Some(base_dir) => base_dir.clone(),
        None => process::base_dir().context("cannot determine rmirror base directory")?,
    };
    let log_path = args
        .log
        .clone()
        .unwrap_or_else(|| base_dir.join(DEFAULT_LOG));
    let journal = Journal::open(
        Some(&log_path),
        journal::Settings {
            console: !args.quiet,
            min_severity: if args.verbose > 0 {
                Severity::Debug
            } else {
                Severity::Info
            },
        },
    )
    .await?;
    let res = mirror_all(&args, &base_dir, &journal).await;
    if let Err(error) = &res {
        journal
            .log(Severity::Critical, format!("{:#}", error))
            .await?;
    }
    journal.flush().await?;
    res
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(output, runtime, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
