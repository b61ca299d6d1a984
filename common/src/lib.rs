//! Common library for `rmirror`
//!
//! `rmirror` keeps a set of directories mirrored with `robocopy`. A JSON file lists the mirror
//! entries; each enabled entry is validated, mirrored and its robocopy summary is written to a
//! log file and echoed to the console.
//!
//! # Modules
//!
//! - [`mirrors`]: mirror entries and the configuration loader
//! - [`validate`]: per-entry and whole-collection checks
//! - [`process`]: launching robocopy and capturing its output
//! - [`summary`]: parsing and formatting the robocopy summary table
//! - [`journal`]: the append-only log with console echo
//! - [`mirror`]: mirroring a single entry
//! - [`batch`]: mirroring all entries in order
//!
//! [`run`] sets up `tracing` and the tokio runtime for the binary.

pub mod batch;
pub mod config;
pub mod journal;
pub mod mirror;
pub mod mirrors;
pub mod process;
pub mod summary;
pub mod validate;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, RuntimeConfig};
pub use journal::{Journal, Severity};
pub use mirrors::{MirrorSpec, MirrorSpecCollection};

/// Install the `tracing` subscriber for diagnostics written to stderr
///
/// `RUST_LOG` overrides the level derived from `--verbose`.
fn init_tracing(output: &OutputConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.filter_directive()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(console::colors_enabled_stderr())
        .finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("rmirror: failed to install tracing subscriber: {}", error);
    }
}

/// Run `func` on a fresh tokio runtime
///
/// Returns `None` if the runtime could not be built or `func` failed; the error has already been
/// reported through `tracing` unless `output.quiet` is set.
pub fn run<Fut, Summary, Error>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Summary: std::fmt::Display,
    Error: std::fmt::Display,
    Fut: std::future::Future<Output = Result<Summary, Error>>,
{
    if !output.quiet {
        init_tracing(&output);
    }
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(error) => {
            tracing::error!("failed to build tokio runtime: {:#}", &error);
            return None;
        }
    };
    match rt.block_on(func()) {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{}", &summary);
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                tracing::error!("{:#}", &error);
            }
            None
        }
    }
}
