use anyhow::Result;
use tracing::instrument;

use crate::journal::{Journal, Severity};
use crate::mirrors::MirrorSpec;
use crate::process;
use crate::summary;
use crate::validate;

#[derive(Debug, Clone)]
pub struct Settings {
    pub process: process::Settings,
    /// Log the command instead of running it
    pub dry_run: bool,
}

/// Mirror one entry: validate, run the tool, report its summary
///
/// Returns `Ok(false)` for failures that are reported to the journal (invalid entry, tool exit
/// code above 8, timeout, unparseable summary). Only a tool that cannot be launched at all, or
/// whose output cannot be collected, is returned as an error.
///
/// # Errors
///
/// Returns an error if the tool cannot be launched or the journal cannot be written.
#[instrument(skip(settings, journal), fields(name = %spec.name))]
pub async fn execute(spec: &MirrorSpec, settings: &Settings, journal: &Journal) -> Result<bool> {
    let errors = validate::validate(spec);
    if !errors.is_empty() {
        journal
            .log_all(Severity::Error, errors.iter().map(ToString::to_string))
            .await?;
        return Ok(false);
    }
    if settings.dry_run {
        journal
            .log(
                Severity::Info,
                format!(
                    "Dry run: {}",
                    process::command_line(spec, &settings.process)
                ),
            )
            .await?;
        return Ok(true);
    }
    let result = match process::run(spec, &settings.process).await {
        Ok(result) => result,
        Err(error @ process::Error::TimedOut { .. }) => {
            journal
                .log(
                    Severity::Error,
                    format!("Mirror '{}' failed: {}", spec.name, error),
                )
                .await?;
            return Ok(false);
        }
        Err(error) => return Err(error.into()),
    };
    if !result.is_success() {
        journal
            .log_all(
                Severity::Error,
                [
                    format!(
                        "Mirror '{}' failed with exit code {}",
                        spec.name, result.exit_code
                    ),
                    "Standard output:".to_string(),
                    result.stdout,
                    "Standard error:".to_string(),
                    result.stderr,
                ],
            )
            .await?;
        return Ok(false);
    }
    journal
        .log(
            Severity::Debug,
            format!(
                "Exit code {}: {}",
                result.exit_code,
                result.exit_code.describe().join(", ")
            ),
        )
        .await?;
    let summary = match summary::parse_summary(&result.stdout) {
        Ok(summary) => summary,
        Err(error) => {
            journal
                .log_all(
                    Severity::Error,
                    [
                        format!(
                            "Mirror '{}' produced an unexpected summary: {}",
                            spec.name, error
                        ),
                        "Standard output:".to_string(),
                        result.stdout,
                    ],
                )
                .await?;
            return Ok(false);
        }
    };
    journal
        .log_all(Severity::Info, summary.report_lines())
        .await?;
    Ok(true)
}
