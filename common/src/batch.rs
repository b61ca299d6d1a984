use tracing::instrument;

use crate::journal::{Journal, Severity};
use crate::mirror;
use crate::mirrors::MirrorSpecCollection;

/// Error type for batch runs that preserves the batch summary even on failure.
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub mirrors_succeeded: usize,
    pub mirrors_failed: usize,
    pub mirrors_skipped: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "mirrors succeeded: {}\n\
            mirrors failed: {}\n\
            mirrors skipped: {}",
            self.mirrors_succeeded, self.mirrors_failed, self.mirrors_skipped
        )
    }
}

/// Mirror every enabled entry in order, stopping at the first failure
///
/// Entries are run one at a time; robocopy already copies with multiple threads. Mirrors that
/// completed before a failure are left in place.
///
/// # Errors
///
/// Returns an error carrying the summary so far if a mirror fails or a fatal error occurs.
#[instrument(skip_all)]
pub async fn run(
    collection: &MirrorSpecCollection,
    settings: &mirror::Settings,
    journal: &Journal,
) -> Result<Summary, Error> {
    let mut summary = Summary::default();
    for spec in collection {
        if !spec.enabled {
            tracing::debug!("skipping disabled mirror '{}'", spec.name);
            summary.mirrors_skipped += 1;
            continue;
        }
        journal
            .separator()
            .await
            .map_err(|err| Error::new(err, summary))?;
        journal
            .log(Severity::Info, spec.to_string())
            .await
            .map_err(|err| Error::new(err, summary))?;
        let succeeded = mirror::execute(spec, settings, journal)
            .await
            .map_err(|err| Error::new(err, summary))?;
        if !succeeded {
            summary.mirrors_failed += 1;
            return Err(Error::new(
                anyhow::anyhow!("mirror '{}' failed, stopping", spec.name),
                summary,
            ));
        }
        summary.mirrors_succeeded += 1;
    }
    Ok(summary)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::journal;
    use crate::mirrors::MirrorSpec;
    use crate::process;
    use crate::testutils;

    async fn setup(
        body: &str,
    ) -> anyhow::Result<(tempfile::TempDir, mirror::Settings, Journal, std::path::PathBuf)> {
        let dir = tempfile::tempdir()?;
        let tool = testutils::write_tool(dir.path(), body)?;
        let mut process = process::Settings::new(dir.path().join("base"));
        process.program = tool.into_os_string();
        let log = dir.path().join("rmirror.log");
        let journal = Journal::open(
            Some(&log),
            journal::Settings {
                console: false,
                min_severity: Severity::Info,
            },
        )
        .await?;
        let settings = mirror::Settings {
            process,
            dry_run: false,
        };
        Ok((dir, settings, journal, log))
    }

    fn spec(dir: &std::path::Path, name: &str, enabled: bool) -> MirrorSpec {
        let source = dir.join(format!("src-{}", name));
        std::fs::create_dir_all(&source).unwrap();
        MirrorSpec {
            name: name.to_string(),
            source,
            relative_destination: name.to_string(),
            enabled,
        }
    }

    #[tokio::test]
    async fn runs_enabled_entries_in_order() -> anyhow::Result<()> {
        // the tool appends its destination argument to a file next to itself
        let (dir, settings, journal, _) =
            setup("echo \"$2\" >> \"$(dirname \"$0\")/calls.txt\"\nexit 0").await?;
        let collection = MirrorSpecCollection::from(vec![
            spec(dir.path(), "first", true),
            spec(dir.path(), "second", false),
            spec(dir.path(), "third", true),
        ]);
        let summary = run(&collection, &settings, &journal).await?;
        assert_eq!(
            summary,
            Summary {
                mirrors_succeeded: 2,
                mirrors_failed: 0,
                mirrors_skipped: 1,
            }
        );
        let calls = std::fs::read_to_string(dir.path().join("calls.txt"))?;
        let base = dir.path().join("base");
        assert_eq!(
            calls.lines().collect::<Vec<_>>(),
            [
                base.join("first").to_str().unwrap(),
                base.join("third").to_str().unwrap()
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn disabled_entry_never_invokes_tool() -> anyhow::Result<()> {
        let (dir, mut settings, journal, _) = setup("exit 0").await?;
        settings.process.program = dir.path().join("does-not-exist").into_os_string();
        let collection = MirrorSpecCollection::from(vec![spec(dir.path(), "off", false)]);
        let summary = run(&collection, &settings, &journal).await?;
        assert_eq!(summary.mirrors_skipped, 1);
        assert_eq!(summary.mirrors_succeeded, 0);
        Ok(())
    }

    #[tokio::test]
    async fn stops_at_first_failure() -> anyhow::Result<()> {
        let (dir, settings, journal, log) = setup(
            "echo \"$2\" >> \"$(dirname \"$0\")/calls.txt\"\necho report\necho broken >&2\nexit 16",
        )
        .await?;
        let collection = MirrorSpecCollection::from(vec![
            spec(dir.path(), "first", true),
            spec(dir.path(), "second", true),
        ]);
        let error = run(&collection, &settings, &journal).await.unwrap_err();
        assert_eq!(error.summary.mirrors_failed, 1);
        assert_eq!(error.summary.mirrors_succeeded, 0);
        assert_eq!(error.to_string(), "mirror 'first' failed, stopping");
        let calls = std::fs::read_to_string(dir.path().join("calls.txt"))?;
        assert_eq!(calls.lines().count(), 1);
        let log = std::fs::read_to_string(log)?;
        assert!(log.contains("[INFO] Name: first, Source: "));
        assert!(log.contains("[ERROR] report"));
        assert!(log.contains("[ERROR] broken"));
        assert!(!log.contains("Name: second"));
        Ok(())
    }

    #[tokio::test]
    async fn separator_precedes_each_entry() -> anyhow::Result<()> {
        let (dir, settings, journal, log) = setup("exit 0").await?;
        let collection = MirrorSpecCollection::from(vec![
            spec(dir.path(), "first", true),
            spec(dir.path(), "second", true),
        ]);
        run(&collection, &settings, &journal).await?;
        let log = std::fs::read_to_string(log)?;
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines[0], "");
        assert!(lines[1].contains("[INFO] Name: first"));
        let second = lines
            .iter()
            .position(|line| line.contains("Name: second"))
            .unwrap();
        assert_eq!(lines[second - 1], "");
        Ok(())
    }
}
