//! Append-only mirror log with console echo
//!
//! Every call writes timestamped, level-tagged lines to the log file (if any) and echoes the same
//! lines to stdout. Writes from one call are done under a single lock so lines from concurrent
//! callers never interleave.

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    fn tag(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    fn style(self, text: String) -> console::StyledObject<String> {
        let styled = console::style(text);
        match self {
            Severity::Critical => styled.red().bold(),
            Severity::Error => styled.red(),
            Severity::Warning => styled.yellow(),
            Severity::Info => styled.green(),
            Severity::Debug => styled.dim(),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Echo lines to stdout
    pub console: bool,
    /// Lines below this severity are dropped
    pub min_severity: Severity,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            console: true,
            min_severity: Severity::Info,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Journal {
    log_opt: Option<std::sync::Arc<tokio::sync::Mutex<tokio::io::BufWriter<tokio::fs::File>>>>,
    console_lock: std::sync::Arc<tokio::sync::Mutex<()>>,
    settings: Settings,
}

impl Journal {
    /// Open the journal, appending to `log_path_opt` if given
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened for appending.
    pub async fn open(log_path_opt: Option<&std::path::Path>, settings: Settings) -> Result<Self> {
        let log_opt = if let Some(log_path) = log_path_opt {
            let log_file = tokio::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(log_path)
                .await
                .with_context(|| format!("Failed to open log file: {:?}", log_path))?;
            Some(std::sync::Arc::new(tokio::sync::Mutex::new(
                tokio::io::BufWriter::new(log_file),
            )))
        } else {
            None
        };
        Ok(Self {
            log_opt,
            console_lock: Default::default(),
            settings,
        })
    }

    pub async fn log(&self, severity: Severity, message: impl AsRef<str>) -> Result<()> {
        self.log_all(severity, [message]).await
    }

    /// Log several messages as one uninterrupted block
    pub async fn log_all<I, S>(&self, severity: Severity, messages: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if severity < self.settings.min_severity {
            return Ok(());
        }
        let timestamp = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();
        let mut lines = vec![];
        for message in messages {
            for line in message.as_ref().lines() {
                lines.push(format!("{} [{}] {}", timestamp, severity, line));
            }
        }
        self.emit(&lines, Some(severity)).await
    }

    /// Blank line between batch items
    pub async fn separator(&self) -> Result<()> {
        self.emit(&[String::new()], None).await
    }

    async fn emit(&self, lines: &[String], severity: Option<Severity>) -> Result<()> {
        if let Some(log) = &self.log_opt {
            let mut log = log.lock().await;
            for line in lines {
                log.write_all(line.as_bytes())
                    .await
                    .context("Failed to write to log file")?;
                log.write_all(b"\n")
                    .await
                    .context("Failed to write to log file")?;
            }
            log.flush().await.context("Failed to flush log file")?;
        }
        if self.settings.console {
            let _guard = self.console_lock.lock().await;
            let term = console::Term::stdout();
            for line in lines {
                let res = match severity {
                    Some(severity) => term.write_line(&severity.style(line.clone()).to_string()),
                    None => term.write_line(line),
                };
                res.context("Failed to write to console")?;
            }
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        if let Some(log) = &self.log_opt {
            let mut log = log.lock().await;
            log.flush().await.context("Failed to flush log file")?;
        }
        Ok(())
    }
}
