//! Running robocopy for one mirror entry
//!
//! The tool is launched with both output streams piped. Stdout, stderr and the exit status are
//! awaited together so a child that blocks writing one stream while the other is unread can never
//! stall the parent.

use tokio::io::AsyncReadExt;
use tracing::instrument;

use crate::mirrors::MirrorSpec;

pub const DEFAULT_PROGRAM: &str = "robocopy";

/// Fixed robocopy switches, appended after the source and destination
///
/// - `/e` copy subdirectories, including empty ones
/// - `/j` unbuffered I/O
/// - `/mir` mirror, deleting destination entries that no longer exist in the source
/// - `/r:5 /w:1` 5 retries, 1 second apart
/// - `/ndl /nfl /nc` no directory, file or class listing
/// - `/bytes` sizes in bytes
/// - `/mt` multi-threaded copy
pub const FLAGS: [&str; 10] = [
    "/e", "/j", "/mir", "/r:5", "/w:1", "/ndl", "/nfl", "/nc", "/bytes", "/mt",
];

/// Largest exit code robocopy uses for a run that completed
pub const MAX_SUCCESS_CODE: i32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to launch {program:?}: {source}")]
    Launch {
        program: std::ffi::OsString,
        #[source]
        source: std::io::Error,
    },
    #[error("failed collecting output of {program:?}: {source}")]
    Io {
        program: std::ffi::OsString,
        #[source]
        source: std::io::Error,
    },
    #[error("{program:?} did not finish within {timeout:?}")]
    TimedOut {
        program: std::ffi::OsString,
        timeout: std::time::Duration,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Tool executable, looked up in PATH unless it contains a path separator
    pub program: std::ffi::OsString,
    /// Directory relative destinations are resolved against
    pub base_dir: std::path::PathBuf,
    /// Kill the tool after this long; `None` waits forever
    pub timeout: Option<std::time::Duration>,
}

impl Settings {
    #[must_use]
    pub fn new(base_dir: std::path::PathBuf) -> Self {
        Self {
            program: DEFAULT_PROGRAM.into(),
            base_dir,
            timeout: None,
        }
    }
}

/// Directory containing the running executable
///
/// # Errors
///
/// Returns an error if the executable path cannot be determined.
pub fn base_dir() -> anyhow::Result<std::path::PathBuf> {
    let current_exe = std::env::current_exe()?;
    let bin_dir = current_exe.parent().ok_or_else(|| {
        anyhow::anyhow!(
            "executable path {:?} has no parent directory",
            &current_exe
        )
    })?;
    Ok(bin_dir.to_path_buf())
}

/// Raw robocopy exit code
///
/// Codes 0 through 8 are a bit set describing what happened; anything else (including a child
/// killed by a signal, recorded as -1) means robocopy did not complete.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const FILES_COPIED: i32 = 0x01;
    pub const EXTRAS: i32 = 0x02;
    pub const MISMATCHES: i32 = 0x04;
    pub const FAILURES: i32 = 0x08;
    pub const FATAL: i32 = 0x10;

    #[must_use]
    pub fn is_success(self) -> bool {
        (0..=MAX_SUCCESS_CODE).contains(&self.0)
    }

    /// Names of the bits set in a non-negative code
    #[must_use]
    pub fn describe(self) -> Vec<&'static str> {
        if self.0 < 0 {
            return vec!["terminated without exit code"];
        }
        if self.0 == 0 {
            return vec!["no changes"];
        }
        [
            (Self::FILES_COPIED, "files copied"),
            (Self::EXTRAS, "extra entries found"),
            (Self::MISMATCHES, "mismatched entries found"),
            (Self::FAILURES, "some copies failed"),
            (Self::FATAL, "fatal error"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.0 & bit != 0)
        .map(|(_, name)| name)
        .collect()
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: ExitCode,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code.is_success()
    }
}

/// Tool arguments: source, resolved destination, then [`FLAGS`]
#[must_use]
pub fn arguments(spec: &MirrorSpec, settings: &Settings) -> Vec<std::ffi::OsString> {
    let mut args: Vec<std::ffi::OsString> = vec![
        spec.source.clone().into_os_string(),
        spec.destination(&settings.base_dir).into_os_string(),
    ];
    args.extend(FLAGS.iter().map(std::ffi::OsString::from));
    args
}

/// Printable command line, arguments with spaces are double-quoted
#[must_use]
pub fn command_line(spec: &MirrorSpec, settings: &Settings) -> String {
    std::iter::once(settings.program.clone())
        .chain(arguments(spec, settings))
        .map(|arg| {
            let arg = arg.to_string_lossy().into_owned();
            if arg.contains(' ') {
                format!("\"{}\"", arg)
            } else {
                arg
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run the tool to completion and capture its output
///
/// # Errors
///
/// [`Error::Launch`] if the executable cannot be started, [`Error::Io`] if reading its output or
/// waiting for it fails and [`Error::TimedOut`] if a configured timeout expires.
#[instrument(skip(settings), fields(name = %spec.name))]
pub async fn run(spec: &MirrorSpec, settings: &Settings) -> Result<ExecutionResult, Error> {
    let program = settings.program.clone();
    tracing::debug!("running: {}", command_line(spec, settings));
    let mut child = tokio::process::Command::new(&program)
        .args(arguments(spec, settings))
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Launch {
            program: program.clone(),
            source,
        })?;
    let io_error = |source: std::io::Error| Error::Io {
        program: program.clone(),
        source,
    };
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io_error(std::io::Error::other("stdout was not captured")))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| io_error(std::io::Error::other("stderr was not captured")))?;
    let collect = async {
        let mut out = vec![];
        let mut err = vec![];
        let (status, _, _) = tokio::try_join!(
            child.wait(),
            stdout.read_to_end(&mut out),
            stderr.read_to_end(&mut err)
        )?;
        Ok::<_, std::io::Error>((status, out, err))
    };
    let collected = match settings.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, collect).await {
            Ok(collected) => collected,
            Err(_) => {
                tracing::warn!("timed out after {:?}, killing child", timeout);
                return Err(Error::TimedOut {
                    program: program.clone(),
                    timeout,
                });
            }
        },
        None => collect.await,
    };
    let (status, out, err) = collected.map_err(io_error)?;
    let exit_code = ExitCode(status.code().unwrap_or(-1));
    tracing::debug!(
        "exited with {} ({} stdout, {} stderr)",
        exit_code,
        bytesize::ByteSize(out.len() as u64),
        bytesize::ByteSize(err.len() as u64)
    );
    Ok(ExecutionResult {
        exit_code,
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
    })
}
