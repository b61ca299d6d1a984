/// Write an executable shell script standing in for robocopy
#[cfg(unix)]
pub fn write_tool(dir: &std::path::Path, body: &str) -> anyhow::Result<std::path::PathBuf> {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-robocopy.sh");
    {
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "#!/bin/sh")?;
        writeln!(file, "{}", body)?;
        file.sync_all()?;
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Typical robocopy output for a run with `/ndl /nfl /nc /bytes`
pub const ROBOCOPY_STDOUT: &str = "
-------------------------------------------------------------------------------
   ROBOCOPY     ::     Robust File Copy for Windows
-------------------------------------------------------------------------------

               Total    Copied   Skipped  Mismatch    FAILED    Extras
    Dirs :        12         2        10         0         0         1
   Files :      6000      5000      1000         0         0         3
   Bytes :   5242880   1048576   4194304         0         0      2048
   Times :   0:01:40   0:01:30                       0:00:00   0:00:10
";
