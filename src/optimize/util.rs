//! Shared plumbing for the encoder adapters: temp-file naming, Accept-list
//! matching, and subprocess invocation.

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::process::Command;

use crate::error::OptimizeError;
use crate::optimize::OptimizedImage;

/// Bytes of randomness in every generated temp filename.
const TEMP_NAME_RANDOM_BYTES: usize = 10;

/// Build an output path in the system temp directory.
///
/// The name is `{unix_nanos}-{hex randomness}-{source basename}`: the
/// timestamp and 10 random bytes make collisions between concurrent
/// requests astronomically unlikely, and the trailing basename keeps the
/// files recognizable when inspecting the temp directory.
pub fn temp_filename(source: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let random: [u8; TEMP_NAME_RANDOM_BYTES] = rand::random();

    let mut name = format!("{nanos}-");
    for byte in random {
        let _ = write!(name, "{byte:02x}");
    }
    name.push('-');
    name.push_str(
        &source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string()),
    );

    std::env::temp_dir().join(name)
}

/// True when the client's accept list names any of the given types.
///
/// Matching is exact string equality; wildcard entries like `image/*` only
/// match when listed literally in `matching`.
pub fn accepts_any(accepted_types: &[String], matching: &[&str]) -> bool {
    accepted_types
        .iter()
        .any(|accepted| matching.contains(&accepted.as_str()))
}

/// Run an encoder tool to completion.
///
/// With `stdout_to`, the tool's stdout is redirected into a freshly created
/// file (for tools like `jpegtran` and `cjpeg` that only write to stdout).
/// The child is killed when the future is dropped, so an aborted worker
/// never leaves an encoder running.
pub async fn run_tool<I, S>(
    tool: &'static str,
    args: I,
    stdout_to: Option<&Path>,
) -> Result<(), OptimizeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(tool);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    if let Some(path) = stdout_to {
        let file = std::fs::File::create(path)?;
        cmd.stdout(Stdio::from(file));
    }

    let status = cmd.status().await?;
    if !status.success() {
        return Err(OptimizeError::Tool { tool, status });
    }
    Ok(())
}

/// Stat a freshly encoded output file into a candidate.
pub async fn stat_output(
    optimizer: String,
    path: PathBuf,
    mime_type: &str,
) -> Result<OptimizedImage, OptimizeError> {
    let meta = tokio::fs::metadata(&path).await?;
    if meta.len() == 0 {
        return Err(OptimizeError::Io(std::io::Error::other(
            "encoder produced an empty output file",
        )));
    }
    Ok(OptimizedImage {
        optimizer,
        path,
        mime_type: mime_type.to_string(),
        size: meta.len(),
    })
}

/// Remove a temp file, logging instead of failing: leftover files are also
/// covered by the temp-directory sweep.
pub async fn remove_quiet(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), %e, "could not remove temp file");
    }
}
