use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ccmup_core::InstallError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTool {
    Curl,
    Wget,
}

impl DownloadTool {
    pub const PREFERENCE: [DownloadTool; 2] = [Self::Curl, Self::Wget];

    pub fn program(self) -> &'static str {
        match self {
            Self::Curl => "curl",
            Self::Wget => "wget",
        }
    }

    fn command(self, url: &str, out_path: &Path, timeout: Duration) -> Command {
        let secs = timeout.as_secs().max(1).to_string();
        let mut command = Command::new(self.program());
        match self {
            // A stalled transfer is aborted; a slow but moving one is not.
            Self::Curl => {
                command
                    .arg("-fsSL")
                    .arg("--retry")
                    .arg("2")
                    .arg("--connect-timeout")
                    .arg(&secs)
                    .arg("--speed-limit")
                    .arg("1")
                    .arg("--speed-time")
                    .arg(&secs)
                    .arg("-o")
                    .arg(out_path)
                    .arg(url);
            }
            Self::Wget => {
                command
                    .arg("-q")
                    .arg("--tries=2")
                    .arg(format!("--timeout={secs}"))
                    .arg("-O")
                    .arg(out_path)
                    .arg(url);
            }
        }
        command
    }
}

enum ToolFailure {
    NotInstalled,
    Failed(anyhow::Error),
}

/// Downloads `url` to `dest` through `<dest>.part`, trying curl before wget.
pub fn download_file(url: &str, dest: &Path, timeout: Duration) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create download dir: {}", parent.display()))?;
    }
    let part_path = dest.with_file_name(format!(
        "{}.part",
        dest.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("download")
    ));

    let mut failures = Vec::new();
    for tool in DownloadTool::PREFERENCE {
        let mut command = tool.command(url, &part_path, timeout);
        match run_tool(&mut command, tool.program()) {
            Ok(()) => {
                fs::rename(&part_path, dest).with_context(|| {
                    format!("failed to move download into place: {}", dest.display())
                })?;
                debug!(tool = tool.program(), url, "downloaded");
                return Ok(());
            }
            Err(ToolFailure::NotInstalled) => {
                debug!(tool = tool.program(), "download tool not found on PATH");
            }
            Err(ToolFailure::Failed(err)) => {
                let _ = fs::remove_file(&part_path);
                failures.push(format!("{err:#}"));
            }
        }
    }

    if failures.is_empty() {
        return Err(InstallError::MissingDownloadTool.into());
    }
    Err(InstallError::FetchFailed {
        what: dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string()),
        location: url.to_string(),
        reason: failures.join("; "),
    }
    .into())
}

fn run_tool(command: &mut Command, program: &str) -> Result<(), ToolFailure> {
    let output = match command.output() {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(ToolFailure::NotInstalled),
        Err(err) => {
            return Err(ToolFailure::Failed(
                anyhow::Error::new(err).context(format!("{program} download failed to start")),
            ))
        }
    };
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(ToolFailure::Failed(anyhow!(
        "{program} download failed: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    )))
}
