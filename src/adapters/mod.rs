// Adapters around the ALSA command line tools and mpg321
// Each adapter turns raw command output into model types; the text formats
// stay in here so the service never sees a banner or a mixer dump

pub mod amixer; // mixer controls + volume set
pub mod aplay;  // playback card listing
pub mod mpg321; // actual playback

#[cfg(test)]
pub(crate) mod fakes;

pub use amixer::{AmixerAdapter, Mixer, MixerParser, VolumeCommand};
pub use aplay::{AplayAdapter, DeviceListParser, DeviceSource};
pub use mpg321::{Mpg321Adapter, Player};

use crate::error::{ButtonError, Result};
use regex::Regex;
use std::ffi::OsStr;
use std::fmt;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Semantic version taken from a tool's `--version` banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ToolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Find `<tool>[:] version x.y.z` at the start of any banner line.
pub fn parse_version(tool_name: &str, banner: &str) -> Result<Option<ToolVersion>> {
    let pattern = format!(
        r"(?m)^\s*{}:?\s+version\s+(\d+)\.(\d+)\.(\d+)",
        regex::escape(tool_name)
    );
    let regex = Regex::new(&pattern)?;

    Ok(regex.captures(banner).and_then(|caps| {
        Some(ToolVersion::new(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ))
    }))
}

/// Accept the banner only if it parses and meets `minimum`.
pub fn check_version(tool_name: &str, banner: &str, minimum: ToolVersion) -> Result<ToolVersion> {
    match parse_version(tool_name, banner)? {
        Some(version) if version >= minimum => Ok(version),
        _ => Err(ButtonError::ToolVersionMismatch {
            tool: tool_name.to_string(),
            banner: banner.lines().next().unwrap_or_default().to_string(),
        }),
    }
}

/// One external program: the name it goes by and the binary to launch.
/// Errors always carry the name, the binary path only shows up in logs.
#[derive(Debug, Clone)]
pub struct Tool {
    name: &'static str,
    program: String,
}

impl Tool {
    pub fn new(name: &'static str, program: impl Into<String>) -> Self {
        Self {
            name,
            program: program.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn command<S: AsRef<OsStr>>(&self, args: &[S]) -> Command {
        let mut cmd = Command::new(&self.program);
        // Dropping the future (interrupt) must not leave the child behind
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn unavailable(&self, source: std::io::Error) -> ButtonError {
        ButtonError::ToolUnavailable {
            tool: self.name.to_string(),
            source,
        }
    }

    /// Run to completion and hand back the raw output, whatever the exit status.
    pub async fn output<S: AsRef<OsStr> + fmt::Debug + Sync>(&self, args: &[S]) -> Result<Output> {
        debug!(tool = self.name, program = %self.program, ?args, "running external command");
        self.command(args)
            .output()
            .await
            .map_err(|e| self.unavailable(e))
    }

    /// Run to completion and return stdout, failing on a non-zero exit.
    pub async fn run<S: AsRef<OsStr> + fmt::Debug + Sync>(&self, args: &[S]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(self.failed(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run with inherited stdout/stderr, only the exit status matters.
    pub async fn status<S: AsRef<OsStr> + fmt::Debug + Sync>(&self, args: &[S]) -> Result<()> {
        debug!(tool = self.name, program = %self.program, ?args, "running external command");
        let status = self
            .command(args)
            .status()
            .await
            .map_err(|e| self.unavailable(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ButtonError::ToolFailed {
                tool: self.name.to_string(),
                status,
                stderr: String::new(),
            })
        }
    }

    pub fn failed(&self, output: &Output) -> ButtonError {
        ButtonError::ToolFailed {
            tool: self.name.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Ask for `--version` and gate on the banner. Bounded by `timeout`.
    pub async fn probe_version(
        &self,
        timeout: Duration,
        minimum: ToolVersion,
    ) -> Result<ToolVersion> {
        let args = ["--version".to_string()];
        let output = tokio::time::timeout(timeout, self.output(&args))
            .await
            .map_err(|_| ButtonError::ProbeTimeout {
                tool: self.name.to_string(),
                timeout,
            })??;

        // Some tools print the banner on stderr, some exit non-zero after it
        let mut banner = String::from_utf8_lossy(&output.stdout).into_owned();
        banner.push_str(&String::from_utf8_lossy(&output.stderr));

        let version = check_version(self.name, &banner, minimum)?;
        debug!(tool = self.name, %version, "version probe passed");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fakes;

    #[test]
    fn test_parse_alsa_banners() {
        let aplay = "aplay: version 1.2.4 by Jaroslav Kysela <perex@perex.cz>\n";
        assert_eq!(parse_version("aplay", aplay).unwrap(), Some(ToolVersion::new(1, 2, 4)));

        let amixer = "amixer version 1.2.4\n";
        assert_eq!(parse_version("amixer", amixer).unwrap(), Some(ToolVersion::new(1, 2, 4)));
    }

    #[test]
    fn test_parse_mpg321_banner() {
        let banner = "mpg321 version 0.3.2. Copyright (C) 2001, 2002 Joe Drew,\n\
                      now maintained by Nanakos Chrysostomos and others.\n";
        assert_eq!(parse_version("mpg321", banner).unwrap(), Some(ToolVersion::new(0, 3, 2)));
    }

    #[test]
    fn test_unrecognised_banner_is_a_mismatch() {
        let result = check_version("aplay", "usage: aplay [flags]", ToolVersion::new(1, 0, 0));
        assert!(matches!(result, Err(ButtonError::ToolVersionMismatch { .. })));

        // Banner from a different tool does not count
        let result = check_version("aplay", "amixer version 1.2.4", ToolVersion::new(1, 0, 0));
        assert!(matches!(result, Err(ButtonError::ToolVersionMismatch { .. })));
    }

    #[test]
    fn test_too_old_version_is_a_mismatch() {
        let minimum = ToolVersion::new(1, 0, 0);
        let result = check_version("aplay", "aplay: version 0.9.8 by someone", minimum);
        assert!(matches!(result, Err(ButtonError::ToolVersionMismatch { .. })));

        let ok = check_version("aplay", "aplay: version 1.0.0 by someone", minimum);
        assert_eq!(ok.unwrap(), ToolVersion::new(1, 0, 0));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let tool = Tool::new("aplay", "/nonexistent/definitely-not-aplay");
        let result = tool.run(&["-l".to_string()]).await;
        assert!(matches!(result, Err(ButtonError::ToolUnavailable { .. })));

        let result = tool
            .probe_version(Duration::from_secs(1), ToolVersion::new(1, 0, 0))
            .await;
        assert!(matches!(result, Err(ButtonError::ToolUnavailable { .. })));
        assert!(result.unwrap_err().to_string().starts_with("'aplay' is not available"));
    }

    #[tokio::test]
    async fn test_hanging_version_probe_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let aplay = fakes::shell_tool(dir.path(), "aplay", "sleep 10");

        let started = tokio::time::Instant::now();
        let result = AplayAdapter::connect(&aplay, Duration::from_millis(300)).await;

        assert!(matches!(result, Err(ButtonError::ProbeTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_version_probe_through_real_process() {
        let dir = tempfile::tempdir().unwrap();
        let aplay = fakes::shell_tool(
            dir.path(),
            "aplay",
            "echo 'aplay: version 1.2.4 by Jaroslav Kysela <perex@perex.cz>'",
        );
        let tool = Tool::new("aplay", aplay);

        let version = tool
            .probe_version(Duration::from_secs(5), ToolVersion::new(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(version, ToolVersion::new(1, 2, 4));
    }
}
