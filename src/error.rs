// Error taxonomy for everything that talks to the audio stack or the button
// Nothing here is retried - every variant ends the run with its message

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ButtonError {
    /// The external binary is missing or cannot be executed
    #[error("'{tool}' is not available: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The version banner could not be parsed or is too old
    #[error("unsupported '{tool}' version banner: {banner:?}")]
    ToolVersionMismatch { tool: String, banner: String },

    #[error("'{tool}' did not answer the version probe within {timeout:?}")]
    ProbeTimeout { tool: String, timeout: Duration },

    #[error("'{tool}' exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Card is unknown to the mixer or exposes no playback control
    #[error("invalid card {0}: no playback mixer control found")]
    InvalidCard(u32),

    #[error("card {card} has no mixer control named {control:?}")]
    UnknownControl { card: u32, control: String },

    #[error("no song path was provided")]
    EmptySongList,

    #[error("no mp3 files found in {}", .0.display())]
    EmptyFolder(PathBuf),

    #[error("GPIO pin {0} is outside the usable range 2-27")]
    InvalidGpioPin(u8),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("invalid parser pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "gpio")]
impl From<rppal::gpio::Error> for ButtonError {
    fn from(err: rppal::gpio::Error) -> Self {
        ButtonError::Gpio(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ButtonError>;
