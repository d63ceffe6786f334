// Mixer controls via `amixer`
// Reads `amixer -c <card>` (scontents) and writes with `amixer -c <card> sset`

use super::{Tool, ToolVersion};
use crate::error::Result;
use crate::model::MixerControl;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What amixer prints (on stderr) for a card that does not exist.
pub const INVALID_CARD_MESSAGE: &str = "Invalid card number";

#[async_trait]
pub trait Mixer: Send + Sync {
    /// Playback controls of a card in the order amixer reports them.
    async fn list_controls(&self, card_id: u32) -> Result<Vec<MixerControl>>;

    async fn apply(&self, command: &VolumeCommand) -> Result<()>;
}

/// A ready-to-run volume change for one control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCommand {
    pub card_id: u32,
    /// Verbatim control id, e.g. `'Headphone',0`
    pub control: String,
    /// Percentage rendered for amixer, e.g. `20%`
    pub value: String,
}

impl VolumeCommand {
    pub fn args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.card_id.to_string(),
            "sset".to_string(),
            self.control.clone(),
            self.value.clone(),
        ]
    }
}

/// Build the set command; the control id is passed through untouched.
pub fn build_volume_command(card_id: u32, control_name: &str, volume_percent: u8) -> VolumeCommand {
    VolumeCommand {
        card_id,
        control: control_name.to_string(),
        value: format!("{}%", volume_percent.min(100)),
    }
}

/// Splits an scontents dump into controls with a playback volume.
pub struct MixerParser {
    header: Regex,
    playback: Regex,
}

impl MixerParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            header: Regex::new(r"^Simple mixer control (.+?)\s*$")?,
            // "  Mono: Playback 0 [96%] [0.00dB] [on]" / "  Front Left: Playback 65536 [100%] [on]"
            playback: Regex::new(r"^\s*[^:]+:\s*Playback\s+-?\d+\s+\[(\d+)%\]")?,
        })
    }

    /// Capture-only controls have no playback percentage and are dropped.
    pub fn parse(&self, contents: &str) -> Vec<MixerControl> {
        let mut controls = Vec::new();
        let mut current: Option<(String, Option<u32>)> = None;

        for line in contents.lines() {
            if let Some(caps) = self.header.captures(line) {
                if let Some((name, Some(pct))) = current.take() {
                    controls.push(MixerControl::new(name, pct));
                }
                current = Some((caps[1].to_string(), None));
                continue;
            }

            // Only the first playback percentage of a block counts
            if let Some((_, pct)) = current.as_mut() {
                if pct.is_none() {
                    if let Some(caps) = self.playback.captures(line) {
                        *pct = caps[1].parse().ok();
                    }
                }
            }
        }

        if let Some((name, Some(pct))) = current {
            controls.push(MixerControl::new(name, pct));
        }

        controls
    }
}

pub struct AmixerAdapter {
    tool: Tool,
    parser: MixerParser,
}

impl AmixerAdapter {
    pub const NAME: &'static str = "amixer";
    pub const MIN_VERSION: ToolVersion = ToolVersion::new(1, 0, 0);

    pub async fn connect(program: &str, probe_timeout: Duration) -> Result<Self> {
        let tool = Tool::new(Self::NAME, program);
        tool.probe_version(probe_timeout, Self::MIN_VERSION).await?;
        Ok(Self {
            tool,
            parser: MixerParser::new()?,
        })
    }
}

#[async_trait]
impl Mixer for AmixerAdapter {
    async fn list_controls(&self, card_id: u32) -> Result<Vec<MixerControl>> {
        let output = self.tool.output(&["-c".to_string(), card_id.to_string()]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains(INVALID_CARD_MESSAGE) {
                warn!(card_id, "amixer does not know this card");
                return Ok(Vec::new());
            }
            return Err(self.tool.failed(&output));
        }

        let controls = self.parser.parse(&String::from_utf8_lossy(&output.stdout));
        debug!(card_id, ?controls, "read mixer controls");
        Ok(controls)
    }

    async fn apply(&self, command: &VolumeCommand) -> Result<()> {
        self.tool.run(&command.args()).await?;
        info!(
            card_id = command.card_id,
            control = %command.control,
            value = %command.value,
            "volume set"
        );
        Ok(())
    }
}
