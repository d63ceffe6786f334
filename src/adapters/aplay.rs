// Playback card listing via `aplay -l`

use super::{Tool, ToolVersion};
use crate::error::Result;
use crate::model::PlaybackCard;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// Anything that can enumerate playback cards.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<PlaybackCard>>;
}

/// Turns the `aplay -l` listing into cards.
pub struct DeviceListParser {
    card_line: Regex,
}

impl DeviceListParser {
    pub fn new() -> Result<Self> {
        // card 0: Headphones [bcm2835 Headphones], device 0: ...
        let card_line = Regex::new(r"(?m)^card (\d+): (\S+) \[([^\]]*)\], device ")?;
        Ok(Self { card_line })
    }

    /// Cards in listing order. Subdevice lines and anything unrecognised are
    /// skipped; a card with several devices is reported once.
    pub fn parse(&self, listing: &str) -> Vec<PlaybackCard> {
        let mut cards: Vec<PlaybackCard> = Vec::new();

        for caps in self.card_line.captures_iter(listing) {
            let Ok(card) = caps[1].parse::<u32>() else {
                continue;
            };
            if cards.iter().any(|c| c.card == card) {
                continue;
            }
            cards.push(PlaybackCard::new(card, format!("{} [{}]", &caps[2], &caps[3])));
        }

        cards
    }
}

pub struct AplayAdapter {
    tool: Tool,
    parser: DeviceListParser,
}

impl AplayAdapter {
    pub const NAME: &'static str = "aplay";
    pub const MIN_VERSION: ToolVersion = ToolVersion::new(1, 0, 0);

    /// Probe the binary's version before anything gets listed.
    pub async fn connect(program: &str, probe_timeout: Duration) -> Result<Self> {
        let tool = Tool::new(Self::NAME, program);
        tool.probe_version(probe_timeout, Self::MIN_VERSION).await?;
        Ok(Self {
            tool,
            parser: DeviceListParser::new()?,
        })
    }
}

#[async_trait]
impl DeviceSource for AplayAdapter {
    async fn list_devices(&self) -> Result<Vec<PlaybackCard>> {
        let listing = self.tool.run(&["-l".to_string()]).await?;
        let cards = self.parser.parse(&listing);
        debug!(count = cards.len(), "listed playback cards");
        Ok(cards)
    }
}
