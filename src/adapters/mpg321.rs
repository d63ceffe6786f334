// Playback through mpg321 on a chosen ALSA card
// One mpg321 process per play request, the whole song list in one go

use super::{Tool, ToolVersion};
use crate::error::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Plays a song list as handed over; shuffling is done by the caller.
#[async_trait]
pub trait Player: Send + Sync {
    /// Play `songs` in the given order and return once playback has finished.
    async fn play(&self, card_id: u32, songs: &[PathBuf]) -> Result<()>;
}

pub struct Mpg321Adapter {
    tool: Tool,
}

impl Mpg321Adapter {
    pub const NAME: &'static str = "mpg321";
    pub const MIN_VERSION: ToolVersion = ToolVersion::new(0, 2, 0);

    pub async fn connect(program: &str, probe_timeout: Duration) -> Result<Self> {
        let tool = Tool::new(Self::NAME, program);
        tool.probe_version(probe_timeout, Self::MIN_VERSION).await?;
        Ok(Self { tool })
    }

    /// `-q -o alsa -a hw:<card>,0 <songs...>`; paths go through as given.
    pub fn play_args(card_id: u32, songs: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-q".into(),
            "-o".into(),
            "alsa".into(),
            "-a".into(),
            format!("hw:{},0", card_id).into(),
        ];
        args.extend(songs.iter().map(|song| song.as_os_str().to_os_string()));
        args
    }
}

#[async_trait]
impl Player for Mpg321Adapter {
    async fn play(&self, card_id: u32, songs: &[PathBuf]) -> Result<()> {
        info!(card_id, songs = songs.len(), "starting playback");
        self.tool.status(&Self::play_args(card_id, songs)).await?;
        info!(card_id, "playback finished");
        Ok(())
    }
}
