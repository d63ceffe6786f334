// The service sits between the CLI/button and the audio tools
// Nothing is cached: every call goes back to aplay/amixer/mpg321

use crate::adapters::amixer::build_volume_command;
use crate::adapters::{DeviceSource, Mixer, Player};
use crate::error::{ButtonError, Result};
use crate::model::{
    ButtonBinding, ControlSelector, GpioPin, MixerControl, PlaybackCard, PlaybackRequest,
};
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Only mp3 is picked up from folders (case-sensitive on purpose: mpg321 plays mp3).
pub const FOLDER_EXTENSION: &str = "mp3";

pub struct Service {
    devices: Box<dyn DeviceSource>,
    mixer: Box<dyn Mixer>,
    player: Box<dyn Player>,
    control: ControlSelector,
}

impl Service {
    pub fn new(
        devices: Box<dyn DeviceSource>,
        mixer: Box<dyn Mixer>,
        player: Box<dyn Player>,
    ) -> Self {
        Self {
            devices,
            mixer,
            player,
            control: ControlSelector::First,
        }
    }

    /// Pick which mixer control `set_volume` targets.
    pub fn with_control(mut self, control: ControlSelector) -> Self {
        self.control = control;
        self
    }

    pub async fn get_list_of_devices(&self) -> Result<Vec<PlaybackCard>> {
        self.devices.list_devices().await
    }

    /// Is `card_id` one of the cards in this enumeration?
    pub fn is_known_card(cards: &[PlaybackCard], card_id: u32) -> bool {
        cards.iter().any(|c| c.card == card_id)
    }

    pub async fn list_controls(&self, card_id: u32) -> Result<Vec<MixerControl>> {
        self.mixer.list_controls(card_id).await
    }

    /// Set the playback volume of the selected control. The card is not
    /// checked against the device list here, callers do that.
    pub async fn set_volume(&self, card_id: u32, volume_prct: u8) -> Result<()> {
        let controls = self.mixer.list_controls(card_id).await?;
        if controls.is_empty() {
            return Err(ButtonError::InvalidCard(card_id));
        }

        let control = self.control.select(&controls).ok_or_else(|| match &self.control {
            ControlSelector::Named(name) => ButtonError::UnknownControl {
                card: card_id,
                control: name.clone(),
            },
            ControlSelector::First => ButtonError::InvalidCard(card_id),
        })?;

        debug!(
            card_id,
            control = %control.name,
            from = control.volume_percent,
            to = volume_prct,
            "changing volume"
        );
        let command = build_volume_command(card_id, &control.name, volume_prct);
        self.mixer.apply(&command).await
    }

    pub async fn play_songs(&self, card_id: u32, songs: &[PathBuf], shuffle: bool) -> Result<()> {
        if songs.is_empty() {
            return Err(ButtonError::EmptySongList);
        }

        let songs = arrange(songs, shuffle);
        info!(card_id, count = songs.len(), shuffle, "playing songs");
        self.player.play(card_id, &songs).await
    }

    pub async fn play_folder(&self, card_id: u32, folder: &Path, shuffle: bool) -> Result<()> {
        let songs = folder_songs(folder)?;
        self.play_songs(card_id, &songs, shuffle).await
    }

    /// Bind `songs` to a button. Nothing is played until the button is pressed.
    pub fn trigger_songs(
        &self,
        gpio: u8,
        card_id: u32,
        songs: Vec<PathBuf>,
        loop_playback: bool,
        shuffle: bool,
        single_song: bool,
    ) -> Result<ButtonBinding> {
        let gpio = GpioPin::try_from(gpio)?;
        if songs.is_empty() {
            return Err(ButtonError::EmptySongList);
        }

        // Single-song mode settles on its one file now, not per press
        let songs = if single_song {
            arrange(&songs, shuffle).into_iter().take(1).collect()
        } else {
            songs
        };

        info!(
            %gpio,
            card_id,
            count = songs.len(),
            loop_playback,
            shuffle,
            single_song,
            "button registered"
        );
        Ok(ButtonBinding {
            gpio,
            request: PlaybackRequest {
                card_id,
                songs,
                shuffle,
                loop_playback,
                single_song,
            },
        })
    }

    pub fn trigger_folder(
        &self,
        gpio: u8,
        card_id: u32,
        folder: &Path,
        loop_playback: bool,
        shuffle: bool,
        single_song: bool,
    ) -> Result<ButtonBinding> {
        let songs = folder_songs(folder)?;
        self.trigger_songs(gpio, card_id, songs, loop_playback, shuffle, single_song)
    }
}

/// Copy of `songs`, shuffled when asked to.
pub fn arrange(songs: &[PathBuf], shuffle: bool) -> Vec<PathBuf> {
    let mut songs = songs.to_vec();
    if shuffle {
        songs.shuffle(&mut rand::thread_rng());
    }
    songs
}

/// The mp3 files directly inside `folder`, in directory order.
/// A folder that cannot be read at all is an `Io` error, a bad child is skipped.
pub fn folder_songs(folder: &Path) -> Result<Vec<PathBuf>> {
    if !std::fs::metadata(folder)?.is_dir() {
        return Err(ButtonError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", folder.display()),
        )));
    }

    let mut songs = Vec::new();

    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(ButtonError::Io(e.into())),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", folder.display(), e);
                continue;
            }
        };

        let is_song = entry.path().extension() == Some(OsStr::new(FOLDER_EXTENSION));
        if entry.file_type().is_file() && is_song {
            songs.push(entry.into_path());
        }
    }

    if songs.is_empty() {
        return Err(ButtonError::EmptyFolder(folder.to_path_buf()));
    }

    debug!("Found {} songs in {}", songs.len(), folder.display());
    Ok(songs)
}
