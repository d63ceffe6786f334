// In-memory stand-ins for aplay, amixer and mpg321, fed with output captured on a Pi 4

use super::amixer::{MixerParser, VolumeCommand};
use super::aplay::{DeviceListParser, DeviceSource};
use super::{Mixer, Player};
use crate::error::{ButtonError, Result};
use crate::model::{MixerControl, PlaybackCard};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Drop an executable `sh` script called `name` into `dir` and return its path,
/// so the real adapters can be driven against a tool that misbehaves on cue.
pub fn shell_tool(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

pub const APLAY_DEVICES: &str = "\
**** List of PLAYBACK Hardware Devices ****
card 0: Headphones [bcm2835 Headphones], device 0: bcm2835 Headphones [bcm2835 Headphones]
  Subdevices: 8/8
  Subdevice #0: subdevice #0
  Subdevice #1: subdevice #1
  Subdevice #2: subdevice #2
  Subdevice #3: subdevice #3
  Subdevice #4: subdevice #4
  Subdevice #5: subdevice #5
  Subdevice #6: subdevice #6
  Subdevice #7: subdevice #7
card 1: USB [Jabra SPEAK 510 USB], device 0: USB Audio [USB Audio]
  Subdevices: 1/1
  Subdevice #0: subdevice #0
card 2: vc4hdmi [vc4-hdmi], device 0: MAI PCM i2s-hifi-0 [MAI PCM i2s-hifi-0]
  Subdevices: 1/1
  Subdevice #0: subdevice #0
";

pub const AMIXER_USAGE: &str = "\
Invalid card number.
Usage: amixer <options> [command]

Available options:
  -h,--help       this help
  -c,--card N     select the card

Available commands:
  scontrols       show all mixer simple controls
  scontents       show contents of all mixer simple controls (default command)
  sset sID P      set contents for one mixer simple control
";

/// Raw scontents for cards 0-2, `None` for a card amixer rejects.
pub fn amixer_contents(card_id: u32) -> Option<String> {
    let contents = match card_id {
        0 => "\
Simple mixer control 'Headphone',0
  Capabilities: pvolume pvolume-joined pswitch pswitch-joined
  Playback channels: Mono
  Limits: Playback -10239 - 400
  Mono: Playback 0 [96%] [0.00dB] [on]
",
        1 => "\
Simple mixer control 'PCM',0
  Capabilities: pvolume pvolume-joined pswitch pswitch-joined
  Playback channels: Mono
  Limits: Playback 0 - 11
  Mono: Playback 2 [18%] [-28.00dB] [on]
Simple mixer control 'Mic',0
  Capabilities: cvolume cvolume-joined cswitch cswitch-joined
  Capture channels: Mono
  Limits: Capture 0 - 7
  Mono: Capture 5 [71%] [3.00dB] [on]
",
        2 => "",
        _ => return None,
    };
    Some(contents.to_string())
}

pub struct FakeAplay {
    parser: DeviceListParser,
}

impl FakeAplay {
    pub fn new() -> Self {
        Self {
            parser: DeviceListParser::new().unwrap(),
        }
    }
}

#[async_trait]
impl DeviceSource for FakeAplay {
    async fn list_devices(&self) -> Result<Vec<PlaybackCard>> {
        Ok(self.parser.parse(APLAY_DEVICES))
    }
}

/// Mixer that remembers what was set, so a later read reflects it.
#[derive(Clone)]
pub struct FakeAmixer {
    parser: Arc<MixerParser>,
    volumes: Arc<Mutex<HashMap<(u32, String), u8>>>,
    pub commands: Arc<Mutex<Vec<VolumeCommand>>>,
}

impl FakeAmixer {
    pub fn new() -> Self {
        Self {
            parser: Arc::new(MixerParser::new().unwrap()),
            volumes: Arc::default(),
            commands: Arc::default(),
        }
    }

    pub fn commands(&self) -> Vec<VolumeCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mixer for FakeAmixer {
    async fn list_controls(&self, card_id: u32) -> Result<Vec<MixerControl>> {
        let contents = amixer_contents(card_id).unwrap_or_else(|| AMIXER_USAGE.to_string());
        let volumes = self.volumes.lock().unwrap();

        Ok(self
            .parser
            .parse(&contents)
            .into_iter()
            .map(|control| match volumes.get(&(card_id, control.name.clone())) {
                Some(pct) => MixerControl::new(control.name, u32::from(*pct)),
                None => control,
            })
            .collect())
    }

    async fn apply(&self, command: &VolumeCommand) -> Result<()> {
        let pct = command.value.trim_end_matches('%').parse().unwrap();
        self.volumes
            .lock()
            .unwrap()
            .insert((command.card_id, command.control.clone()), pct);
        self.commands.lock().unwrap().push(command.clone());
        Ok(())
    }
}

/// Records every play call instead of making noise.
#[derive(Clone, Default)]
pub struct RecordingPlayer {
    pub calls: Arc<Mutex<Vec<(u32, Vec<PathBuf>)>>>,
    pub fail: bool,
}

impl RecordingPlayer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(u32, Vec<PathBuf>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Player for RecordingPlayer {
    async fn play(&self, card_id: u32, songs: &[PathBuf]) -> Result<()> {
        self.calls.lock().unwrap().push((card_id, songs.to_vec()));
        if self.fail {
            return Err(ButtonError::ToolUnavailable {
                tool: "mpg321".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(())
    }
}
