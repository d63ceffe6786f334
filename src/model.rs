// Plain data passed between the adapters, the service and the button trigger
// Everything is rebuilt per invocation - nothing here is persisted

use crate::error::{ButtonError, Result};
use std::fmt;
use std::path::PathBuf;

/// A sound card as listed by `aplay -l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackCard {
    pub card: u32,
    pub name: String,
}

impl PlaybackCard {
    pub fn new(card: u32, name: impl Into<String>) -> Self {
        Self {
            card,
            name: name.into(),
        }
    }
}

/// A simple mixer control and its current playback volume.
///
/// `name` is the identifier exactly as amixer prints it, quotes and index
/// included (`'PCM',0`), so it can be handed back to `amixer sset` untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerControl {
    pub name: String,
    pub volume_percent: u8,
}

impl MixerControl {
    pub fn new(name: impl Into<String>, volume_percent: u32) -> Self {
        Self {
            name: name.into(),
            volume_percent: volume_percent.min(100) as u8,
        }
    }

    /// Control name without quotes and index, e.g. `PCM` for `'PCM',0`.
    pub fn bare_name(&self) -> &str {
        let name = self.name.rsplit_once(',').map_or(self.name.as_str(), |(n, _)| n);
        name.trim_matches('\'')
    }
}

/// Which mixer control receives volume changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ControlSelector {
    /// First control amixer reports for the card
    #[default]
    First,
    /// A control matched by its verbatim id (`'PCM',0`) or its bare name (`PCM`)
    Named(String),
}

impl ControlSelector {
    pub fn from_option(name: Option<String>) -> Self {
        match name {
            Some(name) if !name.trim().is_empty() => ControlSelector::Named(name),
            _ => ControlSelector::First,
        }
    }

    pub fn select<'a>(&self, controls: &'a [MixerControl]) -> Option<&'a MixerControl> {
        match self {
            ControlSelector::First => controls.first(),
            ControlSelector::Named(wanted) => controls
                .iter()
                .find(|c| c.name == *wanted || c.bare_name() == wanted),
        }
    }
}

/// BCM GPIO number of the button, restricted to the header pins 2-27.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioPin(u8);

impl GpioPin {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 27;

    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for GpioPin {
    type Error = ButtonError;

    fn try_from(pin: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&pin) {
            Ok(GpioPin(pin))
        } else {
            Err(ButtonError::InvalidGpioPin(pin))
        }
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// One play request, alive only for the invocation that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub card_id: u32,
    pub songs: Vec<PathBuf>,
    pub shuffle: bool,
    pub loop_playback: bool,
    pub single_song: bool,
}

/// A pin bound to a request for as long as the button mode runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonBinding {
    pub gpio: GpioPin,
    pub request: PlaybackRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpio_pin_range() {
        assert_eq!(GpioPin::try_from(2).unwrap().number(), 2);
        assert_eq!(GpioPin::try_from(27).unwrap().number(), 27);
        assert!(matches!(GpioPin::try_from(1), Err(ButtonError::InvalidGpioPin(1))));
        assert!(matches!(GpioPin::try_from(28), Err(ButtonError::InvalidGpioPin(28))));
    }

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(MixerControl::new("'PCM',0", 250).volume_percent, 100);
        assert_eq!(MixerControl::new("'PCM',0", 42).volume_percent, 42);
    }

    #[test]
    fn test_control_selection() {
        let controls = vec![
            MixerControl::new("'PCM',0", 18),
            MixerControl::new("'Speaker',0", 50),
        ];

        assert_eq!(ControlSelector::First.select(&controls).unwrap().name, "'PCM',0");

        let by_id = ControlSelector::Named("'Speaker',0".to_string());
        assert_eq!(by_id.select(&controls).unwrap().name, "'Speaker',0");

        let by_name = ControlSelector::Named("Speaker".to_string());
        assert_eq!(by_name.select(&controls).unwrap().volume_percent, 50);

        let missing = ControlSelector::Named("Mic".to_string());
        assert!(missing.select(&controls).is_none());
        assert!(ControlSelector::First.select(&[]).is_none());
    }

    #[test]
    fn test_blank_control_name_means_first() {
        assert_eq!(ControlSelector::from_option(Some("  ".into())), ControlSelector::First);
        assert_eq!(ControlSelector::from_option(None), ControlSelector::First);
    }
}
