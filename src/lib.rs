// raspi-music-button library - everything except the command line surface
// Adapters talk to aplay/amixer/mpg321, the service sequences them, the
// button trigger drives the service from a GPIO pin

pub mod adapters; // text contracts of the external audio tools
pub mod button;   // GPIO press -> playback state machine
pub mod config;   // settings file
pub mod error;    // error taxonomy
pub mod model;    // cards, controls, requests
pub mod service;  // volume + playback sequencing

// Export the stuff the binary actually uses
pub use adapters::{AmixerAdapter, AplayAdapter, Mpg321Adapter};
pub use button::{ButtonTrigger, EdgeSource, Pull, TriggerState};
pub use config::Config;
pub use error::{ButtonError, Result};
pub use model::{
    ButtonBinding, ControlSelector, GpioPin, MixerControl, PlaybackCard, PlaybackRequest,
};
pub use service::Service;
