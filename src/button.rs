// Button mode: wait for a press on a GPIO pin, play, go back to waiting
// One press is handled to completion before the next one is looked at

use crate::error::Result;
use crate::model::ButtonBinding;
use crate::service::Service;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "gpio")]
use crate::model::GpioPin;
#[cfg(feature = "gpio")]
use std::time::Duration;
#[cfg(feature = "gpio")]
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Armed,
    Playing,
}

/// How the button is wired. Pull-up means the button shorts the pin to
/// ground, so a press is a falling edge; pull-down is the reverse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    #[default]
    Up,
    Down,
}

/// Source of debounced button presses.
#[async_trait]
pub trait EdgeSource: Send {
    /// Wait for the next press; `false` once no more presses can arrive.
    async fn next_press(&mut self) -> bool;

    /// Forget presses that came in while a song was playing.
    fn discard_pending(&mut self);
}

pub struct ButtonTrigger<'a, E> {
    service: &'a Service,
    binding: ButtonBinding,
    edges: E,
    state: TriggerState,
}

impl<'a, E: EdgeSource> ButtonTrigger<'a, E> {
    pub fn new(service: &'a Service, binding: ButtonBinding, edges: E) -> Self {
        Self {
            service,
            binding,
            edges,
            state: TriggerState::Idle,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Arm the button and serve presses until the request is done (no loop),
    /// playback fails, or the edge source goes away.
    pub async fn run(&mut self) -> Result<()> {
        self.state = TriggerState::Armed;
        info!(gpio = %self.binding.gpio, "button armed, waiting for a press");

        while self.edges.next_press().await {
            self.state = TriggerState::Playing;
            let request = &self.binding.request;
            debug!(gpio = %self.binding.gpio, "press detected");

            // The single-song pick was made at registration, only full sets get reshuffled
            let reshuffle = request.shuffle && !request.single_song;
            let played = self
                .service
                .play_songs(request.card_id, &request.songs, reshuffle)
                .await;
            self.edges.discard_pending();

            if let Err(e) = played {
                self.state = TriggerState::Idle;
                return Err(e);
            }

            if !request.loop_playback {
                break;
            }

            self.state = TriggerState::Armed;
            info!(gpio = %self.binding.gpio, "button re-armed");
        }

        self.state = TriggerState::Idle;
        Ok(())
    }
}

/// A real pin on the Pi header. The pin is released when this is dropped.
#[cfg(feature = "gpio")]
pub struct GpioButton {
    pin: rppal::gpio::InputPin,
    number: GpioPin,
    presses: mpsc::UnboundedReceiver<()>,
}

#[cfg(feature = "gpio")]
impl GpioButton {
    pub fn bind(number: GpioPin, pull: Pull, debounce: Duration) -> Result<Self> {
        use rppal::gpio::{Gpio, Trigger};

        let pin = Gpio::new()?.get(number.number())?;
        let (mut pin, trigger) = match pull {
            Pull::Up => (pin.into_input_pullup(), Trigger::FallingEdge),
            Pull::Down => (pin.into_input_pulldown(), Trigger::RisingEdge),
        };

        let (tx, presses) = mpsc::unbounded_channel();
        pin.set_async_interrupt(trigger, Some(debounce), move |_event| {
            let _ = tx.send(());
        })?;

        info!(gpio = %number, ?pull, ?debounce, "pin claimed");
        Ok(Self { pin, number, presses })
    }
}

#[cfg(feature = "gpio")]
#[async_trait]
impl EdgeSource for GpioButton {
    async fn next_press(&mut self) -> bool {
        self.presses.recv().await.is_some()
    }

    fn discard_pending(&mut self) {
        let mut dropped = 0;
        while self.presses.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(gpio = %self.number, dropped, "ignored presses during playback");
        }
    }
}

#[cfg(feature = "gpio")]
impl Drop for GpioButton {
    fn drop(&mut self) {
        let _ = self.pin.clear_async_interrupt();
        info!(gpio = %self.number, "pin released");
    }
}
