// raspi-music-button - play music from the command line or on a button press
// Wires the tool adapters into the service, the service into the button trigger

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use raspi_music_button::{
    AmixerAdapter, AplayAdapter, ButtonBinding, ButtonError, Config, ControlSelector,
    Mpg321Adapter, PlaybackCard, Service,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "raspi-music-button", version)]
#[command(about = "Plays music on a Raspberry Pi, right away or when a button is pressed")]
struct Cli {
    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    dev: bool,

    /// Use this config file instead of the default one
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mixer control used for volume changes, e.g. PCM or "'PCM',0"
    /// (default: first control of the card)
    #[arg(long, global = true, value_name = "CONTROL")]
    control: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lists all available playback cards.
    ListCards,
    /// Plays the given song(s)
    #[command(subcommand)]
    Play(PlaySource),
    /// Plays the given song on pressed button
    Button(ButtonArgs),
}

#[derive(Subcommand)]
enum PlaySource {
    /// Plays the given song(s) on the selected playback device.
    Song {
        #[arg(value_name = "SONG_PATH", value_parser = existing_path)]
        songs: Vec<PathBuf>,
        #[command(flatten)]
        playback: PlaybackArgs,
    },
    /// Plays all mp3 files in the given folder on the selected playback device.
    Folder {
        #[arg(value_name = "SONG_FOLDER", value_parser = existing_path)]
        folder: PathBuf,
        #[command(flatten)]
        playback: PlaybackArgs,
    },
}

#[derive(Args)]
struct ButtonArgs {
    /// GPIO number of the button, see
    /// https://www.raspberrypi.com/documentation/computers/os.html#gpio-and-the-40-pin-header
    #[arg(short = 'b', long = "button", value_parser = clap::value_parser!(u8).range(2..=27))]
    gpio: u8,

    #[command(subcommand)]
    source: ButtonSource,
}

#[derive(Subcommand)]
enum ButtonSource {
    /// Plays the given song(s) on the selected playback device.
    Song {
        #[arg(value_name = "SONG_PATH", value_parser = existing_path)]
        songs: Vec<PathBuf>,
        #[command(flatten)]
        playback: PlaybackArgs,
        #[command(flatten)]
        trigger: TriggerArgs,
    },
    /// Plays all mp3 files in the given folder on the selected playback device.
    Folder {
        #[arg(value_name = "SONG_FOLDER", value_parser = existing_path)]
        folder: PathBuf,
        #[command(flatten)]
        playback: PlaybackArgs,
        #[command(flatten)]
        trigger: TriggerArgs,
    },
}

#[derive(Args)]
struct PlaybackArgs {
    /// Card to be used for playback.
    #[arg(short = 'c', long = "card")]
    card: Option<u32>,

    /// Setting the volume of the playback.
    #[arg(short = 'v', long = "volume", value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// Shuffles all given songs before playing.
    #[arg(short = 'z', long = "shuffle")]
    shuffle: bool,
}

#[derive(Args)]
struct TriggerArgs {
    /// Starts an infinite loop. Can only be aborted by CTRL-C.
    #[arg(short = 'l', long = "loop")]
    loop_playback: bool,

    /// On press only plays a single song of the given songs.
    #[arg(short = 's', long = "single-song")]
    single_song: bool,
}

fn existing_path(value: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("path '{}' does not exist", value))
    }
}

fn init_logging(dev: bool, log_dir: &Path) -> Result<WorkerGuard> {
    let (writer, guard) = if dev {
        tracing_appender::non_blocking(io::stderr())
    } else {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "raspi-music-button.log");
        tracing_appender::non_blocking(file_appender)
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,raspi_music_button=debug"));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(dev)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

/// Probe the three tools and hand them to the service.
async fn bootstrap(config: &Config, control: Option<String>) -> Result<Service> {
    let timeout = config.tools.version_timeout();

    let aplay = AplayAdapter::connect(&config.tools.aplay, timeout).await?;
    let amixer = AmixerAdapter::connect(&config.tools.amixer, timeout).await?;
    let mpg321 = Mpg321Adapter::connect(&config.tools.mpg321, timeout).await?;

    let control = ControlSelector::from_option(control.or_else(|| config.mixer.control.clone()));
    Ok(Service::new(Box::new(aplay), Box::new(amixer), Box::new(mpg321)).with_control(control))
}

fn card_listing(cards: &[PlaybackCard], indent: usize) -> String {
    cards
        .iter()
        .map(|card| format!("{}[{}]: {}", " ".repeat(indent), card.card, card.name))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn read_line() -> Result<String> {
    // Off the runtime threads so Ctrl-C still gets through while we wait
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    Ok(line)
}

/// Use the requested card if it is listed, otherwise ask until a listed one is picked.
async fn resolve_card(service: &Service, requested: Option<u32>) -> Result<u32> {
    let cards = service.get_list_of_devices().await?;
    if cards.is_empty() {
        bail!("No playback cards were found");
    }

    let mut card = requested;
    loop {
        match card {
            Some(id) if Service::is_known_card(&cards, id) => return Ok(id),
            Some(id) => warn!(card = id, "requested card is not available"),
            None => {}
        }

        print!(
            "Select one of the following playback cards:\n{}\nYour choice: ",
            card_listing(&cards, 2)
        );
        io::stdout().flush()?;

        let line = read_line().await?;
        if line.is_empty() {
            bail!("No playback card was selected");
        }
        card = line.trim().parse().ok();
    }
}

/// Card and volume come first for every play/button command.
async fn prepare(service: &Service, playback: &PlaybackArgs) -> Result<u32> {
    let card = resolve_card(service, playback.card).await?;
    if let Some(volume) = playback.volume {
        service.set_volume(card, volume).await?;
    }
    Ok(card)
}

fn require_songs(songs: &[PathBuf]) -> Result<()> {
    if songs.is_empty() {
        return Err(anyhow::Error::new(ButtonError::EmptySongList)
            .context("No song path was provided. Please see --help for more details."));
    }
    Ok(())
}

#[cfg(feature = "gpio")]
async fn arm_button(service: &Service, binding: ButtonBinding, config: &Config) -> Result<()> {
    use raspi_music_button::button::GpioButton;
    use raspi_music_button::ButtonTrigger;

    let edges = GpioButton::bind(binding.gpio, config.button.pull, config.button.debounce())?;
    let mut trigger = ButtonTrigger::new(service, binding, edges);
    trigger.run().await?;
    Ok(())
}

#[cfg(not(feature = "gpio"))]
async fn arm_button(_service: &Service, _binding: ButtonBinding, _config: &Config) -> Result<()> {
    bail!("This build has no GPIO support, rebuild with the `gpio` feature")
}

async fn run(command: Command, service: &Service, config: &Config) -> Result<()> {
    match command {
        Command::ListCards => {
            let cards = service.get_list_of_devices().await?;
            println!("The following playback cards were found:");
            println!("{}", card_listing(&cards, 0));
        }
        Command::Play(PlaySource::Song { songs, playback }) => {
            require_songs(&songs)?;
            let card = prepare(service, &playback).await?;
            service.play_songs(card, &songs, playback.shuffle).await?;
        }
        Command::Play(PlaySource::Folder { folder, playback }) => {
            let card = prepare(service, &playback).await?;
            service.play_folder(card, &folder, playback.shuffle).await?;
        }
        Command::Button(ButtonArgs { gpio, source }) => {
            let binding = match source {
                ButtonSource::Song { songs, playback, trigger } => {
                    require_songs(&songs)?;
                    let card = prepare(service, &playback).await?;
                    service.trigger_songs(
                        gpio,
                        card,
                        songs,
                        trigger.loop_playback,
                        playback.shuffle,
                        trigger.single_song,
                    )?
                }
                ButtonSource::Folder { folder, playback, trigger } => {
                    let card = prepare(service, &playback).await?;
                    service.trigger_folder(
                        gpio,
                        card,
                        &folder,
                        trigger.loop_playback,
                        playback.shuffle,
                        trigger.single_song,
                    )?
                }
            };

            println!("Waiting for a press on {} (CTRL-C to stop)", binding.gpio);
            arm_button(service, binding, config).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let term = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let guard = init_logging(cli.dev, &config.log_dir)?;
    info!("raspi-music-button starting up");

    let service = bootstrap(&config, cli.control).await?;

    // Losing the race drops the command future: the player child is killed
    // and a claimed pin released before we get past this point
    let outcome = tokio::select! {
        result = run(cli.command, &service, &config) => Some(result),
        _ = shutdown_signal() => None,
    };

    match outcome {
        Some(result) => result,
        None => {
            warn!("Interrupted, playback stopped");
            drop(guard);
            std::process::exit(130);
        }
    }
}
