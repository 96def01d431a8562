//! Audio Player (micplay-ap) - Main entry point
//!
//! Plays files into an output device, one after the other, and takes
//! transport commands on stdin, one per line (`help` lists them).

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use micplay_ap::audio::{AudioHost, CpalHost, DeviceBinding};
use micplay_ap::playback::{PlaybackEvent, PlaybackObserver, TransportCommand, TransportReply};
use micplay_ap::{PlaybackEngine, Transport};
use micplay_common::config::{load_config, resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use micplay_common::{VoiceModeConfig, VoiceQuality};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HELP: &str = "\
commands: load <path> | play [loop] | pause | resume | toggle | stop
          seek <sec> | fwd | back | vol <0..1> | up | down | mute | loop
          device <index> | devices | voice on|off | quality low|medium|high
          next | prev | track <index> | tracks | status | quit";

/// Command-line arguments for micplay-ap
#[derive(Parser, Debug)]
#[command(name = "micplay-ap")]
#[command(about = "Stream an audio file into an output device, optionally voice-conditioned")]
#[command(version)]
struct Args {
    /// Audio files to play in order, starting with the first
    files: Vec<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Output device index (see --list-devices)
    #[arg(short, long)]
    device: Option<usize>,

    /// Condition audio for voice chat
    #[arg(long)]
    voice_mode: bool,

    /// Voice quality tier: low, medium, high
    #[arg(short, long)]
    quality: Option<VoiceQuality>,

    /// Initial volume (0.0-1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Loop the current track
    #[arg(short, long = "loop")]
    looping: bool,

    /// Print output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Exit when the last track ends
    #[arg(long)]
    exit_on_end: bool,

    /// Print status replies as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = load_config(config_path.as_deref()).context("Failed to load settings")?;

    init_tracing(&config)?;

    info!(
        "Starting micplay-ap {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("MICPLAY_GIT_HASH"),
        env!("MICPLAY_BUILD_TIMESTAMP"),
        env!("MICPLAY_BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Settings: {}", path.display()),
        None => info!("Settings: built-in defaults"),
    }

    let host: Arc<dyn AudioHost> = Arc::new(CpalHost::new());

    if args.list_devices {
        for device in host.devices().iter().filter(|d| d.max_output_channels > 0) {
            println!(
                "[{}] {} ({}ch, {}Hz)",
                device.index, device.name, device.max_output_channels, device.default_sample_rate
            );
        }
        return Ok(());
    }

    let player = &config.player;
    let voice = VoiceModeConfig::new(
        args.voice_mode || player.voice_mode,
        args.quality.unwrap_or(player.voice_quality),
    );
    let remembered = args.device.or(player.device);

    let binding = DeviceBinding::new(host, remembered, voice.device_sample_rate())
        .context("No usable audio output device")?;

    let engine = Arc::new(
        PlaybackEngine::new(binding, voice).context("Failed to start playback engine")?,
    );
    engine.set_volume(args.volume.unwrap_or(player.volume));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PlaybackEvent>();
    let observer: Arc<dyn PlaybackObserver> = Arc::new(event_tx);
    engine.set_observer(observer);

    let transport = Transport::with_tracks(Arc::clone(&engine), args.files.clone());
    engine.set_looping(args.looping || player.looping);

    if let Some(first) = args.files.first() {
        let startup = {
            let transport = transport.clone();
            tokio::task::spawn_blocking(move || transport.play_track(0)).await?
        };
        startup.with_context(|| format!("Failed to play {}", first.display()))?;
    }

    if std::io::stdin().is_terminal() {
        println!("{}", HELP);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    // A write failure is followed by an end notification; do not advance then
    let mut device_failed = false;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        device_failed = false;
                        if !handle_line(&transport, line, args.json).await {
                            break;
                        }
                    }
                    None => stdin_open = false,
                }
            }
            Some(event) = event_rx.recv() => {
                match event {
                    PlaybackEvent::Ended { session } => {
                        info!("Playback ended (session {})", session);
                        println!("ended");
                        let advanced = !std::mem::take(&mut device_failed)
                            && advance(&transport).await;
                        if !advanced && args.exit_on_end {
                            break;
                        }
                    }
                    PlaybackEvent::DeviceError { message } => {
                        error!("Device error: {}", message);
                        println!("device error: {}", message);
                        device_failed = true;
                    }
                }
            }
            _ = &mut shutdown => break,
        }

        if !stdin_open && !engine.is_playing() {
            break;
        }
    }

    let engine_for_stop = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || engine_for_stop.stop()).await?;
    info!("Shutdown complete");
    Ok(())
}

/// Start the following track after a natural end; returns whether one started.
async fn advance(transport: &Transport) -> bool {
    let transport = transport.clone();
    match tokio::task::spawn_blocking(move || transport.advance_after_end()).await {
        Ok(Ok(Some(path))) => {
            println!("playing {}", path.display());
            true
        }
        Ok(Ok(None)) => false,
        Ok(Err(e)) => {
            println!("error: {}", e);
            false
        }
        Err(e) => {
            warn!("Advance task failed: {}", e);
            false
        }
    }
}

/// Run one stdin line; returns false on `quit`.
async fn handle_line(transport: &Transport, line: String, json: bool) -> bool {
    let line = line.trim().to_string();
    match line.as_str() {
        "" => return true,
        "quit" | "exit" => return false,
        "help" => {
            println!("{}", HELP);
            return true;
        }
        _ => {}
    }

    let command = match line.parse::<TransportCommand>() {
        Ok(command) => command,
        Err(e) => {
            println!("{}", e);
            return true;
        }
    };

    // Engine calls block on thread joins and decoding
    let transport = transport.clone();
    match tokio::task::spawn_blocking(move || transport.execute(command)).await {
        Ok(Ok(TransportReply::Status(snapshot))) if json => match serde_json::to_string(&snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize status: {}", e),
        },
        Ok(Ok(reply)) => println!("{}", reply),
        Ok(Err(e)) => println!("error: {}", e),
        Err(e) => warn!("Command task failed: {}", e),
    }
    true
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("micplay_ap={0},micplay_common={0}", config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
                .init();
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
