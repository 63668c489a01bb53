//! keyguide daemon
//!
//! Observes keyboards and pointers, turns raw input into readable combo and
//! gesture entries, and hands the fading log, reference-sheet signals and
//! click halos to a presenter.

mod combo;
mod control;
mod device;
mod display;
mod engine;
mod gesture;
mod keymap;
mod listener;
mod normalizer;
mod presenter;
mod timer;
mod trigger;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use keyguide_config::{CheatSheet, Config};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use control::PidFile;
use engine::{Engine, Signal, TimerRequest};
use presenter::{OutputMode, Presenter};
use timer::HoldTimer;

const FRAME_INTERVAL: Duration = Duration::from_millis(30);
const SWEEP_INTERVAL: Duration = Duration::from_millis(100);
const MAINTAIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "keyguided")]
#[command(about = "Keystroke and mouse visualizer daemon")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = keyguide_config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Where visible entries and overlay signals are sent
    #[arg(short, long, value_enum, default_value_t = OutputMode::Log)]
    output: OutputMode,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Log filter that follows the config unless `RUST_LOG` is set
struct LogFilter {
    handle: FilterHandle,
    from_env: bool,
}

impl LogFilter {
    fn init() -> Self {
        let env = EnvFilter::try_from_default_env().ok();
        let from_env = env.is_some();
        let (layer, handle) = reload::Layer::new(env.unwrap_or_else(|| EnvFilter::new("info")));

        tracing_subscriber::registry()
            .with(layer)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();

        Self { handle, from_env }
    }

    fn apply(&self, config: &Config) {
        if self.from_env {
            return;
        }
        let level = config.global.log_level.as_filter();
        if let Err(e) = self.handle.modify(|filter| *filter = EnvFilter::new(level)) {
            tracing::warn!("Failed to update log level: {}", e);
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::warn!(
            "Configuration file {} not found, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    keyguide_config::parse_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Re-read the config on top of the running snapshot. `None` keeps the
/// current settings.
fn reload_config(path: &Path, current: &Config) -> Option<Config> {
    if !path.exists() {
        tracing::warn!(
            "Configuration file {} disappeared, keeping current settings",
            path.display()
        );
        return None;
    }
    match keyguide_config::parse_config_with_base(path, current) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!("Reload failed, keeping current settings: {}", e);
            None
        }
    }
}

/// Carries out engine side effects
struct Dispatcher {
    presenter: Box<dyn Presenter + Send>,
    hold_timer: HoldTimer,
    sheet: CheatSheet,
}

impl Dispatcher {
    fn dispatch(&mut self, signals: Vec<Signal>) {
        for signal in signals {
            let result = match signal {
                Signal::HoldTimer(TimerRequest::Start { generation, after }) => {
                    self.hold_timer.arm(generation, after);
                    Ok(())
                }
                Signal::HoldTimer(TimerRequest::Cancel) => {
                    self.hold_timer.cancel();
                    Ok(())
                }
                Signal::CheatSheet(signal) => self.presenter.cheat_sheet(signal, &self.sheet),
                Signal::Halo(event) => self.presenter.halo(&event),
            };
            if let Err(e) = result {
                tracing::warn!("Presenter error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_filter = LogFilter::init();

    let config_path = keyguide_config::expand_path(&args.config);
    tracing::info!("Loading configuration from {}", config_path.display());
    let config = load_config(&config_path)?;
    log_filter.apply(&config);

    tracing::info!(
        "Loaded configuration with {} shortcut(s)",
        config.shortcuts.len()
    );

    let _pid_file = PidFile::create()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let listeners = listener::spawn_all(config.screen, &tx)?;
    if listeners.is_empty() {
        tracing::warn!("No input devices could be opened; is the user in the 'input' group?");
    }

    let mut dispatcher = Dispatcher {
        presenter: presenter::for_mode(args.output),
        hold_timer: HoldTimer::new(),
        sheet: CheatSheet::from_shortcuts(&config.shortcuts),
    };
    let mut engine = Engine::new(Arc::new(config));

    let mut frame = tokio::time::interval(FRAME_INTERVAL);
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    let mut maintain = tokio::time::interval(MAINTAIN_INTERVAL);
    for interval in [&mut frame, &mut sweep, &mut maintain] {
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    let mut sighup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tracing::info!("keyguide daemon running ({} listener(s))", listeners.len());

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                let signals = engine.handle(event, Instant::now());
                dispatcher.dispatch(signals);
            }
            generation = dispatcher.hold_timer.fired() => {
                let signals = engine.on_hold_elapsed(generation);
                dispatcher.dispatch(signals);
            }
            _ = maintain.tick() => {
                engine.maintain_held(Instant::now());
            }
            _ = sweep.tick() => {
                let removed = engine.tick(Instant::now());
                if removed > 0 {
                    tracing::trace!("Swept {} faded entries", removed);
                }
            }
            _ = frame.tick() => {
                let items = engine.frame(Instant::now());
                if let Err(e) = dispatcher.presenter.frame(&items) {
                    tracing::warn!("Presenter error: {}", e);
                }
            }
            _ = sighup.recv() => {
                tracing::info!("Reloading configuration from {}", config_path.display());
                if let Some(config) = reload_config(&config_path, engine.config()) {
                    log_filter.apply(&config);
                    dispatcher.sheet = CheatSheet::from_shortcuts(&config.shortcuts);
                    let signals = engine.apply_config(Arc::new(config));
                    dispatcher.dispatch(signals);
                    tracing::info!("Configuration reloaded");
                    tracing::debug!("Trigger state after reload: {:?}", engine.trigger_state());
                }
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C");
                break;
            }
        }
    }

    tracing::info!("Shutting down...");
    for handle in listeners {
        handle.abort();
    }

    Ok(())
}
