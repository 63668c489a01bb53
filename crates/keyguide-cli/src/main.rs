//! keyguide CLI
//!
//! Configuration checks, device listing and daemon control for keyguide.

use std::path::Path;

use clap::{Parser, Subcommand};
use keyguide_config::{CheatSheet, Config, ShortcutKind};
use miette::IntoDiagnostic;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

#[derive(Parser, Debug)]
#[command(name = "keyguide")]
#[command(about = "Keystroke and mouse visualizer")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = keyguide_config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// List keyboards and pointers the daemon would observe
    Devices,

    /// Print the shortcut reference sheet
    Cheatsheet,

    /// Ask the running daemon to reload its configuration
    Reload,
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = keyguide_config::expand_path(&cli.config);

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Devices => cmd_devices(),
        Commands::Cheatsheet => cmd_cheatsheet(&config_path),
        Commands::Reload => cmd_reload(),
    }
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = keyguide_config::parse_config(config_path)?;

    println!("Configuration is valid!");
    println!(
        "  Key log: {} (max {} entr{}, {} ms + {} ms fade)",
        if config.display.enabled { "on" } else { "off" },
        config.display.max_stack,
        if config.display.max_stack == 1 { "y" } else { "ies" },
        config.display.display_time.as_millis(),
        config.display.fade_duration.as_millis()
    );
    println!(
        "  Mouse: double click {} ms, drag threshold {} px, {} alias(es)",
        config.mouse.double_click_timeout.as_millis(),
        config.mouse.drag_threshold,
        config.mouse.aliases.len()
    );
    if config.cheat_sheet.enabled {
        println!(
            "  Reference sheet: hold {} for {} ms",
            config.cheat_sheet.key,
            config.cheat_sheet.hold.as_millis()
        );
    } else {
        println!("  Reference sheet: off");
    }
    let keys = config
        .shortcuts
        .iter()
        .filter(|s| s.kind == ShortcutKind::Key)
        .count();
    println!("  Shortcuts: {}", keys);

    Ok(())
}

fn cmd_devices() -> miette::Result<()> {
    println!("Available input devices:\n");

    let mut paths: Vec<_> = std::fs::read_dir("/dev/input")
        .into_diagnostic()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("event"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut found = 0;
    for path in paths {
        let Ok(device) = evdev::Device::open(&path) else {
            tracing::debug!("Could not open {}", path.display());
            continue;
        };

        let device_type = match (is_keyboard(&device), is_pointer(&device)) {
            (true, true) => "keyboard, pointer",
            (true, false) => "keyboard",
            (false, true) => "pointer",
            (false, false) => continue,
        };

        let id = device.input_id();
        println!("  {} [{}]", device.name().unwrap_or("Unknown"), device_type);
        println!("    Path: {}", path.display());
        println!("    ID: {:04x}:{:04x}", id.vendor(), id.product());
        println!();
        found += 1;
    }

    if found == 0 {
        println!("  (none readable; is the user in the 'input' group?)");
    }

    Ok(())
}

// Same classification as keyguide-daemon/src/device.rs; keep them in step.
fn is_keyboard(device: &evdev::Device) -> bool {
    device
        .supported_keys()
        .map(|keys| keys.contains(evdev::Key::KEY_A))
        .unwrap_or(false)
}

fn is_pointer(device: &evdev::Device) -> bool {
    let has_left = device
        .supported_keys()
        .map(|keys| keys.contains(evdev::Key::BTN_LEFT))
        .unwrap_or(false);
    let has_motion = device
        .supported_relative_axes()
        .map(|axes| axes.contains(evdev::RelativeAxisType::REL_X))
        .unwrap_or(false);
    has_left && has_motion
}

fn cmd_cheatsheet(config_path: &Path) -> miette::Result<()> {
    let config = if config_path.exists() {
        keyguide_config::parse_config(config_path)?
    } else {
        Config::default()
    };

    let sheet = CheatSheet::from_shortcuts(&config.shortcuts);
    if sheet.is_empty() {
        println!("No shortcuts to show.");
    } else {
        print!("{}", sheet.render_text());
    }

    Ok(())
}

fn cmd_reload() -> miette::Result<()> {
    let pid_path = keyguide_config::pid_file_path();
    let content = std::fs::read_to_string(&pid_path)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("Is keyguided running? ({})", pid_path.display())))?;

    let pid: i32 = content
        .trim()
        .parse()
        .map_err(|_| miette::miette!("Malformed pid file {}", pid_path.display()))?;

    kill(Pid::from_raw(pid), Signal::SIGHUP)
        .map_err(|e| miette::miette!("Failed to signal keyguided (pid {}): {}", pid, e))?;

    println!("Reload requested (pid {})", pid);
    Ok(())
}
