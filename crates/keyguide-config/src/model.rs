//! Configuration data model

use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure
///
/// A parsed `Config` is an immutable snapshot. The daemon wraps it in an
/// `Arc` and swaps the whole snapshot on reload.
#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    pub display: DisplayConfig,
    pub mouse: MouseConfig,
    pub proximity: ProximityConfig,
    pub cheat_sheet: CheatSheetConfig,
    pub screen: ScreenConfig,
    pub shortcuts: Vec<Shortcut>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            display: DisplayConfig::default(),
            mouse: MouseConfig::default(),
            proximity: ProximityConfig::default(),
            cheat_sheet: CheatSheetConfig::default(),
            screen: ScreenConfig::default(),
            shortcuts: default_shortcuts(),
        }
    }
}

impl Config {
    /// Look up an enabled key shortcut whose combo matches `combo` exactly.
    pub fn find_shortcut(&self, combo: &str) -> Option<&Shortcut> {
        self.shortcuts
            .iter()
            .find(|s| s.enabled && s.kind == ShortcutKind::Key && s.combo == combo)
    }

    /// Description shown next to `combo`, if descriptions are turned on.
    pub fn shortcut_description(&self, combo: &str) -> Option<&str> {
        if !self.display.describe_shortcuts {
            return None;
        }
        self.find_shortcut(combo)
            .map(|s| s.description.as_str())
            .filter(|d| !d.is_empty())
    }
}

/// Global settings
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive usable with `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Key log behaviour and lifetime of displayed entries
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Master switch for the key/mouse log
    pub enabled: bool,
    /// How long an entry stays fully opaque
    pub display_time: Duration,
    /// Length of the linear fade after `display_time`
    pub fade_duration: Duration,
    /// Maximum number of entries on screen
    pub max_stack: usize,
    /// Window in which a repeated combo increments the existing entry
    pub combo_timeout: Duration,
    /// Show plain single-character keys (ordinary typing)
    pub show_single_keys: bool,
    /// Attach shortcut descriptions to matching combos
    pub describe_shortcuts: bool,
    pub position: StackPosition,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_time: Duration::from_millis(2000),
            fade_duration: Duration::from_millis(1000),
            max_stack: 1,
            combo_timeout: Duration::from_millis(1000),
            show_single_keys: true,
            describe_shortcuts: true,
            position: StackPosition::default(),
        }
    }
}

/// Screen placement of the entry stack.
///
/// `(x, y)` is the bottom-left corner; entries stack upwards from it with
/// the newest entry at the bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackPosition {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub row_height: f64,
    pub spacing: f64,
}

impl Default for StackPosition {
    fn default() -> Self {
        Self {
            x: 50.0,
            y: 800.0,
            width: 500.0,
            row_height: 60.0,
            spacing: 5.0,
        }
    }
}

impl StackPosition {
    /// Centre point of the row at `index_from_bottom` (0 = newest entry).
    pub fn anchor(&self, index_from_bottom: usize) -> (f64, f64) {
        let step = self.row_height + self.spacing;
        let cx = self.x + self.width / 2.0;
        let cy = self.y - self.row_height / 2.0 - step * index_from_bottom as f64;
        (cx, cy)
    }
}

/// Mouse gesture classification and logging
#[derive(Debug, Clone)]
pub struct MouseConfig {
    pub double_click_timeout: Duration,
    /// Middle-button travel (pixels) above which a click becomes a drag
    pub drag_threshold: f64,
    pub log: MouseLogToggles,
    /// Label substitutions, e.g. "Left Click" -> "LMB"
    pub aliases: HashMap<String, String>,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            double_click_timeout: Duration::from_millis(300),
            drag_threshold: 15.0,
            log: MouseLogToggles::default(),
            aliases: HashMap::new(),
        }
    }
}

impl MouseConfig {
    /// Apply the alias table to a gesture label; unknown labels pass through.
    pub fn alias<'a>(&'a self, label: &'a str) -> &'a str {
        self.aliases.get(label).map(String::as_str).unwrap_or(label)
    }
}

/// Per-gesture logging switches. Gestures made while a modifier is held
/// are always logged regardless of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseLogToggles {
    pub left_click: bool,
    pub double_click: bool,
    pub right_click: bool,
    pub middle_click: bool,
    pub middle_drag: bool,
    pub scroll: bool,
    pub other_buttons: bool,
}

impl Default for MouseLogToggles {
    fn default() -> Self {
        Self {
            left_click: false,
            double_click: true,
            right_click: true,
            middle_click: true,
            middle_drag: true,
            scroll: true,
            other_buttons: true,
        }
    }
}

/// Opacity reduction when the pointer approaches a displayed entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityConfig {
    pub enabled: bool,
    pub distance: f64,
    pub min_opacity: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            distance: 150.0,
            min_opacity: 0.1,
        }
    }
}

/// Hold-to-reveal reference sheet trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatSheetConfig {
    pub enabled: bool,
    /// Trigger token, compared case-insensitively
    pub key: String,
    pub hold: Duration,
}

impl Default for CheatSheetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: "Tab".to_string(),
            hold: Duration::from_millis(300),
        }
    }
}

impl CheatSheetConfig {
    pub fn is_trigger(&self, token: &str) -> bool {
        self.enabled && token.eq_ignore_ascii_case(&self.key)
    }
}

/// Bounds used to clamp the relative pointer position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortcutKind {
    Header,
    Key,
}

/// One row of the shortcut list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub kind: ShortcutKind,
    /// Combo text as produced by the combo builder, or header title
    pub combo: String,
    pub description: String,
    pub enabled: bool,
    pub show_in_log: bool,
    pub show_in_cheat: bool,
}

impl Shortcut {
    pub fn header(title: &str) -> Self {
        Self {
            kind: ShortcutKind::Header,
            combo: title.to_string(),
            description: String::new(),
            enabled: true,
            show_in_log: true,
            show_in_cheat: true,
        }
    }

    pub fn key(combo: &str, description: &str) -> Self {
        Self {
            kind: ShortcutKind::Key,
            combo: combo.to_string(),
            description: description.to_string(),
            enabled: true,
            show_in_log: true,
            show_in_cheat: true,
        }
    }
}

/// Shortcut list used when the config has no `shortcuts` block
pub fn default_shortcuts() -> Vec<Shortcut> {
    vec![
        Shortcut::header("Common"),
        Shortcut::key("Ctrl+C", "Copy"),
        Shortcut::key("Ctrl+V", "Paste"),
        Shortcut::key("Ctrl+Z", "Undo"),
        Shortcut::key("Ctrl+S", "Save"),
    ]
}
