//! evdev listener tasks
//!
//! One task per input device reads events without grabbing the device and
//! forwards already-converted [`RawEvent`]s over an unbounded channel, so a
//! listener never waits on the engine. Read errors are logged and the task
//! keeps going; it only ends when the device disappears or the engine side
//! of the channel is gone.

use std::path::PathBuf;
use std::time::Duration;

use evdev::{Device, InputEvent, InputEventKind, Key, RelativeAxisType, Synchronization};
use keyguide_config::ScreenConfig;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::device::{self, DeviceInfo};
use crate::engine::RawEvent;
use crate::gesture::MouseButton;
use crate::keymap::KeyboardState;

/// Pause after a failed read before trying again
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create event stream for '{name}': {source}")]
    Stream {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Absolute pointer position rebuilt from relative motion
#[derive(Debug, Clone, Copy)]
struct PointerState {
    x: f64,
    y: f64,
    moved: bool,
    bounds: ScreenConfig,
}

impl PointerState {
    fn new(bounds: ScreenConfig) -> Self {
        Self {
            x: f64::from(bounds.width) / 2.0,
            y: f64::from(bounds.height) / 2.0,
            moved: false,
            bounds,
        }
    }

    fn shift(&mut self, dx: f64, dy: f64) {
        let max_x = f64::from(self.bounds.width.saturating_sub(1).max(0));
        let max_y = f64::from(self.bounds.height.saturating_sub(1).max(0));
        self.x = (self.x + dx).clamp(0.0, max_x);
        self.y = (self.y + dy).clamp(0.0, max_y);
        self.moved = true;
    }
}

fn mouse_button(key: Key) -> Option<MouseButton> {
    let button = match key {
        Key::BTN_LEFT => MouseButton::Left,
        Key::BTN_RIGHT => MouseButton::Right,
        Key::BTN_MIDDLE => MouseButton::Middle,
        Key::BTN_SIDE | Key::BTN_BACK => MouseButton::Other("x1".to_string()),
        Key::BTN_EXTRA | Key::BTN_FORWARD => MouseButton::Other("x2".to_string()),
        Key::BTN_TASK => MouseButton::Other("task".to_string()),
        _ => return None,
    };
    Some(button)
}

/// Converts one device's evdev events into [`RawEvent`]s
#[derive(Debug)]
pub struct EventTranslator {
    keyboard: KeyboardState,
    pointer: PointerState,
}

impl EventTranslator {
    pub fn new(screen: ScreenConfig) -> Self {
        Self {
            keyboard: KeyboardState::new(),
            pointer: PointerState::new(screen),
        }
    }

    pub fn translate(&mut self, event: &InputEvent) -> Option<RawEvent> {
        match event.kind() {
            InputEventKind::Key(key) => {
                if let Some(button) = mouse_button(key) {
                    // value 2 is autorepeat, never sent for buttons in practice
                    if event.value() == 2 {
                        return None;
                    }
                    return Some(RawEvent::MouseButton {
                        button,
                        pressed: event.value() == 1,
                        x: self.pointer.x,
                        y: self.pointer.y,
                    });
                }
                self.key(key, event.value())
            }
            InputEventKind::RelAxis(axis) => {
                let value = f64::from(event.value());
                match axis {
                    RelativeAxisType::REL_X => self.pointer.shift(value, 0.0),
                    RelativeAxisType::REL_Y => self.pointer.shift(0.0, value),
                    RelativeAxisType::REL_WHEEL => {
                        return Some(RawEvent::MouseScroll { dx: 0.0, dy: value })
                    }
                    RelativeAxisType::REL_HWHEEL => {
                        return Some(RawEvent::MouseScroll { dx: value, dy: 0.0 })
                    }
                    _ => {}
                }
                None
            }
            InputEventKind::Synchronization(Synchronization::SYN_REPORT) if self.pointer.moved => {
                self.pointer.moved = false;
                Some(RawEvent::PointerMoved {
                    x: self.pointer.x,
                    y: self.pointer.y,
                })
            }
            _ => None,
        }
    }

    fn key(&mut self, key: Key, value: i32) -> Option<RawEvent> {
        match value {
            1 => {
                self.keyboard.update(key, true);
                self.keyboard.to_raw(key).map(RawEvent::key_down)
            }
            0 => {
                let raw = self.keyboard.to_raw(key);
                self.keyboard.update(key, false);
                raw.map(RawEvent::key_up)
            }
            _ => None,
        }
    }
}

/// Start a listener task for an enumerated device.
pub fn spawn_listener(
    info: &DeviceInfo,
    screen: ScreenConfig,
    tx: UnboundedSender<RawEvent>,
) -> Result<JoinHandle<()>, ListenerError> {
    let device = Device::open(&info.path).map_err(|source| ListenerError::Open {
        path: info.path.clone(),
        source,
    })?;
    let name = info.name.clone();
    let mut stream = device
        .into_event_stream()
        .map_err(|source| ListenerError::Stream {
            name: name.clone(),
            source,
        })?;

    tracing::info!(
        "Listening on '{}' at {} (keyboard: {}, pointer: {})",
        name,
        info.path.display(),
        info.capabilities.keyboard,
        info.capabilities.pointer
    );

    let path = info.path.clone();
    let handle = tokio::spawn(async move {
        let mut translator = EventTranslator::new(screen);
        loop {
            match stream.next_event().await {
                Ok(event) => {
                    if let Some(raw) = translator.translate(&event) {
                        if tx.send(raw).is_err() {
                            tracing::debug!("Engine gone, stopping listener for '{}'", name);
                            return;
                        }
                    }
                }
                Err(e) if e.raw_os_error() == Some(nix::libc::ENODEV) => {
                    tracing::info!("Device '{}' at {} disconnected", name, path.display());
                    return;
                }
                Err(e) => {
                    tracing::warn!("Read error on '{}': {}", name, e);
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                }
            }
        }
    });

    Ok(handle)
}

/// Start listeners for every keyboard and pointer. Devices that fail to
/// open are skipped with a warning.
pub fn spawn_all(
    screen: ScreenConfig,
    tx: &UnboundedSender<RawEvent>,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();

    for info in device::enumerate_devices()? {
        match spawn_listener(&info, screen, tx.clone()) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                tracing::warn!("Skipping '{}': {}", info.name, e);
            }
        }
    }

    Ok(handles)
}
