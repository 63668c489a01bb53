//! Mouse gesture classification
//!
//! Turns button and wheel events into log labels: left vs double click,
//! middle click vs drag, debounced scroll. Every label gets the alias
//! table applied and the held-modifier prefix prepended.

use std::fmt;
use std::time::{Duration, Instant};

use keyguide_config::MouseConfig;
use serde::Serialize;

use crate::combo::{modifier_prefix, Modifier};

/// Scroll events closer together than this are logged once
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Any other button, by name (`x1`, `x2`, ...)
    Other(String),
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => f.write_str("left"),
            MouseButton::Right => f.write_str("right"),
            MouseButton::Middle => f.write_str("middle"),
            MouseButton::Other(name) => f.write_str(name),
        }
    }
}

/// Immediate pointer feedback, emitted whether or not the gesture is logged
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaloEvent {
    Button { button: MouseButton, pressed: bool },
    Scroll { dx: f64, dy: f64 },
}

/// A classified gesture ready for the display queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureLabel {
    pub text: String,
    /// Made while a modifier key was held
    pub modifier_gesture: bool,
}

#[derive(Debug, Default)]
pub struct GestureClassifier {
    last_left_press: Option<Instant>,
    middle_press_at: Option<(f64, f64)>,
    last_scroll: Option<Instant>,
}

impl GestureClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn label(raw: &str, modifiers: &[Modifier], mouse: &MouseConfig) -> GestureLabel {
        GestureLabel {
            text: format!("{}{}", modifier_prefix(modifiers), mouse.alias(raw)),
            modifier_gesture: !modifiers.is_empty(),
        }
    }

    /// Classify a button transition at pointer position `pos`.
    pub fn on_button(
        &mut self,
        button: &MouseButton,
        pressed: bool,
        pos: (f64, f64),
        now: Instant,
        modifiers: &[Modifier],
        mouse: &MouseConfig,
    ) -> Option<GestureLabel> {
        let chord = !modifiers.is_empty();
        let log = &mouse.log;

        match button {
            MouseButton::Middle if pressed => {
                self.middle_press_at = Some(pos);
                None
            }
            MouseButton::Middle => {
                let (px, py) = self.middle_press_at.take()?;
                let distance = (pos.0 - px).hypot(pos.1 - py);
                let (raw, enabled) = if distance > mouse.drag_threshold {
                    ("Middle Drag", log.middle_drag)
                } else {
                    ("Middle Click", log.middle_click)
                };
                (enabled || chord).then(|| Self::label(raw, modifiers, mouse))
            }
            _ if !pressed => None,
            MouseButton::Left => {
                let is_double = self
                    .last_left_press
                    .map(|prev| now.saturating_duration_since(prev) < mouse.double_click_timeout)
                    .unwrap_or(false);
                self.last_left_press = Some(now);

                if is_double && log.double_click {
                    Some(Self::label("Double Click", modifiers, mouse))
                } else if log.left_click || chord {
                    Some(Self::label("Left Click", modifiers, mouse))
                } else {
                    None
                }
            }
            MouseButton::Right => {
                (log.right_click || chord).then(|| Self::label("Right Click", modifiers, mouse))
            }
            MouseButton::Other(name) => (log.other_buttons || chord)
                .then(|| Self::label(&format!("Button {}", name), modifiers, mouse)),
        }
    }

    /// Classify a wheel event. The label follows the vertical delta, so a
    /// horizontal-only step reads as "Scroll Down".
    pub fn on_scroll(
        &mut self,
        dx: f64,
        dy: f64,
        now: Instant,
        modifiers: &[Modifier],
        mouse: &MouseConfig,
    ) -> Option<GestureLabel> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        if let Some(prev) = self.last_scroll {
            if now.saturating_duration_since(prev) < SCROLL_DEBOUNCE {
                return None;
            }
        }
        self.last_scroll = Some(now);

        if !(mouse.log.scroll || !modifiers.is_empty()) {
            return None;
        }
        let raw = if dy > 0.0 { "Scroll Up" } else { "Scroll Down" };
        Some(Self::label(raw, modifiers, mouse))
    }
}
