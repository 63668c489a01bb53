//! Single-owner dispatcher
//!
//! [`Engine`] owns the pressed-key set, gesture classifier, trigger state
//! machine and display queue. Listener tasks never touch it; they send
//! [`RawEvent`]s to the task that owns the engine, which feeds them to
//! [`Engine::handle`] one at a time and carries out the returned
//! [`Signal`]s.

use std::sync::Arc;
use std::time::{Duration, Instant};

use keyguide_config::Config;

use crate::combo::{build_combo_text, held_modifiers, Modifier};
use crate::display::{DisplayQueue, ItemView};
use crate::gesture::{GestureClassifier, GestureLabel, HaloEvent, MouseButton};
use crate::normalizer::{normalize, KeyIdentity, PressedKeys, RawKey};
use crate::trigger::{TriggerMachine, TriggerSignal, TriggerSnapshot};

/// Input as delivered by a listener
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    KeyDown { id: KeyIdentity, key: RawKey },
    KeyUp { id: KeyIdentity, key: RawKey },
    MouseButton { button: MouseButton, pressed: bool, x: f64, y: f64 },
    MouseScroll { dx: f64, dy: f64 },
    /// Pointer position, used for proximity fading only
    PointerMoved { x: f64, y: f64 },
}

impl RawEvent {
    pub fn key_down(key: RawKey) -> Self {
        RawEvent::KeyDown {
            id: KeyIdentity::of(&key),
            key,
        }
    }

    pub fn key_up(key: RawKey) -> Self {
        RawEvent::KeyUp {
            id: KeyIdentity::of(&key),
            key,
        }
    }
}

/// Notifications for the reference-sheet presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheatSheetSignal {
    ShowOverlay(bool),
    ToggleWindow,
}

/// Hold timer requests for the owner loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    Start { generation: u64, after: Duration },
    Cancel,
}

/// Side effects of handling one event
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Halo(HaloEvent),
    CheatSheet(CheatSheetSignal),
    HoldTimer(TimerRequest),
}

impl From<TriggerSignal> for Signal {
    fn from(signal: TriggerSignal) -> Self {
        match signal {
            TriggerSignal::StartTimer { generation, after } => {
                Signal::HoldTimer(TimerRequest::Start { generation, after })
            }
            TriggerSignal::CancelTimer => Signal::HoldTimer(TimerRequest::Cancel),
            TriggerSignal::ShowOverlay(show) => {
                Signal::CheatSheet(CheatSheetSignal::ShowOverlay(show))
            }
            TriggerSignal::ToggleWindow => Signal::CheatSheet(CheatSheetSignal::ToggleWindow),
        }
    }
}

pub struct Engine {
    config: Arc<Config>,
    pressed: PressedKeys,
    gestures: GestureClassifier,
    trigger: TriggerMachine,
    queue: DisplayQueue,
}

impl Engine {
    pub fn new(config: Arc<Config>) -> Self {
        let queue = DisplayQueue::new(&config);
        Self {
            config,
            pressed: PressedKeys::new(),
            gestures: GestureClassifier::new(),
            trigger: TriggerMachine::new(),
            queue,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn trigger_state(&self) -> TriggerSnapshot {
        self.trigger.snapshot()
    }

    /// Swap in a new settings snapshot between two events.
    pub fn apply_config(&mut self, config: Arc<Config>) -> Vec<Signal> {
        let mut signals = Vec::new();
        let old = &self.config.cheat_sheet;
        let disabled = old.enabled && !config.cheat_sheet.enabled;
        let rebound = !old.key.eq_ignore_ascii_case(&config.cheat_sheet.key);
        if disabled || rebound {
            signals.extend(self.trigger.reset().into_iter().map(Signal::from));
        }
        self.queue.configure(&config);
        self.config = config;
        signals
    }

    pub fn handle(&mut self, event: RawEvent, now: Instant) -> Vec<Signal> {
        match event {
            RawEvent::KeyDown { id, key } => self.key_down(id, &key, now),
            RawEvent::KeyUp { id, key } => self.key_up(&id, &key),
            RawEvent::MouseButton {
                button,
                pressed,
                x,
                y,
            } => self.mouse_button(button, pressed, (x, y), now),
            RawEvent::MouseScroll { dx, dy } => self.mouse_scroll(dx, dy, now),
            RawEvent::PointerMoved { x, y } => {
                self.queue.set_pointer(x, y);
                Vec::new()
            }
        }
    }

    fn modifiers(&self) -> Vec<Modifier> {
        held_modifiers(&self.pressed.tokens())
    }

    fn key_down(&mut self, id: KeyIdentity, key: &RawKey, now: Instant) -> Vec<Signal> {
        let Some(token) = normalize(key) else {
            tracing::trace!("Dropping unmappable key {:?}", key);
            return Vec::new();
        };
        if !self.pressed.press(id, token.clone()) {
            return Vec::new();
        }

        if token.as_str() == "Esc" && self.trigger.overlay_active() {
            return self.trigger.on_escape().into_iter().map(Signal::from).collect();
        }

        let mut signals = Vec::new();
        if self.config.cheat_sheet.is_trigger(token.as_str()) {
            let hold = self.config.cheat_sheet.hold;
            signals.extend(self.trigger.on_trigger_press(hold).into_iter().map(Signal::from));
        }

        if self.config.display.enabled {
            self.log_held_combo(now);
        }
        signals
    }

    fn log_held_combo(&mut self, now: Instant) {
        let show_single = self.config.display.show_single_keys;
        let Some(combo) = build_combo_text(&self.pressed.tokens(), show_single) else {
            return;
        };

        let shortcut = self.config.find_shortcut(&combo.text);
        if shortcut.is_some_and(|s| !s.show_in_log) {
            tracing::debug!("{} hidden from the log", combo.text);
            return;
        }
        let description = self
            .config
            .shortcut_description(&combo.text)
            .map(str::to_string);

        tracing::debug!("Key combo: {}", combo.text);
        self.queue.add_key(&combo.text, description, false, now);
    }

    fn key_up(&mut self, id: &KeyIdentity, key: &RawKey) -> Vec<Signal> {
        let released = match self.pressed.release(id) {
            Some(token) => Some(token),
            None => normalize(key).and_then(|token| self.pressed.release_token(&token)),
        };

        match released {
            Some(token) if self.config.cheat_sheet.is_trigger(token.as_str()) => self
                .trigger
                .on_trigger_release()
                .into_iter()
                .map(Signal::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn mouse_button(
        &mut self,
        button: MouseButton,
        pressed: bool,
        pos: (f64, f64),
        now: Instant,
    ) -> Vec<Signal> {
        self.queue.set_pointer(pos.0, pos.1);
        let halo = Signal::Halo(HaloEvent::Button {
            button: button.clone(),
            pressed,
        });
        if !self.config.display.enabled {
            return vec![halo];
        }

        let modifiers = self.modifiers();
        let label = self
            .gestures
            .on_button(&button, pressed, pos, now, &modifiers, &self.config.mouse);
        if let Some(label) = label {
            self.log_gesture(label, now);
        }
        vec![halo]
    }

    fn mouse_scroll(&mut self, dx: f64, dy: f64, now: Instant) -> Vec<Signal> {
        let halo = Signal::Halo(HaloEvent::Scroll { dx, dy });
        if !self.config.display.enabled {
            return vec![halo];
        }

        let modifiers = self.modifiers();
        let label = self
            .gestures
            .on_scroll(dx, dy, now, &modifiers, &self.config.mouse);
        if let Some(label) = label {
            self.log_gesture(label, now);
        }
        vec![halo]
    }

    fn log_gesture(&mut self, label: GestureLabel, now: Instant) {
        let description = self
            .config
            .shortcut_description(&label.text)
            .map(str::to_string);
        tracing::debug!("Mouse gesture: {}", label.text);
        self.queue
            .add_key(&label.text, description, label.modifier_gesture, now);
    }

    /// The hold timer tagged `generation` expired.
    pub fn on_hold_elapsed(&mut self, generation: u64) -> Vec<Signal> {
        self.trigger
            .on_timer_elapsed(generation)
            .into_iter()
            .map(Signal::from)
            .collect()
    }

    /// Keep the entry of the currently held chord from fading.
    pub fn maintain_held(&mut self, now: Instant) {
        if self.pressed.is_empty() || !self.config.display.enabled {
            return;
        }
        if let Some(combo) =
            build_combo_text(&self.pressed.tokens(), self.config.display.show_single_keys)
        {
            self.queue.maintain_key(&combo.text, now);
        }
    }

    /// Periodic sweep of faded entries
    pub fn tick(&mut self, now: Instant) -> usize {
        self.queue.tick(now)
    }

    /// Visible entries with live opacity, oldest first
    pub fn frame(&self, now: Instant) -> Vec<ItemView> {
        self.queue.items(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::RawKey;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn engine() -> Engine {
        let mut config = Config::default();
        config.display.max_stack = 5;
        config.proximity.enabled = false;
        Engine::new(Arc::new(config))
    }

    fn ctrl() -> RawKey {
        RawKey::named("Key.ctrl_l", Some(0xA2))
    }

    fn tab() -> RawKey {
        RawKey::named("Key.tab", Some(0x09))
    }

    fn texts(e: &Engine, now: Instant) -> Vec<String> {
        e.frame(now).into_iter().map(|v| v.text).collect()
    }

    #[test]
    fn test_ctrl_c_chord_with_description() {
        let mut e = engine();
        let t0 = Instant::now();
        e.handle(RawEvent::key_down(ctrl()), t0);
        e.handle(RawEvent::key_down(RawKey::char('\u{3}', Some(67))), t0 + ms(50));

        let frame = e.frame(t0 + ms(60));
        assert_eq!(frame.len(), 1, "Ctrl entry merged into Ctrl+C");
        assert_eq!(frame[0].text, "Ctrl+C");
        assert_eq!(frame[0].description.as_deref(), Some("Copy"));
    }

    #[test]
    fn test_repeat_counts_while_ctrl_held() {
        let mut e = engine();
        let t0 = Instant::now();
        let c = RawKey::char('\u{3}', Some(67));
        e.handle(RawEvent::key_down(ctrl()), t0);
        e.handle(RawEvent::key_down(c.clone()), t0 + ms(10));
        e.handle(RawEvent::key_up(c.clone()), t0 + ms(80));
        e.handle(RawEvent::key_down(c), t0 + ms(200));

        assert_eq!(texts(&e, t0 + ms(200)), vec!["Ctrl+C x2"]);
    }

    #[test]
    fn test_autorepeat_is_ignored() {
        let mut e = engine();
        let t0 = Instant::now();
        let a = RawKey::char('a', Some(65));
        e.handle(RawEvent::key_down(a.clone()), t0);
        e.handle(RawEvent::key_down(a), t0 + ms(30));
        assert_eq!(texts(&e, t0 + ms(30)), vec!["A"]);
    }

    #[test]
    fn test_release_matched_by_identity() {
        let mut e = engine();
        let t0 = Instant::now();
        let shift = RawKey::named("Key.shift", Some(0xA0));
        e.handle(RawEvent::key_down(shift.clone()), t0);
        e.handle(RawEvent::key_down(RawKey::char('!', Some(49))), t0);
        e.handle(RawEvent::key_up(shift), t0);
        // Without shift the same physical key reports '1'
        e.handle(RawEvent::key_up(RawKey::char('1', Some(49))), t0);

        e.handle(RawEvent::key_down(RawKey::char('b', Some(66))), t0 + ms(10));
        assert_eq!(
            texts(&e, t0 + ms(10)),
            vec!["Shift", "!", "B"],
            "'!' must not still be held when B is pressed"
        );
    }

    #[test]
    fn test_hidden_shortcut_not_logged() {
        let mut config = Config::default();
        config.shortcuts[2].show_in_log = false; // Ctrl+V
        let mut e = Engine::new(Arc::new(config));
        let t0 = Instant::now();
        e.handle(RawEvent::key_down(ctrl()), t0);
        e.handle(RawEvent::key_down(RawKey::char('\u{16}', Some(86))), t0);

        assert_eq!(texts(&e, t0), vec!["Ctrl"]);
    }

    #[test]
    fn test_log_disabled_still_runs_trigger() {
        let mut config = Config::default();
        config.display.enabled = false;
        let mut e = Engine::new(Arc::new(config));
        let signals = e.handle(RawEvent::key_down(tab()), Instant::now());

        assert!(matches!(
            signals[..],
            [Signal::HoldTimer(TimerRequest::Start { .. })]
        ));
        assert!(e.frame(Instant::now()).is_empty());
    }

    #[test]
    fn test_tap_and_hold_through_engine() {
        let mut e = engine();
        let t0 = Instant::now();

        e.handle(RawEvent::key_down(tab()), t0);
        let signals = e.handle(RawEvent::key_up(tab()), t0 + ms(200));
        assert!(signals.contains(&Signal::CheatSheet(CheatSheetSignal::ToggleWindow)));

        let signals = e.handle(RawEvent::key_down(tab()), t0 + ms(500));
        let generation = match signals[..] {
            [Signal::HoldTimer(TimerRequest::Start { generation, .. })] => generation,
            _ => panic!("Expected timer start, got: {:?}", signals),
        };
        assert_eq!(
            e.on_hold_elapsed(generation),
            vec![Signal::CheatSheet(CheatSheetSignal::ShowOverlay(true))]
        );
        let signals = e.handle(RawEvent::key_up(tab()), t0 + ms(900));
        assert_eq!(
            signals,
            vec![Signal::CheatSheet(CheatSheetSignal::ShowOverlay(false))]
        );
    }

    #[test]
    fn test_escape_closes_overlay_without_logging() {
        let mut e = engine();
        let t0 = Instant::now();
        let signals = e.handle(RawEvent::key_down(tab()), t0);
        let generation = match signals[..] {
            [Signal::HoldTimer(TimerRequest::Start { generation, .. })] => generation,
            _ => panic!("Expected timer start, got: {:?}", signals),
        };
        e.on_hold_elapsed(generation);

        let esc = RawKey::named("Key.escape", Some(0x1B));
        let signals = e.handle(RawEvent::key_down(esc), t0 + ms(500));
        assert!(signals.contains(&Signal::CheatSheet(CheatSheetSignal::ShowOverlay(false))));
        assert_eq!(texts(&e, t0 + ms(500)), vec!["Tab"], "Esc is not logged");
        assert!(!e.trigger_state().overlay_active);
    }

    #[test]
    fn test_mouse_halo_always_emitted() {
        let mut config = Config::default();
        config.display.enabled = false;
        let mut e = Engine::new(Arc::new(config));
        let signals = e.handle(
            RawEvent::MouseButton {
                button: MouseButton::Right,
                pressed: true,
                x: 10.0,
                y: 10.0,
            },
            Instant::now(),
        );
        assert_eq!(
            signals,
            vec![Signal::Halo(HaloEvent::Button {
                button: MouseButton::Right,
                pressed: true
            })]
        );
        assert!(e.frame(Instant::now()).is_empty());
    }

    #[test]
    fn test_scroll_halo_not_debounced() {
        let mut e = engine();
        let t0 = Instant::now();
        let first = e.handle(RawEvent::MouseScroll { dx: 0.0, dy: 1.0 }, t0);
        let second = e.handle(RawEvent::MouseScroll { dx: 0.0, dy: 1.0 }, t0 + ms(5));
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(texts(&e, t0 + ms(5)), vec!["Scroll Up"]);
    }

    #[test]
    fn test_modifier_click() {
        let mut e = engine();
        let t0 = Instant::now();
        e.handle(RawEvent::key_down(ctrl()), t0);
        e.handle(
            RawEvent::MouseButton {
                button: MouseButton::Left,
                pressed: true,
                x: 0.0,
                y: 0.0,
            },
            t0 + ms(10),
        );
        let frame = e.frame(t0 + ms(10));
        assert_eq!(frame.last().map(|v| v.text.as_str()), Some("Ctrl+Left Click"));
        assert!(frame.last().is_some_and(|v| v.modifier_gesture));
    }

    #[test]
    fn test_maintain_held_keeps_chord_visible() {
        let mut e = engine();
        let t0 = Instant::now();
        e.handle(RawEvent::key_down(ctrl()), t0);
        for step in 1..=40 {
            e.maintain_held(t0 + ms(100 * step));
        }
        e.tick(t0 + ms(4000));
        assert_eq!(texts(&e, t0 + ms(4000)), vec!["Ctrl"]);
        assert_eq!(e.frame(t0 + ms(4000))[0].opacity, 1.0);
    }

    #[test]
    fn test_disabling_cheat_sheet_resets_trigger() {
        let mut e = engine();
        e.handle(RawEvent::key_down(tab()), Instant::now());

        let mut config = (**e.config()).clone();
        config.cheat_sheet.enabled = false;
        let signals = e.apply_config(Arc::new(config));
        assert_eq!(signals, vec![Signal::HoldTimer(TimerRequest::Cancel)]);
        assert_eq!(e.trigger_state(), TriggerSnapshot::default());
    }

    #[test]
    fn test_rebinding_trigger_key_resets_trigger() {
        let mut e = engine();
        let t0 = Instant::now();
        let signals = e.handle(RawEvent::key_down(tab()), t0);
        let generation = match signals[..] {
            [Signal::HoldTimer(TimerRequest::Start { generation, .. })] => generation,
            _ => panic!("Expected timer start, got: {:?}", signals),
        };

        let mut config = (**e.config()).clone();
        config.cheat_sheet.key = "F1".to_string();
        let signals = e.apply_config(Arc::new(config));
        assert_eq!(signals, vec![Signal::HoldTimer(TimerRequest::Cancel)]);

        assert!(e.on_hold_elapsed(generation).is_empty(), "stale timer ignored");
        assert!(e.handle(RawEvent::key_up(tab()), t0 + ms(400)).is_empty());
        assert_eq!(e.trigger_state(), TriggerSnapshot::default());
    }

    #[test]
    fn test_rebinding_hides_active_overlay() {
        let mut e = engine();
        let signals = e.handle(RawEvent::key_down(tab()), Instant::now());
        let generation = match signals[..] {
            [Signal::HoldTimer(TimerRequest::Start { generation, .. })] => generation,
            _ => panic!("Expected timer start, got: {:?}", signals),
        };
        e.on_hold_elapsed(generation);
        assert!(e.trigger_state().overlay_active);

        let mut config = (**e.config()).clone();
        config.cheat_sheet.key = "F1".to_string();
        assert_eq!(
            e.apply_config(Arc::new(config)),
            vec![Signal::CheatSheet(CheatSheetSignal::ShowOverlay(false))]
        );
        assert!(!e.trigger_state().overlay_active);
    }

    #[test]
    fn test_same_trigger_key_keeps_state() {
        let mut e = engine();
        e.handle(RawEvent::key_down(tab()), Instant::now());

        let mut config = (**e.config()).clone();
        config.cheat_sheet.key = "tab".to_string();
        config.display.max_stack = 2;
        assert!(e.apply_config(Arc::new(config)).is_empty());
    }
}
