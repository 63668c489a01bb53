//! Display queue: merge, repeat counting, fade and proximity decay
//!
//! The queue owns every on-screen entry. It never schedules anything
//! itself; callers pass the current [`Instant`] into each operation and
//! read opacities as a pure function of elapsed time and pointer distance.

use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use keyguide_config::{Config, ProximityConfig, StackPosition};
use serde::Serialize;

/// Entries at or below this opacity are removed by [`DisplayQueue::tick`]
pub const SWEEP_EPSILON: f64 = 0.01;

/// Fade timing captured when an entry is created or refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lifetime {
    display: Duration,
    fade: Duration,
}

impl Lifetime {
    /// Opaque for `display`, then linear down to exactly 0 at `display + fade`
    fn opacity(&self, elapsed: Duration) -> f64 {
        if elapsed <= self.display {
            return 1.0;
        }
        let end = self.display + self.fade;
        if elapsed >= end {
            return 0.0;
        }
        let into_fade = (elapsed - self.display).as_secs_f64();
        (1.0 - into_fade / self.fade.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// Linear falloff from `min_opacity` at the anchor to 1.0 at `distance`
pub fn proximity_factor(config: &ProximityConfig, anchor: (f64, f64), pointer: (f64, f64)) -> f64 {
    if !config.enabled {
        return 1.0;
    }
    let dist = (pointer.0 - anchor.0).hypot(pointer.1 - anchor.1);
    if dist >= config.distance {
        return 1.0;
    }
    let min = config.min_opacity;
    (min + (1.0 - min) * dist / config.distance).clamp(min, 1.0)
}

#[derive(Debug, Clone)]
pub struct DisplayItem {
    pub raw_text: String,
    pub description: Option<String>,
    pub repeat_count: u32,
    pub modifier_gesture: bool,
    pub created_at: Instant,
    pub last_refreshed_at: Instant,
    lifetime: Lifetime,
}

impl DisplayItem {
    /// Text as shown, with the repeat suffix when pressed more than once
    pub fn display_text(&self) -> String {
        if self.repeat_count > 1 {
            format!("{} x{}", self.raw_text, self.repeat_count)
        } else {
            self.raw_text.clone()
        }
    }

    fn parts(&self) -> BTreeSet<&str> {
        self.raw_text.split('+').collect()
    }

    fn time_opacity(&self, now: Instant) -> f64 {
        self.lifetime
            .opacity(now.saturating_duration_since(self.last_refreshed_at))
    }

    fn refresh(&mut self, now: Instant, lifetime: Lifetime) {
        self.last_refreshed_at = now;
        self.lifetime = lifetime;
    }
}

/// Per-frame view of one entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub text: String,
    pub description: Option<String>,
    pub repeat_count: u32,
    pub modifier_gesture: bool,
    pub opacity: f64,
}

#[derive(Debug, Clone)]
struct QueueSettings {
    lifetime: Lifetime,
    max_stack: usize,
    combo_timeout: Duration,
    proximity: ProximityConfig,
    position: StackPosition,
    scroll_labels: Vec<String>,
}

impl QueueSettings {
    fn from_config(config: &Config) -> Self {
        let display = &config.display;
        Self {
            lifetime: Lifetime {
                display: display.display_time,
                fade: display.fade_duration,
            },
            max_stack: display.max_stack.max(1),
            combo_timeout: display.combo_timeout,
            proximity: config.proximity,
            position: display.position,
            scroll_labels: ["Scroll Up", "Scroll Down"]
                .iter()
                .map(|l| config.mouse.alias(l).to_string())
                .collect(),
        }
    }

    fn is_scroll(&self, text: &str) -> bool {
        text.contains("Scroll") || self.scroll_labels.iter().any(|l| text.ends_with(l.as_str()))
    }
}

/// Ordered entries, oldest first
#[derive(Debug)]
pub struct DisplayQueue {
    items: VecDeque<DisplayItem>,
    settings: QueueSettings,
    pointer: Option<(f64, f64)>,
}

impl DisplayQueue {
    pub fn new(config: &Config) -> Self {
        Self {
            items: VecDeque::new(),
            settings: QueueSettings::from_config(config),
            pointer: None,
        }
    }

    /// Adopt a new settings snapshot. Existing entries keep their fade
    /// timing and a smaller `max-stack` is enforced on the next insert.
    pub fn configure(&mut self, config: &Config) {
        self.settings = QueueSettings::from_config(config);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = &DisplayItem> {
        self.items.iter()
    }

    pub fn set_pointer(&mut self, x: f64, y: f64) {
        self.pointer = Some((x, y));
    }

    fn opacity_at(&self, index: usize, now: Instant) -> f64 {
        let item = &self.items[index];
        let time = item.time_opacity(now);
        let proximity = match self.pointer {
            Some(pointer) => {
                let from_bottom = self.items.len() - 1 - index;
                let anchor = self.settings.position.anchor(from_bottom);
                proximity_factor(&self.settings.proximity, anchor, pointer)
            }
            None => 1.0,
        };
        time * proximity
    }

    /// Push a combo or gesture label.
    pub fn add_key(
        &mut self,
        text: &str,
        description: Option<String>,
        modifier_gesture: bool,
        now: Instant,
    ) {
        let last = self.items.len().checked_sub(1);

        // A growing chord replaces its predecessor
        if let Some(last) = last {
            let incoming: BTreeSet<&str> = text.split('+').collect();
            let previous = self.items[last].parts();
            let grows = previous.len() < incoming.len() && previous.is_subset(&incoming);
            if grows && self.opacity_at(last, now) > 0.0 {
                tracing::trace!("{} supersedes {}", text, self.items[last].raw_text);
                self.items.pop_back();
            }
        }

        if let Some(last) = self.items.len().checked_sub(1) {
            let visible = self.opacity_at(last, now) > 0.0;
            let lifetime = self.settings.lifetime;
            let is_scroll = self.settings.is_scroll(text);
            let combo_timeout = self.settings.combo_timeout;
            let item = &mut self.items[last];
            if item.raw_text == text
                && visible
                && now.saturating_duration_since(item.last_refreshed_at) < combo_timeout
            {
                if !is_scroll {
                    item.repeat_count += 1;
                }
                item.refresh(now, lifetime);
                return;
            }
        }

        self.items.push_back(DisplayItem {
            raw_text: text.to_string(),
            description,
            repeat_count: 1,
            modifier_gesture,
            created_at: now,
            last_refreshed_at: now,
            lifetime: self.settings.lifetime,
        });
        while self.items.len() > self.settings.max_stack {
            if let Some(evicted) = self.items.pop_front() {
                tracing::trace!(
                    "Evicted {} after {:?}",
                    evicted.raw_text,
                    now.saturating_duration_since(evicted.created_at)
                );
            }
        }
    }

    /// Keep the newest visible entry for `text` alive without counting a
    /// repeat. Returns whether an entry was found.
    pub fn maintain_key(&mut self, text: &str, now: Instant) -> bool {
        let lifetime = self.settings.lifetime;
        let found = (0..self.items.len())
            .rev()
            .find(|&i| self.items[i].raw_text == text && self.opacity_at(i, now) > 0.0);
        match found {
            Some(i) => {
                self.items[i].refresh(now, lifetime);
                true
            }
            None => false,
        }
    }

    /// Remove fully faded entries. Returns how many were removed.
    pub fn tick(&mut self, now: Instant) -> usize {
        let keep: Vec<bool> = (0..self.items.len())
            .map(|i| self.opacity_at(i, now) > SWEEP_EPSILON)
            .collect();
        let before = self.items.len();
        let mut flags = keep.into_iter();
        self.items.retain(|_| flags.next().unwrap_or(true));
        before - self.items.len()
    }

    /// Entries with their live opacity, oldest first
    pub fn items(&self, now: Instant) -> Vec<ItemView> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| ItemView {
                text: item.display_text(),
                description: item.description.clone(),
                repeat_count: item.repeat_count,
                modifier_gesture: item.modifier_gesture,
                opacity: self.opacity_at(i, now),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn config(max_stack: usize) -> Config {
        let mut config = Config::default();
        config.display.max_stack = max_stack;
        config.display.display_time = ms(2000);
        config.display.fade_duration = ms(1000);
        config.display.combo_timeout = ms(1000);
        config.proximity.enabled = false;
        config
    }

    fn texts(q: &DisplayQueue, now: Instant) -> Vec<String> {
        q.items(now).into_iter().map(|v| v.text).collect()
    }

    #[test]
    fn test_superset_merge() {
        let mut q = DisplayQueue::new(&config(5));
        let t0 = Instant::now();
        q.add_key("Ctrl", None, false, t0);
        q.add_key("Ctrl+C", None, false, t0 + ms(50));
        assert_eq!(texts(&q, t0 + ms(60)), vec!["Ctrl+C"]);
    }

    #[test]
    fn test_subset_does_not_merge() {
        let mut q = DisplayQueue::new(&config(5));
        let t0 = Instant::now();
        q.add_key("Ctrl+C", None, false, t0);
        q.add_key("Ctrl", None, false, t0 + ms(50));
        assert_eq!(texts(&q, t0 + ms(60)), vec!["Ctrl+C", "Ctrl"]);
    }

    #[test]
    fn test_repeat_increments() {
        let mut q = DisplayQueue::new(&config(5));
        let t0 = Instant::now();
        q.add_key("Ctrl+C", None, false, t0);
        q.add_key("Ctrl+C", None, false, t0 + ms(300));
        assert_eq!(texts(&q, t0 + ms(300)), vec!["Ctrl+C x2"]);
        q.add_key("Ctrl+C", None, false, t0 + ms(1200));
        assert_eq!(
            texts(&q, t0 + ms(1200)),
            vec!["Ctrl+C x3"],
            "window is measured from the last refresh"
        );
    }

    #[test]
    fn test_repeat_after_timeout_appends() {
        let mut q = DisplayQueue::new(&config(5));
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);
        q.add_key("A", None, false, t0 + ms(1500));
        assert_eq!(texts(&q, t0 + ms(1500)), vec!["A", "A"]);
    }

    #[test]
    fn test_scroll_refreshes_without_count() {
        let mut q = DisplayQueue::new(&config(5));
        let t0 = Instant::now();
        q.add_key("Scroll Up", None, false, t0);
        q.add_key("Scroll Up", None, false, t0 + ms(100));
        let items = q.items(t0 + ms(100));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].repeat_count, 1);
        assert_eq!(q.iter().next().unwrap().last_refreshed_at, t0 + ms(100));
    }

    #[test]
    fn test_aliased_scroll_counts_as_scroll() {
        let mut cfg = config(5);
        cfg.mouse.aliases.insert("Scroll Down".into(), "Wheel v".into());
        let mut q = DisplayQueue::new(&cfg);
        let t0 = Instant::now();
        q.add_key("Wheel v", None, false, t0);
        q.add_key("Wheel v", None, false, t0 + ms(100));
        assert_eq!(texts(&q, t0 + ms(100)), vec!["Wheel v"]);
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let mut q = DisplayQueue::new(&config(2));
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);
        q.add_key("B", None, false, t0);
        q.add_key("C", None, false, t0);
        assert_eq!(q.len(), 2);
        assert_eq!(texts(&q, t0), vec!["B", "C"]);
    }

    #[test]
    fn test_max_stack_change_applies_on_next_insert() {
        let mut q = DisplayQueue::new(&config(3));
        let t0 = Instant::now();
        for t in ["A", "B", "C"] {
            q.add_key(t, None, false, t0);
        }
        q.configure(&config(1));
        assert_eq!(q.len(), 3, "existing entries untouched");
        q.add_key("D", None, false, t0);
        assert_eq!(texts(&q, t0), vec!["D"]);
    }

    #[test]
    fn test_opacity_curve() {
        let mut q = DisplayQueue::new(&config(1));
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);

        assert_eq!(q.items(t0 + ms(2000))[0].opacity, 1.0);
        let mid = q.items(t0 + ms(2500))[0].opacity;
        assert!((mid - 0.5).abs() < 1e-9, "halfway through fade, got {}", mid);
        assert_eq!(q.items(t0 + ms(3000))[0].opacity, 0.0);
    }

    #[test]
    fn test_sweep_removes_faded() {
        let mut q = DisplayQueue::new(&config(2));
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);
        q.add_key("B", None, false, t0 + ms(1000));

        assert_eq!(q.tick(t0 + ms(2980)), 0);
        assert_eq!(q.tick(t0 + ms(3000)), 1);
        assert_eq!(texts(&q, t0 + ms(3000)), vec!["B"]);
    }

    #[test]
    fn test_tick_is_idempotent() {
        let mut q = DisplayQueue::new(&config(3));
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);
        q.add_key("B", None, false, t0);
        let before = q.items(t0 + ms(100));
        q.tick(t0 + ms(100));
        q.tick(t0 + ms(100));
        assert_eq!(q.items(t0 + ms(100)), before);
    }

    #[test]
    fn test_maintain_key_resets_timer_only() {
        let mut q = DisplayQueue::new(&config(3));
        let t0 = Instant::now();
        q.add_key("Ctrl+Shift", None, false, t0);
        assert!(q.maintain_key("Ctrl+Shift", t0 + ms(1900)));

        let items = q.items(t0 + ms(3500));
        assert_eq!(items[0].opacity, 1.0, "held key stays visible");
        assert_eq!(items[0].repeat_count, 1);
        assert!(!q.maintain_key("Alt", t0 + ms(3500)));
    }

    #[test]
    fn test_maintain_skips_faded_items() {
        let mut q = DisplayQueue::new(&config(3));
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);
        assert!(!q.maintain_key("A", t0 + ms(3000)));
    }

    #[test]
    fn test_lifetime_captured_per_item() {
        let mut q = DisplayQueue::new(&config(3));
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);

        let mut longer = config(3);
        longer.display.display_time = ms(10_000);
        q.configure(&longer);
        q.add_key("B", None, false, t0);

        let items = q.items(t0 + ms(3000));
        assert_eq!(items[0].opacity, 0.0);
        assert_eq!(items[1].opacity, 1.0);
    }

    #[test]
    fn test_proximity_decay() {
        let mut cfg = config(1);
        cfg.proximity = ProximityConfig {
            enabled: true,
            distance: 100.0,
            min_opacity: 0.2,
        };
        let mut q = DisplayQueue::new(&cfg);
        let t0 = Instant::now();
        q.add_key("A", None, false, t0);

        let anchor = cfg.display.position.anchor(0);
        q.set_pointer(anchor.0, anchor.1);
        assert!((q.items(t0)[0].opacity - 0.2).abs() < 1e-9);

        q.set_pointer(anchor.0 + 50.0, anchor.1);
        assert!((q.items(t0)[0].opacity - 0.6).abs() < 1e-9);

        q.set_pointer(anchor.0 + 500.0, anchor.1);
        assert_eq!(q.items(t0)[0].opacity, 1.0);
    }

    #[test]
    fn test_proximity_factor_disabled() {
        let cfg = ProximityConfig {
            enabled: false,
            distance: 100.0,
            min_opacity: 0.0,
        };
        assert_eq!(proximity_factor(&cfg, (0.0, 0.0), (0.0, 0.0)), 1.0);
    }

    #[test]
    fn test_display_text_suffix() {
        let mut q = DisplayQueue::new(&config(1));
        let t0 = Instant::now();
        q.add_key("Ctrl+Z", Some("Undo".into()), false, t0);
        q.add_key("Ctrl+Z", None, false, t0 + ms(10));
        let view = &q.items(t0 + ms(10))[0];
        assert_eq!(view.text, "Ctrl+Z x2");
        assert_eq!(view.description.as_deref(), Some("Undo"));
    }
}
