//! Tap-vs-hold state machine for the reference-sheet key
//!
//! ```text
//!            press                 timer (same generation)
//!   Idle ───────────────► Pressed ────────────────────────► HoldFired
//!    ▲                      │                                   │
//!    │   release: cancel    │                                   │
//!    ├──────────────────────┘  + toggle window                  │
//!    │                                                          │
//!    └──────────────────────────────────────────────────────────┘
//!          release or Esc: hide overlay
//! ```
//!
//! The machine never owns a timer. It asks the caller to start one tagged
//! with a generation number and ignores any expiry whose generation is no
//! longer current, so a cancelled timer can never fire late.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    /// Trigger held, hold timer running
    Pressed { generation: u64 },
    /// Hold elapsed, overlay shown
    HoldFired,
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSignal {
    StartTimer { generation: u64, after: Duration },
    CancelTimer,
    ShowOverlay(bool),
    ToggleWindow,
}

/// Flag view of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerSnapshot {
    pub pressed: bool,
    pub hold_timer_active: bool,
    pub overlay_active: bool,
    pub just_activated_by_hold: bool,
}

#[derive(Debug)]
pub struct TriggerMachine {
    state: TriggerState,
    generation: u64,
    just_activated_by_hold: bool,
}

impl Default for TriggerMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerMachine {
    pub fn new() -> Self {
        Self {
            state: TriggerState::Idle,
            generation: 0,
            just_activated_by_hold: false,
        }
    }

    #[cfg(test)]
    fn state(&self) -> TriggerState {
        self.state
    }

    pub fn overlay_active(&self) -> bool {
        self.state == TriggerState::HoldFired
    }

    pub fn snapshot(&self) -> TriggerSnapshot {
        TriggerSnapshot {
            pressed: self.state != TriggerState::Idle,
            hold_timer_active: matches!(self.state, TriggerState::Pressed { .. }),
            overlay_active: self.overlay_active(),
            just_activated_by_hold: self.just_activated_by_hold,
        }
    }

    /// Trigger key went down. `hold` is read now, so a later config change
    /// only affects the next press.
    pub fn on_trigger_press(&mut self, hold: Duration) -> Vec<TriggerSignal> {
        if self.state != TriggerState::Idle {
            return Vec::new();
        }
        self.generation += 1;
        self.state = TriggerState::Pressed {
            generation: self.generation,
        };
        vec![TriggerSignal::StartTimer {
            generation: self.generation,
            after: hold,
        }]
    }

    /// The hold timer tagged `generation` expired.
    pub fn on_timer_elapsed(&mut self, generation: u64) -> Vec<TriggerSignal> {
        match self.state {
            TriggerState::Pressed { generation: current } if current == generation => {
                self.state = TriggerState::HoldFired;
                self.just_activated_by_hold = true;
                vec![TriggerSignal::ShowOverlay(true)]
            }
            _ => {
                tracing::trace!("Ignoring stale hold timer (generation {})", generation);
                Vec::new()
            }
        }
    }

    pub fn on_trigger_release(&mut self) -> Vec<TriggerSignal> {
        match self.state {
            TriggerState::Idle => Vec::new(),
            TriggerState::Pressed { .. } => {
                self.state = TriggerState::Idle;
                vec![TriggerSignal::CancelTimer, TriggerSignal::ToggleWindow]
            }
            TriggerState::HoldFired => {
                self.state = TriggerState::Idle;
                self.just_activated_by_hold = false;
                vec![TriggerSignal::ShowOverlay(false)]
            }
        }
    }

    /// Esc closes an active overlay. Returns no signals when nothing is shown.
    pub fn on_escape(&mut self) -> Vec<TriggerSignal> {
        if !self.overlay_active() {
            return Vec::new();
        }
        self.state = TriggerState::Idle;
        self.just_activated_by_hold = false;
        vec![TriggerSignal::CancelTimer, TriggerSignal::ShowOverlay(false)]
    }

    /// Return to `Idle`, e.g. when the feature is switched off.
    pub fn reset(&mut self) -> Vec<TriggerSignal> {
        let signals = match self.state {
            TriggerState::Idle => Vec::new(),
            TriggerState::Pressed { .. } => vec![TriggerSignal::CancelTimer],
            TriggerState::HoldFired => vec![TriggerSignal::ShowOverlay(false)],
        };
        self.state = TriggerState::Idle;
        self.just_activated_by_hold = false;
        signals
    }
}
