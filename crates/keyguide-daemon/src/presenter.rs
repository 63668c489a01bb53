//! Output side: where frames, reference-sheet signals and halo feedback go
//!
//! Drawing is left to an external renderer. The daemon either logs what
//! would be shown, or streams it as JSON lines for a renderer to consume.

use std::io::{self, Write};

use keyguide_config::{CheatEntry, CheatSheet};
use serde::Serialize;

use crate::display::ItemView;
use crate::engine::CheatSheetSignal;
use crate::gesture::HaloEvent;

pub trait Presenter {
    /// Current entries, oldest first. Called on every frame tick.
    fn frame(&mut self, items: &[ItemView]) -> io::Result<()>;

    fn cheat_sheet(&mut self, signal: CheatSheetSignal, sheet: &CheatSheet) -> io::Result<()>;

    fn halo(&mut self, event: &HaloEvent) -> io::Result<()>;
}

/// Which presenter the daemon runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-readable tracing output
    Log,
    /// One JSON object per line on stdout
    Json,
}

pub fn for_mode(mode: OutputMode) -> Box<dyn Presenter + Send> {
    match mode {
        OutputMode::Log => Box::new(LogPresenter::default()),
        OutputMode::Json => Box::new(JsonPresenter::new(io::stdout())),
    }
}

/// Logs visible entries whenever the set of texts changes
#[derive(Debug, Default)]
pub struct LogPresenter {
    shown: Vec<String>,
    window_visible: bool,
}

impl Presenter for LogPresenter {
    fn frame(&mut self, items: &[ItemView]) -> io::Result<()> {
        let shown: Vec<String> = items
            .iter()
            .map(|item| match &item.description {
                Some(desc) => format!("{} ({})", item.text, desc),
                None => item.text.clone(),
            })
            .collect();
        if shown != self.shown {
            if !shown.is_empty() {
                tracing::info!("{}", shown.join(" | "));
            }
            self.shown = shown;
        }
        Ok(())
    }

    fn cheat_sheet(&mut self, signal: CheatSheetSignal, sheet: &CheatSheet) -> io::Result<()> {
        match signal {
            CheatSheetSignal::ShowOverlay(true) => {
                tracing::info!("Reference sheet:\n{}", sheet.render_text());
            }
            CheatSheetSignal::ShowOverlay(false) => {
                tracing::info!("Reference sheet hidden");
            }
            CheatSheetSignal::ToggleWindow => {
                self.window_visible = !self.window_visible;
                tracing::info!(
                    "Reference window {}",
                    if self.window_visible { "shown" } else { "hidden" }
                );
            }
        }
        Ok(())
    }

    fn halo(&mut self, event: &HaloEvent) -> io::Result<()> {
        tracing::trace!("Halo: {:?}", event);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Message<'a> {
    Frame { items: &'a [ItemView] },
    Overlay { show: bool, entries: &'a [CheatEntry] },
    ToggleWindow { visible: bool, entries: &'a [CheatEntry] },
    Halo { event: &'a HaloEvent },
}

/// Streams JSON lines to `W`; frames are written only when they change
pub struct JsonPresenter<W: Write> {
    out: W,
    last_frame: Option<Vec<ItemView>>,
    window_visible: bool,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_frame: None,
            window_visible: false,
        }
    }

    fn write(&mut self, message: &Message<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn frame(&mut self, items: &[ItemView]) -> io::Result<()> {
        if self.last_frame.as_deref() == Some(items) {
            return Ok(());
        }
        self.write(&Message::Frame { items })?;
        self.last_frame = Some(items.to_vec());
        Ok(())
    }

    fn cheat_sheet(&mut self, signal: CheatSheetSignal, sheet: &CheatSheet) -> io::Result<()> {
        let entries = &sheet.entries[..];
        match signal {
            CheatSheetSignal::ShowOverlay(show) => self.write(&Message::Overlay { show, entries }),
            CheatSheetSignal::ToggleWindow => {
                self.window_visible = !self.window_visible;
                let visible = self.window_visible;
                self.write(&Message::ToggleWindow { visible, entries })
            }
        }
    }

    fn halo(&mut self, event: &HaloEvent) -> io::Result<()> {
        self.write(&Message::Halo { event })
    }
}
