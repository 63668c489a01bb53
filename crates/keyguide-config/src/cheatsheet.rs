//! Reference sheet built from the shortcut list

use serde::Serialize;

use crate::model::{Shortcut, ShortcutKind};

/// One visible row of the reference sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheatEntry {
    pub kind: ShortcutKind,
    pub combo: String,
    pub description: String,
}

/// The rows shown by the full-screen overlay and the persistent window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheatSheet {
    pub entries: Vec<CheatEntry>,
}

impl CheatSheet {
    /// Keep enabled shortcuts marked for the sheet, in list order.
    pub fn from_shortcuts(shortcuts: &[Shortcut]) -> Self {
        let entries = shortcuts
            .iter()
            .filter(|s| s.enabled && s.show_in_cheat)
            .map(|s| CheatEntry {
                kind: s.kind,
                combo: s.combo.clone(),
                description: s.description.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text rendering: headers on their own line, key rows with the
    /// combo column padded to the widest combo of the sheet.
    pub fn render_text(&self) -> String {
        let width = self
            .entries
            .iter()
            .filter(|e| e.kind == ShortcutKind::Key)
            .map(|e| e.combo.chars().count())
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            match entry.kind {
                ShortcutKind::Header => {
                    if i > 0 {
                        out.push('\n');
                    }
                    out.push_str(&format!("[{}]\n", entry.combo));
                }
                ShortcutKind::Key => {
                    let pad = width - entry.combo.chars().count();
                    out.push_str(&format!(
                        "  {}{}  {}\n",
                        entry.combo,
                        " ".repeat(pad),
                        entry.description
                    ));
                }
            }
        }
        out
    }
}
