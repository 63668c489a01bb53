//! Combo text from the set of held tokens

use std::collections::BTreeSet;
use std::fmt;

use crate::normalizer::Token;

/// Shifted punctuation. With Shift and exactly one of these held, the
/// symbol already implies Shift and it is left out of the combo text.
const SHIFTED_SYMBOLS: &str = "!\"#$%&'()=~|`{+*}<>?_";

/// Single keys shown even when plain single keys are suppressed
const ALWAYS_SHOWN: &[&str] = &[
    "Enter", "Tab", "Space", "Esc", "Del", "Backspace", "↑", "↓", "←", "→", "PrtSc",
];

/// Modifier tokens, ordered as they appear in combo text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Win,
    Ctrl,
    Alt,
    Shift,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::Win, Modifier::Ctrl, Modifier::Alt, Modifier::Shift];

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Win" => Some(Modifier::Win),
            "Ctrl" => Some(Modifier::Ctrl),
            "Alt" => Some(Modifier::Alt),
            "Shift" => Some(Modifier::Shift),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Win => "Win",
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Held modifiers in display order
pub fn held_modifiers(tokens: &BTreeSet<Token>) -> Vec<Modifier> {
    Modifier::ALL
        .into_iter()
        .filter(|m| tokens.iter().any(|t| t.as_str() == m.as_str()))
        .collect()
}

/// `"Ctrl+Shift+"` style prefix for mouse gestures, empty without modifiers
pub fn modifier_prefix(modifiers: &[Modifier]) -> String {
    modifiers.iter().map(|m| format!("{}+", m)).collect()
}

/// Result of [`build_combo_text`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboText {
    pub text: String,
    /// No modifier survived, i.e. plain typing
    pub is_char_input: bool,
}

/// Build the canonical text for a set of held tokens.
///
/// Modifiers come first in [`Modifier`] order, every other token follows
/// in ascending order, all joined with `+`. Returns `None` for an empty
/// set, and for plain single characters when `show_single_keys` is off.
pub fn build_combo_text(tokens: &BTreeSet<Token>, show_single_keys: bool) -> Option<ComboText> {
    let mut modifiers = held_modifiers(tokens);
    let others: Vec<&str> = tokens
        .iter()
        .map(Token::as_str)
        .filter(|t| Modifier::from_token(t).is_none())
        .collect();

    if modifiers.contains(&Modifier::Shift) && others.len() == 1 {
        let only = others[0];
        if only.chars().count() == 1 && SHIFTED_SYMBOLS.contains(only) {
            modifiers.retain(|m| *m != Modifier::Shift);
        }
    }

    let parts: Vec<&str> = modifiers
        .iter()
        .map(|m| -> &str { m.as_str() })
        .chain(others.iter().copied())
        .collect();
    if parts.is_empty() {
        return None;
    }

    let is_char_input = modifiers.is_empty();
    if !show_single_keys && is_char_input && parts.len() == 1 {
        let only = parts[0];
        if only.chars().count() == 1 && !ALWAYS_SHOWN.contains(&only) {
            return None;
        }
    }

    Some(ComboText {
        text: parts.join("+"),
        is_char_input,
    })
}
