//! Raw key events to display tokens
//!
//! Listener adapters describe a key either by the character it produced or
//! by a symbolic name (`"Key.f1"`, `"ctrl_l"`, `"<97>"`). [`normalize`]
//! turns that into the short [`Token`] shown on screen, and
//! [`PressedKeys`] remembers which physical key produced which token so the
//! release can be matched even when it would normalize differently.

use std::collections::BTreeSet;
use std::fmt;

/// Virtual-key code sent while an IME is composing
const VK_IME_PROCESS: u32 = 229;

// ============================================================================
// Raw input
// ============================================================================

/// A key as reported by the input listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    /// A key that produced a character. Ctrl+letter arrives as the ASCII
    /// control code (`'\u{3}'` for Ctrl+C).
    Char { ch: char, vk: Option<u32> },
    /// A non-printing key, by symbolic name
    Named { name: String, vk: Option<u32> },
}

impl RawKey {
    pub fn char(ch: char, vk: Option<u32>) -> Self {
        RawKey::Char { ch, vk }
    }

    pub fn named(name: impl Into<String>, vk: Option<u32>) -> Self {
        RawKey::Named {
            name: name.into(),
            vk,
        }
    }

    pub fn vk(&self) -> Option<u32> {
        match self {
            RawKey::Char { vk, .. } | RawKey::Named { vk, .. } => *vk,
        }
    }
}

/// Stable identity of a physical key, used to pair press and release
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyIdentity {
    VirtualKey(u32),
    /// Fallback when the listener gave no virtual-key code
    Symbol(String),
}

impl KeyIdentity {
    pub fn of(raw: &RawKey) -> Self {
        match raw {
            RawKey::Char { vk: Some(vk), .. } | RawKey::Named { vk: Some(vk), .. } => {
                KeyIdentity::VirtualKey(*vk)
            }
            RawKey::Char { ch, vk: None } => KeyIdentity::Symbol(ch.to_string()),
            RawKey::Named { name, vk: None } => KeyIdentity::Symbol(name.clone()),
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// Canonical display name of one key, e.g. `Ctrl`, `A`, `F1`, `↑`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
    pub fn new(s: impl Into<String>) -> Self {
        Token(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Map a symbolic key name to its display token
fn named_token(name: &str) -> Option<&'static str> {
    let token = match name {
        // Modifiers
        "ctrl" | "ctrl_l" | "ctrl_r" | "control" => "Ctrl",
        "alt" | "alt_l" | "alt_r" | "alt_gr" => "Alt",
        "shift" | "shift_l" | "shift_r" => "Shift",
        "cmd" | "cmd_l" | "cmd_r" => "Win",
        "menu" => "Menu",

        // Editing
        "enter" => "Enter",
        "tab" => "Tab",
        "space" => "Space",
        "delete" => "Del",
        "escape" => "Esc",
        "backspace" => "Backspace",
        "insert" => "Ins",

        // Navigation
        "up" => "↑",
        "down" => "↓",
        "left" => "←",
        "right" => "→",
        "page_up" => "PgUp",
        "page_down" => "PgDn",
        "home" => "Home",
        "end" => "End",

        // Locks and system
        "caps_lock" => "CapsLock",
        "num_lock" => "NumLock",
        "scroll_lock" => "ScrLk",
        "print_screen" => "PrtSc",
        "pause" => "Pause",

        // Function keys
        "f1" => "F1",
        "f2" => "F2",
        "f3" => "F3",
        "f4" => "F4",
        "f5" => "F5",
        "f6" => "F6",
        "f7" => "F7",
        "f8" => "F8",
        "f9" => "F9",
        "f10" => "F10",
        "f11" => "F11",
        "f12" => "F12",
        "f13" => "F13",
        "f14" => "F14",
        "f15" => "F15",
        "f16" => "F16",
        "f17" => "F17",
        "f18" => "F18",
        "f19" => "F19",
        "f20" => "F20",
        "f21" => "F21",
        "f22" => "F22",
        "f23" => "F23",
        "f24" => "F24",

        // Media
        "media_play_pause" => "Play",
        "media_next" => "Next",
        "media_previous" => "Prev",
        "media_volume_up" => "Vol+",
        "media_volume_down" => "Vol-",
        "media_volume_mute" => "Mute",

        _ => return None,
    };
    Some(token)
}

fn is_alphanumeric_vk(vk: u32) -> bool {
    (48..=57).contains(&vk) || (65..=90).contains(&vk)
}

/// At least one cased character and no lowercase ones
fn is_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

/// Upper-case the first letter of every word, lower-case the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_uppercase() || c.is_lowercase();
    }
    out
}

/// Resolve a raw key to its display token.
///
/// Returns `None` for IME placeholder codes, unresolvable control
/// characters and bracketed codes outside the numpad/alphanumeric ranges.
pub fn normalize(raw: &RawKey) -> Option<Token> {
    if raw.vk() == Some(VK_IME_PROCESS) {
        return None;
    }

    let name = match raw {
        RawKey::Char { ch, vk } => {
            let code = *ch as u32;
            if code < 32 {
                let resolved = if (1..=26).contains(&code) {
                    char::from_u32(code + 64)
                } else {
                    vk.filter(|v| is_alphanumeric_vk(*v))
                        .and_then(char::from_u32)
                };
                resolved?.to_string()
            } else {
                ch.to_uppercase().collect()
            }
        }
        RawKey::Named { name, .. } => {
            let name = name.strip_prefix("Key.").unwrap_or(name);
            match name.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                Some(code) => {
                    let vk: u32 = code.trim().parse().ok()?;
                    match vk {
                        96..=105 => (vk - 96).to_string(),
                        v if is_alphanumeric_vk(v) => char::from_u32(v)?.to_string(),
                        _ => return None,
                    }
                }
                None => name.to_string(),
            }
        }
    };

    if name.is_empty() {
        return None;
    }
    if let Some(token) = named_token(&name) {
        return Some(Token::new(token));
    }
    if name.chars().count() > 1 && is_upper(&name) {
        return Some(Token(title_case(&name)));
    }
    Some(Token(name))
}

// ============================================================================
// Pressed-key tracking
// ============================================================================

#[derive(Debug, Clone)]
struct Slot {
    identity: KeyIdentity,
    token: Token,
}

/// Physical keys currently held, in press order.
///
/// Each held key occupies one slot of a small vector; the token set is
/// derived from the slots, so a token stays pressed while any physical key
/// producing it is held.
#[derive(Debug, Clone, Default)]
pub struct PressedKeys {
    slots: Vec<Slot>,
}

impl PressedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, identity: &KeyIdentity) -> bool {
        self.slots.iter().any(|s| &s.identity == identity)
    }

    /// Record a press. Returns `false` when this identity is already held
    /// (autorepeat or duplicate delivery) and nothing changed.
    pub fn press(&mut self, identity: KeyIdentity, token: Token) -> bool {
        if self.is_held(&identity) {
            return false;
        }
        self.slots.push(Slot { identity, token });
        true
    }

    /// Release by recorded identity, returning the token it was pressed as.
    pub fn release(&mut self, identity: &KeyIdentity) -> Option<Token> {
        let index = self.slots.iter().position(|s| &s.identity == identity)?;
        Some(self.slots.remove(index).token)
    }

    /// Release by token, for keys whose press was never recorded. Every
    /// slot holding `token` is cleared.
    pub fn release_token(&mut self, token: &Token) -> Option<Token> {
        let before = self.slots.len();
        self.slots.retain(|s| &s.token != token);
        (self.slots.len() != before).then(|| token.clone())
    }

    #[cfg(test)]
    fn contains(&self, token: &str) -> bool {
        self.slots.iter().any(|s| s.token.as_str() == token)
    }

    /// Derived set of held tokens, each at most once
    pub fn tokens(&self) -> BTreeSet<Token> {
        self.slots.iter().map(|s| s.token.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: RawKey) -> Option<String> {
        normalize(&raw).map(|t| t.as_str().to_string())
    }

    #[test]
    fn test_printable_chars_are_uppercased() {
        assert_eq!(norm(RawKey::char('a', Some(65))), Some("A".into()));
        assert_eq!(norm(RawKey::char('!', Some(49))), Some("!".into()));
        assert_eq!(norm(RawKey::char('7', None)), Some("7".into()));
    }

    #[test]
    fn test_control_chars_map_back_to_letters() {
        assert_eq!(norm(RawKey::char('\u{3}', Some(67))), Some("C".into()));
        assert_eq!(norm(RawKey::char('\u{1}', None)), Some("A".into()));
        assert_eq!(norm(RawKey::char('\u{1a}', None)), Some("Z".into()));
    }

    #[test]
    fn test_control_chars_outside_letters_use_vk() {
        // Ctrl+2 on some layouts gives NUL
        assert_eq!(norm(RawKey::char('\u{0}', Some(50))), Some("2".into()));
        assert_eq!(norm(RawKey::char('\u{1b}', None)), None);
        assert_eq!(norm(RawKey::char('\u{1d}', Some(221))), None);
    }

    #[test]
    fn test_ime_placeholder_is_dropped() {
        assert_eq!(norm(RawKey::char('a', Some(229))), None);
        assert_eq!(norm(RawKey::named("Key.space", Some(229))), None);
    }

    #[test]
    fn test_named_keys_use_table() {
        assert_eq!(norm(RawKey::named("Key.ctrl_l", Some(162))), Some("Ctrl".into()));
        assert_eq!(norm(RawKey::named("shift_r", Some(161))), Some("Shift".into()));
        assert_eq!(norm(RawKey::named("Key.cmd", Some(91))), Some("Win".into()));
        assert_eq!(norm(RawKey::named("Key.up", Some(38))), Some("↑".into()));
        assert_eq!(norm(RawKey::named("Key.escape", Some(27))), Some("Esc".into()));
        assert_eq!(norm(RawKey::named("Key.f11", Some(122))), Some("F11".into()));
        assert_eq!(norm(RawKey::named("Key.page_down", None)), Some("PgDn".into()));
        assert_eq!(norm(RawKey::named("Key.print_screen", None)), Some("PrtSc".into()));
    }

    #[test]
    fn test_bracketed_codes() {
        assert_eq!(norm(RawKey::named("<96>", Some(96))), Some("0".into()));
        assert_eq!(norm(RawKey::named("<105>", Some(105))), Some("9".into()));
        assert_eq!(norm(RawKey::named("<65>", Some(65))), Some("A".into()));
        assert_eq!(norm(RawKey::named("<53>", Some(53))), Some("5".into()));
        assert_eq!(norm(RawKey::named("<12>", Some(12))), None);
        assert_eq!(norm(RawKey::named("<junk>", None)), None);
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(norm(RawKey::named("Key.launch_app2", None)), Some("launch_app2".into()));
        assert_eq!(norm(RawKey::named("HYPER", None)), Some("Hyper".into()));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("SS"), "Ss");
        assert_eq!(title_case("F1X"), "F1X");
        assert_eq!(title_case("VOL UP"), "Vol Up");
        assert!(is_upper("F1"));
        assert!(!is_upper("12"));
    }

    #[test]
    fn test_identity_prefers_vk() {
        assert_eq!(
            KeyIdentity::of(&RawKey::char('a', Some(65))),
            KeyIdentity::VirtualKey(65)
        );
        assert_eq!(
            KeyIdentity::of(&RawKey::named("Key.f1", None)),
            KeyIdentity::Symbol("Key.f1".into())
        );
    }

    #[test]
    fn test_press_is_idempotent_per_identity() {
        let mut keys = PressedKeys::new();
        assert!(keys.press(KeyIdentity::VirtualKey(65), Token::new("A")));
        assert!(!keys.press(KeyIdentity::VirtualKey(65), Token::new("A")));
        assert_eq!(keys.tokens().len(), 1);
    }

    #[test]
    fn test_release_uses_recorded_token() {
        let mut keys = PressedKeys::new();
        keys.press(KeyIdentity::VirtualKey(49), Token::new("!"));

        // Shift was released first, so the key would now normalize to "1"
        let released = keys.release(&KeyIdentity::VirtualKey(49));
        assert_eq!(released, Some(Token::new("!")));
        assert!(keys.is_empty());
    }

    #[test]
    fn test_token_held_by_two_identities() {
        let mut keys = PressedKeys::new();
        keys.press(KeyIdentity::VirtualKey(0xA2), Token::new("Ctrl"));
        keys.press(KeyIdentity::VirtualKey(0xA3), Token::new("Ctrl"));
        assert_eq!(keys.tokens().len(), 1, "token appears once");

        keys.release(&KeyIdentity::VirtualKey(0xA2));
        assert!(keys.contains("Ctrl"), "still held by right ctrl");
        keys.release(&KeyIdentity::VirtualKey(0xA3));
        assert!(!keys.contains("Ctrl"));
    }

    #[test]
    fn test_release_token_fallback() {
        let mut keys = PressedKeys::new();
        keys.press(KeyIdentity::Symbol("x".into()), Token::new("X"));
        assert_eq!(keys.release(&KeyIdentity::VirtualKey(88)), None);
        assert_eq!(keys.release_token(&Token::new("X")), Some(Token::new("X")));
        assert_eq!(keys.release_token(&Token::new("X")), None);
    }
}
