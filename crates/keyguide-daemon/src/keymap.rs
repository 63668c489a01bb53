//! evdev key codes to [`RawKey`]
//!
//! evdev reports physical key codes only, so the listener keeps a small
//! per-device modifier state and applies a US layout to recover the
//! character a key produced. Ctrl+letter yields the ASCII control code the
//! way terminal-style key lookup does. Every key carries a Windows-style
//! virtual-key number used as its press/release identity.

use evdev::Key;

use crate::normalizer::RawKey;

/// Modifier state of one keyboard
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyboardState {
    left_shift: bool,
    right_shift: bool,
    left_ctrl: bool,
    right_ctrl: bool,
    caps_lock: bool,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    fn shift(&self) -> bool {
        self.left_shift || self.right_shift
    }

    fn ctrl(&self) -> bool {
        self.left_ctrl || self.right_ctrl
    }

    /// Track a key transition. Call before [`Self::to_raw`] for presses.
    pub fn update(&mut self, key: Key, pressed: bool) {
        match key {
            Key::KEY_LEFTSHIFT => self.left_shift = pressed,
            Key::KEY_RIGHTSHIFT => self.right_shift = pressed,
            Key::KEY_LEFTCTRL => self.left_ctrl = pressed,
            Key::KEY_RIGHTCTRL => self.right_ctrl = pressed,
            Key::KEY_CAPSLOCK if pressed => self.caps_lock = !self.caps_lock,
            _ => {}
        }
    }

    /// Describe `key` as the listener would report it, or `None` for keys
    /// with no meaningful display name.
    pub fn to_raw(&self, key: Key) -> Option<RawKey> {
        if let Some(letter) = letter(key) {
            let vk = letter.to_ascii_uppercase() as u32;
            let ch = if self.ctrl() {
                char::from(letter as u8 - b'a' + 1)
            } else if self.shift() != self.caps_lock {
                letter.to_ascii_uppercase()
            } else {
                letter
            };
            return Some(RawKey::char(ch, Some(vk)));
        }

        if let Some((plain, shifted, vk)) = symbol(key) {
            let ch = if self.shift() { shifted } else { plain };
            return Some(RawKey::char(ch, Some(vk)));
        }

        if let Some(n) = keypad_digit(key) {
            let vk = 96 + n;
            return Some(RawKey::named(format!("<{}>", vk), Some(vk)));
        }

        if let Some(n) = function_key(key) {
            return Some(RawKey::named(format!("f{}", n), Some(0x6F + n)));
        }

        let (name, vk) = named(key)?;
        Some(RawKey::named(name, vk))
    }
}

fn letter(key: Key) -> Option<char> {
    let c = match key {
        Key::KEY_A => 'a',
        Key::KEY_B => 'b',
        Key::KEY_C => 'c',
        Key::KEY_D => 'd',
        Key::KEY_E => 'e',
        Key::KEY_F => 'f',
        Key::KEY_G => 'g',
        Key::KEY_H => 'h',
        Key::KEY_I => 'i',
        Key::KEY_J => 'j',
        Key::KEY_K => 'k',
        Key::KEY_L => 'l',
        Key::KEY_M => 'm',
        Key::KEY_N => 'n',
        Key::KEY_O => 'o',
        Key::KEY_P => 'p',
        Key::KEY_Q => 'q',
        Key::KEY_R => 'r',
        Key::KEY_S => 's',
        Key::KEY_T => 't',
        Key::KEY_U => 'u',
        Key::KEY_V => 'v',
        Key::KEY_W => 'w',
        Key::KEY_X => 'x',
        Key::KEY_Y => 'y',
        Key::KEY_Z => 'z',
        _ => return None,
    };
    Some(c)
}

/// (unshifted, shifted, virtual key) for digit and punctuation keys
fn symbol(key: Key) -> Option<(char, char, u32)> {
    let entry = match key {
        Key::KEY_1 => ('1', '!', 0x31),
        Key::KEY_2 => ('2', '@', 0x32),
        Key::KEY_3 => ('3', '#', 0x33),
        Key::KEY_4 => ('4', '$', 0x34),
        Key::KEY_5 => ('5', '%', 0x35),
        Key::KEY_6 => ('6', '^', 0x36),
        Key::KEY_7 => ('7', '&', 0x37),
        Key::KEY_8 => ('8', '*', 0x38),
        Key::KEY_9 => ('9', '(', 0x39),
        Key::KEY_0 => ('0', ')', 0x30),
        Key::KEY_MINUS => ('-', '_', 0xBD),
        Key::KEY_EQUAL => ('=', '+', 0xBB),
        Key::KEY_LEFTBRACE => ('[', '{', 0xDB),
        Key::KEY_RIGHTBRACE => (']', '}', 0xDD),
        Key::KEY_SEMICOLON => (';', ':', 0xBA),
        Key::KEY_APOSTROPHE => ('\'', '"', 0xDE),
        Key::KEY_GRAVE => ('`', '~', 0xC0),
        Key::KEY_BACKSLASH => ('\\', '|', 0xDC),
        Key::KEY_COMMA => (',', '<', 0xBC),
        Key::KEY_DOT => ('.', '>', 0xBE),
        Key::KEY_SLASH => ('/', '?', 0xBF),
        Key::KEY_102ND => ('<', '>', 0xE2),
        Key::KEY_KPPLUS => ('+', '+', 0x6B),
        Key::KEY_KPMINUS => ('-', '-', 0x6D),
        Key::KEY_KPASTERISK => ('*', '*', 0x6A),
        Key::KEY_KPSLASH => ('/', '/', 0x6F),
        Key::KEY_KPDOT => ('.', '.', 0x6E),
        _ => return None,
    };
    Some(entry)
}

fn keypad_digit(key: Key) -> Option<u32> {
    let n = match key {
        Key::KEY_KP0 => 0,
        Key::KEY_KP1 => 1,
        Key::KEY_KP2 => 2,
        Key::KEY_KP3 => 3,
        Key::KEY_KP4 => 4,
        Key::KEY_KP5 => 5,
        Key::KEY_KP6 => 6,
        Key::KEY_KP7 => 7,
        Key::KEY_KP8 => 8,
        Key::KEY_KP9 => 9,
        _ => return None,
    };
    Some(n)
}

fn function_key(key: Key) -> Option<u32> {
    let n = match key {
        Key::KEY_F1 => 1,
        Key::KEY_F2 => 2,
        Key::KEY_F3 => 3,
        Key::KEY_F4 => 4,
        Key::KEY_F5 => 5,
        Key::KEY_F6 => 6,
        Key::KEY_F7 => 7,
        Key::KEY_F8 => 8,
        Key::KEY_F9 => 9,
        Key::KEY_F10 => 10,
        Key::KEY_F11 => 11,
        Key::KEY_F12 => 12,
        Key::KEY_F13 => 13,
        Key::KEY_F14 => 14,
        Key::KEY_F15 => 15,
        Key::KEY_F16 => 16,
        Key::KEY_F17 => 17,
        Key::KEY_F18 => 18,
        Key::KEY_F19 => 19,
        Key::KEY_F20 => 20,
        Key::KEY_F21 => 21,
        Key::KEY_F22 => 22,
        Key::KEY_F23 => 23,
        Key::KEY_F24 => 24,
        _ => return None,
    };
    Some(n)
}

/// Symbolic name and virtual key for non-printing keys
fn named(key: Key) -> Option<(&'static str, Option<u32>)> {
    let entry = match key {
        // Modifiers
        Key::KEY_LEFTCTRL => ("ctrl_l", Some(0xA2)),
        Key::KEY_RIGHTCTRL => ("ctrl_r", Some(0xA3)),
        Key::KEY_LEFTSHIFT => ("shift", Some(0xA0)),
        Key::KEY_RIGHTSHIFT => ("shift_r", Some(0xA1)),
        Key::KEY_LEFTALT => ("alt_l", Some(0xA4)),
        Key::KEY_RIGHTALT => ("alt_gr", Some(0xA5)),
        Key::KEY_LEFTMETA => ("cmd", Some(0x5B)),
        Key::KEY_RIGHTMETA => ("cmd_r", Some(0x5C)),
        Key::KEY_COMPOSE => ("menu", Some(0x5D)),

        // Editing
        Key::KEY_ENTER => ("enter", Some(0x0D)),
        // Shares VK_RETURN with Enter; a symbolic identity keeps them apart
        Key::KEY_KPENTER => ("enter", None),
        Key::KEY_TAB => ("tab", Some(0x09)),
        Key::KEY_SPACE => ("space", Some(0x20)),
        Key::KEY_BACKSPACE => ("backspace", Some(0x08)),
        Key::KEY_ESC => ("escape", Some(0x1B)),
        Key::KEY_DELETE => ("delete", Some(0x2E)),
        Key::KEY_INSERT => ("insert", Some(0x2D)),

        // Navigation
        Key::KEY_HOME => ("home", Some(0x24)),
        Key::KEY_END => ("end", Some(0x23)),
        Key::KEY_PAGEUP => ("page_up", Some(0x21)),
        Key::KEY_PAGEDOWN => ("page_down", Some(0x22)),
        Key::KEY_UP => ("up", Some(0x26)),
        Key::KEY_DOWN => ("down", Some(0x28)),
        Key::KEY_LEFT => ("left", Some(0x25)),
        Key::KEY_RIGHT => ("right", Some(0x27)),

        // Locks and system
        Key::KEY_CAPSLOCK => ("caps_lock", Some(0x14)),
        Key::KEY_NUMLOCK => ("num_lock", Some(0x90)),
        Key::KEY_SCROLLLOCK => ("scroll_lock", Some(0x91)),
        Key::KEY_SYSRQ => ("print_screen", Some(0x2C)),
        Key::KEY_PAUSE => ("pause", Some(0x13)),

        // Media
        Key::KEY_MUTE => ("media_volume_mute", Some(0xAD)),
        Key::KEY_VOLUMEDOWN => ("media_volume_down", Some(0xAE)),
        Key::KEY_VOLUMEUP => ("media_volume_up", Some(0xAF)),
        Key::KEY_NEXTSONG => ("media_next", Some(0xB0)),
        Key::KEY_PREVIOUSSONG => ("media_previous", Some(0xB1)),
        Key::KEY_PLAYPAUSE => ("media_play_pause", Some(0xB3)),

        _ => return None,
    };
    Some(entry)
}
