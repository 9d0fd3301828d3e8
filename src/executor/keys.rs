//! Key and mouse-button name tables.
//!
//! Names follow the `Key.<name>` / `Button.<name>` vocabulary used in
//! profiles: single letters and digits, plus the named keys below.

use evdev::{AttributeSet, Key};

const NAMED_KEYS: &[(&str, Key)] = &[
    ("alt", Key::KEY_LEFTALT),
    ("alt_l", Key::KEY_LEFTALT),
    ("alt_r", Key::KEY_RIGHTALT),
    ("backspace", Key::KEY_BACKSPACE),
    ("caps_lock", Key::KEY_CAPSLOCK),
    ("cmd", Key::KEY_LEFTMETA),
    ("cmd_l", Key::KEY_LEFTMETA),
    ("cmd_r", Key::KEY_RIGHTMETA),
    ("ctrl", Key::KEY_LEFTCTRL),
    ("ctrl_l", Key::KEY_LEFTCTRL),
    ("ctrl_r", Key::KEY_RIGHTCTRL),
    ("delete", Key::KEY_DELETE),
    ("down", Key::KEY_DOWN),
    ("end", Key::KEY_END),
    ("enter", Key::KEY_ENTER),
    ("esc", Key::KEY_ESC),
    ("f1", Key::KEY_F1),
    ("f2", Key::KEY_F2),
    ("f3", Key::KEY_F3),
    ("f4", Key::KEY_F4),
    ("f5", Key::KEY_F5),
    ("f6", Key::KEY_F6),
    ("f7", Key::KEY_F7),
    ("f8", Key::KEY_F8),
    ("f9", Key::KEY_F9),
    ("f10", Key::KEY_F10),
    ("f11", Key::KEY_F11),
    ("f12", Key::KEY_F12),
    ("home", Key::KEY_HOME),
    ("insert", Key::KEY_INSERT),
    ("left", Key::KEY_LEFT),
    ("page_down", Key::KEY_PAGEDOWN),
    ("page_up", Key::KEY_PAGEUP),
    ("right", Key::KEY_RIGHT),
    ("shift", Key::KEY_LEFTSHIFT),
    ("shift_l", Key::KEY_LEFTSHIFT),
    ("shift_r", Key::KEY_RIGHTSHIFT),
    ("space", Key::KEY_SPACE),
    ("tab", Key::KEY_TAB),
    ("up", Key::KEY_UP),
];

const LETTER_KEYS: [Key; 26] = [
    Key::KEY_A, Key::KEY_B, Key::KEY_C, Key::KEY_D, Key::KEY_E, Key::KEY_F, Key::KEY_G,
    Key::KEY_H, Key::KEY_I, Key::KEY_J, Key::KEY_K, Key::KEY_L, Key::KEY_M, Key::KEY_N,
    Key::KEY_O, Key::KEY_P, Key::KEY_Q, Key::KEY_R, Key::KEY_S, Key::KEY_T, Key::KEY_U,
    Key::KEY_V, Key::KEY_W, Key::KEY_X, Key::KEY_Y, Key::KEY_Z,
];

const DIGIT_KEYS: [Key; 10] = [
    Key::KEY_0, Key::KEY_1, Key::KEY_2, Key::KEY_3, Key::KEY_4, Key::KEY_5, Key::KEY_6,
    Key::KEY_7, Key::KEY_8, Key::KEY_9,
];

const MOUSE_BUTTONS: &[(&str, Key)] = &[
    ("left", Key::BTN_LEFT),
    ("right", Key::BTN_RIGHT),
    ("middle", Key::BTN_MIDDLE),
];

/// Looks up a keyboard key by name (case-insensitive).
///
/// # Examples
///
/// ```
/// use evdev::Key;
/// use pad_mapper::executor::keys::key_code;
///
/// assert_eq!(key_code("space"), Some(Key::KEY_SPACE));
/// assert_eq!(key_code("W"), Some(Key::KEY_W));
/// assert_eq!(key_code("7"), Some(Key::KEY_7));
/// assert_eq!(key_code("hyper"), None);
/// ```
#[must_use]
pub fn key_code(name: &str) -> Option<Key> {
    let lower = name.to_ascii_lowercase();
    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' => Some(LETTER_KEYS[usize::from(c as u8 - b'a')]),
            '0'..='9' => Some(DIGIT_KEYS[usize::from(c as u8 - b'0')]),
            _ => None,
        };
    }
    NAMED_KEYS
        .iter()
        .find(|(key_name, _)| *key_name == lower)
        .map(|(_, key)| *key)
}

/// Looks up a mouse button by name.
#[must_use]
pub fn mouse_button(name: &str) -> Option<Key> {
    MOUSE_BUTTONS
        .iter()
        .find(|(button_name, _)| button_name.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

/// Every key and mouse button the virtual device may emit.
#[must_use]
pub fn supported_keys() -> AttributeSet<Key> {
    let mut keys = AttributeSet::<Key>::new();
    for key in LETTER_KEYS.iter().chain(DIGIT_KEYS.iter()) {
        keys.insert(*key);
    }
    for (_, key) in NAMED_KEYS.iter().chain(MOUSE_BUTTONS.iter()) {
        keys.insert(*key);
    }
    keys
}
