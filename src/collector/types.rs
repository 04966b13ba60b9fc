//! Key identities and raw key signals for the capture session.
//!
//! Keys are named with X11/Tk keysym strings (`"t"`, `"period"`, `"Shift_L"`,
//! `"BackSpace"`, `"Return"`), which is also how they appear in replay scripts.

use crate::core::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Modifier keys. These never produce timing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    CapsLock,
}

/// Identity of a physical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    /// A key producing a printable character
    Char(char),
    /// Cancels the current attempt
    Backspace,
    /// Submits the current attempt
    Enter,
    /// Shift, Control, Alt or Caps Lock
    Modifier(Modifier),
    /// Any other key (Tab, arrows, function keys), kept by keysym name
    Named(String),
}

/// Keysym names for printable characters that are not spelled as themselves.
const NAMED_CHARS: &[(&str, char)] = &[
    ("period", '.'),
    ("comma", ','),
    ("space", ' '),
    ("minus", '-'),
    ("underscore", '_'),
    ("plus", '+'),
    ("equal", '='),
    ("exclam", '!'),
    ("at", '@'),
    ("numbersign", '#'),
    ("dollar", '$'),
    ("percent", '%'),
    ("ampersand", '&'),
    ("asterisk", '*'),
    ("slash", '/'),
    ("question", '?'),
    ("colon", ':'),
    ("semicolon", ';'),
];

impl Key {
    /// Parse a keysym name.
    pub fn from_keysym(keysym: &str) -> Option<Self> {
        let key = match keysym {
            "" => return None,
            "BackSpace" => Key::Backspace,
            "Return" | "KP_Enter" => Key::Enter,
            "Shift_L" | "Shift_R" => Key::Modifier(Modifier::Shift),
            "Control_L" | "Control_R" => Key::Modifier(Modifier::Control),
            "Alt_L" | "Alt_R" => Key::Modifier(Modifier::Alt),
            "Caps_Lock" => Key::Modifier(Modifier::CapsLock),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => NAMED_CHARS
                        .iter()
                        .find(|(name, _)| *name == other)
                        .map(|&(_, c)| Key::Char(c))
                        .unwrap_or_else(|| Key::Named(other.to_string())),
                }
            }
        };
        Some(key)
    }

    /// The keysym name for this key.
    pub fn keysym(&self) -> String {
        match self {
            Key::Char(c) => NAMED_CHARS
                .iter()
                .find(|(_, named)| named == c)
                .map(|(name, _)| name.to_string())
                .unwrap_or_else(|| c.to_string()),
            Key::Backspace => "BackSpace".to_string(),
            Key::Enter => "Return".to_string(),
            Key::Modifier(Modifier::Shift) => "Shift_L".to_string(),
            Key::Modifier(Modifier::Control) => "Control_L".to_string(),
            Key::Modifier(Modifier::Alt) => "Alt_L".to_string(),
            Key::Modifier(Modifier::CapsLock) => "Caps_Lock".to_string(),
            Key::Named(name) => name.clone(),
        }
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self, Key::Modifier(_))
    }

    /// The character this key adds to the typed text, if any.
    pub fn as_char(&self) -> Option<char> {
        match self {
            Key::Char(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keysym())
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::from_keysym(s).ok_or_else(|| "empty keysym".to_string())
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.keysym()
    }
}

/// Whether a signal is a press or a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDirection {
    Down,
    Up,
}

/// A raw key signal as delivered by a collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySignal {
    pub key: Key,
    pub direction: KeyDirection,
    /// Time of the signal, if the source recorded one. Unstamped signals are
    /// stamped by the consumer when dispatched.
    pub at: Option<Timestamp>,
}

impl KeySignal {
    pub fn down(key: Key) -> Self {
        Self {
            key,
            direction: KeyDirection::Down,
            at: None,
        }
    }

    pub fn up(key: Key) -> Self {
        Self {
            key,
            direction: KeyDirection::Up,
            at: None,
        }
    }

    /// Attach a recorded timestamp.
    pub fn at(mut self, at: Timestamp) -> Self {
        self.at = Some(at);
        self
    }

    pub fn is_key_down(&self) -> bool {
        self.direction == KeyDirection::Down
    }
}
