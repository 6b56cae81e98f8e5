//! Symbolic key codes and their macOS virtual key values
//!
//! The table is the single source of truth for raw ↔ symbolic lookup,
//! the stable names used in configuration, and the glyphs shown to users.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when a key name does not match any [`KeyCode`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name: {0:?}")]
pub struct ParseKeyError(pub String);

macro_rules! key_codes {
    ($($variant:ident = $raw:literal, $name:literal, $label:literal;)*) => {
        /// A key the engine knows how to name, bind, and replay
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum KeyCode {
            $($variant = $raw,)*
        }

        impl KeyCode {
            /// Every known key, in table order
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$variant,)*];

            /// Look up the symbolic key for a raw virtual key code
            pub fn from_raw(raw: u16) -> Option<Self> {
                match raw {
                    $($raw => Some(KeyCode::$variant),)*
                    _ => None,
                }
            }

            /// Stable snake_case identifier used in config files
            pub fn name(self) -> &'static str {
                match self {
                    $(KeyCode::$variant => $name,)*
                }
            }

            /// Short label for display
            pub fn display_label(self) -> &'static str {
                match self {
                    $(KeyCode::$variant => $label,)*
                }
            }
        }
    };
}

key_codes! {
    // Letters
    A = 0x00, "a", "A";
    S = 0x01, "s", "S";
    D = 0x02, "d", "D";
    F = 0x03, "f", "F";
    H = 0x04, "h", "H";
    G = 0x05, "g", "G";
    Z = 0x06, "z", "Z";
    X = 0x07, "x", "X";
    C = 0x08, "c", "C";
    V = 0x09, "v", "V";
    B = 0x0B, "b", "B";
    Q = 0x0C, "q", "Q";
    W = 0x0D, "w", "W";
    E = 0x0E, "e", "E";
    R = 0x0F, "r", "R";
    Y = 0x10, "y", "Y";
    T = 0x11, "t", "T";
    O = 0x1F, "o", "O";
    U = 0x20, "u", "U";
    I = 0x22, "i", "I";
    P = 0x23, "p", "P";
    L = 0x25, "l", "L";
    J = 0x26, "j", "J";
    K = 0x28, "k", "K";
    N = 0x2D, "n", "N";
    M = 0x2E, "m", "M";

    // Digits
    One = 0x12, "one", "1";
    Two = 0x13, "two", "2";
    Three = 0x14, "three", "3";
    Four = 0x15, "four", "4";
    Five = 0x17, "five", "5";
    Six = 0x16, "six", "6";
    Seven = 0x1A, "seven", "7";
    Eight = 0x1C, "eight", "8";
    Nine = 0x19, "nine", "9";
    Zero = 0x1D, "zero", "0";

    // Punctuation
    Minus = 0x1B, "minus", "-";
    Equal = 0x18, "equal", "=";
    LeftBracket = 0x21, "left_bracket", "[";
    RightBracket = 0x1E, "right_bracket", "]";
    Backslash = 0x2A, "backslash", "\\";
    Semicolon = 0x29, "semicolon", ";";
    Quote = 0x27, "quote", "'";
    Comma = 0x2B, "comma", ",";
    Period = 0x2F, "period", ".";
    Slash = 0x2C, "slash", "/";
    Grave = 0x32, "grave", "`";

    // Special
    CapsLock = 0x39, "caps_lock", "⇪";
    Tab = 0x30, "tab", "⇥";
    Space = 0x31, "space", "Space";
    Return = 0x24, "return", "⏎";
    Delete = 0x33, "delete", "⌫";
    Escape = 0x35, "escape", "⎋";
    ForwardDelete = 0x75, "forward_delete", "⌦";
    F18 = 0x4F, "f18", "F18";

    // Arrows
    LeftArrow = 0x7B, "left_arrow", "←";
    RightArrow = 0x7C, "right_arrow", "→";
    DownArrow = 0x7D, "down_arrow", "↓";
    UpArrow = 0x7E, "up_arrow", "↑";

    // Function row
    F1 = 0x7A, "f1", "F1";
    F2 = 0x78, "f2", "F2";
    F3 = 0x63, "f3", "F3";
    F4 = 0x76, "f4", "F4";
    F5 = 0x60, "f5", "F5";
    F6 = 0x61, "f6", "F6";
    F7 = 0x62, "f7", "F7";
    F8 = 0x64, "f8", "F8";
    F9 = 0x65, "f9", "F9";
    F10 = 0x6D, "f10", "F10";
    F11 = 0x67, "f11", "F11";
    F12 = 0x6F, "f12", "F12";
}

impl KeyCode {
    /// Raw macOS virtual key code
    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Whether Hyper+this key may carry a binding.
    ///
    /// Escape stays free so a held Hyper key can always be backed out of.
    pub fn is_bindable(self) -> bool {
        !matches!(self, KeyCode::Escape)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

impl FromStr for KeyCode {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        KeyCode::ALL
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ParseKeyError(s.to_string()))
    }
}

impl Serialize for KeyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for KeyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_raw_lookup_is_bijective() {
        let mut seen = HashSet::new();
        for key in KeyCode::ALL {
            assert!(seen.insert(key.raw()), "duplicate raw code for {key:?}");
            assert_eq!(KeyCode::from_raw(key.raw()), Some(*key));
        }
        assert_eq!(KeyCode::ALL.len(), 71);
    }

    #[test]
    fn test_unknown_raw_code() {
        // 0x0A is the ISO section key, deliberately absent from the table
        assert_eq!(KeyCode::from_raw(0x0A), None);
        assert_eq!(KeyCode::from_raw(0xFFFF), None);
    }

    #[test]
    fn test_known_virtual_codes() {
        assert_eq!(KeyCode::Tab.raw(), 48);
        assert_eq!(KeyCode::CapsLock.raw(), 57);
        assert_eq!(KeyCode::F18.raw(), 79);
        assert_eq!(KeyCode::from_raw(0x7E), Some(KeyCode::UpArrow));
    }

    #[test]
    fn test_bindable() {
        assert!(!KeyCode::Escape.is_bindable());
        assert!(KeyCode::H.is_bindable());
        assert!(KeyCode::F12.is_bindable());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("caps_lock".parse::<KeyCode>(), Ok(KeyCode::CapsLock));
        assert_eq!(" Tab ".parse::<KeyCode>(), Ok(KeyCode::Tab));
        assert_eq!(
            "hyper".parse::<KeyCode>(),
            Err(ParseKeyError("hyper".to_string()))
        );
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(KeyCode::Return.to_string(), "⏎");
        assert_eq!(KeyCode::Seven.to_string(), "7");
    }

    #[test]
    fn test_serde_uses_stable_name() {
        let json = serde_json::to_string(&KeyCode::LeftBracket).unwrap();
        assert_eq!(json, r#""left_bracket""#);
        let key: KeyCode = serde_json::from_str(r#""f18""#).unwrap();
        assert_eq!(key, KeyCode::F18);
        assert!(serde_json::from_str::<KeyCode>(r#""nope""#).is_err());
    }
}
