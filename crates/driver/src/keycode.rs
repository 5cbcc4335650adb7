//! Android key event codes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DriverError;

/// An Android `KeyEvent` code as sent to `press_keycode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeySpec", into = "u32")]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const BACK: KeyCode = KeyCode(4);
    pub const KEY_9: KeyCode = KeyCode(16);
    pub const DPAD_CENTER: KeyCode = KeyCode(23);
    pub const TAB: KeyCode = KeyCode(61);
    pub const ENTER: KeyCode = KeyCode(66);
    pub const DEL: KeyCode = KeyCode(67);
    pub const ESCAPE: KeyCode = KeyCode(111);

    const NAMED: &'static [(&'static str, KeyCode)] = &[
        ("back", KeyCode::BACK),
        ("9", KeyCode::KEY_9),
        ("dpad_center", KeyCode::DPAD_CENTER),
        ("tab", KeyCode::TAB),
        ("enter", KeyCode::ENTER),
        ("del", KeyCode::DEL),
        ("delete", KeyCode::DEL),
        ("backspace", KeyCode::DEL),
        ("escape", KeyCode::ESCAPE),
        ("esc", KeyCode::ESCAPE),
    ];

    pub fn name(&self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, code)| code == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for KeyCode {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u32>() {
            return Ok(KeyCode(code));
        }
        let lower = s.to_ascii_lowercase();
        let lower = lower.strip_prefix("keycode_").unwrap_or(&lower);
        Self::NAMED
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, code)| *code)
            .ok_or_else(|| DriverError::InvalidKeyCode(s.to_string()))
    }
}

impl From<KeyCode> for u32 {
    fn from(code: KeyCode) -> u32 {
        code.0
    }
}

/// Accepts `4` or `"back"` in flow files
#[derive(Deserialize)]
#[serde(untagged)]
enum KeySpec {
    Code(u32),
    Name(String),
}

impl TryFrom<KeySpec> for KeyCode {
    type Error = DriverError;

    fn try_from(spec: KeySpec) -> Result<Self, Self::Error> {
        match spec {
            KeySpec::Code(code) => Ok(KeyCode(code)),
            KeySpec::Name(name) => name.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("back", 4)]
    #[test_case("BACK", 4)]
    #[test_case("KEYCODE_DEL", 67)]
    #[test_case("dpad_center", 23)]
    #[test_case("esc", 111)]
    #[test_case("16", 16)]
    fn parses_names_and_numbers(input: &str, code: u32) {
        assert_eq!(input.parse::<KeyCode>().unwrap(), KeyCode(code));
    }

    #[test]
    fn rejects_unknown_name() {
        assert!("volume_up_please".parse::<KeyCode>().is_err());
    }

    #[test]
    fn deserializes_number_or_name() {
        let codes: Vec<KeyCode> = serde_json::from_str(r#"[4, "del", "enter"]"#).unwrap();
        assert_eq!(codes, vec![KeyCode::BACK, KeyCode::DEL, KeyCode::ENTER]);
    }

    #[test]
    fn display_includes_name() {
        assert_eq!(KeyCode::DEL.to_string(), "del(67)");
        assert_eq!(KeyCode(999).to_string(), "999");
    }
}
