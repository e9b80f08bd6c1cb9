// ── Group credentials ──
//
// SSID and WPA passphrase newtypes. Construction is the validation
// point: a value of either type is always within protocol bounds.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::error::StatusError;

pub const SSID_MAX_LEN: usize = 32;
pub const PASSPHRASE_MIN_LEN: usize = 8;
pub const PASSPHRASE_MAX_LEN: usize = 63;

// ── Ssid ────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ssid(Vec<u8>);

impl Ssid {
    /// Accepts 1..=32 raw bytes. SSIDs are octet strings, not text.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, StatusError> {
        let bytes = bytes.into();
        if bytes.is_empty() || bytes.len() > SSID_MAX_LEN {
            return Err(StatusError::args("SSID is invalid."));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Printable rendering, escaping non-printable octets.
    pub fn to_text(&self) -> String {
        self.0
            .iter()
            .flat_map(|b| std::ascii::escape_default(*b))
            .map(char::from)
            .collect()
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ssid(\"{self}\")")
    }
}

// ── Passphrase ──────────────────────────────────────────────────────

/// WPA2 passphrase: 8..=63 bytes with no ASCII control characters.
#[derive(Clone)]
pub struct Passphrase(SecretString);

impl Passphrase {
    pub fn new(raw: &str) -> Result<Self, StatusError> {
        let len = raw.len();
        if !(PASSPHRASE_MIN_LEN..=PASSPHRASE_MAX_LEN).contains(&len) || has_ctrl_char(raw) {
            return Err(StatusError::args("Passphrase is invalid."));
        }
        Ok(Self(SecretString::from(raw.to_owned())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl PartialEq for Passphrase {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Passphrase {}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(****)")
    }
}

fn has_ctrl_char(s: &str) -> bool {
    s.bytes().any(|b| b < 0x20 || b == 0x7f)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::StatusCode;

    #[test]
    fn ssid_bounds() {
        assert!(Ssid::new(b"MyNet".to_vec()).is_ok());
        assert!(Ssid::new(vec![b'a'; SSID_MAX_LEN]).is_ok());
        assert_eq!(
            Ssid::new(Vec::new()).unwrap_err().code(),
            StatusCode::FailureArgsInvalid
        );
        assert_eq!(
            Ssid::new(vec![b'a'; SSID_MAX_LEN + 1]).unwrap_err().code(),
            StatusCode::FailureArgsInvalid
        );
    }

    #[test]
    fn ssid_text_escapes_binary() {
        let ssid = Ssid::new(vec![b'D', b'I', b'R', b'E', b'C', b'T', 0x01]).unwrap();
        assert_eq!(ssid.to_text(), "DIRECT\\x01");
    }

    #[test]
    fn passphrase_length_window() {
        assert!(Passphrase::new("12345678").is_ok());
        assert!(Passphrase::new(&"a".repeat(PASSPHRASE_MAX_LEN)).is_ok());
        assert!(Passphrase::new("1234567").is_err());
        assert!(Passphrase::new(&"a".repeat(PASSPHRASE_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn passphrase_rejects_control_characters_at_any_length() {
        assert!(Passphrase::new("1234\n5678").is_err());
        assert!(Passphrase::new("abcdefgh\u{7f}").is_err());
        assert!(Passphrase::new("\t").is_err());
    }

    #[test]
    fn passphrase_debug_is_redacted() {
        let p = Passphrase::new("supersecret").unwrap();
        assert!(!format!("{p:?}").contains("supersecret"));
    }
}
