// ── Hardware addresses ──
//
// `MacAddr` is the validated 6-byte form used everywhere inside the
// crate. `RawAddr` is what arrives over IPC: an arbitrary-length byte
// string that must be checked before it can become a `MacAddr`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::StatusError;

pub const ETH_ALEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hardware address '{input}'")]
pub struct AddrParseError {
    input: String,
}

// ── MacAddr ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr([u8; ETH_ALEN]);

impl MacAddr {
    pub const ZERO: Self = Self([0; ETH_ALEN]);

    /// Wildcard group-owner address: matches any BSSID during a join.
    pub const ANY: Self = Self([0x02, 0, 0, 0, 0, 0]);

    pub const fn new(octets: [u8; ETH_ALEN]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; ETH_ALEN] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    /// Bare lowercase hex, used to build object paths.
    pub fn to_compact_hex(&self) -> String {
        super::hex::encode(&self.0)
    }
}

impl TryFrom<&[u8]> for MacAddr {
    type Error = StatusError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let octets: [u8; ETH_ALEN] = bytes.try_into().map_err(|_| {
            StatusError::args(format!(
                "hardware address must be {ETH_ALEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl FromStr for MacAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawAddr = s.parse()?;
        Self::try_from(raw.as_bytes()).map_err(|_| AddrParseError { input: s.into() })
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── RawAddr ─────────────────────────────────────────────────────────

/// Unvalidated address bytes as received from a caller.
///
/// Parses from `aa:bb:cc`-style text of any length (dash separators are
/// accepted too), so that malformed lengths survive long enough to be
/// rejected with `FAILURE_ARGS_INVALID` by the operation itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawAddr(Vec<u8>);

impl RawAddr {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Validate into a `MacAddr`.
    pub fn to_mac(&self) -> Result<MacAddr, StatusError> {
        MacAddr::try_from(self.0.as_slice())
    }
}

impl From<MacAddr> for RawAddr {
    fn from(mac: MacAddr) -> Self {
        Self(mac.octets().to_vec())
    }
}

impl FromStr for RawAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        s.split([':', '-'])
            .map(|part| {
                if part.len() == 2 {
                    u8::from_str_radix(part, 16).ok()
                } else {
                    None
                }
            })
            .collect::<Option<Vec<u8>>>()
            .map(Self)
            .ok_or_else(|| AddrParseError { input: s.into() })
    }
}

impl fmt::Display for RawAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{b:02x}")).collect();
        f.write_str(&parts.join(":"))
    }
}

impl Serialize for RawAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RawAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::StatusCode;

    #[test]
    fn mac_display_is_lowercase_colon_separated() {
        let mac = MacAddr::new([0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
        assert_eq!(mac.to_string(), "00:11:22:aa:bb:cc");
        assert_eq!(mac.to_compact_hex(), "001122aabbcc");
    }

    #[test]
    fn mac_from_str_accepts_dashes_and_case() {
        let mac: MacAddr = "00-11-22-AA-BB-CC".parse().unwrap();
        assert_eq!(mac, MacAddr::new([0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn any_sentinel() {
        let mac: MacAddr = "02:00:00:00:00:00".parse().unwrap();
        assert!(mac.is_any());
        assert!(!mac.is_zero());
    }

    #[test]
    fn raw_addr_keeps_wrong_lengths() {
        let raw: RawAddr = "00:11:22:33:44".parse().unwrap();
        assert_eq!(raw.as_bytes().len(), 5);
        assert_eq!(raw.to_mac().unwrap_err().code(), StatusCode::FailureArgsInvalid);

        let raw: RawAddr = "00:11:22:33:44:55:66".parse().unwrap();
        assert_eq!(raw.to_mac().unwrap_err().code(), StatusCode::FailureArgsInvalid);

        let raw: RawAddr = "".parse().unwrap();
        assert!(raw.to_mac().is_err());
    }

    #[test]
    fn raw_addr_rejects_garbage() {
        assert!("zz:11".parse::<RawAddr>().is_err());
        assert!("001122334455".parse::<RawAddr>().is_err());
    }

    #[test]
    fn mac_serde_as_string() {
        let mac = MacAddr::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"00:11:22:33:44:55\"");
        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }
}
