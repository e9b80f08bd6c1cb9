// ── WPS and Wi-Fi Display types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::StatusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WpsProvisionMethod {
    Pbc,
    Display,
    Keypad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MiracastMode {
    Disabled,
    Source,
    Sink,
}

impl MiracastMode {
    /// Private driver command selecting this mode.
    pub fn driver_command(self) -> String {
        let mode = match self {
            Self::Disabled => 0,
            Self::Source => 1,
            Self::Sink => 2,
        };
        format!("MIRACAST {mode}")
    }
}

/// 8-byte WPS primary device type (category, OUI, sub-category).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WpsDeviceType([u8; 8]);

impl WpsDeviceType {
    pub fn octets(&self) -> [u8; 8] {
        self.0
    }
}

impl TryFrom<&[u8]> for WpsDeviceType {
    type Error = StatusError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| StatusError::args(format!("device type must be 8 bytes, got {}", bytes.len())))
    }
}

/// WPS device-info attribute staged into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceInfo {
    Name(String),
    DeviceType(WpsDeviceType),
    Manufacturer(String),
    ModelName(String),
    ModelNumber(String),
    SerialNumber(String),
    ConfigMethods(u16),
}

/// Wi-Fi Display subelement identifiers.
pub mod wfd_subelement {
    pub const DEVICE_INFO: u8 = 0;
    pub const R2_DEVICE_INFO: u8 = 11;
    /// Fixed length prefix of the device-info subelement body.
    pub const DEVICE_INFO_LEN_HEX: &str = "0006";
    pub const DEVICE_INFO_LEN: usize = 6;
}

/// Render a WPS PIN the way peers expect it: 8 digits, zero padded.
pub fn format_pin(pin: u32) -> String {
    format!("{pin:08}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miracast_commands() {
        assert_eq!(MiracastMode::Disabled.driver_command(), "MIRACAST 0");
        assert_eq!(MiracastMode::Source.driver_command(), "MIRACAST 1");
        assert_eq!(MiracastMode::Sink.driver_command(), "MIRACAST 2");
    }

    #[test]
    fn pins_are_zero_padded() {
        assert_eq!(format_pin(1234), "00001234");
        assert_eq!(format_pin(12_345_670), "12345670");
    }

    #[test]
    fn device_type_length() {
        assert!(WpsDeviceType::try_from([0u8; 8].as_slice()).is_ok());
        assert!(WpsDeviceType::try_from([0u8; 7].as_slice()).is_err());
        assert!(WpsDeviceType::try_from([0u8; 9].as_slice()).is_err());
    }
}
