//! Device type enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of client device behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Browser client.
    Web,
    /// Mobile app.
    Mobile,
    /// Desktop app.
    Desktop,
}

impl DeviceType {
    /// Return the device type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = khidma_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "mobile" => Ok(Self::Mobile),
            "desktop" => Ok(Self::Desktop),
            _ => Err(khidma_core::AppError::validation(format!(
                "Invalid device type: '{s}'. Expected one of: web, mobile, desktop"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trip() {
        for d in [DeviceType::Web, DeviceType::Mobile, DeviceType::Desktop] {
            assert_eq!(d.as_str().parse::<DeviceType>().unwrap(), d);
        }
    }

    #[test]
    fn parse_unknown_errors() {
        assert!("toaster".parse::<DeviceType>().is_err());
    }
}
