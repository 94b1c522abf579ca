use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    None,
    Unknown,
}

impl ConnectionType {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionType::Wifi => "wifi",
            ConnectionType::Cellular => "cellular",
            ConnectionType::Ethernet => "ethernet",
            ConnectionType::None => "none",
            ConnectionType::Unknown => "unknown",
        }
    }
}

impl From<&str> for ConnectionType {
    fn from(value: &str) -> Self {
        match value {
            "wifi" => ConnectionType::Wifi,
            "cellular" => ConnectionType::Cellular,
            "ethernet" => ConnectionType::Ethernet,
            "none" => ConnectionType::None,
            _ => ConnectionType::Unknown,
        }
    }
}

/// Static transport quality derived from platform signal details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStrength {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl SignalStrength {
    pub fn as_str(&self) -> &str {
        match self {
            SignalStrength::Excellent => "excellent",
            SignalStrength::Good => "good",
            SignalStrength::Fair => "fair",
            SignalStrength::Poor => "poor",
            SignalStrength::Unknown => "unknown",
        }
    }
}

/// Measured link performance; stays `Unknown` until a connection test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionSpeed {
    Fast,
    Medium,
    Slow,
    Unknown,
}

impl ConnectionSpeed {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionSpeed::Fast => "fast",
            ConnectionSpeed::Medium => "medium",
            ConnectionSpeed::Slow => "slow",
            ConnectionSpeed::Unknown => "unknown",
        }
    }

    /// Classify measured round-trip latency.
    pub fn from_latency_ms(latency_ms: u64) -> Self {
        match latency_ms {
            0..=150 => ConnectionSpeed::Fast,
            151..=500 => ConnectionSpeed::Medium,
            _ => ConnectionSpeed::Slow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellularGeneration {
    #[serde(rename = "5g")]
    G5,
    #[serde(rename = "4g")]
    G4,
    #[serde(rename = "3g")]
    G3,
    #[serde(rename = "2g")]
    G2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_classification_thresholds() {
        assert_eq!(ConnectionSpeed::from_latency_ms(80), ConnectionSpeed::Fast);
        assert_eq!(ConnectionSpeed::from_latency_ms(150), ConnectionSpeed::Fast);
        assert_eq!(ConnectionSpeed::from_latency_ms(300), ConnectionSpeed::Medium);
        assert_eq!(ConnectionSpeed::from_latency_ms(900), ConnectionSpeed::Slow);
    }

    #[test]
    fn connection_type_roundtrip() {
        assert_eq!(ConnectionType::from("wifi"), ConnectionType::Wifi);
        assert_eq!(ConnectionType::from("satellite"), ConnectionType::Unknown);
        assert_eq!(ConnectionType::Ethernet.as_str(), "ethernet");
    }
}
