use crate::domain::value_objects::{
    CellularGeneration, ConnectionSpeed, ConnectionType, SignalStrength,
};
use serde::{Deserialize, Serialize};

/// Normalized connectivity snapshot. Immutable per observation and superseded
/// wholesale on each classifier update; copied to listeners by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkQuality {
    pub connection_type: ConnectionType,
    pub is_connected: bool,
    pub is_internet_reachable: bool,
    pub strength: SignalStrength,
    pub speed: ConnectionSpeed,
    pub latency_ms: Option<u64>,
    pub bandwidth_kbps: Option<u64>,
}

impl NetworkQuality {
    /// "Online enough to flush": both physically connected and able to reach
    /// the internet.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }

    pub fn offline() -> Self {
        Self {
            connection_type: ConnectionType::None,
            is_connected: false,
            is_internet_reachable: false,
            strength: SignalStrength::Unknown,
            speed: ConnectionSpeed::Unknown,
            latency_ms: None,
            bandwidth_kbps: None,
        }
    }
}

/// Raw payload delivered by the platform connectivity API (push on change,
/// pull via `fetch_current`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConnectivityState {
    pub connection_type: ConnectionType,
    pub is_connected: bool,
    pub is_internet_reachable: bool,
    #[serde(default)]
    pub details: RawConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConnectionDetails {
    /// Wifi signal quality as a 0-100 percentage.
    pub wifi_signal_percent: Option<u8>,
    pub cellular_generation: Option<CellularGeneration>,
    pub link_speed_mbps: Option<u32>,
}

impl RawConnectivityState {
    pub fn offline() -> Self {
        Self {
            connection_type: ConnectionType::None,
            is_connected: false,
            is_internet_reachable: false,
            details: RawConnectionDetails::default(),
        }
    }

    pub fn wifi(signal_percent: u8) -> Self {
        Self {
            connection_type: ConnectionType::Wifi,
            is_connected: true,
            is_internet_reachable: true,
            details: RawConnectionDetails {
                wifi_signal_percent: Some(signal_percent),
                cellular_generation: None,
                link_speed_mbps: None,
            },
        }
    }

    pub fn cellular(generation: CellularGeneration) -> Self {
        Self {
            connection_type: ConnectionType::Cellular,
            is_connected: true,
            is_internet_reachable: true,
            details: RawConnectionDetails {
                wifi_signal_percent: None,
                cellular_generation: Some(generation),
                link_speed_mbps: None,
            },
        }
    }
}
