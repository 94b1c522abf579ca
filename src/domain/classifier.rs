use crate::domain::entities::{NetworkQuality, RawConnectivityState};
use crate::domain::value_objects::{
    CellularGeneration, ConnectionSpeed, ConnectionType, SignalStrength,
};

/// Map a raw platform connectivity payload into a normalized quality
/// snapshot. Pure; measured fields (`speed`, `latency_ms`) stay unknown
/// until a connection test fills them in.
pub fn classify(raw: &RawConnectivityState) -> NetworkQuality {
    NetworkQuality {
        connection_type: raw.connection_type,
        is_connected: raw.is_connected,
        is_internet_reachable: raw.is_internet_reachable,
        strength: classify_strength(raw),
        speed: ConnectionSpeed::Unknown,
        latency_ms: None,
        bandwidth_kbps: raw
            .details
            .link_speed_mbps
            .map(|mbps| u64::from(mbps) * 1000),
    }
}

fn classify_strength(raw: &RawConnectivityState) -> SignalStrength {
    match raw.connection_type {
        ConnectionType::Wifi => match raw.details.wifi_signal_percent {
            Some(percent) if percent >= 80 => SignalStrength::Excellent,
            Some(percent) if percent >= 60 => SignalStrength::Good,
            Some(percent) if percent >= 40 => SignalStrength::Fair,
            Some(percent) if percent >= 20 => SignalStrength::Poor,
            _ => SignalStrength::Unknown,
        },
        ConnectionType::Cellular => match raw.details.cellular_generation {
            Some(CellularGeneration::G5) => SignalStrength::Excellent,
            Some(CellularGeneration::G4) => SignalStrength::Good,
            Some(CellularGeneration::G3) => SignalStrength::Fair,
            Some(CellularGeneration::G2) => SignalStrength::Poor,
            None => SignalStrength::Unknown,
        },
        _ => SignalStrength::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_strength_thresholds() {
        let cases = [
            (95, SignalStrength::Excellent),
            (80, SignalStrength::Excellent),
            (79, SignalStrength::Good),
            (60, SignalStrength::Good),
            (45, SignalStrength::Fair),
            (25, SignalStrength::Poor),
            (10, SignalStrength::Unknown),
        ];

        for (percent, expected) in cases {
            let quality = classify(&RawConnectivityState::wifi(percent));
            assert_eq!(quality.strength, expected, "signal {percent}%");
        }
    }

    #[test]
    fn cellular_generation_maps_directly() {
        let cases = [
            (CellularGeneration::G5, SignalStrength::Excellent),
            (CellularGeneration::G4, SignalStrength::Good),
            (CellularGeneration::G3, SignalStrength::Fair),
            (CellularGeneration::G2, SignalStrength::Poor),
        ];

        for (generation, expected) in cases {
            let quality = classify(&RawConnectivityState::cellular(generation));
            assert_eq!(quality.strength, expected);
        }
    }

    #[test]
    fn ethernet_yields_unknown_strength() {
        let raw = RawConnectivityState {
            connection_type: ConnectionType::Ethernet,
            is_connected: true,
            is_internet_reachable: true,
            details: Default::default(),
        };
        let quality = classify(&raw);
        assert_eq!(quality.strength, SignalStrength::Unknown);
        assert!(quality.is_online());
    }

    #[test]
    fn speed_is_never_set_by_classification() {
        let quality = classify(&RawConnectivityState::wifi(90));
        assert_eq!(quality.speed, ConnectionSpeed::Unknown);
        assert_eq!(quality.latency_ms, None);
    }

    #[test]
    fn bandwidth_derived_from_link_speed() {
        let mut raw = RawConnectivityState::wifi(70);
        raw.details.link_speed_mbps = Some(120);
        let quality = classify(&raw);
        assert_eq!(quality.bandwidth_kbps, Some(120_000));
    }
}
