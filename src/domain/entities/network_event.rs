use super::NetworkQuality;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkEventKind {
    Connected,
    Disconnected,
    TypeChanged,
    QualityChanged,
}

impl NetworkEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            NetworkEventKind::Connected => "connected",
            NetworkEventKind::Disconnected => "disconnected",
            NetworkEventKind::TypeChanged => "type_changed",
            NetworkEventKind::QualityChanged => "quality_changed",
        }
    }
}

/// One transition in the connectivity history.
/// `duration_ms` is populated only on `Connected` events and measures the
/// offline period that just ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: NetworkEventKind,
    pub previous: Option<NetworkQuality>,
    pub current: NetworkQuality,
    pub duration_ms: Option<u64>,
}
