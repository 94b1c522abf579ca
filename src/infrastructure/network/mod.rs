mod channel_source;
mod http_probe;

pub use channel_source::ChannelConnectivitySource;
pub use http_probe::HttpLatencyProbe;
