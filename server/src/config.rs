use shared::InputScheme;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4242;
pub const DEFAULT_MAX_CLIENTS: usize = 2;
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);
pub const DEFAULT_LINGER_TICKS: u32 = 20;

/// Frames a client may have queued beyond one full map transfer.
const OUTBOUND_HEADROOM: usize = 64;

/// Runtime settings of one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_clients: usize,
    /// Wall-clock period of one simulation tick.
    pub tick_duration: Duration,
    /// Ticks of frozen snapshots sent after the round ends, before closing.
    pub linger_ticks: u32,
    pub input_scheme: InputScheme,
    /// Mirrors simulation events to clients as `DEBUG_INFO`.
    pub debug: bool,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Outbound queue size for a map with `cols` columns.
    ///
    /// A launching round queues every map chunk at once, so the queue must
    /// hold all of them plus regular traffic.
    pub fn outbound_capacity(&self, cols: usize) -> usize {
        OUTBOUND_HEADROOM + cols
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            tick_duration: DEFAULT_TICK,
            linger_ticks: DEFAULT_LINGER_TICKS,
            input_scheme: InputScheme::Bitmask,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:4242");
        assert_eq!(config.max_clients, 2);
        assert_eq!(config.tick_duration, Duration::from_millis(50));
        assert_eq!(config.linger_ticks, 20);
        assert_eq!(config.input_scheme, InputScheme::Bitmask);
        assert!(!config.debug);
    }

    #[test]
    fn test_outbound_capacity_fits_map() {
        let config = ServerConfig::default();
        assert!(config.outbound_capacity(500) > 500);
    }
}
