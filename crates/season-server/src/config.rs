use crate::server::BroadcastSettings;
use clap::Parser;
use std::{net::SocketAddr, time::Duration};

/// `season_server` - Broadcasts a staggered season rotation to terrain viewers.
///
/// The first four clients to connect are tracked and receive one season name
/// per interval; later connections are accepted but never written to.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// TCP address viewers connect to.
    #[arg(long, env = "SEASON_LISTEN_ADDR", default_value_t = SocketAddr::from(([0, 0, 0, 0], seasons::DEFAULT_PORT)))]
    pub listen_addr: SocketAddr,

    /// Milliseconds between broadcast cycles.
    #[arg(long, env = "SEASON_INTERVAL_MS", default_value_t = 10_000)]
    pub interval_ms: u64,

    /// Milliseconds one write may take to flush before it is abandoned.
    #[arg(long, env = "SEASON_WRITE_TIMEOUT_MS", default_value_t = 3_000)]
    pub write_timeout_ms: u64,

    /// Connections past the tracked four that are held open at once.
    ///
    /// Closed peers are pruned; beyond the limit new ones are closed on accept.
    #[arg(long, env = "SEASON_OVERFLOW_LIMIT", default_value_t = 64)]
    pub overflow_limit: usize,

    /// Listen address for the Prometheus `/metrics` endpoint.
    ///
    /// Metrics are still collected but not served when unset.
    #[arg(long, env = "SEASON_METRICS_LISTEN_ADDR")]
    pub metrics_listen_addr: Option<SocketAddr>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval_ms == 0 {
            anyhow::bail!("--interval-ms must be greater than zero");
        }
        if self.write_timeout_ms == 0 {
            anyhow::bail!("--write-timeout-ms must be greater than zero");
        }
        Ok(())
    }

    pub fn settings(&self) -> BroadcastSettings {
        BroadcastSettings {
            interval: Duration::from_millis(self.interval_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            overflow_limit: self.overflow_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_protocol() {
        let config = Config::try_parse_from(["season_server"]).unwrap();
        config.validate().unwrap();
        assert_eq!(config.listen_addr.port(), 9999);
        assert_eq!(config.settings(), BroadcastSettings::default());
        assert!(config.metrics_listen_addr.is_none());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = Config::try_parse_from(["season_server", "--interval-ms", "0"]).unwrap();
        assert!(config.validate().is_err());
    }
}
