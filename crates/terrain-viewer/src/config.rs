use crate::clock::RefreshRate;
use clap::Parser;
use std::{path::PathBuf, time::Duration};

/// `terrain_viewer` - Season-reactive heightmap terrain viewer.
///
/// Opens one window per refresh rate. Every window renders the same terrain
/// at its own pace and follows the season broadcast by `season_server`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Address of the season broadcast server.
    #[arg(long, env = "SEASON_SERVER_ADDR", default_value_t = format!("127.0.0.1:{}", seasons::DEFAULT_PORT))]
    pub server_addr: String,

    /// Directory holding `heightmap-1.png` to `heightmap-3.png`.
    #[arg(long, env = "HEIGHTMAP_DIR", default_value = "assets")]
    pub heightmap_dir: PathBuf,

    /// Initial refresh rate of each window, one window per entry.
    ///
    /// Values are clamped to 1..=120 ticks per second.
    #[arg(long, value_delimiter = ',', default_values_t = [1u32, 10, 100, 120])]
    pub refresh_rates: Vec<u32>,

    /// Share zoom, rotation and render mode between all windows.
    #[arg(long)]
    pub share_camera: bool,

    /// Give up connecting to the season server after this many milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Do not connect to a season server; every window stays at NONE.
    #[arg(long)]
    pub offline: bool,
}

impl Config {
    pub const MAX_WINDOWS: usize = 4;

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_rates.is_empty() || self.refresh_rates.len() > Self::MAX_WINDOWS {
            anyhow::bail!(
                "expected 1 to {} refresh rates, got {}",
                Self::MAX_WINDOWS,
                self.refresh_rates.len()
            );
        }
        Ok(())
    }

    pub fn rates(&self) -> Vec<RefreshRate> {
        self.refresh_rates.iter().copied().map(RefreshRate::new).collect()
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_open_four_windows() {
        let config = Config::try_parse_from(["terrain_viewer"]).unwrap();
        config.validate().unwrap();
        let rates: Vec<_> = config.rates().into_iter().map(RefreshRate::get).collect();
        assert_eq!(rates, vec![1, 10, 100, 120]);
        assert_eq!(config.connect_timeout(), Duration::from_millis(5000));
        assert!(!config.share_camera);
    }

    #[test]
    fn rates_are_clamped_and_window_count_checked() {
        let config =
            Config::try_parse_from(["terrain_viewer", "--refresh-rates", "0,500"]).unwrap();
        let rates: Vec<_> = config.rates().into_iter().map(RefreshRate::get).collect();
        assert_eq!(rates, vec![1, 120]);

        let config =
            Config::try_parse_from(["terrain_viewer", "--refresh-rates", "1,2,3,4,5"]).unwrap();
        assert!(config.validate().is_err());
    }
}
