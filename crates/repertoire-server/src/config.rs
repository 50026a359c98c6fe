use std::env;
use std::path::PathBuf;
use std::time::Duration;

use repertoire_core::TrainingOptions;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub auto_play_delay_ms: u64,
    pub next_line_delay_ms: u64,
    /// Training sessions idle for longer than this are dropped.
    pub session_idle_ttl_secs: u64,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 8000),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            auto_play_delay_ms: parse_var("AUTO_PLAY_DELAY_MS", 500),
            next_line_delay_ms: parse_var("NEXT_LINE_DELAY_MS", 1200),
            session_idle_ttl_secs: parse_var("SESSION_IDLE_TTL_SECS", 1800),
        }
    }

    pub fn training_options(&self, seed: Option<u64>) -> TrainingOptions {
        TrainingOptions {
            auto_play_delay: Duration::from_millis(self.auto_play_delay_ms),
            next_line_delay: Duration::from_millis(self.next_line_delay_ms),
            seed,
        }
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            data_dir: PathBuf::from("./data"),
            auto_play_delay_ms: 500,
            next_line_delay_ms: 1200,
            session_idle_ttl_secs: 1800,
        }
    }
}
