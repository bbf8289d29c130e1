//! Server configuration from flags and environment variables

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::time::Duration;

use crate::sync::SyncLimits;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_OUTBOUND_QUEUE: usize = 256;
const DEFAULT_MAX_CONTENT_BYTES: usize = 1024 * 1024;
const DEFAULT_EDIT_RATE_PER_SEC: u32 = 20;
const DEFAULT_EDIT_BURST: u32 = 40;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Parser, Debug, Clone)]
#[command(name = "livepaste")]
#[command(about = "livepaste server - real-time shared pastes keyed by passphrase")]
#[command(version)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "LIVEPASTE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "LIVEPASTE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Messages buffered per client before a slow client is dropped
    #[arg(
        long,
        env = "LIVEPASTE_OUTBOUND_QUEUE",
        default_value_t = DEFAULT_OUTBOUND_QUEUE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub outbound_queue: usize,

    /// Largest paste accepted, in bytes
    #[arg(long, env = "LIVEPASTE_MAX_CONTENT_BYTES", default_value_t = DEFAULT_MAX_CONTENT_BYTES)]
    pub max_content_bytes: usize,

    /// Sustained edits per second per client (0 = unlimited)
    #[arg(long, env = "LIVEPASTE_EDIT_RATE_PER_SEC", default_value_t = DEFAULT_EDIT_RATE_PER_SEC)]
    pub edit_rate_per_sec: u32,

    /// Edits a client may send in a burst
    #[arg(long, env = "LIVEPASTE_EDIT_BURST", default_value_t = DEFAULT_EDIT_BURST)]
    pub edit_burst: u32,

    /// Close clients that send nothing for this many seconds
    #[arg(
        long,
        env = "LIVEPASTE_IDLE_TIMEOUT_SECS",
        default_value_t = DEFAULT_IDLE_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub idle_timeout_secs: u64,
}

impl Config {
    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn limits(&self) -> SyncLimits {
        SyncLimits {
            outbound_queue: self.outbound_queue,
            max_content_bytes: self.max_content_bytes,
            edit_rate_per_sec: self.edit_rate_per_sec,
            edit_burst: self.edit_burst,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            edit_rate_per_sec: DEFAULT_EDIT_RATE_PER_SEC,
            edit_burst: DEFAULT_EDIT_BURST,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_limits_default() {
        assert_eq!(Config::default().limits(), SyncLimits::default());
    }

    #[test]
    fn test_server_address() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..Config::default()
        };
        assert_eq!(config.server_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::try_parse_from([
            "livepaste",
            "--port",
            "9001",
            "--max-content-bytes",
            "64",
            "--edit-rate-per-sec",
            "0",
            "--idle-timeout-secs",
            "5",
        ])
        .unwrap();

        assert_eq!(config.port, 9001);
        let limits = config.limits();
        assert_eq!(limits.max_content_bytes, 64);
        assert_eq!(limits.edit_rate_per_sec, 0);
        assert_eq!(limits.idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Config::try_parse_from(["livepaste", "--port", "not-a-port"]).is_err());
    }

    #[test]
    fn test_parse_rejects_zero_idle_timeout() {
        assert!(Config::try_parse_from(["livepaste", "--idle-timeout-secs", "0"]).is_err());
        let config = Config::try_parse_from(["livepaste", "--idle-timeout-secs", "1"]).unwrap();
        assert_eq!(config.limits().idle_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_rejects_zero_outbound_queue() {
        assert!(Config::try_parse_from(["livepaste", "--outbound-queue", "0"]).is_err());
        let config = Config::try_parse_from(["livepaste", "--outbound-queue", "8"]).unwrap();
        assert_eq!(config.outbound_queue, 8);
    }
}
