// Configuration - command line flags with environment fallbacks

use std::path::PathBuf;

use clap::{Args, Parser};
use chrono::{FixedOffset, Offset, Utc};

use crate::clock::SystemClock;

/// Where expenses live and which calendar zone month math uses
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// SQLite database file
    #[arg(long, env = "SPEND_DB_PATH", default_value = "expenses.db")]
    pub db: PathBuf,

    /// UTC offset used for month boundaries and day-of-month, e.g. +02:00
    #[arg(
        long = "tz-offset",
        env = "SPEND_TZ_OFFSET",
        default_value = "+00:00",
        value_parser = parse_offset,
        allow_hyphen_values = true
    )]
    pub tz_offset: FixedOffset,
}

impl StoreArgs {
    pub fn clock(&self) -> SystemClock {
        SystemClock::new(self.tz_offset)
    }
}

/// REST server settings
#[derive(Debug, Clone, Parser)]
#[command(name = "forecast-server", about = "Expense forecast REST API")]
pub struct ServerConfig {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Listen address
    #[arg(long, env = "SPEND_ADDR", default_value = "0.0.0.0:3000")]
    pub addr: String,
}

/// Parse `Z`, `UTC`, or anything chrono reads as an offset (`+HH:MM`, `-HHMM`)
pub fn parse_offset(raw: &str) -> Result<FixedOffset, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    raw.parse::<FixedOffset>()
        .map_err(|e| format!("invalid UTC offset '{}', expected +HH:MM: {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("+00:00").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_offset("-0800").unwrap().local_minus_utc(), -28800);
        assert!(parse_offset("05:30").is_err());
        assert_eq!(parse_offset("utc").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("+5").is_err());
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::try_parse_from(["forecast-server"]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3000");
        assert_eq!(config.store.tz_offset.local_minus_utc(), 0);
    }

    #[test]
    fn test_server_flags() {
        let config = ServerConfig::try_parse_from([
            "forecast-server",
            "--db",
            "/tmp/x.db",
            "--tz-offset",
            "-03:00",
            "--addr",
            "127.0.0.1:8080",
        ])
        .unwrap();

        assert_eq!(config.store.db, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.store.tz_offset.local_minus_utc(), -10800);
        assert_eq!(config.addr, "127.0.0.1:8080");
    }
}
