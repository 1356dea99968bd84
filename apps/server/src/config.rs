use std::{net::SocketAddr, time::Duration};

use quotehub_market_data::Symbol;

/// Pairs and tickers tracked when `QH_SYMBOLS` is not set.
const DEFAULT_SYMBOLS: &str = "EURUSD,GBPUSD,USDJPY,AUDUSD,EURGBP,BTCUSD,ETHUSD,XAUUSD";

/// Poll interval defaults: short in development, conservative in
/// production where upstream quotas matter.
const DEFAULT_POLL_SECS_DEBUG: u64 = 30;
const DEFAULT_POLL_SECS_RELEASE: u64 = 300;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub symbols: Vec<Symbol>,
    pub poll_interval: Duration,
    pub poll_disabled: bool,
    /// One-fetch-per-calendar-day throttle for quota-limited operation.
    pub daily_fetch_only: bool,
    /// Absent key means the Alpha Vantage adapter is skipped entirely.
    pub alpha_vantage_api_key: Option<String>,
    pub enable_metal_approx: bool,
    pub cors_allow: Vec<String>,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("QH_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid QH_LISTEN_ADDR");
        let symbols = std::env::var("QH_SYMBOLS")
            .unwrap_or_else(|_| DEFAULT_SYMBOLS.to_string())
            .split(',')
            .filter_map(|s| Symbol::new(s))
            .collect();
        let default_poll = if cfg!(debug_assertions) {
            DEFAULT_POLL_SECS_DEBUG
        } else {
            DEFAULT_POLL_SECS_RELEASE
        };
        let poll_secs: u64 = std::env::var("QH_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_poll);
        let alpha_vantage_api_key = std::env::var("QH_ALPHAVANTAGE_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let cors_allow = std::env::var("QH_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            listen_addr,
            symbols,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            poll_disabled: env_flag("QH_POLL_DISABLED"),
            daily_fetch_only: env_flag("QH_DAILY_FETCH_ONLY"),
            alpha_vantage_api_key,
            enable_metal_approx: env_flag("QH_ENABLE_METAL_APPROX"),
            cors_allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_symbol_universe_parses() {
        let symbols: Vec<Symbol> = DEFAULT_SYMBOLS.split(',').filter_map(Symbol::new).collect();
        assert_eq!(symbols.len(), 8);
        assert!(symbols.iter().any(|s| s.as_str() == "XAUUSD"));
    }
}
