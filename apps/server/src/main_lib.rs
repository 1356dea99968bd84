use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use quotehub_market_data::{
    AlphaVantageProvider, BinanceProvider, ExchangeRateApiProvider, FallbackChain, QuoteHub,
    QuoteProvider, Symbol, YahooProvider,
};

use crate::config::Config;

pub struct AppState {
    pub hub: Arc<QuoteHub>,
    pub chain: Arc<FallbackChain>,
    pub symbols: Vec<Symbol>,
    pub poll_interval: Duration,
    pub poll_disabled: bool,
    pub daily_fetch_only: bool,
    /// UTC date of the last successful fetch, for the daily throttle.
    last_fetch_day: Mutex<Option<NaiveDate>>,
}

impl AppState {
    pub fn new(
        hub: Arc<QuoteHub>,
        chain: Arc<FallbackChain>,
        symbols: Vec<Symbol>,
        poll_interval: Duration,
        poll_disabled: bool,
        daily_fetch_only: bool,
    ) -> Self {
        Self {
            hub,
            chain,
            symbols,
            poll_interval,
            poll_disabled,
            daily_fetch_only,
            last_fetch_day: Mutex::new(None),
        }
    }

    /// Whether the throttle allows an upstream fetch right now.
    pub fn fetch_permitted(&self) -> bool {
        if !self.daily_fetch_only {
            return true;
        }
        let last = self.last_fetch_day.lock().unwrap();
        *last != Some(Utc::now().date_naive())
    }

    /// Record that a fetch succeeded today.
    pub fn record_successful_fetch(&self) {
        let mut last = self.last_fetch_day.lock().unwrap();
        *last = Some(Utc::now().date_naive());
    }

    #[cfg(test)]
    pub fn set_last_fetch_day(&self, day: Option<NaiveDate>) {
        *self.last_fetch_day.lock().unwrap() = day;
    }
}

pub fn init_tracing() {
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

pub fn build_state(config: &Config) -> Arc<AppState> {
    let mut providers: Vec<Arc<dyn QuoteProvider>> = vec![
        Arc::new(YahooProvider::new()),
        Arc::new(BinanceProvider::new()),
        Arc::new(ExchangeRateApiProvider::new(config.enable_metal_approx)),
    ];
    match &config.alpha_vantage_api_key {
        Some(key) => providers.push(Arc::new(AlphaVantageProvider::new(key.clone()))),
        None => tracing::info!("No Alpha Vantage API key configured, adapter skipped"),
    }

    Arc::new(AppState::new(
        Arc::new(QuoteHub::default()),
        Arc::new(FallbackChain::new(providers)),
        config.symbols.clone(),
        config.poll_interval,
        config.poll_disabled,
        config.daily_fetch_only,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn state(daily: bool) -> AppState {
        AppState::new(
            Arc::new(QuoteHub::default()),
            Arc::new(FallbackChain::new(vec![])),
            vec![],
            Duration::from_secs(30),
            false,
            daily,
        )
    }

    #[test]
    fn test_throttle_off_always_permits() {
        let state = state(false);
        state.record_successful_fetch();
        assert!(state.fetch_permitted());
    }

    #[test]
    fn test_daily_throttle_blocks_second_fetch_same_day() {
        let state = state(true);
        assert!(state.fetch_permitted());
        state.record_successful_fetch();
        assert!(!state.fetch_permitted());
    }

    #[test]
    fn test_daily_throttle_resets_on_new_day() {
        let state = state(true);
        let yesterday = Utc::now().date_naive().checked_sub_days(Days::new(1));
        state.set_last_fetch_day(yesterday);
        assert!(state.fetch_permitted());
    }
}
