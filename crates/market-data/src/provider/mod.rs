mod traits;

pub mod alpha_vantage;
pub mod binance;
pub mod exchange_rate;
pub mod yahoo;

pub use traits::QuoteProvider;
