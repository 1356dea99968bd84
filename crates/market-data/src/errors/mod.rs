use thiserror::Error;

/// Errors surfaced by market data providers and the fallback chain.
///
/// Providers map upstream failures into these variants at the HTTP
/// boundary; callers above the chain rarely see anything other than
/// [`MarketDataError::AllProvidersEmpty`], because the chain absorbs
/// individual provider failures and moves on to the next source.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Rate limit exceeded for provider: {provider}")]
    RateLimited { provider: String },

    #[error("Request timed out for provider: {provider}")]
    Timeout { provider: String },

    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("No provider returned any quotes")]
    AllProvidersEmpty,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
