use std::fmt;
use std::sync::Arc;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Characters stripped during symbol normalization, so `BTC/USD`,
/// `btc-usd` and `BTC_USD` all canonicalize to `BTCUSD`.
const SEPARATORS: [char; 6] = ['/', '-', '_', ':', '.', ' '];

/// Crypto base currencies recognized by the classifier.
const CRYPTO_BASES: [&str; 8] = ["BTC", "ETH", "SOL", "XRP", "LTC", "BNB", "ADA", "DOGE"];

/// Precious metal bases (ISO 4217 X-codes).
const METAL_BASES: [&str; 4] = ["XAU", "XAG", "XPT", "XPD"];

/// Broad asset classification used for provider coverage routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Fx,
    Crypto,
    Metal,
}

/// A canonical instrument symbol: uppercase ASCII alphanumerics,
/// separator-free, non-empty.
///
/// The canonical form is the only form that crosses module boundaries;
/// providers translate to their upstream spellings internally.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Normalizes a raw user- or config-supplied string into a canonical
    /// symbol. Returns `None` when nothing remains after stripping, or
    /// when anything other than ASCII alphanumerics survives it.
    pub fn new(raw: &str) -> Option<Self> {
        let canonical: String = raw
            .trim()
            .chars()
            .filter(|c| !SEPARATORS.contains(c))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if canonical.is_empty() || !canonical.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(Arc::from(canonical.as_str())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies a symbol by its leading base currency. Metals take
    /// precedence over the FX default; anything unrecognized is FX.
    pub fn kind(&self) -> SymbolKind {
        let base = &self.0[..self.0.len().min(3)];
        if CRYPTO_BASES.contains(&base) {
            SymbolKind::Crypto
        } else if METAL_BASES.contains(&base) {
            SymbolKind::Metal
        } else {
            SymbolKind::Fx
        }
    }

    /// Splits a six-letter pair into (base, quote). Longer or shorter
    /// symbols have no unambiguous split and return `None`.
    pub fn split_pair(&self) -> Option<(&str, &str)> {
        if self.0.len() == 6 {
            Some((&self.0[..3], &self.0[3..]))
        } else {
            None
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Symbol::new(&raw).ok_or_else(|| D::Error::custom(format!("invalid symbol: {raw:?}")))
    }
}
