mod quote;
mod symbol;

pub use quote::Quote;
pub use symbol::{Symbol, SymbolKind};
