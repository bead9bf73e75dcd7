//! Domain primitives: Ticker.

use serde::{Deserialize, Serialize};

/// Equity ticker symbol (e.g., "AAPL", "BRK.B").
///
/// Normalized to uppercase on construction; the ledger keys positions,
/// history rows, and quotes by this value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    /// Create a Ticker, uppercasing the symbol.
    pub fn new(symbol: &str) -> Self {
        Ticker(symbol.trim().to_uppercase())
    }

    /// Get the ticker as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_uppercased() {
        assert_eq!(Ticker::new("aapl").as_str(), "AAPL");
        assert_eq!(Ticker::new(" msft ").as_str(), "MSFT");
    }

    #[test]
    fn test_ticker_preserves_class_suffix() {
        assert_eq!(Ticker::new("brk.b").as_str(), "BRK.B");
    }

    #[test]
    fn test_ticker_display() {
        assert_eq!(Ticker::new("NVDA").to_string(), "NVDA");
    }
}
