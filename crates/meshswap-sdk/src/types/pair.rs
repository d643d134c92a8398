use std::fmt;

/// `"BASE/QUOTE"` identifier for a market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(String);

impl PairId {
    pub fn new(base: &str, quote: &str) -> Self {
        Self(format!("{base}/{quote}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    pub fn quote(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PairId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub id: PairId,
    pub base_symbol: String,
    pub quote_symbol: String,
}

impl Pair {
    pub fn new(base_symbol: impl Into<String>, quote_symbol: impl Into<String>) -> Self {
        let base_symbol = base_symbol.into();
        let quote_symbol = quote_symbol.into();
        let id = PairId::new(&base_symbol, &quote_symbol);
        Self {
            id,
            base_symbol,
            quote_symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_id_splits_base_and_quote() {
        let id = PairId::new("BTC", "ETH");
        assert_eq!(id.as_str(), "BTC/ETH");
        assert_eq!(id.base(), "BTC");
        assert_eq!(id.quote(), "ETH");
    }
}
