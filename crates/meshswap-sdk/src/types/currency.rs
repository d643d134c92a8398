pub use meshswap_store::SwapClientKind;

/// Immutable once added.
#[derive(Debug, Clone, PartialEq)]
pub struct Currency {
    pub symbol: String,
    pub decimal_places: u8,
    pub swap_client: SwapClientKind,
    pub token_address: Option<String>,
}

impl Currency {
    pub fn new(symbol: impl Into<String>, decimal_places: u8, swap_client: SwapClientKind) -> Self {
        Self {
            symbol: symbol.into(),
            decimal_places,
            swap_client,
            token_address: None,
        }
    }
}
