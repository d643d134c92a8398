use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use meshswap_store::{CurrencyRecord, SwapClientKind};

use super::client::{ChannelBalance, SwapClient};
use super::hashlock::HashlockTransferSwapClient;
use super::htlc::HtlcSwapClient;

/// Owns one `SwapClient` per currency. `init` instantiates a
/// client per currency's configured backend; `get` is the dispatch
/// primitive the rest of the system uses.
pub struct SwapClientManager {
    clients: RwLock<HashMap<String, Arc<dyn SwapClient>>>,
}

impl SwapClientManager {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn init(&self, currencies: &[CurrencyRecord]) {
        let mut clients = self.clients.write();
        for currency in currencies {
            let client: Arc<dyn SwapClient> = match currency.swap_client {
                SwapClientKind::Htlc => {
                    Arc::new(HtlcSwapClient::new(&currency.symbol, ChannelBalance::default()))
                }
                SwapClientKind::HashlockTransfer => Arc::new(HashlockTransferSwapClient::new(
                    &currency.symbol,
                    ChannelBalance::default(),
                )),
            };
            clients.insert(currency.symbol.clone(), client);
        }
    }

    pub fn get(&self, currency: &str) -> Option<Arc<dyn SwapClient>> {
        self.clients.read().get(currency).cloned()
    }

    pub fn register(&self, currency: impl Into<String>, client: Arc<dyn SwapClient>) {
        self.clients.write().insert(currency.into(), client);
    }
}

impl Default for SwapClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_instantiates_a_client_per_currency_backend() {
        let manager = SwapClientManager::new();
        manager.init(&[
            CurrencyRecord {
                symbol: "BTC".into(),
                decimal_places: 8,
                swap_client: SwapClientKind::Htlc,
                token_address: None,
            },
            CurrencyRecord {
                symbol: "LTC".into(),
                decimal_places: 8,
                swap_client: SwapClientKind::HashlockTransfer,
                token_address: None,
            },
        ]);
        assert!(manager.get("BTC").is_some());
        assert!(manager.get("LTC").is_some());
        assert!(manager.get("ETH").is_none());
    }
}
