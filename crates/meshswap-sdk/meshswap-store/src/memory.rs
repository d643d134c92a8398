//! In-memory reference store. Good enough for tests and local development;
//! mirrors the shape of a real transactional relational store (one table per
//! record type) without the SQL.

use std::sync::Mutex;

use std::collections::HashMap;

use crate::error::{Result, StoreError};
use crate::traits::{
    CurrencyRecord, CurrencyStore, NodeRecord, NodeStore, OrderRecord, OrderStore, PairRecord,
    PairStore, SwapDealRecord, SwapDealStore,
};

#[derive(Default)]
struct Tables {
    currencies: HashMap<String, CurrencyRecord>,
    pairs: HashMap<String, PairRecord>,
    nodes: HashMap<String, NodeRecord>,
    orders: HashMap<String, OrderRecord>,
    deals: HashMap<String, SwapDealRecord>,
}

/// Single in-process store implementing every persistence trait this daemon
/// needs, behind one mutex "single persistent choke point"
/// guidance for the node/reputation store (extended here to cover every
/// table, since this is a reference implementation, not a scalability
/// target).
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CurrencyStore for MemoryStore {
    fn add_currency(&self, record: CurrencyRecord) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        if t.currencies.contains_key(&record.symbol) {
            return Err(StoreError::Conflict(format!(
                "currency {} already exists",
                record.symbol
            )));
        }
        t.currencies.insert(record.symbol.clone(), record);
        Ok(())
    }

    fn get_currency(&self, symbol: &str) -> Result<Option<CurrencyRecord>> {
        Ok(self.tables.lock().unwrap().currencies.get(symbol).cloned())
    }

    fn list_currencies(&self) -> Result<Vec<CurrencyRecord>> {
        Ok(self.tables.lock().unwrap().currencies.values().cloned().collect())
    }
}

impl PairStore for MemoryStore {
    fn add_pair(&self, record: PairRecord) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        if t.pairs.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!("pair {} already exists", record.id)));
        }
        t.pairs.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove_pair(&self, id: &str) -> Result<()> {
        self.tables.lock().unwrap().pairs.remove(id);
        Ok(())
    }

    fn get_pair(&self, id: &str) -> Result<Option<PairRecord>> {
        Ok(self.tables.lock().unwrap().pairs.get(id).cloned())
    }

    fn list_pairs(&self) -> Result<Vec<PairRecord>> {
        Ok(self.tables.lock().unwrap().pairs.values().cloned().collect())
    }
}

impl NodeStore for MemoryStore {
    fn upsert_node(&self, record: NodeRecord) -> Result<()> {
        self.tables.lock().unwrap().nodes.insert(record.pub_key.clone(), record);
        Ok(())
    }

    fn get_node(&self, pub_key: &str) -> Result<Option<NodeRecord>> {
        Ok(self.tables.lock().unwrap().nodes.get(pub_key).cloned())
    }

    fn apply_reputation_delta(&self, pub_key: &str, delta: i64, now_ms: i64) -> Result<i64> {
        let mut t = self.tables.lock().unwrap();
        let node = t
            .nodes
            .entry(pub_key.to_string())
            .or_insert_with(|| NodeRecord::new(pub_key, now_ms));
        node.reputation_score += delta;
        node.last_seen_ms = now_ms;
        Ok(node.reputation_score)
    }

    fn ban(&self, pub_key: &str) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let node = t
            .nodes
            .entry(pub_key.to_string())
            .or_insert_with(|| NodeRecord::new(pub_key, 0));
        node.banned = true;
        Ok(())
    }

    fn unban(&self, pub_key: &str) -> Result<()> {
        if let Some(node) = self.tables.lock().unwrap().nodes.get_mut(pub_key) {
            node.banned = false;
        }
        Ok(())
    }

    fn is_banned(&self, pub_key: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .nodes
            .get(pub_key)
            .map(|n| n.banned)
            .unwrap_or(false))
    }

    fn list_nodes(&self) -> Result<Vec<NodeRecord>> {
        Ok(self.tables.lock().unwrap().nodes.values().cloned().collect())
    }
}

impl OrderStore for MemoryStore {
    fn upsert_order(&self, record: OrderRecord) -> Result<()> {
        self.tables.lock().unwrap().orders.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove_order(&self, id: &str) -> Result<()> {
        self.tables.lock().unwrap().orders.remove(id);
        Ok(())
    }

    fn get_order(&self, id: &str) -> Result<Option<OrderRecord>> {
        Ok(self.tables.lock().unwrap().orders.get(id).cloned())
    }

    fn list_orders(&self) -> Result<Vec<OrderRecord>> {
        Ok(self.tables.lock().unwrap().orders.values().cloned().collect())
    }
}

const TERMINAL_STATES: &[&str] = &["Completed"];

impl SwapDealStore for MemoryStore {
    fn upsert_deal(&self, record: SwapDealRecord) -> Result<()> {
        self.tables.lock().unwrap().deals.insert(record.r_hash.clone(), record);
        Ok(())
    }

    fn get_deal(&self, r_hash: &str) -> Result<Option<SwapDealRecord>> {
        Ok(self.tables.lock().unwrap().deals.get(r_hash).cloned())
    }

    fn list_non_terminal_deals(&self) -> Result<Vec<SwapDealRecord>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .deals
            .values()
            .filter(|d| !TERMINAL_STATES.contains(&d.state.as_str()))
            .cloned()
            .collect())
    }

    fn list_deals(&self) -> Result<Vec<SwapDealRecord>> {
        Ok(self.tables.lock().unwrap().deals.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SwapClientKind;

    #[test]
    fn add_currency_rejects_duplicate() {
        let store = MemoryStore::new();
        let btc = CurrencyRecord {
            symbol: "BTC".into(),
            decimal_places: 8,
            swap_client: SwapClientKind::Htlc,
            token_address: None,
        };
        store.add_currency(btc.clone()).unwrap();
        assert!(store.add_currency(btc).is_err());
    }

    #[test]
    fn reputation_delta_accumulates() {
        let store = MemoryStore::new();
        let score = store.apply_reputation_delta("pk1", -50, 1000).unwrap();
        assert_eq!(score, -50);
        let score = store.apply_reputation_delta("pk1", -60, 1001).unwrap();
        assert_eq!(score, -110);
    }

    #[test]
    fn ban_sticks_across_unrelated_updates() {
        let store = MemoryStore::new();
        store.ban("pk1").unwrap();
        store.apply_reputation_delta("pk1", 5, 1000).unwrap();
        assert!(store.is_banned("pk1").unwrap());
    }

    #[test]
    fn non_terminal_deals_excludes_completed() {
        let store = MemoryStore::new();
        let mut deal = SwapDealRecord {
            r_hash: "abc".into(),
            r_preimage: None,
            role: "Taker".into(),
            phase: "Created".into(),
            state: "Active".into(),
            quantity: 100,
            price: Some(5.0),
            pair_id: "BTC/ETH".into(),
            peer_pub_key: "peer1".into(),
            maker_order_id: None,
            taker_order_id: None,
            maker_currency: "BTC".into(),
            taker_currency: "ETH".into(),
            maker_units: 100,
            taker_units: 500,
            maker_cltv_delta: 40,
            taker_cltv_delta: 80,
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        store.upsert_deal(deal.clone()).unwrap();
        assert_eq!(store.list_non_terminal_deals().unwrap().len(), 1);

        deal.state = "Completed".into();
        store.upsert_deal(deal).unwrap();
        assert_eq!(store.list_non_terminal_deals().unwrap().len(), 0);
    }
}
