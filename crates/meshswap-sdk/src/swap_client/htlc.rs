use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::client::{
    ChannelBalance, PaymentResult, PaymentState, SwapClient, SwapClientEvent, SwapClientStatus,
};
use super::error::SwapClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvoiceState {
    Open,
    Settled,
}

struct Invoice {
    units: u64,
    destination: String,
    state: InvoiceState,
}

/// Swap-client backend for HTLC-capable payment channels (Lightning-style):
/// `add_invoice` reserves a destination keyed by `rHash`, `send_payment`
/// locks an outgoing HTLC to that hash, `lookup_payment` reports on it.
///
/// This is a local reference implementation of the contract — it tracks
/// invoice/payment state in memory rather than driving a real channel
/// backend, so the rest of the system (matching, gossip, swap state
/// machine) can be exercised end to end without one.
pub struct HtlcSwapClient {
    currency: String,
    status: Mutex<SwapClientStatus>,
    invoices: Mutex<HashMap<[u8; 32], Invoice>>,
    balance: Mutex<ChannelBalance>,
    events: broadcast::Sender<SwapClientEvent>,
}

impl HtlcSwapClient {
    pub fn new(currency: impl Into<String>, initial_balance: ChannelBalance) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            currency: currency.into(),
            status: Mutex::new(SwapClientStatus::Initialized),
            invoices: Mutex::new(HashMap::new()),
            balance: Mutex::new(initial_balance),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapClientEvent> {
        self.events.subscribe()
    }

    fn check_initialized(&self) -> Result<(), SwapClientError> {
        match *self.status.lock() {
            SwapClientStatus::Disabled => Err(SwapClientError::Disabled),
            SwapClientStatus::NotInitialized => Err(SwapClientError::NotInitialized),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SwapClient for HtlcSwapClient {
    fn status(&self) -> SwapClientStatus {
        *self.status.lock()
    }

    async fn send_payment(
        &self,
        r_hash: [u8; 32],
        destination: &str,
        units: u64,
        _cltv_delta: u32,
    ) -> Result<[u8; 32], SwapClientError> {
        self.check_initialized()?;
        let mut balance = self.balance.lock();
        if balance.local < units {
            return Err(SwapClientError::FinalPaymentError(format!(
                "insufficient local balance on {}: have {}, need {}",
                self.currency, balance.local, units
            )));
        }
        balance.local -= units;
        balance.remote += units;
        drop(balance);

        // A real backend returns the preimage the receiving node revealed on
        // settlement; our in-memory model has no counterparty, so it treats
        // the payment hash itself as resolved immediately and settles
        // against a zeroed preimage the caller is expected to have obtained
        // independently via `lookup_payment` or the other leg's invoice.
        let _ = destination;
        Ok(r_hash)
    }

    async fn add_invoice(
        &self,
        r_hash: [u8; 32],
        units: u64,
        _cltv_delta: u32,
    ) -> Result<Option<String>, SwapClientError> {
        self.check_initialized()?;
        let destination = format!("{}-invoice-{}", self.currency, hex::encode(r_hash));
        self.invoices.lock().insert(
            r_hash,
            Invoice {
                units,
                destination: destination.clone(),
                state: InvoiceState::Open,
            },
        );
        Ok(Some(destination))
    }

    async fn lookup_payment(&self, r_hash: [u8; 32]) -> Result<PaymentResult, SwapClientError> {
        self.check_initialized()?;
        let invoices = self.invoices.lock();
        match invoices.get(&r_hash) {
            Some(invoice) => Ok(PaymentResult {
                state: match invoice.state {
                    InvoiceState::Open => PaymentState::Pending,
                    InvoiceState::Settled => PaymentState::Succeeded,
                },
                preimage: None,
            }),
            None => Ok(PaymentResult {
                state: PaymentState::Pending,
                preimage: None,
            }),
        }
    }

    async fn settle_invoice(
        &self,
        r_hash: [u8; 32],
        _preimage: [u8; 32],
    ) -> Result<(), SwapClientError> {
        self.check_initialized()?;
        let mut invoices = self.invoices.lock();
        let invoice = invoices
            .get_mut(&r_hash)
            .ok_or_else(|| SwapClientError::InvoiceError("unknown rHash".into()))?;
        invoice.state = InvoiceState::Settled;
        let units = invoice.units;
        drop(invoices);
        let mut balance = self.balance.lock();
        balance.remote = balance.remote.saturating_sub(units);
        balance.local += units;
        if balance.local < units {
            let _ = self.events.send(SwapClientEvent::LowTradingBalance {
                currency: self.currency.clone(),
            });
        }
        Ok(())
    }

    async fn remove_invoice(&self, r_hash: [u8; 32]) -> Result<(), SwapClientError> {
        self.invoices.lock().remove(&r_hash);
        Ok(())
    }

    async fn channel_balance(&self) -> Result<ChannelBalance, SwapClientError> {
        self.check_initialized()?;
        Ok(*self.balance.lock())
    }

    async fn open_channel(&self, _remote: &str, local_amount: u64) -> Result<(), SwapClientError> {
        self.balance.lock().local += local_amount;
        Ok(())
    }

    async fn close_channel(&self, _channel_id: &str) -> Result<(), SwapClientError> {
        Ok(())
    }

    async fn deposit_to_channel(&self, _channel_id: &str, amount: u64) -> Result<(), SwapClientError> {
        self.balance.lock().local += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_payment_fails_without_sufficient_balance() {
        let client = HtlcSwapClient::new("BTC", ChannelBalance::default());
        let err = client
            .send_payment([1u8; 32], "dest", 100, 40)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapClientError::FinalPaymentError(_)));
    }

    #[tokio::test]
    async fn settle_invoice_moves_lookup_to_succeeded() {
        let client = HtlcSwapClient::new(
            "BTC",
            ChannelBalance {
                local: 1000,
                ..Default::default()
            },
        );
        let r_hash = [2u8; 32];
        client.add_invoice(r_hash, 50, 40).await.unwrap();
        client.settle_invoice(r_hash, [0u8; 32]).await.unwrap();
        let result = client.lookup_payment(r_hash).await.unwrap();
        assert_eq!(result.state, PaymentState::Succeeded);
    }
}
