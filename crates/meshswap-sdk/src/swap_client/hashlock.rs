use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::client::{ChannelBalance, PaymentResult, PaymentState, SwapClient, SwapClientStatus};
use super::error::SwapClientError;

/// Swap-client backend for hashlock-transfer state channels: settlement is
/// keyed directly on the payment hash with no invoice/destination step
///.
pub struct HashlockTransferSwapClient {
    currency: String,
    status: Mutex<SwapClientStatus>,
    settled: Mutex<HashMap<[u8; 32], [u8; 32]>>,
    balance: Mutex<ChannelBalance>,
}

impl HashlockTransferSwapClient {
    pub fn new(currency: impl Into<String>, initial_balance: ChannelBalance) -> Self {
        Self {
            currency: currency.into(),
            status: Mutex::new(SwapClientStatus::Initialized),
            settled: Mutex::new(HashMap::new()),
            balance: Mutex::new(initial_balance),
        }
    }
}

#[async_trait]
impl SwapClient for HashlockTransferSwapClient {
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

        let preimage = {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(destination.as_bytes());
            hasher.update(r_hash);
            let digest = hasher.finalize();
            let mut preimage = [0u8; 32];
            preimage.copy_from_slice(&digest);
            preimage
        };
        self.settled.lock().insert(r_hash, preimage);
        Ok(preimage)
    }

    async fn add_invoice(
        &self,
        _r_hash: [u8; 32],
        _units: u64,
        _cltv_delta: u32,
    ) -> Result<Option<String>, SwapClientError> {
        Ok(None)
    }

    async fn lookup_payment(&self, r_hash: [u8; 32]) -> Result<PaymentResult, SwapClientError> {
        match self.settled.lock().get(&r_hash) {
            Some(preimage) => Ok(PaymentResult {
                state: PaymentState::Succeeded,
                preimage: Some(*preimage),
            }),
            None => Ok(PaymentResult {
                state: PaymentState::Pending,
                preimage: None,
            }),
        }
    }

    async fn settle_invoice(
        &self,
        _r_hash: [u8; 32],
        _preimage: [u8; 32],
    ) -> Result<(), SwapClientError> {
        // Hashlock-transfer channels settle as part of `send_payment`
        // itself; there is no separate invoice to mark settled.
        Ok(())
    }

    async fn remove_invoice(&self, r_hash: [u8; 32]) -> Result<(), SwapClientError> {
        self.settled.lock().remove(&r_hash);
        Ok(())
    }

    async fn channel_balance(&self) -> Result<ChannelBalance, SwapClientError> {
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
    async fn send_payment_yields_a_lookupable_preimage() {
        let client = HashlockTransferSwapClient::new(
            "LTC",
            ChannelBalance {
                local: 500,
                ..Default::default()
            },
        );
        let r_hash = [9u8; 32];
        let preimage = client.send_payment(r_hash, "dest", 10, 40).await.unwrap();
        let result = client.lookup_payment(r_hash).await.unwrap();
        assert_eq!(result.preimage, Some(preimage));
        assert_eq!(result.state, PaymentState::Succeeded);
    }
}
