use async_trait::async_trait;

use super::error::SwapClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapClientStatus {
    Disabled,
    NotInitialized,
    Initialized,
    ConnectionVerified,
    Disconnected,
    OutOfSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentResult {
    pub state: PaymentState,
    pub preimage: Option<[u8; 32]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelBalance {
    pub local: u64,
    pub remote: u64,
    pub inactive: u64,
    pub pending_open: u64,
}

#[derive(Debug, Clone)]
pub enum SwapClientEvent {
    LowTradingBalance { currency: String },
    ConnectionVerified,
    HtlcAccepted { r_hash: [u8; 32] },
}

/// Shared contract Swaps depends on. Backend differences
/// (HTLC-capable channel vs. hashlock-transfer state channel) live entirely
/// inside each implementation's `send_payment`/`add_invoice`.
#[async_trait]
pub trait SwapClient: Send + Sync {
    fn status(&self) -> SwapClientStatus;

    /// Fails with `FinalPaymentError` (definitely not sent) or
    /// `UnknownPaymentError` (unknown status) — callers must not retry on
    /// the latter.
    async fn send_payment(
        &self,
        r_hash: [u8; 32],
        destination: &str,
        units: u64,
        cltv_delta: u32,
    ) -> Result<[u8; 32], SwapClientError>;

    /// `Some(destination)` for HTLC-capable backends; `None` for
    /// hashlock-transfer backends, which settle on the payment hash with no
    /// invoice step.
    async fn add_invoice(
        &self,
        r_hash: [u8; 32],
        units: u64,
        cltv_delta: u32,
    ) -> Result<Option<String>, SwapClientError>;

    async fn lookup_payment(&self, r_hash: [u8; 32]) -> Result<PaymentResult, SwapClientError>;

    async fn settle_invoice(
        &self,
        r_hash: [u8; 32],
        preimage: [u8; 32],
    ) -> Result<(), SwapClientError>;

    async fn remove_invoice(&self, r_hash: [u8; 32]) -> Result<(), SwapClientError>;

    async fn channel_balance(&self) -> Result<ChannelBalance, SwapClientError>;

    async fn open_channel(&self, remote: &str, local_amount: u64) -> Result<(), SwapClientError>;

    async fn close_channel(&self, channel_id: &str) -> Result<(), SwapClientError>;

    async fn deposit_to_channel(&self, channel_id: &str, amount: u64) -> Result<(), SwapClientError>;
}
