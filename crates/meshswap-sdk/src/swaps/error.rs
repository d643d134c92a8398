use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("payment rejected before any funds moved: {0}")]
    PaymentRejected(String),

    #[error("payment sent but settlement status unknown, entering recovery")]
    UnknownPaymentError,

    #[error("payment definitively failed: {0}")]
    FinalPaymentError(String),

    #[error("cltv deltas are unsafe: taker delta must exceed maker delta by the safety margin")]
    UnsafeCltvDeltas,

    #[error("no deal found for rHash {0}")]
    DealNotFound(String),

    #[error("deal is already in a terminal state")]
    AlreadyTerminal,

    #[error("no swap client configured for currency {0}")]
    NoSwapClient(String),

    #[error(transparent)]
    SwapClient(#[from] crate::swap_client::SwapClientError),
}
