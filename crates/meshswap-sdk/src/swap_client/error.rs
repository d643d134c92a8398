use thiserror::Error;

/// the design: "distinct `FinalPaymentError` (definitive) vs
/// `UnknownPaymentError` (indeterminate) — only the former releases holds
/// immediately; the latter enters recovery."
#[derive(Debug, Error, Clone)]
pub enum SwapClientError {
    #[error("payment definitively failed: {0}")]
    FinalPaymentError(String),

    #[error("payment status unknown: {0}")]
    UnknownPaymentError(String),

    #[error("invoice error: {0}")]
    InvoiceError(String),

    #[error("swap client not initialized")]
    NotInitialized,

    #[error("swap client disabled for this currency")]
    Disabled,
}
