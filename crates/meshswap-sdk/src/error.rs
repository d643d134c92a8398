use thiserror::Error;

/// Top-level SDK error. Component-local errors (matching, p2p, swaps,
/// swap-client) are their own `thiserror` enums and convert into this one at
/// the seams the daemon crosses.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Matching(#[from] crate::matching::MatchError),

    #[error(transparent)]
    P2p(#[from] crate::p2p::PoolError),

    #[error(transparent)]
    Swap(#[from] crate::swaps::SwapError),

    #[error(transparent)]
    Store(#[from] meshswap_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SdkError>;
