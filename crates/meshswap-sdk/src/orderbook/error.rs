use thiserror::Error;

use crate::types::{LocalId, PairId};

#[derive(Debug, Error)]
pub enum OrderBookError {
    #[error("unknown pair {0}")]
    UnknownPair(PairId),

    #[error("local id {0} is already in use for pair {1}")]
    DuplicateLocalId(LocalId, PairId),

    #[error("local id {0} not found for pair {1}")]
    UnknownLocalId(LocalId, PairId),

    #[error(transparent)]
    Match(#[from] crate::matching::MatchError),
}
