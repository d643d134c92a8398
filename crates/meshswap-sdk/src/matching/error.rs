use thiserror::Error;

use crate::types::{OrderId, PairId};

#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("split target exceeds parent order quantity")]
    InvalidSplit,

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("order pair {got} does not match engine pair {expected}")]
    PairMismatch { expected: PairId, got: PairId },
}
