//! SettleError - defect 型

use thiserror::Error;

use crate::domain::SettlableId;

/// Resolution procedure が出す defect
///
/// rejection には変換しない。defect に当たった settlable は pending のまま残り、
/// defect は event loop を回している側に返される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    #[error("chaining cycle detected: {settlable} would adopt its own eventual state")]
    ChainingCycle { settlable: SettlableId },

    #[error("adoption chain of {settlable} is longer than {limit} links")]
    AdoptionDepthExceeded { settlable: SettlableId, limit: usize },

    #[error("thenable assimilation for {settlable} nested deeper than {limit}")]
    ResolutionDepthExceeded { settlable: SettlableId, limit: usize },
}

impl SettleError {
    /// defect の対象 settlable
    pub fn settlable(&self) -> SettlableId {
        match self {
            SettleError::ChainingCycle { settlable }
            | SettleError::AdoptionDepthExceeded { settlable, .. }
            | SettleError::ResolutionDepthExceeded { settlable, .. } => *settlable,
        }
    }
}
