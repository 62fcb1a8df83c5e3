//! Settlement model: settlable が最終的に持つ値 or 理由

use serde::{Deserialize, Serialize};

use super::state::SettleState;

/// settlable の終端ペイロード
///
/// 値と理由を一つの enum に持つので両立しない。
/// state は variant から導出するため、state と payload が食い違うことはない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "payload", rename_all = "snake_case")]
pub enum Settlement<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settlement<T, E> {
    pub fn state(&self) -> SettleState {
        match self {
            Settlement::Fulfilled(_) => SettleState::Fulfilled,
            Settlement::Rejected(_) => SettleState::Rejected,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settlement::Fulfilled(value) => Some(value),
            Settlement::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&E> {
        match self {
            Settlement::Fulfilled(_) => None,
            Settlement::Rejected(reason) => Some(reason),
        }
    }

    /// `Result` に変換（fulfilled が `Ok`）
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settlement::Fulfilled(value) => Ok(value),
            Settlement::Rejected(reason) => Err(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settlement<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settlement::Fulfilled(value),
            Err(reason) => Settlement::Rejected(reason),
        }
    }
}
