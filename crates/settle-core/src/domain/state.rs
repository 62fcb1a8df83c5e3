//! SettleState - settlable の状態

use serde::{Deserialize, Serialize};

/// settlable の状態
///
/// # 状態遷移
/// - Pending -> Fulfilled
/// - Pending -> Rejected
///
/// `Pending` に戻ることはなく、終端状態同士の遷移もない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleState {
    /// 未確定（reaction は溜まる）
    Pending,

    /// 値で確定
    Fulfilled,

    /// 理由で確定
    Rejected,
}

impl SettleState {
    /// 終端状態か（以降の遷移なし）
    pub fn is_terminal(self) -> bool {
        matches!(self, SettleState::Fulfilled | SettleState::Rejected)
    }
}
