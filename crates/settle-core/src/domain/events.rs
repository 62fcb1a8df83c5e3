//! SettleEvent - scheduler が記録するライフサイクルイベント

use super::ids::{SettlableId, TurnId};
use super::state::SettleState;

/// event loop 上で観測できる出来事
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleEvent {
    /// settlable が生成された（常に pending）
    Created(SettlableId),

    /// settlable が pending から抜けた
    Settled(SettlableId, SettleState),

    /// 遅延 turn の実行が終わった
    TurnRun(TurnId),

    /// defect が発生した（`SettleError` 参照）
    Defect,
}
