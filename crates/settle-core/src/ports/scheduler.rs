//! Scheduler port - ホストの "run later" プリミティブ
//!
//! settlable は継続を自分で実行しない。ジョブを scheduler に渡し、
//! scheduler は現在のコールスタックが巻き戻った後の turn で FIFO 順に実行する。

use std::rc::Rc;

use crate::config::LoopConfig;
use crate::domain::{SettlableId, SettleEvent};
use crate::error::SettleError;

/// 遅延実行の単位。`Err` は defect で、scheduler を回す側に返される。
pub type TurnJob = Box<dyn FnOnce() -> Result<(), SettleError>>;

/// scheduler の共有ハンドル（その上で作られた全 settlable が保持する）
pub type SchedulerRef = Rc<dyn Scheduler>;

pub trait Scheduler {
    /// `job` を現在の turn の後に実行するようキューに積む（`label` はログ用）
    fn schedule(&self, label: &'static str, job: TurnJob);

    fn next_settlable_id(&self) -> SettlableId;

    fn config(&self) -> &LoopConfig;

    /// ライフサイクルイベントを記録
    fn record(&self, event: SettleEvent);

    /// 戻り値で返せない場所（foreign thenable のコールバック内など）で
    /// 発生した defect を引き渡す
    fn report_defect(&self, defect: SettleError);
}
