//! Observability - event loop のカウンタ

use serde::{Deserialize, Serialize};

use crate::domain::{SettleEvent, SettleState};

/// event loop が保持するカウンタ
///
/// `SettleEvent` を `apply` して更新する（`turns_scheduled` だけは loop が直接数える）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopCounts {
    pub created: usize,
    pub pending: usize,
    pub fulfilled: usize,
    pub rejected: usize,
    pub turns_scheduled: usize,
    pub turns_run: usize,
    pub defects: usize,
}

impl LoopCounts {
    pub(crate) fn apply(&mut self, event: &SettleEvent) {
        match event {
            SettleEvent::Created(_) => {
                self.created += 1;
                self.pending += 1;
            }
            SettleEvent::Settled(_, state) => {
                self.pending = self.pending.saturating_sub(1);
                match state {
                    SettleState::Fulfilled => self.fulfilled += 1,
                    SettleState::Rejected => self.rejected += 1,
                    SettleState::Pending => {}
                }
            }
            SettleEvent::TurnRun(_) => self.turns_run += 1,
            SettleEvent::Defect => self.defects += 1,
        }
    }
}
