//! State machine - インスタンスごとの状態（pending -> fulfilled | rejected を一度だけ）

use std::cell::RefCell;
use std::rc::Weak;

use super::Settlable;
use super::reaction::{React, schedule_reaction};
use crate::domain::{SettlableId, SettleEvent, Settlement};

/// `Settlable` の裏にある可変状態
///
/// 触るのは settlable 自身の entry point だけ。
/// 制御が crate の外（executor, handler, foreign thenable）に出る前に borrow は必ず解放する。
pub(crate) struct Machine<T, E> {
    pub(crate) id: SettlableId,

    /// resolve / reject entry point の最初の呼び出しで立つ。
    /// pending な settlable を adopt した場合は payload より先に立つので、
    /// その後の reject も無視される。
    pub(crate) entry_latched: bool,

    /// pending の間は `None`。一度だけ書き込まれる。
    pub(crate) payload: Option<Settlement<T, E>>,

    /// 登録順の reaction record。settle 時に一度だけ取り出す。
    pub(crate) reactions: Vec<Box<dyn React<T, E>>>,

    /// adopt 中の settlable（循環チェック用）
    pub(crate) following: Option<Weak<RefCell<Machine<T, E>>>>,
}

impl<T, E> Machine<T, E> {
    pub(crate) fn new(id: SettlableId) -> Self {
        Self {
            id,
            entry_latched: false,
            payload: None,
            reactions: Vec::new(),
            following: None,
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Settlable<T, E> {
    pub(crate) fn fulfill(&self, value: T) -> bool {
        self.settle(Settlement::Fulfilled(value))
    }

    pub(crate) fn reject(&self, reason: E) -> bool {
        self.settle(Settlement::Rejected(reason))
    }

    /// payload を書き込み、溜まった reaction を schedule する。
    /// 既に settle 済みなら何もせず `false` を返す。
    fn settle(&self, settlement: Settlement<T, E>) -> bool {
        let (id, reactions) = {
            let mut machine = self.machine.borrow_mut();
            if machine.payload.is_some() {
                tracing::trace!(settlable = %machine.id, "late settlement ignored");
                return false;
            }
            machine.payload = Some(settlement.clone());
            machine.following = None;
            (machine.id, std::mem::take(&mut machine.reactions))
        };

        let state = settlement.state();
        tracing::debug!(settlable = %id, state = ?state, reactions = reactions.len(), "settled");
        self.scheduler.record(SettleEvent::Settled(id, state));

        // これらの turn からは state と payload が既に見える
        for reaction in reactions {
            schedule_reaction(&self.scheduler, reaction, settlement.clone());
        }
        true
    }

    /// reaction record を登録。settle 済みでも後続 turn に回す。
    pub(crate) fn register(&self, reaction: Box<dyn React<T, E>>) {
        let settled = self.machine.borrow().payload.clone();
        match settled {
            None => self.machine.borrow_mut().reactions.push(reaction),
            Some(settlement) => schedule_reaction(&self.scheduler, reaction, settlement),
        }
    }

    pub(crate) fn entry_latched(&self) -> bool {
        self.machine.borrow().entry_latched
    }

    /// entry latch の check-and-set。勝った呼び出し元だけ `true`。
    pub(crate) fn try_latch_entry(&self) -> bool {
        let mut machine = self.machine.borrow_mut();
        if machine.entry_latched {
            return false;
        }
        machine.entry_latched = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{SettleState, Settlement};
    use crate::impls::EventLoop;
    use crate::settlable::Resolution;

    #[test]
    fn first_transition_wins() {
        let event_loop = EventLoop::default();
        let deferred = event_loop.deferred::<i32, String>();
        let settlable = &deferred.settlable;

        assert!(settlable.fulfill(1));
        assert!(!settlable.reject("late".into()));
        assert!(!settlable.fulfill(2));

        assert_eq!(settlable.state(), SettleState::Fulfilled);
        assert_eq!(settlable.settlement(), Some(Settlement::Fulfilled(1)));
    }

    #[test]
    fn reactions_are_drained_exactly_once() {
        let event_loop = EventLoop::default();
        let deferred = event_loop.deferred::<i32, String>();
        let _ = deferred.settlable.then_fulfilled(|v| Ok(Resolution::Value(v)));
        let _ = deferred.settlable.then_fulfilled(|v| Ok(Resolution::Value(v)));

        assert_eq!(deferred.settlable.machine.borrow().reactions.len(), 2);
        deferred.settlable.fulfill(3);
        assert!(deferred.settlable.machine.borrow().reactions.is_empty());
        assert_eq!(event_loop.pending_turns(), 2);

        deferred.settlable.reject("again".into());
        assert_eq!(event_loop.pending_turns(), 2);
    }

    #[test]
    fn latch_has_a_single_winner() {
        let event_loop = EventLoop::default();
        let deferred = event_loop.deferred::<i32, String>();

        assert!(!deferred.settlable.entry_latched());
        assert!(deferred.settlable.try_latch_entry());
        assert!(!deferred.settlable.try_latch_entry());
        assert!(deferred.settlable.is_pending());
    }
}
