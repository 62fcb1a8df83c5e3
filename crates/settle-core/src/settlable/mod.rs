//! Settlable - 一度だけ settle する非同期値
//!
//! `Settlable<T, E>` は pending で始まり、`T` で fulfilled か `E` で rejected の
//! どちらかに一度だけ settle する。`then` ファミリーで付けた継続は、
//! settle の前後どちらで付けても、event loop の後続 turn で実行される。
//!
//! # モジュール構成
//! - **machine**: インスタンスごとの状態と一度きりの遷移
//! - **resolution**: resolution procedure（値, adoption, thenable）
//! - **reaction**: reaction record と `then` ファミリー
//! - **handles**: executor に渡す resolve / reject entry point
//! - **deferred**: executor なしの factory

mod deferred;
mod handles;
mod machine;
mod reaction;
mod resolution;

pub use self::deferred::Deferred;
pub use self::handles::{RejectHandle, ResolveHandle};
pub use self::reaction::{HandlerResult, OnFulfilled, OnRejected};
pub use self::resolution::{RejectCallback, Resolution, ResolveCallback, Thenable};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use self::machine::Machine;
use crate::domain::{SettlableId, SettleEvent, SettleState, Settlement};
use crate::ports::SchedulerRef;

/// 一度だけ settle する非同期値
///
/// clone は安価で、同じインスタンスへの別ハンドルになる。
pub struct Settlable<T, E> {
    pub(crate) machine: Rc<RefCell<Machine<T, E>>>,
    pub(crate) scheduler: SchedulerRef,
}

impl<T, E> Clone for Settlable<T, E> {
    fn clone(&self) -> Self {
        Self {
            machine: Rc::clone(&self.machine),
            scheduler: Rc::clone(&self.scheduler),
        }
    }
}

impl<T, E> fmt::Debug for Settlable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machine = self.machine.borrow();
        let state = machine
            .payload
            .as_ref()
            .map_or(SettleState::Pending, Settlement::state);
        f.debug_struct("Settlable")
            .field("id", &format_args!("{}", machine.id))
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Settlable<T, E> {
    /// settlable を作り、その entry point を渡して `executor` を同期的に実行
    ///
    /// executor が `Err` を返すと reject する（entry point が既に呼ばれていなければ）。
    pub fn new<F>(scheduler: &SchedulerRef, executor: F) -> Self
    where
        F: FnOnce(ResolveHandle<T, E>, RejectHandle<T, E>) -> Result<(), E>,
    {
        let settlable = Self::pending(scheduler);
        let reject = RejectHandle::new(settlable.clone());
        if let Err(fault) = executor(ResolveHandle::new(settlable.clone()), reject.clone()) {
            tracing::debug!(settlable = %settlable.id(), "executor returned an error");
            reject.reject(fault);
        }
        settlable
    }

    /// `value` で fulfilled 済みの settlable
    pub fn fulfilled(scheduler: &SchedulerRef, value: T) -> Self {
        let settlable = Self::pending(scheduler);
        settlable.try_latch_entry();
        settlable.fulfill(value);
        settlable
    }

    /// `reason` で rejected 済みの settlable
    pub fn rejected(scheduler: &SchedulerRef, reason: E) -> Self {
        let settlable = Self::pending(scheduler);
        settlable.try_latch_entry();
        settlable.reject(reason);
        settlable
    }

    pub(crate) fn pending(scheduler: &SchedulerRef) -> Self {
        let id = scheduler.next_settlable_id();
        scheduler.record(SettleEvent::Created(id));
        tracing::trace!(settlable = %id, "created");
        Self {
            machine: Rc::new(RefCell::new(Machine::new(id))),
            scheduler: Rc::clone(scheduler),
        }
    }
}

impl<T: Clone, E: Clone> Settlable<T, E> {
    pub fn id(&self) -> SettlableId {
        self.machine.borrow().id
    }

    pub fn state(&self) -> SettleState {
        self.machine
            .borrow()
            .payload
            .as_ref()
            .map_or(SettleState::Pending, Settlement::state)
    }

    pub fn is_pending(&self) -> bool {
        self.machine.borrow().payload.is_none()
    }

    /// payload のスナップショット（pending なら `None`）
    pub fn settlement(&self) -> Option<Settlement<T, E>> {
        self.machine.borrow().payload.clone()
    }

    pub fn value(&self) -> Option<T> {
        self.machine.borrow().payload.as_ref()?.value().cloned()
    }

    pub fn reason(&self) -> Option<E> {
        self.machine.borrow().payload.as_ref()?.reason().cloned()
    }

    /// 二つのハンドルが同じインスタンスを指すか
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.machine, &other.machine)
    }
}
