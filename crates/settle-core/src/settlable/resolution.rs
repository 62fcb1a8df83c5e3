//! Resolution procedure - 候補値を最終的な settlement に同化する
//!
//! # 分岐
//! - **Value**: そのまま fulfill
//! - **Settlable**: その最終状態を adopt（adopt 先も別の settlable を adopt 中かもしれないので推移的）
//! - **Thenable**: `then` を一度だけ呼ぶ。二つのコールバックは one-shot latch を共有するので、
//!   行儀の悪い thenable でも target を settle できるのは一回だけ
//!
//! # 学習ポイント
//! - 候補値の分類は sum type（`Resolution`）で一度だけ行う
//! - 自分自身での resolve は rejection ではなく defect（`SettleError::ChainingCycle`）

use std::cell::Cell;
use std::rc::{Rc, Weak};

use super::Settlable;
use super::reaction::React;
use crate::domain::Settlement;
use crate::error::SettleError;

/// resolve entry point に渡される、または継続が返す候補値
pub enum Resolution<T, E> {
    /// 普通の値。target を fulfill する。
    Value(T),

    /// 別の settlable。target はその最終状態を adopt する。
    Settlable(Settlable<T, E>),

    /// thenable を実装した外部オブジェクト
    Thenable(Rc<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Resolution::Thenable(Rc::new(thenable))
    }
}

impl<T, E> From<Settlable<T, E>> for Resolution<T, E> {
    fn from(settlable: Settlable<T, E>) -> Self {
        Resolution::Settlable(settlable)
    }
}

/// Thenable は外部の settlement プリミティブとの相互運用の契約
///
/// `then` はどちらのコールバックを何回呼んでもよい（同期でも後からでも）。
/// 効くのは両方を通して最初の一回だけ。
/// `Err` を返すと、コールバックがまだ呼ばれていなければ consumer を reject する。
pub trait Thenable<T, E> {
    fn then(
        &self,
        on_fulfilled: ResolveCallback<T, E>,
        on_rejected: RejectCallback<T, E>,
    ) -> Result<(), E>;

    /// この thenable の中身が自前の settlable ならそれを返す。
    /// 循環チェックで adoption chain がラッパーを透過できるようにする。
    fn as_settlable(&self) -> Option<&Settlable<T, E>> {
        None
    }
}

/// foreign thenable に渡す fulfillment コールバック
pub struct ResolveCallback<T, E> {
    target: Settlable<T, E>,
    latch: Rc<Cell<bool>>,
    depth: usize,
}

/// foreign thenable に渡す rejection コールバック
pub struct RejectCallback<T, E> {
    target: Settlable<T, E>,
    latch: Rc<Cell<bool>>,
}

impl<T, E> Clone for ResolveCallback<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            latch: Rc::clone(&self.latch),
            depth: self.depth,
        }
    }
}

impl<T, E> Clone for RejectCallback<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            latch: Rc::clone(&self.latch),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> ResolveCallback<T, E> {
    /// `x` を consumer の resolution procedure に戻す
    ///
    /// 外部の呼び出し元には defect を返せないので、scheduler に報告する。
    pub fn resolve(&self, x: impl Into<Resolution<T, E>>) {
        if self.latch.replace(true) {
            tracing::trace!(settlable = %self.target.id(), "thenable resolved after latch");
            return;
        }
        if let Err(defect) = resolve_procedure(&self.target, x.into(), self.depth) {
            tracing::warn!(%defect, "defect while assimilating thenable");
            self.target.scheduler.report_defect(defect);
        }
    }

    pub fn fulfill(&self, value: T) {
        self.resolve(Resolution::Value(value));
    }
}

impl<T: Clone + 'static, E: Clone + 'static> RejectCallback<T, E> {
    pub fn reject(&self, reason: E) {
        if self.latch.replace(true) {
            tracing::trace!(settlable = %self.target.id(), "thenable rejected after latch");
            return;
        }
        self.target.reject(reason);
    }
}

/// `target` に対して候補値 `x` で resolution procedure を実行
///
/// `depth` は現在のスタック上で入れ子になった thenable 同化の数。
pub(crate) fn resolve_procedure<T: Clone + 'static, E: Clone + 'static>(
    target: &Settlable<T, E>,
    x: Resolution<T, E>,
    depth: usize,
) -> Result<(), SettleError> {
    if !target.is_pending() {
        return Ok(());
    }
    match x {
        Resolution::Value(value) => {
            target.fulfill(value);
            Ok(())
        }
        Resolution::Settlable(source) => adopt(target, source),
        Resolution::Thenable(thenable) => assimilate(target, thenable, depth),
    }
}

/// `source` から adoption chain を辿る。
/// `target` に行き着いたら、`target` が自分自身を待つことになる。
pub(crate) fn check_adoption<T, E>(
    target: &Settlable<T, E>,
    source: &Settlable<T, E>,
) -> Result<(), SettleError> {
    let limit = target.scheduler.config().max_adoption_depth;
    let target_id = target.machine.borrow().id;
    let mut next = Some(Rc::clone(&source.machine));
    let mut hops = 0usize;

    while let Some(machine) = next {
        if Rc::ptr_eq(&machine, &target.machine) {
            return Err(SettleError::ChainingCycle {
                settlable: target_id,
            });
        }
        hops += 1;
        if hops > limit {
            return Err(SettleError::AdoptionDepthExceeded {
                settlable: target_id,
                limit,
            });
        }
        next = machine.borrow().following.as_ref().and_then(Weak::upgrade);
    }
    Ok(())
}

fn adopt<T: Clone + 'static, E: Clone + 'static>(
    target: &Settlable<T, E>,
    source: Settlable<T, E>,
) -> Result<(), SettleError> {
    check_adoption(target, &source)?;
    target.machine.borrow_mut().following = Some(Rc::downgrade(&source.machine));
    tracing::trace!(settlable = %target.id(), source = %source.id(), "adopting");
    source.register(Box::new(Adoption {
        target: target.clone(),
    }));
    Ok(())
}

fn assimilate<T: Clone + 'static, E: Clone + 'static>(
    target: &Settlable<T, E>,
    thenable: Rc<dyn Thenable<T, E>>,
    depth: usize,
) -> Result<(), SettleError> {
    let limit = target.scheduler.config().max_resolution_depth;
    if depth >= limit {
        return Err(SettleError::ResolutionDepthExceeded {
            settlable: target.id(),
            limit,
        });
    }

    if let Some(source) = thenable.as_settlable() {
        check_adoption(target, source)?;
        target.machine.borrow_mut().following = Some(Rc::downgrade(&source.machine));
    }

    let latch = Rc::new(Cell::new(false));
    let on_fulfilled = ResolveCallback {
        target: target.clone(),
        latch: Rc::clone(&latch),
        depth: depth + 1,
    };
    let on_rejected = RejectCallback {
        target: target.clone(),
        latch: Rc::clone(&latch),
    };

    if let Err(fault) = thenable.then(on_fulfilled, on_rejected) {
        if latch.replace(true) {
            tracing::debug!(settlable = %target.id(), "thenable failed after settling; ignored");
        } else {
            target.reject(fault);
        }
    }
    Ok(())
}

/// source の settlement を adopt 中の target に運ぶ reaction
struct Adoption<T, E> {
    target: Settlable<T, E>,
}

impl<T: Clone + 'static, E: Clone + 'static> React<T, E> for Adoption<T, E> {
    fn react(self: Box<Self>, settlement: Settlement<T, E>) -> Result<(), SettleError> {
        match settlement {
            Settlement::Fulfilled(value) => {
                resolve_procedure(&self.target, Resolution::Value(value), 0)
            }
            Settlement::Rejected(reason) => {
                self.target.reject(reason);
                Ok(())
            }
        }
    }
}

/// 自分を同化している側のコールバックに settlement を転送する
struct Forward<T, E> {
    on_fulfilled: ResolveCallback<T, E>,
    on_rejected: RejectCallback<T, E>,
}

impl<T: Clone + 'static, E: Clone + 'static> React<T, E> for Forward<T, E> {
    fn react(self: Box<Self>, settlement: Settlement<T, E>) -> Result<(), SettleError> {
        match settlement {
            Settlement::Fulfilled(value) => self.on_fulfilled.fulfill(value),
            Settlement::Rejected(reason) => self.on_rejected.reject(reason),
        }
        Ok(())
    }
}

/// settlable 自体も行儀のよい thenable
impl<T: Clone + 'static, E: Clone + 'static> Thenable<T, E> for Settlable<T, E> {
    fn then(
        &self,
        on_fulfilled: ResolveCallback<T, E>,
        on_rejected: RejectCallback<T, E>,
    ) -> Result<(), E> {
        self.register(Box::new(Forward {
            on_fulfilled,
            on_rejected,
        }));
        Ok(())
    }
    fn as_settlable(&self) -> Option<&Settlable<T, E>> {
        Some(self)
    }
}
