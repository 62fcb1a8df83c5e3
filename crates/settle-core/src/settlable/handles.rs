//! ResolveHandle / RejectHandle - executor に渡し、`Deferred` が公開する entry point

use super::Settlable;
use super::resolution::{Resolution, check_adoption, resolve_procedure};
use crate::error::SettleError;

/// settlable 一つ分の resolve entry point
///
/// このハンドルと対応する `RejectHandle` のうち、最初の呼び出しだけが効く。
/// clone も同じ latch を共有する。
pub struct ResolveHandle<T, E> {
    target: Settlable<T, E>,
}

/// settlable 一つ分の reject entry point
pub struct RejectHandle<T, E> {
    target: Settlable<T, E>,
}

impl<T, E> Clone for ResolveHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T, E> Clone for RejectHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> ResolveHandle<T, E> {
    pub(crate) fn new(target: Settlable<T, E>) -> Self {
        Self { target }
    }

    /// `x` で resolution procedure を実行
    ///
    /// 自分自身での resolve（直接でも、adoption chain や thenable ラッパー経由でも）は
    /// `SettleError::ChainingCycle` を返す。その場合は何も変わらない:
    /// settlable は pending のまま、latch も開いたまま。
    pub fn resolve(&self, x: impl Into<Resolution<T, E>>) -> Result<(), SettleError> {
        if self.target.entry_latched() {
            tracing::trace!(settlable = %self.target.id(), "resolve after entry latch ignored");
            return Ok(());
        }
        let x = x.into();
        match &x {
            Resolution::Settlable(source) => check_adoption(&self.target, source)?,
            Resolution::Thenable(thenable) => {
                if let Some(source) = thenable.as_settlable() {
                    check_adoption(&self.target, source)?;
                }
            }
            Resolution::Value(_) => {}
        }
        self.target.try_latch_entry();
        resolve_procedure(&self.target, x, 0)
    }

    /// 値での resolve の短縮形（失敗しない）
    pub fn fulfill(&self, value: T) {
        if self.target.try_latch_entry() {
            self.target.fulfill(value);
        } else {
            tracing::trace!(settlable = %self.target.id(), "fulfill after entry latch ignored");
        }
    }

    pub fn settlable(&self) -> &Settlable<T, E> {
        &self.target
    }
}

impl<T: Clone + 'static, E: Clone + 'static> RejectHandle<T, E> {
    pub(crate) fn new(target: Settlable<T, E>) -> Self {
        Self { target }
    }

    pub fn reject(&self, reason: E) {
        if self.target.try_latch_entry() {
            self.target.reject(reason);
        } else {
            tracing::trace!(settlable = %self.target.id(), "reject after entry latch ignored");
        }
    }

    pub fn settlable(&self) -> &Settlable<T, E> {
        &self.target
    }
}
