//! Reaction records と `then` ファミリー
//!
//! # 学習ポイント
//! - 型消去: `ReactionRecord<T, U, E>` → `Box<dyn React<T, E>>`
//!   (下流の型 `U` を source 側の queue から隠す)
//! - 継続は必ず scheduler 経由で後続 turn に実行される

use super::Settlable;
use super::handles::{RejectHandle, ResolveHandle};
use super::resolution::Resolution;
use crate::domain::Settlement;
use crate::error::SettleError;
use crate::ports::SchedulerRef;

/// 継続の戻り値: 下流 settlable の候補値、または下流を reject するエラー
pub type HandlerResult<U, E> = Result<Resolution<U, E>, E>;

/// box 化した fulfillment 継続
pub type OnFulfilled<T, U, E> = Box<dyn FnOnce(T) -> HandlerResult<U, E>>;

/// box 化した rejection 継続
pub type OnRejected<U, E> = Box<dyn FnOnce(E) -> HandlerResult<U, E>>;

/// settlement を待つもの
///
/// object-safe なので、下流の型が違う record を一つの queue に積める。
pub(crate) trait React<T, E> {
    fn react(self: Box<Self>, settlement: Settlement<T, E>) -> Result<(), SettleError>;
}

/// `then` 一回分の登録: 二つの継続と、下流 settlable の entry point
struct ReactionRecord<T, U, E> {
    on_fulfilled: OnFulfilled<T, U, E>,
    on_rejected: OnRejected<U, E>,
    resolve: ResolveHandle<U, E>,
    reject: RejectHandle<U, E>,
}

impl<T, U, E> React<T, E> for ReactionRecord<T, U, E>
where
    U: Clone + 'static,
    E: Clone + 'static,
{
    fn react(self: Box<Self>, settlement: Settlement<T, E>) -> Result<(), SettleError> {
        let record = *self;
        let outcome = match settlement {
            Settlement::Fulfilled(value) => (record.on_fulfilled)(value),
            Settlement::Rejected(reason) => (record.on_rejected)(reason),
        };
        match outcome {
            Ok(x) => record.resolve.resolve(x),
            Err(fault) => {
                tracing::debug!(
                    settlable = %record.reject.settlable().id(),
                    "continuation returned an error"
                );
                record.reject.reject(fault);
                Ok(())
            }
        }
    }
}

/// `reaction` を後続 turn で `settlement` とともに実行するよう積む
pub(crate) fn schedule_reaction<T: 'static, E: 'static>(
    scheduler: &SchedulerRef,
    reaction: Box<dyn React<T, E>>,
    settlement: Settlement<T, E>,
) {
    scheduler.schedule("reaction", Box::new(move || reaction.react(settlement)));
}

/// fulfillment 継続がない場合の素通し
fn pass_value<T: 'static, E: 'static>() -> OnFulfilled<T, T, E> {
    Box::new(|value| Ok(Resolution::Value(value)))
}

/// rejection 継続がない場合の再 reject
fn reraise<U: 'static, E: 'static>() -> OnRejected<U, E> {
    Box::new(|reason| Err(reason))
}

impl<T: Clone + 'static, E: Clone + 'static> Settlable<T, E> {
    /// 両方の継続を付けて下流 settlable を返す
    ///
    /// どちらか一方だけが後続 turn で実行される（`self` が settle 済みでも同じ）。
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Settlable<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> HandlerResult<U, E> + 'static,
        R: FnOnce(E) -> HandlerResult<U, E> + 'static,
    {
        self.then_boxed(Box::new(on_fulfilled), Box::new(on_rejected))
    }

    /// fulfillment のみ。rejection は同じ理由のまま下流に伝わる。
    pub fn then_fulfilled<U, F>(&self, on_fulfilled: F) -> Settlable<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> HandlerResult<U, E> + 'static,
    {
        self.then_boxed(Box::new(on_fulfilled), reraise())
    }

    /// rejection のみ。fulfillment は同じ値のまま伝わる。
    pub fn catch<R>(&self, on_rejected: R) -> Settlable<T, E>
    where
        R: FnOnce(E) -> HandlerResult<T, E> + 'static,
    {
        self.then_boxed(pass_value(), Box::new(on_rejected))
    }

    /// どちらの継続も省略可。省略した側は settlement をそのまま通す。
    pub fn then_with(
        &self,
        on_fulfilled: Option<OnFulfilled<T, T, E>>,
        on_rejected: Option<OnRejected<T, E>>,
    ) -> Settlable<T, E> {
        self.then_boxed(
            on_fulfilled.unwrap_or_else(pass_value),
            on_rejected.unwrap_or_else(reraise),
        )
    }

    fn then_boxed<U>(
        &self,
        on_fulfilled: OnFulfilled<T, U, E>,
        on_rejected: OnRejected<U, E>,
    ) -> Settlable<U, E>
    where
        U: Clone + 'static,
    {
        Settlable::new(&self.scheduler, |resolve, reject| {
            tracing::trace!(
                source = %self.id(),
                downstream = %resolve.settlable().id(),
                "reaction registered"
            );
            self.register(Box::new(ReactionRecord {
                on_fulfilled,
                on_rejected,
                resolve,
                reject,
            }));
            Ok(())
        })
    }
}
