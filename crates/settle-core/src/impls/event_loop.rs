//! EventLoop - 単一スレッドのターンキュー
//!
//! # 学習ポイント
//! - `Rc<RefCell<..>>` による single-thread な共有状態（`!Send`）
//! - ジョブ実行前に borrow を解放する（再入可能にするため）
//! - `tokio::sync::Notify` で外部タスクからの schedule を待つ
//!
//! # 実装詳細
//! - `VecDeque<Turn>` で FIFO
//! - ターン内の defect は `run_*` / `drive` の戻り値で返す

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::Notify;

use crate::config::LoopConfig;
use crate::domain::{SettlableId, SettleEvent, Settlement, TurnId};
use crate::error::SettleError;
use crate::observability::LoopCounts;
use crate::ports::{IdGenerator, Scheduler, SchedulerRef, SystemClock, TurnJob, UlidGenerator};
use crate::settlable::{Deferred, RejectHandle, ResolveHandle, Settlable};

/// キューに積まれた作業一つ分
struct Turn {
    id: TurnId,
    label: &'static str,
    job: TurnJob,
}

/// loop と、その上で作られた全 settlable が共有する状態
struct LoopShared {
    config: LoopConfig,
    ids: Box<dyn IdGenerator>,

    /// 実行待ちの turn（古い順）
    queue: RefCell<VecDeque<Turn>>,

    /// まだ driver に返していない defect
    unsurfaced: RefCell<VecDeque<SettleError>>,

    /// `take_defects` までに発生した全 defect
    defects: RefCell<Vec<SettleError>>,

    counts: RefCell<LoopCounts>,

    /// `schedule` と `report_defect` のたびに通知（async driver が idle 中に眠れるように）
    notify: Notify,
}

impl LoopShared {
    fn push_defect(&self, defect: SettleError) {
        self.counts.borrow_mut().apply(&SettleEvent::Defect);
        self.unsurfaced.borrow_mut().push_back(defect.clone());
        self.defects.borrow_mut().push(defect);
    }
}

impl Scheduler for LoopShared {
    fn schedule(&self, label: &'static str, job: TurnJob) {
        let id = self.ids.generate_turn_id();
        tracing::trace!(turn = %id, label, "turn scheduled");
        self.queue.borrow_mut().push_back(Turn { id, label, job });
        self.counts.borrow_mut().turns_scheduled += 1;
        self.notify.notify_one();
    }

    fn next_settlable_id(&self) -> SettlableId {
        self.ids.generate_settlable_id()
    }

    fn config(&self) -> &LoopConfig {
        &self.config
    }

    fn record(&self, event: SettleEvent) {
        self.counts.borrow_mut().apply(&event);
    }

    fn report_defect(&self, defect: SettleError) {
        tracing::warn!(settlable = %defect.settlable(), %defect, "defect reported");
        self.push_defect(defect);
        // drive が notified() で待っている場合がある
        self.notify.notify_one();
    }
}

/// EventLoop は遅延 turn を FIFO 順に実行する単一スレッドの loop
///
/// loop 経由で作った settlable は loop へのハンドルを持つ。
/// `run_*` か `drive` を呼ぶまで何も実行されない。
///
/// # 使用例
/// ```ignore
/// let event_loop = EventLoop::default();
/// let settlable = event_loop.fulfilled::<i32, String>(1);
/// let next = settlable.then_fulfilled(|v| Ok(Resolution::Value(v + 1)));
/// event_loop.run_until_idle()?;
/// assert_eq!(next.value(), Some(2));
/// ```
pub struct EventLoop {
    shared: Rc<LoopShared>,
}

impl EventLoop {
    pub fn new(config: LoopConfig) -> Self {
        Self::with_id_generator(config, UlidGenerator::new(SystemClock))
    }

    pub fn with_id_generator(config: LoopConfig, ids: impl IdGenerator + 'static) -> Self {
        Self {
            shared: Rc::new(LoopShared {
                config,
                ids: Box::new(ids),
                queue: RefCell::new(VecDeque::new()),
                unsurfaced: RefCell::new(VecDeque::new()),
                defects: RefCell::new(Vec::new()),
                counts: RefCell::new(LoopCounts::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// `Settlable::new` などに渡す scheduler ハンドル
    pub fn handle(&self) -> SchedulerRef {
        self.shared.clone()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.shared.config
    }

    pub fn settlable<T, E, F>(&self, executor: F) -> Settlable<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnOnce(ResolveHandle<T, E>, RejectHandle<T, E>) -> Result<(), E>,
    {
        Settlable::new(&self.handle(), executor)
    }

    pub fn fulfilled<T: Clone + 'static, E: Clone + 'static>(&self, value: T) -> Settlable<T, E> {
        Settlable::fulfilled(&self.handle(), value)
    }

    pub fn rejected<T: Clone + 'static, E: Clone + 'static>(&self, reason: E) -> Settlable<T, E> {
        Settlable::rejected(&self.handle(), reason)
    }

    pub fn deferred<T: Clone + 'static, E: Clone + 'static>(&self) -> Deferred<T, E> {
        Deferred::new(&self.handle())
    }

    pub fn pending_turns(&self) -> usize {
        self.shared.queue.borrow().len()
    }

    pub fn counts(&self) -> LoopCounts {
        self.shared.counts.borrow().clone()
    }

    /// これまでの全 defect を取り出す（`run_*` で既に返したものも含む）
    pub fn take_defects(&self) -> Vec<SettleError> {
        self.shared.unsurfaced.borrow_mut().clear();
        std::mem::take(&mut *self.shared.defects.borrow_mut())
    }

    /// 最も古い turn を一つ実行。キューが空なら `Ok(false)`。
    pub fn run_once(&self) -> Result<bool, SettleError> {
        self.surface_defect()?;

        // borrow の解放後にジョブを実行する（ジョブ内で schedule されるため）
        let next = self.shared.queue.borrow_mut().pop_front();
        let Some(turn) = next else {
            return Ok(false);
        };

        tracing::trace!(turn = %turn.id, label = turn.label, "turn started");
        let result = (turn.job)();
        self.shared.record(SettleEvent::TurnRun(turn.id));

        if let Err(defect) = result {
            tracing::warn!(
                turn = %turn.id,
                settlable = %defect.settlable(),
                %defect,
                "turn raised a defect"
            );
            self.shared.push_defect(defect);
        }
        self.surface_defect()?;
        Ok(true)
    }

    /// キューが空になるか turn budget を使い切るまで実行。実行した turn 数を返す。
    pub fn run_until_idle(&self) -> Result<usize, SettleError> {
        let budget = self.shared.config.turn_budget;
        let mut ran = 0usize;
        while budget.is_none_or(|limit| ran < limit) {
            if !self.run_once()? {
                break;
            }
            ran += 1;
        }
        if ran > 0 {
            tracing::debug!(turns = ran, remaining = self.pending_turns(), "loop idle");
        }
        Ok(ran)
    }

    /// `settlable` が settle するか、実行するものがなくなるまで実行。
    /// `None` は pending のままキューが空になったことを表す。
    pub fn run_until_settled<T: Clone, E: Clone>(
        &self,
        settlable: &Settlable<T, E>,
    ) -> Result<Option<Settlement<T, E>>, SettleError> {
        self.surface_defect()?;
        loop {
            if let Some(settlement) = settlable.settlement() {
                return Ok(Some(settlement));
            }
            if !self.run_once()? {
                return Ok(None);
            }
        }
    }

    /// `settlable` が settle するまで loop を回す（キューが空の間は眠る）
    ///
    /// settlable は `!Send` なので `LocalSet` 上で動かすこと。
    /// 誰も `settlable` を settle しなければ永遠に待つ。
    pub async fn drive<T: Clone, E: Clone>(
        &self,
        settlable: &Settlable<T, E>,
    ) -> Result<Settlement<T, E>, SettleError> {
        loop {
            if let Some(settlement) = self.run_until_settled(settlable)? {
                return Ok(settlement);
            }
            if self.pending_turns() > 0 {
                tokio::task::yield_now().await;
            } else {
                self.shared.notify.notified().await;
            }
        }
    }

    fn surface_defect(&self) -> Result<(), SettleError> {
        match self.shared.unsurfaced.borrow_mut().pop_front() {
            Some(defect) => Err(defect),
            None => Ok(()),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default_v1())
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        // キュー内のジョブは `shared` を指す settlable を持っている（循環参照）
        let abandoned = std::mem::take(&mut *self.shared.queue.borrow_mut());
        if !abandoned.is_empty() {
            tracing::debug!(turns = abandoned.len(), "event loop dropped with queued turns");
        }
        drop(abandoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::settlable::{RejectCallback, Resolution, ResolveCallback, Thenable};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::cell::Cell;
    use std::time::Duration;
    use tokio::task::LocalSet;

    #[test]
    fn turns_run_in_fifo_order() {
        let event_loop = EventLoop::default();
        let scheduler = event_loop.handle();
        let log = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3 {
            let log = Rc::clone(&log);
            scheduler.schedule(
                "test",
                Box::new(move || {
                    log.borrow_mut().push(n);
                    Ok(())
                }),
            );
        }

        assert_eq!(event_loop.run_until_idle(), Ok(3));
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn turn_scheduled_from_a_turn_runs_after_queued_ones() {
        let event_loop = EventLoop::default();
        let scheduler = event_loop.handle();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (outer_log, inner_log) = (Rc::clone(&log), Rc::clone(&log));
        let inner_scheduler = Rc::clone(&scheduler);
        scheduler.schedule(
            "outer",
            Box::new(move || {
                outer_log.borrow_mut().push("outer");
                inner_scheduler.schedule(
                    "inner",
                    Box::new(move || {
                        inner_log.borrow_mut().push("inner");
                        Ok(())
                    }),
                );
                Ok(())
            }),
        );
        let tail_log = Rc::clone(&log);
        scheduler.schedule(
            "tail",
            Box::new(move || {
                tail_log.borrow_mut().push("tail");
                Ok(())
            }),
        );

        event_loop.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["outer", "tail", "inner"]);
    }

    #[rstest]
    #[case(None, 5, 0)]
    #[case(Some(2), 2, 3)]
    #[case(Some(10), 5, 0)]
    fn turn_budget_bounds_run_until_idle(
        #[case] budget: Option<usize>,
        #[case] expected_ran: usize,
        #[case] expected_left: usize,
    ) {
        let config = LoopConfig {
            turn_budget: budget,
            ..LoopConfig::default_v1()
        };
        let event_loop = EventLoop::new(config);
        let scheduler = event_loop.handle();
        for _ in 0..5 {
            scheduler.schedule("noop", Box::new(|| Ok(())));
        }

        assert_eq!(event_loop.run_until_idle(), Ok(expected_ran));
        assert_eq!(event_loop.pending_turns(), expected_left);
    }

    #[test]
    fn defect_from_a_turn_is_returned_and_retained() {
        let event_loop = EventLoop::default();
        let deferred = event_loop.deferred::<i32, String>();
        let defect = SettleError::ChainingCycle {
            settlable: deferred.settlable.id(),
        };

        let raised = defect.clone();
        event_loop
            .handle()
            .schedule("failing", Box::new(move || Err(raised)));
        event_loop.handle().schedule("after", Box::new(|| Ok(())));

        assert_eq!(event_loop.run_until_idle(), Err(defect.clone()));
        // 次の呼び出しで残りのキューを続けて実行
        assert_eq!(event_loop.run_until_idle(), Ok(1));
        assert_eq!(event_loop.take_defects(), vec![defect]);
        assert!(event_loop.take_defects().is_empty());
        assert_eq!(event_loop.counts().defects, 1);
    }

    #[test]
    fn run_until_settled_stops_early() {
        let event_loop = EventLoop::default();
        let first: Settlable<i32, String> = event_loop.fulfilled(1);
        let next = first.then_fulfilled(|v| Ok(Resolution::Value(v + 1)));
        let _unrelated = first.then_fulfilled(|v| Ok(Resolution::Value(v)));

        let settlement = event_loop.run_until_settled(&next).unwrap();

        assert_eq!(settlement, Some(Settlement::Fulfilled(2)));
        assert_eq!(event_loop.pending_turns(), 1);
    }

    #[test]
    fn run_until_settled_reports_starvation() {
        let event_loop = EventLoop::default();
        let deferred = event_loop.deferred::<i32, String>();

        assert_eq!(event_loop.run_until_settled(&deferred.settlable), Ok(None));
    }

    #[test]
    fn counts_track_lifecycle() {
        let event_loop = EventLoop::default();
        let ok: Settlable<i32, String> = event_loop.fulfilled(1);
        let _down = ok.then_fulfilled(|_| Err::<Resolution<i32, String>, _>("no".to_string()));
        let _waiting = event_loop.deferred::<i32, String>();

        event_loop.run_until_idle().unwrap();
        let counts = event_loop.counts();

        assert_eq!(counts.created, 3);
        assert_eq!(counts.fulfilled, 1);
        assert_eq!(counts.rejected, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.turns_scheduled, 1);
        assert_eq!(counts.turns_run, 1);
    }

    #[test]
    fn fixed_clock_ids_share_a_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ids = UlidGenerator::new(FixedClock::new(at));
        let event_loop = EventLoop::with_id_generator(LoopConfig::default(), ids);

        let a: Settlable<(), ()> = event_loop.fulfilled(());
        let b: Settlable<(), ()> = event_loop.fulfilled(());

        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().as_ulid().timestamp_ms(), b.id().as_ulid().timestamp_ms());
    }

    #[test]
    fn dropping_the_loop_discards_queued_turns() {
        let ran = Rc::new(Cell::new(false));
        let settlable = {
            let event_loop = EventLoop::default();
            let settlable: Settlable<i32, String> = event_loop.fulfilled(1);
            let flag = Rc::clone(&ran);
            let _ = settlable.then_fulfilled(move |v| {
                flag.set(true);
                Ok(Resolution::Value(v))
            });
            settlable
        };

        assert!(!ran.get());
        assert_eq!(settlable.value(), Some(1));
    }

    #[tokio::test]
    async fn drive_waits_for_a_timer_resolved_deferred() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let event_loop = EventLoop::default();
                let deferred = event_loop.deferred::<i32, String>();
                let doubled = deferred
                    .settlable
                    .then_fulfilled(|v| Ok(Resolution::Value(v * 2)));

                let resolve = deferred.resolve.clone();
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    resolve.fulfill(21);
                });

                let settlement = event_loop.drive(&doubled).await.unwrap();
                assert_eq!(settlement, Settlement::Fulfilled(42));
            })
            .await;
    }

    #[tokio::test]
    async fn drive_returns_defects() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let event_loop = EventLoop::default();
                let source: Settlable<i32, String> = event_loop.fulfilled(1);
                let slot: Rc<RefCell<Option<Settlable<i32, String>>>> = Rc::default();

                let own = Rc::clone(&slot);
                let looped = source.then_fulfilled(move |_| {
                    let me = own.borrow_mut().take().unwrap();
                    Ok(Resolution::Settlable(me))
                });
                *slot.borrow_mut() = Some(looped.clone());

                let err = event_loop.drive(&looped).await.unwrap_err();
                assert_eq!(err.settlable(), looped.id());
            })
            .await;
    }

    /// fulfillment コールバックを呼ばずに取っておく thenable
    struct Parked(Rc<RefCell<Option<ResolveCallback<i32, String>>>>);

    impl Thenable<i32, String> for Parked {
        fn then(
            &self,
            on_fulfilled: ResolveCallback<i32, String>,
            _on_rejected: RejectCallback<i32, String>,
        ) -> Result<(), String> {
            *self.0.borrow_mut() = Some(on_fulfilled);
            Ok(())
        }
    }

    #[tokio::test]
    async fn drive_wakes_for_a_defect_reported_outside_a_turn() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let event_loop = EventLoop::default();
                let target = event_loop.deferred::<i32, String>();
                let parked: Rc<RefCell<Option<ResolveCallback<i32, String>>>> = Rc::default();

                target
                    .resolve
                    .resolve(Resolution::thenable(Parked(Rc::clone(&parked))))
                    .unwrap();
                let callback = parked.borrow_mut().take().unwrap();

                let own = target.settlable.clone();
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    callback.resolve(own);
                });

                let err = tokio::time::timeout(
                    Duration::from_secs(5),
                    event_loop.drive(&target.settlable),
                )
                .await
                .unwrap()
                .unwrap_err();

                assert_eq!(
                    err,
                    SettleError::ChainingCycle {
                        settlable: target.settlable.id()
                    }
                );
                assert!(target.settlable.is_pending());
                assert_eq!(event_loop.take_defects().len(), 1);
            })
            .await;
    }
}
