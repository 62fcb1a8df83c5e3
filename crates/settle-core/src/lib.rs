//! settle-core
//!
//! 一度だけ settle する非同期値（Settlable）と、その継続を回す単一スレッドの event loop。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, settlement, events）
//! - **ports**: 抽象化レイヤー（Scheduler, IdGenerator, Clock）
//! - **settlable**: Settlable 本体（state machine, resolution procedure, then ファミリー）
//! - **impls**: 実装（EventLoop）
//! - config / error / observability: 設定・defect 型・カウンタ

pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod settlable;

pub use config::{ConfigError, LoopConfig};
pub use domain::{SettlableId, SettleEvent, SettleState, Settlement, TurnId};
pub use error::SettleError;
pub use impls::EventLoop;
pub use observability::LoopCounts;
pub use ports::{Scheduler, SchedulerRef};
pub use settlable::{
    Deferred, HandlerResult, RejectCallback, RejectHandle, Resolution, ResolveCallback,
    ResolveHandle, Settlable, Thenable,
};
