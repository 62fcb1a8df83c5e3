//! Ports - 抽象化レイヤー
//!
//! settlable とホスト（event loop）の境界。
//!
//! # 含まれる port
//! - **Scheduler**: 遅延実行（"run later"）
//! - **IdGenerator** / **Clock**: ログと defect 用の ID

pub mod clock;
pub mod id_generator;
pub mod scheduler;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::scheduler::{Scheduler, SchedulerRef, TurnJob};
