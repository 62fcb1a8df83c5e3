//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock で timestamp を決める）

use crate::domain::ids::{SettlableId, TurnId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は event loop 用の ID を生成
pub trait IdGenerator {
    fn generate_settlable_id(&self) -> SettlableId;

    fn generate_turn_id(&self) -> TurnId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// timestamp 部分は Clock から、残りは乱数。
/// テスト時に FixedClock を使えば timestamp を固定できます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_settlable_id(&self) -> SettlableId {
        SettlableId::from(self.next_ulid())
    }

    fn generate_turn_id(&self) -> TurnId {
        TurnId::from(self.next_ulid())
    }
}
