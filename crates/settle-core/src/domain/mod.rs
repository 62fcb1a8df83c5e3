//! Domain - ドメインモデル（ids, state, settlement, events）

pub mod events;
pub mod ids;
pub mod outcome;
pub mod state;

pub use self::events::SettleEvent;
pub use self::ids::{Id, IdMarker, SettlableId, TurnId};
pub use self::outcome::Settlement;
pub use self::state::SettleState;
