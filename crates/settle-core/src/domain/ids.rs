//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! settlable と turn の ID はどちらも ULID を使い、`Id<T>` という
//! 一つのジェネリック型で実装を共有します。
//!
//! ## Phantom Type パターン
//! `T` は実行時には使わないマーカー型（PhantomData）なので、
//! `SettlableId` が要る場所に `TurnId` を渡すとコンパイルエラーになります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"settlable-", "turn-"）を提供します。
pub trait IdMarker: 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettlableMarker {}

impl IdMarker for SettlableMarker {
    fn prefix() -> &'static str {
        "settlable-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TurnMarker {}

impl IdMarker for TurnMarker {
    fn prefix() -> &'static str {
        "turn-"
    }
}

/// settlable インスタンスの ID（ログと defect で使う）
pub type SettlableId = Id<SettlableMarker>;

/// event loop 上の遅延 turn 一つ分の ID
pub type TurnId = Id<TurnMarker>;
