//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **EventLoop**: `Scheduler` の single-thread 実装（FIFO turn queue）

pub mod event_loop;

pub use self::event_loop::EventLoop;
