//! Ports - 抽象化レイヤー
//!
//! 外部コラボレータ（message adapter, 時刻）へのインターフェースを定義します。
//! 実装は `impls` にあり、テストでは差し替え可能です。

pub mod adapter;
pub mod clock;

// 主要な trait を再エクスポート
pub use self::adapter::{
    AdapterError, AdapterLoader, AdapterSearchPath, MessageAdapter, SchemaPaths,
};
pub use self::clock::{Clock, FixedClock, SystemClock};
