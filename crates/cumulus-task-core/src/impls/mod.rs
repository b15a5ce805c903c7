//! Impls - ports の具体実装
//!
//! - LocalAdapter: in-process の簡易 message adapter（開発・テスト用）
//! - ProcessAdapter: 外部 cumulus-message-adapter をサブプロセスで呼ぶ本番用

pub mod local_adapter;
pub mod process_adapter;

pub use self::local_adapter::LocalAdapter;
pub use self::process_adapter::{ProcessAdapter, ProcessAdapterLoader};
