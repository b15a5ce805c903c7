//! App - アプリケーション層
//!
//! ports と logging を組み合わせて、1 回のタスク呼び出しを実装します。
//!
//! # 主要コンポーネント
//! - **InvokerConfig**: 環境変数から読む呼び出し設定
//! - **TaskInvoker**: adapter 経由でタスク関数を呼び、エラーを分類する
//! - **run_task**: 環境設定と外部 adapter を使う既定のエントリポイント

pub mod config;
pub mod invoker;

// 主要な型を再エクスポート
pub use self::config::InvokerConfig;
pub use self::invoker::{InvokeError, StepTask, TaskArgs, TaskInvoker, run_task};
