//! cumulus-task-core
//!
//! Building blocks for running one workflow step behind the Cumulus message
//! adapter, plus the structured step logger.
//!
//! # モジュール構成
//! - **domain**: 純粋なモデル（envelope パス探索, 実行コンテキスト, メタデータ, TaskError）
//! - **ports**: 抽象化レイヤー（MessageAdapter, AdapterLoader, Clock）
//! - **impls**: 実装（ProcessAdapter, 開発用の LocalAdapter）
//! - **logging**: メタデータ付き JSON ロガー（StepLogger）
//! - **app**: 呼び出しのライフサイクル（TaskInvoker, run_task）

pub mod app;
pub mod domain;
pub mod impls;
pub mod logging;
pub mod ports;

#[cfg(test)]
mod testing;

pub use crate::app::{InvokeError, InvokerConfig, StepTask, TaskArgs, TaskInvoker, run_task};
pub use crate::domain::{FunctionContext, LambdaContext, TaskError};
pub use crate::logging::{ExcInfo, FormatArgs, Message, Severity, StepLogger};
