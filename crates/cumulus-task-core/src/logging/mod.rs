//! Logging - ステップ用の構造化ロガー
//!
//! - level: severity の語彙
//! - format: メッセージテンプレートの置換
//! - exception: 例外情報（traceback 風テキスト）
//! - message: LogRecord の組み立て（純粋）
//! - channel: ロガー名ごとのプロセス共有出力先
//! - logger: 上記をまとめた StepLogger

pub mod channel;
pub mod exception;
pub mod format;
pub mod level;
pub mod logger;
pub mod message;

pub use self::channel::{Channel, ChannelRegistry};
pub use self::exception::{ExcInfo, ExceptionInfo, InFlight};
pub use self::format::{FormatArgs, FormatError};
pub use self::level::Severity;
pub use self::logger::{DEFAULT_LOGGER_NAME, StepLogger};
pub use self::message::{LogRecord, Message, MessageBuilder};

/// Faults raised while building or emitting a record. Not caught anywhere in
/// this crate; callers supply well-formed, serializable content.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log message formatting failed: {0}")]
    Format(#[from] FormatError),

    #[error("log record serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("log output failed: {0}")]
    Io(#[from] std::io::Error),
}
