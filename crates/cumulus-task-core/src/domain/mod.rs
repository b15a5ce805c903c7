//! Domain model: envelopes, execution context, metadata and task errors.
//!
//! ここは I/O を持たない純粋なモデル層です。
//! - path: ドット区切りパスによる envelope の探索
//! - context: 実行中の関数の識別情報
//! - metadata: ログに付与する識別メタデータ
//! - errors: タスク関数の失敗分類

pub mod context;
pub mod errors;
pub mod metadata;
pub mod path;

pub use self::context::{FunctionContext, LambdaContext, UNKNOWN};
pub use self::errors::{BoxError, TaskError, WORKFLOW_ERROR_MARKER};
pub use self::metadata::Metadata;
