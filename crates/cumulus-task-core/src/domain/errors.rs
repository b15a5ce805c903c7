//! Errors - タスク関数が返すエラーと分類
//!
//! タスク関数の失敗は 2 種類に分類されます。
//! - **Workflow**: ワークフロー上の「業務的な失敗」。例外を送出せず、
//!   `payload = null` / `exception = <name>` を持つ envelope として返す
//! - **Other**: それ以外。ログに残して呼び出し元へそのまま伝播

use std::error::Error as StdError;
use std::fmt;

/// Marker that tags a failure as a recoverable workflow error.
pub const WORKFLOW_ERROR_MARKER: &str = "WorkflowError";

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure returned by a task function.
#[derive(Debug)]
pub enum TaskError {
    /// A business failure the workflow knows how to route. The name ends up in
    /// the outgoing envelope's `exception` field.
    Workflow(String),

    /// Anything else. Propagated unchanged.
    Other(BoxError),
}

impl TaskError {
    pub fn workflow(name: impl Into<String>) -> Self {
        Self::Workflow(name.into())
    }

    pub fn other<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Other(err.into())
    }

    /// Classify free text by looking for [`WORKFLOW_ERROR_MARKER`].
    ///
    /// Only for callers that cannot construct the variant themselves. The
    /// whole text becomes the workflow error name.
    pub fn classify(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.contains(WORKFLOW_ERROR_MARKER) {
            Self::Workflow(text)
        } else {
            Self::Other(Box::new(Message(text)))
        }
    }

    /// An error carrying no classification text at all. Always `Other`.
    pub fn empty() -> Self {
        Self::Other(Box::new(Message(String::new())))
    }

    pub fn is_workflow(&self) -> bool {
        matches!(self, Self::Workflow(_))
    }

    /// Name used for the `exception` field, if this is a workflow error.
    pub fn workflow_name(&self) -> Option<&str> {
        match self {
            Self::Workflow(name) => Some(name),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workflow(name) => f.write_str(name),
            Self::Other(err) => err.fmt(f),
        }
    }
}

impl StdError for TaskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Workflow(_) => None,
            Self::Other(err) => Some(err.as_ref()),
        }
    }
}

/// Plain-text error used by [`TaskError::classify`] and [`TaskError::empty`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Message(pub String);
