//! MessageAdapter port - envelope の unwrap / rewrap を行う外部コラボレータ
//!
//! 実体は cumulus-message-adapter（別プロセス）ですが、ここでは trait として
//! 抽象化し、テストでは in-process 実装に差し替えます。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Archive name the adapter is bundled under, relative to the task root.
pub const BUNDLED_ADAPTER_ARCHIVE: &str = "cumulus-message-adapter.zip";

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("message adapter not found in any of: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to start message adapter `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("message adapter command {command} failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("message adapter command {command} returned invalid JSON: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("message adapter io: {0}")]
    Io(#[from] std::io::Error),
}

/// Optional schema locations, relative to the task root.
///
/// Absent entries let the adapter fall back to `schemas/<kind>.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl SchemaPaths {
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.config.is_none() && self.output.is_none()
    }
}

/// Ordered adapter locations, highest precedence first.
///
/// Replaces mutating a global module search path: the loader gets the list
/// and picks the first entry that exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterSearchPath {
    locations: Vec<PathBuf>,
}

impl AdapterSearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front. Later insertions take priority.
    pub fn prepend(&mut self, location: impl Into<PathBuf>) {
        self.locations.insert(0, location.into());
    }

    /// Standard order: bundled archive (if present in `task_root`) lowest,
    /// explicit directory override highest.
    pub fn standard(task_root: &Path, adapter_dir: Option<&Path>) -> Self {
        let mut search = Self::new();
        let bundled = task_root.join(BUNDLED_ADAPTER_ARCHIVE);
        if bundled.is_file() {
            search.prepend(bundled);
        }
        if let Some(dir) = adapter_dir {
            search.prepend(dir);
        }
        search
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    pub fn first_existing(&self) -> Option<&Path> {
        self.locations.iter().map(PathBuf::as_path).find(|p| p.exists())
    }
}

/// The envelope transformation contract.
pub trait MessageAdapter {
    /// Fetch remote parts of the message (if any) and return the full event.
    fn load_and_update_remote_event(
        &self,
        event: &Value,
        context: &Value,
    ) -> Result<Value, AdapterError>;

    /// Business-logic-facing view of the full event.
    fn load_nested_event(&self, full_event: &Value) -> Result<Value, AdapterError>;

    /// Wrap a task result back into an outgoing envelope.
    fn create_next_event(
        &self,
        task_result: &Value,
        full_event: &Value,
        message_config: &Value,
    ) -> Result<Value, AdapterError>;
}

/// Constructs an adapter for one invocation.
pub trait AdapterLoader {
    fn load(
        &self,
        search: &AdapterSearchPath,
        schemas: &SchemaPaths,
    ) -> Result<Box<dyn MessageAdapter>, AdapterError>;
}
