//! Identifying metadata pulled out of an envelope and its execution context.
//!
//! Every envelope lookup is tried against both shapes: the direct one
//! (`cumulus_meta.execution_name`) and the wrapped one
//! (`cma.event.cumulus_meta.execution_name`). The caller never says which
//! shape it holds.

use serde_json::{Map, Value};

use super::context::{FunctionContext, UNKNOWN, scalar_text};
use super::path::{resolve, resolve_first, with_wrapped_prefix};

pub const ASYNC_OPERATION_ID: &str = "asyncOperationId";
pub const EXECUTIONS: &str = "executions";
pub const GRANULES: &str = "granules";
pub const PARENT_ARN: &str = "parentArn";
pub const SENDER: &str = "sender";
pub const STACK_NAME: &str = "stackName";
pub const VERSION: &str = "version";

const ASYNC_OPERATION_ID_PATHS: &[&str] = &["cumulus_meta.asyncOperationId"];
const EXECUTION_NAME_PATHS: &[&str] = &["cumulus_meta.execution_name"];
const PARENT_ARN_PATHS: &[&str] = &["cumulus_meta.parentExecutionArn"];
const STACK_PATHS: &[&str] = &["meta.stack"];
const GRANULE_LIST_PATHS: &[&str] = &["payload.granules", "meta.input_granules"];

/// Metadata attached to every log record.
///
/// `None` / empty values are never written into a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub async_operation_id: Option<String>,
    /// Execution name as a plain string.
    pub executions: Option<String>,
    /// JSON-encoded array of granule ids, e.g. `["id1", "id2"]`.
    pub granules: Option<String>,
    pub parent_arn: Option<String>,
    pub sender: String,
    pub stack_name: Option<String>,
    pub version: String,
}

impl Metadata {
    pub fn extract(event: &Value, context: &dyn FunctionContext) -> Self {
        Self {
            async_operation_id: lookup_text(ASYNC_OPERATION_ID_PATHS, event),
            executions: lookup_text(EXECUTION_NAME_PATHS, event),
            granules: granule_ids(event),
            parent_arn: lookup_text(PARENT_ARN_PATHS, event),
            sender: non_empty(context.function_name()).unwrap_or_else(|| UNKNOWN.to_string()),
            stack_name: lookup_text(STACK_PATHS, event),
            version: non_empty(context.function_version()).unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    /// Metadata for when nothing about the invocation is known yet.
    pub fn unknown() -> Self {
        Self {
            sender: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            ..Self::default()
        }
    }

    /// Merge into `record`, overwriting same-named keys.
    pub fn write_into(&self, record: &mut Map<String, Value>) {
        let fields = [
            (ASYNC_OPERATION_ID, self.async_operation_id.as_deref()),
            (EXECUTIONS, self.executions.as_deref()),
            (GRANULES, self.granules.as_deref()),
            (PARENT_ARN, self.parent_arn.as_deref()),
            (SENDER, Some(self.sender.as_str())),
            (STACK_NAME, self.stack_name.as_deref()),
            (VERSION, Some(self.version.as_str())),
        ];
        for (key, value) in fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                record.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
    }
}

fn lookup_text(paths: &[&str], event: &Value) -> Option<String> {
    let candidates = with_wrapped_prefix(paths);
    non_empty(resolve_first(candidates.as_slice(), event).and_then(scalar_text))
}

/// `payload.granules` が優先、なければ `meta.input_granules`。
/// `granuleId` を持たない要素は読み飛ばす。
fn granule_ids(event: &Value) -> Option<String> {
    let candidates = with_wrapped_prefix(GRANULE_LIST_PATHS);
    let list = candidates
        .iter()
        .filter_map(|path| resolve(path, event))
        .find_map(Value::as_array)?;

    let ids: Vec<String> = list
        .iter()
        .filter_map(|granule| resolve("granuleId", granule))
        .filter_map(scalar_text)
        .collect();

    if ids.is_empty() {
        return None;
    }
    serde_json::to_string(&ids).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
