//! Dotted-path lookup over nested JSON envelopes.
//!
//! `cumulus_meta.execution_name` のようなパスを `.` で分割して辿ります。
//! 途中でオブジェクト以外（配列・文字列・null など）に当たった場合は
//! エラーではなく「未解決」として扱います。

use serde_json::Value;

/// Prefix under which some orchestration front-ends nest the whole envelope.
pub const WRAPPED_PREFIX: &str = "cma.event";

/// Resolve a single dot-separated path.
///
/// A terminal `null` counts as absent, the same as a missing key.
pub fn resolve<'a>(path: &str, target: &'a Value) -> Option<&'a Value> {
    let mut current = target;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// Try each path in order and return the first one that resolves.
pub fn resolve_first<'a, S: AsRef<str>>(paths: &[S], target: &'a Value) -> Option<&'a Value> {
    paths.iter().find_map(|path| resolve(path.as_ref(), target))
}

/// Like [`resolve_first`], but falls back to an owned `default`.
pub fn resolve_or<S: AsRef<str>>(paths: &[S], target: &Value, default: Value) -> Value {
    resolve_first(paths, target).cloned().unwrap_or(default)
}

/// Expand natural paths into natural + `cma.event.`-prefixed candidates.
///
/// Natural paths come first so a direct-shape envelope wins when both shapes
/// are somehow present at once.
pub fn with_wrapped_prefix(paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.to_string())
        .chain(paths.iter().map(|p| format!("{WRAPPED_PREFIX}.{p}")))
        .collect()
}
