//! Execution context - 実行中の関数を識別する情報
//!
//! ホスト環境（AWS Lambda など）が渡すコンテキストの抽象化です。
//! 全フィールドが optional で、欠けている場合は `"unknown"` 扱いになります。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback used for `sender` / `version` when the context lacks them.
pub const UNKNOWN: &str = "unknown";

/// Anything that can identify the executing function.
///
/// Implemented for [`LambdaContext`] and for a mapping-shaped
/// `serde_json::Value`, so an empty `{}` is a valid context.
pub trait FunctionContext {
    fn function_name(&self) -> Option<String>;

    fn function_version(&self) -> Option<String>;

    fn invoked_function_arn(&self) -> Option<String> {
        None
    }

    /// Serializable view handed to the message adapter.
    fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(name) = self.function_name() {
            map.insert("function_name".into(), Value::String(name));
        }
        if let Some(version) = self.function_version() {
            map.insert("function_version".into(), Value::String(version));
        }
        if let Some(arn) = self.invoked_function_arn() {
            map.insert("invoked_function_arn".into(), Value::String(arn));
        }
        Value::Object(map)
    }
}

/// Lambda 風のコンテキスト。
///
/// `function_version` は数値で渡されることもあるため、デシリアライズ時は
/// 文字列・数値どちらも受け付けます。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub function_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoked_function_arn: Option<String>,
}

impl LambdaContext {
    pub fn new(function_name: impl Into<String>, function_version: impl Into<String>) -> Self {
        Self {
            function_name: Some(function_name.into()),
            function_version: Some(function_version.into()),
            invoked_function_arn: None,
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.invoked_function_arn = Some(arn.into());
        self
    }
}

impl FunctionContext for LambdaContext {
    fn function_name(&self) -> Option<String> {
        self.function_name.clone()
    }

    fn function_version(&self) -> Option<String> {
        self.function_version.clone()
    }

    fn invoked_function_arn(&self) -> Option<String> {
        self.invoked_function_arn.clone()
    }
}

impl FunctionContext for Value {
    fn function_name(&self) -> Option<String> {
        scalar_text(self.get("function_name")?)
    }

    fn function_version(&self) -> Option<String> {
        scalar_text(self.get("function_version")?)
    }

    fn invoked_function_arn(&self) -> Option<String> {
        scalar_text(self.get("invoked_function_arn")?)
    }
}

/// Render a scalar JSON value as plain text. Strings are unquoted, objects
/// and arrays are not considered scalars.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lambda_context_accepts_numeric_version() {
        let ctx: LambdaContext = serde_json::from_value(json!({
            "function_name": "function_name_example",
            "function_version": 1
        }))
        .unwrap();
        assert_eq!(ctx.function_name.as_deref(), Some("function_name_example"));
        assert_eq!(ctx.function_version.as_deref(), Some("1"));
        assert_eq!(ctx.invoked_function_arn, None);
    }

    #[test]
    fn empty_mapping_context_has_nothing() {
        let ctx = json!({});
        assert_eq!(ctx.function_name(), None);
        assert_eq!(ctx.function_version(), None);
        assert_eq!(ctx.to_value(), json!({}));
    }

    #[test]
    fn to_value_only_carries_present_fields() {
        let ctx = LambdaContext::new("fn", "3").with_arn("arn:aws:lambda:fn");
        assert_eq!(
            ctx.to_value(),
            json!({
                "function_name": "fn",
                "function_version": "3",
                "invoked_function_arn": "arn:aws:lambda:fn"
            })
        );
    }
}
