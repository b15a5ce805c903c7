//! LocalAdapter - in-process message adapter (開発・テスト用)
//!
//! 外部の cumulus-message-adapter を起動せずに、最小限の unwrap / rewrap を
//! 行います。リモートメッセージの取得やスキーマ検証は行いません。
//!
//! - full event: `cma.event` があればそれを取り出し、なければ入力そのまま
//! - nested event: `{input: payload, config: task_config[<task>], messageConfig?}`
//! - next event: full event の `payload` をタスク結果で置換し `exception = "None"`

use serde_json::{Map, Value, json};

use crate::domain::path::{WRAPPED_PREFIX, resolve};
use crate::ports::{AdapterError, AdapterLoader, AdapterSearchPath, MessageAdapter, SchemaPaths};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAdapter;

impl LocalAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl MessageAdapter for LocalAdapter {
    fn load_and_update_remote_event(
        &self,
        event: &Value,
        _context: &Value,
    ) -> Result<Value, AdapterError> {
        Ok(resolve(WRAPPED_PREFIX, event).unwrap_or(event).clone())
    }

    fn load_nested_event(&self, full_event: &Value) -> Result<Value, AdapterError> {
        let mut config = full_event
            .get("cumulus_meta")
            .and_then(|meta| meta.get("task"))
            .and_then(Value::as_str)
            .and_then(|task| full_event.get("task_config")?.get(task))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let message_config = config
            .as_object_mut()
            .and_then(|cfg| cfg.remove("cumulus_message"));

        let mut nested = json!({
            "input": full_event.get("payload").cloned().unwrap_or(Value::Null),
            "config": config,
        });
        if let Some(message_config) = message_config {
            nested["messageConfig"] = message_config;
        }
        Ok(nested)
    }

    fn create_next_event(
        &self,
        task_result: &Value,
        full_event: &Value,
        _message_config: &Value,
    ) -> Result<Value, AdapterError> {
        let mut next = full_event.clone();
        if let Some(obj) = next.as_object_mut() {
            obj.insert("payload".to_string(), task_result.clone());
            obj.insert("exception".to_string(), Value::String("None".to_string()));
        }
        Ok(next)
    }
}

impl AdapterLoader for LocalAdapter {
    fn load(
        &self,
        _search: &AdapterSearchPath,
        _schemas: &SchemaPaths,
    ) -> Result<Box<dyn MessageAdapter>, AdapterError> {
        Ok(Box::new(*self))
    }
}
