//! Log record construction.
//!
//! [`MessageBuilder::build`] は純粋な組み立てだけを行い、I/O は一切しません。
//! 組み立て順:
//! 1. mapping ならそのままベースレコードに、テキストなら `message` に
//! 2. 引数があるときだけプレースホルダ置換
//! 3. 例外情報を空白 1 つで連結
//! 4. メタデータをマージ（同名キーは上書き）
//! 5. `timestamp` を常に上書き
//! 6. `level` が無ければ `"info"`

use std::fmt;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{Map, Value};

use super::LogError;
use super::exception::ExcInfo;
use super::format::{FormatArgs, format_template};
use super::level::Severity;
use crate::domain::Metadata;
use crate::ports::{Clock, SystemClock};

pub const MESSAGE: &str = "message";
pub const LEVEL: &str = "level";
pub const TIMESTAMP: &str = "timestamp";

/// What the caller wants to log.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Used verbatim as the base record, so callers can pre-supply `level`
    /// or custom fields.
    Mapping(Map<String, Value>),
    Text(String),
}

impl Message {
    pub fn text(value: impl fmt::Display) -> Self {
        Message::Text(value.to_string())
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<Map<String, Value>> for Message {
    fn from(map: Map<String, Value>) -> Self {
        Message::Mapping(map)
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Message::Mapping(map),
            Value::String(s) => Message::Text(s),
            other => Message::Text(other.to_string()),
        }
    }
}

/// A complete, flat log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogRecord(Map<String, Value>);

impl LogRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn message(&self) -> Option<&str> {
        self.0.get(MESSAGE).and_then(Value::as_str)
    }

    pub fn level(&self) -> Option<&str> {
        self.0.get(LEVEL).and_then(Value::as_str)
    }

    pub fn set_level(&mut self, severity: Severity) {
        self.0
            .insert(LEVEL.to_string(), Value::String(severity.as_str().to_string()));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// One line of JSON.
    pub fn to_line(&self) -> Result<String, LogError> {
        serde_json::to_string(&self.0).map_err(LogError::Serialize)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
impl std::ops::Index<&str> for LogRecord {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        &self.0[key]
    }
}

/// Builds records carrying one invocation's metadata.
#[derive(Clone)]
pub struct MessageBuilder {
    metadata: Metadata,
    clock: Arc<dyn Clock>,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new(Metadata::unknown())
    }
}

impl MessageBuilder {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    pub fn build(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<LogRecord, LogError> {
        let mut record = match message.into() {
            Message::Mapping(map) => map,
            Message::Text(text) => {
                let text = if args.is_empty() {
                    text
                } else {
                    format_template(&text, args)?
                };
                let mut map = Map::new();
                map.insert(MESSAGE.to_string(), Value::String(text));
                map
            }
        };

        let traceback = exc_info.render();
        if !traceback.is_empty() {
            let text = match record.get(MESSAGE) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            record.insert(MESSAGE.to_string(), Value::String(join(&text, &traceback)));
        }

        self.metadata.write_into(&mut record);

        let timestamp = self.clock.now().to_rfc3339_opts(SecondsFormat::Micros, true);
        record.insert(TIMESTAMP.to_string(), Value::String(timestamp));

        if !record.contains_key(LEVEL) {
            record.insert(
                LEVEL.to_string(),
                Value::String(Severity::Info.as_str().to_string()),
            );
        }

        Ok(LogRecord(record))
    }
}

fn join(text: &str, traceback: &str) -> String {
    match (text.is_empty(), traceback.is_empty()) {
        (true, _) => traceback.to_string(),
        (_, true) => text.to_string(),
        _ => format!("{text} {traceback}"),
    }
}
