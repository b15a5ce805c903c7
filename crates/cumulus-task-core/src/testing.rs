//! Shared fixtures for unit tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::domain::LambdaContext;

pub fn create_event() -> Value {
    json!({
        "task_config": {
            "Example": {
                "foo": "wut",
                "cumulus_message": {}
            }
        },
        "cumulus_meta": {
            "task": "Example",
            "message_source": "local",
            "id": "id-1234",
            "execution_name": "123123",
            "asyncOperationId": "3141592654",
            "parentExecutionArn": "arn:foo"
        },
        "meta": {
            "foo": "bar",
            "stack": "Sleestak",
            "input_granules": [
                { "granuleId": "id1" },
                { "granuleId": "id2" }
            ]
        },
        "payload": {
            "anykey": "anyvalue"
        }
    })
}

/// Wrapped-shape event whose payload carries its own granules.
pub fn create_parameter_event() -> Value {
    let mut event = create_event();
    event["payload"] = json!({
        "granules": [
            { "granuleId": "parameter_id1" },
            { "granuleId": "parameter_id2" }
        ]
    });
    wrap(event)
}

pub fn wrap(event: Value) -> Value {
    json!({ "cma": { "event": event } })
}

pub fn lambda_context() -> LambdaContext {
    LambdaContext::new("function_name_example", "1")
        .with_arn("arn:aws:lambda:us-east-1:123:function:function_name_example:1")
}

/// In-memory sink that records every emitted line.
#[derive(Clone, Default)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<Value> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for CaptureSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Logger names are process-wide, so each test gets its own.
pub fn unique_logger_name(prefix: &str) -> String {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    format!("{prefix}-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}
