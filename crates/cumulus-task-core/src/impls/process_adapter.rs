//! ProcessAdapter - 外部の cumulus-message-adapter をサブプロセスで呼び出す
//!
//! 1 操作につき 1 回プロセスを起動し、JSON を stdin に書いて stdout の JSON を
//! 読みます。
//!
//! | operation                      | command                    | stdin                                                   |
//! |--------------------------------|----------------------------|---------------------------------------------------------|
//! | load_and_update_remote_event   | `loadAndUpdateRemoteEvent` | `{event, context, schemas}`                             |
//! | load_nested_event              | `loadNestedEvent`          | `{event, schemas}`                                      |
//! | create_next_event              | `createNextEvent`          | `{event, handler_response, message_config, schemas}`    |

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::{Value, json};

use crate::ports::{AdapterError, AdapterLoader, AdapterSearchPath, MessageAdapter, SchemaPaths};

pub const DEFAULT_PYTHON: &str = "python";

/// Prebuilt adapter binary inside an adapter directory.
const ADAPTER_BINARY: &str = "cma_bin/cma";

const LOAD_AND_UPDATE_REMOTE_EVENT: &str = "loadAndUpdateRemoteEvent";
const LOAD_NESTED_EVENT: &str = "loadNestedEvent";
const CREATE_NEXT_EVENT: &str = "createNextEvent";

#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    program: PathBuf,
    prefix_args: Vec<String>,
    schemas: SchemaPaths,
}

impl ProcessAdapter {
    /// Adapter at `location`: a directory holding `cma_bin/cma` runs that
    /// binary directly, anything else (archive, source directory) runs
    /// through `python`.
    pub fn at(location: &Path, python: &Path, schemas: SchemaPaths) -> Self {
        let binary = location.join(ADAPTER_BINARY);
        if location.is_dir() && binary.is_file() {
            Self::with_program(binary, Vec::new(), schemas)
        } else {
            Self::with_program(
                python.to_path_buf(),
                vec![location.to_string_lossy().into_owned()],
                schemas,
            )
        }
    }

    /// Explicit command line; the operation name is appended after `prefix_args`.
    pub fn with_program(program: PathBuf, prefix_args: Vec<String>, schemas: SchemaPaths) -> Self {
        Self {
            program,
            prefix_args,
            schemas,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn prefix_args(&self) -> &[String] {
        &self.prefix_args
    }

    fn schemas_value(&self) -> Value {
        if self.schemas.is_empty() {
            Value::Null
        } else {
            serde_json::to_value(&self.schemas).unwrap_or(Value::Null)
        }
    }

    fn call(&self, command: &str, input: &Value) -> Result<Value, AdapterError> {
        tracing::debug!(program = %self.program.display(), command, "calling message adapter");

        let mut child = Command::new(&self.program)
            .args(&self.prefix_args)
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let body = serde_json::to_vec(input).map_err(|source| AdapterError::Decode {
            command: command.to_string(),
            source,
        });
        // 書き込みの成否に関わらず必ず wait する。終了コードの失敗を先に報告
        let written = match (child.stdin.take(), &body) {
            (Some(mut stdin), Ok(body)) => stdin.write_all(body).map_err(AdapterError::from),
            _ => Ok(()),
        };
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(AdapterError::Failed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        body?;
        written?;

        serde_json::from_slice(&output.stdout).map_err(|source| AdapterError::Decode {
            command: command.to_string(),
            source,
        })
    }
}

impl MessageAdapter for ProcessAdapter {
    fn load_and_update_remote_event(
        &self,
        event: &Value,
        context: &Value,
    ) -> Result<Value, AdapterError> {
        let input = json!({
            "event": event,
            "context": context,
            "schemas": self.schemas_value(),
        });
        self.call(LOAD_AND_UPDATE_REMOTE_EVENT, &input)
    }

    fn load_nested_event(&self, full_event: &Value) -> Result<Value, AdapterError> {
        let input = json!({
            "event": full_event,
            "schemas": self.schemas_value(),
        });
        self.call(LOAD_NESTED_EVENT, &input)
    }

    fn create_next_event(
        &self,
        task_result: &Value,
        full_event: &Value,
        message_config: &Value,
    ) -> Result<Value, AdapterError> {
        let input = json!({
            "event": full_event,
            "handler_response": task_result,
            "message_config": message_config,
            "schemas": self.schemas_value(),
        });
        self.call(CREATE_NEXT_EVENT, &input)
    }
}

/// Loads a [`ProcessAdapter`] from the first existing search location.
#[derive(Debug, Clone)]
pub struct ProcessAdapterLoader {
    python: PathBuf,
}

impl Default for ProcessAdapterLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl ProcessAdapterLoader {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

impl AdapterLoader for ProcessAdapterLoader {
    fn load(
        &self,
        search: &AdapterSearchPath,
        schemas: &SchemaPaths,
    ) -> Result<Box<dyn MessageAdapter>, AdapterError> {
        let location = search
            .first_existing()
            .ok_or_else(|| AdapterError::NotFound {
                searched: search.locations().to_vec(),
            })?;
        tracing::debug!(location = %location.display(), "using message adapter");
        Ok(Box::new(ProcessAdapter::at(
            location,
            &self.python,
            schemas.clone(),
        )))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Fake adapter: echoes the command and the stdin document back.
    const ECHO_SCRIPT: &str = r#"input=$(cat)
printf '{"command":"%s","input":%s}' "$1" "$input"
"#;

    const FAILING_SCRIPT: &str = r#"cat >/dev/null
echo "schema validation failed" >&2
exit 3
"#;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn sh_adapter(script: &Path, schemas: SchemaPaths) -> ProcessAdapter {
        ProcessAdapter::with_program(
            PathBuf::from("sh"),
            vec![script.to_string_lossy().into_owned()],
            schemas,
        )
    }

    #[test]
    fn passes_command_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = sh_adapter(&script(dir.path(), "echo.sh", ECHO_SCRIPT), SchemaPaths::default());

        let out = adapter
            .load_and_update_remote_event(&json!({ "a": 1 }), &json!({ "function_name": "fn" }))
            .unwrap();
        assert_eq!(out["command"], "loadAndUpdateRemoteEvent");
        assert_eq!(out["input"]["event"], json!({ "a": 1 }));
        assert_eq!(out["input"]["context"]["function_name"], "fn");
        assert_eq!(out["input"]["schemas"], Value::Null);

        let out = adapter.load_nested_event(&json!({ "b": 2 })).unwrap();
        assert_eq!(out["command"], "loadNestedEvent");
        assert_eq!(out["input"]["event"], json!({ "b": 2 }));
    }

    #[test]
    fn create_next_event_sends_handler_response_and_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let schemas = SchemaPaths {
            output: Some("schemas/output.json".into()),
            ..SchemaPaths::default()
        };
        let adapter = sh_adapter(&script(dir.path(), "echo.sh", ECHO_SCRIPT), schemas);

        let out = adapter
            .create_next_event(&json!({ "ok": true }), &json!({ "full": 1 }), &json!({}))
            .unwrap();
        assert_eq!(out["command"], "createNextEvent");
        assert_eq!(out["input"]["handler_response"], json!({ "ok": true }));
        assert_eq!(out["input"]["message_config"], json!({}));
        assert_eq!(out["input"]["schemas"]["output"], "schemas/output.json");
    }

    #[test]
    fn non_zero_exit_is_reported_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = sh_adapter(&script(dir.path(), "fail.sh", FAILING_SCRIPT), SchemaPaths::default());

        let err = adapter.load_nested_event(&json!({})).unwrap_err();
        match err {
            AdapterError::Failed { command, stderr, .. } => {
                assert_eq!(command, "loadNestedEvent");
                assert_eq!(stderr, "schema validation failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn adapter_exiting_before_reading_stdin_reports_its_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let early_exit = script(
            dir.path(),
            "early.sh",
            "echo 'No module named message_adapter' >&2\nexit 2\n",
        );
        let adapter = sh_adapter(&early_exit, SchemaPaths::default());

        let large = json!({ "payload": "x".repeat(1 << 20) });
        let err = adapter.load_nested_event(&large).unwrap_err();
        match err {
            AdapterError::Failed { command, stderr, .. } => {
                assert_eq!(command, "loadNestedEvent");
                assert_eq!(stderr, "No module named message_adapter");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let adapter = ProcessAdapter::with_program(
            PathBuf::from("/definitely/not/a/real/adapter"),
            Vec::new(),
            SchemaPaths::default(),
        );
        let err = adapter.load_nested_event(&json!({})).unwrap_err();
        assert!(matches!(err, AdapterError::Spawn { .. }));
    }

    #[test]
    fn archive_location_runs_through_python() {
        let dir = tempfile::tempdir().unwrap();
        let archive = script(dir.path(), "cumulus-message-adapter.zip", "");
        let adapter = ProcessAdapter::at(&archive, Path::new("python3"), SchemaPaths::default());
        assert_eq!(adapter.program(), Path::new("python3"));
        assert_eq!(adapter.prefix_args(), [archive.to_string_lossy().into_owned()]);
    }

    #[test]
    fn directory_with_binary_runs_it_directly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cma_bin")).unwrap();
        let binary = script(dir.path(), "cma_bin/cma", "");
        let adapter = ProcessAdapter::at(dir.path(), Path::new("python"), SchemaPaths::default());
        assert_eq!(adapter.program(), binary.as_path());
        assert!(adapter.prefix_args().is_empty());
    }

    #[test]
    fn loader_reports_searched_locations() {
        let mut search = AdapterSearchPath::new();
        search.prepend("/no/such/adapter.zip");
        let err = ProcessAdapterLoader::default()
            .load(&search, &SchemaPaths::default())
            .err()
            .unwrap();
        match err {
            AdapterError::NotFound { searched } => {
                assert_eq!(searched, vec![PathBuf::from("/no/such/adapter.zip")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
