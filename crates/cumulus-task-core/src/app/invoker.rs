//! TaskInvoker - 1 回の呼び出しのライフサイクル
//!
//! ```text
//! INVOKING
//!   adapter disabled → task(event) ──────────────────────────────┐
//!   otherwise        → load_and_update_remote_event → full_event │
//!                    → load_nested_event            → nested     │
//!                    → task(nested)                              │
//! SUCCESS → create_next_event(result, full_event, message_config)│ (disabled: result as-is)
//! ERROR   → Workflow: 元の envelope に payload=null / exception=name を入れ、
//!                     "WorkflowError" を error で記録して返す
//!           Other:    error severity でログを残し、そのまま返す（伝播）
//! ```
//!
//! ロガーのメタデータは adapter を通す前の「元の」envelope から、
//! 呼び出しごとに一度だけ抽出します。

use serde_json::{Map, Value};

use crate::domain::{FunctionContext, TaskError, WORKFLOW_ERROR_MARKER};
use crate::impls::ProcessAdapterLoader;
use crate::logging::{
    ExcInfo, ExceptionInfo, FormatArgs, InFlight, LogError, Message, StepLogger,
};
use crate::ports::{AdapterError, AdapterLoader};

use super::config::InvokerConfig;

/// Extra named arguments forwarded unchanged to the task function.
pub type TaskArgs = Map<String, Value>;

const MESSAGE_CONFIG: &str = "messageConfig";

/// Business logic of one workflow step.
///
/// Closures of the matching shape implement this automatically:
/// ```ignore
/// let task = |event: Value, _ctx: &dyn FunctionContext, _args: &TaskArgs| Ok(event);
/// ```
pub trait StepTask {
    fn run(
        &self,
        event: Value,
        context: &dyn FunctionContext,
        args: &TaskArgs,
    ) -> Result<Value, TaskError>;
}

impl<F> StepTask for F
where
    F: Fn(Value, &dyn FunctionContext, &TaskArgs) -> Result<Value, TaskError>,
{
    fn run(
        &self,
        event: Value,
        context: &dyn FunctionContext,
        args: &TaskArgs,
    ) -> Result<Value, TaskError> {
        self(event, context, args)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The task's own error, unchanged.
    #[error(transparent)]
    Task(TaskError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Log(#[from] LogError),
}

impl InvokeError {
    pub fn into_task_error(self) -> Option<TaskError> {
        match self {
            InvokeError::Task(err) => Some(err),
            _ => None,
        }
    }
}

pub struct TaskInvoker {
    config: InvokerConfig,
    loader: Box<dyn AdapterLoader>,
    logger: StepLogger,
}

impl TaskInvoker {
    /// Invoker that logs to stdout under `config.logger_name`.
    pub fn new(config: InvokerConfig, loader: Box<dyn AdapterLoader>) -> Self {
        let logger = StepLogger::new(config.logger_name.clone(), config.log_level);
        Self::with_logger(config, loader, logger)
    }

    pub fn with_logger(
        config: InvokerConfig,
        loader: Box<dyn AdapterLoader>,
        logger: StepLogger,
    ) -> Self {
        Self {
            config,
            loader,
            logger,
        }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn run<T>(
        &self,
        task: &T,
        event: Value,
        context: &dyn FunctionContext,
        args: &TaskArgs,
    ) -> Result<Value, InvokeError>
    where
        T: StepTask + ?Sized,
    {
        let mut logger = self.logger.clone();
        logger.set_metadata(&event, context);

        if self.config.adapter_disabled {
            tracing::debug!("message adapter disabled, calling task directly");
            return match task.run(event.clone(), context, args) {
                Ok(result) => Ok(result),
                Err(err) => handle_task_error(err, event, &logger),
            };
        }

        let search = self.config.search_path();
        let adapter = self.loader.load(&search, &self.config.schemas)?;

        let full_event = adapter.load_and_update_remote_event(&event, &context.to_value())?;
        let nested_event = adapter.load_nested_event(&full_event)?;
        let message_config = nested_event
            .get(MESSAGE_CONFIG)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        match task.run(nested_event, context, args) {
            Ok(result) => Ok(adapter.create_next_event(&result, &full_event, &message_config)?),
            Err(err) => handle_task_error(err, event, &logger),
        }
    }
}

/// Workflow errors become a normal return; everything else propagates.
fn handle_task_error(
    err: TaskError,
    mut event: Value,
    logger: &StepLogger,
) -> Result<Value, InvokeError> {
    match err {
        TaskError::Workflow(name) => {
            tracing::debug!(%name, "task raised a workflow error");
            if !event.is_object() {
                event = Value::Object(Map::new());
            }
            if let Some(obj) = event.as_object_mut() {
                obj.insert("payload".to_string(), Value::Null);
                obj.insert("exception".to_string(), Value::String(name));
            }
            logger.error(WORKFLOW_ERROR_MARKER)?;
            Ok(event)
        }
        other => {
            let _in_flight = InFlight::enter(ExceptionInfo::capture(&other));
            if let Err(log_err) =
                logger.error_with(Message::text(&other), &FormatArgs::new(), &ExcInfo::Current)
            {
                tracing::warn!(%log_err, "could not log task failure");
            }
            Err(InvokeError::Task(other))
        }
    }
}

/// Run `task` with configuration from the environment and the external
/// message adapter.
pub fn run_task<T>(
    task: &T,
    event: Value,
    context: &dyn FunctionContext,
    args: &TaskArgs,
) -> Result<Value, InvokeError>
where
    T: StepTask + ?Sized,
{
    let invoker = TaskInvoker::new(
        InvokerConfig::from_env(),
        Box::new(ProcessAdapterLoader::default()),
    );
    invoker.run(task, event, context, args)
}
