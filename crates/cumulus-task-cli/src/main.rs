use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::debug;

use cumulus_task_core::impls::{LocalAdapter, ProcessAdapterLoader};
use cumulus_task_core::logging::{ExcInfo, FormatArgs, Severity, StepLogger};
use cumulus_task_core::ports::{AdapterLoader, SchemaPaths};
use cumulus_task_core::{FunctionContext, InvokerConfig, TaskArgs, TaskError, TaskInvoker};

#[derive(Parser)]
#[command(name = "cumulus-task")]
#[command(about = "Run a workflow step behind the Cumulus message adapter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the identity task on an event and print the outgoing envelope
    Run(RunArgs),
    /// Emit one step log record for an event
    Log(LogArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Event JSON file, `-` reads stdin
    #[arg(long, default_value = "-")]
    event: String,

    /// Execution context JSON file (function_name, function_version, ...)
    #[arg(long)]
    context: Option<PathBuf>,

    /// Step logger threshold; overrides LOG_LEVEL
    #[arg(long)]
    log_level: Option<Severity>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Call the task directly, bypassing the message adapter
    #[arg(long)]
    adapter_disabled: bool,

    /// Message adapter location searched before the bundled archive
    #[arg(long)]
    adapter_dir: Option<PathBuf>,

    /// Use the in-process adapter instead of spawning the external one
    #[arg(long, conflicts_with = "adapter_dir")]
    local_adapter: bool,

    /// Interpreter used for archive or source adapter locations
    #[arg(long, default_value = "python")]
    python: PathBuf,

    #[arg(long)]
    schemas_input: Option<String>,

    #[arg(long)]
    schemas_config: Option<String>,

    #[arg(long)]
    schemas_output: Option<String>,

    /// Extra task argument as KEY=VALUE (VALUE is parsed as JSON when possible)
    #[arg(long = "task-arg", value_name = "KEY=VALUE")]
    task_args: Vec<String>,
}

#[derive(Args)]
struct LogArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Severity of the emitted record
    #[arg(long, default_value = "info")]
    level: Severity,

    /// Message template (`{}` / `{0}` placeholders)
    message: String,

    /// Positional template arguments
    args: Vec<String>,
}

fn main() -> Result<()> {
    // stdout は JSON レコード / envelope 専用。診断は stderr へ
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Log(args) => log(args),
    }
}

/// Returns its event unchanged.
fn identity(
    event: Value,
    _context: &dyn FunctionContext,
    _args: &TaskArgs,
) -> Result<Value, TaskError> {
    Ok(event)
}

fn run(args: RunArgs) -> Result<()> {
    let event = read_event(&args.input.event)?;
    let context = read_context(args.input.context.as_deref())?;

    let mut config = InvokerConfig::from_env().with_schemas(SchemaPaths {
        input: args.schemas_input,
        config: args.schemas_config,
        output: args.schemas_output,
    });
    config.adapter_disabled |= args.adapter_disabled;
    if let Some(dir) = args.adapter_dir {
        config.adapter_dir = Some(dir);
    }
    if let Some(level) = args.input.log_level {
        config.log_level = level;
    }
    debug!(?config, "invoker configuration");

    let loader: Box<dyn AdapterLoader> = if args.local_adapter {
        Box::new(LocalAdapter::new())
    } else {
        Box::new(ProcessAdapterLoader::new(args.python))
    };
    let task_args = parse_task_args(&args.task_args)?;

    let invoker = TaskInvoker::new(config, loader);
    let response = invoker.run(&identity, event, &context, &task_args)?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

fn log(args: LogArgs) -> Result<()> {
    let event = read_event(&args.input.event)?;
    let context = read_context(args.input.context.as_deref())?;

    let config = InvokerConfig::from_env();
    let threshold = args.input.log_level.unwrap_or(config.log_level);
    let mut logger = StepLogger::new(config.logger_name, threshold);
    logger.set_metadata(&event, &context);

    let format_args = FormatArgs::positional(args.args);
    logger.at(args.level, args.message, &format_args, &ExcInfo::None)?;
    Ok(())
}

fn read_event(source: &str) -> Result<Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read event from stdin")?;
        buf
    } else {
        fs::read_to_string(source).with_context(|| format!("failed to read event {source}"))?
    };
    serde_json::from_str(&text).context("event is not valid JSON")
}

/// A missing context file means an empty mapping context.
fn read_context(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(Map::new()));
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read context {}", path.display()))?;
    serde_json::from_str(&text).context("context is not valid JSON")
}

fn parse_task_args(raw: &[String]) -> Result<TaskArgs> {
    let mut args = TaskArgs::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            bail!("task argument `{item}` is not KEY=VALUE");
        };
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        args.insert(key.to_string(), value);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn task_args_parse_json_values_and_fall_back_to_strings() {
        let args = parse_task_args(&["one=1".to_string(), "two=plain".to_string()]).unwrap();
        assert_eq!(args["one"], json!(1));
        assert_eq!(args["two"], json!("plain"));
        assert!(parse_task_args(&["broken".to_string()]).is_err());
    }

    #[test]
    fn missing_context_is_an_empty_mapping() {
        let context = read_context(None).unwrap();
        assert_eq!(context, json!({}));
        assert_eq!(context.function_name(), None);
    }
}
