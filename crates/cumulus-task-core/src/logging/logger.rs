//! StepLogger - メタデータ付きの構造化ロガー
//!
//! # 使用例
//! ```ignore
//! let mut logger = StepLogger::new("CumulusLog", Severity::Info);
//! logger.set_metadata(&event, &context);
//! logger.info("granules staged")?;
//! logger.warn_with("retrying {}", &FormatArgs::new().arg(id), &ExcInfo::None)?;
//! ```
//!
//! # Severity の決まり方
//! - 名前付きメソッド（`info` など）は自分の severity を強制
//! - `log` はレコードの `level` を見て、知らない名前ならロガーの既定 severity
//! - どちらの場合も、出力される `level` は実際に使った severity の正規名

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;

use super::LogError;
use super::channel::{Channel, ChannelRegistry};
use super::exception::ExcInfo;
use super::format::FormatArgs;
use super::level::Severity;
use super::message::{LogRecord, Message, MessageBuilder};
use crate::domain::{FunctionContext, Metadata};
use crate::ports::Clock;

pub const DEFAULT_LOGGER_NAME: &str = "CumulusLog";

/// Structured logger for one workflow step.
///
/// `level` is both the threshold below which records are dropped and the
/// severity used by [`StepLogger::log`] for records with an unrecognized
/// `level`.
#[derive(Clone)]
pub struct StepLogger {
    name: String,
    level: Severity,
    channel: Arc<Channel>,
    builder: MessageBuilder,
}

impl StepLogger {
    /// Logger writing to stdout through the process-wide registry.
    pub fn new(name: impl Into<String>, level: Severity) -> Self {
        let name = name.into();
        let channel = ChannelRegistry::global().attach_stdout(&name);
        Self::with_channel(name, level, channel)
    }

    /// Logger whose channel writes to `sink`, if `name` has no channel yet.
    /// An existing channel for `name` wins and `sink` is dropped.
    pub fn with_sink<W>(name: impl Into<String>, level: Severity, sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let name = name.into();
        let channel = ChannelRegistry::global().attach_with(&name, || Box::new(sink));
        Self::with_channel(name, level, channel)
    }

    pub fn with_channel(name: impl Into<String>, level: Severity, channel: Arc<Channel>) -> Self {
        Self {
            name: name.into(),
            level,
            channel,
            builder: MessageBuilder::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.builder = self.builder.with_clock(clock);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn metadata(&self) -> &Metadata {
        self.builder.metadata()
    }

    /// Extract identifying metadata once; every later record carries it.
    pub fn set_metadata(&mut self, event: &Value, context: &dyn FunctionContext) {
        self.builder.set_metadata(Metadata::extract(event, context));
    }

    pub fn create_message(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<LogRecord, LogError> {
        self.builder.build(message, args, exc_info)
    }

    /// Emit at the severity named by the record's own `level`.
    pub fn log(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        let record = self.create_message(message, args, exc_info)?;
        let severity = record
            .level()
            .and_then(Severity::parse)
            .unwrap_or(self.level);
        self.dispatch(record, severity)
    }

    /// Emit at a fixed severity, overriding any `level` in the message.
    pub fn at(
        &self,
        severity: Severity,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        let record = self.create_message(message, args, exc_info)?;
        self.dispatch(record, severity)
    }

    // 名前付きメソッド。`*_with` はテンプレート引数と例外情報を受け取る版
    pub fn trace(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.trace_with(message, &FormatArgs::new(), &ExcInfo::None)
    }

    pub fn trace_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.at(Severity::Trace, message, args, exc_info)
    }

    pub fn debug(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.debug_with(message, &FormatArgs::new(), &ExcInfo::None)
    }

    pub fn debug_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.at(Severity::Debug, message, args, exc_info)
    }

    pub fn info(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.info_with(message, &FormatArgs::new(), &ExcInfo::None)
    }

    pub fn info_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.at(Severity::Info, message, args, exc_info)
    }

    pub fn warn(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.warn_with(message, &FormatArgs::new(), &ExcInfo::None)
    }

    pub fn warn_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.at(Severity::Warn, message, args, exc_info)
    }

    pub fn warning(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.warn(message)
    }

    pub fn warning_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.warn_with(message, args, exc_info)
    }

    pub fn error(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.error_with(message, &FormatArgs::new(), &ExcInfo::None)
    }

    pub fn error_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.at(Severity::Error, message, args, exc_info)
    }

    pub fn fatal(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.fatal_with(message, &FormatArgs::new(), &ExcInfo::None)
    }

    pub fn fatal_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.at(Severity::Fatal, message, args, exc_info)
    }

    pub fn critical(&self, message: impl Into<Message>) -> Result<(), LogError> {
        self.fatal(message)
    }

    pub fn critical_with(
        &self,
        message: impl Into<Message>,
        args: &FormatArgs,
        exc_info: &ExcInfo,
    ) -> Result<(), LogError> {
        self.fatal_with(message, args, exc_info)
    }

    fn dispatch(&self, mut record: LogRecord, severity: Severity) -> Result<(), LogError> {
        record.set_level(severity);
        if severity < self.level {
            return Ok(());
        }
        let line = record.to_line()?;
        self.channel.write_line(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::exception::{ExceptionInfo, InFlight};
    use crate::testing::{CaptureSink, create_event, lambda_context, unique_logger_name};
    use serde_json::json;

    fn logger(level: Severity) -> (StepLogger, CaptureSink) {
        let sink = CaptureSink::new();
        let mut logger =
            StepLogger::with_sink(unique_logger_name("logger"), level, sink.clone());
        logger.set_metadata(&create_event(), &lambda_context());
        (logger, sink)
    }

    #[test]
    fn named_methods_force_their_level() {
        let (logger, sink) = logger(Severity::Trace);
        logger.trace("t").unwrap();
        logger.debug("d").unwrap();
        logger.info(json!({ "message": "i", "level": "fatal" })).unwrap();
        logger.warning("w").unwrap();
        logger.error("e").unwrap();
        logger.critical("c").unwrap();

        let levels: Vec<_> = sink
            .lines()
            .iter()
            .map(|line| line["level"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(levels, ["trace", "debug", "info", "warn", "error", "fatal"]);
    }

    #[test]
    fn log_uses_recognized_record_level() {
        let (logger, sink) = logger(Severity::Info);
        let none = (FormatArgs::new(), ExcInfo::None);
        logger
            .log(json!({ "message": "m", "level": "WARNING" }), &none.0, &none.1)
            .unwrap();
        logger
            .log(json!({ "message": "m", "level": "Critical" }), &none.0, &none.1)
            .unwrap();
        let lines = sink.lines();
        assert_eq!(lines[0]["level"], "warn");
        assert_eq!(lines[1]["level"], "fatal");
    }

    #[test]
    fn log_falls_back_to_default_severity() {
        let (logger, sink) = logger(Severity::Warn);
        let none = (FormatArgs::new(), ExcInfo::None);
        logger
            .log(json!({ "message": "m", "level": "loud" }), &none.0, &none.1)
            .unwrap();
        logger.log("plain text", &none.0, &none.1).unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "warn");
        assert_eq!(lines[0]["message"], "m");
    }

    #[test]
    fn records_below_threshold_are_dropped() {
        let (logger, sink) = logger(Severity::Info);
        logger.debug("test logging level debug").unwrap();
        logger.info("test logging level info").unwrap();
        logger.warning("test logging level warning").unwrap();
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], "test logging level info");
    }

    #[test]
    fn emitted_record_is_one_json_line_with_metadata() {
        let (logger, sink) = logger(Severity::Info);
        logger
            .at(
                Severity::Error,
                "granule {} failed",
                &FormatArgs::new().arg("id1"),
                &ExcInfo::None,
            )
            .unwrap();
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["message"], "granule id1 failed");
        assert_eq!(line["executions"], "123123");
        assert_eq!(line["stackName"], "Sleestak");
        assert!(line["timestamp"].is_string());
    }

    #[test]
    fn exc_info_reaches_the_output() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let (logger, sink) = logger(Severity::Info);
        let _guard = InFlight::enter(ExceptionInfo::capture(&Boom));
        logger
            .at(Severity::Fatal, "test exc_info", &FormatArgs::new(), &ExcInfo::Current)
            .unwrap();
        let message = sink.lines()[0]["message"].as_str().unwrap().to_string();
        assert!(message.contains("test exc_info"));
        assert!(message.contains("Boom: boom"));
    }

    #[test]
    fn named_methods_format_and_attach_exception_info() {
        #[derive(Debug, thiserror::Error)]
        #[error("division by zero")]
        struct ZeroDivisionError;

        let (logger, sink) = logger(Severity::Info);
        let _guard = InFlight::enter(ExceptionInfo::capture(&ZeroDivisionError));
        logger
            .warn_with(
                "test formatted {} exc_info",
                &FormatArgs::new().arg("bar"),
                &ExcInfo::Current,
            )
            .unwrap();
        logger
            .critical_with("test exc_info", &FormatArgs::new(), &ExcInfo::from(false))
            .unwrap();

        let lines = sink.lines();
        assert_eq!(lines[0]["level"], "warn");
        let message = lines[0]["message"].as_str().unwrap();
        assert!(message.starts_with("test formatted bar exc_info Traceback:"));
        assert!(message.contains("ZeroDivisionError: division by zero"));

        assert_eq!(lines[1]["level"], "fatal");
        assert_eq!(lines[1]["message"], "test exc_info");
    }

    #[test]
    fn same_name_loggers_share_one_channel() {
        let name = unique_logger_name("shared");
        let first = CaptureSink::new();
        let second = CaptureSink::new();

        let logger1 = StepLogger::with_sink(name.clone(), Severity::Info, first.clone());
        assert_eq!(ChannelRegistry::global().attached_count(&name), 1);

        let logger2 = StepLogger::with_sink(name.clone(), Severity::Info, second.clone());
        assert_eq!(ChannelRegistry::global().attached_count(&name), 1);

        logger1.info("from one").unwrap();
        logger2.info("from two").unwrap();
        assert_eq!(first.lines().len(), 2);
        assert!(second.lines().is_empty());
    }

    #[test]
    fn without_metadata_sender_and_version_are_unknown() {
        let sink = CaptureSink::new();
        let logger = StepLogger::with_sink(unique_logger_name("bare"), Severity::Info, sink.clone());
        logger.info("bare").unwrap();
        let line = &sink.lines()[0];
        assert_eq!(line["sender"], "unknown");
        assert_eq!(line["version"], "unknown");
        assert!(line.get("executions").is_none());
    }
}
