//! Process-wide output channels keyed by logger name.
//!
//! Design:
//! - 同じ名前の Logger を何度作っても、channel の attach は最初の一回だけ
//! - 以降の Logger は既存の channel を共有するので、1 回のログ呼び出しで
//!   出力が重複することはない
//! - レコードは channel にだけ書き込み、`tracing` など上位には伝播しない

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

pub type Sink = Box<dyn Write + Send>;

/// One named output channel. Writes are line-atomic.
pub struct Channel {
    name: String,
    sink: Mutex<Sink>,
}

impl Channel {
    fn new(name: String, sink: Sink) -> Self {
        Self {
            name,
            sink: Mutex::new(sink),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut sink = lock(&self.sink);
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        sink.flush()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Registry of attached channels (logger name -> channel).
#[derive(Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
}

static GLOBAL: LazyLock<ChannelRegistry> = LazyLock::new(ChannelRegistry::default);

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every logger in the process.
    pub fn global() -> &'static ChannelRegistry {
        &GLOBAL
    }

    /// Return the channel for `name`, attaching one built by `make_sink` if
    /// none exists yet. `make_sink` is not called when the name is taken.
    pub fn attach_with<F>(&self, name: &str, make_sink: F) -> Arc<Channel>
    where
        F: FnOnce() -> Sink,
    {
        let mut channels = lock(&self.channels);
        if let Some(channel) = channels.get(name) {
            return Arc::clone(channel);
        }
        let channel = Arc::new(Channel::new(name.to_string(), make_sink()));
        channels.insert(name.to_string(), Arc::clone(&channel));
        tracing::debug!(logger = name, "attached output channel");
        channel
    }

    /// Attach stdout under `name` unless something is already attached.
    pub fn attach_stdout(&self, name: &str) -> Arc<Channel> {
        self.attach_with(name, || Box::new(io::stdout()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        lock(&self.channels).get(name).cloned()
    }

    /// Number of channels attached under `name` (0 or 1).
    pub fn attached_count(&self, name: &str) -> usize {
        usize::from(lock(&self.channels).contains_key(name))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CaptureSink;

    #[test]
    fn attach_is_idempotent_per_name() {
        let registry = ChannelRegistry::new();
        let first = CaptureSink::new();
        let second = CaptureSink::new();

        let sink = first.clone();
        let a = registry.attach_with("test", move || Box::new(sink));
        let sink = second.clone();
        let b = registry.attach_with("test", move || Box::new(sink));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.attached_count("test"), 1);

        b.write_line(r#"{"message":"once"}"#).unwrap();
        assert_eq!(first.lines().len(), 1);
        assert!(second.lines().is_empty());
    }

    #[test]
    fn make_sink_is_not_called_for_taken_names() {
        let registry = ChannelRegistry::new();
        registry.attach_with("taken", || Box::new(io::sink()));
        let mut called = false;
        registry.attach_with("taken", || {
            called = true;
            Box::new(io::sink())
        });
        assert!(!called);
    }

    #[test]
    fn distinct_names_get_distinct_channels() {
        let registry = ChannelRegistry::new();
        let a = registry.attach_with("a", || Box::new(io::sink()));
        let b = registry.attach_with("b", || Box::new(io::sink()));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "a");
        assert_eq!(registry.attached_count("missing"), 0);
        assert!(registry.get("b").is_some());
    }
}
