//! Exception info attached to log messages.
//!
//! Rust has no ambient "current exception", so the invoker registers the
//! error it is handling with [`InFlight::enter`] for the duration of the
//! failure path. [`ExcInfo::Current`] reads that slot. Callers that hold the
//! error themselves pass it with [`ExcInfo::Explicit`].

use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt::Write as _;

/// Captured, renderable view of an error and its source chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
    pub causes: Vec<String>,
}

impl ExceptionInfo {
    /// Capture a concrete error. The type name is the last path segment of
    /// `E` (generic arguments stripped).
    pub fn capture<E>(err: &E) -> Self
    where
        E: StdError + ?Sized,
    {
        Self::with_type_name(short_type_name(std::any::type_name::<E>()), err)
    }

    /// Capture a type-erased error under an explicit type name.
    pub fn with_type_name<E>(type_name: impl Into<String>, err: &E) -> Self
    where
        E: StdError + ?Sized,
    {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !text.is_empty() {
                causes.push(text);
            }
            source = cause.source();
        }
        Self {
            type_name: type_name.into(),
            message: err.to_string(),
            causes,
        }
    }

    /// Multi-line traceback-style text.
    pub fn render(&self) -> String {
        let mut out = String::from("Traceback:\n");
        if self.message.is_empty() {
            out.push_str(&self.type_name);
        } else {
            let _ = write!(out, "{}: {}", self.type_name, self.message);
        }
        for cause in &self.causes {
            let _ = write!(out, "\nCaused by: {cause}");
        }
        out
    }
}

/// Which exception, if any, a log call should render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExcInfo {
    #[default]
    None,
    /// The error currently being handled on this thread, if any.
    Current,
    Explicit(ExceptionInfo),
}

impl ExcInfo {
    pub fn of<E>(err: &E) -> Self
    where
        E: StdError + ?Sized,
    {
        ExcInfo::Explicit(ExceptionInfo::capture(err))
    }

    /// Rendered text, or an empty string when nothing is available.
    pub fn render(&self) -> String {
        match self {
            ExcInfo::None => String::new(),
            ExcInfo::Current => InFlight::current()
                .map(|info| info.render())
                .unwrap_or_default(),
            ExcInfo::Explicit(info) => info.render(),
        }
    }
}

impl From<bool> for ExcInfo {
    fn from(flag: bool) -> Self {
        if flag { ExcInfo::Current } else { ExcInfo::None }
    }
}

thread_local! {
    static IN_FLIGHT: RefCell<Vec<ExceptionInfo>> = const { RefCell::new(Vec::new()) };
}

/// Guard marking an error as in flight on the current thread.
///
/// Guards nest; dropping one restores the previously in-flight error.
#[must_use = "the error is only in flight while the guard is alive"]
pub struct InFlight {
    _private: (),
}

impl InFlight {
    pub fn enter(info: ExceptionInfo) -> Self {
        IN_FLIGHT.with(|stack| stack.borrow_mut().push(info));
        Self { _private: () }
    }

    pub fn current() -> Option<ExceptionInfo> {
        IN_FLIGHT.with(|stack| stack.borrow().last().cloned())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
