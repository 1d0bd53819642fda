//! Structured error value shared across every pipeline stage.
//!
//! Mirrors the shape of the Go original's `errs` package: a severity, a
//! kind, an ordered operation-path, an underlying cause and (at
//! debug/trace verbosity) captured frames. `thiserror` supplies the
//! `Display`/`std::error::Error` plumbing; `anyhow` stays at the CLI
//! boundary only.

use std::backtrace::Backtrace;
use std::fmt;
use std::time::SystemTime;

/// Coarse classification of what went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Kind {
    #[error("invalid value")]
    InvalidValue,
    #[error("io")]
    Io,
    #[error("stat")]
    Stat,
    #[error("not a directory")]
    NotDir,
    #[error("open file")]
    OpenFile,
    #[error("file stat")]
    FileStat,
    #[error("user lookup")]
    UserLookup,
    #[error("filesystem")]
    FilesystemOther,
    #[error("interrupted")]
    Interrupted,
    #[error("internal")]
    Internal,
}

/// How loudly an error should be surfaced. Ordered least to most severe so
/// that `severity >= threshold` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Severities handed to handlers at a given `log` verbosity, mirroring
    /// `logging.GetSeveritiesFilter4CurrentLogLevel()` in the original.
    pub fn enabled_at(level: log::LevelFilter) -> &'static [Severity] {
        use Severity::*;
        match level {
            log::LevelFilter::Off => &[Critical],
            log::LevelFilter::Error => &[Error, Critical],
            log::LevelFilter::Warn => &[Warning, Error, Critical],
            log::LevelFilter::Info => &[Info, Warning, Error, Critical],
            log::LevelFilter::Debug => &[Debug, Info, Warning, Error, Critical],
            log::LevelFilter::Trace => &[Trace, Debug, Info, Warning, Error, Critical],
        }
    }

    pub fn as_log_level(self) -> log::Level {
        match self {
            Severity::Trace => log::Level::Trace,
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::Critical => log::Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Ordered label stack appended at stage/worker entry instead of threading
/// format strings through every call site. Grounded on `errflow`'s
/// `cou.Operations` / `OperationPath()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct OperationPath(Vec<String>);

impl OperationPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `label` appended, leaving `self` untouched so a
    /// stage's base path can be reused across many workers.
    pub fn push(&self, label: impl Into<String>) -> Self {
        let mut labels = self.0.clone();
        labels.push(label.into());
        OperationPath(labels)
    }
}

impl fmt::Display for OperationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A single structured error flowing through a stage's error channel.
#[derive(Debug)]
pub struct Error {
    pub severity: Severity,
    pub kind: Kind,
    pub operation_path: OperationPath,
    pub timestamp: SystemTime,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    pub frames: Option<Backtrace>,
}

impl Error {
    pub fn new(
        kind: Kind,
        severity: Severity,
        operation_path: OperationPath,
        message: impl Into<String>,
    ) -> Self {
        let frames = if log::max_level() >= log::LevelFilter::Debug {
            Some(Backtrace::capture())
        } else {
            None
        };
        Error {
            severity,
            kind,
            operation_path,
            timestamp: SystemTime::now(),
            message: message.into(),
            source: None,
            frames,
        }
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn internal(operation_path: OperationPath, message: impl Into<String>) -> Self {
        Error::new(Kind::Internal, Severity::Critical, operation_path, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.severity, self.kind, self.operation_path, self.message
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Owned, `Display`-free snapshot of one `(severity, kind, operation_path)`
/// tally, safe to hand to a report/monitor after the `ErrorModerator`'s
/// `Encounter` has gone out of scope.
#[derive(Debug, Clone)]
pub struct ErrStatKeySnapshot {
    pub severity: Severity,
    pub kind: Kind,
    pub operation_path: String,
    pub count: usize,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new(Kind::Io, Severity::Warning, OperationPath::new(), e.to_string())
            .with_source(e)
    }
}

/// Extracts a human-readable message from a caught panic payload, mirroring
/// the Go original's `recover()` capturing whatever value `panic()` carried.
/// Used at each stage's worker task boundary (`std::panic::catch_unwind`) to
/// turn an unexpected fault into a `Critical` `Error` instead of letting it
/// silently kill the worker thread.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
