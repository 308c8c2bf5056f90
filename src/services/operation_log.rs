//! Append-only, leveled record of what the core did, for display to the user.
//!
//! Emitting never fails and never blocks the operation being described.
//! Entries below the configured threshold are dropped; every kept entry is
//! also forwarded to `tracing`.

use crate::models::log_entry::{LogEntry, LogLevel};
use std::error::Error;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct OperationLog {
    threshold: LogLevel,
    entries: Mutex<Vec<LogEntry>>,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl OperationLog {
    pub fn new(threshold: LogLevel) -> Self {
        Self {
            threshold,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Build a log from a user-supplied level name. Unknown names fall back to
    /// `info`, and the fallback itself is logged.
    pub fn from_level_name(name: &str) -> Self {
        match name.parse::<LogLevel>() {
            Ok(level) => Self::new(level),
            Err(err) => {
                let log = Self::new(LogLevel::Info);
                log.info(format!("{err}, setting fallback log level to 'info'"));
                log
            }
        }
    }

    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }

    pub fn emit(&self, level: LogLevel, message: Vec<String>) {
        if level < self.threshold {
            return;
        }

        let line = message.join(": ");
        match level {
            LogLevel::Debug => debug!(target: "airlock::operation", "{line}"),
            LogLevel::Info => info!(target: "airlock::operation", "{line}"),
            LogLevel::Warning => warn!(target: "airlock::operation", "{line}"),
            LogLevel::Error => error!(target: "airlock::operation", "{line}"),
        }

        self.lock().push(LogEntry::new(level, message));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, vec![message.into()]);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, vec![message.into()]);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warning, vec![message.into()]);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, vec![message.into()]);
    }

    /// Log `err` at error level, one message line per layer of its source
    /// chain.
    pub fn emit_error(&self, err: &(dyn Error + 'static)) {
        self.emit(LogLevel::Error, structure_error(err));
    }

    pub fn emit_warning(&self, err: &(dyn Error + 'static)) {
        self.emit(LogLevel::Warning, structure_error(err));
    }

    /// Snapshot of all entries in emission order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Entries in the export line format.
    pub fn render(&self) -> Vec<String> {
        self.lock().iter().map(LogEntry::to_line).collect()
    }

    // A panic elsewhere must not take logging down with it.
    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Split an error into one line per layer of its source chain, each line
/// holding only that layer's own text.
pub fn structure_error(err: &(dyn Error + 'static)) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = Some(err);

    while let Some(layer) = current {
        let text = layer.to_string();
        let source = layer.source();
        let own = match source {
            Some(inner) => {
                let inner_text = inner.to_string();
                let outer = text
                    .strip_suffix(inner_text.as_str())
                    .map(|outer| outer.trim_end_matches([':', ' ']).to_string());
                outer.unwrap_or(text)
            }
            None => text,
        };
        if !own.is_empty() {
            lines.push(own);
        }
        current = source;
    }

    if lines.is_empty() {
        lines.push(err.to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AirlockError;
    use crate::probe::ProbeError;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped {
        context: &'static str,
        inner: Box<dyn Error + 'static>,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}: {}", self.context, self.inner)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self.inner.as_ref())
        }
    }

    #[test]
    fn entries_keep_emission_order() {
        let log = OperationLog::default();
        log.info("first");
        log.warning("second");
        log.error("third");

        let messages: Vec<String> = log.entries().iter().map(|e| e.headline().to_string()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[test]
    fn entries_below_threshold_are_dropped() {
        let log = OperationLog::new(LogLevel::Info);
        log.debug("noise");
        assert!(log.is_empty());

        let verbose = OperationLog::new(LogLevel::Debug);
        verbose.debug("noise");
        assert_eq!(verbose.len(), 1);
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let log = OperationLog::from_level_name("chatty");
        assert_eq!(log.threshold(), LogLevel::Info);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].headline().contains("`chatty` is not supported"));
    }

    #[test]
    fn source_chain_becomes_message_lines() {
        let err = Wrapped {
            context: "could not list objects",
            inner: Box::new(Wrapped {
                context: "request failed",
                inner: Box::new(std::io::Error::other("connection refused")),
            }),
        };
        assert_eq!(
            structure_error(&err),
            ["could not list objects", "request failed", "connection refused"]
        );
    }

    #[test]
    fn probe_failure_is_logged_with_its_cause() {
        let log = OperationLog::default();
        let err = AirlockError::ProbeUnavailable {
            bucket: "bucket".into(),
            source: ProbeError::Unreachable("timeout".into()),
        };
        log.emit_error(&err);

        let entry = &log.entries()[0];
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(
            entry.message,
            [
                "could not determine which objects already exist in bucket `bucket`",
                "storage backend unreachable: timeout",
            ]
        );
    }

    #[test]
    fn survives_a_poisoned_lock() {
        let log = std::sync::Arc::new(OperationLog::default());
        let clone = log.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.entries.lock().unwrap();
            panic!("poison");
        })
        .join();

        log.info("still works");
        assert_eq!(log.len(), 1);
    }
}
