//! Named, levelled logging façade over `tracing`.
//!
//! Perceptors receive a [`Logger`] from the host rather than talking to a
//! logging backend directly. Each named child logger is a *service*;
//! services can be enabled and disabled at runtime through any handle
//! sharing the same root. The registry lives in the root logger, not in
//! process-wide state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Severity of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine events.
    Info,
    /// Suspicious events.
    Warn,
    /// Failures.
    Error,
    /// Failures that panic in debug builds.
    DPanic,
    /// Failures that always panic.
    Panic,
    /// Failures that abort the process.
    Fatal,
}

/// A named logger handle.
///
/// Cloning is cheap; clones share one service registry.
#[derive(Clone)]
pub struct Logger {
    name: String,
    services: Arc<RwLock<HashMap<String, bool>>>,
}

impl Logger {
    /// Create a root logger named `app`.
    pub fn new() -> Self {
        let logger = Self {
            name: String::new(),
            services: Arc::new(RwLock::new(HashMap::new())),
        };
        logger.named("app")
    }

    /// Derive a child logger for a named service.
    ///
    /// The service is registered as enabled on first use.
    pub fn named(&self, name: &str) -> Logger {
        if let Ok(mut services) = self.services.write() {
            services.entry(name.to_string()).or_insert(true);
        }
        Logger {
            name: name.to_string(),
            services: Arc::clone(&self.services),
        }
    }

    /// Name of this logger's service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enable log output for a registered service.
    pub fn enable_service(&self, name: &str) {
        if let Ok(mut services) = self.services.write() {
            if let Some(enabled) = services.get_mut(name) {
                *enabled = true;
            }
        }
    }

    /// Disable log output for a registered service.
    pub fn disable_service(&self, name: &str) {
        if let Ok(mut services) = self.services.write() {
            if let Some(enabled) = services.get_mut(name) {
                *enabled = false;
            }
        }
    }

    /// Whether a service currently emits output. Unregistered services
    /// default to enabled.
    pub fn is_service_enabled(&self, name: &str) -> bool {
        self.services
            .read()
            .map(|services| services.get(name).copied().unwrap_or(true))
            .unwrap_or(true)
    }

    fn enabled(&self) -> bool {
        self.is_service_enabled(&self.name)
    }

    /// Log at the given level.
    pub fn log(&self, level: LogLevel, msg: &str) {
        if !self.enabled() {
            return;
        }
        match level {
            LogLevel::Debug => tracing::debug!(service = %self.name, "{msg}"),
            LogLevel::Info => tracing::info!(service = %self.name, "{msg}"),
            LogLevel::Warn => tracing::warn!(service = %self.name, "{msg}"),
            LogLevel::Error => tracing::error!(service = %self.name, "{msg}"),
            LogLevel::DPanic => {
                tracing::error!(service = %self.name, "{msg}");
                if cfg!(debug_assertions) {
                    panic!("{}: {msg}", self.name);
                }
            }
            LogLevel::Panic => {
                tracing::error!(service = %self.name, "{msg}");
                panic!("{}: {msg}", self.name);
            }
            LogLevel::Fatal => {
                tracing::error!(service = %self.name, "{msg}");
                std::process::exit(1);
            }
        }
    }

    /// Log diagnostic detail.
    pub fn debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg);
    }

    /// Log a routine event.
    pub fn info(&self, msg: &str) {
        self.log(LogLevel::Info, msg);
    }

    /// Log a suspicious event.
    pub fn warn(&self, msg: &str) {
        self.log(LogLevel::Warn, msg);
    }

    /// Log a failure.
    pub fn error(&self, msg: &str) {
        self.log(LogLevel::Error, msg);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a process-wide `tracing` subscriber printing up to `level`.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init(level: LogLevel) {
    let max = match level {
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        _ => tracing::Level::ERROR,
    };
    let _ = tracing_subscriber::fmt().with_max_level(max).try_init();
}
