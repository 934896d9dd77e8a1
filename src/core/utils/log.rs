/*!
 * Copyright (c) 2016 Microsoft Corporation. All rights reserved.
 * Licensed under the MIT License. See LICENSE file in the project root for
 * license information.
 */

use std::cell::RefCell;

/// Logging levels. Higher values are more verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Fatal error, reported just before the process gives up
    Fatal = -1,
    /// Potential issues
    Warning = 0,
    /// General progress messages
    Info = 1,
    /// Detailed debugging output
    Debug = 2,
}

impl From<i32> for LogLevel {
    fn from(value: i32) -> Self {
        match value {
            -1 => LogLevel::Fatal,
            0 => LogLevel::Warning,
            2 => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

/// Type alias for logging callback functions.
pub type LogCallback = fn(&str);

thread_local! {
    static LOG_LEVEL: RefCell<LogLevel> = const { RefCell::new(LogLevel::Info) };
    static LOG_CALLBACK: RefCell<Option<LogCallback>> = const { RefCell::new(None) };
}

/// Central logging facility. The level and sink are thread-local; logs go
/// to stdout unless a callback is installed.
#[derive(Debug)]
pub struct Log;

impl Log {
    /// Sets the current thread's logging level.
    pub fn reset_log_level(level: LogLevel) {
        LOG_LEVEL.with(|l| *l.borrow_mut() = level);
    }

    /// Sets the logging callback for the current thread. `None` restores
    /// the stdout sink.
    pub fn reset_callback(callback: Option<LogCallback>) {
        LOG_CALLBACK.with(|c| *c.borrow_mut() = callback);
    }

    pub fn debug(msg: &str) {
        Self::write(LogLevel::Debug, "Debug", msg);
    }

    pub fn info(msg: &str) {
        Self::write(LogLevel::Info, "Info", msg);
    }

    pub fn warning(msg: &str) {
        Self::write(LogLevel::Warning, "Warning", msg);
    }

    /// Logs a fatal message. The caller is expected to return an error
    /// right after; this only reports.
    pub fn fatal(msg: &str) {
        Self::write(LogLevel::Fatal, "Fatal", msg);
    }

    fn write(level: LogLevel, tag: &str, msg: &str) {
        let enabled = LOG_LEVEL.with(|l| *l.borrow() >= level);
        if !enabled {
            return;
        }
        let line = format!("[{}] {}", tag, msg);
        let callback = LOG_CALLBACK.with(|c| *c.borrow());
        match callback {
            Some(cb) => cb(&line),
            None => println!("{}", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(LogLevel::Debug > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Warning);
        assert!(LogLevel::Warning > LogLevel::Fatal);
    }

    #[test]
    fn level_from_i32() {
        assert_eq!(LogLevel::from(-1), LogLevel::Fatal);
        assert_eq!(LogLevel::from(7), LogLevel::Info);
    }
}
