/// Central logging logic: flag parsing and filtering
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Messages above the minimum level threshold are dropped
/// 3. Debug level requires --debug-<module> for that tag
/// 4. Verbose level requires --verbose

use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Scan argv for --verbose, --quiet and --debug-<module> flags
pub fn init_from_args() {
    let mut config = LoggerConfig::default();

    for arg in std::env::args() {
        if arg == "--verbose" {
            config.min_level = LogLevel::Verbose;
        } else if arg == "--quiet" {
            config.min_level = LogLevel::Error;
        } else if let Some(module) = arg.strip_prefix("--debug-") {
            config.debug_tags.insert(module.to_string());
        }
    }

    *LOGGER_CONFIG.write() = config;
}

fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.debug_tags.contains(&tag.to_debug_key()) || config.debug_tags.contains("all")
}

pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let min_level = LOGGER_CONFIG.read().min_level;

    // Errors always log
    if level == LogLevel::Error {
        return true;
    }

    if level == LogLevel::Debug {
        return min_level >= LogLevel::Debug || is_debug_enabled_for_tag(tag);
    }

    if level == LogLevel::Verbose {
        return min_level == LogLevel::Verbose;
    }

    level <= min_level
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level, message);
}
