/// Console formatting and writing

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Utc;
use colored::Colorize;

pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let timestamp = Utc::now().format("%H:%M:%S%.3f");

    let level_str = match level {
        LogLevel::Error => level.as_str().red().bold(),
        LogLevel::Warning => level.as_str().yellow(),
        LogLevel::Info => level.as_str().green(),
        LogLevel::Debug => level.as_str().cyan(),
        LogLevel::Verbose => level.as_str().dimmed(),
    };

    let line = format!(
        "[{}] [{}] {}: {}",
        timestamp,
        tag.as_str().blue(),
        level_str,
        message
    );

    if level == LogLevel::Error {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}
