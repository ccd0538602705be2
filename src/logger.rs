//! A `log` backend that writes to standard error.

use std::io::{self, Write};
use std::str::FromStr;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Name of the environment variable holding the log level.
pub const LOG_LEVEL_VARIABLE: &str = "IMGTOOL_LOG";

const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

pub struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

/// Parse a level name such as `debug`, falling back to `warn`.
pub fn level_from(name: Option<&str>) -> LevelFilter {
    name.and_then(|s| LevelFilter::from_str(s.trim()).ok())
        .unwrap_or(DEFAULT_LEVEL)
}

/// Install the logger.  Only the first call installs anything; the level is
/// updated every time.
pub fn init(level: Option<&str>) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level_from(level));
}

impl Log for StderrLogger {
    #[inline]
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };
        let stderr = io::stderr();
        let mut stderr = stderr.lock();
        let _ = writeln!(stderr, "{}: {}", tag, record.args());
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from() {
        assert_eq!(level_from(None), LevelFilter::Warn);
        assert_eq!(level_from(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from(Some(" TRACE ")), LevelFilter::Trace);
        assert_eq!(level_from(Some("off")), LevelFilter::Off);
        assert_eq!(level_from(Some("loud")), LevelFilter::Warn);
    }
}
