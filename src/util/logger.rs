use log::{self, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::env;
use std::thread;

/// Adapted from SimpleLogger in crate `log`
struct TierMemLogger;

impl Log for TierMemLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let out = format!(
                "{:?}[{}:{}:{}] {}",
                thread::current().id(),
                record.level(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            );
            if record.level() <= Level::Warn {
                eprintln!("{}", out);
            } else {
                println!("{}", out);
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: TierMemLogger = TierMemLogger;

/// Install the logger, taking the level from `RUST_LOG` (default `INFO`).
pub fn try_init() -> Result<(), SetLoggerError> {
    match env::var("RUST_LOG") {
        Ok(level) => match level.to_uppercase().as_ref() {
            "OFF" => log::set_max_level(LevelFilter::Off),
            "ERROR" => log::set_max_level(LevelFilter::Error),
            "WARN" => log::set_max_level(LevelFilter::Warn),
            "INFO" => log::set_max_level(LevelFilter::Info),
            "DEBUG" => log::set_max_level(LevelFilter::Debug),
            "TRACE" => log::set_max_level(LevelFilter::Trace),
            _ => log::set_max_level(LevelFilter::Info),
        },
        Err(_) => log::set_max_level(LevelFilter::Info),
    }
    log::set_logger(&LOGGER)
}
