// kernel/src/logger.rs
//
// Backend de `log` sobre el puerto serie: una línea por registro,
// `[LEVEL] target: mensaje`.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::serial_println;

pub struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            serial_println!("[{:>5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
