//! Serial-backed implementation of the `log` facade.
//!
//! Records go straight to the raw serial sink rather than through the
//! console printer, so logging works before video bring-up and never
//! contends for the output lock.

use conquer_once::spin::OnceCell;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record};

use crate::hal::SerialSink;

static LOGGER: OnceCell<SerialLogger> = OnceCell::uninit();

struct SerialLogger {
    sink: &'static dyn SerialSink,
}

struct SinkWriter<'a>(&'a dyn SerialSink);

impl fmt::Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.0.put(b);
        }
        Ok(())
    }
}

impl Log for SerialLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut out = SinkWriter(self.sink);
        let _ = writeln!(
            out,
            "[{:5}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Install the serial logger. Later calls are no-ops, so re-entrant
/// bring-up paths stay harmless.
pub fn init(sink: &'static dyn SerialSink, level: LevelFilter) {
    if LOGGER.try_init_once(|| SerialLogger { sink }).is_err() {
        return;
    }
    if let Ok(logger) = LOGGER.try_get() {
        if log::set_logger(logger).is_ok() {
            log::set_max_level(level);
        }
    }
}
