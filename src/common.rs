// Licensed under the Apache-2.0 license

//! Logging plumbing shared by the driver modules.
//!
//! Drivers are generic over a [`Logger`] so that production images can route
//! messages to a UART while tests and size-constrained builds use
//! [`NoOpLogger`]. Messages are passed as [`core::fmt::Arguments`], which keeps
//! the hot paths allocation-free.

use core::fmt;
use embedded_io::Write as _;

/// Severity of a log line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Debug => "DBG",
            Level::Info => "INF",
            Level::Error => "ERR",
        }
    }
}

pub trait Logger {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    fn info(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// Discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&mut self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Writes one line per message to an `embedded_io` sink, typically a UART.
///
/// Lines below `min_level` are dropped. Write errors are ignored: a broken
/// console must never change the outcome of a bus transaction.
pub struct WriterLogger<W: embedded_io::Write> {
    writer: W,
    min_level: Level,
}

impl<W: embedded_io::Write> WriterLogger<W> {
    pub fn new(writer: W, min_level: Level) -> Self {
        Self { writer, min_level }
    }

    pub fn set_level(&mut self, min_level: Level) {
        self.min_level = min_level;
    }

    /// Give back the underlying sink.
    pub fn release(self) -> W {
        self.writer
    }
}

impl<W: embedded_io::Write> Logger for WriterLogger<W> {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        if level < self.min_level {
            return;
        }
        let _ = write!(self.writer, "[{}] ", level.tag());
        let _ = self.writer.write_fmt(args);
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        (**self).log(level, args);
    }
}
