//! Cosmetic progress display.
//!
//! Long passes report progress either as a single growing line (carriage
//! return, the default) or one line per update — useful when output is
//! captured to a log file.

use std::io::Write;

/// Stderr progress printer.
pub struct ProgressPrinter {
    newline: bool,
    wrote_any: bool,
}

impl ProgressPrinter {
    /// `newline = false` renders a single growing line; `true` emits one
    /// line per update.
    pub fn new(newline: bool) -> Self {
        ProgressPrinter {
            newline,
            wrote_any: false,
        }
    }

    /// Show one progress update.
    pub fn update(&mut self, line: &str) {
        self.wrote_any = true;
        let mut err = std::io::stderr().lock();
        if self.newline {
            let _ = writeln!(err, "{line}");
        } else {
            let _ = write!(err, "\r{line}");
            let _ = err.flush();
        }
    }

    /// Terminate the growing line, if one was started.
    pub fn finish(&mut self) {
        if !self.newline && self.wrote_any {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err);
        }
        self.wrote_any = false;
    }
}

impl Drop for ProgressPrinter {
    fn drop(&mut self) {
        self.finish();
    }
}
