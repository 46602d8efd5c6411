//! Colored terminal output for release and rollout operations
//!
//! Operator-facing messages go through [`OutputManager`]; diagnostics go to
//! the `log` facade instead.

use std::io::Write;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn emit(&self, marker: &str, color: Color, bold: bool, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
        let _ = write!(&mut buffer, "{}", marker);
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {}", message);
        self.flush(buffer);
    }

    fn flush(&self, buffer: Buffer) {
        if let Err(e) = self.bufwtr.print(&buffer) {
            log::debug!("stdout unavailable: {}", e);
        }
    }

    /// Print an info message (normal output)
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.emit("ℹ", Color::Cyan, false, message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.emit("✓", Color::Green, true, message);
        }
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            self.emit("⚠", Color::Yellow, true, message);
        }
    }

    /// Print an error message (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(&mut buffer, "✗");
        let _ = buffer.reset();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = writeln!(&mut buffer, " {}", message);
        let _ = buffer.reset();
        if bufwtr.print(&buffer).is_err() {
            println!("✗ {}", message);
        }
    }

    /// Print a verbose/debug message (only in verbose mode)
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            self.emit("→", Color::Blue, false, message);
        }
    }

    /// Print a progress message
    pub fn progress(&self, message: &str) {
        if !self.quiet {
            self.emit("⋯", Color::Magenta, false, message);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = writeln!(&mut buffer, "═══ {} ═══", title);
        let _ = buffer.reset();
        self.flush(buffer);
    }

    /// Print a red attention banner, shown even in quiet mode
    pub fn banner(&self, message: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = writeln!(&mut buffer, "{}", message);
        let _ = buffer.reset();
        self.flush(buffer);
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) {
        if !self.quiet {
            self.println(&format!("    {}", message));
        }
    }

    /// Print a plain message (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.bufwtr.buffer();
        let _ = writeln!(&mut buffer, "{}", message);
        self.flush(buffer);
    }

    /// Print a diff verbatim; the operator asked for it, so quiet does not apply
    pub fn diff(&self, text: &str) {
        let mut buffer = self.bufwtr.buffer();
        let _ = write!(&mut buffer, "{}", text);
        if !text.ends_with('\n') {
            let _ = writeln!(&mut buffer);
        }
        self.flush(buffer);
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
