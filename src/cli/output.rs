//! Colored terminal output for packaging runs.

use std::io::{IsTerminal, Write};
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// User-facing progress output. Diagnostics for developers go through `log`.
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

/// Streams that are not terminals are never colored.
fn color_choice(is_terminal: bool) -> ColorChoice {
    if is_terminal {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(color_choice(std::io::stdout().is_terminal())),
            verbose,
            quiet,
        }
    }

    fn print_marked(&self, marker: &str, color: Color, message: &str) -> std::io::Result<()> {
        let mut buffer = self.bufwtr.buffer();
        buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(&mut buffer, "{marker}")?;
        buffer.reset()?;
        writeln!(&mut buffer, " {message}")?;
        self.bufwtr.print(&buffer)
    }

    /// Print a success message
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.print_marked("✓", Color::Green, message)
    }

    /// Print a progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.print_marked("⋯", Color::Magenta, message)
    }

    /// Print a message only in verbose mode
    pub fn verbose(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }
        self.print_marked("→", Color::Blue, message)
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        if Self::write_error(message).is_err() {
            eprintln!("Error: {message}");
        }
    }

    fn write_error(message: &str) -> std::io::Result<()> {
        let bufwtr = BufferWriter::stderr(color_choice(std::io::stderr().is_terminal()));
        let mut buffer = bufwtr.buffer();
        buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(&mut buffer, "Error:")?;
        buffer.reset()?;
        writeln!(&mut buffer, " {message}")?;
        bufwtr.print(&buffer)
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        writeln!(&mut buffer, "    {message}")?;
        self.bufwtr.print(&buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piped_output_is_never_colored() {
        assert_eq!(color_choice(false), ColorChoice::Never);
        assert_eq!(color_choice(true), ColorChoice::Auto);
    }
}
