use std::fmt::Display;
use std::io::IsTerminal;

/// ANSI sequences used to decorate status tags.
///
/// Resolved once at startup; every field is empty when stdout is not a
/// terminal so piped output stays free of escape codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub red: &'static str,
    pub green: &'static str,
    pub yellow: &'static str,
    pub blue: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub const COLORED: Palette = Palette {
        red: "\x1b[0;31m",
        green: "\x1b[0;32m",
        yellow: "\x1b[1;33m",
        blue: "\x1b[0;34m",
        reset: "\x1b[0m",
    };

    pub const PLAIN: Palette = Palette {
        red: "",
        green: "",
        yellow: "",
        blue: "",
        reset: "",
    };

    /// Pick the colored palette only when stdout is a terminal.
    pub fn detect() -> Self {
        Self::for_terminal(std::io::stdout().is_terminal())
    }

    pub fn for_terminal(is_terminal: bool) -> Self {
        if is_terminal {
            Self::COLORED
        } else {
            Self::PLAIN
        }
    }
}

/// User-facing status output.
#[derive(Clone, Copy, Debug)]
pub struct Console {
    verbose: u8,
    quiet: bool,
    palette: Palette,
}

impl Console {
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self::with_palette(verbose, quiet, Palette::detect())
    }

    pub fn with_palette(verbose: u8, quiet: bool, palette: Palette) -> Self {
        Self {
            verbose,
            quiet,
            palette,
        }
    }

    pub fn info(&self, message: impl Display) {
        if !self.quiet {
            println!("{}", self.format_info(message));
        }
    }

    pub fn success(&self, message: impl Display) {
        if !self.quiet {
            println!("{}", self.format_success(message));
        }
    }

    pub fn warning(&self, message: impl Display) {
        if !self.quiet {
            println!("{}", self.format_warning(message));
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, message: impl Display) {
        eprintln!("{}", self.format_error(message));
    }

    /// A warning that quiet mode does not hide, on stderr.
    pub fn notice(&self, message: impl Display) {
        eprintln!("{}", self.format_notice(message));
    }

    pub fn verbose(&self, level: u8, message: impl Display) {
        if !self.quiet && self.verbose >= level {
            println!("{}", self.format_info(message));
        }
    }

    /// Print a plain line with no tag.
    pub fn plain(&self, message: impl Display) {
        if !self.quiet {
            println!("{message}");
        }
    }

    pub fn format_info(&self, message: impl Display) -> String {
        let p = self.palette;
        format!("{}[INFO]{} {message}", p.blue, p.reset)
    }

    pub fn format_success(&self, message: impl Display) -> String {
        let p = self.palette;
        format!("{}[SUCCESS]{} {message}", p.green, p.reset)
    }

    pub fn format_warning(&self, message: impl Display) -> String {
        let p = self.palette;
        format!("{}[WARNING]{} {message}", p.yellow, p.reset)
    }

    /// Same tag as [`Console::format_warning`], whatever the quiet setting.
    pub fn format_notice(&self, message: impl Display) -> String {
        self.format_warning(message)
    }

    pub fn format_error(&self, message: impl Display) -> String {
        let p = self.palette;
        format!("{}[ERROR]{} {message}", p.red, p.reset)
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn level(&self) -> u8 {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_palette_has_no_escapes() {
        let console = Console::with_palette(0, false, Palette::for_terminal(false));
        assert_eq!(console.format_info("hello"), "[INFO] hello");
        assert_eq!(console.format_success("done"), "[SUCCESS] done");
        assert_eq!(console.format_warning("hmm"), "[WARNING] hmm");
        assert_eq!(console.format_error("bad"), "[ERROR] bad");
    }

    #[test]
    fn test_colored_palette_wraps_tag() {
        let console = Console::with_palette(0, false, Palette::COLORED);
        assert_eq!(
            console.format_error("bad"),
            "\x1b[0;31m[ERROR]\x1b[0m bad"
        );
        assert_eq!(
            console.format_info("x"),
            "\x1b[0;34m[INFO]\x1b[0m x"
        );
    }

    #[test]
    fn test_notice_is_formatted_when_quiet() {
        let console = Console::with_palette(0, true, Palette::PLAIN);
        assert_eq!(
            console.format_notice("Interrupted by user"),
            "[WARNING] Interrupted by user"
        );
    }

    #[test]
    fn test_quiet_and_level_accessors() {
        let console = Console::with_palette(2, true, Palette::PLAIN);
        assert!(console.quiet());
        assert_eq!(console.level(), 2);
    }
}
