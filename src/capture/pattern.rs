use std::sync::OnceLock;

use regex::Regex;

/// Tokens that mark a compiler or build-tool diagnostic worth keeping.
pub const DIAGNOSTIC_TOKENS: &[&str] = &["warning:", "error:", "Error:", "ERROR:", "fatal error:"];

/// Case-insensitive classifier for "interesting" output lines.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
}

impl LinePattern {
    /// The warning/error pattern used for build logs.
    pub fn diagnostics() -> Self {
        static DIAGNOSTICS_RE: OnceLock<Regex> = OnceLock::new();

        let regex = DIAGNOSTICS_RE.get_or_init(|| {
            Regex::new(r"(?i)(?:warning:|error:|Error:|ERROR:|fatal error:)")
                .expect("diagnostics regex should compile")
        });
        Self::from_regex(regex.clone())
    }

    /// Compile a custom pattern; matching is always case-insensitive.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("(?i){pattern}")).map(Self::from_regex)
    }

    fn from_regex(regex: Regex) -> Self {
        Self { regex }
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for LinePattern {
    fn default() -> Self {
        Self::diagnostics()
    }
}
