//! # Terminal Output
//!
//! Command summaries (`✅ Workspace ready`, the underlay listing, ...) are
//! printed to stdout, separate from the log stream on stderr. This module
//! decides whether those summaries use color and emoji.
//!
//! The `--color` flag wins when it is `always` or `never`. With `auto`:
//! - `NO_COLOR` (any value, https://no-color.org/) disables color;
//! - `CLICOLOR=0` disables it, `CLICOLOR_FORCE` (non-zero) forces it;
//! - `TERM=dumb` disables it;
//! - otherwise the terminal's capabilities decide.

use std::env;

use console::style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the value of `--color` (`always`, `never` or `auto`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    /// Line prefix for a status kind.
    pub fn marker(&self, status: Status) -> String {
        let (symbol, text) = match status {
            Status::Done => ("✅", "[OK]"),
            Status::Warning => ("⚠️ ", "[WARN]"),
            Status::Hint => ("💡", "[HINT]"),
            Status::Item => ("•", "-"),
        };
        emoji(self, symbol, text).to_string()
    }

    /// Format `message` behind the marker for `status`.
    pub fn line(&self, status: Status, message: &str) -> String {
        let marker = self.marker(status);
        if !self.use_color {
            return format!("{} {}", marker, message);
        }
        let message = match status {
            Status::Done => style(message).green().to_string(),
            Status::Warning => style(message).yellow().to_string(),
            Status::Hint => style(message).dim().to_string(),
            Status::Item => message.to_string(),
        };
        format!("{} {}", marker, message)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Kind of a summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Warning,
    Hint,
    Item,
}

/// The emoji when colors are enabled, else the plain alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_color_flag_overrides_detection() {
        assert!(OutputConfig::from_env_and_flag("always").use_color);
        assert!(OutputConfig::from_env_and_flag("ALWAYS").use_color);
        assert!(!OutputConfig::from_env_and_flag("never").use_color);
    }

    #[test]
    #[serial]
    fn test_no_color_disables_auto() {
        let previous = env::var_os("NO_COLOR");
        env::set_var("NO_COLOR", "");
        assert!(!OutputConfig::from_env_and_flag("auto").use_color);
        match previous {
            Some(value) => env::set_var("NO_COLOR", value),
            None => env::remove_var("NO_COLOR"),
        }
    }

    #[test]
    fn test_plain_lines() {
        let config = OutputConfig::plain();
        assert_eq!(config.line(Status::Done, "Workspace ready"), "[OK] Workspace ready");
        assert_eq!(config.line(Status::Item, "/opt/ros/humble"), "- /opt/ros/humble");
        assert_eq!(emoji(&config, "🔍", "[SCAN]"), "[SCAN]");
    }

    #[test]
    fn test_colored_lines_use_emoji() {
        let config = OutputConfig { use_color: true };
        assert!(config.line(Status::Done, "ok").starts_with("✅ "));
        assert!(config.line(Status::Hint, "try this").contains("try this"));
    }
}
