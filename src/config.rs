//! Chat timing and input-mode configuration parsed from environment variables.
//!
//! Defaults reproduce the live-support widget: one second before the greeting,
//! half a second before each reply starts typing, and 1.5–2.5 seconds of
//! simulated typing per bot message.

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_RESPONSE_LEAD_MS: u64 = 500;
pub const DEFAULT_TYPING_MIN_MS: u64 = 1500;
pub const DEFAULT_TYPING_JITTER_MS: u64 = 1000;

/// How the host collects the user's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Options are rendered as buttons on the node message.
    #[default]
    Buttons,
    /// Options are also enumerated in a follow-up message so they can be typed.
    FreeText,
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buttons" => Ok(Self::Buttons),
            "free-text" | "free_text" | "text" => Ok(Self::FreeText),
            other => Err(format!("unknown input mode '{other}' (expected 'buttons' or 'free-text')")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    /// Wait before the greeting starts typing.
    pub initial_delay: Duration,
    /// Wait before a reply starts typing.
    pub response_lead: Duration,
    /// Shortest simulated typing time.
    pub typing_min: Duration,
    /// Upper bound of random extra typing time.
    pub typing_jitter: Duration,
    pub input_mode: InputMode,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            response_lead: Duration::from_millis(DEFAULT_RESPONSE_LEAD_MS),
            typing_min: Duration::from_millis(DEFAULT_TYPING_MIN_MS),
            typing_jitter: Duration::from_millis(DEFAULT_TYPING_JITTER_MS),
            input_mode: InputMode::Buttons,
        }
    }
}

impl ChatConfig {
    /// Build config from environment variables. Unset or unparsable values
    /// fall back to the defaults.
    ///
    /// - `HELPDESK_INITIAL_DELAY_MS`: default 1000
    /// - `HELPDESK_RESPONSE_LEAD_MS`: default 500
    /// - `HELPDESK_TYPING_MIN_MS`: default 1500
    /// - `HELPDESK_TYPING_JITTER_MS`: default 1000
    /// - `HELPDESK_INPUT_MODE`: `buttons` (default) or `free-text`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            initial_delay: Duration::from_millis(env_parse("HELPDESK_INITIAL_DELAY_MS", DEFAULT_INITIAL_DELAY_MS)),
            response_lead: Duration::from_millis(env_parse("HELPDESK_RESPONSE_LEAD_MS", DEFAULT_RESPONSE_LEAD_MS)),
            typing_min: Duration::from_millis(env_parse("HELPDESK_TYPING_MIN_MS", DEFAULT_TYPING_MIN_MS)),
            typing_jitter: Duration::from_millis(env_parse("HELPDESK_TYPING_JITTER_MS", DEFAULT_TYPING_JITTER_MS)),
            input_mode: env_parse("HELPDESK_INPUT_MODE", InputMode::Buttons),
        }
    }

    /// Zero lead times, for hosts and tests that inject their own typing delay.
    #[must_use]
    pub fn immediate(input_mode: InputMode) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            response_lead: Duration::ZERO,
            typing_min: Duration::ZERO,
            typing_jitter: Duration::ZERO,
            input_mode,
        }
    }

    #[must_use]
    pub fn with_input_mode(mut self, input_mode: InputMode) -> Self {
        self.input_mode = input_mode;
        self
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
