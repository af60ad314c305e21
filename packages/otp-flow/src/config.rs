use crate::error::ConfigError;

/// Seconds a freshly issued code stays valid; resend is disabled meanwhile.
pub const DEFAULT_WINDOW_SECONDS: u64 = 120;

pub const MIN_WINDOW_SECONDS: u64 = 1;
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

/// Per-flow settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    pub window_seconds: u64,
}

impl FlowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resend window, clamped to
    /// `MIN_WINDOW_SECONDS..=MAX_WINDOW_SECONDS`.
    pub fn with_window_seconds(mut self, window_seconds: u64) -> Self {
        self.window_seconds = window_seconds.clamp(MIN_WINDOW_SECONDS, MAX_WINDOW_SECONDS);
        self
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }
}

/// Reject a window outside `MIN_WINDOW_SECONDS..=MAX_WINDOW_SECONDS`.
pub fn check_window_seconds(window_seconds: u64) -> Result<u64, ConfigError> {
    if (MIN_WINDOW_SECONDS..=MAX_WINDOW_SECONDS).contains(&window_seconds) {
        Ok(window_seconds)
    } else {
        Err(ConfigError::WindowOutOfRange {
            seconds: window_seconds,
            min: MIN_WINDOW_SECONDS,
            max: MAX_WINDOW_SECONDS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_clamped() {
        assert_eq!(FlowConfig::new().with_window_seconds(60).window_seconds, 60);
        assert_eq!(FlowConfig::new().with_window_seconds(0).window_seconds, 1);
        assert_eq!(
            FlowConfig::new().with_window_seconds(u64::MAX).window_seconds,
            MAX_WINDOW_SECONDS
        );
    }

    #[test]
    fn test_check_window_seconds() {
        assert_eq!(check_window_seconds(120), Ok(120));
        assert_eq!(check_window_seconds(MAX_WINDOW_SECONDS), Ok(MAX_WINDOW_SECONDS));
        assert!(check_window_seconds(0).is_err());
        assert!(check_window_seconds(MAX_WINDOW_SECONDS + 1).is_err());
        assert!(check_window_seconds(u64::MAX).is_err());
    }
}
