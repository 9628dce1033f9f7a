//! Submission workflow configuration.
//!
//! Defaults suit a single community; `from_env` overlays environment
//! variables on top and fails fast on malformed values.

use std::time::Duration;

use crate::error::ConfigError;

/// How long an actor is locked out after a submission.
pub const DEFAULT_LOCKOUT_WINDOW: Duration = Duration::from_secs(10);

/// How long a submission stays live before its expiration job runs.
pub const DEFAULT_POST_LIFESPAN_SECS: i64 = 6 * 24 * 60 * 60;

pub const DEFAULT_TITLE: &str = "What is this?";
pub const DEFAULT_PREVIEW: &str = "Loading...";
pub const DEFAULT_RECORD_KIND: &str = "drawing";

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    /// TTL of the admission lock.
    pub lockout_window: Duration,
    /// Delay between creation and the expiration job.
    pub post_lifespan: chrono::Duration,
    /// Community the resource is created in.
    pub destination: String,
    pub title: String,
    pub preview: String,
    /// Discriminator stored on every record.
    pub record_kind: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            lockout_window: DEFAULT_LOCKOUT_WINDOW,
            post_lifespan: chrono::Duration::seconds(DEFAULT_POST_LIFESPAN_SECS),
            destination: "general".to_string(),
            title: DEFAULT_TITLE.to_string(),
            preview: DEFAULT_PREVIEW.to_string(),
            record_kind: DEFAULT_RECORD_KIND.to_string(),
        }
    }
}

impl SubmissionConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `POSTGATE_LOCKOUT_SECS`, `POSTGATE_POST_LIFESPAN_SECS`,
    /// `POSTGATE_DESTINATION` and `POSTGATE_TITLE`; unset vars keep their
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = seconds_var(&lookup, "POSTGATE_LOCKOUT_SECS")? {
            // A zero TTL lapses at once and would admit every duplicate.
            if secs == 0 {
                return Err(ConfigError::NotPositive {
                    name: "POSTGATE_LOCKOUT_SECS",
                });
            }
            config.lockout_window = Duration::from_secs(secs);
        }
        if let Some(secs) = seconds_var(&lookup, "POSTGATE_POST_LIFESPAN_SECS")? {
            config.post_lifespan = chrono::Duration::seconds(secs as i64);
        }
        if let Some(destination) = lookup("POSTGATE_DESTINATION") {
            config.destination = destination;
        }
        if let Some(title) = lookup("POSTGATE_TITLE") {
            config.title = title;
        }

        Ok(config)
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_lockout_window(mut self, lockout_window: Duration) -> Self {
        self.lockout_window = lockout_window;
        self
    }

    pub fn with_post_lifespan(mut self, post_lifespan: chrono::Duration) -> Self {
        self.post_lifespan = post_lifespan;
        self
    }
}

fn seconds_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    // Capped so the lifespan always fits a chrono::Duration.
    match value.trim().parse::<u64>() {
        Ok(secs) if secs <= i32::MAX as u64 => Ok(Some(secs)),
        _ => Err(ConfigError::InvalidSeconds { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_vars() {
        let config = SubmissionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.lockout_window, Duration::from_secs(10));
        assert_eq!(config.post_lifespan, chrono::Duration::days(6));
        assert_eq!(config.title, "What is this?");
        assert_eq!(config.record_kind, "drawing");
    }

    #[test]
    fn vars_override_defaults() {
        let config = SubmissionConfig::from_lookup(lookup(&[
            ("POSTGATE_LOCKOUT_SECS", "30"),
            ("POSTGATE_POST_LIFESPAN_SECS", " 3600 "),
            ("POSTGATE_DESTINATION", "pixelary"),
            ("POSTGATE_TITLE", "Guess me"),
        ]))
        .unwrap();
        assert_eq!(config.lockout_window, Duration::from_secs(30));
        assert_eq!(config.post_lifespan, chrono::Duration::hours(1));
        assert_eq!(config.destination, "pixelary");
        assert_eq!(config.title, "Guess me");
    }

    #[test]
    fn malformed_seconds_fail_fast() {
        let err = SubmissionConfig::from_lookup(lookup(&[("POSTGATE_LOCKOUT_SECS", "ten")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "POSTGATE_LOCKOUT_SECS must be a whole number of seconds, got \"ten\""
        );

        assert!(SubmissionConfig::from_lookup(lookup(&[(
            "POSTGATE_POST_LIFESPAN_SECS",
            "-5"
        )]))
        .is_err());
    }

    #[test]
    fn zero_lockout_is_rejected() {
        let err = SubmissionConfig::from_lookup(lookup(&[("POSTGATE_LOCKOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotPositive {
                name: "POSTGATE_LOCKOUT_SECS"
            }
        ));
        assert_eq!(err.to_string(), "POSTGATE_LOCKOUT_SECS must be greater than zero");
    }
}
