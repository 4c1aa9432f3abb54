use chrono::{SecondsFormat, Utc};

/// Source of `updatedAt` stamps.
pub trait Clock: Send + Sync {
    /// Current instant as an RFC 3339 UTC string with millisecond precision.
    fn now_iso(&self) -> String;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_iso(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Always returns the same instant. Used by tests and replay tooling.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: String,
}

impl FixedClock {
    pub fn new(instant: impl Into<String>) -> Self {
        Self {
            instant: instant.into(),
        }
    }
}

impl Clock for FixedClock {
    fn now_iso(&self) -> String {
        self.instant.clone()
    }
}
