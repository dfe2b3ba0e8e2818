use crate::{config, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Rule encompasses the parameters of a circuit breaker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique id
    pub id: String,
    /// `failure_threshold` represents the number of counted failures that trips
    /// the breaker. Once the failure count reaches this value the breaker
    /// transforms to the open state and rejects calls without invoking them.
    pub failure_threshold: u32,
    /// `retry_timeout_ms` represents recovery timeout (in milliseconds) after the
    /// circuit breaker opens. During the open period, no calls are permitted
    /// until the timeout has elapsed. After that, the circuit breaker will
    /// transform to half-open state for a single "trial" call.
    pub retry_timeout_ms: u64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            failure_threshold: config::DEFAULT_FAILURE_THRESHOLD,
            retry_timeout_ms: config::DEFAULT_RETRY_TIMEOUT_MS,
        }
    }
}

impl Rule {
    pub fn new(failure_threshold: u32, retry_timeout_ms: u64) -> Self {
        Rule {
            failure_threshold,
            retry_timeout_ms,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> crate::Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::msg("invalid failure_threshold"));
        }
        if self.retry_timeout_ms == 0 {
            return Err(Error::msg("invalid retry_timeout_ms"));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.failure_threshold == other.failure_threshold
            && self.retry_timeout_ms == other.retry_timeout_ms
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
