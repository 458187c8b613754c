//! Per-skill Circuit Breaker
//!
//! Stops invoking a skill that keeps failing:
//! - `Closed`: normal operation
//! - `Open`: skill is skipped until the cool-down has elapsed since the last failure
//! - `HalfOpen`: one trial allowed; a success closes, a failure reopens

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation
    #[default]
    Closed,
    /// Allowing a trial request through
    HalfOpen,
    /// Skipping the skill
    Open,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time after the last failure before half-opening
    #[serde(with = "duration_secs")]
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(60),
        }
    }
}

/// Externally visible breaker state for one skill
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct BreakerEntry {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Failure isolation keyed by skill id
pub struct CircuitBreaker {
    entries: Mutex<HashMap<String, BreakerEntry>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether the skill should be skipped.
    ///
    /// Moves `Open` to `HalfOpen` once the cool-down has elapsed; the new
    /// state is visible to the next call.
    pub fn is_open(&self, skill_id: &str) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(skill_id) else {
            return false;
        };

        if entry.state == CircuitState::Open {
            let cooled = entry
                .last_failure
                .map(|last| last.elapsed() >= self.config.cool_down)
                .unwrap_or(true);
            if cooled {
                entry.state = CircuitState::HalfOpen;
                info!("Circuit breaker '{}' transitioning to half-open", skill_id);
            }
        }

        entry.state == CircuitState::Open
    }

    /// Record a failed execution
    pub fn record_failure(&self, skill_id: &str) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(skill_id.to_string()).or_default();

        entry.failures += 1;
        entry.last_failure = Some(Instant::now());
        entry.last_failure_at = Some(Utc::now());

        if entry.state != CircuitState::Open && entry.failures >= self.config.failure_threshold {
            let reopened = entry.state == CircuitState::HalfOpen;
            entry.state = CircuitState::Open;
            if reopened {
                warn!("Circuit breaker '{}' reopened after half-open failure", skill_id);
            } else {
                warn!(
                    "Circuit breaker '{}' opened after {} failures",
                    skill_id, entry.failures
                );
            }
        } else {
            debug!(
                "Circuit breaker '{}' failure {}/{}",
                skill_id, entry.failures, self.config.failure_threshold
            );
        }
    }

    /// Record a successful execution; resets the skill to closed
    pub fn record_success(&self, skill_id: &str) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(skill_id) {
            if entry.state != CircuitState::Closed {
                info!("Circuit breaker '{}' closed after recovery", skill_id);
            }
            entry.state = CircuitState::Closed;
            entry.failures = 0;
        }
    }

    pub fn state(&self, skill_id: &str) -> CircuitState {
        self.entries
            .lock()
            .get(skill_id)
            .map(|e| e.state)
            .unwrap_or_default()
    }

    /// Snapshot of every skill that has breaker state
    pub fn status(&self) -> HashMap<String, BreakerStatus> {
        self.entries
            .lock()
            .iter()
            .map(|(id, e)| {
                (
                    id.clone(),
                    BreakerStatus {
                        state: e.state,
                        failures: e.failures,
                        last_failure: e.last_failure_at,
                    },
                )
            })
            .collect()
    }

    /// Reset one skill
    pub fn reset(&self, skill_id: &str) {
        if self.entries.lock().remove(skill_id).is_some() {
            info!("Circuit breaker '{}' reset", skill_id);
        }
    }

    /// Reset every skill
    pub fn reset_all(&self) {
        self.entries.lock().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker(threshold: u32, cool_down_ms: u64) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: threshold,
            cool_down: Duration::from_millis(cool_down_ms),
        })
    }

    #[test]
    fn test_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cool_down, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_skill_is_closed() {
        let cb = CircuitBreaker::new();
        assert!(!cb.is_open("nobody"));
        assert_eq!(cb.state("nobody"), CircuitState::Closed);
        assert!(cb.status().is_empty());
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = CircuitBreaker::new();
        for _ in 0..4 {
            cb.record_failure("flaky");
        }
        assert!(!cb.is_open("flaky"));

        cb.record_failure("flaky");
        assert!(cb.is_open("flaky"));

        let status = cb.status();
        assert_eq!(status["flaky"].state, CircuitState::Open);
        assert_eq!(status["flaky"].failures, 5);
        assert!(status["flaky"].last_failure.is_some());
    }

    #[test]
    fn test_success_resets() {
        let cb = CircuitBreaker::new();
        for _ in 0..3 {
            cb.record_failure("s");
        }
        cb.record_success("s");

        let status = cb.status();
        assert_eq!(status["s"].failures, 0);
        assert_eq!(status["s"].state, CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_cool_down() {
        let cb = fast_breaker(2, 20);
        cb.record_failure("s");
        cb.record_failure("s");
        assert!(cb.is_open("s"));

        std::thread::sleep(Duration::from_millis(40));

        assert!(!cb.is_open("s"));
        assert_eq!(cb.state("s"), CircuitState::HalfOpen);

        // A single failure while half-open reopens
        cb.record_failure("s");
        assert_eq!(cb.state("s"), CircuitState::Open);
    }

    #[test]
    fn test_half_open_success_closes() {
        let cb = fast_breaker(1, 10);
        cb.record_failure("s");
        std::thread::sleep(Duration::from_millis(25));
        assert!(!cb.is_open("s"));

        cb.record_success("s");
        assert_eq!(cb.state("s"), CircuitState::Closed);
    }

    #[test]
    fn test_reset() {
        let cb = fast_breaker(1, 60_000);
        cb.record_failure("a");
        cb.record_failure("b");
        cb.reset("a");
        assert!(!cb.is_open("a"));
        assert!(cb.is_open("b"));

        cb.reset_all();
        assert!(cb.status().is_empty());
    }
}
