//! Skill Metrics & Monitoring
//!
//! Execution history, per-skill aggregates, usage histograms and an error log.
//! Everything here is observational: the cascade never reads these numbers
//! when deciding whether to answer.

use crate::response::ChatResponse;
use crate::skills::StageKind;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Keep at most this many usefulness samples per skill
const MAX_USEFULNESS_SAMPLES: usize = 200;
/// Recent errors returned by analytics views
const RECENT_ERRORS: usize = 10;

/// Outcome of one attempt to run one skill against one question
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillExecutionResult {
    pub skill_id: String,
    pub step: StageKind,
    pub response: Option<ChatResponse>,
    pub usefulness: f32,
    pub execution_time_ms: u64,
    pub success: bool,
    pub cached: bool,
    pub error: Option<String>,
    pub matched_pattern: Option<String>,
}

impl SkillExecutionResult {
    /// Result with no answer; `step` is `Unknown`
    pub fn empty(skill_id: &str, elapsed: Duration) -> Self {
        Self {
            skill_id: skill_id.to_string(),
            step: StageKind::Unknown,
            response: None,
            usefulness: 0.0,
            execution_time_ms: elapsed.as_millis() as u64,
            success: false,
            cached: false,
            error: None,
            matched_pattern: None,
        }
    }
}

/// Retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Entries older than this are pruned on write
    pub retention_days: i64,
    /// Hard cap on history length
    pub max_history: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            max_history: 10_000,
        }
    }
}

/// One entry in the execution history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub skill_id: String,
    pub step: StageKind,
    pub success: bool,
    pub cached: bool,
    pub usefulness: f32,
    pub execution_time_ms: u64,
    pub error: Option<String>,
    pub user_id: Option<String>,
    pub params: HashMap<String, String>,
}

/// Entry in the error log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub skill_id: String,
    pub step: StageKind,
    pub error: String,
    pub user_id: Option<String>,
}

/// Aggregates for one skill
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillMetrics {
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub cache_hits: u64,
    /// Rolling average in milliseconds
    pub average_execution_time: f64,
    /// Percentage of executions served from cache
    pub cache_hit_rate: f64,
    pub usefulness_scores: Vec<f32>,
    pub last_executed: Option<DateTime<Utc>>,
}

impl SkillMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.execution_count as f64
        }
    }

    pub fn average_usefulness(&self) -> f64 {
        if self.usefulness_scores.is_empty() {
            0.0
        } else {
            self.usefulness_scores.iter().map(|&s| s as f64).sum::<f64>()
                / self.usefulness_scores.len() as f64
        }
    }

    /// Composite ranking score in [0, 1]
    pub fn ranking_score(&self) -> f64 {
        let speed = 1.0 / (1.0 + self.average_execution_time / 1000.0);
        self.success_rate() * 0.5 + (self.average_usefulness() / 5.0) * 0.3 + speed * 0.2
    }
}

/// Detailed view of one skill
#[derive(Debug, Clone, Serialize)]
pub struct SkillAnalytics {
    pub skill_id: String,
    pub metrics: SkillMetrics,
    pub success_rate: f64,
    pub average_usefulness: f64,
    pub p95_execution_time_ms: u64,
    /// Executions per hour of day (UTC)
    pub hourly_usage: [u64; 24],
    /// Most used parameters, most frequent first
    pub top_params: Vec<(String, u64)>,
    pub recent_errors: Vec<ErrorEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failing,
    Idle,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillHealth {
    pub skill_id: String,
    pub status: HealthStatus,
    pub success_rate: f64,
    pub average_execution_time_ms: f64,
    pub executions: u64,
}

/// Overall health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub total_executions: u64,
    pub overall_success_rate: f64,
    pub average_execution_time_ms: f64,
    pub cache_hit_rate: f64,
    pub error_count: usize,
    pub skills: Vec<SkillHealth>,
    /// Skill ids, best first
    pub ranking: Vec<String>,
}

/// Activity over the last minute / hour
#[derive(Debug, Clone, Serialize)]
pub struct RealTimeSnapshot {
    pub executions_last_minute: usize,
    pub executions_last_hour: usize,
    pub errors_last_hour: usize,
    pub average_latency_last_hour_ms: f64,
    pub active_skills: Vec<String>,
}

#[derive(Default)]
struct MetricsState {
    history: VecDeque<ExecutionRecord>,
    errors: VecDeque<ErrorEntry>,
    skills: HashMap<String, SkillMetrics>,
    hourly_usage: HashMap<String, [u64; 24]>,
    param_usage: HashMap<String, HashMap<String, u64>>,
}

/// Collector for skill executions
pub struct SkillMetricsCollector {
    state: RwLock<MetricsState>,
    config: MetricsConfig,
}

impl SkillMetricsCollector {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            state: RwLock::new(MetricsState::default()),
            config,
        }
    }

    /// Record an execution attempt
    pub fn record_execution(
        &self,
        result: &SkillExecutionResult,
        user_id: Option<&str>,
        params: &HashMap<String, String>,
    ) {
        self.record_execution_at(result, user_id, params, Utc::now());
    }

    /// Record an execution with an explicit timestamp (replay / import)
    pub fn record_execution_at(
        &self,
        result: &SkillExecutionResult,
        user_id: Option<&str>,
        params: &HashMap<String, String>,
        at: DateTime<Utc>,
    ) {
        let Ok(mut state) = self.state.write() else {
            warn!(
                "Metrics lock poisoned, dropping execution record for '{}'",
                result.skill_id
            );
            return;
        };

        let record = ExecutionRecord {
            id: Uuid::new_v4(),
            timestamp: at,
            skill_id: result.skill_id.clone(),
            step: result.step,
            success: result.success,
            cached: result.cached,
            usefulness: result.usefulness,
            execution_time_ms: result.execution_time_ms,
            error: result.error.clone(),
            user_id: user_id.map(String::from),
            params: params.clone(),
        };

        // Aggregates
        let metrics = state.skills.entry(result.skill_id.clone()).or_default();
        metrics.execution_count += 1;
        if result.success {
            metrics.success_count += 1;
        } else {
            metrics.failure_count += 1;
        }
        if result.cached {
            metrics.cache_hits += 1;
        }
        let n = metrics.execution_count as f64;
        metrics.average_execution_time +=
            (result.execution_time_ms as f64 - metrics.average_execution_time) / n;
        metrics.cache_hit_rate = metrics.cache_hits as f64 / n * 100.0;
        if result.success && !result.cached {
            metrics.usefulness_scores.push(result.usefulness);
            if metrics.usefulness_scores.len() > MAX_USEFULNESS_SAMPLES {
                metrics.usefulness_scores.remove(0);
            }
        }
        metrics.last_executed = Some(
            metrics
                .last_executed
                .map_or(at, |prev| prev.max(at)),
        );

        // Histograms
        let hour = at.hour() as usize;
        state
            .hourly_usage
            .entry(result.skill_id.clone())
            .or_insert([0; 24])[hour] += 1;
        let param_counts = state.param_usage.entry(result.skill_id.clone()).or_default();
        for (name, value) in params {
            *param_counts.entry(format!("{}={}", name, value)).or_default() += 1;
        }

        if let Some(ref error) = result.error {
            state.errors.push_back(ErrorEntry {
                timestamp: at,
                skill_id: result.skill_id.clone(),
                step: result.step,
                error: error.clone(),
                user_id: record.user_id.clone(),
            });
        }

        state.history.push_back(record);
        self.prune(&mut state, Utc::now());

        debug!(
            "Recorded execution: skill={}, step={}, success={}, cached={}, {}ms",
            result.skill_id, result.step, result.success, result.cached, result.execution_time_ms
        );
    }

    /// Oldest timestamp still retained. `None` when the window is not
    /// positive or does not fit in a timestamp; only the count cap applies then.
    fn retention_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.config.retention_days <= 0 {
            return None;
        }
        ChronoDuration::try_days(self.config.retention_days)
            .and_then(|window| now.checked_sub_signed(window))
    }

    fn prune(&self, state: &mut MetricsState, now: DateTime<Utc>) {
        if let Some(cutoff) = self.retention_cutoff(now) {
            state.history.retain(|r| r.timestamp >= cutoff);
            state.errors.retain(|e| e.timestamp >= cutoff);
        }
        while state.history.len() > self.config.max_history {
            state.history.pop_front();
        }
        while state.errors.len() > self.config.max_history {
            state.errors.pop_front();
        }
    }

    /// Aggregates for one skill
    pub fn skill_metrics(&self, skill_id: &str) -> Option<SkillMetrics> {
        self.state.read().ok()?.skills.get(skill_id).cloned()
    }

    /// Number of records currently retained
    pub fn history_len(&self) -> usize {
        self.state.read().map(|s| s.history.len()).unwrap_or(0)
    }

    /// Detailed analytics for one skill
    pub fn skill_analytics(&self, skill_id: &str) -> Option<SkillAnalytics> {
        let state = self.state.read().ok()?;
        let metrics = state.skills.get(skill_id)?.clone();

        let mut latencies: Vec<u64> = state
            .history
            .iter()
            .filter(|r| r.skill_id == skill_id)
            .map(|r| r.execution_time_ms)
            .collect();
        latencies.sort_unstable();
        let p95 = if latencies.is_empty() {
            0
        } else {
            let idx = (latencies.len() * 95 / 100).min(latencies.len() - 1);
            latencies[idx]
        };

        let mut top_params: Vec<(String, u64)> = state
            .param_usage
            .get(skill_id)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        top_params.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_params.truncate(10);

        let recent_errors: Vec<ErrorEntry> = state
            .errors
            .iter()
            .rev()
            .filter(|e| e.skill_id == skill_id)
            .take(RECENT_ERRORS)
            .cloned()
            .collect();

        Some(SkillAnalytics {
            skill_id: skill_id.to_string(),
            success_rate: metrics.success_rate(),
            average_usefulness: metrics.average_usefulness(),
            p95_execution_time_ms: p95,
            hourly_usage: state.hourly_usage.get(skill_id).copied().unwrap_or([0; 24]),
            top_params,
            recent_errors,
            metrics,
        })
    }

    /// Skill ids ordered by composite score, best first
    pub fn skill_ranking(&self) -> Vec<String> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let mut ranked: Vec<(&String, f64)> = state
            .skills
            .iter()
            .map(|(id, m)| (id, m.ranking_score()))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Health of every skill seen so far
    pub fn health_report(&self) -> HealthReport {
        let ranking = self.skill_ranking();
        let Ok(state) = self.state.read() else {
            return HealthReport {
                generated_at: Utc::now(),
                total_executions: 0,
                overall_success_rate: 0.0,
                average_execution_time_ms: 0.0,
                cache_hit_rate: 0.0,
                error_count: 0,
                skills: Vec::new(),
                ranking,
            };
        };

        let total_executions: u64 = state.skills.values().map(|m| m.execution_count).sum();
        let successes: u64 = state.skills.values().map(|m| m.success_count).sum();
        let cache_hits: u64 = state.skills.values().map(|m| m.cache_hits).sum();
        let weighted_latency: f64 = state
            .skills
            .values()
            .map(|m| m.average_execution_time * m.execution_count as f64)
            .sum();

        let ratio = |num: f64| {
            if total_executions == 0 {
                0.0
            } else {
                num / total_executions as f64
            }
        };

        let mut skills: Vec<SkillHealth> = state
            .skills
            .iter()
            .map(|(id, m)| SkillHealth {
                skill_id: id.clone(),
                status: classify_health(m),
                success_rate: m.success_rate(),
                average_execution_time_ms: m.average_execution_time,
                executions: m.execution_count,
            })
            .collect();
        skills.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));

        HealthReport {
            generated_at: Utc::now(),
            total_executions,
            overall_success_rate: ratio(successes as f64),
            average_execution_time_ms: ratio(weighted_latency),
            cache_hit_rate: ratio(cache_hits as f64) * 100.0,
            error_count: state.errors.len(),
            skills,
            ranking,
        }
    }

    /// Activity over the last minute and hour
    pub fn real_time_monitoring(&self) -> RealTimeSnapshot {
        let now = Utc::now();
        let minute_ago = now - ChronoDuration::minutes(1);
        let hour_ago = now - ChronoDuration::hours(1);

        let Ok(state) = self.state.read() else {
            return RealTimeSnapshot {
                executions_last_minute: 0,
                executions_last_hour: 0,
                errors_last_hour: 0,
                average_latency_last_hour_ms: 0.0,
                active_skills: Vec::new(),
            };
        };

        let last_hour: Vec<&ExecutionRecord> = state
            .history
            .iter()
            .filter(|r| r.timestamp >= hour_ago)
            .collect();

        let mut active_skills: Vec<String> = last_hour.iter().map(|r| r.skill_id.clone()).collect();
        active_skills.sort();
        active_skills.dedup();

        RealTimeSnapshot {
            executions_last_minute: last_hour.iter().filter(|r| r.timestamp >= minute_ago).count(),
            executions_last_hour: last_hour.len(),
            errors_last_hour: state.errors.iter().filter(|e| e.timestamp >= hour_ago).count(),
            average_latency_last_hour_ms: if last_hour.is_empty() {
                0.0
            } else {
                last_hour.iter().map(|r| r.execution_time_ms as f64).sum::<f64>()
                    / last_hour.len() as f64
            },
            active_skills,
        }
    }

    /// Export metrics as JSON
    pub fn export_metrics(&self) -> String {
        let health = self.health_report();
        let realtime = self.real_time_monitoring();
        let (skills, errors) = match self.state.read() {
            Ok(state) => (
                state.skills.clone(),
                state.errors.iter().cloned().collect::<Vec<_>>(),
            ),
            Err(_) => (HashMap::new(), Vec::new()),
        };

        serde_json::json!({
            "health": health,
            "realtime": realtime,
            "skills": skills,
            "errors": errors,
        })
        .to_string()
    }

    /// Reset all metrics
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = MetricsState::default();
        }
        info!("Skill metrics reset");
    }
}

impl Default for SkillMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_health(m: &SkillMetrics) -> HealthStatus {
    if m.execution_count == 0 {
        return HealthStatus::Idle;
    }
    let rate = m.success_rate();
    if rate < 0.5 {
        HealthStatus::Failing
    } else if rate < 0.8 || m.average_execution_time > 2000.0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Timer for measuring stage latency
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn result(skill: &str, success: bool, ms: u64) -> SkillExecutionResult {
        SkillExecutionResult {
            skill_id: skill.to_string(),
            step: StageKind::MicroSolver,
            response: None,
            usefulness: if success { 4.0 } else { 0.0 },
            execution_time_ms: ms,
            success,
            cached: false,
            error: None,
            matched_pattern: None,
        }
    }

    #[test]
    fn test_metrics_recording() {
        let collector = SkillMetricsCollector::new();
        let params = HashMap::new();

        collector.record_execution(&result("balance", true, 100), Some("u1"), &params);
        collector.record_execution(&result("balance", true, 300), Some("u1"), &params);
        collector.record_execution(&result("balance", false, 200), None, &params);

        let m = collector.skill_metrics("balance").unwrap();
        assert_eq!(m.execution_count, 3);
        assert_eq!(m.success_count, 2);
        assert_eq!(m.failure_count, 1);
        assert!((m.average_execution_time - 200.0).abs() < 1e-9);
        assert_eq!(m.usefulness_scores, vec![4.0, 4.0]);
        assert!(m.last_executed.is_some());
    }

    #[test]
    fn test_cache_hit_rate() {
        let collector = SkillMetricsCollector::new();
        let params = HashMap::new();

        let mut cached = result("hysa", true, 0);
        cached.cached = true;
        cached.step = StageKind::Cache;
        collector.record_execution(&result("hysa", true, 10), None, &params);
        collector.record_execution(&cached, None, &params);

        let m = collector.skill_metrics("hysa").unwrap();
        assert_eq!(m.cache_hits, 1);
        assert_eq!(m.cache_hit_rate, 50.0);
        // cached executions do not add usefulness samples
        assert_eq!(m.usefulness_scores.len(), 1);
    }

    #[test]
    fn test_error_log_and_analytics() {
        let collector = SkillMetricsCollector::new();
        let mut params = HashMap::new();
        params.insert("category".to_string(), "dining".to_string());

        let mut failed = result("budget", false, 50);
        failed.error = Some("db unavailable".to_string());
        collector.record_execution(&failed, Some("u9"), &params);
        collector.record_execution(&result("budget", true, 20), Some("u9"), &params);

        let analytics = collector.skill_analytics("budget").unwrap();
        assert_eq!(analytics.recent_errors.len(), 1);
        assert_eq!(analytics.recent_errors[0].error, "db unavailable");
        assert_eq!(analytics.top_params, vec![("category=dining".to_string(), 2)]);
        assert_eq!(analytics.hourly_usage.iter().sum::<u64>(), 2);
        assert_eq!(analytics.success_rate, 0.5);

        assert!(collector.skill_analytics("missing").is_none());
    }

    #[test]
    fn test_retention_prunes_old_entries() {
        let collector = SkillMetricsCollector::new();
        let params = HashMap::new();
        let old = Utc::now() - ChronoDuration::days(45);

        let mut failed = result("old", false, 5);
        failed.error = Some("boom".to_string());
        collector.record_execution_at(&failed, None, &params, old);
        collector.record_execution(&result("new", true, 5), None, &params);

        assert_eq!(collector.history_len(), 1);
        assert_eq!(collector.health_report().error_count, 0);
        // Aggregates are cumulative and survive pruning
        assert_eq!(collector.skill_metrics("old").unwrap().execution_count, 1);
    }

    #[test]
    fn test_history_capped() {
        let collector = SkillMetricsCollector::with_config(MetricsConfig {
            retention_days: 30,
            max_history: 5,
        });
        let params = HashMap::new();
        for i in 0..10 {
            collector.record_execution(&result("s", true, i), None, &params);
        }
        assert_eq!(collector.history_len(), 5);
    }

    #[test]
    fn test_out_of_range_retention_keeps_recording() {
        let params = HashMap::new();
        for retention_days in [100_000_000, i64::MAX, 0, -7] {
            let collector = SkillMetricsCollector::with_config(MetricsConfig {
                retention_days,
                max_history: 100,
            });
            let old = Utc::now() - ChronoDuration::days(400);
            collector.record_execution_at(&result("s", true, 5), None, &params, old);
            collector.record_execution(&result("s", true, 5), None, &params);

            assert_eq!(collector.history_len(), 2, "retention_days = {}", retention_days);
        }
    }

    #[test]
    fn test_poisoned_lock_drops_record_without_panicking() {
        let collector = Arc::new(SkillMetricsCollector::new());
        let params = HashMap::new();
        collector.record_execution(&result("s", true, 5), None, &params);

        let poisoner = Arc::clone(&collector);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.state.write().unwrap();
            panic!("poison metrics lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(collector.state.is_poisoned());

        collector.record_execution(&result("s", true, 5), None, &params);

        let retained = match collector.state.read() {
            Err(poisoned) => poisoned.into_inner().history.len(),
            Ok(_) => panic!("lock should stay poisoned"),
        };
        assert_eq!(retained, 1);
    }

    #[test]
    fn test_health_report_and_ranking() {
        let collector = SkillMetricsCollector::new();
        let params = HashMap::new();

        for _ in 0..5 {
            collector.record_execution(&result("good", true, 10), None, &params);
            collector.record_execution(&result("bad", false, 10), None, &params);
        }

        let report = collector.health_report();
        assert_eq!(report.total_executions, 10);
        assert_eq!(report.overall_success_rate, 0.5);

        let good = report.skills.iter().find(|s| s.skill_id == "good").unwrap();
        let bad = report.skills.iter().find(|s| s.skill_id == "bad").unwrap();
        assert_eq!(good.status, HealthStatus::Healthy);
        assert_eq!(bad.status, HealthStatus::Failing);
        assert_eq!(report.ranking, vec!["good", "bad"]);
    }

    #[test]
    fn test_real_time_monitoring() {
        let collector = SkillMetricsCollector::new();
        let params = HashMap::new();

        collector.record_execution(&result("a", true, 100), None, &params);
        collector.record_execution(&result("b", true, 300), None, &params);
        collector.record_execution_at(
            &result("c", true, 5),
            None,
            &params,
            Utc::now() - ChronoDuration::hours(3),
        );

        let snapshot = collector.real_time_monitoring();
        assert_eq!(snapshot.executions_last_minute, 2);
        assert_eq!(snapshot.executions_last_hour, 2);
        assert_eq!(snapshot.active_skills, vec!["a", "b"]);
        assert!((snapshot.average_latency_last_hour_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_export_and_reset() {
        let collector = SkillMetricsCollector::new();
        collector.record_execution(&result("x", true, 1), None, &HashMap::new());

        let exported: serde_json::Value = serde_json::from_str(&collector.export_metrics()).unwrap();
        assert_eq!(exported["health"]["total_executions"], 1);
        assert!(exported["skills"]["x"].is_object());

        collector.reset();
        assert_eq!(collector.history_len(), 0);
        assert!(collector.skill_metrics("x").is_none());
    }

    #[test]
    fn test_empty_collector() {
        let collector = SkillMetricsCollector::new();
        let report = collector.health_report();
        assert_eq!(report.total_executions, 0);
        assert_eq!(report.overall_success_rate, 0.0);
        assert!(collector.skill_ranking().is_empty());
    }
}
