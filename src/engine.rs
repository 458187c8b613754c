//! Skill Engine
//!
//! Runs the cascade for one question:
//!
//! 1. Execution cache (when enabled): a hit is returned unchanged.
//! 2. Registry lookup, highest priority first.
//! 3. Per skill, unless its circuit is open: micro-solvers, knowledge base,
//!    research agent, then the composer if an earlier stage surfaced data.
//! 4. The first stage result that clears the skill's usefulness threshold is
//!    recorded, cached and returned.
//!
//! A stage error or panic fails the whole skill (recorded, breaker
//! incremented) and the cascade moves to the next skill. A stage that runs
//! past its timeout counts as "no result": nothing is recorded and the
//! breaker is left alone.

use crate::cache::{CacheStats, ExecutionCache};
use crate::circuit::{BreakerStatus, CircuitBreaker, CircuitState};
use crate::config::{AssistantConfig, EngineConfig};
use crate::context::ChatContext;
use crate::metrics::{LatencyTimer, SkillExecutionResult, SkillMetricsCollector};
use crate::response::ChatResponse;
use crate::skills::{
    register_builtin_skills, RegistryStats, Skill, SkillInterceptor, SkillRegistry,
    SkillValidationError, StageKind, StageOutput,
};
use crate::usefulness::{HeuristicScorer, UsefulnessScorer, MAX_USEFULNESS};
use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Skill not found: {0}")]
    SkillNotFound(String),
}

/// Introspection snapshot
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub registry: RegistryStats,
    pub cache: CacheStats,
    pub circuit_breakers: HashMap<String, BreakerStatus>,
    pub open_circuits: usize,
    pub total_executions: u64,
    pub overall_success_rate: f64,
    pub config: EngineConfig,
}

/// What one stage invocation produced
enum StageAttempt {
    Produced(StageOutput),
    Empty,
    TimedOut,
    Failed(anyhow::Error),
}

/// How one skill attempt ended
enum SkillOutcome {
    Admitted(SkillExecutionResult, ChatResponse),
    Failed(SkillExecutionResult),
    Exhausted(Duration),
}

/// Result of settling one stage attempt
enum Settled {
    Done(SkillOutcome),
    /// The stage returned output (admitted or not)
    Produced,
    Nothing,
}

/// Per-attempt bookkeeping shared by every stage
struct SkillRun<'a> {
    skill: &'a Skill,
    question: &'a str,
    ctx: &'a ChatContext,
    config: &'a EngineConfig,
    params: HashMap<String, String>,
    matched_pattern: Option<String>,
    timer: LatencyTimer,
}

/// Answers questions through registered skills
pub struct SkillEngine {
    registry: Arc<SkillRegistry>,
    cache: ExecutionCache,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<SkillMetricsCollector>,
    scorer: Arc<dyn UsefulnessScorer>,
    interceptors: Vec<Arc<dyn SkillInterceptor>>,
    config: EngineConfig,
}

impl SkillEngine {
    pub fn builder() -> SkillEngineBuilder {
        SkillEngineBuilder::default()
    }

    /// Build every collaborator from configuration, registering the
    /// built-in skills when enabled
    pub fn from_config(config: &AssistantConfig) -> Result<Self, SkillValidationError> {
        let registry = Arc::new(SkillRegistry::new());
        if config.builtin_skills {
            register_builtin_skills(&registry)?;
        }

        Ok(Self::builder()
            .registry(registry)
            .cache(ExecutionCache::new(config.cache.max_entries))
            .circuit_breaker(Arc::new(CircuitBreaker::with_config(
                config.circuit_breaker.clone(),
            )))
            .metrics(Arc::new(SkillMetricsCollector::with_config(
                config.metrics.clone(),
            )))
            .config(config.engine.clone())
            .build())
    }

    /// Run the cascade with the engine's default configuration
    pub async fn try_skills(&self, question: &str, ctx: &ChatContext) -> Option<ChatResponse> {
        self.try_skills_with(question, ctx, &self.config).await
    }

    /// Run the cascade. `None` means no skill produced an admissible answer
    /// and the caller should fall back to its own pipeline.
    pub async fn try_skills_with(
        &self,
        question: &str,
        ctx: &ChatContext,
        config: &EngineConfig,
    ) -> Option<ChatResponse> {
        let key = ExecutionCache::compute_key(question, ctx);

        if config.enable_caching {
            let timer = LatencyTimer::start();
            if let Some(entry) = self.cache.get(&key).await {
                debug!("Answered from cache (skill '{}')", entry.skill_id);
                if config.enable_metrics {
                    let result = SkillExecutionResult {
                        skill_id: entry.skill_id.clone(),
                        step: StageKind::Cache,
                        response: Some(entry.response.clone()),
                        usefulness: entry.usefulness,
                        execution_time_ms: timer.elapsed_ms(),
                        success: true,
                        cached: true,
                        error: None,
                        matched_pattern: None,
                    };
                    self.metrics
                        .record_execution(&result, ctx.user_id(), &HashMap::new());
                }
                return Some(entry.response);
            }
        }

        let candidates = self.registry.find(question);
        if candidates.is_empty() {
            debug!("No skill matched question");
            return None;
        }

        for skill in candidates {
            if config.enable_circuit_breaker && self.breaker.is_open(&skill.id) {
                debug!("Skipping skill '{}': circuit open", skill.id);
                continue;
            }

            match self.attempt_skill(&skill, question, ctx, config).await {
                SkillOutcome::Admitted(result, response) => {
                    if config.enable_circuit_breaker {
                        self.breaker.record_success(&skill.id);
                    }
                    if config.enable_caching {
                        self.cache
                            .set(
                                &key,
                                response.clone(),
                                &skill.id,
                                result.usefulness,
                                config.cache_ttl(),
                            )
                            .await;
                    }
                    return Some(response);
                }
                SkillOutcome::Failed(_) => {
                    if config.enable_circuit_breaker {
                        self.breaker.record_failure(&skill.id);
                    }
                }
                SkillOutcome::Exhausted(_) => {
                    debug!("Skill '{}' produced no admissible answer", skill.id);
                }
            }
        }

        None
    }

    /// Run a single skill directly, bypassing registry ordering, the cache
    /// and the circuit breaker. Metrics are still recorded when enabled.
    pub async fn test_skill(
        &self,
        skill_id: &str,
        question: &str,
        ctx: &ChatContext,
        config: &EngineConfig,
    ) -> Result<SkillExecutionResult, EngineError> {
        let skill = self
            .registry
            .get(skill_id)
            .ok_or_else(|| EngineError::SkillNotFound(skill_id.to_string()))?;

        Ok(match self.attempt_skill(&skill, question, ctx, config).await {
            SkillOutcome::Admitted(result, _) | SkillOutcome::Failed(result) => result,
            SkillOutcome::Exhausted(elapsed) => {
                let mut result = SkillExecutionResult::empty(skill_id, elapsed);
                result.matched_pattern = skill.matches(question);
                result
            }
        })
    }

    async fn attempt_skill(
        &self,
        skill: &Skill,
        question: &str,
        ctx: &ChatContext,
        config: &EngineConfig,
    ) -> SkillOutcome {
        let run = SkillRun {
            skill,
            question,
            ctx,
            config,
            params: skill
                .extract_slots(question)
                .into_iter()
                .map(|(name, value)| (name, value.to_string()))
                .collect(),
            matched_pattern: skill.matches(question),
            timer: LatencyTimer::start(),
        };

        for interceptor in &self.interceptors {
            interceptor.before(skill, question, ctx);
        }
        debug!("Trying skill '{}'", skill.id);

        let timeout = config.stage_timeout();
        let mut surfaced: Option<serde_json::Value> = None;

        let mut solvers = Vec::with_capacity(skill.stage_count());
        solvers.extend(
            skill
                .micro_solvers()
                .iter()
                .map(|s| (StageKind::MicroSolver, s)),
        );
        solvers.extend(skill.kb_search().map(|s| (StageKind::KnowledgeBase, s)));
        solvers.extend(skill.research_agent().map(|s| (StageKind::ResearchAgent, s)));

        // The first micro-solver to return output ends the micro-solver stage
        let mut micro_answered = false;
        for (kind, solver) in solvers {
            if kind == StageKind::MicroSolver && micro_answered {
                continue;
            }
            let attempt = run_stage(&skill.id, kind, timeout, solver.solve(question, ctx)).await;
            match self.settle(&run, kind, attempt, &mut surfaced) {
                Settled::Done(outcome) => return outcome,
                Settled::Produced => micro_answered |= kind == StageKind::MicroSolver,
                Settled::Nothing => {}
            }
        }

        if let (Some(composer), Some(data)) = (skill.composer(), surfaced.take()) {
            let attempt = run_stage(
                &skill.id,
                StageKind::Composer,
                timeout,
                composer.compose(question, &data, ctx),
            )
            .await;
            if let Settled::Done(outcome) =
                self.settle(&run, StageKind::Composer, attempt, &mut surfaced)
            {
                return outcome;
            }
        }

        SkillOutcome::Exhausted(run.timer.elapsed())
    }

    fn settle(
        &self,
        run: &SkillRun<'_>,
        kind: StageKind,
        attempt: StageAttempt,
        surfaced: &mut Option<serde_json::Value>,
    ) -> Settled {
        let skill = run.skill;
        match attempt {
            StageAttempt::Empty => Settled::Nothing,
            StageAttempt::TimedOut => {
                debug!(
                    "Skill '{}' {} timed out after {}ms",
                    skill.id, kind, run.config.timeout_ms
                );
                Settled::Nothing
            }
            StageAttempt::Failed(error) => {
                warn!("Skill '{}' {} failed: {:#}", skill.id, kind, error);
                for interceptor in &self.interceptors {
                    interceptor.on_error(skill, kind, &error);
                }

                let result = SkillExecutionResult {
                    skill_id: skill.id.clone(),
                    step: kind,
                    response: None,
                    usefulness: 0.0,
                    execution_time_ms: run.timer.elapsed_ms(),
                    success: false,
                    cached: false,
                    error: Some(format!("{:#}", error)),
                    matched_pattern: run.matched_pattern.clone(),
                };
                self.record(run, &result);
                self.notify_after(skill, &result);
                Settled::Done(SkillOutcome::Failed(result))
            }
            StageAttempt::Produced(output) => {
                if let Some(data) = output.data {
                    *surfaced = Some(data);
                }
                let Some(response) = output.response else {
                    return Settled::Produced;
                };

                let usefulness = output
                    .usefulness
                    .unwrap_or_else(|| self.scorer.score(run.question, &response))
                    .clamp(0.0, MAX_USEFULNESS);
                let matched_pattern = output
                    .matched_pattern
                    .or_else(|| run.matched_pattern.clone());

                if usefulness >= skill.min_usefulness {
                    info!(
                        "Skill '{}' answered via {} (usefulness {:.1})",
                        skill.id, kind, usefulness
                    );
                    let result = SkillExecutionResult {
                        skill_id: skill.id.clone(),
                        step: kind,
                        response: Some(response.clone()),
                        usefulness,
                        execution_time_ms: run.timer.elapsed_ms(),
                        success: true,
                        cached: false,
                        error: None,
                        matched_pattern,
                    };
                    self.record(run, &result);
                    self.notify_after(skill, &result);
                    Settled::Done(SkillOutcome::Admitted(result, response))
                } else {
                    debug!(
                        "Skill '{}' {} scored {:.1}, below threshold {:.1}",
                        skill.id, kind, usefulness, skill.min_usefulness
                    );
                    let result = SkillExecutionResult {
                        skill_id: skill.id.clone(),
                        step: kind,
                        response: None,
                        usefulness,
                        execution_time_ms: run.timer.elapsed_ms(),
                        success: false,
                        cached: false,
                        error: None,
                        matched_pattern,
                    };
                    self.record(run, &result);
                    Settled::Produced
                }
            }
        }
    }

    fn record(&self, run: &SkillRun<'_>, result: &SkillExecutionResult) {
        if run.config.enable_metrics {
            self.metrics
                .record_execution(result, run.ctx.user_id(), &run.params);
        }
    }

    fn notify_after(&self, skill: &Skill, result: &SkillExecutionResult) {
        for interceptor in &self.interceptors {
            interceptor.after(skill, result);
        }
    }

    /// Registry, cache, breaker and health summary
    pub async fn stats(&self) -> EngineStats {
        let circuit_breakers = self.breaker.status();
        let open_circuits = circuit_breakers
            .values()
            .filter(|s| s.state == CircuitState::Open)
            .count();
        let health = self.metrics.health_report();

        EngineStats {
            registry: self.registry.stats(),
            cache: self.cache.stats().await,
            circuit_breakers,
            open_circuits,
            total_executions: health.total_executions,
            overall_success_rate: health.overall_success_rate,
            config: self.config.clone(),
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn circuit_breaker_status(&self) -> HashMap<String, BreakerStatus> {
        self.breaker.status()
    }

    pub async fn clear_execution_cache(&self) {
        self.cache.clear().await;
        info!("Execution cache cleared");
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<SkillMetricsCollector> {
        &self.metrics
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Invoke one stage under the timeout, turning errors and panics into
/// `StageAttempt::Failed`
async fn run_stage<F>(skill_id: &str, kind: StageKind, timeout: Duration, fut: F) -> StageAttempt
where
    F: Future<Output = anyhow::Result<Option<StageOutput>>>,
{
    match tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Err(_) => StageAttempt::TimedOut,
        Ok(Err(panic)) => {
            let message = panic_message(&*panic);
            warn!("Skill '{}' {} panicked: {}", skill_id, kind, message);
            StageAttempt::Failed(anyhow::anyhow!("stage panicked: {}", message))
        }
        Ok(Ok(Err(e))) => StageAttempt::Failed(e),
        Ok(Ok(Ok(Some(output)))) => StageAttempt::Produced(output),
        Ok(Ok(Ok(None))) => StageAttempt::Empty,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Builder for [`SkillEngine`]; anything not supplied gets a default
#[derive(Default)]
pub struct SkillEngineBuilder {
    registry: Option<Arc<SkillRegistry>>,
    cache: Option<ExecutionCache>,
    breaker: Option<Arc<CircuitBreaker>>,
    metrics: Option<Arc<SkillMetricsCollector>>,
    scorer: Option<Arc<dyn UsefulnessScorer>>,
    interceptors: Vec<Arc<dyn SkillInterceptor>>,
    config: EngineConfig,
}

impl SkillEngineBuilder {
    pub fn registry(mut self, registry: Arc<SkillRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn cache(mut self, cache: ExecutionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn metrics(mut self, metrics: Arc<SkillMetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn UsefulnessScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn SkillInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SkillEngine {
        SkillEngine {
            registry: self.registry.unwrap_or_default(),
            cache: self.cache.unwrap_or_else(|| ExecutionCache::new(1_000)),
            breaker: self.breaker.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
            scorer: self.scorer.unwrap_or_else(|| Arc::new(HeuristicScorer)),
            interceptors: self.interceptors,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine_with(skills: Vec<Skill>) -> SkillEngine {
        let registry = Arc::new(SkillRegistry::new());
        for skill in skills {
            registry.register(skill).unwrap();
        }
        SkillEngine::builder().registry(registry).build()
    }

    fn answering(id: &str, priority: i32, message: &'static str) -> Skill {
        Skill::builder(id)
            .priority(priority)
            .matching("(?i)money")
            .micro_solver_fn(move |_q: &str, _ctx: &ChatContext| {
                Ok(Some(StageOutput::response(ChatResponse::new(message)).with_usefulness(4.0)))
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_highest_priority_wins() {
        let engine = engine_with(vec![
            answering("low", 1, "low"),
            answering("high", 10, "high"),
        ]);
        let response = engine
            .try_skills("money?", &ChatContext::default())
            .await
            .unwrap();
        assert_eq!(response.message, "high");
    }

    #[tokio::test]
    async fn test_below_threshold_falls_through_to_next_stage() {
        let skill = Skill::builder("layered")
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| {
                Ok(Some(StageOutput::response(ChatResponse::new("meh")).with_usefulness(1.0)))
            })
            .knowledge_base(crate::skills::FnSolver::new(|_q: &str, _ctx: &ChatContext| {
                Ok(Some(StageOutput::response(ChatResponse::new("kb")).with_usefulness(5.0)))
            }))
            .build()
            .unwrap();
        let engine = engine_with(vec![skill]);

        let result = engine
            .test_skill("layered", "money", &ChatContext::default(), &EngineConfig::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.step, StageKind::KnowledgeBase);
        assert_eq!(result.response.unwrap().message, "kb");

        // The rejected micro-solver attempt is recorded too
        assert_eq!(engine.metrics().skill_metrics("layered").unwrap().execution_count, 2);
    }

    #[tokio::test]
    async fn test_first_micro_solver_output_ends_stage() {
        let second_calls = Arc::new(AtomicUsize::new(0));
        let counter = second_calls.clone();
        let skill = Skill::builder("micro")
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| {
                Ok(Some(StageOutput::response(ChatResponse::new("weak")).with_usefulness(0.5)))
            })
            .micro_solver_fn(move |_q: &str, _ctx: &ChatContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(StageOutput::response(ChatResponse::new("strong")).with_usefulness(5.0)))
            })
            .build()
            .unwrap();
        let engine = engine_with(vec![skill]);

        assert!(engine.try_skills("money", &ChatContext::default()).await.is_none());
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_composer_runs_on_surfaced_data() {
        let skill = Skill::builder("composed")
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| {
                Ok(Some(StageOutput::data(serde_json::json!({ "total": 42 }))))
            })
            .composer_fn(|_q: &str, data: &serde_json::Value, _ctx: &ChatContext| {
                let msg = format!("Total is {}", data["total"]);
                Ok(Some(StageOutput::response(ChatResponse::new(msg)).with_usefulness(4.0)))
            })
            .build()
            .unwrap();
        let engine = engine_with(vec![skill]);

        let result = engine
            .test_skill("composed", "money", &ChatContext::default(), &EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(result.step, StageKind::Composer);
        assert_eq!(result.response.unwrap().message, "Total is 42");
    }

    #[tokio::test]
    async fn test_composer_skipped_without_data() {
        let composed = Arc::new(AtomicUsize::new(0));
        let counter = composed.clone();
        let skill = Skill::builder("nodata")
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| Ok(None))
            .composer_fn(move |_q: &str, _d: &serde_json::Value, _ctx: &ChatContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .build()
            .unwrap();
        let engine = engine_with(vec![skill]);

        let result = engine
            .test_skill("nodata", "money", &ChatContext::default(), &EngineConfig::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.step, StageKind::Unknown);
        assert_eq!(result.matched_pattern.as_deref(), Some("money"));
        assert_eq!(composed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stage_error_is_recorded() {
        let skill = Skill::builder("broken")
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| bail!("database unavailable"))
            .build()
            .unwrap();
        let engine = engine_with(vec![skill]);

        let result = engine
            .test_skill("broken", "money", &ChatContext::default(), &EngineConfig::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("database unavailable"));

        // test_skill never touches the breaker
        assert!(engine.circuit_breaker_status().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_stage_is_a_failure() {
        let skill = Skill::builder("panicky")
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| -> anyhow::Result<Option<StageOutput>> {
                panic!("boom")
            })
            .build()
            .unwrap();
        let engine = engine_with(vec![skill, answering("backup", -1, "backup")]);

        let response = engine
            .try_skills("money", &ChatContext::default())
            .await
            .unwrap();
        assert_eq!(response.message, "backup");
        assert_eq!(engine.circuit_breaker_status()["panicky"].failures, 1);
    }

    #[tokio::test]
    async fn test_unknown_skill() {
        let engine = engine_with(vec![]);
        let err = engine
            .test_skill("ghost", "q", &ChatContext::default(), &EngineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SkillNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_scorer_used_without_self_report() {
        struct Fixed(f32);
        impl UsefulnessScorer for Fixed {
            fn score(&self, _q: &str, _r: &ChatResponse) -> f32 {
                self.0
            }
        }

        let skill = Skill::builder("unscored")
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| {
                Ok(Some(StageOutput::response(ChatResponse::new("answer"))))
            })
            .build()
            .unwrap();
        let registry = Arc::new(SkillRegistry::new());
        registry.register(skill).unwrap();

        let low = SkillEngine::builder()
            .registry(registry.clone())
            .scorer(Arc::new(Fixed(2.0)))
            .build();
        assert!(low.try_skills("money", &ChatContext::default()).await.is_none());

        let high = SkillEngine::builder()
            .registry(registry)
            .scorer(Arc::new(Fixed(9.0)))
            .build();
        let result = high
            .test_skill("unscored", "money", &ChatContext::default(), &EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(result.usefulness, MAX_USEFULNESS);
    }

    #[tokio::test]
    async fn test_interceptors_observe_attempts() {
        #[derive(Default)]
        struct Counting {
            before: AtomicUsize,
            after: AtomicUsize,
            errors: AtomicUsize,
        }
        impl SkillInterceptor for Counting {
            fn before(&self, _s: &Skill, _q: &str, _c: &ChatContext) {
                self.before.fetch_add(1, Ordering::SeqCst);
            }
            fn after(&self, _s: &Skill, _r: &SkillExecutionResult) {
                self.after.fetch_add(1, Ordering::SeqCst);
            }
            fn on_error(&self, _s: &Skill, _k: StageKind, _e: &anyhow::Error) {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
        }

        let failing = Skill::builder("failing")
            .priority(5)
            .matching("money")
            .micro_solver_fn(|_q: &str, _ctx: &ChatContext| bail!("nope"))
            .build()
            .unwrap();
        let registry = Arc::new(SkillRegistry::new());
        registry.register(failing).unwrap();
        registry.register(answering("ok", 1, "fine")).unwrap();

        let counting = Arc::new(Counting::default());
        let engine = SkillEngine::builder()
            .registry(registry)
            .interceptor(counting.clone())
            .build();

        assert!(engine.try_skills("money", &ChatContext::default()).await.is_some());
        assert_eq!(counting.before.load(Ordering::SeqCst), 2);
        assert_eq!(counting.after.load(Ordering::SeqCst), 2);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metrics_disabled_records_nothing() {
        let engine = engine_with(vec![answering("quiet", 1, "hi")]);
        let config = EngineConfig {
            enable_metrics: false,
            ..Default::default()
        };
        assert!(engine
            .try_skills_with("money", &ChatContext::default(), &config)
            .await
            .is_some());
        assert_eq!(engine.metrics().history_len(), 0);
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let engine = engine_with(vec![answering("one", 1, "hi")]);
        engine.try_skills("money", &ChatContext::default()).await;

        let stats = engine.stats().await;
        assert_eq!(stats.registry.total_skills, 1);
        assert_eq!(stats.cache.size, 1);
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.open_circuits, 0);

        engine.clear_execution_cache().await;
        assert_eq!(engine.cache_stats().await.size, 0);
    }

    #[test]
    fn test_from_config_registers_builtins() {
        let engine = SkillEngine::from_config(&AssistantConfig::default()).unwrap();
        assert!(engine.registry().contains("hysa"));

        let bare = SkillEngine::from_config(&AssistantConfig {
            builtin_skills: false,
            ..Default::default()
        })
        .unwrap();
        assert!(bare.registry().is_empty());
    }
}
