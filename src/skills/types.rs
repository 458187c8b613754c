//! Skill Type Definitions
//!
//! A skill answers one topic of question through an ordered set of stages:
//! micro-solvers, knowledge-base search, research agent and composer.
//! Definitions are validated once, at registration, so the cascade never has
//! to type-check anything on the hot path.

use crate::context::ChatContext;
use crate::metrics::SkillExecutionResult;
use crate::response::ChatResponse;
use crate::usefulness::MAX_USEFULNESS;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default admission threshold
pub const DEFAULT_MIN_USEFULNESS: f32 = 3.0;

/// Which stage produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    MicroSolver,
    KnowledgeBase,
    ResearchAgent,
    Composer,
    Cache,
    Unknown,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::MicroSolver => "micro_solver",
            StageKind::KnowledgeBase => "knowledge_base",
            StageKind::ResearchAgent => "research_agent",
            StageKind::Composer => "composer",
            StageKind::Cache => "cache",
            StageKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage hands back to the engine
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    /// Candidate answer, subject to the usefulness gate
    pub response: Option<ChatResponse>,
    /// Structured data for the composer
    pub data: Option<serde_json::Value>,
    /// Self-reported usefulness; the scorer is used when absent
    pub usefulness: Option<f32>,
    /// Diagnostic: what the stage keyed on
    pub matched_pattern: Option<String>,
}

impl StageOutput {
    pub fn response(response: ChatResponse) -> Self {
        Self {
            response: Some(response),
            ..Default::default()
        }
    }

    pub fn data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_usefulness(mut self, usefulness: f32) -> Self {
        self.usefulness = Some(usefulness);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_matched_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.matched_pattern = Some(pattern.into());
        self
    }
}

/// Micro-solver, knowledge-base search or research agent
#[async_trait]
pub trait Solver: Send + Sync {
    async fn solve(&self, question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>>;
}

/// Turns structured data from an earlier stage into a final answer
#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(
        &self,
        question: &str,
        data: &serde_json::Value,
        ctx: &ChatContext,
    ) -> Result<Option<StageOutput>>;
}

/// Solver backed by a synchronous closure
pub struct FnSolver<F>(F);

impl<F> FnSolver<F>
where
    F: Fn(&str, &ChatContext) -> Result<Option<StageOutput>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Solver for FnSolver<F>
where
    F: Fn(&str, &ChatContext) -> Result<Option<StageOutput>> + Send + Sync,
{
    async fn solve(&self, question: &str, ctx: &ChatContext) -> Result<Option<StageOutput>> {
        (self.0)(question, ctx)
    }
}

/// Composer backed by a synchronous closure
pub struct FnComposer<F>(F);

impl<F> FnComposer<F>
where
    F: Fn(&str, &serde_json::Value, &ChatContext) -> Result<Option<StageOutput>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Composer for FnComposer<F>
where
    F: Fn(&str, &serde_json::Value, &ChatContext) -> Result<Option<StageOutput>> + Send + Sync,
{
    async fn compose(
        &self,
        question: &str,
        data: &serde_json::Value,
        ctx: &ChatContext,
    ) -> Result<Option<StageOutput>> {
        (self.0)(question, data, ctx)
    }
}

/// Hooks the engine calls around every skill attempt
pub trait SkillInterceptor: Send + Sync {
    fn before(&self, _skill: &Skill, _question: &str, _ctx: &ChatContext) {}

    fn after(&self, _skill: &Skill, _result: &SkillExecutionResult) {}

    fn on_error(&self, _skill: &Skill, _stage: StageKind, _error: &anyhow::Error) {}
}

/// Slot value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Text,
    Number,
    Amount,
    Date,
    Category,
    Boolean,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Amount => "amount",
            Self::Date => "date",
            Self::Category => "category",
            Self::Boolean => "boolean",
        }
    }

    /// Parse raw captured text into a typed value
    pub fn parse(&self, raw: &str) -> Option<SlotValue> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            Self::Text => Some(SlotValue::Text(raw.to_string())),
            Self::Number => raw.parse().ok().map(SlotValue::Number),
            Self::Amount => raw
                .trim_start_matches('$')
                .replace(',', "")
                .parse()
                .ok()
                .map(SlotValue::Amount),
            Self::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(SlotValue::Date),
            Self::Category => Some(SlotValue::Category(raw.to_lowercase())),
            Self::Boolean => match raw.to_lowercase().as_str() {
                "yes" | "true" | "y" => Some(SlotValue::Boolean(true)),
                "no" | "false" | "n" => Some(SlotValue::Boolean(false)),
                _ => None,
            },
        }
    }
}

/// Typed slot value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SlotValue {
    Text(String),
    Number(f64),
    Amount(f64),
    Date(NaiveDate),
    Category(String),
    Boolean(bool),
}

impl SlotValue {
    pub fn kind(&self) -> SlotKind {
        match self {
            Self::Text(_) => SlotKind::Text,
            Self::Number(_) => SlotKind::Number,
            Self::Amount(_) => SlotKind::Amount,
            Self::Date(_) => SlotKind::Date,
            Self::Category(_) => SlotKind::Category,
            Self::Boolean(_) => SlotKind::Boolean,
        }
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Category(s) => f.write_str(s),
            Self::Number(n) | Self::Amount(n) => write!(f, "{}", n),
            Self::Date(d) => write!(f, "{}", d),
            Self::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Validator run against an extracted or default slot value
pub type SlotValidator = fn(&SlotValue) -> std::result::Result<(), String>;

/// Slot schema entry
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: String,
    pub kind: SlotKind,
    pub required: bool,
    /// First capture group is the raw value
    pub pattern: Option<Regex>,
    pub default: Option<SlotValue>,
    pub validator: Option<SlotValidator>,
}

impl SlotSpec {
    pub fn new(name: &str, kind: SlotKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            pattern: None,
            default: None,
            validator: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, SkillValidationError> {
        let re = Regex::new(pattern).map_err(|e| {
            SkillValidationError::InvalidSlot(format!("{}: bad pattern: {}", self.name, e))
        })?;
        self.pattern = Some(re);
        Ok(self)
    }

    pub fn with_default(mut self, value: SlotValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_validator(mut self, validator: SlotValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Extract this slot from a question, falling back to the default
    pub fn extract(&self, question: &str) -> Option<SlotValue> {
        let captured = self
            .pattern
            .as_ref()
            .and_then(|re| re.captures(question))
            .and_then(|caps| caps.get(1))
            .and_then(|m| self.kind.parse(m.as_str()));

        let value = captured.or_else(|| self.default.clone())?;
        if let Some(validate) = self.validator {
            if let Err(reason) = validate(&value) {
                debug!("Slot '{}' rejected value {}: {}", self.name, value, reason);
                return None;
            }
        }
        Some(value)
    }

    fn validate(&self) -> Result<(), SkillValidationError> {
        if self.name.is_empty() {
            return Err(SkillValidationError::InvalidSlot("empty slot name".to_string()));
        }
        if let Some(ref default) = self.default {
            if default.kind() != self.kind {
                return Err(SkillValidationError::InvalidSlot(format!(
                    "{}: default is {} but slot is {}",
                    self.name,
                    default.kind().as_str(),
                    self.kind.as_str()
                )));
            }
            if let Some(validate) = self.validator {
                validate(default).map_err(|reason| {
                    SkillValidationError::InvalidSlot(format!("{}: {}", self.name, reason))
                })?;
            }
        }
        Ok(())
    }
}

/// Decides whether a skill is a candidate for a question
#[derive(Clone)]
pub enum SkillMatcher {
    Patterns(Vec<Regex>),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl fmt::Debug for SkillMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patterns(patterns) => f
                .debug_tuple("Patterns")
                .field(&patterns.iter().map(|r| r.as_str()).collect::<Vec<_>>())
                .finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Registered capability
pub struct Skill {
    pub id: String,
    pub description: String,
    pub priority: i32,
    pub min_usefulness: f32,
    /// Skills that must stay registered while this one is
    pub dependencies: Vec<String>,
    pub slots: Vec<SlotSpec>,
    matcher: SkillMatcher,
    micro_solvers: Vec<Arc<dyn Solver>>,
    kb_search: Option<Arc<dyn Solver>>,
    research_agent: Option<Arc<dyn Solver>>,
    composer: Option<Arc<dyn Composer>>,
}

impl fmt::Debug for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skill")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("min_usefulness", &self.min_usefulness)
            .field("dependencies", &self.dependencies)
            .field("matcher", &self.matcher)
            .field("micro_solvers", &self.micro_solvers.len())
            .field("kb_search", &self.kb_search.is_some())
            .field("research_agent", &self.research_agent.is_some())
            .field("composer", &self.composer.is_some())
            .finish()
    }
}

impl Skill {
    pub fn builder(id: &str) -> SkillBuilder {
        SkillBuilder::new(id)
    }

    /// Returns the matched pattern (or `"predicate"`) when the skill claims the question
    pub fn matches(&self, question: &str) -> Option<String> {
        match &self.matcher {
            SkillMatcher::Patterns(patterns) => patterns
                .iter()
                .find(|re| re.is_match(question))
                .map(|re| re.as_str().to_string()),
            SkillMatcher::Predicate(pred) => pred(question).then(|| "predicate".to_string()),
        }
    }

    pub fn micro_solvers(&self) -> &[Arc<dyn Solver>] {
        &self.micro_solvers
    }

    pub fn kb_search(&self) -> Option<&Arc<dyn Solver>> {
        self.kb_search.as_ref()
    }

    pub fn research_agent(&self) -> Option<&Arc<dyn Solver>> {
        self.research_agent.as_ref()
    }

    pub fn composer(&self) -> Option<&Arc<dyn Composer>> {
        self.composer.as_ref()
    }

    /// Number of stages that can produce a candidate answer or data
    pub fn stage_count(&self) -> usize {
        self.micro_solvers.len()
            + usize::from(self.kb_search.is_some())
            + usize::from(self.research_agent.is_some())
            + usize::from(self.composer.is_some())
    }

    /// Extract all slots that resolve for this question
    pub fn extract_slots(&self, question: &str) -> HashMap<String, SlotValue> {
        self.slots
            .iter()
            .filter_map(|slot| slot.extract(question).map(|v| (slot.name.clone(), v)))
            .collect()
    }

    /// Validate the definition; called at registration
    pub fn validate(&self) -> Result<(), SkillValidationError> {
        if self.id.is_empty() {
            return Err(SkillValidationError::MissingField("id".to_string()));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(SkillValidationError::InvalidId(self.id.clone()));
        }

        if !(0.0..=MAX_USEFULNESS).contains(&self.min_usefulness) {
            return Err(SkillValidationError::InvalidThreshold(self.min_usefulness));
        }

        if let SkillMatcher::Patterns(ref patterns) = self.matcher {
            if patterns.is_empty() {
                return Err(SkillValidationError::MissingField("match pattern".to_string()));
            }
        }

        let producers = self.stage_count() - usize::from(self.composer.is_some());
        if producers == 0 {
            return Err(SkillValidationError::NoStages(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for slot in &self.slots {
            if !seen.insert(slot.name.as_str()) {
                return Err(SkillValidationError::InvalidSlot(format!(
                    "duplicate slot name: {}",
                    slot.name
                )));
            }
            slot.validate()?;
        }

        if self.dependencies.iter().any(|d| d == &self.id) {
            return Err(SkillValidationError::SelfDependency(self.id.clone()));
        }

        Ok(())
    }
}

/// Builder for [`Skill`]
pub struct SkillBuilder {
    id: String,
    description: String,
    priority: i32,
    min_usefulness: f32,
    dependencies: Vec<String>,
    slots: Vec<SlotSpec>,
    patterns: Vec<String>,
    predicate: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
    micro_solvers: Vec<Arc<dyn Solver>>,
    kb_search: Option<Arc<dyn Solver>>,
    research_agent: Option<Arc<dyn Solver>>,
    composer: Option<Arc<dyn Composer>>,
}

impl SkillBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            description: String::new(),
            priority: 0,
            min_usefulness: DEFAULT_MIN_USEFULNESS,
            dependencies: Vec::new(),
            slots: Vec::new(),
            patterns: Vec::new(),
            predicate: None,
            micro_solvers: Vec::new(),
            kb_search: None,
            research_agent: None,
            composer: None,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn min_usefulness(mut self, threshold: f32) -> Self {
        self.min_usefulness = threshold;
        self
    }

    pub fn depends_on(mut self, skill_id: &str) -> Self {
        self.dependencies.push(skill_id.to_string());
        self
    }

    pub fn slot(mut self, slot: SlotSpec) -> Self {
        self.slots.push(slot);
        self
    }

    /// Add a regex the question must match (any pattern suffices)
    pub fn matching(mut self, pattern: &str) -> Self {
        self.patterns.push(pattern.to_string());
        self
    }

    /// Use a closure instead of patterns
    pub fn match_with<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn micro_solver(mut self, solver: impl Solver + 'static) -> Self {
        self.micro_solvers.push(Arc::new(solver));
        self
    }

    pub fn micro_solver_fn<F>(self, f: F) -> Self
    where
        F: Fn(&str, &ChatContext) -> Result<Option<StageOutput>> + Send + Sync + 'static,
    {
        self.micro_solver(FnSolver::new(f))
    }

    pub fn knowledge_base(mut self, solver: impl Solver + 'static) -> Self {
        self.kb_search = Some(Arc::new(solver));
        self
    }

    pub fn research_agent(mut self, solver: impl Solver + 'static) -> Self {
        self.research_agent = Some(Arc::new(solver));
        self
    }

    pub fn composer(mut self, composer: impl Composer + 'static) -> Self {
        self.composer = Some(Arc::new(composer));
        self
    }

    pub fn composer_fn<F>(self, f: F) -> Self
    where
        F: Fn(&str, &serde_json::Value, &ChatContext) -> Result<Option<StageOutput>>
            + Send
            + Sync
            + 'static,
    {
        self.composer(FnComposer::new(f))
    }

    /// Compile patterns and validate the definition
    pub fn build(self) -> Result<Skill, SkillValidationError> {
        let matcher = match self.predicate {
            Some(pred) => SkillMatcher::Predicate(pred),
            None => {
                let patterns = self
                    .patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|e| {
                            SkillValidationError::InvalidPattern(format!("{}: {}", p, e))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                SkillMatcher::Patterns(patterns)
            }
        };

        let skill = Skill {
            id: self.id,
            description: self.description,
            priority: self.priority,
            min_usefulness: self.min_usefulness,
            dependencies: self.dependencies,
            slots: self.slots,
            matcher,
            micro_solvers: self.micro_solvers,
            kb_search: self.kb_search,
            research_agent: self.research_agent,
            composer: self.composer,
        };
        skill.validate()?;
        Ok(skill)
    }
}

/// Skill validation errors
#[derive(Debug, thiserror::Error)]
pub enum SkillValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid skill id: {0}")]
    InvalidId(String),

    #[error("Invalid match pattern: {0}")]
    InvalidPattern(String),

    #[error("Usefulness threshold {0} outside 0-5")]
    InvalidThreshold(f32),

    #[error("Skill '{0}' has no answering stage")]
    NoStages(String),

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Skill '{0}' depends on itself")]
    SelfDependency(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(_q: &str, _ctx: &ChatContext) -> Result<Option<StageOutput>> {
        Ok(Some(StageOutput::response(ChatResponse::new("ok"))))
    }

    #[test]
    fn test_build_basic_skill() {
        let skill = Skill::builder("hysa")
            .priority(10)
            .matching(r"(?i)\bhysa\b")
            .micro_solver_fn(answer)
            .build()
            .unwrap();

        assert_eq!(skill.min_usefulness, DEFAULT_MIN_USEFULNESS);
        assert_eq!(skill.matches("what is a HYSA").as_deref(), Some(r"(?i)\bhysa\b"));
        assert!(skill.matches("weather").is_none());
    }

    #[test]
    fn test_predicate_matcher() {
        let skill = Skill::builder("short")
            .match_with(|q| q.len() < 5)
            .micro_solver_fn(answer)
            .build()
            .unwrap();

        assert_eq!(skill.matches("hi").as_deref(), Some("predicate"));
        assert!(skill.matches("a longer question").is_none());
    }

    #[test]
    fn test_rejects_bad_definitions() {
        let no_stages = Skill::builder("empty").matching("x").build();
        assert!(matches!(no_stages, Err(SkillValidationError::NoStages(_))));

        let composer_only = Skill::builder("composer-only")
            .matching("x")
            .composer_fn(|_, _, _| Ok(None))
            .build();
        assert!(matches!(composer_only, Err(SkillValidationError::NoStages(_))));

        let bad_id = Skill::builder("Bad Id").matching("x").micro_solver_fn(answer).build();
        assert!(matches!(bad_id, Err(SkillValidationError::InvalidId(_))));

        let bad_pattern = Skill::builder("bad").matching("(").micro_solver_fn(answer).build();
        assert!(matches!(bad_pattern, Err(SkillValidationError::InvalidPattern(_))));

        let bad_threshold = Skill::builder("bad")
            .matching("x")
            .min_usefulness(7.0)
            .micro_solver_fn(answer)
            .build();
        assert!(matches!(bad_threshold, Err(SkillValidationError::InvalidThreshold(_))));

        let self_dep = Skill::builder("loop")
            .matching("x")
            .depends_on("loop")
            .micro_solver_fn(answer)
            .build();
        assert!(matches!(self_dep, Err(SkillValidationError::SelfDependency(_))));

        let no_patterns = Skill::builder("none").micro_solver_fn(answer).build();
        assert!(matches!(no_patterns, Err(SkillValidationError::MissingField(_))));
    }

    #[test]
    fn test_slot_default_type_checked() {
        let result = Skill::builder("typed")
            .matching("x")
            .slot(SlotSpec::new("amount", SlotKind::Amount).with_default(SlotValue::Text("ten".into())))
            .micro_solver_fn(answer)
            .build();
        assert!(matches!(result, Err(SkillValidationError::InvalidSlot(_))));

        let duplicate = Skill::builder("dup")
            .matching("x")
            .slot(SlotSpec::new("a", SlotKind::Text))
            .slot(SlotSpec::new("a", SlotKind::Number))
            .micro_solver_fn(answer)
            .build();
        assert!(matches!(duplicate, Err(SkillValidationError::InvalidSlot(_))));
    }

    #[test]
    fn test_slot_default_runs_validator() {
        fn positive(value: &SlotValue) -> std::result::Result<(), String> {
            match value {
                SlotValue::Amount(a) if *a > 0.0 => Ok(()),
                _ => Err("must be positive".to_string()),
            }
        }

        let result = Skill::builder("validated")
            .matching("x")
            .slot(
                SlotSpec::new("amount", SlotKind::Amount)
                    .with_default(SlotValue::Amount(-5.0))
                    .with_validator(positive),
            )
            .micro_solver_fn(answer)
            .build();
        assert!(matches!(result, Err(SkillValidationError::InvalidSlot(_))));
    }

    #[test]
    fn test_extract_slots() {
        let skill = Skill::builder("budget")
            .matching("budget")
            .slot(
                SlotSpec::new("amount", SlotKind::Amount)
                    .with_pattern(r"\$([\d,]+(?:\.\d+)?)")
                    .unwrap(),
            )
            .slot(
                SlotSpec::new("category", SlotKind::Category)
                    .with_pattern(r"(?i)for (\w+)")
                    .unwrap(),
            )
            .slot(SlotSpec::new("period", SlotKind::Text).with_default(SlotValue::Text("monthly".into())))
            .micro_solver_fn(answer)
            .build()
            .unwrap();

        let slots = skill.extract_slots("Make a $1,200 budget for Groceries");
        assert_eq!(slots.get("amount"), Some(&SlotValue::Amount(1200.0)));
        assert_eq!(slots.get("category"), Some(&SlotValue::Category("groceries".into())));
        assert_eq!(slots.get("period"), Some(&SlotValue::Text("monthly".into())));
    }

    #[test]
    fn test_slot_kind_parse() {
        assert_eq!(SlotKind::Number.parse("3.5"), Some(SlotValue::Number(3.5)));
        assert_eq!(SlotKind::Boolean.parse("Yes"), Some(SlotValue::Boolean(true)));
        assert_eq!(SlotKind::Date.parse("2026-01-31").map(|v| v.kind()), Some(SlotKind::Date));
        assert_eq!(SlotKind::Number.parse("abc"), None);
        assert_eq!(SlotKind::Text.parse("  "), None);
    }

    #[test]
    fn test_stage_kind_serializes_snake_case() {
        let json = serde_json::to_string(&StageKind::KnowledgeBase).unwrap();
        assert_eq!(json, "\"knowledge_base\"");
    }
}
