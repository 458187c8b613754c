//! FinChat Skills
//!
//! Deterministic skill-routing cascade for a personal-finance assistant.
//! Answers what it can from the user's own data before the host falls back
//! to an LLM.
//!
//! # Features
//!
//! - **Intent Classification**: ordered regex rules, first match wins
//! - **Skill Registry**: priority-ordered, validated at registration
//! - **Staged Cascade**: micro-solvers → knowledge base → research → composer
//! - **Usefulness Gate**: per-skill admission threshold (0-5)
//! - **Execution Cache**: context-aware SHA256 keys, per-entry TTL
//! - **Circuit Breaker**: per-skill failure isolation
//! - **Metrics**: history, health report, ranking, JSON export
//!
//! # Architecture
//!
//! ```text
//! question + ChatContext ──► SkillEngine ──► Option<ChatResponse>
//!                                │
//!                                ├── ExecutionCache (Moka)
//!                                ├── SkillRegistry ──► Skill stages
//!                                ├── UsefulnessScorer
//!                                ├── CircuitBreaker
//!                                └── SkillMetricsCollector
//! ```

pub mod cache;
pub mod circuit;
pub mod config;
pub mod context;
pub mod engine;
pub mod intent;
pub mod logging;
pub mod metrics;
pub mod response;
pub mod skills;
pub mod usefulness;

pub use cache::{CacheStats, ExecutionCache};
pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{AssistantConfig, EngineConfig};
pub use context::ChatContext;
pub use engine::{EngineError, EngineStats, SkillEngine, SkillEngineBuilder};
pub use intent::{detect_intent, Intent};
pub use metrics::{HealthReport, SkillExecutionResult, SkillMetricsCollector};
pub use response::{Action, ActionKind, Card, ChatResponse, Cost, Source};
pub use skills::{Skill, SkillRegistry, StageKind, StageOutput};
pub use usefulness::{HeuristicScorer, UsefulnessScorer};
