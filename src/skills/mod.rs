//! Skills
//!
//! A skill claims questions by pattern and answers them through a cascade of
//! stages, cheapest first:
//!
//! ```text
//! question ─► matcher ─► micro-solvers ─► knowledge base ─► research agent
//!                              │                │                 │
//!                              └────── data ────┴─────────────────┴─► composer
//! ```
//!
//! Every stage result goes through the usefulness gate before it is admitted.
//! The engine (`crate::engine`) drives the cascade; this module only defines
//! skills and keeps track of them.

pub mod builtin;
pub mod registry;
pub mod types;

pub use builtin::register_builtin_skills;
pub use registry::{RegistryStats, SkillRegistry};
pub use types::{
    Composer, FnComposer, FnSolver, Skill, SkillBuilder, SkillInterceptor, SkillMatcher,
    SkillValidationError, SlotKind, SlotSpec, SlotValidator, SlotValue, Solver, StageKind,
    StageOutput, DEFAULT_MIN_USEFULNESS,
};
