//! Skill Registry
//!
//! Owns the registered skills. Populated at startup, read-mostly afterwards.
//! Lookups hand out `Arc<Skill>` clones, so a concurrent `register` never
//! invalidates a cascade that is already iterating.

use super::types::{Skill, SkillValidationError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_skills: usize,
    /// priority -> number of skills at that priority
    pub skills_by_priority: BTreeMap<i32, usize>,
    /// In registration order
    pub skill_ids: Vec<String>,
}

/// Registry of skills, kept in registration order
#[derive(Default)]
pub struct SkillRegistry {
    skills: RwLock<Vec<Arc<Skill>>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill.
    ///
    /// Returns `Ok(true)` when added, `Ok(false)` when the id is already taken
    /// (the existing skill is kept), and `Err` for a malformed definition.
    pub fn register(&self, skill: Skill) -> Result<bool, SkillValidationError> {
        skill.validate()?;

        let mut skills = self.skills.write();
        if skills.iter().any(|s| s.id == skill.id) {
            warn!("Skill '{}' already registered, keeping existing entry", skill.id);
            return Ok(false);
        }

        for dep in &skill.dependencies {
            if !skills.iter().any(|s| &s.id == dep) {
                warn!("Skill '{}' depends on unregistered skill '{}'", skill.id, dep);
            }
        }

        info!(
            "Registered skill '{}' (priority {}, {} stages)",
            skill.id,
            skill.priority,
            skill.stage_count()
        );
        skills.push(Arc::new(skill));
        Ok(true)
    }

    /// Remove a skill. Refused (returns `false`) while another skill depends on it.
    pub fn unregister(&self, id: &str) -> bool {
        let mut skills = self.skills.write();

        let dependents: Vec<&str> = skills
            .iter()
            .filter(|s| s.id != id && s.dependencies.iter().any(|d| d == id))
            .map(|s| s.id.as_str())
            .collect();
        if !dependents.is_empty() {
            warn!(
                "Cannot unregister '{}': required by {}",
                id,
                dependents.join(", ")
            );
            return false;
        }

        match skills.iter().position(|s| s.id == id) {
            Some(idx) => {
                skills.remove(idx);
                info!("Unregistered skill '{}'", id);
                true
            }
            None => {
                warn!("Cannot unregister '{}': not registered", id);
                false
            }
        }
    }

    /// Skills claiming the question, highest priority first.
    /// Equal priorities keep registration order.
    pub fn find(&self, question: &str) -> Vec<Arc<Skill>> {
        let mut matched: Vec<Arc<Skill>> = self
            .skills
            .read()
            .iter()
            .filter(|s| s.matches(question).is_some())
            .cloned()
            .collect();

        // sort_by is stable
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!(
            "Registry matched {} skill(s): [{}]",
            matched.len(),
            matched.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(", ")
        );
        matched
    }

    pub fn get(&self, id: &str) -> Option<Arc<Skill>> {
        self.skills.read().iter().find(|s| s.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.skills.read().iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.skills.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.read().is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let skills = self.skills.read();
        let mut skills_by_priority = BTreeMap::new();
        for skill in skills.iter() {
            *skills_by_priority.entry(skill.priority).or_insert(0) += 1;
        }

        RegistryStats {
            total_skills: skills.len(),
            skills_by_priority,
            skill_ids: skills.iter().map(|s| s.id.clone()).collect(),
        }
    }
}
