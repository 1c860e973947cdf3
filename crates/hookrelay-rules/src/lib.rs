//! Hookrelay Rules
//!
//! Declarative rule model and resolution for the Hookrelay pipeline.
//!
//! This crate provides:
//! - Hierarchical wildcard key matching with specificity scoring
//! - Rule definitions, defaults, and per-scope overrides
//! - The decoded condition tree and its evaluator
//! - Best-match rule resolution with scope veto semantics

pub mod condition;
pub mod matcher;
pub mod resolver;
pub mod rule;

pub use condition::{Condition, ConditionSet, Operand, Operator};
pub use matcher::MatchScore;
pub use resolver::{ResolvedRule, RuleResolver};
pub use rule::{RateLimitSpec, RuleDefaults, RuleDefinition, RuleSet, ScopeOverride};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::condition::{Condition, ConditionSet, Operand, Operator};
    pub use crate::matcher::MatchScore;
    pub use crate::resolver::{ResolvedRule, RuleResolver};
    pub use crate::rule::{RuleDefaults, RuleDefinition, RuleSet, ScopeOverride};
}
