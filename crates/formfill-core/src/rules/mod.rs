//! Field consistency engine.
//!
//! Proposed values are repaired by a small declarative rule table instead of
//! a hand-written cascade of conditionals. Each rule is one tagged variant:
//!
//! 1. **Canonicalize**: Boolean values become exactly true/false (unknown
//!    tokens become false); absent keys get their defaults
//! 2. **Mutual exclusion**: at most one member true, chosen by priority
//! 3. **Unit format**: bare numbers get units or a band label
//! 4. **Implication**: "if A then force B" cross-field rules
//! 5. **Exactly one**: at most one member true, first in declared order
//!
//! Classes always run in that order, and whole passes repeat until nothing
//! changes.

mod engine;
mod rule;
mod table;

pub use engine::{ConsistencyEngine, Correction, TokenSet, Trace, MAX_PASSES};
pub use rule::{Condition, Effect, Rule, RuleClass, Selector};
pub use table::{Band, ConditionSpec, ContextualUnit, EffectSpec, RuleSpec, SelectorSpec, TokenConfig};
