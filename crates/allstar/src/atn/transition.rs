use crate::interval::IntervalSet;
use crate::semantic::SemanticContext;
use std::sync::Arc;

/// A labeled edge of the automaton.
///
/// Every transition knows its target state number. Epsilon-like
/// transitions (rule calls, predicates and actions included) consume no
/// input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Epsilon {
        target: usize,
        /// Set on the return edge of a left-recursive rule's outermost
        /// precedence level
        outermost_precedence_return: Option<usize>,
    },
    Atom {
        target: usize,
        label: i32,
    },
    Range {
        target: usize,
        from: i32,
        to: i32,
    },
    Set {
        target: usize,
        set: IntervalSet,
    },
    NotSet {
        target: usize,
        set: IntervalSet,
    },
    Wildcard {
        target: usize,
    },
    /// Call of rule `rule_index`; `target` is that rule's start state and
    /// `follow_state` is where the call returns to
    Rule {
        target: usize,
        rule_index: usize,
        precedence: i32,
        follow_state: usize,
    },
    Predicate {
        target: usize,
        rule_index: usize,
        pred_index: usize,
        ctx_dependent: bool,
    },
    PrecedencePredicate {
        target: usize,
        precedence: i32,
    },
    Action {
        target: usize,
        rule_index: usize,
        action_index: Option<usize>,
        ctx_dependent: bool,
    },
}

impl Transition {
    #[must_use]
    pub const fn epsilon(target: usize) -> Self {
        Self::Epsilon {
            target,
            outermost_precedence_return: None,
        }
    }

    #[must_use]
    pub const fn atom(target: usize, label: i32) -> Self {
        Self::Atom { target, label }
    }

    #[must_use]
    pub const fn rule(target: usize, rule_index: usize, follow_state: usize) -> Self {
        Self::Rule {
            target,
            rule_index,
            precedence: 0,
            follow_state,
        }
    }

    #[must_use]
    pub const fn target(&self) -> usize {
        match self {
            Self::Epsilon { target, .. }
            | Self::Atom { target, .. }
            | Self::Range { target, .. }
            | Self::Set { target, .. }
            | Self::NotSet { target, .. }
            | Self::Wildcard { target }
            | Self::Rule { target, .. }
            | Self::Predicate { target, .. }
            | Self::PrecedencePredicate { target, .. }
            | Self::Action { target, .. } => *target,
        }
    }

    #[must_use]
    pub const fn is_epsilon(&self) -> bool {
        matches!(
            self,
            Self::Epsilon { .. }
                | Self::Rule { .. }
                | Self::Predicate { .. }
                | Self::PrecedencePredicate { .. }
                | Self::Action { .. }
        )
    }

    /// The symbols this transition matches, for the kinds with a fixed
    /// label. `NotSet` reports the excluded set; wildcards and epsilon-like
    /// transitions have no label.
    #[must_use]
    pub fn label(&self) -> Option<IntervalSet> {
        match self {
            Self::Atom { label, .. } => Some(IntervalSet::of(*label)),
            Self::Range { from, to, .. } => Some(IntervalSet::of_range(*from, *to)),
            Self::Set { set, .. } | Self::NotSet { set, .. } => Some(set.clone()),
            _ => None,
        }
    }

    /// Whether `symbol` can be consumed along this transition, given the
    /// vocabulary range `min_vocabulary..=max_vocabulary`
    #[must_use]
    pub fn matches(&self, symbol: i32, min_vocabulary: i32, max_vocabulary: i32) -> bool {
        let in_vocabulary = (min_vocabulary..=max_vocabulary).contains(&symbol);
        match self {
            Self::Atom { label, .. } => *label == symbol,
            Self::Range { from, to, .. } => (*from..=*to).contains(&symbol),
            Self::Set { set, .. } => set.contains(symbol),
            Self::NotSet { set, .. } => in_vocabulary && !set.contains(symbol),
            Self::Wildcard { .. } => in_vocabulary,
            _ => false,
        }
    }

    /// The semantic context guarding a predicate transition
    #[must_use]
    pub fn predicate(&self) -> Option<Arc<SemanticContext>> {
        match self {
            Self::Predicate {
                rule_index,
                pred_index,
                ctx_dependent,
                ..
            } => Some(SemanticContext::predicate(
                *rule_index,
                *pred_index,
                *ctx_dependent,
            )),
            Self::PrecedencePredicate { precedence, .. } => {
                Some(SemanticContext::precedence(*precedence))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let not_set = Transition::NotSet {
            target: 0,
            set: IntervalSet::of_range(3, 4),
        };
        assert!(not_set.matches(2, 1, 10));
        assert!(!not_set.matches(3, 1, 10));
        assert!(!not_set.matches(11, 1, 10));

        let wildcard = Transition::Wildcard { target: 0 };
        assert!(wildcard.matches(10, 1, 10));
        assert!(!wildcard.matches(-1, 1, 10));

        assert!(Transition::atom(0, 5).matches(5, 1, 10));
        assert!(!Transition::epsilon(0).matches(5, 1, 10));
    }

    #[test]
    fn test_epsilon_kinds() {
        assert!(Transition::epsilon(1).is_epsilon());
        assert!(Transition::rule(1, 0, 2).is_epsilon());
        assert!(!Transition::atom(1, 3).is_epsilon());
        assert_eq!(Transition::rule(4, 0, 2).target(), 4);
    }

    #[test]
    fn test_predicate_context() {
        let pred = Transition::Predicate {
            target: 0,
            rule_index: 1,
            pred_index: 2,
            ctx_dependent: false,
        };
        assert_eq!(pred.predicate().unwrap().to_string(), "{1:2}?");
        assert!(Transition::epsilon(0).predicate().is_none());
    }
}
