use crate::atn::{Atn, AtnState, Transition};
use crate::context::{EMPTY_FULL_STATE_KEY, PredictionContext};
use crate::hash::FastSet;
use crate::interval::IntervalSet;
use crate::token::{EOF, EPSILON, INVALID_TYPE, MIN_USER_TOKEN_TYPE};
use fixedbitset::FixedBitSet;
use std::sync::Arc;

/// Placeholder symbol recorded when a walk that does not see through
/// predicates reaches one
pub const HIT_PRED: i32 = INVALID_TYPE;

/// Computes the symbols reachable from a state before consuming input.
///
/// # Example
///
/// ```rust
/// use allstar::analysis::Ll1Analyzer;
/// use allstar::atn::{AtnBuilder, AtnType, StateKind, Transition};
/// use allstar::context::PredictionContext;
///
/// // r : A B ;
/// let mut builder = AtnBuilder::new(AtnType::Parser, 2);
/// let (start, stop) = builder.add_rule();
/// let middle = builder.add_state(0, StateKind::Basic);
/// builder
///     .add_transition(start, Transition::atom(middle, 1))
///     .add_transition(middle, Transition::atom(stop, 2));
/// let atn = builder.build().unwrap();
///
/// let look = Ll1Analyzer::new(&atn).look(
///     atn.state(start),
///     None,
///     PredictionContext::empty_local(),
/// );
/// assert_eq!(look.to_vec(), vec![1]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Ll1Analyzer<'a> {
    atn: &'a Atn,
}

struct Walk<'w> {
    stop_state: Option<usize>,
    see_through_predicates: bool,
    add_eof: bool,
    look: &'w mut IntervalSet,
    busy: FastSet<(usize, Arc<PredictionContext>)>,
    called_rules: FixedBitSet,
}

impl<'a> Ll1Analyzer<'a> {
    #[must_use]
    pub const fn new(atn: &'a Atn) -> Self {
        Self { atn }
    }

    /// The one-symbol lookahead of each alternative of the decision at
    /// `state`.
    ///
    /// An alternative gets `None` when its lookahead is empty or when it
    /// reaches a semantic predicate, since its lookahead then cannot be
    /// determined statically.
    #[must_use]
    pub fn decision_lookahead(&self, state: &AtnState) -> Vec<Option<IntervalSet>> {
        state
            .transitions()
            .iter()
            .map(|transition| {
                let mut look = IntervalSet::new();
                let mut walk = self.walk(None, false, false, &mut look);
                walk.visit(
                    self.atn,
                    transition.target(),
                    PredictionContext::empty_local(),
                );
                if look.is_empty() || look.contains(HIT_PRED) {
                    None
                } else {
                    Some(look)
                }
            })
            .collect()
    }

    /// The symbols that can follow `state` when the walk starts in
    /// `context`.
    ///
    /// Reaching `stop_state` (or the end of the outermost rule) with the
    /// local empty context adds [`EPSILON`]; reaching it with the full
    /// empty context adds [`EOF`]. Predicates are treated as passable.
    #[must_use]
    pub fn look(
        &self,
        state: &AtnState,
        stop_state: Option<&AtnState>,
        context: &Arc<PredictionContext>,
    ) -> IntervalSet {
        let mut look = IntervalSet::new();
        let mut walk = self.walk(
            stop_state.map(AtnState::state_number),
            true,
            true,
            &mut look,
        );
        walk.visit(self.atn, state.state_number(), context);
        look
    }

    fn walk<'w>(
        &self,
        stop_state: Option<usize>,
        see_through_predicates: bool,
        add_eof: bool,
        look: &'w mut IntervalSet,
    ) -> Walk<'w> {
        Walk {
            stop_state,
            see_through_predicates,
            add_eof,
            look,
            busy: FastSet::default(),
            called_rules: FixedBitSet::with_capacity(self.atn.number_of_rules()),
        }
    }
}

impl Walk<'_> {
    fn visit(&mut self, atn: &Atn, state_number: usize, context: &Arc<PredictionContext>) {
        if !self.busy.insert((state_number, context.clone())) {
            return;
        }
        let state = atn.state(state_number);

        if self.stop_state == Some(state_number) || state.is_rule_stop() {
            if context.is_empty_local() {
                self.look.insert_range(EPSILON, EPSILON);
                return;
            }
            if context.is_empty() {
                if self.add_eof {
                    self.look.insert_range(EOF, EOF);
                }
                return;
            }
        }

        if state.is_rule_stop() {
            let rule_index = state.rule_index();
            let was_called = self.called_rules.contains(rule_index);
            self.called_rules.set(rule_index, false);
            for i in 0..context.len() {
                let return_state = context.return_state(i);
                if return_state == EMPTY_FULL_STATE_KEY {
                    if self.add_eof {
                        self.look.insert_range(EOF, EOF);
                    }
                    continue;
                }
                if let Ok(return_state) = usize::try_from(return_state) {
                    self.visit(atn, return_state, context.parent(i));
                }
            }
            self.called_rules.set(rule_index, was_called);
            return;
        }

        for transition in state.transitions() {
            match transition {
                Transition::Rule {
                    target,
                    follow_state,
                    ..
                } => {
                    let called = atn.state(*target).rule_index();
                    if self.called_rules.contains(called) {
                        continue;
                    }
                    let Ok(follow) = i32::try_from(*follow_state) else {
                        continue;
                    };
                    let child = context.child(follow);
                    self.called_rules.insert(called);
                    self.visit(atn, *target, &child);
                    self.called_rules.set(called, false);
                }
                Transition::Predicate { target, .. }
                | Transition::PrecedencePredicate { target, .. } => {
                    if self.see_through_predicates {
                        self.visit(atn, *target, context);
                    } else {
                        self.look.insert_range(HIT_PRED, HIT_PRED);
                    }
                }
                Transition::Wildcard { .. } => {
                    self.look
                        .insert_range(MIN_USER_TOKEN_TYPE, atn.max_token_type());
                }
                Transition::NotSet { set, .. } => {
                    let vocabulary = IntervalSet::of_range(MIN_USER_TOKEN_TYPE, atn.max_token_type());
                    for interval in set.complement(&vocabulary).intervals() {
                        self.look.insert_range(interval.a, interval.b);
                    }
                }
                other if other.is_epsilon() => self.visit(atn, other.target(), context),
                other => {
                    if let Some(label) = other.label() {
                        for interval in label.intervals() {
                            self.look.insert_range(interval.a, interval.b);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::{AtnBuilder, AtnType, StateKind};

    /// `s : a C ;  a : A | B | ;`
    fn grammar() -> (Atn, usize) {
        let mut builder = AtnBuilder::new(AtnType::Parser, 3);
        let (s_start, s_stop) = builder.add_rule();
        let (a_start, a_stop) = builder.add_rule();
        let call = builder.add_state(0, StateKind::Basic);
        let after = builder.add_state(0, StateKind::Basic);
        builder
            .add_transition(s_start, Transition::epsilon(call))
            .add_transition(call, Transition::rule(a_start, 1, after))
            .add_transition(after, Transition::atom(s_stop, 3));
        let alt1 = builder.add_state(1, StateKind::Basic);
        let alt2 = builder.add_state(1, StateKind::Basic);
        builder
            .add_transition(a_start, Transition::epsilon(alt1))
            .add_transition(a_start, Transition::epsilon(alt2))
            .add_transition(a_start, Transition::epsilon(a_stop))
            .add_transition(alt1, Transition::atom(a_stop, 1))
            .add_transition(alt2, Transition::atom(a_stop, 2));
        builder.add_decision(a_start);
        (builder.build().unwrap(), call)
    }

    #[test]
    fn test_look_follows_rule_calls() {
        let (atn, _) = grammar();
        let analyzer = Ll1Analyzer::new(&atn);
        let look = analyzer.look(atn.rule_start_state(0), None, PredictionContext::empty_local());
        assert_eq!(look.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_look_reports_epsilon_and_eof() {
        let (atn, _) = grammar();
        let analyzer = Ll1Analyzer::new(&atn);
        let a_start = atn.rule_start_state(1);

        let local = analyzer.look(a_start, None, PredictionContext::empty_local());
        assert_eq!(local.to_vec(), vec![EPSILON, 1, 2]);

        let full = analyzer.look(a_start, None, PredictionContext::empty_full());
        assert_eq!(full.to_vec(), vec![EOF, 1, 2]);
    }

    #[test]
    fn test_look_returns_through_context() {
        let (atn, call) = grammar();
        let analyzer = Ll1Analyzer::new(&atn);
        let context = atn.context_from_invocation_stack(&[call], true).unwrap();
        let look = analyzer.look(atn.rule_start_state(1), None, &context);
        assert_eq!(look.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decision_lookahead() {
        let (atn, _) = grammar();
        let analyzer = Ll1Analyzer::new(&atn);
        let look = analyzer.decision_lookahead(atn.decision_state(0));
        assert_eq!(look.len(), 3);
        assert_eq!(look[0].as_ref().map(IntervalSet::to_vec), Some(vec![1]));
        assert_eq!(look[1].as_ref().map(IntervalSet::to_vec), Some(vec![2]));
        assert_eq!(look[2].as_ref().map(IntervalSet::to_vec), Some(vec![EPSILON]));
    }

    #[test]
    fn test_decision_lookahead_stops_at_predicates() {
        let mut builder = AtnBuilder::new(AtnType::Parser, 2);
        let (start, stop) = builder.add_rule();
        let alt1 = builder.add_state(0, StateKind::Basic);
        let alt2 = builder.add_state(0, StateKind::Basic);
        let guarded = builder.add_state(0, StateKind::Basic);
        builder
            .add_transition(start, Transition::epsilon(alt1))
            .add_transition(start, Transition::epsilon(alt2))
            .add_transition(
                alt1,
                Transition::Predicate {
                    target: guarded,
                    rule_index: 0,
                    pred_index: 0,
                    ctx_dependent: false,
                },
            )
            .add_transition(guarded, Transition::atom(stop, 1))
            .add_transition(alt2, Transition::atom(stop, 2));
        builder.add_decision(start);
        let atn = builder.build().unwrap();

        let look = Ll1Analyzer::new(&atn).decision_lookahead(atn.decision_state(0));
        assert!(look[0].is_none());
        assert_eq!(look[1].as_ref().map(IntervalSet::to_vec), Some(vec![2]));

        let seen = Ll1Analyzer::new(&atn).look(atn.state(start), None, PredictionContext::empty_local());
        assert_eq!(seen.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_left_recursion_does_not_loop() {
        // r : r A | B ;
        let mut builder = AtnBuilder::new(AtnType::Parser, 2);
        let (start, stop) = builder.add_rule();
        let after = builder.add_state(0, StateKind::Basic);
        builder
            .add_transition(start, Transition::rule(start, 0, after))
            .add_transition(start, Transition::atom(stop, 2))
            .add_transition(after, Transition::atom(stop, 1));
        let atn = builder.build().unwrap();
        let look = Ll1Analyzer::new(&atn).look(atn.state(start), None, PredictionContext::empty_local());
        assert_eq!(look.to_vec(), vec![2]);
    }
}
