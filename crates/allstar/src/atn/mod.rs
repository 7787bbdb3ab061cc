//! # Automaton
//!
//! The augmented transition network a grammar compiles to, plus the
//! per-decision DFA caches that hang off it.
//!
//! ## Overview
//!
//! An [`Atn`] is immutable once built, apart from the caches it owns:
//!
//! - one [`Dfa`] per decision (and per lexer mode), shared by every thread
//!   recognizing with this automaton
//! - the [`SharedContextCache`] that canonicalizes prediction contexts
//!   before they are stored in a DFA
//! - the next-token set of each state, computed on first use
//!
//! Automata are assembled with [`AtnBuilder`], which validates every state
//! reference before handing out the finished graph.

mod builder;
mod state;
mod transition;

pub use builder::AtnBuilder;
pub use state::{AtnState, BlockKind, StateKind};
pub use transition::Transition;

use crate::analysis::Ll1Analyzer;
use crate::context::{PredictionContext, SharedContextCache};
use crate::dfa::Dfa;
use crate::error::{AtnError, Result};
use crate::interval::IntervalSet;
use crate::options::AtnOptions;
use crate::token::{EOF, EPSILON};
use std::sync::Arc;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Whether an automaton drives a lexer or a parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum AtnType {
    Lexer,
    Parser,
}

#[derive(Debug)]
pub struct Atn {
    grammar_type: AtnType,
    max_token_type: i32,
    states: Vec<AtnState>,
    decision_to_state: Vec<usize>,
    rule_to_start_state: Vec<usize>,
    rule_to_stop_state: Vec<usize>,
    mode_to_start_state: Vec<usize>,
    decision_to_dfa: Vec<Dfa>,
    mode_to_dfa: Vec<Dfa>,
    context_cache: SharedContextCache,
    options: AtnOptions,
}

impl Atn {
    #[must_use]
    pub const fn grammar_type(&self) -> AtnType {
        self.grammar_type
    }

    /// Highest token type (or character, for lexers) the grammar uses
    #[must_use]
    pub const fn max_token_type(&self) -> i32 {
        self.max_token_type
    }

    #[must_use]
    pub const fn options(&self) -> &AtnOptions {
        &self.options
    }

    #[must_use]
    pub fn states(&self) -> &[AtnState] {
        &self.states
    }

    /// State `state_number`.
    ///
    /// # Panics
    ///
    /// Panics if the automaton has no such state.
    #[must_use]
    pub fn state(&self, state_number: usize) -> &AtnState {
        &self.states[state_number]
    }

    #[must_use]
    pub fn number_of_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    /// The state owning decision `decision`.
    ///
    /// # Panics
    ///
    /// Panics if there is no such decision.
    #[must_use]
    pub fn decision_state(&self, decision: usize) -> &AtnState {
        &self.states[self.decision_to_state[decision]]
    }

    #[must_use]
    pub fn number_of_rules(&self) -> usize {
        self.rule_to_start_state.len()
    }

    /// # Panics
    ///
    /// Panics if there is no such rule.
    #[must_use]
    pub fn rule_start_state(&self, rule_index: usize) -> &AtnState {
        &self.states[self.rule_to_start_state[rule_index]]
    }

    /// # Panics
    ///
    /// Panics if there is no such rule.
    #[must_use]
    pub fn rule_stop_state(&self, rule_index: usize) -> &AtnState {
        &self.states[self.rule_to_stop_state[rule_index]]
    }

    #[must_use]
    pub fn mode_start_states(&self) -> &[usize] {
        &self.mode_to_start_state
    }

    /// The shared DFA of decision `decision`.
    ///
    /// # Panics
    ///
    /// Panics if there is no such decision.
    #[must_use]
    pub fn dfa(&self, decision: usize) -> &Dfa {
        &self.decision_to_dfa[decision]
    }

    #[must_use]
    pub fn decision_to_dfa(&self) -> &[Dfa] {
        &self.decision_to_dfa
    }

    /// The shared DFA of lexer mode `mode`.
    ///
    /// # Panics
    ///
    /// Panics if there is no such mode.
    #[must_use]
    pub fn mode_dfa(&self, mode: usize) -> &Dfa {
        &self.mode_to_dfa[mode]
    }

    #[must_use]
    pub const fn context_cache(&self) -> &SharedContextCache {
        &self.context_cache
    }

    /// Canonicalize `context` through the shared context cache
    #[must_use]
    pub fn cached_context(&self, context: &Arc<PredictionContext>) -> Arc<PredictionContext> {
        self.context_cache.cached_context(context)
    }

    /// Tokens that can follow `state` without leaving its rule.
    ///
    /// Contains [`EPSILON`] if the end of the rule is reachable. Computed
    /// once per state and returned read-only.
    #[must_use]
    pub fn next_tokens<'a>(&'a self, state: &'a AtnState) -> &'a IntervalSet {
        state.next_tokens.get_or_init(|| {
            let mut set =
                Ll1Analyzer::new(self).look(state, None, PredictionContext::empty_local());
            set.freeze();
            set
        })
    }

    /// Tokens that can follow `state` when its rule returns through
    /// `context`
    #[must_use]
    pub fn next_tokens_in_context(
        &self,
        state: &AtnState,
        context: &Arc<PredictionContext>,
    ) -> IntervalSet {
        Ll1Analyzer::new(self).look(state, None, context)
    }

    /// The set of tokens that could legally follow `state_number` given
    /// the invocation stack `invoking_states` (outermost call first).
    ///
    /// Follows rule returns outward while the end of the current rule is
    /// reachable, and adds [`EOF`] if the whole stack can complete.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::InvalidState`] if a state is out of range or
    /// an invoking state does not start with a rule transition.
    pub fn expected_tokens(
        &self,
        state_number: usize,
        invoking_states: &[usize],
    ) -> Result<IntervalSet> {
        let state = self
            .states
            .get(state_number)
            .ok_or(AtnError::InvalidState { state: state_number })?;
        let mut following = self.next_tokens(state).clone();
        if !following.contains(EPSILON) {
            return Ok(following);
        }

        let mut expected = following.subtract(&IntervalSet::of(EPSILON));
        for &invoking in invoking_states.iter().rev() {
            if !following.contains(EPSILON) {
                break;
            }
            let follow_state = self.follow_state(invoking)?;
            following = self.next_tokens(&self.states[follow_state]).clone();
            expected = expected.or(&following);
            expected.remove(EPSILON)?;
        }
        if following.contains(EPSILON) {
            expected.add(EOF)?;
        }
        Ok(expected)
    }

    /// Build the prediction context for an invocation stack (outermost
    /// call first), returning through the follow state of each call.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::InvalidState`] if an invoking state is out of
    /// range or does not start with a rule transition.
    pub fn context_from_invocation_stack(
        &self,
        invoking_states: &[usize],
        full: bool,
    ) -> Result<Arc<PredictionContext>> {
        let mut return_states = Vec::with_capacity(invoking_states.len());
        for &invoking in invoking_states {
            let follow = self.follow_state(invoking)?;
            return_states.push(i32::try_from(follow).map_err(|_| AtnError::InvalidState {
                state: follow,
            })?);
        }
        Ok(PredictionContext::from_return_states(&return_states, full))
    }

    fn follow_state(&self, invoking: usize) -> Result<usize> {
        match self.states.get(invoking).and_then(|s| s.transitions.first()) {
            Some(Transition::Rule { follow_state, .. }) => Ok(*follow_state),
            _ => Err(AtnError::InvalidState { state: invoking }),
        }
    }

    /// Drop everything the decision and mode DFAs have learned
    pub fn clear_dfa(&self) {
        for dfa in self.decision_to_dfa.iter().chain(&self.mode_to_dfa) {
            dfa.clear();
        }
        log::debug!(
            "cleared {} decision DFAs and {} mode DFAs",
            self.decision_to_dfa.len(),
            self.mode_to_dfa.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `s : a X ;  a : Y | ;`
    fn call_grammar() -> (Atn, usize) {
        let mut builder = AtnBuilder::new(AtnType::Parser, 2);
        let (s_start, s_stop) = builder.add_rule();
        let (a_start, a_stop) = builder.add_rule();
        let call = builder.add_state(0, StateKind::Basic);
        let after = builder.add_state(0, StateKind::Basic);
        let end = builder.add_state(0, StateKind::Basic);
        builder
            .add_transition(s_start, Transition::epsilon(call))
            .add_transition(call, Transition::rule(a_start, 1, after))
            .add_transition(after, Transition::atom(end, 1))
            .add_transition(end, Transition::epsilon(s_stop));

        let body = builder.add_state(1, StateKind::Basic);
        builder
            .add_transition(a_start, Transition::atom(body, 2))
            .add_transition(a_start, Transition::epsilon(a_stop))
            .add_transition(body, Transition::epsilon(a_stop));
        (builder.build().unwrap(), call)
    }

    #[test]
    fn test_next_tokens_is_cached_and_read_only() {
        let (atn, _) = call_grammar();
        let start = atn.rule_start_state(1);
        let next = atn.next_tokens(start);
        assert!(next.contains(2));
        assert!(next.contains(EPSILON));
        assert!(next.is_read_only());
        assert!(std::ptr::eq(next, atn.next_tokens(start)));
    }

    #[test]
    fn test_expected_tokens_follow_the_call() {
        let (atn, call) = call_grammar();
        let a_start = atn.rule_start_state(1).state_number();
        let expected = atn.expected_tokens(a_start, &[call]).unwrap();
        assert_eq!(expected.to_vec(), vec![1, 2]);

        let at_top = atn.expected_tokens(a_start, &[]).unwrap();
        assert_eq!(at_top.to_vec(), vec![EOF, 2]);
    }

    #[test]
    fn test_context_from_invocation_stack() {
        let (atn, call) = call_grammar();
        let ctx = atn.context_from_invocation_stack(&[call], true).unwrap();
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.return_state(0), 5);
        assert!(atn.context_from_invocation_stack(&[0], true).is_err());
    }
}
