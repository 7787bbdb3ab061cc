use super::{Atn, AtnState, AtnType, StateKind, Transition};
use crate::context::SharedContextCache;
use crate::dfa::Dfa;
use crate::error::{AtnError, Result};
use crate::options::AtnOptions;

/// Builder for [`Atn`].
///
/// States are numbered in the order they are added. Rules are added as a
/// start/stop pair; decisions and lexer modes are registered on existing
/// states. [`build`](Self::build) checks every state and rule reference and
/// creates the DFA for each decision.
///
/// # Example
///
/// ```rust
/// use allstar::atn::{AtnBuilder, AtnType, StateKind, Transition};
///
/// // r : A | B ;
/// let mut builder = AtnBuilder::new(AtnType::Parser, 2);
/// let (start, stop) = builder.add_rule();
/// let block = builder.add_state(0, StateKind::Basic);
/// let end = builder.add_state(0, StateKind::Basic);
/// builder
///     .add_transition(start, Transition::epsilon(block))
///     .add_transition(block, Transition::atom(end, 1))
///     .add_transition(block, Transition::atom(end, 2))
///     .add_transition(end, Transition::epsilon(stop));
/// let decision = builder.add_decision(block);
///
/// let atn = builder.build().expect("valid automaton");
/// assert_eq!(atn.decision_state(decision).state_number(), block);
/// ```
#[derive(Debug)]
pub struct AtnBuilder {
    grammar_type: AtnType,
    max_token_type: i32,
    states: Vec<AtnState>,
    decision_to_state: Vec<usize>,
    rule_to_start_state: Vec<usize>,
    rule_to_stop_state: Vec<usize>,
    mode_to_start_state: Vec<usize>,
    options: AtnOptions,
}

impl AtnBuilder {
    #[must_use]
    pub fn new(grammar_type: AtnType, max_token_type: i32) -> Self {
        Self {
            grammar_type,
            max_token_type,
            states: Vec::new(),
            decision_to_state: Vec::new(),
            rule_to_start_state: Vec::new(),
            rule_to_stop_state: Vec::new(),
            mode_to_start_state: Vec::new(),
            options: AtnOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: AtnOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a state and return its number
    pub fn add_state(&mut self, rule_index: usize, kind: StateKind) -> usize {
        let state_number = self.states.len();
        self.states
            .push(AtnState::new(state_number, rule_index, kind));
        state_number
    }

    /// Replace the kind of an existing state, for kinds that refer to
    /// states added later
    ///
    /// # Panics
    ///
    /// Panics if `state` has not been added.
    pub fn set_kind(&mut self, state: usize, kind: StateKind) -> &mut Self {
        self.states[state].kind = kind;
        self
    }

    /// Add a rule, returning its `(start, stop)` states
    pub fn add_rule(&mut self) -> (usize, usize) {
        self.add_rule_with(false, false)
    }

    /// Add a left-recursive rule, returning its `(start, stop)` states
    pub fn add_precedence_rule(&mut self) -> (usize, usize) {
        self.add_rule_with(true, false)
    }

    fn add_rule_with(&mut self, precedence_rule: bool, left_factored: bool) -> (usize, usize) {
        let rule_index = self.rule_to_start_state.len();
        let start = self.states.len();
        let stop = start + 1;
        self.add_state(
            rule_index,
            StateKind::RuleStart {
                stop_state: stop,
                left_factored,
                precedence_rule,
            },
        );
        self.add_state(rule_index, StateKind::RuleStop);
        self.rule_to_start_state.push(start);
        self.rule_to_stop_state.push(stop);
        (start, stop)
    }

    /// # Panics
    ///
    /// Panics if `from` has not been added.
    pub fn add_transition(&mut self, from: usize, transition: Transition) -> &mut Self {
        self.states[from].transitions.push(transition);
        self
    }

    /// Register `state` as the next decision, returning the decision number
    ///
    /// # Panics
    ///
    /// Panics if `state` has not been added.
    pub fn add_decision(&mut self, state: usize) -> usize {
        let decision = self.decision_to_state.len();
        self.states[state].decision = Some(decision);
        self.decision_to_state.push(state);
        decision
    }

    /// # Panics
    ///
    /// Panics if `state` has not been added.
    pub fn set_non_greedy(&mut self, state: usize, non_greedy: bool) -> &mut Self {
        self.states[state].non_greedy = non_greedy;
        self
    }

    /// Register a lexer mode starting at `start_state`, returning the mode
    /// number
    pub fn add_mode(&mut self, start_state: usize) -> usize {
        self.mode_to_start_state.push(start_state);
        self.mode_to_start_state.len() - 1
    }

    /// Validate the graph and create the decision DFAs.
    ///
    /// # Errors
    ///
    /// Returns [`AtnError::InvalidState`] for any reference to a state that
    /// does not exist and [`AtnError::InvalidRule`] for a rule call or a
    /// state naming a rule that does not exist.
    pub fn build(self) -> Result<Atn> {
        self.validate()?;

        let mut atn = Atn {
            grammar_type: self.grammar_type,
            max_token_type: self.max_token_type,
            states: self.states,
            decision_to_state: self.decision_to_state,
            rule_to_start_state: self.rule_to_start_state,
            rule_to_stop_state: self.rule_to_stop_state,
            mode_to_start_state: self.mode_to_start_state,
            decision_to_dfa: Vec::new(),
            mode_to_dfa: Vec::new(),
            context_cache: SharedContextCache::new(),
            options: self.options,
        };
        let decision_to_dfa = atn
            .decision_to_state
            .iter()
            .enumerate()
            .map(|(decision, &state)| Dfa::new(&atn, state, decision))
            .collect();
        let mode_to_dfa = atn
            .mode_to_start_state
            .iter()
            .enumerate()
            .map(|(mode, &state)| Dfa::new(&atn, state, mode))
            .collect();
        atn.decision_to_dfa = decision_to_dfa;
        atn.mode_to_dfa = mode_to_dfa;

        log::debug!(
            "built {:?} automaton: {} states, {} rules, {} decisions",
            atn.grammar_type,
            atn.states.len(),
            atn.rule_to_start_state.len(),
            atn.decision_to_state.len()
        );
        Ok(atn)
    }

    fn validate(&self) -> Result<()> {
        let state_count = self.states.len();
        let rule_count = self.rule_to_start_state.len();
        let check_state = |state: usize| {
            if state < state_count {
                Ok(())
            } else {
                Err(AtnError::InvalidState { state })
            }
        };
        let check_rule = |rule: usize| {
            if rule < rule_count {
                Ok(())
            } else {
                Err(AtnError::InvalidRule { rule })
            }
        };

        for state in &self.states {
            if !matches!(state.kind, StateKind::TokenStart | StateKind::Invalid) {
                check_rule(state.rule_index)?;
            }
            match state.kind {
                StateKind::RuleStart { stop_state, .. } => check_state(stop_state)?,
                StateKind::BlockStart { end_state, .. } => check_state(end_state)?,
                StateKind::BlockEnd { start_state } => check_state(start_state)?,
                StateKind::StarLoopEntry { loopback_state, .. }
                | StateKind::LoopEnd { loopback_state } => check_state(loopback_state)?,
                _ => {}
            }
            for transition in &state.transitions {
                check_state(transition.target())?;
                if let Transition::Rule {
                    rule_index,
                    follow_state,
                    ..
                } = transition
                {
                    check_rule(*rule_index)?;
                    check_state(*follow_state)?;
                }
            }
        }
        for &state in self.decision_to_state.iter().chain(&self.mode_to_start_state) {
            check_state(state)?;
        }
        Ok(())
    }
}
