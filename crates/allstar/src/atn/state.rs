use super::Transition;
use crate::interval::IntervalSet;
use std::sync::OnceLock;

/// Shape of a block start state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `( a | b )`
    Basic,
    /// `( a | b )*`
    Star,
    /// `( a | b )+`
    Plus,
}

/// What role a state plays in the automaton.
///
/// State numbers stored here (`stop_state`, `end_state`, ...) index into
/// the owning [`Atn`](super::Atn)'s state table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    Invalid,
    Basic,
    RuleStart {
        stop_state: usize,
        left_factored: bool,
        precedence_rule: bool,
    },
    BlockStart {
        kind: BlockKind,
        end_state: usize,
    },
    BlockEnd {
        start_state: usize,
    },
    RuleStop,
    TokenStart,
    StarLoopEntry {
        loopback_state: usize,
        /// Entry decision of a left-recursive rule's operator loop
        precedence_rule_decision: bool,
    },
    StarLoopback,
    PlusLoopback,
    LoopEnd {
        loopback_state: usize,
    },
}

impl StateKind {
    /// Whether states of this kind may own a decision
    #[must_use]
    pub const fn can_be_decision(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. }
                | Self::TokenStart
                | Self::StarLoopEntry { .. }
                | Self::PlusLoopback
        )
    }
}

/// A node of the automaton
#[derive(Debug)]
pub struct AtnState {
    pub(crate) state_number: usize,
    pub(crate) rule_index: usize,
    pub(crate) kind: StateKind,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) decision: Option<usize>,
    pub(crate) non_greedy: bool,
    pub(crate) next_tokens: OnceLock<IntervalSet>,
}

impl AtnState {
    pub(crate) fn new(state_number: usize, rule_index: usize, kind: StateKind) -> Self {
        Self {
            state_number,
            rule_index,
            kind,
            transitions: Vec::new(),
            decision: None,
            non_greedy: false,
            next_tokens: OnceLock::new(),
        }
    }

    #[must_use]
    pub const fn state_number(&self) -> usize {
        self.state_number
    }

    #[must_use]
    pub const fn rule_index(&self) -> usize {
        self.rule_index
    }

    #[must_use]
    pub const fn kind(&self) -> &StateKind {
        &self.kind
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Transition `index`.
    ///
    /// # Panics
    ///
    /// Panics if the state has no such transition.
    #[must_use]
    pub fn transition(&self, index: usize) -> &Transition {
        &self.transitions[index]
    }

    /// Whether every outgoing transition consumes no input
    #[must_use]
    pub fn only_has_epsilon_transitions(&self) -> bool {
        !self.transitions.is_empty() && self.transitions.iter().all(Transition::is_epsilon)
    }

    /// The decision number this state owns, if it is a decision state
    #[must_use]
    pub const fn decision(&self) -> Option<usize> {
        self.decision
    }

    /// Whether the decision at this state prefers exiting the loop or block
    #[must_use]
    pub const fn is_non_greedy(&self) -> bool {
        self.non_greedy
    }

    #[must_use]
    pub const fn is_rule_stop(&self) -> bool {
        matches!(self.kind, StateKind::RuleStop)
    }

    /// Whether this is the operator-loop entry of a left-recursive rule
    #[must_use]
    pub const fn is_precedence_decision(&self) -> bool {
        matches!(
            self.kind,
            StateKind::StarLoopEntry {
                precedence_rule_decision: true,
                ..
            }
        )
    }
}
