//! # DFA Cache
//!
//! Memoized prediction results, one DFA per decision.
//!
//! ## Overview
//!
//! Adaptive prediction is expensive the first time a decision sees a given
//! lookahead and free every time after: each configuration set the
//! simulator reaches becomes a [`DfaState`], and each symbol it consumed
//! becomes an edge. The [`Dfa`] of a decision is shared by every thread
//! using the same [`Atn`], so it is built for concurrent use:
//!
//! - [`Dfa::add_state`] returns the canonical state for a configuration
//!   set. Racing threads that build equal states all get the first one
//!   published.
//! - Edges are written through [`DfaState::set_target`] without a
//!   DFA-wide lock. Losing a race on an edge only costs a recomputation.
//! - Start states are held in atomically replaced slots. Precedence DFAs
//!   keep one start state per precedence level in the edges of a holder
//!   state.
//!
//! [`DfaSerializer`] renders a DFA as text for debugging and tests.

mod edge_map;
mod serializer;
mod state;

pub use edge_map::{DEFAULT_SPARSE_CAPACITY, EdgeBounds, EdgeMap, EdgeMapTier};
pub use serializer::DfaSerializer;
pub use state::{AcceptStateInfo, DfaState, PredPrediction};

use crate::atn::{Atn, AtnState, AtnType};
use crate::config::AtnConfigSet;
use crate::error::{AtnError, Result};
use crate::hash::FastSet;
use crate::token::{EOF, Vocabulary};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// State number of the error sentinel
pub const ERROR_STATE_NUMBER: i32 = i32::MAX;

/// The prediction cache for one decision or lexer mode
pub struct Dfa {
    decision: usize,
    atn_start_state: usize,
    states: RwLock<FastSet<Arc<DfaState>>>,
    next_state_number: AtomicI32,
    s0: RwLock<Option<Arc<DfaState>>>,
    s0_full: RwLock<Option<Arc<DfaState>>>,
    precedence_dfa: bool,
    min_edge: i32,
    max_edge: i32,
    max_precedence: i32,
    empty_edge_map: Arc<EdgeMap<DfaState>>,
    empty_context_edge_map: Arc<EdgeMap<DfaState>>,
    error_state: Arc<DfaState>,
}

impl Dfa {
    /// An empty DFA for `decision`, starting at ATN state `atn_start_state`.
    ///
    /// Lexer DFAs take edges over the configured character range; parser
    /// DFAs over `EOF..=max_token_type`. If the start state is the loop
    /// entry of a left-recursive rule the DFA is a precedence DFA.
    #[must_use]
    pub fn new(atn: &Atn, atn_start_state: usize, decision: usize) -> Self {
        let options = atn.options();
        let (min_edge, max_edge) = match atn.grammar_type() {
            AtnType::Lexer => (options.lexer_min_edge, options.lexer_max_edge),
            AtnType::Parser => (EOF, atn.max_token_type()),
        };
        let capacity = options.max_sparse_edges;
        let max_context_edge = i32::try_from(atn.states().len())
            .unwrap_or(i32::MAX)
            .saturating_sub(1);

        let empty_edge_map = EdgeMap::with_sparse_capacity(min_edge, max_edge, capacity);
        let empty_context_edge_map =
            EdgeMap::with_sparse_capacity(-1, max_context_edge, capacity);
        let precedence_dfa = atn
            .states()
            .get(atn_start_state)
            .is_some_and(AtnState::is_precedence_decision);

        let error_state = Arc::new(DfaState::with_edge_maps(
            ERROR_STATE_NUMBER,
            Arc::new(frozen_empty_set()),
            empty_edge_map.clone(),
            empty_context_edge_map.clone(),
        ));

        let holder = |max_precedence: i32| {
            Arc::new(DfaState::with_edge_maps(
                -1,
                Arc::new(frozen_empty_set()),
                EdgeMap::with_sparse_capacity(0, max_precedence, capacity),
                EdgeMap::with_sparse_capacity(0, max_precedence, capacity),
            ))
        };
        let (s0, s0_full) = if precedence_dfa {
            (
                Some(holder(options.max_precedence)),
                Some(holder(options.max_precedence)),
            )
        } else {
            (None, None)
        };

        Self {
            decision,
            atn_start_state,
            states: RwLock::new(FastSet::default()),
            next_state_number: AtomicI32::new(0),
            s0: RwLock::new(s0),
            s0_full: RwLock::new(s0_full),
            precedence_dfa,
            min_edge,
            max_edge,
            max_precedence: options.max_precedence,
            empty_edge_map,
            empty_context_edge_map,
            error_state,
        }
    }

    #[must_use]
    pub const fn decision(&self) -> usize {
        self.decision
    }

    #[must_use]
    pub const fn atn_start_state(&self) -> usize {
        self.atn_start_state
    }

    #[must_use]
    pub const fn is_precedence_dfa(&self) -> bool {
        self.precedence_dfa
    }

    #[must_use]
    pub const fn min_edge(&self) -> i32 {
        self.min_edge
    }

    #[must_use]
    pub const fn max_edge(&self) -> i32 {
        self.max_edge
    }

    /// Highest precedence level a precedence DFA keeps a start state for
    #[must_use]
    pub const fn max_precedence(&self) -> i32 {
        self.max_precedence
    }

    /// The edge map every new state starts with
    #[must_use]
    pub const fn empty_edge_map(&self) -> &Arc<EdgeMap<DfaState>> {
        &self.empty_edge_map
    }

    /// The context edge map every new state starts with
    #[must_use]
    pub const fn empty_context_edge_map(&self) -> &Arc<EdgeMap<DfaState>> {
        &self.empty_context_edge_map
    }

    /// The sentinel target recorded for symbols that lead nowhere
    #[must_use]
    pub const fn error_state(&self) -> &Arc<DfaState> {
        &self.error_state
    }

    /// The start state for local-context prediction. For a precedence DFA
    /// this is the holder whose edges are the per-precedence start states.
    #[must_use]
    pub fn s0(&self) -> Option<Arc<DfaState>> {
        self.s0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn s0_full(&self) -> Option<Arc<DfaState>> {
        self.s0_full
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// # Errors
    ///
    /// Fails with [`AtnError::Unsupported`] on a precedence DFA, whose
    /// start states are set with
    /// [`set_precedence_start_state`](Self::set_precedence_start_state).
    pub fn set_s0(&self, state: Option<Arc<DfaState>>) -> Result<()> {
        self.replace_start(&self.s0, state)
    }

    /// # Errors
    ///
    /// Fails with [`AtnError::Unsupported`] on a precedence DFA.
    pub fn set_s0_full(&self, state: Option<Arc<DfaState>>) -> Result<()> {
        self.replace_start(&self.s0_full, state)
    }

    fn replace_start(
        &self,
        slot: &RwLock<Option<Arc<DfaState>>>,
        state: Option<Arc<DfaState>>,
    ) -> Result<()> {
        if self.precedence_dfa {
            return Err(AtnError::unsupported(
                "replacing the start state holder of a precedence DFA",
            ));
        }
        *slot.write().unwrap_or_else(PoisonError::into_inner) = state;
        Ok(())
    }

    /// The start state recorded for `precedence`.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::NotPrecedenceDfa`] if this is not a
    /// precedence DFA.
    pub fn precedence_start_state(
        &self,
        precedence: i32,
        full_context: bool,
    ) -> Result<Option<Arc<DfaState>>> {
        let holder = self.precedence_holder(full_context)?;
        if precedence < 0 {
            return Ok(None);
        }
        Ok(holder.and_then(|holder| holder.target(precedence)))
    }

    /// Record the start state for `precedence`. Negative precedences are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::NotPrecedenceDfa`] if this is not a
    /// precedence DFA.
    pub fn set_precedence_start_state(
        &self,
        precedence: i32,
        full_context: bool,
        start_state: Arc<DfaState>,
    ) -> Result<()> {
        let holder = self.precedence_holder(full_context)?;
        if precedence < 0 {
            return Ok(());
        }
        if let Some(holder) = holder {
            holder.set_target(precedence, start_state);
            log::trace!(
                "decision {}: start state for precedence {precedence} (full={full_context})",
                self.decision
            );
        }
        Ok(())
    }

    fn precedence_holder(&self, full_context: bool) -> Result<Option<Arc<DfaState>>> {
        if !self.precedence_dfa {
            return Err(AtnError::NotPrecedenceDfa {
                decision: self.decision,
            });
        }
        Ok(if full_context { self.s0_full() } else { self.s0() })
    }

    /// Whether no start state has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        if self.precedence_dfa {
            let empty = |state: Option<Arc<DfaState>>| state.is_none_or(|s| s.edge_count() == 0);
            return empty(self.s0()) && empty(self.s0_full());
        }
        self.s0().is_none() && self.s0_full().is_none()
    }

    /// Whether full-context prediction has been used for this decision
    #[must_use]
    pub fn is_context_sensitive(&self) -> bool {
        if self.precedence_dfa {
            return self.s0_full().is_some_and(|s| s.edge_count() > 0);
        }
        self.s0_full().is_some()
    }

    /// Publish `state`, or return the equal state published before it.
    ///
    /// A newly published state is numbered in insertion order.
    pub fn add_state(&self, mut state: DfaState) -> Arc<DfaState> {
        if let Some(existing) = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&state)
        {
            return existing.clone();
        }

        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = states.get(&state) {
            return existing.clone();
        }
        let state_number = self.next_state_number.fetch_add(1, Ordering::Relaxed);
        state.set_state_number(state_number);
        let state = Arc::new(state);
        states.insert(state.clone());
        log::trace!(
            "decision {}: added DFA state {state_number} ({} configs)",
            self.decision,
            state.configs().len()
        );
        state
    }

    /// Number of published states
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Published states ordered by state number
    #[must_use]
    pub fn states(&self) -> Vec<Arc<DfaState>> {
        let mut states: Vec<_> = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        states.sort_by_key(|s| s.state_number());
        states
    }

    /// Forget every state and start state
    pub fn clear(&self) {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        if self.precedence_dfa {
            for holder in [self.s0(), self.s0_full()].into_iter().flatten() {
                holder.clear_edges();
            }
        } else {
            *self.s0.write().unwrap_or_else(PoisonError::into_inner) = None;
            *self.s0_full.write().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// Render the DFA with token names from `vocabulary`, or `None` if no
    /// start state has been recorded
    #[must_use]
    pub fn to_string_with(&self, vocabulary: &Vocabulary) -> Option<String> {
        DfaSerializer::new(self, vocabulary).serialize()
    }

    /// Render a lexer DFA with character edge labels
    #[must_use]
    pub fn to_lexer_string(&self) -> Option<String> {
        DfaSerializer::lexer(self).serialize()
    }
}

fn frozen_empty_set() -> AtnConfigSet {
    let mut configs = AtnConfigSet::new();
    configs.freeze();
    configs
}

impl fmt::Debug for Dfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dfa")
            .field("decision", &self.decision)
            .field("atn_start_state", &self.atn_start_state)
            .field("precedence_dfa", &self.precedence_dfa)
            .field("states", &self.len())
            .finish_non_exhaustive()
    }
}
