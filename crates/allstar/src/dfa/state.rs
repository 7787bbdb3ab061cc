use super::Dfa;
use super::edge_map::{EdgeMap, EdgeMapTier};
use crate::action::LexerActionExecutor;
use crate::config::AtnConfigSet;
use crate::context::EMPTY_FULL_STATE_KEY;
use crate::error::{AtnError, Result};
use crate::semantic::SemanticContext;
use crate::token::INVALID_ALT;
use fixedbitset::FixedBitSet;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

/// What a DFA state predicts when prediction stops there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptStateInfo {
    prediction: u32,
    lexer_action_executor: Option<Arc<LexerActionExecutor>>,
}

impl AcceptStateInfo {
    #[must_use]
    pub const fn new(prediction: u32) -> Self {
        Self {
            prediction,
            lexer_action_executor: None,
        }
    }

    #[must_use]
    pub const fn with_executor(prediction: u32, executor: Arc<LexerActionExecutor>) -> Self {
        Self {
            prediction,
            lexer_action_executor: Some(executor),
        }
    }

    #[must_use]
    pub const fn prediction(&self) -> u32 {
        self.prediction
    }

    #[must_use]
    pub const fn lexer_action_executor(&self) -> Option<&Arc<LexerActionExecutor>> {
        self.lexer_action_executor.as_ref()
    }
}

/// A predicate that selects `alt` at an accept state reached by several
/// alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredPrediction {
    pub pred: Arc<SemanticContext>,
    pub alt: u32,
}

impl fmt::Display for PredPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pred, self.alt)
    }
}

/// A memoized configuration set and its outgoing edges.
///
/// Two states are equal when their configuration sets are equal; the
/// state number plays no part. Accept information and predicates are set
/// before the state is published with [`Dfa::add_state`]; edges and
/// context sensitivity may be added afterwards by any thread.
pub struct DfaState {
    state_number: i32,
    configs: Arc<AtnConfigSet>,
    edges: RwLock<Arc<EdgeMap<DfaState>>>,
    context_edges: RwLock<Arc<EdgeMap<DfaState>>>,
    context_symbols: RwLock<Option<FixedBitSet>>,
    accept_state_info: Option<AcceptStateInfo>,
    predicates: Option<Vec<PredPrediction>>,
}

impl DfaState {
    /// An unpublished state for `dfa` holding `configs`, which is frozen
    #[must_use]
    pub fn new(dfa: &Dfa, mut configs: AtnConfigSet) -> Self {
        configs.freeze();
        Self::with_edge_maps(
            -1,
            Arc::new(configs),
            dfa.empty_edge_map().clone(),
            dfa.empty_context_edge_map().clone(),
        )
    }

    pub(crate) fn with_edge_maps(
        state_number: i32,
        configs: Arc<AtnConfigSet>,
        edges: Arc<EdgeMap<Self>>,
        context_edges: Arc<EdgeMap<Self>>,
    ) -> Self {
        Self {
            state_number,
            configs,
            edges: RwLock::new(edges),
            context_edges: RwLock::new(context_edges),
            context_symbols: RwLock::new(None),
            accept_state_info: None,
            predicates: None,
        }
    }

    /// The number assigned when the state was added to its DFA; `-1`
    /// before that
    #[must_use]
    pub const fn state_number(&self) -> i32 {
        self.state_number
    }

    pub(crate) fn set_state_number(&mut self, state_number: i32) {
        self.state_number = state_number;
    }

    /// Whether this is the error sentinel of its DFA
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.state_number == i32::MAX
    }

    #[must_use]
    pub fn configs(&self) -> &AtnConfigSet {
        &self.configs
    }

    /// The state reached on `symbol`, if that edge has been computed
    #[must_use]
    pub fn target(&self, symbol: i32) -> Option<Arc<Self>> {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
    }

    /// Record the edge on `symbol`. Symbols outside the DFA's edge range
    /// are ignored.
    pub fn set_target(&self, symbol: i32, target: Arc<Self>) {
        {
            let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
            if edges.tier() == EdgeMapTier::Array {
                let _ = edges.put(symbol, target);
                return;
            }
        }
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        let updated = edges.put(symbol, target);
        *edges = updated;
    }

    /// Snapshot of every computed edge
    #[must_use]
    pub fn edge_map(&self) -> BTreeMap<i32, Arc<Self>> {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_map()
    }

    pub(crate) fn clear_edges(&self) {
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        let cleared = edges.clear();
        *edges = cleared;
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edges.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn min_edge(&self) -> i32 {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .min_index()
    }

    #[must_use]
    pub fn is_context_sensitive(&self) -> bool {
        self.context_symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Mark the state as needing the invocation context on some symbols
    pub fn set_context_sensitive(&self) {
        let mut symbols = self
            .context_symbols
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if symbols.is_none() {
            *symbols = Some(FixedBitSet::new());
        }
    }

    /// Whether the edge on `symbol` depends on the invocation context
    #[must_use]
    pub fn is_context_symbol(&self, symbol: i32) -> bool {
        let Ok(offset) = usize::try_from(i64::from(symbol) - i64::from(self.min_edge())) else {
            return false;
        };
        self.context_symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|symbols| symbols.contains(offset))
    }

    /// # Errors
    ///
    /// Fails with [`AtnError::NotContextSensitive`] unless
    /// [`set_context_sensitive`](Self::set_context_sensitive) was called.
    pub fn set_context_symbol(&self, symbol: i32) -> Result<()> {
        let min_edge = self.min_edge();
        let mut symbols = self
            .context_symbols
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let symbols = symbols.as_mut().ok_or(AtnError::NotContextSensitive {
            state: self.state_number,
        })?;
        if let Ok(offset) = usize::try_from(i64::from(symbol) - i64::from(min_edge)) {
            symbols.grow(offset + 1);
            symbols.insert(offset);
        }
        Ok(())
    }

    /// The state reached when the rule invoked from `invoking_state`
    /// returns; [`EMPTY_FULL_STATE_KEY`] names the outermost return
    #[must_use]
    pub fn context_target(&self, invoking_state: i32) -> Option<Arc<Self>> {
        self.context_edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(context_slot(invoking_state))
    }

    /// # Errors
    ///
    /// Fails with [`AtnError::NotContextSensitive`] unless
    /// [`set_context_sensitive`](Self::set_context_sensitive) was called.
    pub fn set_context_target(&self, invoking_state: i32, target: Arc<Self>) -> Result<()> {
        if !self.is_context_sensitive() {
            return Err(AtnError::NotContextSensitive {
                state: self.state_number,
            });
        }
        let mut edges = self
            .context_edges
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let updated = edges.put(context_slot(invoking_state), target);
        *edges = updated;
        Ok(())
    }

    /// Snapshot of the context edges, keyed by invoking state
    #[must_use]
    pub fn context_edge_map(&self) -> BTreeMap<i32, Arc<Self>> {
        self.context_edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries()
            .into_iter()
            .map(|(slot, target)| {
                let key = if slot == -1 { EMPTY_FULL_STATE_KEY } else { slot };
                (key, target)
            })
            .collect()
    }

    #[must_use]
    pub const fn accept_state_info(&self) -> Option<&AcceptStateInfo> {
        self.accept_state_info.as_ref()
    }

    /// Set before the state is published
    pub fn set_accept_state_info(&mut self, info: Option<AcceptStateInfo>) {
        self.accept_state_info = info;
    }

    #[must_use]
    pub const fn is_accept_state(&self) -> bool {
        self.accept_state_info.is_some()
    }

    /// The predicted alternative, or [`INVALID_ALT`] for a non-accepting
    /// state
    #[must_use]
    pub fn prediction(&self) -> u32 {
        self.accept_state_info
            .as_ref()
            .map_or(INVALID_ALT, AcceptStateInfo::prediction)
    }

    #[must_use]
    pub fn lexer_action_executor(&self) -> Option<&Arc<LexerActionExecutor>> {
        self.accept_state_info
            .as_ref()
            .and_then(AcceptStateInfo::lexer_action_executor)
    }

    #[must_use]
    pub fn predicates(&self) -> Option<&[PredPrediction]> {
        self.predicates.as_deref()
    }

    /// Set before the state is published
    pub fn set_predicates(&mut self, predicates: Option<Vec<PredPrediction>>) {
        self.predicates = predicates;
    }
}

fn context_slot(invoking_state: i32) -> i32 {
    if invoking_state == EMPTY_FULL_STATE_KEY {
        -1
    } else {
        invoking_state
    }
}

impl PartialEq for DfaState {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.configs == other.configs
    }
}

impl Eq for DfaState {}

impl Hash for DfaState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.configs.hash(state);
    }
}

impl fmt::Debug for DfaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DfaState")
            .field("state_number", &self.state_number)
            .field("configs", &self.configs.len())
            .field("accept_state_info", &self.accept_state_info)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DfaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.state_number, self.configs)?;
        if self.is_accept_state() {
            f.write_str("=>")?;
            match &self.predicates {
                Some(predicates) => {
                    let rendered: Vec<String> =
                        predicates.iter().map(ToString::to_string).collect();
                    write!(f, "[{}]", rendered.join(", "))?;
                }
                None => write!(f, "{}", self.prediction())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(min: i32, max: i32) -> DfaState {
        let mut configs = AtnConfigSet::new();
        configs.freeze();
        DfaState::with_edge_maps(
            0,
            Arc::new(configs),
            EdgeMap::new(min, max),
            EdgeMap::new(-1, 50),
        )
    }

    #[test]
    fn test_targets() {
        let state = detached(-1, 10);
        let target = Arc::new(detached(-1, 10));
        assert!(state.target(3).is_none());
        state.set_target(3, target.clone());
        state.set_target(-1, target.clone());
        assert!(Arc::ptr_eq(&state.target(3).unwrap(), &target));
        assert_eq!(state.edge_map().keys().copied().collect::<Vec<_>>(), vec![-1, 3]);
        state.set_target(11, target);
        assert_eq!(state.edge_count(), 2);
    }

    #[test]
    fn test_context_sensitivity() {
        let state = detached(-1, 10);
        let target = Arc::new(detached(-1, 10));
        assert!(state.set_context_symbol(2).is_err());
        assert!(state.set_context_target(4, target.clone()).is_err());

        state.set_context_sensitive();
        state.set_context_symbol(2).unwrap();
        assert!(state.is_context_symbol(2));
        assert!(!state.is_context_symbol(3));

        state
            .set_context_target(EMPTY_FULL_STATE_KEY, target.clone())
            .unwrap();
        state.set_context_target(7, target).unwrap();
        assert!(state.context_target(EMPTY_FULL_STATE_KEY).is_some());
        assert_eq!(
            state.context_edge_map().keys().copied().collect::<Vec<_>>(),
            vec![7, EMPTY_FULL_STATE_KEY]
        );
    }

    #[test]
    fn test_accept_info() {
        let mut state = detached(-1, 10);
        assert_eq!(state.prediction(), INVALID_ALT);
        state.set_accept_state_info(Some(AcceptStateInfo::new(2)));
        assert!(state.is_accept_state());
        assert_eq!(state.prediction(), 2);
        assert_eq!(state.to_string(), "0:[]=>2");
    }
}
