//! # Configurations
//!
//! One simulation hypothesis and the sets they are merged into.
//!
//! ## Overview
//!
//! An [`AtnConfig`] is the tuple *(state, alternative, context, semantic
//! context)* plus a few flags. It is an immutable value: changing any part
//! produces a new configuration through one of the `transform` methods,
//! which carry every field that is not overridden.
//!
//! Most configurations carry neither a predicate nor lexer actions, so
//! those live in a small payload enum instead of on every configuration.
//!
//! An [`AtnConfigSet`] merges configurations on insertion; see its
//! documentation for the merge rules.

mod set;

pub use set::{AtnConfigSet, ConflictInfo};

use crate::action::LexerActionExecutor;
use crate::atn::AtnState;
use crate::context::{PredictionContext, PredictionContextCache};
use crate::error::Result;
use crate::hash::content_hash;
use crate::semantic::SemanticContext;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const MAX_OUTER_CONTEXT_DEPTH: u8 = 0x7F;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerPayload {
    executor: Option<Arc<LexerActionExecutor>>,
    passed_through_non_greedy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Plain,
    Semantic(Arc<SemanticContext>),
    Lexer(LexerPayload),
    SemanticLexer(Arc<SemanticContext>, LexerPayload),
}

impl Payload {
    fn new(semantic: Arc<SemanticContext>, lexer: Option<LexerPayload>) -> Self {
        match (semantic.is_none(), lexer) {
            (true, None) => Self::Plain,
            (false, None) => Self::Semantic(semantic),
            (true, Some(lexer)) => Self::Lexer(lexer),
            (false, Some(lexer)) => Self::SemanticLexer(semantic, lexer),
        }
    }

    fn semantic(&self) -> &Arc<SemanticContext> {
        match self {
            Self::Semantic(semantic) | Self::SemanticLexer(semantic, _) => semantic,
            Self::Plain | Self::Lexer(_) => SemanticContext::none(),
        }
    }

    const fn lexer(&self) -> Option<&LexerPayload> {
        match self {
            Self::Lexer(lexer) | Self::SemanticLexer(_, lexer) => Some(lexer),
            Self::Plain | Self::Semantic(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AtnConfig {
    state: usize,
    alt: u32,
    context: Arc<PredictionContext>,
    outer_context_depth: u8,
    precedence_filter_suppressed: bool,
    payload: Payload,
}

impl AtnConfig {
    #[must_use]
    pub fn new(state: usize, alt: u32, context: Arc<PredictionContext>) -> Self {
        Self {
            state,
            alt,
            context,
            outer_context_depth: 0,
            precedence_filter_suppressed: false,
            payload: Payload::Plain,
        }
    }

    /// A configuration gated by `semantic`
    #[must_use]
    pub fn with_semantic(
        state: usize,
        alt: u32,
        context: Arc<PredictionContext>,
        semantic: Arc<SemanticContext>,
    ) -> Self {
        Self {
            payload: Payload::new(semantic, None),
            ..Self::new(state, alt, context)
        }
    }

    /// A lexer configuration running `executor` on acceptance
    #[must_use]
    pub fn with_action(
        state: usize,
        alt: u32,
        context: Arc<PredictionContext>,
        executor: Option<Arc<LexerActionExecutor>>,
    ) -> Self {
        let lexer = LexerPayload {
            executor,
            passed_through_non_greedy: false,
        };
        Self {
            payload: Payload::new(SemanticContext::none().clone(), Some(lexer)),
            ..Self::new(state, alt, context)
        }
    }

    #[must_use]
    pub const fn state(&self) -> usize {
        self.state
    }

    #[must_use]
    pub const fn alt(&self) -> u32 {
        self.alt
    }

    #[must_use]
    pub const fn context(&self) -> &Arc<PredictionContext> {
        &self.context
    }

    #[must_use]
    pub fn semantic_context(&self) -> &Arc<SemanticContext> {
        self.payload.semantic()
    }

    #[must_use]
    pub fn lexer_action_executor(&self) -> Option<&Arc<LexerActionExecutor>> {
        self.payload.lexer().and_then(|lexer| lexer.executor.as_ref())
    }

    /// Whether the lexer passed a non-greedy decision on the way here
    #[must_use]
    pub fn passed_through_non_greedy_decision(&self) -> bool {
        self.payload
            .lexer()
            .is_some_and(|lexer| lexer.passed_through_non_greedy)
    }

    /// How many times the closure left the decision rule through its
    /// caller; saturates at 127
    #[must_use]
    pub const fn outer_context_depth(&self) -> u8 {
        self.outer_context_depth
    }

    #[must_use]
    pub const fn reaches_into_outer_context(&self) -> bool {
        self.outer_context_depth != 0
    }

    #[must_use]
    pub const fn is_precedence_filter_suppressed(&self) -> bool {
        self.precedence_filter_suppressed
    }

    #[must_use]
    pub fn with_outer_context_depth(mut self, depth: u8) -> Self {
        self.outer_context_depth = depth.min(MAX_OUTER_CONTEXT_DEPTH);
        self
    }

    #[must_use]
    pub fn with_precedence_filter_suppressed(mut self, suppressed: bool) -> Self {
        self.precedence_filter_suppressed = suppressed;
        self
    }

    /// The same configuration at `state`.
    ///
    /// With `check_non_greedy`, entering a non-greedy decision state is
    /// recorded on lexer configurations.
    #[must_use]
    pub fn transform(&self, state: &AtnState, check_non_greedy: bool) -> Self {
        self.transform_parts(
            state,
            self.context.clone(),
            self.semantic_context().clone(),
            self.lexer_action_executor().cloned(),
            check_non_greedy,
        )
    }

    /// The same configuration at `state` with a different context
    #[must_use]
    pub fn transform_with_context(
        &self,
        state: &AtnState,
        context: Arc<PredictionContext>,
        check_non_greedy: bool,
    ) -> Self {
        self.transform_parts(
            state,
            context,
            self.semantic_context().clone(),
            self.lexer_action_executor().cloned(),
            check_non_greedy,
        )
    }

    /// The same configuration at `state` gated by `semantic`
    #[must_use]
    pub fn transform_with_semantic(
        &self,
        state: &AtnState,
        semantic: Arc<SemanticContext>,
        check_non_greedy: bool,
    ) -> Self {
        self.transform_parts(
            state,
            self.context.clone(),
            semantic,
            self.lexer_action_executor().cloned(),
            check_non_greedy,
        )
    }

    /// The same configuration at `state` running `executor` on acceptance
    #[must_use]
    pub fn transform_with_executor(
        &self,
        state: &AtnState,
        executor: Option<Arc<LexerActionExecutor>>,
        check_non_greedy: bool,
    ) -> Self {
        self.transform_parts(
            state,
            self.context.clone(),
            self.semantic_context().clone(),
            executor,
            check_non_greedy,
        )
    }

    fn transform_parts(
        &self,
        state: &AtnState,
        context: Arc<PredictionContext>,
        semantic: Arc<SemanticContext>,
        executor: Option<Arc<LexerActionExecutor>>,
        check_non_greedy: bool,
    ) -> Self {
        let passed_through_non_greedy = check_non_greedy
            && (self.passed_through_non_greedy_decision()
                || (state.decision().is_some() && state.is_non_greedy()));
        let lexer = (executor.is_some() || passed_through_non_greedy || self.payload.lexer().is_some())
            .then_some(LexerPayload {
                executor,
                passed_through_non_greedy,
            });
        Self {
            state: state.state_number(),
            alt: self.alt,
            context,
            outer_context_depth: self.outer_context_depth,
            precedence_filter_suppressed: self.precedence_filter_suppressed,
            payload: Payload::new(semantic, lexer),
        }
    }

    /// This configuration with `return_state` spliced beneath its context
    ///
    /// # Errors
    ///
    /// See [`PredictionContext::append_context`].
    pub fn append_context(
        &self,
        return_state: i32,
        cache: &mut PredictionContextCache,
    ) -> Result<Self> {
        let context = self.context.append_single_context(return_state, cache)?;
        Ok(Self {
            context,
            ..self.clone()
        })
    }

    /// This configuration with `suffix` spliced beneath its context
    ///
    /// # Errors
    ///
    /// See [`PredictionContext::append_context`].
    pub fn append_context_suffix(
        &self,
        suffix: &Arc<PredictionContext>,
        cache: &mut PredictionContextCache,
    ) -> Result<Self> {
        let context = self.context.append_context(suffix, cache)?;
        Ok(Self {
            context,
            ..self.clone()
        })
    }

    /// Whether every path of `other`'s context is also a path of this
    /// configuration's context, for the same state, alternative and
    /// predicate
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        if self.state != other.state
            || self.alt != other.alt
            || self.semantic_context() != other.semantic_context()
        {
            return false;
        }
        let mut work = vec![(self.context.clone(), other.context.clone())];
        while let Some((left, right)) = work.pop() {
            if Arc::ptr_eq(&left, &right) {
                continue;
            }
            if right.is_empty() {
                if left.has_empty() {
                    continue;
                }
                return false;
            }
            if left.len() < right.len() {
                return false;
            }
            for index in 0..right.len() {
                let Some(found) = left.find_return_state(right.return_state(index)) else {
                    return false;
                };
                work.push((left.parent(found).clone(), right.parent(index).clone()));
            }
        }
        true
    }

    /// Render as `(state,alt,[context],predicate,up=depth)`
    #[must_use]
    pub fn to_display(&self, show_alt: bool, show_context: bool) -> String {
        let mut out = format!("({}", self.state);
        if show_alt {
            out.push_str(&format!(",{}", self.alt));
        }
        if show_context {
            out.push_str(&format!(",{}", self.context.to_strings().join(" ")));
        }
        if !self.semantic_context().is_none() {
            out.push_str(&format!(",{}", self.semantic_context()));
        }
        if self.reaches_into_outer_context() {
            out.push_str(&format!(",up={}", self.outer_context_depth));
        }
        out.push(')');
        out
    }

    pub(crate) fn merge_key(&self) -> u64 {
        (u64::try_from(self.state).unwrap_or(u64::MAX) << 12) | u64::from(self.alt & 0xFFF)
    }

    pub(crate) fn structural_hash(&self) -> u64 {
        content_hash(self)
    }

    pub(crate) fn set_context(&mut self, context: Arc<PredictionContext>) {
        self.context = context;
    }

    pub(crate) fn widen_outer_context_depth(&mut self, depth: u8) {
        self.outer_context_depth = self.outer_context_depth.max(depth);
    }

    pub(crate) fn suppress_precedence_filter(&mut self) {
        self.precedence_filter_suppressed = true;
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && self.reaches_into_outer_context() == other.reaches_into_outer_context()
            && self.precedence_filter_suppressed == other.precedence_filter_suppressed
            && self.context == other.context
            && self.semantic_context() == other.semantic_context()
            && self.passed_through_non_greedy_decision()
                == other.passed_through_non_greedy_decision()
            && self.lexer_action_executor() == other.lexer_action_executor()
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.reaches_into_outer_context().hash(state);
        self.context.hash(state);
        self.semantic_context().hash(state);
    }
}

impl fmt::Display for AtnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display(true, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::StateKind;
    use crate::context::PredictionContextCache;

    fn leaf(return_state: i32) -> Arc<PredictionContext> {
        PredictionContext::empty_full().child(return_state)
    }

    #[test]
    fn test_plain_config_has_no_extras() {
        let config = AtnConfig::new(3, 1, leaf(7));
        assert!(config.semantic_context().is_none());
        assert!(config.lexer_action_executor().is_none());
        assert!(!config.reaches_into_outer_context());
        assert_eq!(config.to_string(), "(3,1,[7])");
    }

    #[test]
    fn test_equality_includes_flags() {
        let a = AtnConfig::new(3, 1, leaf(7));
        let b = AtnConfig::new(3, 1, leaf(7));
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_precedence_filter_suppressed(true));
        assert_ne!(a, b.clone().with_outer_context_depth(1));
        let pred = SemanticContext::predicate(0, 0, false);
        assert_ne!(a, AtnConfig::with_semantic(3, 1, leaf(7), pred));
    }

    #[test]
    fn test_outer_depth_saturates() {
        let config = AtnConfig::new(3, 1, leaf(7)).with_outer_context_depth(200);
        assert_eq!(config.outer_context_depth(), 127);
    }

    #[test]
    fn test_transform_keeps_fields() {
        let pred = SemanticContext::predicate(0, 2, false);
        let config = AtnConfig::with_semantic(3, 2, leaf(7), pred.clone());
        let target = AtnState::new(9, 0, StateKind::Basic);
        let moved = config.transform(&target, false);
        assert_eq!(moved.state(), 9);
        assert_eq!(moved.alt(), 2);
        assert_eq!(moved.semantic_context(), &pred);
        assert!(Arc::ptr_eq(moved.context(), config.context()));
    }

    #[test]
    fn test_transform_records_non_greedy_decisions() {
        let config = AtnConfig::with_action(3, 1, leaf(7), None);
        let mut decision = AtnState::new(4, 0, StateKind::Basic);
        decision.decision = Some(0);
        decision.non_greedy = true;
        let moved = config.transform(&decision, true);
        assert!(moved.passed_through_non_greedy_decision());
        let unchecked = config.transform(&decision, false);
        assert!(!unchecked.passed_through_non_greedy_decision());
    }

    #[test]
    fn test_contains_sub_paths() {
        let wide = AtnConfig::new(
            3,
            1,
            PredictionContext::array(vec![leaf(1), leaf(2)], vec![5, 6]),
        );
        let narrow = AtnConfig::new(3, 1, leaf(2).child(6));
        assert!(wide.contains(&narrow));
        assert!(!narrow.contains(&wide));
        assert!(!wide.contains(&AtnConfig::new(3, 1, leaf(3).child(6))));
    }

    #[test]
    fn test_append_context() {
        let mut cache = PredictionContextCache::uncached();
        let config = AtnConfig::new(3, 1, leaf(5));
        let appended = config.append_context(9, &mut cache).unwrap();
        assert_eq!(appended.context().to_strings(), vec!["[9 5]"]);
        assert_eq!(appended.state(), 3);
    }
}
