//! Interning tables for prediction contexts
//!
//! Two caches with different lifetimes:
//!
//! - [`PredictionContextCache`] lives for one closure computation on one
//!   thread. It interns the contexts that computation creates and memoizes
//!   `child` and `join` calls.
//! - [`SharedContextCache`] lives as long as the automaton and is shared by
//!   every thread. It canonicalizes whole context graphs before they are
//!   stored in a DFA.

use super::{ContextIdentity, PredictionContext};
use crate::hash::{FastMap, FastSet};
use std::sync::{Arc, RwLock};

/// Hit/miss counters for a [`PredictionContextCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub child_hits: usize,
    pub child_misses: usize,
    pub join_hits: usize,
    pub join_misses: usize,
}

#[derive(Debug)]
pub struct PredictionContextCache {
    enabled: bool,
    contexts: FastSet<Arc<PredictionContext>>,
    child_contexts: FastMap<(Arc<PredictionContext>, i32), Arc<PredictionContext>>,
    join_contexts: FastMap<(ContextIdentity, ContextIdentity), Arc<PredictionContext>>,
    stats: CacheStats,
}

impl Default for PredictionContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionContextCache {
    /// A cache that interns and memoizes
    #[must_use]
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// A pass-through cache: nothing is interned or memoized
    #[must_use]
    pub fn uncached() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            contexts: FastSet::default(),
            child_contexts: FastMap::default(),
            join_contexts: FastMap::default(),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of interned contexts
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// The canonical instance structurally equal to `context`
    pub fn as_cached(&mut self, context: &Arc<PredictionContext>) -> Arc<PredictionContext> {
        if !self.enabled {
            return context.clone();
        }
        if let Some(existing) = self.contexts.get(context) {
            return existing.clone();
        }
        self.contexts.insert(context.clone());
        context.clone()
    }

    /// `context.child(return_state)`, interned
    pub fn child(
        &mut self,
        context: &Arc<PredictionContext>,
        return_state: i32,
    ) -> Arc<PredictionContext> {
        if !self.enabled {
            return context.child(return_state);
        }
        let key = (context.clone(), return_state);
        if let Some(existing) = self.child_contexts.get(&key) {
            self.stats.child_hits += 1;
            return existing.clone();
        }
        self.stats.child_misses += 1;
        let child = context.child(return_state);
        let child = self.as_cached(&child);
        self.child_contexts.insert(key, child.clone());
        child
    }

    /// [`PredictionContext::join`], memoized on operand identity.
    ///
    /// The memo is commutative: `join(a, b)` and `join(b, a)` share an
    /// entry.
    pub fn join(
        &mut self,
        left: &Arc<PredictionContext>,
        right: &Arc<PredictionContext>,
    ) -> Arc<PredictionContext> {
        if !self.enabled {
            return PredictionContext::join(left, right, self);
        }
        let key = if Arc::as_ptr(left) <= Arc::as_ptr(right) {
            (ContextIdentity(left.clone()), ContextIdentity(right.clone()))
        } else {
            (ContextIdentity(right.clone()), ContextIdentity(left.clone()))
        };
        if let Some(existing) = self.join_contexts.get(&key) {
            self.stats.join_hits += 1;
            return existing.clone();
        }
        self.stats.join_misses += 1;
        let joined = PredictionContext::join(left, right, self);
        let joined = self.as_cached(&joined);
        self.join_contexts.insert(key, joined.clone());
        joined
    }
}

/// Identity-keyed memo for [`SharedContextCache::cached_context_with`].
///
/// Reusing one across several contexts lets them share the work of
/// canonicalizing common subgraphs.
#[derive(Debug, Default)]
pub struct VisitedContexts(FastMap<ContextIdentity, Arc<PredictionContext>>);

impl VisitedContexts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Process-wide table of canonical context graphs
#[derive(Debug, Default)]
pub struct SharedContextCache {
    contexts: RwLock<FastSet<Arc<PredictionContext>>>,
}

impl SharedContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of canonical contexts held
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonicalize a whole context graph.
    ///
    /// Every node of the result is the canonical instance for its content,
    /// so structurally equal graphs from different threads end up sharing
    /// memory once they are cached.
    #[must_use]
    pub fn cached_context(&self, context: &Arc<PredictionContext>) -> Arc<PredictionContext> {
        self.cached_context_with(context, &mut VisitedContexts::new())
    }

    /// [`cached_context`](Self::cached_context) with a caller-provided
    /// visited map
    #[must_use]
    pub fn cached_context_with(
        &self,
        context: &Arc<PredictionContext>,
        visited: &mut VisitedContexts,
    ) -> Arc<PredictionContext> {
        if context.is_empty() {
            return context.clone();
        }
        let key = ContextIdentity(context.clone());
        if let Some(existing) = visited.0.get(&key) {
            return existing.clone();
        }
        if let Some(existing) = self.lookup(context) {
            visited.0.insert(key, existing.clone());
            return existing;
        }

        let mut parents: Option<Vec<Arc<PredictionContext>>> = None;
        for index in 0..context.len() {
            let original = context.parent(index);
            let parent = self.cached_context_with(original, visited);
            if let Some(parents) = parents.as_mut() {
                parents.push(parent);
            } else if !Arc::ptr_eq(&parent, original) {
                let mut changed: Vec<_> = (0..index).map(|i| context.parent(i).clone()).collect();
                changed.push(parent);
                parents = Some(changed);
            }
        }

        let canonical = match parents {
            None => self.get_or_insert(context),
            Some(parents) => {
                let return_states = (0..context.len()).map(|i| context.return_state(i)).collect();
                let updated = PredictionContext::array(parents, return_states);
                let canonical = self.get_or_insert(&updated);
                visited
                    .0
                    .insert(ContextIdentity(updated), canonical.clone());
                canonical
            }
        };
        visited.0.insert(key, canonical.clone());
        canonical
    }

    fn lookup(&self, context: &Arc<PredictionContext>) -> Option<Arc<PredictionContext>> {
        self.contexts
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(context)
            .cloned()
    }

    fn get_or_insert(&self, context: &Arc<PredictionContext>) -> Arc<PredictionContext> {
        let mut contexts = self
            .contexts
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = contexts.get(context) {
            return existing.clone();
        }
        contexts.insert(context.clone());
        log::trace!("interned shared prediction context ({} total)", contexts.len());
        context.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(return_state: i32) -> Arc<PredictionContext> {
        PredictionContext::empty_full().child(return_state)
    }

    #[test]
    fn test_child_is_interned() {
        let mut cache = PredictionContextCache::new();
        let parent = leaf(1);
        let a = cache.child(&parent, 4);
        let b = cache.child(&parent, 4);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().child_hits, 1);
    }

    #[test]
    fn test_uncached_does_not_memoize() {
        let mut cache = PredictionContextCache::uncached();
        let parent = leaf(1);
        let a = cache.child(&parent, 4);
        let b = cache.child(&parent, 4);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_join_memo_is_commutative() {
        let mut cache = PredictionContextCache::new();
        let a = leaf(1);
        let b = leaf(2);
        let ab = cache.join(&a, &b);
        let ba = cache.join(&b, &a);
        assert!(Arc::ptr_eq(&ab, &ba));
        assert_eq!(cache.stats().join_hits, 1);
    }

    #[test]
    fn test_shared_cache_canonicalizes_graphs() {
        let shared = SharedContextCache::new();
        let first = leaf(3).child(5);
        let second = leaf(3).child(5);
        let a = shared.cached_context(&first);
        let b = shared.cached_context(&second);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(a.parent(0), b.parent(0)));
    }

    #[test]
    fn test_shared_cache_rewrites_parents() {
        let shared = SharedContextCache::new();
        let canonical_parent = shared.cached_context(&leaf(3));
        let fresh = leaf(3).child(7);
        let cached = shared.cached_context(&fresh);
        assert!(Arc::ptr_eq(cached.parent(0), &canonical_parent));
        assert_eq!(cached, fresh);
    }
}
