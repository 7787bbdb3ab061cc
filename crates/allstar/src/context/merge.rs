//! Merging and splicing of prediction contexts

use super::{ContextIdentity, PredictionContext, PredictionContextCache};
use crate::error::{AtnError, Result};
use crate::hash::FastMap;
use std::sync::Arc;

type AppendVisited = FastMap<ContextIdentity, Arc<PredictionContext>>;

impl PredictionContext {
    /// Merge two contexts into one that represents the paths of both.
    ///
    /// The result is commutative up to structural equality and
    /// `join(x, x)` returns `x` itself. Whenever the merged graph is equal
    /// to one of the operands that operand is returned unchanged, so
    /// callers can detect "nothing changed" with `Arc::ptr_eq`.
    ///
    /// Recursive parent merges go through `cache`, which memoizes them
    /// unless it was created with [`PredictionContextCache::uncached`].
    #[must_use]
    pub fn join(
        left: &Arc<Self>,
        right: &Arc<Self>,
        cache: &mut PredictionContextCache,
    ) -> Arc<Self> {
        if Arc::ptr_eq(left, right) {
            return left.clone();
        }
        if left.is_empty() {
            return if left.is_empty_local() {
                left.clone()
            } else {
                right.add_empty_context()
            };
        }
        if right.is_empty() {
            return if right.is_empty_local() {
                right.clone()
            } else {
                left.add_empty_context()
            };
        }

        let left_len = left.len();
        let right_len = right.len();
        if left_len == 1 && right_len == 1 && left.return_state(0) == right.return_state(0) {
            let merged = cache.join(left.parent(0), right.parent(0));
            if Arc::ptr_eq(&merged, left.parent(0)) {
                return left.clone();
            }
            if Arc::ptr_eq(&merged, right.parent(0)) {
                return right.clone();
            }
            return merged.child(left.return_state(0));
        }

        let mut parents = Vec::with_capacity(left_len + right_len);
        let mut return_states = Vec::with_capacity(left_len + right_len);
        let (mut l, mut r) = (0, 0);
        let mut can_return_left = true;
        let mut can_return_right = true;

        while l < left_len && r < right_len {
            let left_state = left.return_state(l);
            let right_state = right.return_state(r);
            if left_state == right_state {
                let parent = cache.join(left.parent(l), right.parent(r));
                can_return_left &= Arc::ptr_eq(&parent, left.parent(l));
                can_return_right &= Arc::ptr_eq(&parent, right.parent(r));
                parents.push(parent);
                return_states.push(left_state);
                l += 1;
                r += 1;
            } else if left_state < right_state {
                parents.push(left.parent(l).clone());
                return_states.push(left_state);
                can_return_right = false;
                l += 1;
            } else {
                parents.push(right.parent(r).clone());
                return_states.push(right_state);
                can_return_left = false;
                r += 1;
            }
        }
        for index in l..left_len {
            parents.push(left.parent(index).clone());
            return_states.push(left.return_state(index));
            can_return_right = false;
        }
        for index in r..right_len {
            parents.push(right.parent(index).clone());
            return_states.push(right.return_state(index));
            can_return_left = false;
        }

        if can_return_left {
            return left.clone();
        }
        if can_return_right {
            return right.clone();
        }
        Self::array(parents, return_states)
    }

    /// Splice `suffix` beneath every path of this context.
    ///
    /// Each path that ends at the full empty context continues into
    /// `suffix` instead. Shared subgraphs are rewritten once.
    ///
    /// # Errors
    ///
    /// Returns [`AtnError::Unsupported`] when `suffix` has more than one
    /// pair, or when `suffix` is the local empty context and this context
    /// has no path ending at the empty context.
    pub fn append_context(
        self: &Arc<Self>,
        suffix: &Arc<Self>,
        cache: &mut PredictionContextCache,
    ) -> Result<Arc<Self>> {
        if self.is_empty() {
            return Ok(suffix.clone());
        }
        let mut visited = AppendVisited::default();
        append(self, suffix, cache, &mut visited)
    }

    /// Splice a single return state beneath every path of this context.
    ///
    /// # Errors
    ///
    /// See [`append_context`](Self::append_context).
    pub fn append_single_context(
        self: &Arc<Self>,
        return_state: i32,
        cache: &mut PredictionContextCache,
    ) -> Result<Arc<Self>> {
        if self.is_empty() {
            return Ok(cache.child(self, return_state));
        }
        let suffix = cache.child(Self::empty_full(), return_state);
        self.append_context(&suffix, cache)
    }
}

fn append(
    context: &Arc<PredictionContext>,
    suffix: &Arc<PredictionContext>,
    cache: &mut PredictionContextCache,
    visited: &mut AppendVisited,
) -> Result<Arc<PredictionContext>> {
    if suffix.is_empty() {
        if suffix.is_empty_full() {
            return Ok(context.clone());
        }
        if context.has_empty() {
            return Ok(PredictionContext::empty_local().clone());
        }
        return Err(AtnError::unsupported(
            "appending the local empty context to a context without an empty path",
        ));
    }
    if suffix.len() != 1 {
        return Err(AtnError::unsupported(
            "appending a suffix context with more than one pair",
        ));
    }

    let key = ContextIdentity(context.clone());
    if let Some(result) = visited.get(&key) {
        return Ok(result.clone());
    }

    let result = if context.is_empty() {
        suffix.clone()
    } else {
        let mut kept = context.len();
        if context.has_empty() {
            kept -= 1;
        }
        let mut parents = Vec::with_capacity(kept);
        let mut return_states = Vec::with_capacity(kept);
        for index in 0..kept {
            parents.push(append(context.parent(index), suffix, cache, visited)?);
            return_states.push(context.return_state(index));
        }
        let rebuilt = if kept == 0 {
            suffix.clone()
        } else {
            PredictionContext::array(parents, return_states)
        };
        if context.has_empty() {
            cache.join(&rebuilt, suffix)
        } else {
            rebuilt
        }
    };

    visited.insert(key, result.clone());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(return_state: i32) -> Arc<PredictionContext> {
        PredictionContext::empty_full().child(return_state)
    }

    #[test]
    fn test_join_identity() {
        let mut cache = PredictionContextCache::uncached();
        let ctx = leaf(3).child(8);
        assert!(Arc::ptr_eq(
            &PredictionContext::join(&ctx, &ctx, &mut cache),
            &ctx
        ));
    }

    #[test]
    fn test_join_with_empty() {
        let mut cache = PredictionContextCache::uncached();
        let ctx = leaf(3);
        let local = PredictionContext::empty_local();
        let full = PredictionContext::empty_full();

        assert!(Arc::ptr_eq(
            &PredictionContext::join(&ctx, local, &mut cache),
            local
        ));
        let joined = PredictionContext::join(full, &ctx, &mut cache);
        assert!(joined.has_empty());
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.return_state(0), 3);
    }

    #[test]
    fn test_join_same_return_state_reuses_operand() {
        let mut cache = PredictionContextCache::new();
        let parent = leaf(1);
        let a = parent.child(4);
        let b = parent.child(4);
        assert!(Arc::ptr_eq(&PredictionContext::join(&a, &b, &mut cache), &a));
    }

    #[test]
    fn test_join_same_return_state_merges_parents() {
        let mut cache = PredictionContextCache::new();
        let a = leaf(1).child(4);
        let b = leaf(2).child(4);
        let joined = PredictionContext::join(&a, &b, &mut cache);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.return_state(0), 4);
        let parent = joined.parent(0);
        assert_eq!(parent.len(), 2);
        assert_eq!(parent.return_state(0), 1);
        assert_eq!(parent.return_state(1), 2);
    }

    #[test]
    fn test_join_disjoint_singletons() {
        let mut cache = PredictionContextCache::uncached();
        let a = leaf(9);
        let b = leaf(2);
        let joined = PredictionContext::join(&a, &b, &mut cache);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.return_state(0), 2);
        assert_eq!(joined.return_state(1), 9);
    }

    #[test]
    fn test_join_subset_returns_superset() {
        let mut cache = PredictionContextCache::uncached();
        let p = leaf(1);
        let big = PredictionContext::array(vec![p.clone(), p.clone()], vec![3, 7]);
        let small = p.child(3);
        assert!(Arc::ptr_eq(
            &PredictionContext::join(&big, &small, &mut cache),
            &big
        ));
    }

    #[test]
    fn test_append_onto_single_path() {
        let mut cache = PredictionContextCache::uncached();
        let ctx = leaf(5);
        let appended = ctx.append_context(&leaf(9), &mut cache).unwrap();
        assert_eq!(appended.to_strings(), vec!["[9 5]"]);
    }

    #[test]
    fn test_append_keeps_empty_path_as_suffix() {
        let mut cache = PredictionContextCache::uncached();
        let ctx = leaf(5).add_empty_context();
        let appended = ctx.append_single_context(9, &mut cache).unwrap();
        let mut paths = appended.to_strings();
        paths.sort();
        assert_eq!(paths, vec!["[9 5]", "[9]"]);
    }

    #[test]
    fn test_append_unsupported() {
        let mut cache = PredictionContextCache::uncached();
        let ctx = leaf(5);
        let wide = PredictionContext::array(vec![leaf(1), leaf(2)], vec![3, 4]);
        assert!(ctx.append_context(&wide, &mut cache).unwrap_err().is_unsupported());
        assert!(
            ctx.append_context(PredictionContext::empty_local(), &mut cache)
                .unwrap_err()
                .is_unsupported()
        );
        let with_empty = ctx.add_empty_context();
        let local = with_empty
            .append_context(PredictionContext::empty_local(), &mut cache)
            .unwrap();
        assert!(local.is_empty_local());
    }

    #[test]
    fn test_append_full_empty_suffix_is_noop() {
        let mut cache = PredictionContextCache::uncached();
        let ctx = leaf(5).child(6);
        let appended = ctx
            .append_context(PredictionContext::empty_full(), &mut cache)
            .unwrap();
        assert!(Arc::ptr_eq(&appended, &ctx));
    }
}
