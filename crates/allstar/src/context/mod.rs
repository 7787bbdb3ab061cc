//! # Prediction Contexts
//!
//! The graph-structured stack of pending rule invocations.
//!
//! ## Overview
//!
//! A [`PredictionContext`] records where each pending rule call returns to.
//! Instead of every simulation path owning its own call stack, contexts are
//! immutable nodes shared through `Arc`: a node holds sorted
//! `(return_state, parent)` pairs, and paths with a common tail share the
//! nodes for that tail.
//!
//! There are three shapes:
//!
//! - **Empty**, in two flavors. The *local* empty context means "ignore
//!   whatever called the decision rule", the *full* empty context means the
//!   bottom of a fully tracked invocation stack was reached.
//! - **Singleton**: one parent and one return state.
//! - **Array**: two or more pairs sorted by return state. The full empty
//!   context appears as a pair keyed by [`EMPTY_FULL_STATE_KEY`], which
//!   always sorts last.
//!
//! Contexts compare and hash structurally. Hashes are computed once at
//! construction. Identity (`Arc::ptr_eq`) is used as a fast path everywhere
//! and is what [`join`](PredictionContext::join) preserves when it can.

mod cache;
mod merge;

pub use cache::{CacheStats, PredictionContextCache, SharedContextCache, VisitedContexts};

use crate::hash::content_hash;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Return-state key of the full empty context inside an array context
pub const EMPTY_FULL_STATE_KEY: i32 = i32::MAX;

/// Return-state key reserved for the local empty context
pub const EMPTY_LOCAL_STATE_KEY: i32 = i32::MIN;

const EMPTY_HASH: u64 = 1;

#[derive(Debug)]
pub enum PredictionContext {
    Empty {
        full: bool,
    },
    Singleton {
        parent: Arc<PredictionContext>,
        return_state: i32,
        hash: u64,
    },
    Array {
        parents: Box<[Arc<PredictionContext>]>,
        return_states: Box<[i32]>,
        hash: u64,
    },
}

impl PredictionContext {
    /// The shared local empty context
    #[must_use]
    pub fn empty_local() -> &'static Arc<Self> {
        static EMPTY_LOCAL: OnceLock<Arc<PredictionContext>> = OnceLock::new();
        EMPTY_LOCAL.get_or_init(|| Arc::new(Self::Empty { full: false }))
    }

    /// The shared full empty context
    #[must_use]
    pub fn empty_full() -> &'static Arc<Self> {
        static EMPTY_FULL: OnceLock<Arc<PredictionContext>> = OnceLock::new();
        EMPTY_FULL.get_or_init(|| Arc::new(Self::Empty { full: true }))
    }

    /// The shared empty context of the requested flavor
    #[must_use]
    pub fn empty(full: bool) -> &'static Arc<Self> {
        if full {
            Self::empty_full()
        } else {
            Self::empty_local()
        }
    }

    #[must_use]
    pub fn singleton(parent: Arc<Self>, return_state: i32) -> Arc<Self> {
        let hash = content_hash(&(parent.content_hash(), return_state));
        Arc::new(Self::Singleton {
            parent,
            return_state,
            hash,
        })
    }

    /// Build an array context from parallel vectors.
    ///
    /// `return_states` must be sorted ascending without duplicates. A single
    /// entry collapses to a singleton.
    #[must_use]
    pub fn array(parents: Vec<Arc<Self>>, return_states: Vec<i32>) -> Arc<Self> {
        debug_assert_eq!(parents.len(), return_states.len());
        debug_assert!(return_states.windows(2).all(|w| w[0] < w[1]));
        match parents.len() {
            0 => Self::empty_full().clone(),
            1 => {
                let mut parents = parents;
                let parent = parents.pop().unwrap_or_else(|| Self::empty_full().clone());
                Self::singleton(parent, return_states[0])
            }
            _ => {
                let hash = array_hash(&parents, &return_states);
                Arc::new(Self::Array {
                    parents: parents.into_boxed_slice(),
                    return_states: return_states.into_boxed_slice(),
                    hash,
                })
            }
        }
    }

    /// Build the context for an invocation stack of return states, given
    /// outermost first. The bottom of the stack is the empty context of
    /// the requested flavor.
    #[must_use]
    pub fn from_return_states(return_states: &[i32], full: bool) -> Arc<Self> {
        return_states
            .iter()
            .fold(Self::empty(full).clone(), |parent, &return_state| {
                Self::singleton(parent, return_state)
            })
    }

    /// A new singleton whose parent is `self`. Not interned.
    #[must_use]
    pub fn child(self: &Arc<Self>, return_state: i32) -> Arc<Self> {
        Self::singleton(self.clone(), return_state)
    }

    /// Number of `(return_state, parent)` pairs; zero for the empty contexts
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty { .. } => 0,
            Self::Singleton { .. } => 1,
            Self::Array { return_states, .. } => return_states.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    #[must_use]
    pub const fn is_empty_local(&self) -> bool {
        matches!(self, Self::Empty { full: false })
    }

    #[must_use]
    pub const fn is_empty_full(&self) -> bool {
        matches!(self, Self::Empty { full: true })
    }

    /// Whether one of the paths through this node ends at the full empty
    /// context right here
    #[must_use]
    pub fn has_empty(&self) -> bool {
        match self {
            Self::Empty { .. } => true,
            Self::Singleton { return_state, .. } => *return_state == EMPTY_FULL_STATE_KEY,
            Self::Array { return_states, .. } => {
                return_states.last() == Some(&EMPTY_FULL_STATE_KEY)
            }
        }
    }

    /// Return state of pair `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`, including every index on an empty
    /// context.
    #[must_use]
    pub fn return_state(&self, index: usize) -> i32 {
        match self {
            Self::Singleton { return_state, .. } if index == 0 => *return_state,
            Self::Array { return_states, .. } => return_states[index],
            _ => panic!(
                "return state index {index} out of range for context of length {}",
                self.len()
            ),
        }
    }

    /// Parent of pair `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`, including every index on an empty
    /// context.
    #[must_use]
    pub fn parent(&self, index: usize) -> &Arc<Self> {
        match self {
            Self::Singleton { parent, .. } if index == 0 => parent,
            Self::Array { parents, .. } => &parents[index],
            _ => panic!(
                "parent index {index} out of range for context of length {}",
                self.len()
            ),
        }
    }

    /// Position of `return_state` among this node's pairs
    #[must_use]
    pub fn find_return_state(&self, return_state: i32) -> Option<usize> {
        match self {
            Self::Empty { .. } => None,
            Self::Singleton {
                return_state: own, ..
            } => (*own == return_state).then_some(0),
            Self::Array { return_states, .. } => return_states.binary_search(&return_state).ok(),
        }
    }

    /// The cached structural hash
    #[must_use]
    pub const fn content_hash(&self) -> u64 {
        match self {
            Self::Empty { .. } => EMPTY_HASH,
            Self::Singleton { hash, .. } | Self::Array { hash, .. } => *hash,
        }
    }

    /// Add a pair ending at the full empty context, if there is none yet
    #[must_use]
    pub fn add_empty_context(self: &Arc<Self>) -> Arc<Self> {
        match &**self {
            Self::Empty { .. } => self.clone(),
            _ if self.has_empty() => self.clone(),
            Self::Singleton {
                parent,
                return_state,
                ..
            } => Self::array(
                vec![parent.clone(), Self::empty_full().clone()],
                vec![*return_state, EMPTY_FULL_STATE_KEY],
            ),
            Self::Array {
                parents,
                return_states,
                ..
            } => {
                let mut parents = parents.to_vec();
                let mut return_states = return_states.to_vec();
                parents.push(Self::empty_full().clone());
                return_states.push(EMPTY_FULL_STATE_KEY);
                Self::array(parents, return_states)
            }
        }
    }

    /// Drop the pair ending at the full empty context, if any.
    ///
    /// # Errors
    ///
    /// Removing the empty context from itself is not supported.
    pub fn remove_empty_context(self: &Arc<Self>) -> crate::Result<Arc<Self>> {
        match &**self {
            Self::Empty { .. } => Err(crate::AtnError::unsupported(
                "removing the empty context from itself",
            )),
            _ if !self.has_empty() => Ok(self.clone()),
            Self::Singleton { .. } => Ok(Self::empty_full().clone()),
            Self::Array {
                parents,
                return_states,
                ..
            } => {
                let keep = parents.len() - 1;
                Ok(Self::array(
                    parents[..keep].to_vec(),
                    return_states[..keep].to_vec(),
                ))
            }
        }
    }

    /// Render every path through this context as `[outermost ... innermost]`.
    ///
    /// Paths ending at the full empty context contribute their return
    /// states; the empty context itself renders as `[]`.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.paths()
            .into_iter()
            .map(|path| {
                let states: Vec<String> = path.iter().rev().map(ToString::to_string).collect();
                format!("[{}]", states.join(" "))
            })
            .collect()
    }

    /// Like [`to_strings`](Self::to_strings), naming each frame by the rule
    /// it belongs to. `current_state` is the state the innermost frame is
    /// executing in.
    #[must_use]
    pub fn to_rule_strings(
        &self,
        atn: &crate::atn::Atn,
        rule_names: &[&str],
        current_state: usize,
    ) -> Vec<String> {
        let rule_name = |state: usize| {
            atn.states()
                .get(state)
                .and_then(|s| rule_names.get(s.rule_index))
                .map_or_else(|| state.to_string(), |name| (*name).to_string())
        };
        self.paths()
            .into_iter()
            .map(|path| {
                let mut frames = vec![rule_name(current_state)];
                frames.extend(
                    path.iter()
                        .filter_map(|&rs| usize::try_from(rs).ok())
                        .map(rule_name),
                );
                frames.reverse();
                format!("[{}]", frames.join(" "))
            })
            .collect()
    }

    /// Every root-to-bottom path of return states, innermost first
    fn paths(&self) -> Vec<Vec<i32>> {
        let mut paths = Vec::new();
        let mut prefix = Vec::new();
        self.collect_paths(&mut prefix, &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &mut Vec<i32>, paths: &mut Vec<Vec<i32>>) {
        if self.is_empty() {
            paths.push(prefix.clone());
            return;
        }
        for index in 0..self.len() {
            let return_state = self.return_state(index);
            if return_state == EMPTY_FULL_STATE_KEY {
                paths.push(prefix.clone());
                continue;
            }
            prefix.push(return_state);
            self.parent(index).collect_paths(prefix, paths);
            prefix.pop();
        }
    }
}

fn array_hash(parents: &[Arc<PredictionContext>], return_states: &[i32]) -> u64 {
    let parent_hashes: Vec<u64> = parents.iter().map(|p| p.content_hash()).collect();
    content_hash(&(parent_hashes, return_states))
}

impl PartialEq for PredictionContext {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self, other) {
            (Self::Empty { full: a }, Self::Empty { full: b }) => a == b,
            (
                Self::Singleton {
                    parent: p1,
                    return_state: r1,
                    hash: h1,
                },
                Self::Singleton {
                    parent: p2,
                    return_state: r2,
                    hash: h2,
                },
            ) => h1 == h2 && r1 == r2 && p1 == p2,
            (
                Self::Array {
                    parents: p1,
                    return_states: r1,
                    hash: h1,
                },
                Self::Array {
                    parents: p2,
                    return_states: r2,
                    hash: h2,
                },
            ) => h1 == h2 && r1 == r2 && p1 == p2,
            _ => false,
        }
    }
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl fmt::Display for PredictionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { full: true } => f.write_str("$"),
            Self::Empty { full: false } => f.write_str("[]"),
            _ => f.write_str(&self.to_strings().join(", ")),
        }
    }
}

/// Pointer-identity key for memo tables.
///
/// Holds a strong reference so the address cannot be reused while the key
/// is alive.
#[derive(Debug, Clone)]
pub(crate) struct ContextIdentity(pub(crate) Arc<PredictionContext>);

impl PartialEq for ContextIdentity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ContextIdentity {}

impl Hash for ContextIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(return_state: i32) -> Arc<PredictionContext> {
        PredictionContext::empty_full().child(return_state)
    }

    #[test]
    fn test_empty_contexts() {
        let local = PredictionContext::empty_local();
        let full = PredictionContext::empty_full();
        assert!(local.is_empty() && full.is_empty());
        assert!(local.is_empty_local());
        assert!(!full.is_empty_local());
        assert_ne!(**local, **full);
        assert_eq!(local.len(), 0);
        assert_eq!(local.find_return_state(3), None);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_empty_context_has_no_parent() {
        let _ = PredictionContext::empty_full().parent(0);
    }

    #[test]
    fn test_structural_equality() {
        let a = leaf(4).child(7);
        let b = leaf(4).child(7);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a, leaf(4).child(8));
    }

    #[test]
    fn test_add_and_remove_empty() {
        let ctx = leaf(5);
        let with_empty = ctx.add_empty_context();
        assert_eq!(with_empty.len(), 2);
        assert!(with_empty.has_empty());
        assert_eq!(with_empty.return_state(1), EMPTY_FULL_STATE_KEY);
        assert!(Arc::ptr_eq(&with_empty.add_empty_context(), &with_empty));

        let removed = with_empty.remove_empty_context().unwrap();
        assert_eq!(removed, ctx);
        assert!(
            PredictionContext::empty_full()
                .remove_empty_context()
                .unwrap_err()
                .is_unsupported()
        );
    }

    #[test]
    fn test_array_lookup() {
        let ctx = PredictionContext::array(vec![leaf(1), leaf(2), leaf(3)], vec![3, 7, 9]);
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.find_return_state(7), Some(1));
        assert_eq!(ctx.find_return_state(8), None);
        assert_eq!(ctx.return_state(2), 9);
        assert!(!ctx.has_empty());
    }

    #[test]
    fn test_to_strings() {
        let ctx = PredictionContext::from_return_states(&[9, 5], true);
        assert_eq!(ctx.to_strings(), vec!["[9 5]".to_string()]);
        assert_eq!(PredictionContext::empty_full().to_strings(), vec!["[]"]);

        let forked = leaf(4).child(5).add_empty_context();
        assert_eq!(forked.to_strings(), vec!["[4 5]", "[]"]);
    }
}
