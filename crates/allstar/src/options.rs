#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Tuning knobs for an [`Atn`](crate::atn::Atn) and the DFAs it owns.
///
/// # Example
///
/// ```rust
/// use allstar::AtnOptions;
///
/// let options = AtnOptions::default()
///     .with_max_sparse_edges(8)
///     .with_cache_contexts(false);
/// assert_eq!(options.max_precedence, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct AtnOptions {
    /// Capacity of a sparse edge map before it grows
    pub max_sparse_edges: usize,

    /// Highest precedence level a precedence DFA keeps a start state for
    pub max_precedence: i32,

    /// Lowest symbol with a lexer DFA edge slot
    pub lexer_min_edge: i32,

    /// Highest symbol with a lexer DFA edge slot
    pub lexer_max_edge: i32,

    /// Intern contexts through the shared cache when optimizing a
    /// configuration set
    pub cache_contexts: bool,
}

impl Default for AtnOptions {
    fn default() -> Self {
        Self {
            max_sparse_edges: 5,
            max_precedence: 200,
            lexer_min_edge: 0,
            lexer_max_edge: 127,
            cache_contexts: true,
        }
    }
}

impl AtnOptions {
    #[must_use]
    pub const fn with_max_sparse_edges(mut self, max_sparse_edges: usize) -> Self {
        self.max_sparse_edges = max_sparse_edges;
        self
    }

    #[must_use]
    pub const fn with_max_precedence(mut self, max_precedence: i32) -> Self {
        self.max_precedence = max_precedence;
        self
    }

    #[must_use]
    pub const fn with_lexer_edges(mut self, min: i32, max: i32) -> Self {
        self.lexer_min_edge = min;
        self.lexer_max_edge = max;
        self
    }

    #[must_use]
    pub const fn with_cache_contexts(mut self, cache_contexts: bool) -> Self {
        self.cache_contexts = cache_contexts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let options = AtnOptions::default();
        assert_eq!(options.max_sparse_edges, 5);
        assert_eq!(options.lexer_max_edge, 127);
        assert!(options.cache_contexts);
    }

    #[test]
    fn test_options_builders() {
        let options = AtnOptions::default()
            .with_lexer_edges(0, 255)
            .with_max_precedence(10);
        assert_eq!(options.lexer_max_edge, 255);
        assert_eq!(options.max_precedence, 10);
    }
}
