//! Token type constants and vocabularies
//!
//! Token types are plain `i32` values assigned by the grammar compiler.
//! A handful of values are reserved by the runtime.

/// End of input
pub const EOF: i32 = -1;

/// Marker added to lookahead sets when a rule end is reached without a
/// full context to follow
pub const EPSILON: i32 = -2;

/// Never a valid token type; doubles as the "hit a predicate" marker in
/// lookahead analysis
pub const INVALID_TYPE: i32 = 0;

/// The smallest token type a grammar may assign
pub const MIN_USER_TOKEN_TYPE: i32 = 1;

/// Alternative number meaning "no single alternative"
pub const INVALID_ALT: u32 = 0;

/// Maps token types to human-readable names for diagnostics.
///
/// Each token type may carry a literal name (`'+'`), a symbolic name
/// (`PLUS`) and an explicit display name. Lookups fall back in that order
/// and finally to the number itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    literal_names: Vec<Option<String>>,
    symbolic_names: Vec<Option<String>>,
    display_names: Vec<Option<String>>,
    max_token_type: i32,
}

impl Vocabulary {
    /// A vocabulary with no names; every token renders as its number
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            literal_names: Vec::new(),
            symbolic_names: Vec::new(),
            display_names: Vec::new(),
            max_token_type: 0,
        }
    }

    #[must_use]
    pub fn new(literal_names: Vec<Option<String>>, symbolic_names: Vec<Option<String>>) -> Self {
        Self::with_display_names(literal_names, symbolic_names, Vec::new())
    }

    #[must_use]
    pub fn with_display_names(
        literal_names: Vec<Option<String>>,
        symbolic_names: Vec<Option<String>>,
        display_names: Vec<Option<String>>,
    ) -> Self {
        let longest = literal_names
            .len()
            .max(symbolic_names.len())
            .max(display_names.len());
        let max_token_type = i32::try_from(longest).unwrap_or(i32::MAX) - 1;
        Self {
            literal_names,
            symbolic_names,
            display_names,
            max_token_type,
        }
    }

    /// Build a vocabulary from symbolic names only, indexed by token type
    #[must_use]
    pub fn from_symbolic<S: AsRef<str>>(names: &[S]) -> Self {
        let symbolic = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect();
        Self::new(Vec::new(), symbolic)
    }

    /// The highest token type with a name
    #[must_use]
    pub const fn max_token_type(&self) -> i32 {
        self.max_token_type
    }

    #[must_use]
    pub fn literal_name(&self, token_type: i32) -> Option<&str> {
        lookup(&self.literal_names, token_type)
    }

    #[must_use]
    pub fn symbolic_name(&self, token_type: i32) -> Option<&str> {
        if token_type == EOF {
            return Some("EOF");
        }
        lookup(&self.symbolic_names, token_type)
    }

    /// The name used in diagnostics for `token_type`
    #[must_use]
    pub fn display_name(&self, token_type: i32) -> String {
        lookup(&self.display_names, token_type)
            .or_else(|| self.literal_name(token_type))
            .or_else(|| self.symbolic_name(token_type))
            .map_or_else(|| token_type.to_string(), str::to_string)
    }
}

fn lookup(names: &[Option<String>], token_type: i32) -> Option<&str> {
    let index = usize::try_from(token_type).ok()?;
    names.get(index)?.as_deref()
}
