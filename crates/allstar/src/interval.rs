//! Sets of token types stored as sorted, coalesced intervals
//!
//! Transition labels and lookahead sets are sparse over a potentially
//! large token space, so they are kept as inclusive ranges rather than
//! bitsets. Intervals are always sorted by start and never overlap or
//! touch; `add` merges neighbours eagerly.

use crate::error::{AtnError, Result};
use crate::token::{EOF, EPSILON, Vocabulary};
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An inclusive range `a..=b` of token types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    pub a: i32,
    pub b: i32,
}

impl Interval {
    #[must_use]
    pub const fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    #[must_use]
    pub const fn single(a: i32) -> Self {
        Self { a, b: a }
    }

    /// Number of elements; zero for an inverted interval
    #[must_use]
    pub fn len(&self) -> usize {
        if self.b < self.a {
            0
        } else {
            usize::try_from(i64::from(self.b) - i64::from(self.a) + 1).unwrap_or(usize::MAX)
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.b < self.a
    }

    #[must_use]
    pub const fn contains(&self, el: i32) -> bool {
        self.a <= el && el <= self.b
    }

    /// Overlapping or directly adjacent intervals can be merged
    const fn mergeable(&self, other: &Self) -> bool {
        (other.a as i64) <= (self.b as i64) + 1 && (self.a as i64) <= (other.b as i64) + 1
    }
}

/// A set of `i32` values represented by disjoint, sorted intervals.
///
/// A set may be marked read-only (for example once it is cached on an
/// automaton state); every mutating method then fails with
/// [`AtnError::ReadOnly`].
///
/// # Examples
///
/// ```
/// use allstar::interval::IntervalSet;
///
/// let mut set = IntervalSet::of_range(1, 3);
/// set.add(7).unwrap();
/// set.add(4).unwrap();
/// assert_eq!(set.to_string(), "{1..4, 7}");
/// assert!(set.contains(2));
/// assert_eq!(set.len(), 5);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalSet {
    intervals: SmallVec<[Interval; 4]>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    read_only: bool,
}

impl IntervalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding exactly `el`
    #[must_use]
    pub fn of(el: i32) -> Self {
        Self::of_range(el, el)
    }

    /// A set holding `a..=b` (empty if `b < a`)
    #[must_use]
    pub fn of_range(a: i32, b: i32) -> Self {
        let mut set = Self::new();
        if a <= b {
            set.intervals.push(Interval::new(a, b));
        }
        set
    }

    #[must_use]
    pub fn from_elements(elements: impl IntoIterator<Item = i32>) -> Self {
        let mut set = Self::new();
        for el in elements {
            set.insert_range(el, el);
        }
        set
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Freeze or unfreeze this set.
    ///
    /// # Errors
    ///
    /// Unfreezing a read-only set is a contract violation and fails with
    /// [`AtnError::ReadOnly`].
    pub fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        if self.read_only && !read_only {
            return Err(AtnError::read_only("interval set"));
        }
        self.read_only = read_only;
        Ok(())
    }

    /// Make this set read-only
    pub fn freeze(&mut self) {
        self.read_only = true;
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(AtnError::read_only("interval set"))
        } else {
            Ok(())
        }
    }

    /// Add a single element.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn add(&mut self, el: i32) -> Result<()> {
        self.add_range(el, el)
    }

    /// Add the inclusive range `a..=b`; an inverted range is ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn add_range(&mut self, a: i32, b: i32) -> Result<()> {
        self.ensure_writable()?;
        self.insert_range(a, b);
        Ok(())
    }

    /// Add every element of `other`.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn add_all(&mut self, other: &Self) -> Result<()> {
        self.ensure_writable()?;
        for interval in &other.intervals {
            self.insert_range(interval.a, interval.b);
        }
        Ok(())
    }

    /// Add `a..=b` regardless of the read-only flag, for sets still
    /// under construction
    pub(crate) fn insert_range(&mut self, a: i32, b: i32) {
        if b < a {
            return;
        }
        let mut added = Interval::new(a, b);
        // first interval that could touch the new one
        let start = self
            .intervals
            .partition_point(|iv| i64::from(iv.b) + 1 < i64::from(added.a));
        let mut end = start;
        while end < self.intervals.len() && self.intervals[end].mergeable(&added) {
            added.a = added.a.min(self.intervals[end].a);
            added.b = added.b.max(self.intervals[end].b);
            end += 1;
        }
        self.intervals.drain(start..end);
        self.intervals.insert(start, added);
    }

    /// Remove a single element, splitting its interval if needed.
    ///
    /// # Errors
    ///
    /// Fails with [`AtnError::ReadOnly`] if the set is frozen.
    pub fn remove(&mut self, el: i32) -> Result<()> {
        self.ensure_writable()?;
        let Some(index) = self.intervals.iter().position(|iv| iv.contains(el)) else {
            return Ok(());
        };
        let Interval { a, b } = self.intervals[index];
        match (a == el, b == el) {
            (true, true) => {
                self.intervals.remove(index);
            }
            (true, false) => self.intervals[index].a = el + 1,
            (false, true) => self.intervals[index].b = el - 1,
            (false, false) => {
                self.intervals[index].b = el - 1;
                self.intervals.insert(index + 1, Interval::new(el + 1, b));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, el: i32) -> bool {
        let index = self.intervals.partition_point(|iv| iv.b < el);
        self.intervals.get(index).is_some_and(|iv| iv.contains(el))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of elements in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.iter().map(Interval::len).sum()
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    #[must_use]
    pub fn min_element(&self) -> Option<i32> {
        self.intervals.first().map(|iv| iv.a)
    }

    #[must_use]
    pub fn max_element(&self) -> Option<i32> {
        self.intervals.last().map(|iv| iv.b)
    }

    /// All elements in ascending order
    #[must_use]
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|iv| iv.a..=iv.b)
    }

    /// Union of two sets; the result is always writable
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        let mut result = Self {
            intervals: self.intervals.clone(),
            read_only: false,
        };
        for interval in &other.intervals {
            result.insert_range(interval.a, interval.b);
        }
        result
    }

    /// Intersection of two sets
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let mut result = Self::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let left = self.intervals[i];
            let right = other.intervals[j];
            let a = left.a.max(right.a);
            let b = left.b.min(right.b);
            if a <= b {
                result.intervals.push(Interval::new(a, b));
            }
            if left.b < right.b {
                i += 1;
            } else {
                j += 1;
            }
        }
        result
    }

    /// Elements of `self` that are not in `other`
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        let mut result = Self::new();
        let mut j = 0;
        'outer: for interval in &self.intervals {
            let mut current = *interval;
            while j < other.intervals.len() && other.intervals[j].b < current.a {
                j += 1;
            }
            let mut k = j;
            while k < other.intervals.len() && other.intervals[k].a <= current.b {
                let hole = other.intervals[k];
                if hole.a > current.a {
                    result.intervals.push(Interval::new(current.a, hole.a - 1));
                }
                if hole.b >= current.b {
                    continue 'outer;
                }
                current.a = hole.b + 1;
                k += 1;
            }
            result.intervals.push(current);
        }
        result
    }

    /// Elements of `vocabulary` that are not in `self`
    #[must_use]
    pub fn complement(&self, vocabulary: &Self) -> Self {
        vocabulary.subtract(self)
    }

    /// Render the set using token names from `vocabulary`
    #[must_use]
    pub fn to_token_string(&self, vocabulary: &Vocabulary) -> String {
        if self.intervals.is_empty() {
            return "{}".to_string();
        }
        let names: Vec<String> = self
            .iter()
            .map(|el| element_name(vocabulary, el))
            .collect();
        if names.len() > 1 {
            format!("{{{}}}", names.join(", "))
        } else {
            names.join("")
        }
    }
}

fn element_name(vocabulary: &Vocabulary, el: i32) -> String {
    match el {
        EOF => "<EOF>".to_string(),
        EPSILON => "<EPSILON>".to_string(),
        _ => vocabulary.display_name(el),
    }
}

impl PartialEq for IntervalSet {
    fn eq(&self, other: &Self) -> bool {
        self.intervals == other.intervals
    }
}

impl Eq for IntervalSet {}

impl Hash for IntervalSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.intervals.hash(state);
    }
}

impl FromIterator<i32> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        Self::from_elements(iter)
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return f.write_str("{}");
        }
        let braces = self.len() > 1;
        if braces {
            f.write_str("{")?;
        }
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if interval.a == interval.b {
                if interval.a == EOF {
                    f.write_str("<EOF>")?;
                } else {
                    write!(f, "{}", interval.a)?;
                }
            } else {
                write!(f, "{}..{}", interval.a, interval.b)?;
            }
        }
        if braces {
            f.write_str("}")?;
        }
        Ok(())
    }
}
