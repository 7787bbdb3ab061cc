//! Semantic predicate expressions
//!
//! A [`SemanticContext`] is the predicate that gates a configuration. Trees
//! are immutable and shared through `Arc`. `AND`/`OR` nodes keep their
//! operands flattened, de-duplicated and sorted, so structurally equal
//! trees compare and hash equal regardless of the order predicates were
//! combined in.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Callback into the live recognizer used to evaluate predicates.
///
/// `Context` is whatever the driver uses to describe the rule invocation
/// stack (a parse-tree node, a frame pointer, ...). Context-dependent
/// predicates receive the outer context; all others receive `None`.
pub trait PredicateEvaluator {
    type Context: ?Sized;

    /// Evaluate predicate `pred_index` of rule `rule_index`
    fn sempred(&self, ctx: Option<&Self::Context>, rule_index: usize, pred_index: usize) -> bool;

    /// Test whether `precedence` is allowed at the current invocation
    fn precpred(&self, ctx: Option<&Self::Context>, precedence: i32) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticContext {
    /// Trivially true
    None,
    /// A user predicate `{rule_index:pred_index}?`
    Predicate {
        rule_index: usize,
        pred_index: usize,
        ctx_dependent: bool,
    },
    /// A precedence test `{precedence >= p}?` from a left-recursive rule
    Precedence { precedence: i32 },
    /// Conjunction; at least two operands
    And(Vec<Arc<SemanticContext>>),
    /// Disjunction; at least two operands
    Or(Vec<Arc<SemanticContext>>),
}

impl SemanticContext {
    /// The shared trivially-true context
    #[must_use]
    pub fn none() -> &'static Arc<Self> {
        static NONE: OnceLock<Arc<SemanticContext>> = OnceLock::new();
        NONE.get_or_init(|| Arc::new(Self::None))
    }

    #[must_use]
    pub fn predicate(rule_index: usize, pred_index: usize, ctx_dependent: bool) -> Arc<Self> {
        Arc::new(Self::Predicate {
            rule_index,
            pred_index,
            ctx_dependent,
        })
    }

    #[must_use]
    pub fn precedence(precedence: i32) -> Arc<Self> {
        Arc::new(Self::Precedence { precedence })
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Operands of an `AND`/`OR` node; empty for leaves
    #[must_use]
    pub fn operands(&self) -> &[Arc<Self>] {
        match self {
            Self::And(operands) | Self::Or(operands) => operands,
            _ => &[],
        }
    }

    /// Combine two contexts with `&&`.
    ///
    /// The trivially-true context is the identity. Nested conjunctions are
    /// flattened and several precedence predicates collapse to the one with
    /// the lowest precedence, the only one that can fail last.
    #[must_use]
    pub fn and(a: &Arc<Self>, b: &Arc<Self>) -> Arc<Self> {
        if a.is_none() {
            return b.clone();
        }
        if b.is_none() {
            return a.clone();
        }
        let mut operands = BTreeSet::new();
        for context in [a, b] {
            match &**context {
                Self::And(inner) => operands.extend(inner.iter().cloned()),
                _ => {
                    operands.insert(context.clone());
                }
            }
        }
        let reduced = reduce_precedence(&mut operands, Iterator::min);
        Self::combined(operands, reduced, Self::And)
    }

    /// Combine two contexts with `||`.
    ///
    /// The trivially-true context absorbs everything. Several precedence
    /// predicates collapse to the one with the highest precedence.
    #[must_use]
    pub fn or(a: &Arc<Self>, b: &Arc<Self>) -> Arc<Self> {
        if a.is_none() || b.is_none() {
            return Self::none().clone();
        }
        let mut operands = BTreeSet::new();
        for context in [a, b] {
            match &**context {
                Self::Or(inner) => operands.extend(inner.iter().cloned()),
                _ => {
                    operands.insert(context.clone());
                }
            }
        }
        let reduced = reduce_precedence(&mut operands, Iterator::max);
        Self::combined(operands, reduced, Self::Or)
    }

    fn combined(
        mut operands: BTreeSet<Arc<Self>>,
        reduced: Option<i32>,
        make: fn(Vec<Arc<Self>>) -> Self,
    ) -> Arc<Self> {
        if let Some(precedence) = reduced {
            operands.insert(Self::precedence(precedence));
        }
        if operands.len() == 1 {
            if let Some(only) = operands.pop_first() {
                return only;
            }
        }
        Arc::new(make(operands.into_iter().collect()))
    }

    /// Evaluate the predicate tree.
    ///
    /// Operands are evaluated left to right with short-circuiting; the
    /// order is the canonical operand order, not the order the predicates
    /// were written in.
    pub fn eval<E: PredicateEvaluator + ?Sized>(
        &self,
        evaluator: &E,
        outer: Option<&E::Context>,
    ) -> bool {
        match self {
            Self::None => true,
            Self::Predicate {
                rule_index,
                pred_index,
                ctx_dependent,
            } => {
                let local = if *ctx_dependent { outer } else { None };
                evaluator.sempred(local, *rule_index, *pred_index)
            }
            Self::Precedence { precedence } => evaluator.precpred(outer, *precedence),
            Self::And(operands) => operands.iter().all(|op| op.eval(evaluator, outer)),
            Self::Or(operands) => operands.iter().any(|op| op.eval(evaluator, outer)),
        }
    }

    /// Resolve the precedence predicates in this tree.
    ///
    /// Returns `None` when the tree is now known to be false, the
    /// trivially-true context when it is known to be true, `self` when
    /// nothing changed, and otherwise the simplified residual tree.
    pub fn eval_precedence<E: PredicateEvaluator + ?Sized>(
        self: &Arc<Self>,
        evaluator: &E,
        outer: Option<&E::Context>,
    ) -> Option<Arc<Self>> {
        match &**self {
            Self::None | Self::Predicate { .. } => Some(self.clone()),
            Self::Precedence { precedence } => evaluator
                .precpred(outer, *precedence)
                .then(|| Self::none().clone()),
            Self::And(operands) => {
                let mut differs = false;
                let mut remaining = Vec::with_capacity(operands.len());
                for operand in operands {
                    let evaluated = operand.eval_precedence(evaluator, outer)?;
                    differs |= !Arc::ptr_eq(&evaluated, operand);
                    if !evaluated.is_none() {
                        remaining.push(evaluated);
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                let mut iter = remaining.into_iter();
                let first = iter.next().unwrap_or_else(|| Self::none().clone());
                Some(iter.fold(first, |acc, op| Self::and(&acc, &op)))
            }
            Self::Or(operands) => {
                let mut differs = false;
                let mut remaining = Vec::with_capacity(operands.len());
                for operand in operands {
                    let evaluated = operand.eval_precedence(evaluator, outer);
                    differs |= !evaluated
                        .as_ref()
                        .is_some_and(|evaluated| Arc::ptr_eq(evaluated, operand));
                    match evaluated {
                        Some(evaluated) if evaluated.is_none() => return Some(evaluated),
                        Some(evaluated) => remaining.push(evaluated),
                        None => {}
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                let mut iter = remaining.into_iter();
                let first = iter.next()?;
                Some(iter.fold(first, |acc, op| Self::or(&acc, &op)))
            }
        }
    }
}

/// Pull every precedence predicate out of `operands`, returning the one
/// precedence `pick` selects
fn reduce_precedence(
    operands: &mut BTreeSet<Arc<SemanticContext>>,
    pick: fn(std::vec::IntoIter<i32>) -> Option<i32>,
) -> Option<i32> {
    let mut precedences = Vec::new();
    operands.retain(|op| match **op {
        SemanticContext::Precedence { precedence } => {
            precedences.push(precedence);
            false
        }
        _ => true,
    });
    pick(precedences.into_iter())
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("{true}?"),
            Self::Predicate {
                rule_index,
                pred_index,
                ..
            } => write!(f, "{{{rule_index}:{pred_index}}}?"),
            Self::Precedence { precedence } => write!(f, "{{{precedence}>=prec}}?"),
            Self::And(operands) | Self::Or(operands) => {
                let separator = if matches!(self, Self::And(_)) { "&&" } else { "||" };
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(separator)?;
                    }
                    write!(f, "{operand}")?;
                }
                Ok(())
            }
        }
    }
}
