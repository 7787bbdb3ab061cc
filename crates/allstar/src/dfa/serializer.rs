use super::{Dfa, DfaState};
use crate::atn::Atn;
use crate::context::{EMPTY_FULL_STATE_KEY, EMPTY_LOCAL_STATE_KEY};
use crate::token::Vocabulary;
use std::fmt::{self, Write};

#[derive(Debug, Clone, Copy)]
enum EdgeLabels<'a> {
    Tokens(&'a Vocabulary),
    Characters,
}

/// Text rendering of a [`Dfa`], one edge per line.
///
/// ```text
/// s0-ID->:s1=>2
/// s0-'('->s2*
/// s2*-ctx:7(expr)->:s3=>1
/// ```
///
/// A state is written `sN`, or `:sN=>alt` (`:sN=>[preds]` with
/// predicates) when it accepts. A `*` marks a context-sensitive state and
/// a second `*` one whose configurations reach into the outer context.
/// Edges on context symbols are written `->!`. Edges to the error state
/// are omitted unless the symbol is a context symbol, in which case the
/// target is written `ctx`.
#[derive(Debug, Clone, Copy)]
pub struct DfaSerializer<'a> {
    dfa: &'a Dfa,
    labels: EdgeLabels<'a>,
    atn: Option<&'a Atn>,
    rule_names: &'a [&'a str],
}

impl<'a> DfaSerializer<'a> {
    /// A serializer labelling edges with token display names
    #[must_use]
    pub const fn new(dfa: &'a Dfa, vocabulary: &'a Vocabulary) -> Self {
        Self {
            dfa,
            labels: EdgeLabels::Tokens(vocabulary),
            atn: None,
            rule_names: &[],
        }
    }

    /// A serializer labelling edges with quoted characters
    #[must_use]
    pub const fn lexer(dfa: &'a Dfa) -> Self {
        Self {
            dfa,
            labels: EdgeLabels::Characters,
            atn: None,
            rule_names: &[],
        }
    }

    /// Name the rule of each invoking state on context edges
    #[must_use]
    pub const fn with_rule_names(mut self, atn: &'a Atn, rule_names: &'a [&'a str]) -> Self {
        self.atn = Some(atn);
        self.rule_names = rule_names;
        self
    }

    /// The rendering, or `None` if the DFA has no start state or no edges
    #[must_use]
    pub fn serialize(&self) -> Option<String> {
        self.dfa.s0()?;
        let mut out = String::new();
        for state in self.dfa.states() {
            self.write_state(&mut out, &state).ok()?;
        }
        if out.is_empty() { None } else { Some(out) }
    }

    fn write_state(&self, out: &mut String, state: &DfaState) -> fmt::Result {
        let source = self.state_string(state);
        for (symbol, target) in state.edge_map() {
            let context_symbol = state.is_context_symbol(symbol);
            if target.is_error() && !context_symbol {
                continue;
            }
            write!(out, "{source}-{}->", self.edge_label(symbol))?;
            if context_symbol {
                out.push('!');
            }
            if target.is_error() {
                out.push_str("ctx\n");
            } else {
                writeln!(out, "{}", self.state_string(&target))?;
            }
        }
        if state.is_context_sensitive() {
            for (invoking_state, target) in state.context_edge_map() {
                writeln!(
                    out,
                    "{source}-{}->{}",
                    self.context_label(invoking_state),
                    self.state_string(&target)
                )?;
            }
        }
        Ok(())
    }

    fn state_string(&self, state: &DfaState) -> String {
        if state.is_error() {
            return "ERROR".to_owned();
        }
        let number = state.state_number();
        let mut text = if state.is_accept_state() {
            match state.predicates() {
                Some(predicates) => {
                    let rendered: Vec<String> =
                        predicates.iter().map(ToString::to_string).collect();
                    format!(":s{number}=>[{}]", rendered.join(", "))
                }
                None => format!(":s{number}=>{}", state.prediction()),
            }
        } else {
            format!("s{number}")
        };
        if state.is_context_sensitive() {
            text.push('*');
            if state
                .configs()
                .iter()
                .any(|config| config.reaches_into_outer_context())
            {
                text.push('*');
            }
        }
        text
    }

    fn edge_label(&self, symbol: i32) -> String {
        match self.labels {
            EdgeLabels::Tokens(vocabulary) => vocabulary.display_name(symbol),
            EdgeLabels::Characters => u32::try_from(symbol)
                .ok()
                .and_then(char::from_u32)
                .map_or_else(|| symbol.to_string(), |c| format!("'{c}'")),
        }
    }

    fn context_label(&self, invoking_state: i32) -> String {
        match invoking_state {
            EMPTY_FULL_STATE_KEY => return "ctx:EMPTY_FULL".to_owned(),
            EMPTY_LOCAL_STATE_KEY => return "ctx:EMPTY_LOCAL".to_owned(),
            _ => {}
        }
        let rule_name = self.atn.and_then(|atn| {
            let state = atn.states().get(usize::try_from(invoking_state).ok()?)?;
            self.rule_names.get(state.rule_index())
        });
        match rule_name {
            Some(name) => format!("ctx:{invoking_state}({name})"),
            None => format!("ctx:{invoking_state}"),
        }
    }
}

impl fmt::Display for DfaSerializer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize().unwrap_or_default())
    }
}
