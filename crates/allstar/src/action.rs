//! Lexer actions carried by lexer configurations and accept states

use crate::hash::content_hash;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One command a lexer rule runs when its token is matched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexerAction {
    Channel(i32),
    Custom {
        rule_index: usize,
        action_index: usize,
    },
    Mode(usize),
    More,
    PopMode,
    PushMode(usize),
    Skip,
    Type(i32),
    /// A position-dependent action pinned to `offset` characters past the
    /// token start
    Indexed {
        offset: usize,
        action: Box<LexerAction>,
    },
}

impl LexerAction {
    /// Whether the action reads the input position when it runs
    #[must_use]
    pub const fn is_position_dependent(&self) -> bool {
        matches!(self, Self::Custom { .. } | Self::Indexed { .. })
    }

    fn execute<H: LexerActionHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            Self::Channel(channel) => handler.set_channel(*channel),
            Self::Custom {
                rule_index,
                action_index,
            } => handler.custom_action(*rule_index, *action_index),
            Self::Mode(mode) => handler.set_mode(*mode),
            Self::More => handler.more(),
            Self::PopMode => handler.pop_mode(),
            Self::PushMode(mode) => handler.push_mode(*mode),
            Self::Skip => handler.skip(),
            Self::Type(token_type) => handler.set_type(*token_type),
            Self::Indexed { action, .. } => action.execute(handler),
        }
    }
}

impl fmt::Display for LexerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(channel) => write!(f, "channel({channel})"),
            Self::Custom {
                rule_index,
                action_index,
            } => write!(f, "custom({rule_index}:{action_index})"),
            Self::Mode(mode) => write!(f, "mode({mode})"),
            Self::More => f.write_str("more"),
            Self::PopMode => f.write_str("popMode"),
            Self::PushMode(mode) => write!(f, "pushMode({mode})"),
            Self::Skip => f.write_str("skip"),
            Self::Type(token_type) => write!(f, "type({token_type})"),
            Self::Indexed { offset, action } => write!(f, "{action}@{offset}"),
        }
    }
}

/// The lexer a [`LexerActionExecutor`] runs against
pub trait LexerActionHandler {
    fn skip(&mut self);
    fn more(&mut self);
    fn set_type(&mut self, token_type: i32);
    fn set_channel(&mut self, channel: i32);
    fn set_mode(&mut self, mode: usize);
    fn push_mode(&mut self, mode: usize);
    fn pop_mode(&mut self);
    fn custom_action(&mut self, rule_index: usize, action_index: usize);

    /// Current position in the character stream
    fn index(&self) -> usize;

    /// Move the character stream to `index`
    fn seek(&mut self, index: usize);
}

/// The ordered actions to run when a lexer DFA state accepts
#[derive(Debug, Clone)]
pub struct LexerActionExecutor {
    actions: Box<[LexerAction]>,
    hash: u64,
}

impl LexerActionExecutor {
    #[must_use]
    pub fn new(actions: Vec<LexerAction>) -> Self {
        let hash = content_hash(&actions);
        Self {
            actions: actions.into_boxed_slice(),
            hash,
        }
    }

    #[must_use]
    pub fn actions(&self) -> &[LexerAction] {
        &self.actions
    }

    /// `executor` followed by `action`; a fresh executor when there is none
    #[must_use]
    pub fn append(executor: Option<&Self>, action: LexerAction) -> Arc<Self> {
        let mut actions = executor.map_or_else(Vec::new, |e| e.actions.to_vec());
        actions.push(action);
        Arc::new(Self::new(actions))
    }

    /// Pin every position-dependent action to `offset` past the token start.
    ///
    /// Used when a lexer configuration passes an action before the end of
    /// the token is known. Returns `self` when nothing needs pinning.
    #[must_use]
    pub fn fix_offset_before_match(self: &Arc<Self>, offset: usize) -> Arc<Self> {
        let needs_fix = |action: &LexerAction| {
            action.is_position_dependent() && !matches!(action, LexerAction::Indexed { .. })
        };
        if !self.actions.iter().any(needs_fix) {
            return self.clone();
        }
        let actions = self
            .actions
            .iter()
            .map(|action| {
                if needs_fix(action) {
                    LexerAction::Indexed {
                        offset,
                        action: Box::new(action.clone()),
                    }
                } else {
                    action.clone()
                }
            })
            .collect();
        Arc::new(Self::new(actions))
    }

    /// Run every action against `handler`.
    ///
    /// `start_index` is where the token began. Pinned actions run with the
    /// input positioned at their offset, other position-dependent actions
    /// at the end of the token, and the stream is left at the end of the
    /// token afterwards.
    pub fn execute<H: LexerActionHandler + ?Sized>(&self, handler: &mut H, start_index: usize) {
        let stop_index = handler.index();
        let mut requires_seek = false;
        for action in self.actions.iter() {
            match action {
                LexerAction::Indexed { offset, .. } => {
                    let position = start_index + offset;
                    handler.seek(position);
                    requires_seek = position != stop_index;
                }
                _ if action.is_position_dependent() => {
                    handler.seek(stop_index);
                    requires_seek = false;
                }
                _ => {}
            }
            action.execute(handler);
        }
        if requires_seek {
            handler.seek(stop_index);
        }
    }
}

impl PartialEq for LexerActionExecutor {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.actions == other.actions
    }
}

impl Eq for LexerActionExecutor {}

impl Hash for LexerActionExecutor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for LexerActionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{action}")?;
        }
        f.write_str("]")
    }
}
