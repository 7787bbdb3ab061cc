//! # Analysis
//!
//! Static lookahead computations over an [`Atn`](crate::atn::Atn).
//!
//! ## Overview
//!
//! [`Ll1Analyzer`] walks the automaton from a state and collects the
//! symbols that can be matched next, following epsilon edges, rule calls
//! and (through a [`PredictionContext`](crate::context::PredictionContext))
//! rule returns. It backs [`Atn::next_tokens`](crate::atn::Atn::next_tokens)
//! and per-alternative decision lookahead.

mod lookahead;

pub use lookahead::{HIT_PRED, Ll1Analyzer};
