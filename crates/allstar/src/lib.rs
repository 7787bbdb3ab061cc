//! # Allstar
//!
//! The shared data structures behind adaptive LL(*) prediction.
//!
//! ## Overview
//!
//! A recognizer that predicts alternatives by simulating an augmented
//! transition network needs a handful of structures that are shared across
//! threads and reused across inputs. This crate provides them:
//!
//! - **Automaton**: [`atn::Atn`], its states and transitions, assembled
//!   with [`atn::AtnBuilder`]
//! - **Prediction contexts**: [`context::PredictionContext`], a
//!   graph-structured call stack with merging, suffix appending and
//!   interning through [`context::PredictionContextCache`] and
//!   [`context::SharedContextCache`]
//! - **Configurations**: [`config::AtnConfig`] and the merging
//!   [`config::AtnConfigSet`]
//! - **Semantic contexts**: [`semantic::SemanticContext`], the predicate
//!   expressions guarding configurations
//! - **DFA cache**: [`dfa::Dfa`] and [`dfa::DfaState`], with density-tiered
//!   [`dfa::EdgeMap`]s and a text [`dfa::DfaSerializer`]
//! - **Lookahead analysis**: [`analysis::Ll1Analyzer`]
//! - **Lexer actions**: [`action::LexerActionExecutor`]
//!
//! The prediction loop itself (closure, reach and conflict resolution)
//! lives in the recognizer built on top of these pieces.
//!
//! ## Quick Start
//!
//! ```rust
//! use allstar::atn::{AtnBuilder, AtnType, StateKind, Transition};
//! use allstar::config::{AtnConfig, AtnConfigSet};
//! use allstar::context::{PredictionContext, PredictionContextCache};
//! use allstar::dfa::DfaState;
//!
//! // s : a A | a B ;  a : C ;
//! let mut builder = AtnBuilder::new(AtnType::Parser, 3);
//! let (s_start, s_stop) = builder.add_rule();
//! let (a_start, a_stop) = builder.add_rule();
//! let call_1 = builder.add_state(0, StateKind::Basic);
//! let call_2 = builder.add_state(0, StateKind::Basic);
//! let after_1 = builder.add_state(0, StateKind::Basic);
//! let after_2 = builder.add_state(0, StateKind::Basic);
//! builder
//!     .add_transition(s_start, Transition::epsilon(call_1))
//!     .add_transition(s_start, Transition::epsilon(call_2))
//!     .add_transition(call_1, Transition::rule(a_start, 1, after_1))
//!     .add_transition(call_2, Transition::rule(a_start, 1, after_2))
//!     .add_transition(after_1, Transition::atom(s_stop, 1))
//!     .add_transition(after_2, Transition::atom(s_stop, 2))
//!     .add_transition(a_start, Transition::atom(a_stop, 3));
//! let decision = builder.add_decision(s_start);
//! let atn = builder.build().unwrap();
//!
//! // Both alternatives enter `a`; their return addresses differ.
//! let mut cache = PredictionContextCache::new();
//! let empty = PredictionContext::empty_full();
//! let ret_1 = PredictionContext::singleton(empty.clone(), after_1 as i32);
//! let ret_2 = PredictionContext::singleton(empty.clone(), after_2 as i32);
//!
//! let mut configs = AtnConfigSet::new();
//! configs.add(AtnConfig::new(a_start, 1, ret_1), &mut cache).unwrap();
//! configs.add(AtnConfig::new(a_start, 2, ret_2), &mut cache).unwrap();
//! assert_eq!(configs.len(), 2);
//!
//! // Memoize the configuration set as a DFA state.
//! let dfa = atn.dfa(decision);
//! let state = dfa.add_state(DfaState::new(dfa, configs));
//! assert_eq!(state.state_number(), 0);
//! assert!(state.configs().is_read_only());
//! ```
//!
//! ## Feature Flags
//!
//! - `serialize`: serde support for options, intervals and grammar types
//! - `diagnostics`: `miette` diagnostics for [`AtnError`]

pub mod action;
pub mod analysis;
pub mod atn;
pub mod config;
pub mod context;
pub mod dfa;
pub mod error;
mod hash;
pub mod interval;
pub mod options;
pub mod semantic;
pub mod token;

pub use error::{AtnError, Result};
pub use options::AtnOptions;
