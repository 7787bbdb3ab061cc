//! Tests for DFA state publication, shared edges and serialization

use allstar::atn::{Atn, AtnBuilder, AtnType, StateKind, Transition};
use allstar::config::{AtnConfig, AtnConfigSet};
use allstar::context::{EMPTY_FULL_STATE_KEY, PredictionContext, PredictionContextCache};
use allstar::dfa::{AcceptStateInfo, Dfa, DfaSerializer, DfaState, PredPrediction};
use allstar::semantic::SemanticContext;
use allstar::token::Vocabulary;
use std::sync::Arc;
use std::thread;

/// `r : ID | PLUS | MINUS ;`
fn parser_atn() -> Atn {
    let mut builder = AtnBuilder::new(AtnType::Parser, 3);
    let (start, stop) = builder.add_rule();
    let block = builder.add_state(0, StateKind::Basic);
    let end = builder.add_state(0, StateKind::Basic);
    builder
        .add_transition(start, Transition::epsilon(block))
        .add_transition(block, Transition::atom(end, 1))
        .add_transition(block, Transition::atom(end, 2))
        .add_transition(block, Transition::atom(end, 3))
        .add_transition(end, Transition::epsilon(stop));
    builder.add_decision(block);
    builder.build().unwrap()
}

fn vocabulary() -> Vocabulary {
    Vocabulary::from_symbolic(&["", "ID", "PLUS", "MINUS"])
}

fn config_set(entries: &[(usize, u32)]) -> AtnConfigSet {
    let mut cache = PredictionContextCache::new();
    let mut configs = AtnConfigSet::new();
    for &(state, alt) in entries {
        configs
            .add(
                AtnConfig::new(state, alt, PredictionContext::empty_local().clone()),
                &mut cache,
            )
            .unwrap();
    }
    configs
}

fn accept_state(dfa: &Dfa, state: usize, alt: u32) -> Arc<DfaState> {
    let mut accept = DfaState::new(dfa, config_set(&[(state, alt)]));
    accept.set_accept_state_info(Some(AcceptStateInfo::new(alt)));
    dfa.add_state(accept)
}

#[test]
fn test_equal_config_sets_share_a_state() {
    let atn = parser_atn();
    let dfa = atn.dfa(0);

    let forward = DfaState::new(dfa, config_set(&[(3, 1), (4, 2), (5, 1)]));
    let backward = DfaState::new(dfa, config_set(&[(5, 1), (4, 2), (3, 1)]));
    assert_eq!(forward, backward);

    let first = dfa.add_state(forward);
    let second = dfa.add_state(backward);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.state_number(), first.state_number());
    assert_eq!(dfa.len(), 1);
}

#[test]
fn test_state_numbers_increase() {
    let atn = parser_atn();
    let dfa = atn.dfa(0);
    let numbers: Vec<i32> = (0..4)
        .map(|state| {
            dfa.add_state(DfaState::new(dfa, config_set(&[(state, 1)])))
                .state_number()
        })
        .collect();
    assert_eq!(numbers, vec![0, 1, 2, 3]);
    let listed: Vec<i32> = dfa.states().iter().map(|s| s.state_number()).collect();
    assert_eq!(listed, numbers);
}

#[test]
fn test_concurrent_publication_yields_one_state() {
    let atn = parser_atn();
    let dfa = atn.dfa(0);

    let published: Vec<Arc<DfaState>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| dfa.add_state(DfaState::new(dfa, config_set(&[(2, 1), (3, 2)]))))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for state in &published[1..] {
        assert!(Arc::ptr_eq(state, &published[0]));
    }
    assert_eq!(dfa.len(), 1);
    assert_eq!(published[0].state_number(), 0);
}

#[test]
fn test_concurrent_edges_are_not_lost() {
    let mut builder = AtnBuilder::new(AtnType::Lexer, 127);
    let tokens = builder.add_state(0, StateKind::TokenStart);
    let (start, stop) = builder.add_rule();
    builder
        .add_transition(tokens, Transition::epsilon(start))
        .add_transition(start, Transition::atom(stop, i32::from(b'a')));
    builder.add_mode(tokens);
    let atn = builder.build().unwrap();
    let dfa = atn.mode_dfa(0);

    let source = dfa.add_state(DfaState::new(dfa, config_set(&[(tokens, 1)])));
    let target = accept_state(dfa, stop, 1);

    thread::scope(|scope| {
        for worker in 0..4 {
            let source = &source;
            let target = &target;
            scope.spawn(move || {
                for symbol in (worker..64).step_by(4) {
                    source.set_target(symbol, target.clone());
                }
            });
        }
    });

    assert_eq!(source.edge_map().len(), 64);
    for symbol in 0..64 {
        assert!(Arc::ptr_eq(&source.target(symbol).unwrap(), &target));
    }
    assert!(source.target(100).is_none());
}

#[test]
fn test_serializer_renders_edges_and_accept_states() {
    let atn = parser_atn();
    let dfa = atn.dfa(0);
    let vocabulary = vocabulary();
    assert_eq!(dfa.to_string_with(&vocabulary), None);

    let s0 = dfa.add_state(DfaState::new(dfa, config_set(&[(2, 1), (2, 2)])));
    dfa.set_s0(Some(s0.clone())).unwrap();
    assert_eq!(dfa.to_string_with(&vocabulary), None);

    let s1 = accept_state(dfa, 3, 1);
    let s2 = accept_state(dfa, 3, 2);
    s0.set_target(1, s1);
    s0.set_target(2, s2);
    s0.set_target(3, dfa.error_state().clone());

    assert_eq!(
        dfa.to_string_with(&vocabulary).unwrap(),
        "s0-ID->:s1=>1\ns0-PLUS->:s2=>2\n"
    );
    assert_eq!(
        DfaSerializer::new(dfa, &vocabulary).to_string(),
        "s0-ID->:s1=>1\ns0-PLUS->:s2=>2\n"
    );
}

#[test]
fn test_serializer_renders_context_edges() {
    let atn = parser_atn();
    let dfa = atn.dfa(0);
    let vocabulary = vocabulary();

    let s0 = dfa.add_state(DfaState::new(dfa, config_set(&[(2, 1), (2, 2)])));
    dfa.set_s0(Some(s0.clone())).unwrap();
    let s1 = accept_state(dfa, 3, 1);

    s0.set_context_sensitive();
    s0.set_context_symbol(3).unwrap();
    s0.set_target(1, s1.clone());
    s0.set_target(3, dfa.error_state().clone());
    s0.set_context_target(2, s1.clone()).unwrap();
    s0.set_context_target(EMPTY_FULL_STATE_KEY, s1).unwrap();

    let rule_names = ["r"];
    let rendered = DfaSerializer::new(dfa, &vocabulary)
        .with_rule_names(&atn, &rule_names)
        .serialize()
        .unwrap();
    assert_eq!(
        rendered,
        "s0*-ID->:s1=>1\n\
         s0*-MINUS->!ctx\n\
         s0*-ctx:2(r)->:s1=>1\n\
         s0*-ctx:EMPTY_FULL->:s1=>1\n"
    );
}

#[test]
fn test_serializer_renders_predicates() {
    let atn = parser_atn();
    let dfa = atn.dfa(0);

    let s0 = dfa.add_state(DfaState::new(dfa, config_set(&[(2, 1), (2, 2)])));
    dfa.set_s0(Some(s0.clone())).unwrap();
    let mut guarded = DfaState::new(dfa, config_set(&[(3, 1), (3, 2)]));
    guarded.set_accept_state_info(Some(AcceptStateInfo::new(1)));
    guarded.set_predicates(Some(vec![
        PredPrediction {
            pred: SemanticContext::predicate(0, 0, false),
            alt: 1,
        },
        PredPrediction {
            pred: SemanticContext::none().clone(),
            alt: 2,
        },
    ]));
    let guarded = dfa.add_state(guarded);
    s0.set_target(1, guarded);

    assert_eq!(
        dfa.to_string_with(&Vocabulary::empty()).unwrap(),
        "s0-1->:s1=>[({0:0}?, 1), ({true}?, 2)]\n"
    );
}

#[test]
fn test_lexer_serializer_quotes_characters() {
    let mut builder = AtnBuilder::new(AtnType::Lexer, 127);
    let tokens = builder.add_state(0, StateKind::TokenStart);
    let (start, stop) = builder.add_rule();
    builder
        .add_transition(tokens, Transition::epsilon(start))
        .add_transition(start, Transition::atom(stop, i32::from(b'a')));
    builder.add_mode(tokens);
    let atn = builder.build().unwrap();
    let dfa = atn.mode_dfa(0);

    let s0 = dfa.add_state(DfaState::new(dfa, config_set(&[(tokens, 1)])));
    dfa.set_s0(Some(s0.clone())).unwrap();
    s0.set_target(i32::from(b'a'), accept_state(dfa, stop, 1));

    assert_eq!(dfa.to_lexer_string().unwrap(), "s0-'a'->:s1=>1\n");
}

#[test]
fn test_clear_dfa_forgets_states() {
    let atn = parser_atn();
    let dfa = atn.dfa(0);
    let s0 = dfa.add_state(DfaState::new(dfa, config_set(&[(2, 1)])));
    dfa.set_s0(Some(s0)).unwrap();
    dfa.set_s0_full(None).unwrap();
    assert!(!dfa.is_empty());

    atn.clear_dfa();
    assert!(dfa.is_empty());
    assert_eq!(dfa.len(), 0);
    let fresh = dfa.add_state(DfaState::new(dfa, config_set(&[(3, 1)])));
    assert_eq!(fresh.state_number(), 0);
}
