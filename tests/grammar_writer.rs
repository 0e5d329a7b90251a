//! The binary container's round-trip law and its heap-dedup behavior.

use gramforge_core::dfa::table::{DfaEdge, DfaState, DfaTable};
use gramforge_core::lalr::tables::{LrState, LrTable};
use gramforge_core::types::{EntityHandle, GroupId, NonterminalId, TokenSymbolFlags, TokenSymbolId};
use gramforge_core::writer::container::{decode, encode, GrammarImage, GroupRecord, NonterminalRecord, ProductionRecord, SpecialNameRecord, TokenSymbolRecord};

fn trivial_dfa() -> DfaTable {
  DfaTable {
    states: vec![
      DfaState { first_edge: 0, edge_count: 1, accept: None, default_to: None },
      DfaState { first_edge: 1, edge_count: 0, accept: Some(TokenSymbolId::new(1)), default_to: None },
    ],
    edges: vec![DfaEdge { key_from: b'a' as u16, key_to: b'a' as u16, target: 1 }],
  }
}

fn trivial_lalr() -> LrTable {
  LrTable { states: vec![LrState::default()], start_state: 0, is_glr: false }
}

#[test]
fn a_grammar_image_round_trips_byte_for_byte_semantically() {
  let image = GrammarImage {
    name: "demo".into(),
    start: NonterminalId::new(1),
    token_symbols: vec![
      TokenSymbolRecord { name: "a".into(), flags: TokenSymbolFlags { terminal: true, ..Default::default() } },
      TokenSymbolRecord { name: "Whitespace".into(), flags: TokenSymbolFlags { terminal: true, hidden: true, noise: true, generated: true, ..Default::default() } },
    ],
    nonterminals: vec![NonterminalRecord { name: "S".into(), productions: vec![gramforge_core::types::ProductionId::new(1)] }],
    productions: vec![ProductionRecord { head: NonterminalId::new(1), members: vec![EntityHandle::token(TokenSymbolId::new(1))] }],
    groups: vec![],
    dfa_blob: gramforge_core::writer::encode_dfa_blob(&trivial_dfa()),
    lalr_blob: gramforge_core::writer::encode_lalr_blob(&trivial_lalr()),
    is_glr: false,
    special_names: vec![SpecialNameRecord { name: "S".into(), handle: EntityHandle::nonterminal(NonterminalId::new(1)) }],
  };

  let bytes = encode(&image).unwrap();
  let decoded = decode(&bytes).unwrap();
  assert_eq!(image, decoded);
}

#[test]
fn the_dfa_blob_decodes_back_to_its_own_state_and_edge_tables() {
  let dfa = trivial_dfa();
  let blob = gramforge_core::writer::encode_dfa_blob(&dfa);
  let decoded = gramforge_core::writer::decode_dfa_blob(&blob).unwrap();
  assert_eq!(decoded.states.len(), dfa.states.len());
  assert_eq!(decoded.edges.len(), dfa.edges.len());
  assert_eq!(decoded.states[1].accept, Some(TokenSymbolId::new(1)));
  assert_eq!(decoded.edges[0].target, 1);
}

#[test]
fn decode_rejects_a_different_major_version() {
  let image = GrammarImage {
    name: String::new(),
    start: NonterminalId::new(1),
    token_symbols: vec![],
    nonterminals: vec![NonterminalRecord { name: "S".into(), productions: vec![] }],
    productions: vec![],
    groups: vec![],
    dfa_blob: vec![],
    lalr_blob: vec![],
    is_glr: false,
    special_names: vec![],
  };
  let mut bytes = encode(&image).unwrap();
  // Byte 8 is the low byte of the little-endian major version field.
  bytes[8] = bytes[8].wrapping_add(1);
  assert!(decode(&bytes).is_err());
}

#[test]
fn a_grammar_with_nested_groups_round_trips_its_nesting_table() {
  let image = GrammarImage {
    name: "brackets".into(),
    start: NonterminalId::new(1),
    token_symbols: vec![
      TokenSymbolRecord { name: "(".into(), flags: TokenSymbolFlags { terminal: true, hidden: true, group_start: true, ..Default::default() } },
      TokenSymbolRecord { name: ")".into(), flags: TokenSymbolFlags { terminal: true, hidden: true, ..Default::default() } },
      TokenSymbolRecord { name: "Paren".into(), flags: TokenSymbolFlags::default() },
      TokenSymbolRecord { name: "[".into(), flags: TokenSymbolFlags { terminal: true, hidden: true, group_start: true, ..Default::default() } },
      TokenSymbolRecord { name: "]".into(), flags: TokenSymbolFlags { terminal: true, hidden: true, ..Default::default() } },
      TokenSymbolRecord { name: "Bracket".into(), flags: TokenSymbolFlags::default() },
    ],
    nonterminals: vec![NonterminalRecord { name: "S".into(), productions: vec![] }],
    productions: vec![],
    groups: vec![
      // Paren (group 1) nests Bracket (group 2): parens may contain brackets.
      GroupRecord { container: TokenSymbolId::new(3), start: TokenSymbolId::new(1), end: TokenSymbolId::new(2), flags: Default::default(), nesting: vec![GroupId::new(2)] },
      GroupRecord { container: TokenSymbolId::new(6), start: TokenSymbolId::new(4), end: TokenSymbolId::new(5), flags: Default::default(), nesting: vec![] },
    ],
    dfa_blob: vec![],
    lalr_blob: vec![],
    is_glr: false,
    special_names: vec![],
  };
  let bytes = encode(&image).unwrap();
  let decoded = decode(&bytes).unwrap();
  assert_eq!(decoded.groups, image.groups);
  assert_eq!(decoded.groups[0].nesting, vec![GroupId::new(2)]);
}
