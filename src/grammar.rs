//! Orchestration (spec §4.7): turns a normalized [`GrammarDefinition`] into a
//! serialized [`writer::GrammarImage`], driving the DFA and LALR builders
//! and collecting diagnostics along the way.

use crate::dfa::{self, TerminalRegex};
use crate::lalr::{self, items::Grammar as LalrGrammar};
use crate::options::{BuilderOptions, GlobalGrammarOptions};
use crate::regex::{CharRange, Regex};
use crate::types::{
  DiagnosticSink, EntityHandle, GramforgeError, GramforgeResult, Group, GroupFlags, GroupId, Map, Nonterminal, NonterminalId, Production, ProductionId, TokenSymbol,
  TokenSymbolFlags, TokenSymbolId,
};
use crate::writer::{self, GrammarImage};

/// One terminal awaiting registration: a name plus the regex that matches it.
pub struct TerminalDef {
  pub name:  String,
  pub regex: Regex,
}

/// A production member, resolved against terminal/nonterminal names at build
/// time rather than by handle, so callers never juggle arena indices.
pub enum MemberRef {
  Terminal(String),
  Nonterminal(String),
}

pub struct ProductionDef {
  pub members:          Vec<MemberRef>,
  pub precedence_token: Option<u32>,
}

pub struct NonterminalDef {
  pub name:        String,
  pub productions: Vec<ProductionDef>,
}

/// A lexical bracket pair: `start_literal .. end_literal`, subsumed into one
/// token identified by `container_name` (spec §3, §4.7 step 3).
pub struct GroupDef {
  pub container_name: String,
  pub start_literal:  String,
  pub end_literal:    String,
  pub flags:          GroupFlags,
  /// Container names of other groups that may nest inside this one (spec
  /// §3, "optional nesting list"), resolved to `GroupId`s once every group
  /// in the definition has been registered.
  pub nesting:        Vec<String>,
}

/// The normalized grammar the orchestrator consumes; the external fluent
/// builder API that produces one is out of scope (spec §1).
pub struct GrammarDefinition {
  pub terminals:    Vec<TerminalDef>,
  pub nonterminals: Vec<NonterminalDef>,
  pub groups:       Vec<GroupDef>,
  /// Names (terminal or nonterminal) exposed to external tools through the
  /// SpecialName table (spec §3, "a unique mapping string -> EntityHandle").
  pub special_names: Vec<String>,
  pub options:      GlobalGrammarOptions,
  pub start:        String,
}

/// Registers token symbols and resolves name references to handles as the
/// orchestration steps run (spec §4.7 steps 2-6).
#[derive(Default)]
struct SymbolTable {
  token_symbols: Vec<TokenSymbol>,
  by_name:       Map<String, TokenSymbolId>,
  regex_bearing: Vec<TerminalRegex>,
}

impl SymbolTable {
  /// Registers `name` with `regex`, reusing an existing token symbol of the
  /// same name (spec §4.7 step 3, "deduplicate group-end literals"; spec §8
  /// scenario 6 extends this to any repeated literal, not just group ends).
  fn intern(&mut self, name: &str, regex: Regex, flags: TokenSymbolFlags) -> TokenSymbolId {
    if let Some(&existing) = self.by_name.get(name) {
      return existing;
    }
    let id = TokenSymbolId::new(self.token_symbols.len() as u32 + 1);
    self.token_symbols.push(TokenSymbol { id, name: name.to_string(), regex: regex.clone(), flags });
    self.by_name.insert(name.to_string(), id);
    if flags.terminal {
      self.regex_bearing.push(TerminalRegex { token: id, regex });
    }
    id
  }

  /// Registers a group container token, which has no regex of its own: it
  /// is only ever produced by the group mechanism closing over its delimiters.
  fn intern_container(&mut self, name: &str) -> TokenSymbolId {
    if let Some(&existing) = self.by_name.get(name) {
      return existing;
    }
    let id = TokenSymbolId::new(self.token_symbols.len() as u32 + 1);
    self.token_symbols.push(TokenSymbol { id, name: name.to_string(), regex: Regex::void(), flags: TokenSymbolFlags::default() });
    self.by_name.insert(name.to_string(), id);
    id
  }
}

fn whitespace_regex(exclude_newline: bool) -> GramforgeResult<Regex> {
  let ranges = if exclude_newline {
    vec![CharRange::new(' ' as u16, ' ' as u16), CharRange::new('\t' as u16, '\t' as u16), CharRange::new('\r' as u16, '\r' as u16)]
  } else {
    vec![CharRange::new(' ' as u16, ' ' as u16), CharRange::new('\t' as u16, '\t' as u16), CharRange::new('\r' as u16, '\r' as u16), CharRange::new('\n' as u16, '\n' as u16)]
  };
  Regex::repeat(1, crate::regex::UNBOUNDED, Regex::one_of(ranges)?)
}

fn noise_flags() -> TokenSymbolFlags {
  TokenSymbolFlags { terminal: true, hidden: true, noise: true, generated: true, ..Default::default() }
}

fn literal_regex(text: &str, case_sensitive: bool) -> Regex {
  let literal = Regex::literal(text);
  if case_sensitive {
    literal
  } else {
    literal.case_insensitive()
  }
}

/// Runs the full pipeline from a [`GrammarDefinition`] to a serialized
/// binary grammar image (spec §4.7).
pub fn build_grammar(def: &GrammarDefinition, builder_options: &BuilderOptions, diagnostics: &mut DiagnosticSink) -> GramforgeResult<Vec<u8>> {
  let image = build_grammar_image(def, builder_options, diagnostics)?;
  writer::write(&image)
}

/// As [`build_grammar`], but returns the pre-serialization [`GrammarImage`]
/// for callers that want to inspect or re-encode it.
pub fn build_grammar_image(def: &GrammarDefinition, builder_options: &BuilderOptions, diagnostics: &mut DiagnosticSink) -> GramforgeResult<GrammarImage> {
  diagnostics.info(format!("building started: {}", def.options.grammar_name));
  check_cancelled(builder_options)?;

  let mut symbols = SymbolTable::default();

  // Step 2: register terminals. The terminal-ordering invariant (spec §3)
  // holds automatically: every later step only ever registers non-terminal
  // (group/noise) token symbols.
  for terminal in &def.terminals {
    symbols.intern(&terminal.name, terminal.regex.clone(), TokenSymbolFlags { terminal: true, ..Default::default() });
  }

  // Step 3: groups. A group's nesting list may name a container declared
  // later in `def.groups`, so registration and nesting resolution run as
  // two passes over the same group set.
  let mut groups: Vec<Group> = Vec::new();
  let mut group_by_container: Map<String, GroupId> = Map::new();
  for group_def in &def.groups {
    let start = symbols.intern(
      &group_def.start_literal,
      literal_regex(&group_def.start_literal, def.options.case_sensitive),
      TokenSymbolFlags { terminal: true, hidden: true, group_start: true, ..Default::default() },
    );
    let end = symbols.intern(
      &group_def.end_literal,
      literal_regex(&group_def.end_literal, def.options.case_sensitive),
      TokenSymbolFlags { terminal: true, hidden: true, ..Default::default() },
    );
    let container = symbols.intern_container(&group_def.container_name);
    let id = GroupId::new(groups.len() as u32 + 1);
    group_by_container.insert(group_def.container_name.clone(), id);
    groups.push(Group { id, container, start, end, flags: group_def.flags, nesting: Vec::new() });
  }
  for (group_def, group) in def.groups.iter().zip(groups.iter_mut()) {
    for nested_name in &group_def.nesting {
      let nested_id = group_by_container
        .get(nested_name)
        .copied()
        .ok_or_else(|| GramforgeError::IncompleteGrammarDefinition(format!("group `{}` nests unknown group `{nested_name}`", group_def.container_name)))?;
      group.nesting.push(nested_id);
    }
  }

  // Step 4: comment groups synthesized from line/block comment options.
  if let Some(line) = &def.options.line_comment {
    let start = symbols.intern(line, literal_regex(line, def.options.case_sensitive), TokenSymbolFlags { terminal: true, hidden: true, group_start: true, ..Default::default() });
    let end_name = format!("{line}$end-of-line");
    let end = symbols.intern(&end_name, Regex::one_of(vec![CharRange::new('\n' as u16, '\n' as u16)])?, TokenSymbolFlags { terminal: true, hidden: true, ..Default::default() });
    let container = symbols.intern_container(&format!("{line}$comment"));
    groups.push(Group {
      id: GroupId::new(groups.len() as u32 + 1),
      container,
      start,
      end,
      flags: GroupFlags { advance_by_character: true, ends_on_end_of_input: true, keep_end_token: false },
      nesting: Vec::new(),
    });
  }
  if let Some((open, close)) = &def.options.block_comment {
    let start =
      symbols.intern(open, literal_regex(open, def.options.case_sensitive), TokenSymbolFlags { terminal: true, hidden: true, group_start: true, ..Default::default() });
    let end = symbols.intern(close, literal_regex(close, def.options.case_sensitive), TokenSymbolFlags { terminal: true, hidden: true, ..Default::default() });
    let container = symbols.intern_container(&format!("{open}{close}$comment"));
    groups.push(Group {
      id: GroupId::new(groups.len() as u32 + 1),
      container,
      start,
      end,
      flags: GroupFlags { advance_by_character: true, ends_on_end_of_input: false, keep_end_token: false },
      nesting: Vec::new(),
    });
  }

  check_cancelled(builder_options)?;

  // Step 5: auto-whitespace noise, excluding `\n` when newlines matter.
  if def.options.auto_whitespace {
    let exclude_newline = !def.options.newline_is_noise && symbols.by_name.contains_key("NewLine");
    symbols.intern("Whitespace", whitespace_regex(exclude_newline)?, noise_flags());
  }

  // Step 6: miscellaneous noise symbols.
  for (name, regex) in &def.options.noise_symbols {
    symbols.intern(name, regex.clone(), noise_flags());
  }

  // Nonterminals and productions.
  let mut nonterminals: Vec<Nonterminal> = Vec::new();
  let mut nonterminal_by_name: Map<String, NonterminalId> = Map::new();
  for nt in &def.nonterminals {
    let id = NonterminalId::new(nonterminals.len() as u32 + 1);
    nonterminal_by_name.insert(nt.name.clone(), id);
    nonterminals.push(Nonterminal { id, name: nt.name.clone(), productions: Vec::new() });
  }

  let mut productions: Vec<Production> = Vec::new();
  for nt_def in &def.nonterminals {
    let head = nonterminal_by_name[&nt_def.name];
    for production_def in &nt_def.productions {
      let mut members = Vec::with_capacity(production_def.members.len());
      for member in &production_def.members {
        let handle = match member {
          MemberRef::Terminal(name) => {
            let id = symbols.by_name.get(name).copied().ok_or_else(|| GramforgeError::IncompleteGrammarDefinition(format!("unknown terminal `{name}`")))?;
            EntityHandle::token(id)
          }
          MemberRef::Nonterminal(name) => {
            let id = nonterminal_by_name.get(name).copied().ok_or_else(|| GramforgeError::IncompleteGrammarDefinition(format!("unknown nonterminal `{name}`")))?;
            EntityHandle::nonterminal(id)
          }
        };
        members.push(handle);
      }
      let id = ProductionId::new(productions.len() as u32 + 1);
      productions.push(Production { id, head, members, precedence_token: production_def.precedence_token });
      nonterminals[head.zero_based()].productions.push(id);
    }
  }

  let start = *nonterminal_by_name
    .get(&def.start)
    .ok_or_else(|| GramforgeError::IncompleteGrammarDefinition(format!("unknown start nonterminal `{}`", def.start)))?;
  for nt in &nonterminals {
    if nt.productions.is_empty() {
      diagnostics.error(crate::types::DiagnosticCode::IndistinguishableSymbols, format!("nonterminal `{}` has no productions", nt.name));
    }
  }

  check_cancelled(builder_options)?;

  // Step 7: DFA build.
  let dfa_budget = builder_options.max_tokenizer_states;
  let dfa = dfa::build(&symbols.regex_bearing, dfa_budget, diagnostics)?;

  check_cancelled(builder_options)?;

  // Step 8: LALR build.
  let lalr_grammar = LalrGrammar { nonterminals: &nonterminals, productions: &productions, start };
  let lalr_table = lalr::build(&lalr_grammar, &def.options.operator_scope, builder_options.allow_glr, diagnostics)?;

  // Step 9: finishing diagnostic with counts.
  diagnostics.info(format!(
    "building finished: {} symbols, {} nonterminals, {} productions, {} dfa states, {} lr states",
    symbols.token_symbols.len(),
    nonterminals.len(),
    productions.len(),
    dfa.states.len(),
    lalr_table.states.len()
  ));

  let special_names: Vec<(String, EntityHandle)> = def
    .special_names
    .iter()
    .filter_map(|name| {
      if let Some(&id) = symbols.by_name.get(name) {
        Some((name.clone(), EntityHandle::token(id)))
      } else {
        nonterminal_by_name.get(name).map(|&id| (name.clone(), EntityHandle::nonterminal(id)))
      }
    })
    .collect();

  writer::assemble(&def.options.grammar_name, start, &symbols.token_symbols, &nonterminals, &productions, &groups, &dfa, &lalr_table, &special_names)
}

fn check_cancelled(options: &BuilderOptions) -> GramforgeResult<()> {
  if options.cancellation_token.as_ref().is_some_and(|t| t.is_cancelled()) {
    return Err(GramforgeError::Cancelled);
  }
  Ok(())
}
