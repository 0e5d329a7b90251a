//! The grammar data model: token symbols, non-terminals, productions, and
//! lexical groups (spec §3).

use super::{EntityHandle, GroupId, NonterminalId, ProductionId, TokenSymbolId};
use crate::regex::Regex;

/// Attributes a [`TokenSymbol`] row may carry. A plain terminal has none of
/// these set; group delimiters and generated noise set the matching bit.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct TokenSymbolFlags {
  pub terminal:  bool,
  pub hidden:    bool,
  pub noise:     bool,
  pub group_start: bool,
  pub generated: bool,
}

/// A row in the TokenSymbol table. Subsumes terminals, group delimiters, and
/// generated noise (spec §3).
#[derive(Clone, Debug)]
pub struct TokenSymbol {
  pub id:    TokenSymbolId,
  pub name:  String,
  pub regex: Regex,
  pub flags: TokenSymbolFlags,
}

/// A row in the Nonterminal table. Carries no attributes beyond its name and
/// the productions that reduce to it (spec §3).
#[derive(Clone, Debug)]
pub struct Nonterminal {
  pub id:   NonterminalId,
  pub name: String,
  /// Productions reducing to this non-terminal, in registration order.
  pub productions: Vec<ProductionId>,
}

/// A row in the Production table. `members` holds the production's body, in
/// order; `precedence_token` is an opaque object identity used only by the
/// operator precedence scope (spec §4.4), represented here as an index into
/// a caller-owned table of precedence tokens.
#[derive(Clone, Debug)]
pub struct Production {
  pub id:     ProductionId,
  pub head:   NonterminalId,
  pub members: Vec<EntityHandle>,
  pub precedence_token: Option<u32>,
}

/// Behavior flags for a lexical [`Group`] (spec §3).
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct GroupFlags {
  pub advance_by_character: bool,
  pub ends_on_end_of_input: bool,
  pub keep_end_token:       bool,
}

/// A lexical bracket pair. Groups the text between a start and end token
/// symbol into one token addressed by `container`.
#[derive(Clone, Debug)]
pub struct Group {
  pub id:        GroupId,
  pub container: TokenSymbolId,
  pub start:     TokenSymbolId,
  pub end:       TokenSymbolId,
  pub flags:     GroupFlags,
  pub nesting:   Vec<GroupId>,
}
