//! LR action/goto table shapes (spec §3 "LR tables", §4.4 "Outputs").

use crate::types::{Array, NonterminalId, ProductionId, TokenSymbolId};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
  Shift(u32),
  Reduce(ProductionId),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EofAction {
  Accept,
  Reduce(ProductionId),
}

/// One LR automaton state. `actions`/`eof_actions` carry more than one entry
/// per symbol only when the grammar is GLR (spec §3 "a single state may have
/// multiple entries per symbol only when the writer is marked 'has
/// conflicts'").
#[derive(Clone, Debug, Default)]
pub struct LrState {
  pub actions:     Array<(TokenSymbolId, Array<Action>)>,
  pub eof_actions: Array<EofAction>,
  pub gotos:       Array<(NonterminalId, u32)>,
}

#[derive(Clone, Debug, Default)]
pub struct LrTable {
  pub states:      Array<LrState>,
  pub start_state: u32,
  /// Set when any conflict was left unresolved by the operator scope; such
  /// states retain multiple actions per symbol instead of erroring (spec
  /// §4.4 "the writer marks the machine as GLR").
  pub is_glr: bool,
}
