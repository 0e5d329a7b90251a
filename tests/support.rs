//! Shared helpers for the integration tests. Rust's `tests/` harness treats
//! every top-level file as its own crate, so anything shared lives in a
//! `mod support;`-included file rather than a `#[test]`-bearing one.

use gramforge_core::dfa::table::DfaTable;
use gramforge_core::types::TokenSymbolId;

/// Walks `word` through `table` from its start state, returning the accept
/// recorded at the state reached after consuming every character, or `None`
/// if the walk falls off the table or never reaches an accept.
#[allow(dead_code)]
pub fn walk(table: &DfaTable, word: &str) -> Option<TokenSymbolId> {
  let mut state = 0usize;
  for ch in word.chars() {
    let edges = table.edges_of(state);
    let edge = edges.iter().find(|e| e.key_from as u32 <= ch as u32 && ch as u32 <= e.key_to as u32);
    match edge {
      Some(edge) => state = edge.target as usize,
      None => match table.states[state].default_to {
        Some(target) => state = target as usize,
        None => return None,
      },
    }
  }
  table.states[state].accept
}
