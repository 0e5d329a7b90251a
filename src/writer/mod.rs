//! Grammar writer (spec §4.5, §6): assembles a built grammar, its compiled
//! DFA, and its compiled LR table into one binary [`GrammarImage`].

pub mod container;
pub mod heap;

use crate::dfa::table::{DfaEdge, DfaState, DfaTable};
use crate::lalr::tables::{Action, EofAction, LrTable};
use crate::types::{Array, GramforgeResult, Group, Nonterminal, Production, TokenSymbol, TokenSymbolId};

pub use container::{decode, encode, GrammarImage};
use container::{GroupRecord, NonterminalRecord, ProductionRecord, SpecialNameRecord, TokenSymbolRecord};

/// Serializes a DFA into the blob the writer hands to [`heap::BlobHeap`]
/// (spec §6, "DFA blob layout"): structure-of-arrays, column-major, so that a
/// runtime reader can map one array straight onto a typed slice instead of
/// striding through per-state records. Layout: `stateCount`, `edgeCount`,
/// `firstEdge[]`, `edgeKeyFrom[]`, `edgeKeyTo[]`, `edgeTarget[]`, `accept[]`
/// (`0` = none, else token index), then a `hasDefaultTransitions` flag
/// followed by `defaultTransitions[]` only when any state carries one.
pub fn encode_dfa_blob(dfa: &DfaTable) -> Vec<u8> {
  use crate::buffer::{index_width_for_row_count, ByteWriter};

  let mut w = ByteWriter::new();
  w.write_u32(dfa.states.len() as u32);
  w.write_u32(dfa.edges.len() as u32);
  let state_width = index_width_for_row_count(dfa.states.len());

  for state in &dfa.states {
    w.write_u32(state.first_edge);
  }
  for edge in &dfa.edges {
    w.write_u16(edge.key_from);
  }
  for edge in &dfa.edges {
    w.write_u16(edge.key_to);
  }
  for edge in &dfa.edges {
    w.write_index(state_width, edge.target);
  }
  for state in &dfa.states {
    w.write_u32(state.accept.map(|t| t.index()).unwrap_or(0));
  }

  let has_defaults = dfa.states.iter().any(|s| s.default_to.is_some());
  w.write_u8(has_defaults as u8);
  if has_defaults {
    for state in &dfa.states {
      w.write_u32(state.default_to.map(|d| d + 1).unwrap_or(0));
    }
  }
  w.into_bytes()
}

/// Inverse of [`encode_dfa_blob`]. Per-state edge counts are recovered from
/// consecutive `firstEdge[]` offsets (the builder discovers states in
/// monotonically increasing order, so each state's edges end where the next
/// state's begin; the final state's edges run to `edgeCount`).
pub fn decode_dfa_blob(bytes: &[u8]) -> GramforgeResult<DfaTable> {
  use crate::buffer::{index_width_for_row_count, ByteReader};

  let mut r = ByteReader::new(bytes);
  let state_count = r.read_u32()? as usize;
  let edge_count = r.read_u32()? as usize;
  let state_width = index_width_for_row_count(state_count);

  let first_edge: Vec<u32> = (0..state_count).map(|_| r.read_u32()).collect::<GramforgeResult<_>>()?;
  let key_from: Vec<u16> = (0..edge_count).map(|_| r.read_u16()).collect::<GramforgeResult<_>>()?;
  let key_to: Vec<u16> = (0..edge_count).map(|_| r.read_u16()).collect::<GramforgeResult<_>>()?;
  let target: Vec<u32> = (0..edge_count).map(|_| r.read_index(state_width)).collect::<GramforgeResult<_>>()?;
  let accept: Vec<u32> = (0..state_count).map(|_| r.read_u32()).collect::<GramforgeResult<_>>()?;

  let has_defaults = r.read_u8()? != 0;
  let default_to: Vec<u32> = if has_defaults { (0..state_count).map(|_| r.read_u32()).collect::<GramforgeResult<_>>()? } else { vec![0; state_count] };

  let edges: Vec<DfaEdge> = (0..edge_count).map(|i| DfaEdge { key_from: key_from[i], key_to: key_to[i], target: target[i] }).collect();

  let states: Vec<DfaState> = (0..state_count)
    .map(|i| {
      let edge_end = if i + 1 < state_count { first_edge[i + 1] } else { edge_count as u32 };
      DfaState {
        first_edge: first_edge[i],
        edge_count: edge_end - first_edge[i],
        accept: if accept[i] == 0 { None } else { Some(TokenSymbolId::new(accept[i])) },
        default_to: if default_to[i] == 0 { None } else { Some(default_to[i] - 1) },
      }
    })
    .collect();

  Ok(DfaTable { states, edges })
}

/// Serializes an LR table into the blob the writer hands to
/// [`heap::BlobHeap`]: per-state shift/reduce action lists (more than one
/// action per symbol only under GLR), EOF actions, and goto entries.
pub fn encode_lalr_blob(table: &LrTable) -> Vec<u8> {
  use crate::buffer::ByteWriter;

  let mut w = ByteWriter::new();
  w.write_u8(table.is_glr as u8);
  w.write_u32(table.start_state);
  w.write_u32(table.states.len() as u32);
  for state in &table.states {
    w.write_u32(state.actions.len() as u32);
    for (token, actions) in &state.actions {
      w.write_u32(token.index());
      w.write_u32(actions.len() as u32);
      for action in actions {
        match action {
          Action::Shift(target) => {
            w.write_u8(0);
            w.write_u32(*target);
          }
          Action::Reduce(production) => {
            w.write_u8(1);
            w.write_u32(production.index());
          }
        }
      }
    }
    w.write_u32(state.eof_actions.len() as u32);
    for action in &state.eof_actions {
      match action {
        EofAction::Accept => w.write_u8(0),
        EofAction::Reduce(production) => {
          w.write_u8(1);
          w.write_u32(production.index());
        }
      }
    }
    w.write_u32(state.gotos.len() as u32);
    for (nonterminal, target) in &state.gotos {
      w.write_u32(nonterminal.index());
      w.write_u32(*target);
    }
  }
  w.into_bytes()
}

/// Assembles the final [`GrammarImage`] from the grammar's data model plus
/// its compiled DFA and LR tables (spec §4.5 emit order: grammar row, token
/// symbols, groups and their nesting, non-terminals, productions and their
/// members, the state machine blobs, then special names).
#[allow(clippy::too_many_arguments)]
pub fn assemble(
  name: &str,
  start: crate::types::NonterminalId,
  token_symbols: &[TokenSymbol],
  nonterminals: &[Nonterminal],
  productions: &[Production],
  groups: &[Group],
  dfa: &DfaTable,
  lalr: &LrTable,
  special_names: &[(String, crate::types::EntityHandle)],
) -> GramforgeResult<GrammarImage> {
  let token_symbols: Array<TokenSymbolRecord> =
    token_symbols.iter().map(|t| TokenSymbolRecord { name: t.name.clone(), flags: t.flags }).collect();
  let nonterminals: Array<NonterminalRecord> =
    nonterminals.iter().map(|n| NonterminalRecord { name: n.name.clone(), productions: n.productions.clone() }).collect();
  let productions: Array<ProductionRecord> = productions.iter().map(|p| ProductionRecord { head: p.head, members: p.members.clone() }).collect();
  let groups: Array<GroupRecord> =
    groups.iter().map(|g| GroupRecord { container: g.container, start: g.start, end: g.end, flags: g.flags, nesting: g.nesting.clone() }).collect();
  let special_names: Array<SpecialNameRecord> =
    special_names.iter().map(|(name, handle)| SpecialNameRecord { name: name.clone(), handle: *handle }).collect();

  Ok(GrammarImage {
    name: name.to_string(),
    start,
    token_symbols,
    nonterminals,
    productions,
    groups,
    dfa_blob: encode_dfa_blob(dfa),
    lalr_blob: encode_lalr_blob(lalr),
    is_glr: lalr.is_glr,
    special_names,
  })
}

/// Encodes `image` into a complete grammar container (spec §6).
pub fn write(image: &GrammarImage) -> GramforgeResult<Vec<u8>> {
  container::encode(image)
}
