//! Subset construction over the position automaton (spec §4.3): turns the
//! `firstpos`/`followpos` relation into a deterministic state machine,
//! resolving accept conflicts and the DFA state-count budget along the way.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::leaf::Leaf;
use super::table::{DfaEdge, DfaState, DfaTable};
use crate::types::{DiagnosticCode, DiagnosticSink, GramforgeError, GramforgeResult, TokenSymbolId};

type PosSet = BTreeSet<usize>;

/// `max(256, 16 * leafCount)`, clamped to `i32::MAX` (spec §9, resolving the
/// ambiguous `max`/`min` wording in favor of `max` — see DESIGN.md).
pub fn default_state_budget(leaf_count: usize) -> usize {
  256usize.max(16usize.saturating_mul(leaf_count)).min(i32::MAX as usize)
}

/// Splits the alphabet of code units reachable from `positions` into maximal
/// runs that every position in `positions` treats identically, returning
/// `(range_start, range_end, matching_positions)` triples. `Any` and `End`
/// leaves contribute no breakpoints of their own: `Any` matches every unit,
/// `End` matches none.
fn partition_alphabet(positions: &PosSet, leaves: &[Leaf]) -> Vec<(u16, u16, PosSet)> {
  let mut breakpoints: BTreeSet<u32> = BTreeSet::new();
  breakpoints.insert(0);
  breakpoints.insert(0x1_0000);
  for &p in positions {
    if let Leaf::Chars { ranges, .. } = &leaves[p] {
      for r in ranges {
        breakpoints.insert(r.start as u32);
        breakpoints.insert(r.end as u32 + 1);
      }
    }
  }

  let points: Vec<u32> = breakpoints.into_iter().collect();
  let mut runs: Vec<(u16, u16, PosSet)> = Vec::new();
  for w in points.windows(2) {
    let (lo, hi_excl) = (w[0], w[1]);
    if lo >= hi_excl {
      continue;
    }
    let representative = lo as u16;
    let matching: PosSet = positions.iter().copied().filter(|&p| leaves[p].matches(representative)).collect();
    if matching.is_empty() {
      continue;
    }
    let hi = (hi_excl - 1) as u16;
    match runs.last_mut() {
      Some((_, prev_hi, prev_matching)) if *prev_matching == matching && *prev_hi as u32 + 1 == lo => {
        *prev_hi = hi;
      }
      _ => runs.push((lo as u16, hi, matching)),
    }
  }
  runs
}

/// Resolves the winning accept for one DFA state's position set, per spec
/// §4.3: lowest numeric priority wins (priority `0`, literal alternatives,
/// outranks priority `1`, starred ones — see DESIGN.md), ties within a
/// priority broken by lowest token-symbol index. If two *distinct* tokens
/// still tie at the winning priority, the grammar is ambiguous and the build
/// fails with `IndistinguishableSymbols`.
fn resolve_accept(positions: &PosSet, leaves: &[Leaf], diagnostics: &mut DiagnosticSink) -> GramforgeResult<Option<TokenSymbolId>> {
  let mut best_priority: Option<u8> = None;
  let mut by_token: BTreeMap<TokenSymbolId, u8> = BTreeMap::new();
  for &p in positions {
    if let Leaf::End { token, priority } = &leaves[p] {
      by_token
        .entry(*token)
        .and_modify(|existing| *existing = (*existing).min(*priority))
        .or_insert(*priority);
      best_priority = Some(best_priority.map_or(*priority, |b: u8| b.min(*priority)));
    }
  }
  let Some(best) = best_priority else {
    return Ok(None);
  };
  let mut winners: Vec<TokenSymbolId> = by_token.iter().filter(|(_, &pr)| pr == best).map(|(&tok, _)| tok).collect();
  winners.sort_by_key(|t| t.index());
  if winners.len() > 1 {
    diagnostics.error(
      DiagnosticCode::IndistinguishableSymbols,
      format!(
        "terminals {:?} are indistinguishable: they accept in the same DFA state at the same priority",
        winners.iter().map(|t| t.index()).collect::<Vec<_>>()
      ),
    );
    return Err(GramforgeError::Internal(format!(
      "indistinguishable terminals {:?} in one DFA state",
      winners.iter().map(|t| t.index()).collect::<Vec<_>>()
    )));
  }
  Ok(winners.into_iter().next())
}

/// Runs subset construction from `start`, producing a table whose states are
/// discovered in breadth-first order from the start state (state `0`).
pub fn build(
  start: PosSet,
  leaves: &[Leaf],
  followpos: &[PosSet],
  max_states: usize,
  diagnostics: &mut DiagnosticSink,
) -> GramforgeResult<DfaTable> {
  let mut state_of: BTreeMap<PosSet, usize> = BTreeMap::new();
  let mut positions_of: Vec<PosSet> = Vec::new();
  let mut queue: VecDeque<usize> = VecDeque::new();

  state_of.insert(start.clone(), 0);
  positions_of.push(start);
  queue.push_back(0);

  let mut edges_per_state: Vec<Vec<DfaEdge>> = vec![Vec::new()];
  let mut accept_per_state: Vec<Option<TokenSymbolId>> = vec![None];

  while let Some(state_idx) = queue.pop_front() {
    let positions = positions_of[state_idx].clone();
    accept_per_state[state_idx] = resolve_accept(&positions, leaves, diagnostics)?;

    for (lo, hi, matching) in partition_alphabet(&positions, leaves) {
      let mut target_positions: PosSet = PosSet::new();
      for &p in &matching {
        target_positions.extend(followpos[p].iter().copied());
      }
      if target_positions.is_empty() {
        continue;
      }

      let target_idx = match state_of.get(&target_positions) {
        Some(&idx) => idx,
        None => {
          let idx = positions_of.len();
          if idx >= max_states {
            diagnostics.error(
              DiagnosticCode::DfaStateLimitExceeded,
              format!("DFA subset construction exceeded its state budget of {max_states} states"),
            );
            return Err(GramforgeError::Internal(format!("DFA state budget of {max_states} exceeded")));
          }
          state_of.insert(target_positions.clone(), idx);
          positions_of.push(target_positions);
          edges_per_state.push(Vec::new());
          accept_per_state.push(None);
          queue.push_back(idx);
          idx
        }
      };

      edges_per_state[state_idx].push(DfaEdge { key_from: lo, key_to: hi, target: target_idx as u32 });
    }
  }

  let mut states = Vec::with_capacity(positions_of.len());
  let mut edges = Vec::new();
  for (idx, mut state_edges) in edges_per_state.into_iter().enumerate() {
    state_edges.sort_by_key(|e| e.key_from);

    // A lone edge covering the whole alphabet, produced only by `Any`
    // positions, becomes this state's default transition instead of a
    // one-entry edge list (spec §4.3).
    let default_to = if state_edges.len() == 1 && state_edges[0].key_from == 0 && state_edges[0].key_to == u16::MAX {
      let only = state_edges.remove(0);
      Some(only.target)
    } else {
      None
    };

    let first_edge = edges.len() as u32;
    let edge_count = state_edges.len() as u32;
    edges.extend(state_edges);
    states.push(DfaState { first_edge, edge_count, accept: accept_per_state[idx], default_to });
  }

  Ok(DfaTable { states, edges })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dfa::positions::Lowerer;
  use crate::regex::{CaseOverride, CharRange, Regex};

  fn lower_terminal(lowerer: &mut Lowerer, regex: &Regex, token: TokenSymbolId, priority: u8) -> PosSet {
    let (first, last, _) = lowerer.lower(regex, CaseOverride::Inherit).unwrap();
    let end = lowerer.push_leaf(Leaf::End { token, priority });
    for &p in &last {
      lowerer.followpos[p].insert(end);
    }
    first
  }

  #[test]
  fn two_distinct_literals_produce_a_small_deterministic_dfa() {
    let mut lowerer = Lowerer::default();
    let mut start = PosSet::new();
    start.extend(lower_terminal(&mut lowerer, &Regex::literal("if"), TokenSymbolId::new(1), 0));
    start.extend(lower_terminal(
      &mut lowerer,
      &Regex::repeat(1, crate::regex::UNBOUNDED, Regex::one_of(vec![CharRange::new(b'a' as u16, b'z' as u16)]).unwrap()).unwrap(),
      TokenSymbolId::new(2),
      1,
    ));
    let mut sink = DiagnosticSink::new();
    let table = build(start, &lowerer.leaves, &lowerer.followpos, 256, &mut sink).unwrap();
    assert!(!sink.is_unparsable());
    // "if" reaches a state that accepts both KEYWORD_IF (priority 0) and the
    // identifier pattern (priority 1); the literal must win.
    let mut state = 0usize;
    for ch in "if".chars() {
      let edges = table.edges_of(state);
      let edge = edges.iter().find(|e| e.key_from as u32 <= ch as u32 && ch as u32 <= e.key_to as u32).unwrap();
      state = edge.target as usize;
    }
    assert_eq!(table.states[state].accept, Some(TokenSymbolId::new(1)));
  }

  #[test]
  fn identical_patterns_on_two_tokens_are_indistinguishable() {
    let mut lowerer = Lowerer::default();
    let mut start = PosSet::new();
    start.extend(lower_terminal(&mut lowerer, &Regex::literal("x"), TokenSymbolId::new(1), 0));
    start.extend(lower_terminal(&mut lowerer, &Regex::literal("x"), TokenSymbolId::new(2), 0));
    let mut sink = DiagnosticSink::new();
    let err = build(start, &lowerer.leaves, &lowerer.followpos, 256, &mut sink);
    assert!(err.is_err());
    assert!(sink.records().iter().any(|d| d.code == Some(DiagnosticCode::IndistinguishableSymbols)));
  }

  #[test]
  fn state_budget_is_enforced() {
    let mut lowerer = Lowerer::default();
    // A handful of distinct single-character terminals forces many states.
    let mut start = PosSet::new();
    for (i, c) in ('a'..='z').enumerate() {
      start.extend(lower_terminal(
        &mut lowerer,
        &Regex::literal(c.to_string()),
        TokenSymbolId::new(i as u32 + 1),
        0,
      ));
    }
    let mut sink = DiagnosticSink::new();
    let err = build(start, &lowerer.leaves, &lowerer.followpos, 1, &mut sink);
    assert!(err.is_err());
    assert!(sink.records().iter().any(|d| d.code == Some(DiagnosticCode::DfaStateLimitExceeded)));
  }

  #[test]
  fn lone_any_edge_becomes_a_default_transition() {
    let mut lowerer = Lowerer::default();
    let start = lower_terminal(&mut lowerer, &Regex::repeat(1, crate::regex::UNBOUNDED, Regex::any()).unwrap(), TokenSymbolId::new(1), 0);
    let mut sink = DiagnosticSink::new();
    let table = build(start, &lowerer.leaves, &lowerer.followpos, 256, &mut sink).unwrap();
    assert!(table.states[0].default_to.is_some());
    assert_eq!(table.states[0].edge_count, 0);
  }
}
