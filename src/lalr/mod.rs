//! LALR(1) table construction (spec §4.4): canonical LR(1) item sets merged
//! by core, with shift/reduce, reduce/reduce, and accept/reduce conflicts
//! resolved through an [`precedence::OperatorScope`].

pub mod items;
pub mod precedence;
pub mod tables;

use items::{closure, goto, symbols_after_dot, FirstSets, Grammar, GrammarSymbol, Item};
use precedence::{resolve_reduce_reduce, resolve_shift_reduce, OperatorScope, Resolution};
use tables::{Action, EofAction, LrState, LrTable};

use crate::types::{DiagnosticCode, DiagnosticSink, GramforgeResult, Map, OrderedMap, OrderedSet, ProductionId, Severity, BuilderDiagnostic};

/// Builds the LALR(1) (or GLR, if `allow_glr` and a conflict survives
/// operator-precedence resolution) table for `g`.
pub fn build(g: &Grammar, scope: &OperatorScope, allow_glr: bool, diagnostics: &mut DiagnosticSink) -> GramforgeResult<LrTable> {
  let firsts = FirstSets::compute(g);

  let mut initial_kernel = OrderedSet::new();
  initial_kernel.insert(Item { production: ProductionId::NIL, dot: 0, lookahead: GrammarSymbol::Eof });
  let initial = closure(initial_kernel, g, &firsts);

  // --- Canonical LR(1) collection ---
  let mut canonical_states: Vec<OrderedSet<Item>> = vec![initial.clone()];
  let mut canonical_index: OrderedMap<OrderedSet<Item>, usize> = OrderedMap::new();
  canonical_index.insert(initial, 0);
  let mut transitions: Map<(usize, GrammarSymbol), usize> = Map::new();
  let mut queue = std::collections::VecDeque::from([0usize]);

  while let Some(idx) = queue.pop_front() {
    let items = canonical_states[idx].clone();
    for symbol in symbols_after_dot(&items, g) {
      let target = goto(&items, symbol, g, &firsts);
      if target.is_empty() {
        continue;
      }
      let target_idx = match canonical_index.get(&target) {
        Some(&found) => found,
        None => {
          let new_idx = canonical_states.len();
          canonical_index.insert(target.clone(), new_idx);
          canonical_states.push(target);
          queue.push_back(new_idx);
          new_idx
        }
      };
      transitions.insert((idx, symbol), target_idx);
    }
  }

  // --- Merge canonical states sharing an LR(0) core into LALR states ---
  let cores: Vec<OrderedSet<(ProductionId, u32)>> = canonical_states.iter().map(|items| items.iter().map(Item::core).collect()).collect();
  let mut merged_index: OrderedMap<OrderedSet<(ProductionId, u32)>, usize> = OrderedMap::new();
  let mut canonical_to_merged: Vec<usize> = vec![0; canonical_states.len()];
  let mut merged_items: Vec<OrderedSet<Item>> = Vec::new();

  for (i, core) in cores.iter().enumerate() {
    let merged_idx = match merged_index.get(core) {
      Some(&found) => {
        for item in &canonical_states[i] {
          merged_items[found].insert(*item);
        }
        found
      }
      None => {
        let new_idx = merged_items.len();
        merged_index.insert(core.clone(), new_idx);
        merged_items.push(canonical_states[i].clone());
        new_idx
      }
    };
    canonical_to_merged[i] = merged_idx;
  }

  let merged_transitions: Map<(usize, GrammarSymbol), usize> =
    transitions.iter().map(|(&(from, symbol), &to)| ((canonical_to_merged[from], symbol), canonical_to_merged[to])).collect();

  // --- Build action/goto tables, resolving conflicts as they're found ---
  let mut is_glr = false;
  let mut states: Vec<LrState> = Vec::with_capacity(merged_items.len());

  for (state_idx, items) in merged_items.iter().enumerate() {
    let mut raw_actions: OrderedMap<crate::types::TokenSymbolId, Vec<Action>> = OrderedMap::new();
    let mut raw_eof: Vec<EofAction> = Vec::new();
    let mut gotos: OrderedMap<crate::types::NonterminalId, u32> = OrderedMap::new();

    for item in items {
      match g.symbol_at(item.production, item.dot as usize) {
        Some(GrammarSymbol::Token(t)) => {
          let target = merged_transitions[&(state_idx, GrammarSymbol::Token(t))];
          raw_actions.entry(t).or_default().push(Action::Shift(target as u32));
        }
        Some(GrammarSymbol::Nonterminal(nt)) => {
          let target = merged_transitions[&(state_idx, GrammarSymbol::Nonterminal(nt))];
          gotos.insert(nt, target as u32);
        }
        Some(GrammarSymbol::Eof) => {
          // The transition across `#` is purely structural (spec §4.4); it
          // produces no table entry of its own.
        }
        None if item.production.is_nil() => {
          raw_eof.push(EofAction::Accept);
        }
        None => match item.lookahead {
          GrammarSymbol::Eof => raw_eof.push(EofAction::Reduce(item.production)),
          GrammarSymbol::Token(t) => raw_actions.entry(t).or_default().push(Action::Reduce(item.production)),
          GrammarSymbol::Nonterminal(_) => unreachable!("a lookahead is always a terminal or eof"),
        },
      }
    }

    let actions = raw_actions
      .into_iter()
      .map(|(t, raw)| (t, resolve_terminal_actions(scope, g, allow_glr, t, raw, diagnostics, &mut is_glr)))
      .filter(|(_, acts)| !acts.is_empty())
      .collect();

    let eof_actions = resolve_eof_actions(scope, allow_glr, raw_eof, diagnostics, &mut is_glr);

    states.push(LrState { actions, eof_actions, gotos: gotos.into_iter().collect() });
  }

  Ok(LrTable { states, start_state: 0, is_glr })
}

fn resolve_terminal_actions(
  scope: &OperatorScope,
  g: &Grammar,
  allow_glr: bool,
  terminal: crate::types::TokenSymbolId,
  mut actions: Vec<Action>,
  diagnostics: &mut DiagnosticSink,
  is_glr: &mut bool,
) -> Vec<Action> {
  actions.sort_by_key(|a| match a {
    Action::Shift(s) => (0u8, *s),
    Action::Reduce(p) => (1u8, p.index()),
  });
  actions.dedup();

  let shift: Option<u32> = actions.iter().find_map(|a| if let Action::Shift(s) = a { Some(*s) } else { None });
  let reduces: Vec<ProductionId> = actions.iter().filter_map(|a| if let Action::Reduce(p) = a { Some(*p) } else { None }).collect();

  if shift.is_some() as usize + reduces.len() <= 1 {
    return actions;
  }

  let reduce_winner = if reduces.len() > 1 {
    let mut winner = reduces[0];
    let mut unresolved = false;
    for &p in &reduces[1..] {
      match resolve_reduce_reduce(scope, winner, p) {
        Some(w) => winner = w,
        None => unresolved = true,
      }
    }
    if unresolved {
      report_conflict(diagnostics, allow_glr, DiagnosticCode::ReduceReduceConflict, format!("unresolved reduce/reduce conflict on terminal {}", terminal.index()));
      if allow_glr {
        *is_glr = true;
        let mut out: Vec<Action> = reduces.into_iter().map(Action::Reduce).collect();
        if let Some(s) = shift {
          out.push(Action::Shift(s));
        }
        return out;
      }
    }
    winner
  } else {
    reduces[0]
  };

  match shift {
    None => vec![Action::Reduce(reduce_winner)],
    Some(target) => match resolve_shift_reduce(scope, g, terminal, reduce_winner) {
      Resolution::Shift => vec![Action::Shift(target)],
      Resolution::Reduce => vec![Action::Reduce(reduce_winner)],
      Resolution::Error => vec![],
      Resolution::Unresolved => {
        report_conflict(
          diagnostics,
          allow_glr,
          DiagnosticCode::ShiftReduceConflict,
          format!("unresolved shift/reduce conflict on terminal {} (shift to {target} vs. reduce by production {})", terminal.index(), reduce_winner.index()),
        );
        if allow_glr {
          *is_glr = true;
          vec![Action::Shift(target), Action::Reduce(reduce_winner)]
        } else {
          // Classic parser-generator default when GLR storage isn't available.
          vec![Action::Shift(target)]
        }
      }
    },
  }
}

fn resolve_eof_actions(scope: &OperatorScope, allow_glr: bool, mut actions: Vec<EofAction>, diagnostics: &mut DiagnosticSink, is_glr: &mut bool) -> Vec<EofAction> {
  actions.sort_by_key(|a| match a {
    EofAction::Accept => (0u8, ProductionId::NIL.index()),
    EofAction::Reduce(p) => (1u8, p.index()),
  });
  actions.dedup();

  let has_accept = actions.iter().any(|a| matches!(a, EofAction::Accept));
  let reduces: Vec<ProductionId> = actions.iter().filter_map(|a| if let EofAction::Reduce(p) = a { Some(*p) } else { None }).collect();

  if has_accept && !reduces.is_empty() {
    diagnostics.error(DiagnosticCode::AcceptReduceConflict, "accept/reduce conflict under end-of-file lookahead".to_string());
    return vec![EofAction::Accept];
  }
  if has_accept {
    return vec![EofAction::Accept];
  }
  if reduces.len() > 1 {
    let mut winner = reduces[0];
    let mut unresolved = false;
    for &p in &reduces[1..] {
      match resolve_reduce_reduce(scope, winner, p) {
        Some(w) => winner = w,
        None => unresolved = true,
      }
    }
    if unresolved {
      report_conflict(diagnostics, allow_glr, DiagnosticCode::ReduceReduceConflict, "unresolved reduce/reduce conflict under end-of-file lookahead".to_string());
      if allow_glr {
        *is_glr = true;
        return reduces.into_iter().map(EofAction::Reduce).collect();
      }
    }
    return vec![EofAction::Reduce(winner)];
  }
  actions
}

fn report_conflict(diagnostics: &mut DiagnosticSink, allow_glr: bool, code: DiagnosticCode, message: String) {
  let severity = if allow_glr { Severity::Warning } else { Severity::Error };
  diagnostics.push(BuilderDiagnostic::new(severity, Some(code), message));
}
