//! The DFA builder (spec §4.3): lowers every terminal's regex onto one
//! shared position automaton, then runs subset construction over the whole
//! alphabet at once so a single DFA recognizes every terminal.

pub mod leaf;
pub mod positions;
pub mod subset;
pub mod table;

use std::collections::BTreeSet;

use positions::{has_unbounded_repetition, has_void, Lowerer};
use table::DfaTable;

use crate::regex::Regex;
use crate::types::{DiagnosticCode, DiagnosticSink, GramforgeResult, TokenSymbolId};

/// One terminal awaiting DFA lowering.
pub struct TerminalRegex {
  pub token: TokenSymbolId,
  pub regex: Regex,
}

/// Builds the combined DFA for every terminal in `terminals`.
///
/// `max_states` overrides the state budget (`BuilderOptions.max_tokenizer_states`);
/// when `None`, the default `max(256, 16 * leafCount)` budget applies (spec §9).
pub fn build(terminals: &[TerminalRegex], max_states: Option<usize>, diagnostics: &mut DiagnosticSink) -> GramforgeResult<DfaTable> {
  let mut lowerer = Lowerer::default();
  let mut start: BTreeSet<usize> = BTreeSet::new();

  for terminal in terminals {
    let lowered = terminal.regex.clone().lower_regex_strings()?;
    let subregexes: Vec<Regex> = match lowered {
      Regex::Alt { parts, case } if case == crate::regex::CaseOverride::Inherit => parts,
      other => vec![other],
    };

    for sub in &subregexes {
      let priority = if has_unbounded_repetition(sub) { 1 } else { 0 };
      let void = has_void(sub);
      let (first, last, _nullable) = lowerer.lower(sub, crate::regex::CaseOverride::Inherit)?;

      if last.is_empty() && void {
        diagnostics.warning(
          DiagnosticCode::IndistinguishableSymbols,
          format!("terminal {} contains an unmatchable void sub-expression and can never accept", terminal.token.index()),
        );
      }

      let end_idx = lowerer.push_leaf(leaf::Leaf::End { token: terminal.token, priority });
      for &p in &last {
        lowerer.followpos[p].insert(end_idx);
      }
      start.extend(first);
    }
  }

  let budget = max_states.unwrap_or_else(|| subset::default_state_budget(lowerer.leaves.len()));
  subset::build(start, &lowerer.leaves, &lowerer.followpos, budget, diagnostics)
}
