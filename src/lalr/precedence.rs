//! Operator-precedence conflict resolution (spec §4.4).

use crate::types::{Array, ProductionId, TokenSymbolId};

use super::items::Grammar;

/// How a group of operators associates when a shift/reduce conflict ties on
/// precedence.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Associativity {
  NonAssociative,
  LeftAssociative,
  RightAssociative,
  /// The group only orders precedence; ties are left unresolved.
  PrecedenceOnly,
}

/// One precedence level: a kind and the symbols that belong to it. A
/// production's precedence can come either from an explicit precedence
/// token (an opaque identity, stored as a caller-chosen `u32`) or from its
/// last terminal.
#[derive(Clone, Debug)]
pub struct AssociativityGroup {
  pub kind:              Associativity,
  pub tokens:            Array<TokenSymbolId>,
  pub precedence_tokens: Array<u32>,
}

/// An ordered list of associativity groups, ascending precedence (spec
/// §4.4: "a list of associativity groups ordered by ascending precedence").
#[derive(Clone, Debug, Default)]
pub struct OperatorScope {
  pub groups: Array<AssociativityGroup>,
  /// Whether a reduce/reduce conflict may be resolved by lowest-index
  /// production, or must always be reported.
  pub can_resolve_reduce_reduce: bool,
}

impl OperatorScope {
  fn precedence_of_token(&self, t: TokenSymbolId) -> Option<(usize, Associativity)> {
    self.groups.iter().enumerate().find_map(|(i, g)| g.tokens.contains(&t).then_some((i, g.kind)))
  }

  fn precedence_of_precedence_token(&self, pt: u32) -> Option<(usize, Associativity)> {
    self.groups.iter().enumerate().find_map(|(i, g)| g.precedence_tokens.contains(&pt).then_some((i, g.kind)))
  }

  /// `precedence(p) = precedence(lastTerminalOrExplicitToken(p))` (spec
  /// §4.4).
  fn precedence_of_production(&self, g: &Grammar, p: ProductionId) -> Option<(usize, Associativity)> {
    if p.is_nil() {
      return None;
    }
    let production = g.production(p);
    if let Some(pt) = production.precedence_token {
      return self.precedence_of_precedence_token(pt);
    }
    production.members.iter().rev().find_map(|m| m.as_token()).and_then(|t| self.precedence_of_token(t))
  }
}

/// The outcome of resolving one shift/reduce conflict.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resolution {
  Shift,
  Reduce,
  /// `NonAssociative` ties: the parser rejects this token outright.
  Error,
  /// Neither side has a recorded precedence, or the tying group is
  /// `PrecedenceOnly`: the conflict is not resolved here.
  Unresolved,
}

/// Resolves a shift (on `terminal`) vs. reduce (by `production`) conflict
/// (spec §4.4).
pub fn resolve_shift_reduce(scope: &OperatorScope, g: &Grammar, terminal: TokenSymbolId, production: ProductionId) -> Resolution {
  let terminal_prec = scope.precedence_of_token(terminal);
  let production_prec = scope.precedence_of_production(g, production);
  match (terminal_prec, production_prec) {
    (Some((ti, tk)), Some((pi, _))) => {
      if ti > pi {
        Resolution::Shift
      } else if ti < pi {
        Resolution::Reduce
      } else {
        match tk {
          Associativity::LeftAssociative => Resolution::Reduce,
          Associativity::RightAssociative => Resolution::Shift,
          Associativity::NonAssociative => Resolution::Error,
          Associativity::PrecedenceOnly => Resolution::Unresolved,
        }
      }
    }
    _ => Resolution::Unresolved,
  }
}

/// Resolves a reduce/reduce conflict between `first` and `second` (lower
/// `ProductionId` index wins, legacy tie-break), when the scope allows it
/// (spec §4.4).
pub fn resolve_reduce_reduce(scope: &OperatorScope, first: ProductionId, second: ProductionId) -> Option<ProductionId> {
  if !scope.can_resolve_reduce_reduce {
    return None;
  }
  Some(if first.index() <= second.index() { first } else { second })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{EntityHandle, Nonterminal, NonterminalId, Production};

  fn scope_with_two_levels() -> OperatorScope {
    OperatorScope {
      groups: vec![
        AssociativityGroup { kind: Associativity::LeftAssociative, tokens: vec![TokenSymbolId::new(1), TokenSymbolId::new(2)], precedence_tokens: vec![] },
        AssociativityGroup { kind: Associativity::LeftAssociative, tokens: vec![TokenSymbolId::new(3), TokenSymbolId::new(4)], precedence_tokens: vec![] },
      ],
      can_resolve_reduce_reduce: false,
    }
  }

  #[test]
  fn higher_precedence_terminal_shifts_over_lower_precedence_production() {
    let scope = scope_with_two_levels();
    let nonterminals = vec![Nonterminal { id: NonterminalId::new(1), name: "E".into(), productions: vec![ProductionId::new(1)] }];
    let productions = vec![Production {
      id: ProductionId::new(1),
      head: NonterminalId::new(1),
      members: vec![EntityHandle::nonterminal(NonterminalId::new(1)), EntityHandle::token(TokenSymbolId::new(1)), EntityHandle::nonterminal(NonterminalId::new(1))],
      precedence_token: None,
    }];
    let g = Grammar { nonterminals: &nonterminals, productions: &productions, start: NonterminalId::new(1) };
    // terminal `*` (index 3, higher group) vs. reducing a `+`-headed production (index 1, lower group)
    assert_eq!(resolve_shift_reduce(&scope, &g, TokenSymbolId::new(3), ProductionId::new(1)), Resolution::Shift);
  }

  #[test]
  fn left_associative_tie_reduces() {
    let scope = scope_with_two_levels();
    let nonterminals = vec![Nonterminal { id: NonterminalId::new(1), name: "E".into(), productions: vec![ProductionId::new(1)] }];
    let productions = vec![Production {
      id: ProductionId::new(1),
      head: NonterminalId::new(1),
      members: vec![EntityHandle::nonterminal(NonterminalId::new(1)), EntityHandle::token(TokenSymbolId::new(1)), EntityHandle::nonterminal(NonterminalId::new(1))],
      precedence_token: None,
    }];
    let g = Grammar { nonterminals: &nonterminals, productions: &productions, start: NonterminalId::new(1) };
    assert_eq!(resolve_shift_reduce(&scope, &g, TokenSymbolId::new(1), ProductionId::new(1)), Resolution::Reduce);
  }

  #[test]
  fn missing_precedence_is_unresolved() {
    let scope = OperatorScope::default();
    let nonterminals = vec![Nonterminal { id: NonterminalId::new(1), name: "E".into(), productions: vec![ProductionId::new(1)] }];
    let productions = vec![Production { id: ProductionId::new(1), head: NonterminalId::new(1), members: vec![], precedence_token: None }];
    let g = Grammar { nonterminals: &nonterminals, productions: &productions, start: NonterminalId::new(1) };
    assert_eq!(resolve_shift_reduce(&scope, &g, TokenSymbolId::new(9), ProductionId::new(1)), Resolution::Unresolved);
  }
}
