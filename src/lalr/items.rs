//! Grammar augmentation and canonical LR(1) item-set construction
//! (spec §4.4).

use crate::types::{Array, EntityHandle, Map, Nonterminal, NonterminalId, OrderedSet, Production, ProductionId, Set, TokenSymbolId};

/// A symbol as it appears in a production body or as a lookahead: either a
/// terminal, a non-terminal, or the synthetic end-of-file terminal `#`
/// introduced by augmentation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum GrammarSymbol {
  Token(TokenSymbolId),
  Nonterminal(NonterminalId),
  Eof,
}

impl GrammarSymbol {
  pub fn from_handle(handle: EntityHandle) -> Self {
    if let Some(t) = handle.as_token() {
      Self::Token(t)
    } else if let Some(nt) = handle.as_nonterminal() {
      Self::Nonterminal(nt)
    } else {
      unreachable!("a production member must be a token symbol or nonterminal")
    }
  }

  pub fn as_token(&self) -> Option<TokenSymbolId> {
    match self {
      Self::Token(t) => Some(*t),
      _ => None,
    }
  }
}

/// A borrowed view over a grammar's nonterminal and production tables, plus
/// the designated start symbol. The augmented production `S' -> S #` is
/// represented out of band (spec §4.4 "Indices ... are shifted by one so
/// that augmented items occupy index 0" is an array-shifting artifact of the
/// source; here the same semantics are modeled with a sentinel
/// [`ProductionId::NIL`] rather than physically renumbering every handle —
/// see DESIGN.md).
pub struct Grammar<'g> {
  pub nonterminals: &'g [Nonterminal],
  pub productions:  &'g [Production],
  pub start:        NonterminalId,
}

impl<'g> Grammar<'g> {
  pub fn nonterminal(&self, id: NonterminalId) -> &Nonterminal {
    &self.nonterminals[id.zero_based()]
  }

  pub fn production(&self, id: ProductionId) -> &Production {
    &self.productions[id.zero_based()]
  }

  /// The symbol at `dot` in `production`'s body, or `None` past its end.
  /// `production == ProductionId::NIL` denotes the augmented production.
  pub fn symbol_at(&self, production: ProductionId, dot: usize) -> Option<GrammarSymbol> {
    if production.is_nil() {
      return match dot {
        0 => Some(GrammarSymbol::Nonterminal(self.start)),
        1 => Some(GrammarSymbol::Eof),
        _ => None,
      };
    }
    self.production(production).members.get(dot).map(|&h| GrammarSymbol::from_handle(h))
  }

  pub fn production_len(&self, production: ProductionId) -> usize {
    if production.is_nil() { 2 } else { self.production(production).members.len() }
  }

  /// `None` for the augmented production, which reduces to no real
  /// nonterminal.
  pub fn head_of(&self, production: ProductionId) -> Option<NonterminalId> {
    if production.is_nil() { None } else { Some(self.production(production).head) }
  }
}

/// `FIRST` sets and nullability for every nonterminal, computed by fixpoint
/// iteration over the grammar's productions (spec §4.4).
pub struct FirstSets {
  first:    Map<NonterminalId, Set<GrammarSymbol>>,
  nullable: Set<NonterminalId>,
}

impl FirstSets {
  pub fn compute(g: &Grammar) -> Self {
    let mut first: Map<NonterminalId, Set<GrammarSymbol>> = Map::new();
    let mut nullable: Set<NonterminalId> = Set::new();

    loop {
      let mut changed = false;
      for nt in g.nonterminals {
        for &p in &nt.productions {
          let members = &g.production(p).members;
          if members.is_empty() && nullable.insert(nt.id) {
            changed = true;
          }
          let mut sequence_nullable = true;
          for member in members {
            let symbol = GrammarSymbol::from_handle(*member);
            match symbol {
              GrammarSymbol::Token(_) | GrammarSymbol::Eof => {
                if first.entry(nt.id).or_default().insert(symbol) {
                  changed = true;
                }
                sequence_nullable = false;
                break;
              }
              GrammarSymbol::Nonterminal(b) => {
                let b_first: Array<GrammarSymbol> = first.get(&b).cloned().unwrap_or_default().into_iter().collect();
                for s in b_first {
                  if first.entry(nt.id).or_default().insert(s) {
                    changed = true;
                  }
                }
                if !nullable.contains(&b) {
                  sequence_nullable = false;
                  break;
                }
              }
            }
          }
          if sequence_nullable && nullable.insert(nt.id) {
            changed = true;
          }
        }
      }
      if !changed {
        break;
      }
    }

    Self { first, nullable }
  }

  /// `FIRST(sequence · trailing)`: the terminals (or `trailing` itself, if
  /// the whole sequence can vanish) that can begin what follows the dot.
  pub fn of_sequence(&self, sequence: &[GrammarSymbol], trailing: GrammarSymbol) -> Set<GrammarSymbol> {
    let mut out = Set::new();
    let mut all_nullable = true;
    for symbol in sequence {
      match symbol {
        GrammarSymbol::Token(_) | GrammarSymbol::Eof => {
          out.insert(*symbol);
          all_nullable = false;
          break;
        }
        GrammarSymbol::Nonterminal(nt) => {
          out.extend(self.first.get(nt).cloned().unwrap_or_default());
          if !self.nullable.contains(nt) {
            all_nullable = false;
            break;
          }
        }
      }
    }
    if all_nullable {
      out.insert(trailing);
    }
    out
  }
}

/// An LR(1) item: a production, a dot position within it, and a single
/// lookahead terminal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Item {
  pub production: ProductionId,
  pub dot:        u32,
  pub lookahead:  GrammarSymbol,
}

impl Item {
  /// The `(production, dot)` pair identifying this item's LR(0) core,
  /// ignoring lookahead — used to merge canonical LR(1) states into LALR(1)
  /// states (spec §4.4, "merge by LALR-core").
  pub fn core(&self) -> (ProductionId, u32) {
    (self.production, self.dot)
  }
}

fn tail_after_dot(g: &Grammar, item: &Item) -> Array<GrammarSymbol> {
  let len = g.production_len(item.production);
  ((item.dot as usize + 1)..len).filter_map(|i| g.symbol_at(item.production, i)).collect()
}

/// The closure of a kernel item set: repeatedly expands items with a
/// nonterminal after the dot into the productions of that nonterminal, at
/// every lookahead terminal `FIRST` of the remaining tail could produce
/// (spec §4.4).
pub fn closure(kernel: OrderedSet<Item>, g: &Grammar, firsts: &FirstSets) -> OrderedSet<Item> {
  let mut items = kernel;
  loop {
    let mut additions: Array<Item> = Array::new();
    for item in &items {
      if let Some(GrammarSymbol::Nonterminal(b)) = g.symbol_at(item.production, item.dot as usize) {
        let tail = tail_after_dot(g, item);
        let lookaheads = firsts.of_sequence(&tail, item.lookahead);
        for &bp in &g.nonterminal(b).productions {
          for &la in &lookaheads {
            additions.push(Item { production: bp, dot: 0, lookahead: la });
          }
        }
      }
    }
    let mut changed = false;
    for item in additions {
      if items.insert(item) {
        changed = true;
      }
    }
    if !changed {
      break;
    }
  }
  items
}

/// `goto(items, symbol)`: the closed item set reached by advancing the dot
/// past `symbol` in every item of `items` that has `symbol` immediately
/// after its dot.
pub fn goto(items: &OrderedSet<Item>, symbol: GrammarSymbol, g: &Grammar, firsts: &FirstSets) -> OrderedSet<Item> {
  let mut kernel = OrderedSet::new();
  for item in items {
    if g.symbol_at(item.production, item.dot as usize) == Some(symbol) {
      kernel.insert(Item { production: item.production, dot: item.dot + 1, lookahead: item.lookahead });
    }
  }
  closure(kernel, g, firsts)
}

/// Every symbol that appears immediately after a dot in `items`, in the
/// order first encountered — the outgoing transitions to compute `goto` for.
pub fn symbols_after_dot(items: &OrderedSet<Item>, g: &Grammar) -> Array<GrammarSymbol> {
  let mut seen = Set::new();
  let mut out = Array::new();
  for item in items {
    if let Some(symbol) = g.symbol_at(item.production, item.dot as usize) {
      if seen.insert(symbol) {
        out.push(symbol);
      }
    }
  }
  out
}
