//! Aho-Sethi-Ullman position computation (spec §4.3): lowers a [`Regex`]
//! tree into leaves plus a `followpos` relation, threading firstpos/lastpos/
//! nullable up from the leaves.

use std::collections::BTreeSet;

use super::leaf::Leaf;
use crate::regex::{CaseOverride, Regex, UNBOUNDED};
use crate::types::GramforgeResult;

type PosSet = BTreeSet<usize>;

fn singleton(idx: usize) -> PosSet {
  let mut s = PosSet::new();
  s.insert(idx);
  s
}

/// The first non-[`CaseOverride::Inherit`] of `node` or `inherited` wins
/// (spec §3).
fn resolve_case(node: CaseOverride, inherited: CaseOverride) -> CaseOverride {
  if node == CaseOverride::Inherit { inherited } else { node }
}

/// Accumulates leaves and their `followpos` sets as regex trees are lowered.
/// One `Lowerer` spans every terminal in a grammar, so that leaf indices (and
/// thus DFA positions) are unique across the whole automaton.
#[derive(Default)]
pub struct Lowerer {
  pub leaves:    Vec<Leaf>,
  pub followpos: Vec<PosSet>,
}

impl Lowerer {
  pub fn push_leaf(&mut self, leaf: Leaf) -> usize {
    self.leaves.push(leaf);
    self.followpos.push(PosSet::new());
    self.leaves.len() - 1
  }

  /// Lowers `regex` under `inherited_case`, returning `(firstpos, lastpos,
  /// nullable)` for the subtree. Mutates `self.leaves`/`self.followpos` in
  /// place as new positions are discovered.
  pub fn lower(&mut self, regex: &Regex, inherited_case: CaseOverride) -> GramforgeResult<(PosSet, PosSet, bool)> {
    let case = resolve_case(regex.case(), inherited_case);
    match regex {
      Regex::Any { .. } => {
        let idx = self.push_leaf(Leaf::Any);
        Ok((singleton(idx), singleton(idx), false))
      }

      Regex::CharSet { ranges, .. } => {
        let idx = self.push_leaf(Leaf::Chars { ranges: fold_ranges(ranges, case), inverted: false });
        Ok((singleton(idx), singleton(idx), false))
      }

      Regex::InverseCharSet { ranges, .. } => {
        let idx = self.push_leaf(Leaf::Chars { ranges: fold_ranges(ranges, case), inverted: true });
        Ok((singleton(idx), singleton(idx), false))
      }

      Regex::StringLiteral { value, .. } => self.lower_literal(value, case),

      Regex::Concat { parts, .. } => {
        let mut acc: Option<(PosSet, PosSet, bool)> = None;
        for part in parts {
          let next = self.lower(part, case)?;
          self.concat_fold(&mut acc, next);
        }
        Ok(acc.unwrap_or_else(|| (PosSet::new(), PosSet::new(), true)))
      }

      Regex::Alt { parts, .. } => {
        let mut first = PosSet::new();
        let mut last = PosSet::new();
        let mut nullable = false;
        for part in parts {
          let (f, l, n) = self.lower(part, case)?;
          first.extend(f);
          last.extend(l);
          nullable |= n;
        }
        Ok((first, last, nullable))
      }

      Regex::Loop { min, max, inner, .. } => self.lower_loop(*min, *max, inner, case),

      Regex::RegexString { .. } => {
        // The orchestrator runs `Regex::lower_regex_strings` before handing
        // a tree to the DFA builder, so this never executes in practice.
        Err(crate::types::GramforgeError::Internal("encountered an unresolved RegexString during DFA lowering".into()))
      }
    }
  }

  fn lower_literal(&mut self, value: &str, case: CaseOverride) -> GramforgeResult<(PosSet, PosSet, bool)> {
    if value.is_empty() {
      return Ok((PosSet::new(), PosSet::new(), true));
    }
    let mut acc: Option<(PosSet, PosSet, bool)> = None;
    for unit in value.encode_utf16() {
      let ranges = fold_ranges(&[crate::regex::CharRange::single(unit)], case);
      let idx = self.push_leaf(Leaf::Chars { ranges, inverted: false });
      self.concat_fold(&mut acc, (singleton(idx), singleton(idx), false));
    }
    Ok(acc.expect("non-empty literal always lowers at least one leaf"))
  }

  /// Folds one more concatenation term `next` into the running `acc`,
  /// threading `followpos` edges from the previous term's `lastpos` to
  /// `next`'s `firstpos` (the standard binary-concat rule, applied left to
  /// right across an n-ary sequence).
  fn concat_fold(&mut self, acc: &mut Option<(PosSet, PosSet, bool)>, next: (PosSet, PosSet, bool)) {
    match acc.take() {
      None => *acc = Some(next),
      Some((prev_first, prev_last, prev_nullable)) => {
        let (next_first, next_last, next_nullable) = next;
        for &p in &prev_last {
          self.followpos[p].extend(next_first.iter().copied());
        }
        let first = if prev_nullable { prev_first.union(&next_first).copied().collect() } else { prev_first };
        let last = if next_nullable { next_last.union(&prev_last).copied().collect() } else { next_last };
        *acc = Some((first, last, prev_nullable && next_nullable));
      }
    }
  }

  /// Unrolls `Loop(min, max, inner)` per spec §4.3: `min` mandatory copies
  /// followed either by one starred copy (unbounded max) or `max - min`
  /// optional copies (finite max). Each copy is a fresh call to `lower`, so
  /// every repetition gets its own distinct leaves.
  fn lower_loop(&mut self, min: u32, max: u32, inner: &Regex, case: CaseOverride) -> GramforgeResult<(PosSet, PosSet, bool)> {
    let mut acc: Option<(PosSet, PosSet, bool)> = None;
    for _ in 0..min {
      let part = self.lower(inner, case)?;
      self.concat_fold(&mut acc, part);
    }
    if max == UNBOUNDED {
      let (first, last, _) = self.lower(inner, case)?;
      for &p in &last {
        self.followpos[p].extend(first.iter().copied());
      }
      self.concat_fold(&mut acc, (first, last, true));
    } else {
      for _ in 0..(max - min) {
        let (first, last, _) = self.lower(inner, case)?;
        self.concat_fold(&mut acc, (first, last, true));
      }
    }
    Ok(acc.unwrap_or_else(|| (PosSet::new(), PosSet::new(), true)))
  }
}

fn fold_ranges(ranges: &[crate::regex::CharRange], case: CaseOverride) -> Vec<crate::regex::CharRange> {
  crate::regex::ranges::canonicalize(ranges, case == CaseOverride::CaseInsensitive)
}

/// Whether `regex` contains a star/unbounded loop anywhere in its tree (spec
/// §4.3's sub-regex priority rule). Walks the *original*, un-lowered tree.
pub fn has_unbounded_repetition(regex: &Regex) -> bool {
  match regex {
    Regex::Loop { max, inner, .. } => *max == UNBOUNDED || has_unbounded_repetition(inner),
    Regex::Concat { parts, .. } | Regex::Alt { parts, .. } => parts.iter().any(has_unbounded_repetition),
    _ => false,
  }
}

/// Whether `regex` contains an unmatchable void sub-expression (an empty,
/// non-inverted character set) anywhere in its tree.
pub fn has_void(regex: &Regex) -> bool {
  match regex {
    Regex::CharSet { ranges, .. } => ranges.is_empty(),
    Regex::Loop { inner, .. } => has_void(inner),
    Regex::Concat { parts, .. } | Regex::Alt { parts, .. } => parts.iter().any(has_void),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::regex::CharRange;

  #[test]
  fn literal_lowers_to_a_chain_with_threaded_followpos() {
    let mut lowerer = Lowerer::default();
    let (first, last, nullable) = lowerer.lower(&Regex::literal("ab"), CaseOverride::Inherit).unwrap();
    assert!(!nullable);
    assert_eq!(lowerer.leaves.len(), 2);
    assert_eq!(first, singleton(0));
    assert_eq!(last, singleton(1));
    assert_eq!(lowerer.followpos[0], singleton(1));
    assert!(lowerer.followpos[1].is_empty());
  }

  #[test]
  fn empty_literal_is_nullable_with_no_leaves() {
    let mut lowerer = Lowerer::default();
    let (first, last, nullable) = lowerer.lower(&Regex::empty(), CaseOverride::Inherit).unwrap();
    assert!(nullable);
    assert!(first.is_empty());
    assert!(last.is_empty());
    assert!(lowerer.leaves.is_empty());
  }

  #[test]
  fn star_loop_self_loops_its_lastpos_into_its_firstpos() {
    let mut lowerer = Lowerer::default();
    let star = Regex::repeat(0, UNBOUNDED, Regex::one_of(vec![CharRange::single(b'a' as u16)]).unwrap()).unwrap();
    let (first, last, nullable) = lowerer.lower(&star, CaseOverride::Inherit).unwrap();
    assert!(nullable);
    assert_eq!(first, last);
    for &p in &last {
      assert_eq!(lowerer.followpos[p], first);
    }
  }

  #[test]
  fn bounded_loop_unrolls_into_distinct_leaves_per_copy() {
    let mut lowerer = Lowerer::default();
    let bounded = Regex::repeat(1, 3, Regex::one_of(vec![CharRange::single(b'x' as u16)]).unwrap()).unwrap();
    lowerer.lower(&bounded, CaseOverride::Inherit).unwrap();
    // 1 mandatory + 2 optional copies, each a single leaf.
    assert_eq!(lowerer.leaves.len(), 3);
  }

  #[test]
  fn exact_zero_loop_degenerates_to_empty() {
    let mut lowerer = Lowerer::default();
    let zero = Regex::repeat(0, 0, Regex::any()).unwrap();
    let (first, last, nullable) = lowerer.lower(&zero, CaseOverride::Inherit).unwrap();
    assert!(nullable);
    assert!(first.is_empty());
    assert!(last.is_empty());
    assert!(lowerer.leaves.is_empty());
  }

  #[test]
  fn has_unbounded_repetition_detects_nested_stars() {
    let nested = Regex::join(vec![Regex::literal("a"), Regex::repeat(0, UNBOUNDED, Regex::literal("b")).unwrap()]);
    assert!(has_unbounded_repetition(&nested));
    assert!(!has_unbounded_repetition(&Regex::literal("abc")));
  }

  #[test]
  fn has_void_detects_empty_charset_anywhere() {
    let with_void = Regex::join(vec![Regex::literal("a"), Regex::void()]);
    assert!(has_void(&with_void));
    assert!(!has_void(&Regex::literal("a")));
  }
}
