//! The regex algebra (spec §4.1): a sum-typed expression tree with lazy
//! construction, per-node case-sensitivity override, and algebraic
//! simplification on concat/alt.

pub mod ranges;
pub mod string_parser;

pub use ranges::CharRange;

use crate::types::{GramforgeError, GramforgeResult};

/// The sentinel `Loop` maximum meaning "unbounded". `u32::MAX` itself is
/// reserved and may never appear as a finite bound (spec §3).
pub const UNBOUNDED: u32 = u32::MAX;

/// A per-node case-sensitivity override. During DFA lowering, the first
/// non-`Inherit` ancestor (nearest enclosing override) wins (spec §3).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CaseOverride {
  #[default]
  Inherit,
  CaseSensitive,
  CaseInsensitive,
}

/// The regex syntax tree. Seven matching shapes (`Any`, `StringLiteral`,
/// `CharSet`, `InverseCharSet`, `Concat`, `Alt`, `Loop`) plus the deferred
/// `RegexString` variant used to hold a not-yet-parsed textual pattern
/// (spec §3, §9 "Deferred regex-string parsing"). `empty()` is represented
/// as the zero-length string literal and `void()` as an empty character set,
/// so no separate tree shapes are needed for them.
#[derive(Clone, Debug)]
pub enum Regex {
  Any { case: CaseOverride },
  StringLiteral { value: String, case: CaseOverride },
  CharSet { ranges: Vec<CharRange>, case: CaseOverride },
  InverseCharSet { ranges: Vec<CharRange>, case: CaseOverride },
  Concat { parts: Vec<Regex>, case: CaseOverride },
  Alt { parts: Vec<Regex>, case: CaseOverride },
  Loop { min: u32, max: u32, inner: Box<Regex>, case: CaseOverride },
  /// A user-supplied textual pattern, lowered lazily by
  /// [`string_parser::parse`] the first time the DFA builder visits it.
  RegexString { pattern: String, case: CaseOverride },
}

impl Regex {
  pub fn any() -> Self {
    Self::Any { case: CaseOverride::Inherit }
  }

  /// Matches the empty string.
  pub fn empty() -> Self {
    Self::StringLiteral { value: String::new(), case: CaseOverride::Inherit }
  }

  /// Matches nothing. Internal; produced by `choice([])` and usable as a
  /// deliberate "this symbol is unmatchable" marker.
  pub fn void() -> Self {
    Self::CharSet { ranges: Vec::new(), case: CaseOverride::Inherit }
  }

  pub fn literal(value: impl Into<String>) -> Self {
    Self::StringLiteral { value: value.into(), case: CaseOverride::Inherit }
  }

  pub fn one_of(ranges: Vec<CharRange>) -> GramforgeResult<Self> {
    validate_ranges(&ranges)?;
    Ok(Self::CharSet { ranges: ranges::canonicalize(&ranges, false), case: CaseOverride::Inherit })
  }

  pub fn not_one_of(ranges: Vec<CharRange>) -> GramforgeResult<Self> {
    validate_ranges(&ranges)?;
    Ok(Self::InverseCharSet { ranges: ranges::canonicalize(&ranges, false), case: CaseOverride::Inherit })
  }

  /// Concatenation. Flattens nested `Concat`s, collapses adjacent string
  /// literals that share a case flag, unwraps a single-element sequence,
  /// and reduces an empty sequence to `empty()` (spec §4.1).
  pub fn join(parts: Vec<Regex>) -> Self {
    let mut flat = Vec::with_capacity(parts.len());
    for part in parts {
      match part {
        Regex::Concat { parts: inner, case } if case == CaseOverride::Inherit => flat.extend(inner),
        other => flat.push(other),
      }
    }

    let mut merged: Vec<Regex> = Vec::with_capacity(flat.len());
    for part in flat {
      match (merged.last_mut(), &part) {
        (
          Some(Regex::StringLiteral { value: prev, case: prev_case }),
          Regex::StringLiteral { value: next, case: next_case },
        ) if prev_case == next_case => {
          prev.push_str(next);
        }
        _ => merged.push(part),
      }
    }

    match merged.len() {
      0 => Self::empty(),
      1 => merged.into_iter().next().unwrap(),
      _ => Self::Concat { parts: merged, case: CaseOverride::Inherit },
    }
  }

  /// Alternation. Flattens nested `Alt`s, merges adjacent non-inverted
  /// character sets that share a case flag via the range canonicalizer, and
  /// reduces an empty sequence to `void()` (spec §4.1).
  pub fn choice(parts: Vec<Regex>) -> Self {
    let mut flat = Vec::with_capacity(parts.len());
    for part in parts {
      match part {
        Regex::Alt { parts: inner, case } if case == CaseOverride::Inherit => flat.extend(inner),
        other => flat.push(other),
      }
    }

    let mut merged: Vec<Regex> = Vec::with_capacity(flat.len());
    for part in flat {
      match (merged.last_mut(), &part) {
        (Some(Regex::CharSet { ranges: prev, case: prev_case }), Regex::CharSet { ranges: next, case: next_case })
          if prev_case == next_case =>
        {
          let union: Vec<CharRange> = prev.iter().chain(next.iter()).copied().collect();
          *prev = ranges::canonicalize(&union, false);
        }
        _ => merged.push(part),
      }
    }

    match merged.len() {
      0 => Self::void(),
      1 => merged.into_iter().next().unwrap(),
      _ => Self::Alt { parts: merged, case: CaseOverride::Inherit },
    }
  }

  /// Bounded/unbounded repetition. `max == UNBOUNDED` means "no upper
  /// bound"; any other value `< UNBOUNDED` is a literal finite maximum.
  /// Idempotent if `inner` is already a `Loop` with the same bounds and the
  /// same case-sensitivity flags (spec §4.1, "only when both operands share
  /// the same case-sensitivity flags").
  pub fn repeat(min: u32, max: u32, inner: Regex) -> GramforgeResult<Self> {
    if max != UNBOUNDED && max < min {
      return Err(GramforgeError::InvalidLoopBounds { min, max });
    }
    if let Regex::Loop { min: inner_min, max: inner_max, inner: grandchild, case } = &inner {
      if *inner_min == min && *inner_max == max && *case == CaseOverride::Inherit {
        return Ok(Regex::Loop { min, max, inner: grandchild.clone(), case: CaseOverride::Inherit });
      }
    }
    Ok(Self::Loop { min, max, inner: Box::new(inner), case: CaseOverride::Inherit })
  }

  pub fn from_pattern(pattern: impl Into<String>) -> Self {
    Self::RegexString { pattern: pattern.into(), case: CaseOverride::Inherit }
  }

  pub fn case_sensitive(self) -> Self {
    self.with_case(CaseOverride::CaseSensitive)
  }

  pub fn case_insensitive(self) -> Self {
    self.with_case(CaseOverride::CaseInsensitive)
  }

  fn with_case(self, case: CaseOverride) -> Self {
    match self {
      Self::Any { .. } => Self::Any { case },
      Self::StringLiteral { value, .. } => Self::StringLiteral { value, case },
      Self::CharSet { ranges, .. } => Self::CharSet { ranges, case },
      Self::InverseCharSet { ranges, .. } => Self::InverseCharSet { ranges, case },
      Self::Concat { parts, .. } => Self::Concat { parts, case },
      Self::Alt { parts, .. } => Self::Alt { parts, case },
      Self::Loop { min, max, inner, .. } => Self::Loop { min, max, inner, case },
      Self::RegexString { pattern, .. } => Self::RegexString { pattern, case },
    }
  }

  pub fn case(&self) -> CaseOverride {
    match self {
      Self::Any { case }
      | Self::StringLiteral { case, .. }
      | Self::CharSet { case, .. }
      | Self::InverseCharSet { case, .. }
      | Self::Concat { case, .. }
      | Self::Alt { case, .. }
      | Self::Loop { case, .. }
      | Self::RegexString { case, .. } => *case,
    }
  }

  /// Resolves any deferred [`Regex::RegexString`] nodes in this tree by
  /// invoking the bootstrap regex-string parser (spec §4.6, §9).
  pub fn lower_regex_strings(self) -> GramforgeResult<Self> {
    match self {
      Self::RegexString { pattern, case } => Ok(string_parser::parse(&pattern)?.with_case(case)),
      Self::Concat { parts, case } => {
        Ok(Self::Concat { parts: lower_all(parts)?, case })
      }
      Self::Alt { parts, case } => Ok(Self::Alt { parts: lower_all(parts)?, case }),
      Self::Loop { min, max, inner, case } => {
        Ok(Self::Loop { min, max, inner: Box::new(inner.lower_regex_strings()?), case })
      }
      other => Ok(other),
    }
  }
}

fn lower_all(parts: Vec<Regex>) -> GramforgeResult<Vec<Regex>> {
  parts.into_iter().map(Regex::lower_regex_strings).collect()
}

fn validate_ranges(ranges: &[CharRange]) -> GramforgeResult<()> {
  for r in ranges {
    if r.end < r.start {
      return Err(GramforgeError::ReverseCharRange { start: r.start as u32, end: r.end as u32 });
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn join_flattens_and_collapses_literals() {
    let r = Regex::join(vec![Regex::literal("abc"), Regex::literal("def")]);
    match r {
      Regex::StringLiteral { value, .. } => assert_eq!(value, "abcdef"),
      other => panic!("expected a collapsed literal, got {other:?}"),
    }
  }

  #[test]
  fn join_of_single_element_unwraps() {
    let r = Regex::join(vec![Regex::literal("x")]);
    assert!(matches!(r, Regex::StringLiteral { .. }));
  }

  #[test]
  fn join_of_empty_sequence_is_empty() {
    let r = Regex::join(vec![]);
    assert!(matches!(r, Regex::StringLiteral { value, .. } if value.is_empty()));
  }

  #[test]
  fn choice_merges_adjacent_ranges() {
    let a = Regex::one_of(vec![CharRange::new(b'a' as u16, b'c' as u16)]).unwrap();
    let b = Regex::one_of(vec![CharRange::new(b'd' as u16, b'f' as u16)]).unwrap();
    let r = Regex::choice(vec![a, b]);
    match r {
      Regex::CharSet { ranges, .. } => assert_eq!(ranges, vec![CharRange::new(b'a' as u16, b'f' as u16)]),
      other => panic!("expected a merged character set, got {other:?}"),
    }
  }

  #[test]
  fn choice_does_not_merge_inverted_sets() {
    let a = Regex::one_of(vec![CharRange::new(b'a' as u16, b'c' as u16)]).unwrap();
    let b = Regex::not_one_of(vec![CharRange::new(b'd' as u16, b'f' as u16)]).unwrap();
    let r = Regex::choice(vec![a, b]);
    assert!(matches!(r, Regex::Alt { .. }));
  }

  #[test]
  fn choice_of_empty_sequence_is_void() {
    let r = Regex::choice(vec![]);
    assert!(matches!(r, Regex::CharSet { ranges, .. } if ranges.is_empty()));
  }

  #[test]
  fn reverse_range_is_rejected() {
    let err = Regex::one_of(vec![CharRange::new(10, 5)]).unwrap_err();
    assert!(matches!(err, GramforgeError::ReverseCharRange { .. }));
  }

  #[test]
  fn loop_with_max_below_min_is_rejected() {
    let err = Regex::repeat(5, 2, Regex::any()).unwrap_err();
    assert!(matches!(err, GramforgeError::InvalidLoopBounds { .. }));
  }

  #[test]
  fn loop_of_loop_with_same_bounds_is_idempotent() {
    let inner = Regex::repeat(1, 3, Regex::any()).unwrap();
    let outer = Regex::repeat(1, 3, inner).unwrap();
    match outer {
      Regex::Loop { min, max, inner, .. } => {
        assert_eq!((min, max), (1, 3));
        assert!(matches!(*inner, Regex::Any { .. }));
      }
      other => panic!("expected a loop, got {other:?}"),
    }
  }

  #[test]
  fn loop_of_loop_does_not_collapse_across_a_case_override() {
    let inner = Regex::repeat(1, 3, Regex::any()).unwrap().case_insensitive();
    let outer = Regex::repeat(1, 3, inner).unwrap();
    match outer {
      Regex::Loop { min, max, inner, case } => {
        assert_eq!((min, max), (1, 3));
        assert_eq!(case, CaseOverride::Inherit);
        match *inner {
          Regex::Loop { case: inner_case, .. } => assert_eq!(inner_case, CaseOverride::CaseInsensitive),
          other => panic!("expected the case-insensitive inner loop to survive, got {other:?}"),
        }
      }
      other => panic!("expected a loop, got {other:?}"),
    }
  }
}
