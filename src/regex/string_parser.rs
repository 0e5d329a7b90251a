//! The regex-string bootstrap parser (spec §4.6): turns a user-supplied
//! textual pattern into a [`Regex`] tree using the same algebra the DFA
//! builder consumes.
//!
//! The teacher crate builds its own bootstrap grammar/parser lazily behind a
//! single guarded initializer (spec §9, "Global lazy singleton"); here that
//! initializer just builds the escape-class lookup table once per process,
//! since the grammar itself is small enough to parse by a hand-written
//! recursive-descent scan over the character-set/quantifier state machine
//! spec §4.6 describes, rather than by bootstrapping real LALR tables for
//! itself.

use std::sync::OnceLock;

use super::{CharRange, Regex};
use crate::types::{GramforgeError, GramforgeResult};

struct EscapeClasses {
  digit:     Vec<CharRange>,
  not_digit: Vec<CharRange>,
  space:     Vec<CharRange>,
  not_space: Vec<CharRange>,
}

fn escape_classes() -> &'static EscapeClasses {
  static CLASSES: OnceLock<EscapeClasses> = OnceLock::new();
  CLASSES.get_or_init(|| EscapeClasses {
    digit:     vec![CharRange::new(b'0' as u16, b'9' as u16)],
    not_digit: vec![CharRange::new(0, b'0' as u16 - 1), CharRange::new(b'9' as u16 + 1, u16::MAX)],
    space:     vec![
      CharRange::single(b' ' as u16),
      CharRange::single(b'\t' as u16),
      CharRange::single(b'\n' as u16),
      CharRange::single(b'\r' as u16),
      CharRange::single(0x0B),
      CharRange::single(0x0C),
    ],
    not_space: vec![
      CharRange::new(0, 0x08),
      CharRange::new(0x0E, b' ' as u16 - 1),
      CharRange::new(b' ' as u16 + 1, u16::MAX),
    ],
  })
}

const SPECIAL_CHARS: &[char] = &['.', '[', '{', '(', ')', '|', '?', '*', '+', '\\'];

/// Parses a textual regex pattern into a [`Regex`] tree.
pub fn parse(pattern: &str) -> GramforgeResult<Regex> {
  let chars: Vec<char> = pattern.chars().collect();
  let mut parser = Parser { chars: &chars, pos: 0 };
  let regex = parser.parse_alternation()?;
  if parser.pos != parser.chars.len() {
    return Err(GramforgeError::RegexStringSyntax(format!(
      "unexpected trailing input at offset {} in pattern `{}`",
      parser.pos, pattern
    )));
  }
  Ok(regex)
}

struct Parser<'a> {
  chars: &'a [char],
  pos:   usize,
}

impl<'a> Parser<'a> {
  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek();
    if c.is_some() {
      self.pos += 1;
    }
    c
  }

  fn expect(&mut self, c: char) -> GramforgeResult<()> {
    if self.bump() == Some(c) {
      Ok(())
    } else {
      Err(GramforgeError::RegexStringSyntax(format!("expected `{c}` at offset {}", self.pos)))
    }
  }

  // alternation := concat ( '|' concat )*
  fn parse_alternation(&mut self) -> GramforgeResult<Regex> {
    let mut parts = vec![self.parse_concat()?];
    while self.peek() == Some('|') {
      self.bump();
      parts.push(self.parse_concat()?);
    }
    Ok(Regex::choice(parts))
  }

  // concat := quantified*
  fn parse_concat(&mut self) -> GramforgeResult<Regex> {
    let mut parts = Vec::new();
    while let Some(c) = self.peek() {
      if c == '|' || c == ')' {
        break;
      }
      parts.push(self.parse_quantified()?);
    }
    Ok(Regex::join(parts))
  }

  // quantified := atom ( '*' | '+' | '?' | '{' bound '}' )?
  fn parse_quantified(&mut self) -> GramforgeResult<Regex> {
    let atom = self.parse_atom()?;
    match self.peek() {
      Some('*') => {
        self.bump();
        Regex::repeat(0, super::UNBOUNDED, atom)
      }
      Some('+') => {
        self.bump();
        Regex::repeat(1, super::UNBOUNDED, atom)
      }
      Some('?') => {
        self.bump();
        Regex::repeat(0, 1, atom)
      }
      Some('{') => {
        self.bump();
        let (min, max) = self.parse_bound()?;
        self.expect('}')?;
        Regex::repeat(min, max, atom)
      }
      _ => Ok(atom),
    }
  }

  // bound := int ( ',' int? )?
  fn parse_bound(&mut self) -> GramforgeResult<(u32, u32)> {
    let min = self.parse_int()?;
    if self.peek() == Some(',') {
      self.bump();
      if self.peek() == Some('}') {
        Ok((min, super::UNBOUNDED))
      } else {
        let max = self.parse_int()?;
        Ok((min, max))
      }
    } else {
      Ok((min, min))
    }
  }

  fn parse_int(&mut self) -> GramforgeResult<u32> {
    let start = self.pos;
    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
      self.bump();
    }
    if self.pos == start {
      return Err(GramforgeError::RegexStringSyntax(format!("expected an integer at offset {start}")));
    }
    let text: String = self.chars[start..self.pos].iter().collect();
    text
      .parse::<u32>()
      .map_err(|e| GramforgeError::RegexStringSyntax(format!("invalid quantifier integer `{text}`: {e}")))
  }

  // atom := '.' | escape | charset | group | literal-char
  fn parse_atom(&mut self) -> GramforgeResult<Regex> {
    match self.peek() {
      Some('.') => {
        self.bump();
        Ok(Regex::any())
      }
      Some('\\') => self.parse_escape(),
      Some('[') => self.parse_charset(),
      Some('(') => {
        self.bump();
        let inner = self.parse_alternation()?;
        self.expect(')')?;
        Ok(inner)
      }
      Some(c) if !SPECIAL_CHARS.contains(&c) => {
        self.bump();
        Ok(Regex::literal(c.to_string()))
      }
      Some(c) => Err(GramforgeError::RegexStringSyntax(format!("unexpected special character `{c}` at offset {}", self.pos))),
      None => Err(GramforgeError::RegexStringSyntax("unexpected end of pattern".into())),
    }
  }

  fn parse_escape(&mut self) -> GramforgeResult<Regex> {
    self.bump(); // consume '\\'
    match self.bump() {
      Some('d') => Regex::one_of(escape_classes().digit.clone()),
      Some('D') => Regex::one_of(escape_classes().not_digit.clone()),
      Some('s') => Regex::one_of(escape_classes().space.clone()),
      Some('S') => Regex::one_of(escape_classes().not_space.clone()),
      Some('p') | Some('P') => {
        // `\p{...}` / `\P{...}` / `\p[A-Z]` / `\P[A-Z]`: parse the bracketed
        // body for syntactic acceptance, then reject semantically. Unicode
        // category classes are out of scope (spec §1 Non-goals, §4.6).
        match self.peek() {
          Some('{') => {
            self.bump();
            while self.peek().is_some_and(|c| c != '}') {
              self.bump();
            }
            self.expect('}')?;
          }
          Some('[') => {
            self.bump();
            while self.peek().is_some_and(|c| c != ']') {
              self.bump();
            }
            self.expect(']')?;
          }
          _ => return Err(GramforgeError::RegexStringSyntax("expected `{` or `[` after `\\p`/`\\P`".into())),
        }
        Err(GramforgeError::UnsupportedRegexConstruct("unicode category classes (\\p{...}/\\P{...})"))
      }
      Some(c) if SPECIAL_CHARS.contains(&c) => Ok(Regex::literal(c.to_string())),
      Some(c) => Err(GramforgeError::RegexStringSyntax(format!("unrecognized escape `\\{c}`"))),
      None => Err(GramforgeError::RegexStringSyntax("dangling `\\` at end of pattern".into())),
    }
  }

  // charset := '[' '^'? (range | escaped-char)* ']'
  // a small state machine over the raw span, per spec §4.6: it tracks
  // whether the preceding item can be the low end of an `a-z` range.
  fn parse_charset(&mut self) -> GramforgeResult<Regex> {
    self.bump(); // consume '['
    let inverted = self.peek() == Some('^');
    if inverted {
      self.bump();
    }

    let mut ranges: Vec<CharRange> = Vec::new();

    while let Some(c) = self.peek() {
      if c == ']' {
        break;
      }
      let unit = self.read_set_char()?;
      if self.peek() == Some('-') && self.chars.get(self.pos + 1).is_some_and(|&c| c != ']') {
        self.bump(); // consume '-'
        let hi = self.read_set_char()?;
        if hi < unit {
          return Err(GramforgeError::ReverseCharRange { start: unit as u32, end: hi as u32 });
        }
        ranges.push(CharRange::new(unit, hi));
      } else {
        ranges.push(CharRange::single(unit));
      }
    }
    self.expect(']')?;

    if inverted {
      Regex::not_one_of(ranges)
    } else {
      Regex::one_of(ranges)
    }
  }

  fn read_set_char(&mut self) -> GramforgeResult<u16> {
    match self.bump() {
      Some('\\') => match self.bump() {
        Some(c) => Ok(c as u16),
        None => Err(GramforgeError::RegexStringSyntax("dangling `\\` inside character set".into())),
      },
      Some(c) => Ok(c as u16),
      None => Err(GramforgeError::RegexStringSyntax("unterminated character set".into())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_literal_concatenation() {
    let r = parse("abc").unwrap();
    assert!(matches!(r, Regex::StringLiteral { value, .. } if value == "abc"));
  }

  #[test]
  fn parses_alternation_and_grouping() {
    let r = parse("(a|b)c").unwrap();
    assert!(matches!(r, Regex::Concat { .. }));
  }

  #[test]
  fn parses_digit_plus_quantifier() {
    let r = parse("[0-9]+").unwrap();
    match r {
      Regex::Loop { min, max, .. } => assert_eq!((min, max), (1, super::super::UNBOUNDED)),
      other => panic!("expected a loop, got {other:?}"),
    }
  }

  #[test]
  fn parses_bounded_quantifier() {
    let r = parse("a{2,4}").unwrap();
    match r {
      Regex::Loop { min, max, .. } => assert_eq!((min, max), (2, 4)),
      other => panic!("expected a loop, got {other:?}"),
    }
  }

  #[test]
  fn rejects_reverse_range_in_charset() {
    let err = parse("[z-a]").unwrap_err();
    assert!(matches!(err, GramforgeError::ReverseCharRange { .. }));
  }

  #[test]
  fn unicode_category_classes_parse_but_are_rejected() {
    let err = parse("\\p{L}").unwrap_err();
    assert!(matches!(err, GramforgeError::UnsupportedRegexConstruct(_)));
  }

  #[test]
  fn float_like_pattern_parses() {
    let r = parse("[0-9]+\\.[0-9]+").unwrap();
    assert!(matches!(r, Regex::Concat { .. }));
  }
}
