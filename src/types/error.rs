//! Error and diagnostic plumbing.
//!
//! The teacher crate (`radlr_core`) hand-rolls its own `SherpaError` enum and
//! a `Journal` that collects reports, with no logging or error-handling
//! dependency. `gramforge-core` follows the same shape: [`GramforgeError`] is
//! the synchronous failure type for user-input errors and internal invariant
//! failures (spec §7), while build-time grammar problems that should not
//! abort the whole build are [`BuilderDiagnostic`]s collected into a
//! [`DiagnosticSink`] and forwarded to the caller's `on_diagnostic` hook.

use std::fmt::{self, Display};

pub type GramforgeResult<T> = Result<T, GramforgeError>;

/// Stable diagnostic codes from spec §6. Warnings and errors raised by the
/// core MUST carry one of these; informational/debug/verbose diagnostics may
/// omit a code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DiagnosticCode {
  /// `FARKLE0001`: the DFA subset construction exceeded its state budget.
  DfaStateLimitExceeded,
  /// `FARKLE0002`: a DFA state retained more than one accept after
  /// priority/index tie-breaking.
  IndistinguishableSymbols,
  /// `FARKLE0003`: an unresolved shift/reduce conflict.
  ShiftReduceConflict,
  /// `FARKLE0004`: an unresolved reduce/reduce conflict.
  ReduceReduceConflict,
  /// `FARKLE0005`: an accept/reduce conflict. Always a hard error.
  AcceptReduceConflict,
}

impl DiagnosticCode {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::DfaStateLimitExceeded => "FARKLE0001",
      Self::IndistinguishableSymbols => "FARKLE0002",
      Self::ShiftReduceConflict => "FARKLE0003",
      Self::ReduceReduceConflict => "FARKLE0004",
      Self::AcceptReduceConflict => "FARKLE0005",
    }
  }
}

impl Display for DiagnosticCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Diagnostic severities, ordered least to most severe (spec §6).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity {
  Verbose,
  Debug,
  Information,
  Warning,
  Error,
}

impl Severity {
  pub fn is_error(&self) -> bool {
    matches!(self, Self::Error)
  }
}

/// A single diagnostic raised during a build. Collected by a
/// [`DiagnosticSink`] rather than propagated as a `Result` error, so that a
/// build can surface as many problems as possible before giving up (spec
/// §7).
#[derive(Clone, Debug)]
pub struct BuilderDiagnostic {
  pub severity: Severity,
  pub code:     Option<DiagnosticCode>,
  pub message:  String,
}

impl BuilderDiagnostic {
  pub fn new(severity: Severity, code: Option<DiagnosticCode>, message: impl Into<String>) -> Self {
    debug_assert!(
      code.is_some() || severity < Severity::Warning,
      "warnings and errors must carry a stable diagnostic code"
    );
    Self { severity, code, message: message.into() }
  }

  pub fn info(message: impl Into<String>) -> Self {
    Self::new(Severity::Information, None, message)
  }

  pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
    Self::new(Severity::Warning, Some(code), message)
  }

  pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
    Self::new(Severity::Error, Some(code), message)
  }
}

impl Display for BuilderDiagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.code {
      Some(code) => write!(f, "[{:?}:{}] {}", self.severity, code, self.message),
      None => write!(f, "[{:?}] {}", self.severity, self.message),
    }
  }
}

/// Collects diagnostics raised over the course of one build and forwards
/// each one, as it is raised, to an optional caller-supplied callback. This
/// plays the role of `radlr_core`'s `Journal`/`Report`.
#[derive(Default)]
pub struct DiagnosticSink {
  records:      Vec<BuilderDiagnostic>,
  on_diagnostic: Option<Box<dyn FnMut(&BuilderDiagnostic)>>,
}

impl DiagnosticSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_listener(listener: impl FnMut(&BuilderDiagnostic) + 'static) -> Self {
    Self { records: Vec::new(), on_diagnostic: Some(Box::new(listener)) }
  }

  pub fn push(&mut self, diagnostic: BuilderDiagnostic) {
    if let Some(listener) = self.on_diagnostic.as_mut() {
      listener(&diagnostic);
    }
    #[cfg(feature = "auto_print_diagnostics")]
    eprintln!("{diagnostic}");
    self.records.push(diagnostic);
  }

  pub fn info(&mut self, message: impl Into<String>) {
    self.push(BuilderDiagnostic::info(message));
  }

  pub fn warning(&mut self, code: DiagnosticCode, message: impl Into<String>) {
    self.push(BuilderDiagnostic::warning(code, message));
  }

  pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>) {
    self.push(BuilderDiagnostic::error(code, message));
  }

  pub fn records(&self) -> &[BuilderDiagnostic] {
    &self.records
  }

  /// A grammar is `Unparsable` if any error-severity diagnostic was raised
  /// over the life of the sink (spec §7).
  pub fn is_unparsable(&self) -> bool {
    self.records.iter().any(|d| d.severity.is_error())
  }
}

/// Synchronous failures: user-input errors and internal invariant failures
/// (spec §7). Grammar-level problems that the build can route around are
/// [`BuilderDiagnostic`]s instead.
#[derive(Clone, Debug)]
pub enum GramforgeError {
  /// A character range was given with `end < start`.
  ReverseCharRange { start: u32, end: u32 },
  /// A `loop(min, max)` was given with `max < min`, or a negative bound.
  InvalidLoopBounds { min: u32, max: u32 },
  /// The unbounded-loop sentinel (`u32::MAX`) was used as a finite bound.
  UnboundedSentinelMisuse,
  /// The string heap or blob heap exceeded its `2^24 - 1` byte size cap.
  HeapOverflow { heap: &'static str, attempted: usize },
  /// A string destined for the string heap contained an embedded NUL byte.
  EmbeddedNul,
  /// A `GrammarDefinition` was incomplete: a promised group, production, or
  /// member was never added before `WriteTo`/`build` was invoked.
  IncompleteGrammarDefinition(String),
  /// A regex-string pattern failed to parse.
  RegexStringSyntax(String),
  /// A construct like `\p{...}` parsed syntactically but is semantically
  /// unsupported (spec §4.6).
  UnsupportedRegexConstruct(&'static str),
  /// The terminal table invariant was violated: a terminal token symbol was
  /// registered after a non-terminal one (spec §3).
  TerminalOrderingViolation,
  /// An internal invariant was violated; this indicates a bug in the core,
  /// not a problem with caller input.
  Internal(String),
  /// A caller-requested cancellation was observed at a cooperative
  /// cancellation point (spec §5).
  Cancelled,
}

impl Display for GramforgeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ReverseCharRange { start, end } => write!(f, "reverse character range: {start:#x}..{end:#x} has end < start"),
      Self::InvalidLoopBounds { min, max } => write!(f, "invalid loop bounds: min={min}, max={max}"),
      Self::UnboundedSentinelMisuse => write!(f, "the unbounded-loop sentinel was used as a finite maximum"),
      Self::HeapOverflow { heap, attempted } => {
        write!(f, "{heap} heap exceeded its 2^24-1 byte capacity (attempted {attempted} bytes)")
      }
      Self::EmbeddedNul => write!(f, "string heap entries may not contain an embedded NUL byte"),
      Self::IncompleteGrammarDefinition(what) => write!(f, "incomplete grammar definition: {what}"),
      Self::RegexStringSyntax(msg) => write!(f, "regex syntax error: {msg}"),
      Self::UnsupportedRegexConstruct(what) => write!(f, "unsupported regex construct: {what} is not supported"),
      Self::TerminalOrderingViolation => {
        write!(f, "a terminal token symbol was registered after a non-terminal token symbol")
      }
      Self::Internal(msg) => write!(f, "internal error (this is a bug): {msg}"),
      Self::Cancelled => write!(f, "operation cancelled"),
    }
  }
}

impl std::error::Error for GramforgeError {}
