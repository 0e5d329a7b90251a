//! Builder configuration (spec §6): values that change caller ergonomics
//! (`BuilderOptions`) versus values that change the produced grammar
//! (`GlobalGrammarOptions`), kept as two plain, `Default`-implementing
//! structs rather than a single config blob, mirroring the teacher's
//! `ParserConfig` shape.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::lalr::precedence::OperatorScope;
use crate::types::Severity;

/// A cooperative cancellation flag shared between a caller and one build
/// invocation (spec §5). Checked at explicit points in the orchestration; it
/// is never polled from a background thread by this crate.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

/// Caller ergonomics that do not change the produced grammar (spec §6).
pub struct BuilderOptions {
  pub cancellation_token: Option<CancellationToken>,
  /// Overrides the `max(256, 16 * leafCount)` DFA state budget (spec §4.3, §9).
  pub max_tokenizer_states: Option<usize>,
  /// The minimum severity a diagnostic must carry to be pushed to the sink's
  /// listener; diagnostics below this level are still recorded.
  pub log_level: Severity,
  /// Whether an unresolved LR conflict survives as GLR multi-action storage
  /// (`Warning`) or falls back to a deterministic choice (`Error`). Defaults
  /// to the `glr` feature flag.
  pub allow_glr: bool,
}

impl Default for BuilderOptions {
  fn default() -> Self {
    Self { cancellation_token: None, max_tokenizer_states: None, log_level: Severity::Information, allow_glr: cfg!(feature = "glr") }
  }
}

/// Values that change the produced grammar (spec §6): case sensitivity,
/// auto-whitespace, comments, noise symbols, and the operator scope.
pub struct GlobalGrammarOptions {
  pub grammar_name: String,
  pub case_sensitive: bool,
  pub auto_whitespace: bool,
  /// When `false` and a terminal named `NewLine` is registered, the
  /// generated whitespace noise symbol excludes `\n` so newlines remain
  /// individually visible to the grammar (spec §4.7 step 5).
  pub newline_is_noise: bool,
  pub operator_scope: OperatorScope,
  /// Extra noise terminals beyond whitespace, as `(name, regex)` pairs
  /// (spec §4.7 step 6).
  pub noise_symbols: Vec<(String, crate::regex::Regex)>,
  pub line_comment: Option<String>,
  pub block_comment: Option<(String, String)>,
}

impl Default for GlobalGrammarOptions {
  fn default() -> Self {
    Self {
      grammar_name: String::new(),
      case_sensitive: true,
      auto_whitespace: true,
      newline_is_noise: true,
      operator_scope: OperatorScope::default(),
      noise_symbols: Vec::new(),
      line_comment: None,
      block_comment: None,
    }
  }
}
