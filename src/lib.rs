//! `gramforge-core`: the grammar build pipeline described in the project's
//! specification — regex algebra, a position-automaton DFA builder, an
//! LALR(1)/GLR table builder with operator-precedence conflict resolution,
//! and a compact versioned binary grammar container.
//!
//! The user-facing fluent grammar-building API, the runtime parser loop that
//! consumes a built [`writer::GrammarImage`], and CLI/packaging concerns are
//! out of scope; this crate only builds the artifacts they consume.

pub mod buffer;
pub mod dfa;
pub mod grammar;
pub mod lalr;
pub mod options;
pub mod regex;
pub mod types;
pub mod writer;

pub use grammar::{build_grammar, build_grammar_image, GrammarDefinition, GroupDef, MemberRef, NonterminalDef, ProductionDef, TerminalDef};
pub use options::{BuilderOptions, CancellationToken, GlobalGrammarOptions};
pub use types::{BuilderDiagnostic, DiagnosticCode, DiagnosticSink, GramforgeError, GramforgeResult, Severity};
pub use writer::GrammarImage;
