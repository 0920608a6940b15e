//! Shared error types used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – every variant carries the
//! byte range it refers to, and the driver renders locations through
//! [`crate::source::Source`]. Semantic errors abort code generation at the
//! first failure; there is no accumulation.

use snafu::Snafu;

use crate::source::Range;

pub type CompileResult<T> = Result<T, CompileError>;

/// Errors reported while turning source text into assembly.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  /// Lexical or syntactic failure from the front end.
  #[snafu(display("{message}"))]
  Syntax { message: String, range: Range },

  /// A variable reference or assignment target that no enclosing scope
  /// frame declares.
  #[snafu(display("undeclared variable '{name}'"))]
  UndeclaredVariable { name: String, range: Range },

  /// A declaration whose name already exists in the innermost frame.
  #[snafu(display("variable '{name}' already declared in this scope"))]
  DuplicateDeclaration { name: String, range: Range },

  /// The assembly output sink rejected a write.
  #[snafu(display("failed to write assembly text"))]
  Emit { source: std::fmt::Error },
}

impl CompileError {
  /// Construct a front-end error anchored at a byte range.
  pub fn syntax(message: impl Into<String>, range: Range) -> Self {
    Self::Syntax {
      message: message.into(),
      range,
    }
  }

  /// The source range this error points at.
  pub fn range(&self) -> Range {
    match self {
      Self::Syntax { range, .. }
      | Self::UndeclaredVariable { range, .. }
      | Self::DuplicateDeclaration { range, .. } => *range,
      Self::Emit { .. } => Range::default(),
    }
  }
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Failures from the assemble-and-link step.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BuildError {
  #[snafu(display("could not find '{tool}' on PATH"))]
  ToolNotFound { tool: String, source: which::Error },

  #[snafu(display("{tool} exited with {status}"))]
  ToolFailed {
    tool: String,
    status: std::process::ExitStatus,
  },

  #[snafu(display("failed to {action}"))]
  BuildIo {
    action: String,
    source: std::io::Error,
  },
}
