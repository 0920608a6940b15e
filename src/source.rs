//! Source bookkeeping for diagnostics.
//!
//! Errors produced by the pipeline carry a byte [`Range`] into the input;
//! this module owns the text and the line-start table needed to turn such
//! a range back into a `path:line:col` location with a caret marker.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CompileError;

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
  pub start: usize,
  pub end: usize,
}

impl Range {
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }
}

/// One compilation unit: its path, full text, and line-start offsets.
#[derive(Debug)]
pub struct Source {
  path: PathBuf,
  text: String,
  line_starts: Vec<usize>,
}

impl Source {
  pub fn new(path: impl Into<PathBuf>, text: String) -> Self {
    let mut line_starts = vec![0];
    for (i, byte) in text.bytes().enumerate() {
      if byte == b'\n' {
        line_starts.push(i + 1);
      }
    }
    Self {
      path: path.into(),
      text,
      line_starts,
    }
  }

  pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    Ok(Self::new(path, text))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  /// Map a byte offset to a 1-based (line, column) pair.
  pub fn line_col(&self, pos: usize) -> (usize, usize) {
    let line = self.line_starts.partition_point(|&start| start <= pos);
    let col = pos - self.line_starts[line - 1] + 1;
    (line, col)
  }

  /// The text of a 1-based line, without its trailing newline.
  fn line(&self, line: usize) -> &str {
    let start = self.line_starts[line - 1];
    let end = self
      .line_starts
      .get(line)
      .map(|&next| next - 1)
      .unwrap_or(self.text.len());
    self.text[start..end].trim_end_matches('\r')
  }

  /// Format a compile error as `path:line:col: error: message` followed by
  /// the offending line and a caret marker under the reported range.
  pub fn render(&self, err: &CompileError) -> String {
    let range = err.range();
    let pos = range.start.min(self.text.len());
    let (line, col) = self.line_col(pos);
    let line_text = self.line(line);
    let width = range.end.saturating_sub(range.start).max(1);
    let width = width.min(line_text.len().saturating_sub(col - 1).max(1));
    format!(
      "{}:{line}:{col}: error: {err}\n  {line_text}\n  {}{}",
      self.path.display(),
      " ".repeat(col - 1),
      "^".repeat(width),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;

  #[test]
  fn line_col_first_line() {
    let source = Source::new("t.c", "int main() { return 0; }".to_string());
    assert_eq!(source.line_col(0), (1, 1));
    assert_eq!(source.line_col(4), (1, 5));
  }

  #[test]
  fn line_col_later_lines() {
    let source = Source::new("t.c", "int main() {\n  return 0;\n}\n".to_string());
    assert_eq!(source.line_col(13), (2, 1));
    assert_eq!(source.line_col(15), (2, 3));
    assert_eq!(source.line_col(25), (3, 1));
  }

  #[test]
  fn render_points_at_range() {
    let source = Source::new("t.c", "int main() { return y; }".to_string());
    let err = CompileError::UndeclaredVariable {
      name: "y".to_string(),
      range: Range::new(20, 21),
    };
    let rendered = source.render(&err);
    assert!(rendered.starts_with("t.c:1:21: error: undeclared variable 'y'"));
    let marker = rendered.lines().last().unwrap_or_default();
    assert_eq!(marker, format!("  {}^", " ".repeat(20)));
  }
}
