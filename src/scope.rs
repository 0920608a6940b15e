//! Lexical scope tracking for the code generator.
//!
//! A stack of frames, one per block, each mapping a variable name to its
//! byte offset below the frame base. Lookup walks innermost-outward so an
//! inner declaration shadows an outer one; duplicate checking only ever
//! consults the innermost frame. Offsets are handed out by the generator
//! and never reused within a function.

use std::collections::HashMap;

/// Stack of per-block name→offset frames.
#[derive(Debug, Default)]
pub struct ScopeStack {
  frames: Vec<HashMap<String, i64>>,
}

impl ScopeStack {
  pub fn new() -> Self {
    Self::default()
  }

  /// Enter a block.
  pub fn push_frame(&mut self) {
    self.frames.push(HashMap::new());
  }

  /// Leave a block, forgetting its declarations.
  pub fn pop_frame(&mut self) {
    self.frames.pop();
  }

  /// Whether `name` is declared in the innermost frame. Outer frames are
  /// not consulted; shadowing them is allowed.
  pub fn declared_in_current(&self, name: &str) -> bool {
    self
      .frames
      .last()
      .is_some_and(|frame| frame.contains_key(name))
  }

  /// Insert `name` into the innermost frame. Returns false without
  /// inserting when the name already exists in that frame.
  pub fn declare(&mut self, name: &str, offset: i64) -> bool {
    let frame = self
      .frames
      .last_mut()
      .expect("declare called outside any scope frame");
    if frame.contains_key(name) {
      return false;
    }
    frame.insert(name.to_string(), offset);
    true
  }

  /// Resolve `name` to its offset, searching innermost-first.
  pub fn resolve(&self, name: &str) -> Option<i64> {
    self
      .frames
      .iter()
      .rev()
      .find_map(|frame| frame.get(name).copied())
  }
}
