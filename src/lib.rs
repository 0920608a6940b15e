//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the AST.
//! - `ast` defines the tree itself plus a diagnostic dump.
//! - `scope` resolves variable names to stack-frame offsets.
//! - `codegen` lowers the tree into NASM x86-64 assembly.
//! - `mkexe` drives nasm and ld to produce an ELF executable.
//! - `source` and `error` centralise location and error reporting shared by
//!   the other modules.

use log::debug;

pub mod ast;
pub mod codegen;
pub mod error;
pub mod mkexe;
pub mod parser;
pub mod scope;
pub mod source;
pub mod tokenizer;

pub use ast::Program;
pub use error::{BuildError, CompileError, CompileResult};
pub use source::{Range, Source};

/// Compile a source string into NASM x86-64 assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  debug!("tokenized {} tokens", tokens.len());
  let program = parser::parse(tokens, source)?;
  let mut asm = String::new();
  codegen::generate(&program, &mut asm)?;
  Ok(asm)
}
