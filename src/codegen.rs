//! Code generation: lower the AST into NASM-flavoured x86-64 assembly.
//!
//! The emitter follows an accumulator discipline: every expression leaves
//! its result in `rax`, and binary operators stash the left operand on the
//! machine stack while the right one is computed. Locals live below `rbp`,
//! one slot pushed per declaration, and are resolved through the scope
//! stack. The first semantic error aborts the walk; whatever text was
//! already written stays in the output, so callers discard the buffer on
//! failure.

use std::fmt::Write;

use log::debug;
use snafu::ResultExt;

use crate::ast::{BinaryOp, Expr, Function, Program, Stmt, UnaryOp};
use crate::error::{
  CompileResult, DuplicateDeclarationSnafu, EmitSnafu, UndeclaredVariableSnafu,
};
use crate::scope::ScopeStack;

/// Machine word size in bytes; every local consumes one word.
const WORD: i64 = 8;

/// Emit a whole program to `out`.
pub fn generate(program: &Program, out: &mut impl Write) -> CompileResult<()> {
  debug!("generating code for function '{}'", program.function.name);
  CodeGenerator::new(out).program(program)
}

/// Generation state threaded through one walk of the tree.
struct CodeGenerator<'out, W: Write> {
  out: &'out mut W,
  depth: usize,
  next_label: u64,
  scopes: ScopeStack,
  next_offset: i64,
}

impl<'out, W: Write> CodeGenerator<'out, W> {
  fn new(out: &'out mut W) -> Self {
    Self {
      out,
      depth: 1,
      next_label: 0,
      scopes: ScopeStack::new(),
      next_offset: WORD,
    }
  }

  /// Write one indented instruction line.
  fn emit(&mut self, instruction: &str) -> CompileResult<()> {
    for _ in 0..self.depth {
      write!(self.out, "    ").context(EmitSnafu)?;
    }
    writeln!(self.out, "{instruction}").context(EmitSnafu)
  }

  /// Write a label line at column zero.
  fn emit_label(&mut self, label: &str) -> CompileResult<()> {
    writeln!(self.out, "{label}:").context(EmitSnafu)
  }

  /// Mint a jump target unique within this compilation unit.
  fn fresh_label(&mut self, stem: &str) -> String {
    let label = format!(".L{stem}{}", self.next_label);
    self.next_label += 1;
    label
  }

  fn program(&mut self, program: &Program) -> CompileResult<()> {
    self.emit("section .text")?;
    self.emit("global _start")?;
    self.emit_label("_start")?;
    self.emit(&format!("call {}", program.function.name))?;
    self.emit("mov rdi, rax")?;
    self.emit("mov rax, 60")?;
    self.emit("syscall")?;
    self.function(&program.function)
  }

  fn function(&mut self, function: &Function) -> CompileResult<()> {
    self.emit_label(&function.name)?;
    self.emit("push rbp")?;
    self.emit("mov rbp, rsp")?;
    self.next_offset = WORD;
    self.scopes.push_frame();
    for stmt in &function.body {
      self.statement(stmt)?;
    }
    if !matches!(function.body.last(), Some(Stmt::Return { .. })) {
      self.epilogue()?;
    }
    self.scopes.pop_frame();
    Ok(())
  }

  fn epilogue(&mut self) -> CompileResult<()> {
    self.emit("mov rsp, rbp")?;
    self.emit("pop rbp")?;
    self.emit("ret")
  }

  fn statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Return { expr } => {
        self.expression(expr)?;
        self.epilogue()
      }
      Stmt::Expr { expr } => self.expression(expr),
      Stmt::Declare { name, range, init } => {
        // The duplicate check runs before any code is emitted for the
        // initializer.
        if self.scopes.declared_in_current(name) {
          return DuplicateDeclarationSnafu {
            name: name.clone(),
            range: *range,
          }
          .fail();
        }
        match init {
          Some(expr) => self.expression(expr)?,
          None => self.emit("mov rax, 0")?,
        }
        self.emit("push rax")?;
        let inserted = self.scopes.declare(name, self.next_offset);
        debug_assert!(inserted);
        self.next_offset += WORD;
        Ok(())
      }
    }
  }

  fn expression(&mut self, expr: &Expr) -> CompileResult<()> {
    match expr {
      Expr::Constant { value } => self.emit(&format!("mov rax, {value}")),
      Expr::Unary { op, operand } => self.unary(*op, operand),
      Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
      Expr::Var { name, range } => {
        let Some(offset) = self.scopes.resolve(name) else {
          return UndeclaredVariableSnafu {
            name: name.clone(),
            range: *range,
          }
          .fail();
        };
        self.emit(&format!("mov rax, [rbp - {offset}]"))
      }
      Expr::Assign { name, range, value } => {
        self.expression(value)?;
        let Some(offset) = self.scopes.resolve(name) else {
          return UndeclaredVariableSnafu {
            name: name.clone(),
            range: *range,
          }
          .fail();
        };
        self.emit(&format!("mov [rbp - {offset}], rax"))
      }
    }
  }

  fn unary(&mut self, op: UnaryOp, operand: &Expr) -> CompileResult<()> {
    self.expression(operand)?;
    match op {
      UnaryOp::Neg => self.emit("neg rax"),
      UnaryOp::BitNot => self.emit("not rax"),
      UnaryOp::LogicalNot => {
        self.emit("cmp rax, 0")?;
        self.emit("sete al")?;
        self.emit("movzx rax, al")
      }
    }
  }

  fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> CompileResult<()> {
    match op {
      BinaryOp::LogicalAnd => return self.logical_and(lhs, rhs),
      BinaryOp::LogicalOr => return self.logical_or(lhs, rhs),
      _ => {}
    }

    self.expression(lhs)?;
    self.emit("push rax")?;
    self.expression(rhs)?;
    match op {
      BinaryOp::Add => {
        self.emit("pop rsi")?;
        self.emit("add rax, rsi")
      }
      BinaryOp::Sub => {
        self.emit("pop rsi")?;
        self.emit("sub rsi, rax")?;
        self.emit("mov rax, rsi")
      }
      BinaryOp::Mul => {
        self.emit("pop rsi")?;
        self.emit("imul rsi")
      }
      BinaryOp::Div => {
        self.emit("pop rsi")?;
        self.emit("mov rdi, rax")?;
        self.emit("mov rax, rsi")?;
        self.emit("cqo")?;
        self.emit("idiv rdi")
      }
      BinaryOp::Mod => {
        self.emit("pop rsi")?;
        self.emit("mov rdi, rax")?;
        self.emit("mov rax, rsi")?;
        self.emit("cqo")?;
        self.emit("idiv rdi")?;
        self.emit("mov rax, rdx")
      }
      BinaryOp::Eq => {
        self.emit("pop rsi")?;
        self.emit("cmp rax, rsi")?;
        self.emit("sete al")?;
        self.emit("movzx rax, al")
      }
      BinaryOp::Ne => {
        self.emit("pop rsi")?;
        self.emit("cmp rax, rsi")?;
        self.emit("setne al")?;
        self.emit("movzx rax, al")
      }
      BinaryOp::Lt => {
        self.emit("pop rsi")?;
        self.emit("cmp rsi, rax")?;
        self.emit("setl al")?;
        self.emit("movzx rax, al")
      }
      BinaryOp::Le => {
        self.emit("pop rsi")?;
        self.emit("cmp rsi, rax")?;
        self.emit("setle al")?;
        self.emit("movzx rax, al")
      }
      BinaryOp::Gt => {
        self.emit("pop rsi")?;
        self.emit("cmp rsi, rax")?;
        self.emit("setg al")?;
        self.emit("movzx rax, al")
      }
      BinaryOp::Ge => {
        self.emit("pop rsi")?;
        self.emit("cmp rsi, rax")?;
        self.emit("setge al")?;
        self.emit("movzx rax, al")
      }
      BinaryOp::BitAnd => {
        self.emit("pop rsi")?;
        self.emit("and rax, rsi")
      }
      BinaryOp::BitOr => {
        self.emit("pop rsi")?;
        self.emit("or rax, rsi")
      }
      BinaryOp::BitXor => {
        self.emit("pop rsi")?;
        self.emit("xor rax, rsi")
      }
      BinaryOp::Shl => {
        self.emit("pop rdi")?;
        self.emit("mov rcx, rax")?;
        self.emit("mov rax, rdi")?;
        self.emit("sal rax, cl")
      }
      BinaryOp::Shr => {
        self.emit("pop rdi")?;
        self.emit("mov rcx, rax")?;
        self.emit("mov rax, rdi")?;
        self.emit("sar rax, cl")
      }
      BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!(),
    }
  }

  fn logical_and(&mut self, lhs: &Expr, rhs: &Expr) -> CompileResult<()> {
    // A literal false left operand decides the result during generation;
    // no code is emitted for the right operand at all.
    if matches!(lhs, Expr::Constant { value: 0 }) {
      return self.emit("mov rax, 0");
    }

    let true_label = self.fresh_label("true");
    let end_label = self.fresh_label("end");
    self.expression(lhs)?;
    self.emit("cmp rax, 0")?;
    self.emit(&format!("jne {true_label}"))?;
    self.emit(&format!("jmp {end_label}"))?;
    self.emit_label(&true_label)?;
    self.expression(rhs)?;
    self.emit("cmp rax, 0")?;
    self.emit("setne al")?;
    self.emit("movzx rax, al")?;
    self.emit_label(&end_label)
  }

  fn logical_or(&mut self, lhs: &Expr, rhs: &Expr) -> CompileResult<()> {
    // A literal truthy left operand passes through unchanged, matching
    // what the branchy form leaves in the accumulator at run time.
    if let Expr::Constant { value } = lhs
      && *value != 0
    {
      return self.emit(&format!("mov rax, {value}"));
    }

    let false_label = self.fresh_label("false");
    let end_label = self.fresh_label("end");
    self.expression(lhs)?;
    self.emit("cmp rax, 0")?;
    self.emit(&format!("je {false_label}"))?;
    self.emit(&format!("jmp {end_label}"))?;
    self.emit_label(&false_label)?;
    self.expression(rhs)?;
    self.emit("cmp rax, 0")?;
    self.emit("setne al")?;
    self.emit("movzx rax, al")?;
    self.emit_label(&end_label)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn compile(source: &str) -> String {
    let tokens = tokenize(source).unwrap();
    let program = parse(tokens, source).unwrap();
    let mut asm = String::new();
    generate(&program, &mut asm).unwrap();
    asm
  }

  fn compile_err(source: &str) -> CompileError {
    let tokens = tokenize(source).unwrap();
    let program = parse(tokens, source).unwrap();
    let mut asm = String::new();
    generate(&program, &mut asm).unwrap_err()
  }

  #[test]
  fn full_asm_for_return_constant() {
    let asm = compile("int main() { return 2; }");
    let expected = "\
    section .text
    global _start
_start:
    call main
    mov rdi, rax
    mov rax, 60
    syscall
main:
    push rbp
    mov rbp, rsp
    mov rax, 2
    mov rsp, rbp
    pop rbp
    ret
";
    assert_eq!(asm, expected);
  }

  #[test]
  fn epilogue_is_appended_when_body_lacks_return() {
    let asm = compile("int main() { 1; }");
    assert!(asm.ends_with("    mov rsp, rbp\n    pop rbp\n    ret\n"));
  }

  #[test]
  fn unary_operators() {
    let asm = compile("int main() { return -1; }");
    assert!(asm.contains("    mov rax, 1\n    neg rax\n"));

    let asm = compile("int main() { return ~1; }");
    assert!(asm.contains("    not rax\n"));

    let asm = compile("int main() { return !1; }");
    assert!(asm.contains("    cmp rax, 0\n    sete al\n    movzx rax, al\n"));
  }

  #[test]
  fn addition_pops_saved_left_operand() {
    let asm = compile("int main() { return 1 + 2; }");
    assert!(asm.contains(
      "    mov rax, 1\n    push rax\n    mov rax, 2\n    pop rsi\n    add rax, rsi\n"
    ));
  }

  #[test]
  fn subtraction_keeps_operand_order() {
    let asm = compile("int main() { return 5 - 3; }");
    assert!(asm.contains("    pop rsi\n    sub rsi, rax\n    mov rax, rsi\n"));
  }

  #[test]
  fn division_uses_signed_64_bit_idiv() {
    let asm = compile("int main() { return 7 / 2; }");
    assert!(asm.contains(
      "    pop rsi\n    mov rdi, rax\n    mov rax, rsi\n    cqo\n    idiv rdi\n"
    ));
  }

  #[test]
  fn modulo_takes_remainder_from_rdx() {
    let asm = compile("int main() { return 7 % 2; }");
    assert!(asm.contains("    idiv rdi\n    mov rax, rdx\n"));
  }

  #[test]
  fn comparisons_set_boolean_result() {
    let asm = compile("int main() { return 1 == 2; }");
    assert!(asm.contains("    cmp rax, rsi\n    sete al\n    movzx rax, al\n"));

    let asm = compile("int main() { return 1 < 2; }");
    assert!(asm.contains("    cmp rsi, rax\n    setl al\n    movzx rax, al\n"));

    let asm = compile("int main() { return 1 >= 2; }");
    assert!(asm.contains("    cmp rsi, rax\n    setge al\n    movzx rax, al\n"));
  }

  #[test]
  fn shifts_go_through_cl() {
    let asm = compile("int main() { return 1 << 3; }");
    assert!(asm.contains(
      "    pop rdi\n    mov rcx, rax\n    mov rax, rdi\n    sal rax, cl\n"
    ));

    let asm = compile("int main() { return 8 >> 2; }");
    assert!(asm.contains("    sar rax, cl\n"));
  }

  #[test]
  fn bitwise_operators() {
    assert!(compile("int main() { return 6 & 3; }").contains("    and rax, rsi\n"));
    assert!(compile("int main() { return 6 | 3; }").contains("    or rax, rsi\n"));
    assert!(compile("int main() { return 6 ^ 3; }").contains("    xor rax, rsi\n"));
  }

  #[test]
  fn declaration_pushes_storage_and_loads_resolve() {
    let asm = compile("int main() { int x = 3; return x + 4; }");
    assert!(asm.contains("    mov rax, 3\n    push rax\n"));
    assert!(asm.contains("    mov rax, [rbp - 8]\n"));
  }

  #[test]
  fn declaration_without_initializer_defaults_to_zero() {
    let asm = compile("int main() { int x; return x; }");
    assert!(asm.contains("    mov rax, 0\n    push rax\n"));
  }

  #[test]
  fn later_declarations_get_larger_offsets() {
    let asm = compile("int main() { int a = 1; int b = 2; return a + b; }");
    assert!(asm.contains("    mov rax, [rbp - 8]\n"));
    assert!(asm.contains("    mov rax, [rbp - 16]\n"));
  }

  #[test]
  fn assignment_stores_and_keeps_value() {
    let asm = compile("int main() { int x; x = 5; return x; }");
    assert!(asm.contains("    mov rax, 5\n    mov [rbp - 8], rax\n"));
    assert!(asm.contains("    mov rax, [rbp - 8]\n"));
  }

  #[test]
  fn assignment_is_an_expression() {
    let asm = compile("int main() { int x; return x = 7; }");
    assert!(asm.contains("    mov [rbp - 8], rax\n    mov rsp, rbp\n"));
  }

  #[test]
  fn logical_and_branches_and_normalizes() {
    let asm = compile("int main() { return 1 && 0; }");
    assert!(asm.contains("    cmp rax, 0\n    jne .Ltrue0\n    jmp .Lend1\n.Ltrue0:\n"));
    assert!(asm.contains("    setne al\n    movzx rax, al\n.Lend1:\n"));
  }

  #[test]
  fn logical_or_branches_on_false() {
    let asm = compile("int main() { return 0 || 3; }");
    assert!(asm.contains("    je .Lfalse0\n    jmp .Lend1\n.Lfalse0:\n"));
  }

  #[test]
  fn short_circuit_labels_are_unique_per_site() {
    let asm = compile("int main() { return (1 && 2) || (3 && 4); }");
    let mut labels: Vec<&str> = asm
      .lines()
      .filter(|line| line.starts_with(".L") && line.ends_with(':'))
      .collect();
    let total = labels.len();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(total, 6);
    assert_eq!(labels.len(), total);
  }

  #[test]
  fn nested_short_circuits_do_not_share_labels() {
    let asm = compile("int main() { return 1 && (0 || (3 && 4)); }");
    let mut labels: Vec<&str> = asm
      .lines()
      .filter(|line| line.starts_with(".L") && line.ends_with(':'))
      .collect();
    let total = labels.len();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), total);
  }

  #[test]
  fn constant_false_left_operand_skips_right_generation() {
    // The right operand would fail generation if it were reached.
    let asm = compile("int main() { return 0 && y; }");
    assert!(asm.contains("    mov rax, 0\n"));
    assert!(!asm.contains("jne"));
  }

  #[test]
  fn constant_true_left_operand_skips_right_generation_for_or() {
    let asm = compile("int main() { return 1 || y; }");
    assert!(asm.contains("    mov rax, 1\n"));
    assert!(!asm.contains("je "));
  }

  #[test]
  fn runtime_evaluated_right_operand_must_resolve() {
    let err = compile_err("int main() { return 1 && y; }");
    assert!(matches!(err, CompileError::UndeclaredVariable { .. }));
  }

  #[test]
  fn undeclared_variable_reference_fails() {
    let err = compile_err("int main() { return y; }");
    let CompileError::UndeclaredVariable { name, .. } = err else {
      panic!("expected undeclared variable, got {err:?}");
    };
    assert_eq!(name, "y");
  }

  #[test]
  fn undeclared_assignment_target_fails() {
    let err = compile_err("int main() { y = 1; }");
    assert!(matches!(err, CompileError::UndeclaredVariable { .. }));
  }

  #[test]
  fn duplicate_declaration_fails() {
    let err = compile_err("int main() { int x = 1; int x = 2; return x; }");
    let CompileError::DuplicateDeclaration { name, .. } = err else {
      panic!("expected duplicate declaration, got {err:?}");
    };
    assert_eq!(name, "x");
  }

  #[test]
  fn duplicate_declaration_emits_nothing_for_initializer() {
    let tokens = tokenize("int main() { int x = 1; int x = 99; return x; }").unwrap();
    let program = parse(tokens, "int main() { int x = 1; int x = 99; return x; }").unwrap();
    let mut asm = String::new();
    let result = generate(&program, &mut asm);
    assert!(result.is_err());
    assert!(!asm.contains("mov rax, 99"));
  }

  #[test]
  fn expression_statement_discards_result() {
    let asm = compile("int main() { 1 + 2; return 3; }");
    assert!(asm.contains("    add rax, rsi\n    mov rax, 3\n"));
  }
}
