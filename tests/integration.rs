use std::process::Command;

use rwacc::{CompileError, generate_assembly, mkexe};

#[test]
fn return_2_full_asm() {
  let asm = generate_assembly("int main() { return 2; }").unwrap();
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
fn variables_flow_through_the_frame() {
  let asm = generate_assembly("int main() { int x = 3; return x + 4; }").unwrap();
  assert!(asm.contains("push rax"));
  assert!(asm.contains("mov rax, [rbp - 8]"));
  assert!(asm.contains("add rax, rsi"));
}

#[test]
fn declare_then_assign() {
  let asm = generate_assembly("int main() { int x; x = 5; return x; }").unwrap();
  assert!(asm.contains("mov rax, 0\n    push rax"));
  assert!(asm.contains("mov [rbp - 8], rax"));
}

#[test]
fn undeclared_variable_is_a_typed_error() {
  let err = generate_assembly("int main() { return y; }").unwrap_err();
  assert!(matches!(err, CompileError::UndeclaredVariable { .. }));
}

#[test]
fn duplicate_declaration_is_a_typed_error() {
  let err = generate_assembly("int main() { int x = 1; int x = 2; return x; }").unwrap_err();
  assert!(matches!(err, CompileError::DuplicateDeclaration { .. }));
}

#[test]
fn syntax_errors_carry_a_location() {
  let err = generate_assembly("int main() { return 2 }").unwrap_err();
  let CompileError::Syntax { range, .. } = &err else {
    panic!("expected syntax error, got {err:?}");
  };
  assert_eq!(range.start, 22);
}

#[test]
fn short_circuit_skips_unreachable_right_operand() {
  // `y` is never declared; the constant-false left operand means no code
  // is generated for the right side at all.
  let asm = generate_assembly("int main() { return 0 && y; }").unwrap();
  assert!(asm.contains("mov rax, 0"));
}

#[test]
fn labels_are_unique_across_the_unit() {
  let asm =
    generate_assembly("int main() { int a = 1 && 2; int b = 0 || 4; return a && b || a; }")
      .unwrap();
  let mut labels: Vec<&str> = asm
    .lines()
    .filter(|line| line.starts_with(".L") && line.ends_with(':'))
    .collect();
  let total = labels.len();
  labels.sort_unstable();
  labels.dedup();
  assert_eq!(labels.len(), total);
  assert!(total >= 8);
}

/// Assemble, link and run a program; `None` when nasm or ld is missing.
fn run_compiled(source: &str) -> Option<i32> {
  if which::which("nasm").is_err() || which::which("ld").is_err() {
    eprintln!("skipping executable test: nasm or ld not on PATH");
    return None;
  }
  let asm = generate_assembly(source).unwrap();
  let dir = tempfile::tempdir().unwrap();
  let exe = dir.path().join("prog");
  mkexe::mkexe(&asm, &exe).unwrap();
  let status = Command::new(&exe).status().unwrap();
  status.code()
}

#[test]
fn executable_returns_constant() {
  let Some(code) = run_compiled("int main() { return 2; }") else {
    return;
  };
  assert_eq!(code, 2);
}

#[test]
fn executable_reads_initialized_variable() {
  let Some(code) = run_compiled("int main() { int x = 3; return x + 4; }") else {
    return;
  };
  assert_eq!(code, 7);
}

#[test]
fn executable_assigns_default_initialized_variable() {
  let Some(code) = run_compiled("int main() { int x; x = 5; return x; }") else {
    return;
  };
  assert_eq!(code, 5);
}

#[test]
fn executable_short_circuits_logical_and() {
  let Some(code) = run_compiled("int main() { return 1 && 0; }") else {
    return;
  };
  assert_eq!(code, 0);
}

#[test]
fn executable_normalizes_evaluated_or_operand() {
  let Some(code) = run_compiled("int main() { return 0 || 3; }") else {
    return;
  };
  assert_eq!(code, 1);
}

#[test]
fn executable_arithmetic_matches_c_semantics() {
  let Some(code) = run_compiled("int main() { return 17 % 5 + 2 * 3; }") else {
    return;
  };
  assert_eq!(code, 8);

  let Some(code) = run_compiled("int main() { return (1 << 4) | (9 & 3); }") else {
    return;
  };
  assert_eq!(code, 17);

  let Some(code) = run_compiled("int main() { return 7 / 2 == 3; }") else {
    return;
  };
  assert_eq!(code, 1);
}

#[test]
fn executable_chains_assignments() {
  let Some(code) = run_compiled("int main() { int x; int y; x = y = 6; return x + y; }")
  else {
    return;
  };
  assert_eq!(code, 12);
}
