//! The abstract syntax tree handed from the parser to the code generator.
//!
//! Every node family is a closed enum and every parent exclusively owns
//! its children, so dropping the root releases the whole tree and there is
//! no tag left to get out of sync. Name-bearing nodes remember the byte
//! range they came from so semantic errors can point back into the source.

use std::fmt;

use crate::source::Range;

/// Unary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  /// Arithmetic negation, `-e`.
  Neg,
  /// Logical negation, `!e`; yields 0 or 1.
  LogicalNot,
  /// Bitwise complement, `~e`.
  BitNot,
}

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  LogicalAnd,
  LogicalOr,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone)]
pub enum Expr {
  Constant {
    value: u64,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Var {
    name: String,
    range: Range,
  },
  Assign {
    name: String,
    range: Range,
    value: Box<Expr>,
  },
}

impl Expr {
  pub fn constant(value: u64) -> Self {
    Self::Constant { value }
  }

  pub fn unary(op: UnaryOp, operand: Expr) -> Self {
    Self::Unary {
      op,
      operand: Box::new(operand),
    }
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn var(name: impl Into<String>, range: Range) -> Self {
    Self::Var {
      name: name.into(),
      range,
    }
  }

  pub fn assign(name: impl Into<String>, range: Range, value: Expr) -> Self {
    Self::Assign {
      name: name.into(),
      range,
      value: Box::new(value),
    }
  }
}

/// Statement forms. Order inside a function body is execution order.
#[derive(Debug, Clone)]
pub enum Stmt {
  Declare {
    name: String,
    range: Range,
    init: Option<Expr>,
  },
  Return {
    expr: Expr,
  },
  Expr {
    expr: Expr,
  },
}

/// A named function and its ordered statement list.
#[derive(Debug, Clone)]
pub struct Function {
  pub name: String,
  pub body: Vec<Stmt>,
}

/// The root of a compilation unit. The language is single-function for
/// now, so a program owns exactly one function.
#[derive(Debug, Clone)]
pub struct Program {
  pub function: Function,
}

/// Diagnostic dump: an indented, line-oriented rendering of the tree.
/// Purely read-only; printing twice yields identical text.
impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Program")?;
    writeln!(f, "  Function {}", self.function.name)?;
    for stmt in &self.function.body {
      dump_stmt(f, stmt, 2)?;
    }
    Ok(())
  }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
  for _ in 0..depth {
    write!(f, "  ")?;
  }
  Ok(())
}

fn dump_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
  indent(f, depth)?;
  match stmt {
    Stmt::Declare { name, init, .. } => {
      writeln!(f, "Declare {name}")?;
      if let Some(expr) = init {
        dump_expr(f, expr, depth + 1)?;
      }
      Ok(())
    }
    Stmt::Return { expr } => {
      writeln!(f, "Return")?;
      dump_expr(f, expr, depth + 1)
    }
    Stmt::Expr { expr } => {
      writeln!(f, "ExprStmt")?;
      dump_expr(f, expr, depth + 1)
    }
  }
}

fn dump_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, depth: usize) -> fmt::Result {
  indent(f, depth)?;
  match expr {
    Expr::Constant { value } => writeln!(f, "Constant {value}"),
    Expr::Unary { op, operand } => {
      writeln!(f, "Unary {op:?}")?;
      dump_expr(f, operand, depth + 1)
    }
    Expr::Binary { op, lhs, rhs } => {
      writeln!(f, "Binary {op:?}")?;
      dump_expr(f, lhs, depth + 1)?;
      dump_expr(f, rhs, depth + 1)
    }
    Expr::Var { name, .. } => writeln!(f, "Var {name}"),
    Expr::Assign { name, value, .. } => {
      writeln!(f, "Assign {name}")?;
      dump_expr(f, value, depth + 1)
    }
  }
}
