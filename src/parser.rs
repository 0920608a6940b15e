//! Recursive-descent parser producing a function AST.
//!
//! The parser mirrors the classic chibicc structure: we maintain a
//! precedence-climbing set of helpers and expose a thin statement layer so
//! sequencing lives outside the expression tree. This keeps the grammar easy
//! to extend with additional statement kinds later on.

use crate::ast::{BinaryOp, Expr, Function, Program, Stmt, UnaryOp};
use crate::error::{CompileError, CompileResult};
use crate::source::Range;
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Parse a whole compilation unit: a single `int name() { ... }` function.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);

  if stream.is_eof() {
    return Err(CompileError::syntax("program is empty", Range::new(0, 0)));
  }

  let function = parse_function(&mut stream)?;

  if !stream.is_eof() {
    let (loc, got) = stream.here();
    return Err(CompileError::syntax(
      format!("unexpected token \"{got}\" after function body"),
      Range::new(loc, loc + got.len()),
    ));
  }

  Ok(Program { function })
}

fn parse_function(stream: &mut TokenStream) -> CompileResult<Function> {
  stream.skip_keyword("int")?;
  let (name, _) = stream.get_ident()?;
  stream.skip("(")?;
  stream.skip(")")?;
  stream.skip("{")?;

  let mut body = Vec::new();
  loop {
    if stream.equal("}") {
      break;
    }
    if stream.is_eof() {
      return Err(CompileError::syntax(
        "expected \"}\" before end of input",
        Range::new(stream.source.len(), stream.source.len()),
      ));
    }
    body.push(parse_stmt(stream)?);
  }

  Ok(Function { name, body })
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  if stream.keyword("return") {
    let expr = parse_expr(stream)?;
    stream.skip(";")?;
    return Ok(Stmt::Return { expr });
  }

  if stream.keyword("int") {
    let (name, range) = stream.get_ident()?;
    let init = if stream.equal("=") {
      Some(parse_expr(stream)?)
    } else {
      None
    };
    stream.skip(";")?;
    return Ok(Stmt::Declare { name, range, init });
  }

  let expr = parse_expr(stream)?;
  stream.skip(";")?;
  Ok(Stmt::Expr { expr })
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_logical_or(stream)?;

  let assign_loc = stream.peek().map(|token| token.loc);
  if stream.equal("=") {
    let value = parse_assign(stream)?;
    return match node {
      Expr::Var { name, range } => Ok(Expr::assign(name, range, value)),
      _ => {
        let loc = assign_loc.unwrap_or(stream.source.len());
        Err(CompileError::syntax(
          "assignment target must be a variable",
          Range::new(loc, loc + 1),
        ))
      }
    };
  }

  Ok(node)
}

fn parse_logical_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_logical_and(stream)?;

  while stream.equal("||") {
    let rhs = parse_logical_and(stream)?;
    node = Expr::binary(BinaryOp::LogicalOr, node, rhs);
  }

  Ok(node)
}

fn parse_logical_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_bit_or(stream)?;

  while stream.equal("&&") {
    let rhs = parse_bit_or(stream)?;
    node = Expr::binary(BinaryOp::LogicalAnd, node, rhs);
  }

  Ok(node)
}

fn parse_bit_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_bit_xor(stream)?;

  while stream.equal("|") {
    let rhs = parse_bit_xor(stream)?;
    node = Expr::binary(BinaryOp::BitOr, node, rhs);
  }

  Ok(node)
}

fn parse_bit_xor(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_bit_and(stream)?;

  while stream.equal("^") {
    let rhs = parse_bit_and(stream)?;
    node = Expr::binary(BinaryOp::BitXor, node, rhs);
  }

  Ok(node)
}

fn parse_bit_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_equality(stream)?;

  while stream.equal("&") {
    let rhs = parse_equality(stream)?;
    node = Expr::binary(BinaryOp::BitAnd, node, rhs);
  }

  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_relational(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ "==") => symbol,
      Some(symbol @ "!=") => symbol,
      _ => break,
    };

    let op = match op_str {
      "==" => BinaryOp::Eq,
      "!=" => BinaryOp::Ne,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_relational(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_shift(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ "<") => symbol,
      Some(symbol @ "<=") => symbol,
      Some(symbol @ ">") => symbol,
      Some(symbol @ ">=") => symbol,
      _ => break,
    };

    let op = match op_str {
      "<" => BinaryOp::Lt,
      "<=" => BinaryOp::Le,
      ">" => BinaryOp::Gt,
      ">=" => BinaryOp::Ge,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_shift(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_shift(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_add(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ "<<") => symbol,
      Some(symbol @ ">>") => symbol,
      _ => break,
    };

    let op = match op_str {
      "<<" => BinaryOp::Shl,
      ">>" => BinaryOp::Shr,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_add(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_mul(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ "+") => symbol,
      Some(symbol @ "-") => symbol,
      _ => break,
    };

    let op = match op_str {
      "+" => BinaryOp::Add,
      "-" => BinaryOp::Sub,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_mul(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_unary(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ "*") => symbol,
      Some(symbol @ "/") => symbol,
      Some(symbol @ "%") => symbol,
      _ => break,
    };

    let op = match op_str {
      "*" => BinaryOp::Mul,
      "/" => BinaryOp::Div,
      "%" => BinaryOp::Mod,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_unary(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.equal("+") {
    return parse_unary(stream);
  }

  if stream.equal("-") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::unary(UnaryOp::Neg, operand));
  }

  if stream.equal("!") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::unary(UnaryOp::LogicalNot, operand));
  }

  if stream.equal("~") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::unary(UnaryOp::BitNot, operand));
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if matches!(
    stream.peek().map(|token| token.kind),
    Some(TokenKind::Ident)
  ) {
    let (name, range) = stream.get_ident()?;
    return Ok(Expr::var(name, range));
  }

  let (value, _) = stream.get_number()?;
  Ok(Expr::constant(value))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// The current punctuator's text, if the current token is one.
  fn peek_punctuator(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.source))
  }

  /// Location and description of the current token, for diagnostics.
  fn here(&self) -> (usize, String) {
    match self.peek() {
      Some(token) => (token.loc, describe_token(Some(token), self.source)),
      None => (self.source.len(), "EOF".to_string()),
    }
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it is the given keyword.
  fn keyword(&mut self, kw: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Keyword
      && token_text(token, self.source) == kw
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let (loc, got) = self.here();
      Err(CompileError::syntax(
        format!("expected \"{s}\", but got \"{got}\""),
        Range::new(loc, loc + got.len()),
      ))
    }
  }

  fn skip_keyword(&mut self, kw: &str) -> CompileResult<()> {
    if self.keyword(kw) {
      Ok(())
    } else {
      let (loc, got) = self.here();
      Err(CompileError::syntax(
        format!("expected \"{kw}\", but got \"{got}\""),
        Range::new(loc, loc + got.len()),
      ))
    }
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(u64, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let loc = token.loc;
      let value = token.value.ok_or_else(|| {
        CompileError::syntax(
          "internal error: numeric token missing value",
          Range::new(loc, loc + token.len),
        )
      })?;
      self.pos += 1;
      return Ok((value, loc));
    }

    let (loc, got) = self.here();
    Err(CompileError::syntax(
      format!("expected a number, but got \"{got}\""),
      Range::new(loc, loc + got.len()),
    ))
  }

  /// Parse the current token as an identifier, returning its text and range.
  fn get_ident(&mut self) -> CompileResult<(String, Range)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let name = token_text(token, self.source).to_string();
      let range = token.range();
      self.pos += 1;
      return Ok((name, range));
    }

    let (loc, got) = self.here();
    Err(CompileError::syntax(
      format!("expected an identifier, but got \"{got}\""),
      Range::new(loc, loc + got.len()),
    ))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }
}
