//! Recursive-descent parser producing an [`Expr`] tree.
//!
//! Precedence, loosest first: `x if c else y`, `or`, `and`, `not`,
//! comparisons, `+ -`, `* / // %`, unary `+ -`, `**`, then calls,
//! subscripts and atoms.

use super::ast::{BinaryOp, BoolOp, CompareOp, Expr, Function, Literal, UnaryOp};
use super::lexer::{tokenize, Spanned, Token};
use super::ExprError;

const MAX_DEPTH: usize = 64;
/// Upper bound on operator, call, list and subscript nodes in one condition.
/// Bounds the tree depth the evaluator recurses through.
const MAX_NODES: usize = 256;

pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        nodes: 0,
    };
    let expr = parser.parse_expression()?;
    if parser.peek() != &Token::Eof {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    nodes: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ExprError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(ExprError::Syntax {
                position: self.position(),
                message: format!("expected {}", what),
            })
        }
    }

    fn unexpected(&self) -> ExprError {
        let message = match self.peek() {
            Token::Eof => "unexpected end of expression".to_string(),
            other => format!("unexpected token {:?}", other),
        };
        ExprError::Syntax {
            position: self.position(),
            message,
        }
    }

    /// Errors abort the whole parse, so `depth` is only restored on success.
    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::Syntax {
                position: self.position(),
                message: "expression nested too deeply".to_string(),
            });
        }
        Ok(())
    }

    fn node(&mut self) -> Result<(), ExprError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(ExprError::Syntax {
                position: self.position(),
                message: format!("expression has more than {} operations", MAX_NODES),
            });
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let expr = self.parse_if_else()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_if_else(&mut self) -> Result<Expr, ExprError> {
        let then = self.parse_or()?;
        if !self.eat(&Token::If) {
            return Ok(then);
        }
        let condition = self.parse_or()?;
        self.expect(&Token::Else, "'else'")?;
        let otherwise = self.parse_expression()?;
        self.node()?;
        Ok(Expr::IfElse {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            self.node()?;
            lhs = Expr::Bool {
                op: BoolOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_not()?;
            self.node()?;
            lhs = Expr::Bool {
                op: BoolOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Not) {
            self.enter()?;
            self.node()?;
            let operand = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();
        loop {
            let (op, width) = match (self.peek(), self.peek_at(1)) {
                (Token::EqEq, _) => (CompareOp::Eq, 1),
                (Token::NotEq, _) => (CompareOp::NotEq, 1),
                (Token::Lt, _) => (CompareOp::Lt, 1),
                (Token::LtE, _) => (CompareOp::LtE, 1),
                (Token::Gt, _) => (CompareOp::Gt, 1),
                (Token::GtE, _) => (CompareOp::GtE, 1),
                (Token::In, _) => (CompareOp::In, 1),
                (Token::Not, Token::In) => (CompareOp::NotIn, 2),
                (Token::Is, Token::Not) => (CompareOp::IsNot, 2),
                (Token::Is, _) => (CompareOp::Is, 1),
                _ => break,
            };
            for _ in 0..width {
                self.advance();
            }
            self.node()?;
            rest.push((op, self.parse_additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            self.node()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            self.node()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.advance();
        self.enter()?;
        self.node()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::DoubleStar) {
            // right operand binds as a unary expression: 2 ** -1, 2 ** 3 ** 2
            self.enter()?;
            self.node()?;
            let exponent = self.parse_unary()?;
            self.depth -= 1;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek().clone() {
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RBracket, "']'")?;
                    self.node()?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::Dot => {
                    return Err(ExprError::UnsafeExpression(
                        "attribute access is not allowed".to_string(),
                    ))
                }
                Token::LParen => {
                    return Err(ExprError::UnsafeExpression(
                        "only whitelisted functions may be called".to_string(),
                    ))
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        let token = self.peek().clone();
        let expr = match token {
            Token::Int(i) => Expr::Literal(Literal::Int(i)),
            Token::Float(f) => Expr::Literal(Literal::Float(f)),
            Token::Str(s) => Expr::Literal(Literal::Str(s)),
            Token::True => Expr::Literal(Literal::Bool(true)),
            Token::False => Expr::Literal(Literal::Bool(false)),
            Token::None => Expr::Literal(Literal::None),
            Token::Ident(name) => {
                self.advance();
                if self.peek() == &Token::LParen {
                    let function = Function::from_name(&name).ok_or_else(|| {
                        ExprError::UnsafeExpression(format!(
                            "function '{}' is not whitelisted",
                            name
                        ))
                    })?;
                    self.advance();
                    self.node()?;
                    let args = self.parse_sequence(&Token::RParen, "')'")?;
                    return Ok(Expr::Call { function, args });
                }
                return Ok(Expr::Name(name));
            }
            Token::LParen => {
                self.advance();
                let first = self.parse_expression()?;
                if self.eat(&Token::RParen) {
                    return Ok(first);
                }
                // a parenthesised tuple behaves like a list
                self.expect(&Token::Comma, "')'")?;
                self.node()?;
                let mut items = vec![first];
                items.extend(self.parse_sequence(&Token::RParen, "')'")?);
                return Ok(Expr::List(items));
            }
            Token::LBracket => {
                self.advance();
                self.node()?;
                let items = self.parse_sequence(&Token::RBracket, "']'")?;
                return Ok(Expr::List(items));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_sequence(&mut self, close: &Token, what: &str) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.parse_expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, what)?;
                return Ok(items);
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
