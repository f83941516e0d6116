//! Recursive-descent parser for the formula grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | var | '(' expr ')'
//! var    := IDENT ('{' pair (',' pair)* '}')?
//! pair   := IDENT ':' IDENT
//! ```

use super::ast::{BinOp, Expr, QualifierKey};
use super::lexer::{tokenize, Token};
use super::FormulaError;

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_col(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, c)| *c)
            .unwrap_or_else(|| self.tokens.last().map(|(_, c)| *c + 1).unwrap_or(1))
    }

    fn advance(&mut self) -> Option<Token> {
        let item = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        item.map(|(t, _)| t)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), FormulaError> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(FormulaError::Syntax {
                column: self.tokens[self.pos - 1].1,
                message: format!("expected {expected:?}, found {t:?}"),
            }),
            None => Err(FormulaError::Syntax {
                column: self.peek_col(),
                message: format!("expected {expected:?}, found end of input"),
            }),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = Expr::BinOp(BinOp::Add, Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = Expr::BinOp(BinOp::Sub, Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    lhs = Expr::BinOp(BinOp::Mul, Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    lhs = Expr::BinOp(BinOp::Div, Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, FormulaError> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            Some(Token::Minus) => {
                self.advance();
                let inner = self.parse_factor()?;
                Ok(Expr::BinOp(BinOp::Sub, Box::new(Expr::Num(0.0)), Box::new(inner)))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                self.advance();
                self.parse_var_tail(name)
            }
            Some(other) => Err(FormulaError::Syntax {
                column: self.peek_col(),
                message: format!("unexpected token {other:?}"),
            }),
            None => Err(FormulaError::Syntax {
                column: self.peek_col(),
                message: "unexpected end of input".to_string(),
            }),
        }
    }

    fn parse_var_tail(&mut self, name: String) -> Result<Expr, FormulaError> {
        if self.peek() != Some(&Token::LBrace) {
            return Ok(Expr::Var {
                name,
                qualifiers: Vec::new(),
            });
        }
        self.advance();
        let mut qualifiers = Vec::new();
        loop {
            let (key_text, col) = match self.advance() {
                Some(Token::Ident(text)) => (text, self.tokens[self.pos - 1].1),
                other => {
                    return Err(FormulaError::Syntax {
                        column: self.peek_col(),
                        message: format!("expected qualifier name, found {other:?}"),
                    })
                }
            };
            let key = QualifierKey::from_keyword(&key_text).ok_or_else(|| FormulaError::Syntax {
                column: col,
                message: format!("unknown qualifier '{key_text}'"),
            })?;
            self.expect(&Token::Colon)?;
            let value = match self.advance() {
                Some(Token::Ident(text)) => text,
                Some(Token::Number(n)) => n.to_string(),
                other => {
                    return Err(FormulaError::Syntax {
                        column: self.peek_col(),
                        message: format!("expected qualifier value, found {other:?}"),
                    })
                }
            };
            qualifiers.push((key, value));
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RBrace) => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(FormulaError::Syntax {
                        column: self.peek_col(),
                        message: format!("expected ',' or '}}', found {other:?}"),
                    })
                }
            }
        }
        Ok(Expr::Var { name, qualifiers })
    }
}

/// Parses a formula expression string into an [`Expr`] tree.
pub fn parse(src: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(FormulaError::Syntax {
            column: parser.peek_col(),
            message: "trailing tokens after expression".to_string(),
        });
    }
    Ok(expr)
}
