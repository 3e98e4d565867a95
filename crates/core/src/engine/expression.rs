//! Formula dialect for expression-defined columns.
//!
//! Formulas reference existing columns by bare identifier (or by `"..."`
//! quoted identifier when the column name carries spaces or accents) and
//! compile straight to a polars expression. Supported: arithmetic,
//! comparison, `AND`/`OR`, unary minus, string literals in single quotes
//! and `IF(condition, when_true, when_false)`.

use std::collections::HashSet;

use polars::prelude::{col, lit, when, Expr};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("{0}")]
    Syntax(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Number(String),
    Text(String),
    Boolean(bool),
    LeftParen,
    RightParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

fn syntax(message: impl Into<String>) -> EvalError {
    EvalError::Syntax(message.into())
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];

        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        // 'text' literal / "quoted column" with backslash escapes
        if ch == '\'' || ch == '"' {
            let quote = ch;
            index += 1;
            let mut content = String::new();
            let mut terminated = false;
            while index < chars.len() {
                match chars[index] {
                    '\\' => {
                        let Some(escaped) = chars.get(index + 1) else {
                            return Err(syntax("unterminated escape sequence"));
                        };
                        content.push(*escaped);
                        index += 2;
                    }
                    c if c == quote => {
                        index += 1;
                        terminated = true;
                        break;
                    }
                    c => {
                        content.push(c);
                        index += 1;
                    }
                }
            }
            if !terminated {
                return Err(syntax(if quote == '\'' {
                    "unterminated string literal"
                } else {
                    "unterminated quoted identifier"
                }));
            }
            tokens.push(if quote == '\'' {
                Token::Text(content)
            } else {
                Token::Identifier(content)
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let mut word = String::new();
            while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                word.push(chars[index]);
                index += 1;
            }
            tokens.push(match word.to_ascii_lowercase().as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "true" => Token::Boolean(true),
                "false" => Token::Boolean(false),
                _ => Token::Identifier(word),
            });
            continue;
        }

        if ch.is_ascii_digit() {
            let mut number = String::new();
            while index < chars.len() && chars[index].is_ascii_digit() {
                number.push(chars[index]);
                index += 1;
            }
            if index < chars.len() && chars[index] == '.' {
                number.push('.');
                index += 1;
                while index < chars.len() && chars[index].is_ascii_digit() {
                    number.push(chars[index]);
                    index += 1;
                }
            }
            tokens.push(Token::Number(number));
            continue;
        }

        let token = match ch {
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            ',' => Token::Comma,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '=' => {
                if chars.get(index + 1) == Some(&'=') {
                    index += 1;
                }
                Token::Eq
            }
            '!' if chars.get(index + 1) == Some(&'=') => {
                index += 1;
                Token::NotEq
            }
            '<' => {
                if chars.get(index + 1) == Some(&'=') {
                    index += 1;
                    Token::Lte
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if chars.get(index + 1) == Some(&'=') {
                    index += 1;
                    Token::Gte
                } else {
                    Token::Gt
                }
            }
            other => return Err(syntax(format!("unexpected character '{other}'"))),
        };
        tokens.push(token);
        index += 1;
    }

    Ok(tokens)
}

struct ExpressionParser<'a> {
    tokens: Vec<Token>,
    cursor: usize,
    columns: &'a HashSet<String>,
}

impl<'a> ExpressionParser<'a> {
    fn new(tokens: Vec<Token>, columns: &'a HashSet<String>) -> Self {
        Self {
            tokens,
            cursor: 0,
            columns,
        }
    }

    fn parse(mut self) -> Result<Expr, EvalError> {
        let expression = self.parse_or()?;
        if self.cursor != self.tokens.len() {
            return Err(syntax("unexpected trailing tokens"));
        }
        Ok(expression)
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut expression = self.parse_and()?;
        while self.consume_if(|token| matches!(token, Token::Or)) {
            let right = self.parse_and()?;
            expression = expression.or(right);
        }
        Ok(expression)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut expression = self.parse_comparison()?;
        while self.consume_if(|token| matches!(token, Token::And)) {
            let right = self.parse_comparison()?;
            expression = expression.and(right);
        }
        Ok(expression)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let left = self.parse_additive()?;
        let Some(operator) = self.peek().cloned() else {
            return Ok(left);
        };
        match operator {
            Token::Eq | Token::NotEq | Token::Lt | Token::Lte | Token::Gt | Token::Gte => {
                self.cursor += 1;
                let right = self.parse_additive()?;
                Ok(match operator {
                    Token::Eq => left.eq(right),
                    Token::NotEq => left.neq(right),
                    Token::Lt => left.lt(right),
                    Token::Lte => left.lt_eq(right),
                    Token::Gt => left.gt(right),
                    Token::Gte => left.gt_eq(right),
                    _ => unreachable!(),
                })
            }
            _ => Ok(left),
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut expression = self.parse_multiplicative()?;
        loop {
            if self.consume_if(|token| matches!(token, Token::Plus)) {
                expression = expression + self.parse_multiplicative()?;
            } else if self.consume_if(|token| matches!(token, Token::Minus)) {
                expression = expression - self.parse_multiplicative()?;
            } else {
                break;
            }
        }
        Ok(expression)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut expression = self.parse_unary()?;
        loop {
            if self.consume_if(|token| matches!(token, Token::Star)) {
                expression = expression * self.parse_unary()?;
            } else if self.consume_if(|token| matches!(token, Token::Slash)) {
                expression = expression / self.parse_unary()?;
            } else {
                break;
            }
        }
        Ok(expression)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.consume_if(|token| matches!(token, Token::Minus)) {
            use std::ops::Neg;
            return Ok(self.parse_unary()?.neg());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        if self.consume_if(|token| matches!(token, Token::LeftParen)) {
            let expression = self.parse_or()?;
            if !self.consume_if(|token| matches!(token, Token::RightParen)) {
                return Err(syntax("missing closing ')'"));
            }
            return Ok(expression);
        }

        let Some(token) = self.take() else {
            return Err(syntax("unexpected end of expression"));
        };

        match token {
            Token::Identifier(name) => {
                if self.consume_if(|token| matches!(token, Token::LeftParen)) {
                    return self.parse_function(name);
                }
                if !self.columns.contains(&name) {
                    return Err(EvalError::UnknownColumn(name));
                }
                Ok(col(name.as_str()))
            }
            Token::Number(value) => {
                if let Ok(integer) = value.parse::<i64>() {
                    return Ok(lit(integer));
                }
                value
                    .parse::<f64>()
                    .map(lit)
                    .map_err(|_| syntax(format!("invalid numeric literal '{value}'")))
            }
            Token::Text(value) => Ok(lit(value)),
            Token::Boolean(value) => Ok(lit(value)),
            _ => Err(syntax("expected a value")),
        }
    }

    fn parse_function(&mut self, name: String) -> Result<Expr, EvalError> {
        let mut arguments = Vec::new();
        if !self.consume_if(|token| matches!(token, Token::RightParen)) {
            loop {
                arguments.push(self.parse_or()?);
                if self.consume_if(|token| matches!(token, Token::Comma)) {
                    continue;
                }
                if self.consume_if(|token| matches!(token, Token::RightParen)) {
                    break;
                }
                return Err(syntax("expected ',' or ')' in function call"));
            }
        }

        if name.eq_ignore_ascii_case("if") {
            if arguments.len() != 3 {
                return Err(syntax("IF expects exactly 3 arguments"));
            }
            let condition = arguments.remove(0);
            let when_true = arguments.remove(0);
            let when_false = arguments.remove(0);
            return Ok(when(condition).then(when_true).otherwise(when_false));
        }

        Err(syntax(format!("unsupported function '{name}'")))
    }

    fn consume_if(&mut self, predicate: impl FnOnce(&Token) -> bool) -> bool {
        let Some(token) = self.tokens.get(self.cursor) else {
            return false;
        };
        if predicate(token) {
            self.cursor += 1;
            return true;
        }
        false
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn take(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(token)
    }
}

/// Compile a formula against the given column set.
pub fn compile_expression(source: &str, columns: &HashSet<String>) -> Result<Expr, EvalError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(syntax("empty expression"));
    }
    ExpressionParser::new(tokens, columns).parse()
}
