// Restricted arithmetic-expression parser for functions of a single complex
// variable. Only `+ - * / ** ^ ( )`, numeric literals, the free variable `x`,
// and the imaginary unit `I` are accepted. The result is a plain syntax tree;
// nothing is ever evaluated as code.

use num::complex::Complex64;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected character '{character}' at offset {offset}")]
    UnexpectedCharacter { character: char, offset: usize },

    #[error("invalid number literal '{literal}' at offset {offset}")]
    InvalidNumber { literal: String, offset: usize },

    #[error("unknown identifier '{name}' at offset {offset} (expected `x` or `I`)")]
    UnknownIdentifier { name: String, offset: usize },

    #[error("unexpected token {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unbalanced parenthesis opened at offset {offset}")]
    UnbalancedParenthesis { offset: usize },

    #[error("expression nested deeper than {} levels near offset {offset}", MAX_NESTING_DEPTH)]
    NestingTooDeep { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Plus,
    Negate,
}

/// Syntax tree of a parsed expression in the free variable `x`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Complex64),
    Variable,
    Unary(UnaryOperator, Box<Expression>),
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Variable,
    ImaginaryUnit,
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    LeftParen,
    RightParen,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(value) => write!(f, "number {}", value),
            TokenKind::Variable => write!(f, "`x`"),
            TokenKind::ImaginaryUnit => write!(f, "`I`"),
            TokenKind::Plus => write!(f, "`+`"),
            TokenKind::Minus => write!(f, "`-`"),
            TokenKind::Star => write!(f, "`*`"),
            TokenKind::Slash => write!(f, "`/`"),
            TokenKind::Power => write!(f, "`**`"),
            TokenKind::LeftParen => write!(f, "`(`"),
            TokenKind::RightParen => write!(f, "`)`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        let offset = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            // Optional exponent: `e`, optional sign, at least one digit.
            if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
                let mut lookahead = pos + 1;
                if lookahead < bytes.len() && (bytes[lookahead] == b'+' || bytes[lookahead] == b'-')
                {
                    lookahead += 1;
                }
                if lookahead < bytes.len() && bytes[lookahead].is_ascii_digit() {
                    pos = lookahead;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let literal = &source[offset..pos];
            let value = literal
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber {
                    literal: literal.to_owned(),
                    offset,
                })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                offset,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            let kind = match &source[offset..pos] {
                "x" => TokenKind::Variable,
                "I" => TokenKind::ImaginaryUnit,
                name => {
                    return Err(ExpressionError::UnknownIdentifier {
                        name: name.to_owned(),
                        offset,
                    })
                }
            };
            tokens.push(Token { kind, offset });
            continue;
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 1;
                TokenKind::Power
            }
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '^' => TokenKind::Power,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            _ => {
                // Report the full (possibly multi-byte) character.
                let character = source[offset..].chars().next().unwrap_or(c);
                return Err(ExpressionError::UnexpectedCharacter { character, offset });
            }
        };
        pos += 1;
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

// Binding powers, low to high. Power is right associative.
const ADDITIVE_BINDING_POWER: u8 = 10;
const MULTIPLICATIVE_BINDING_POWER: u8 = 20;
const PREFIX_BINDING_POWER: u8 = 30;
const POWER_BINDING_POWER: u8 = 40;

/// Bound on both the parser recursion and the depth of the resulting tree.
/// Everything downstream walks the tree recursively.
pub const MAX_NESTING_DEPTH: usize = 256;

/// A parsed subtree together with its depth (a leaf has depth 1).
type Subtree = (Expression, usize);

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    recursion_depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn nesting_error(&self) -> ExpressionError {
        let offset = self
            .tokens
            .get(self.position.saturating_sub(1))
            .map_or(0, |token| token.offset);
        ExpressionError::NestingTooDeep { offset }
    }

    fn check_depth(&self, depth: usize) -> Result<usize, ExpressionError> {
        if depth > MAX_NESTING_DEPTH {
            Err(self.nesting_error())
        } else {
            Ok(depth)
        }
    }

    /// Parses everything that binds tighter than `min_binding_power`.
    fn parse_expression(&mut self, min_binding_power: u8) -> Result<Subtree, ExpressionError> {
        self.recursion_depth += 1;
        let result = self
            .check_depth(self.recursion_depth)
            .and_then(|_| self.parse_operators(min_binding_power));
        self.recursion_depth -= 1;
        result
    }

    /// Pratt loop over binary operators.
    fn parse_operators(&mut self, min_binding_power: u8) -> Result<Subtree, ExpressionError> {
        let (mut lhs, mut lhs_depth) = self.parse_prefix()?;

        while let Some(token) = self.peek() {
            let (operator, left_bp) = match token.kind {
                TokenKind::Plus => (BinaryOperator::Add, ADDITIVE_BINDING_POWER),
                TokenKind::Minus => (BinaryOperator::Subtract, ADDITIVE_BINDING_POWER),
                TokenKind::Star => (BinaryOperator::Multiply, MULTIPLICATIVE_BINDING_POWER),
                TokenKind::Slash => (BinaryOperator::Divide, MULTIPLICATIVE_BINDING_POWER),
                TokenKind::Power => (BinaryOperator::Power, POWER_BINDING_POWER),
                TokenKind::RightParen => break,
                _ => {
                    return Err(ExpressionError::UnexpectedToken {
                        found: token.kind.to_string(),
                        offset: token.offset,
                    })
                }
            };

            if left_bp < min_binding_power {
                break;
            }
            // The right operand of `**` may itself start with a unary sign: `2**-1`.
            let right_bp = if operator == BinaryOperator::Power {
                left_bp - 1
            } else {
                left_bp + 1
            };
            self.next();
            let (rhs, rhs_depth) = self.parse_expression(right_bp)?;
            // Left-associative chains deepen the tree without deepening the recursion.
            lhs_depth = self.check_depth(lhs_depth.max(rhs_depth) + 1)?;
            lhs = Expression::Binary(operator, Box::new(lhs), Box::new(rhs));
        }

        Ok((lhs, lhs_depth))
    }

    fn parse_unary(&mut self, operator: UnaryOperator) -> Result<Subtree, ExpressionError> {
        let (operand, depth) = self.parse_expression(PREFIX_BINDING_POWER)?;
        let depth = self.check_depth(depth + 1)?;
        Ok((Expression::Unary(operator, Box::new(operand)), depth))
    }

    fn parse_prefix(&mut self) -> Result<Subtree, ExpressionError> {
        let token = self.next().ok_or(ExpressionError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok((Expression::Constant(Complex64::new(value, 0.0)), 1)),
            TokenKind::ImaginaryUnit => Ok((Expression::Constant(Complex64::i()), 1)),
            TokenKind::Variable => Ok((Expression::Variable, 1)),
            TokenKind::Plus => self.parse_unary(UnaryOperator::Plus),
            TokenKind::Minus => self.parse_unary(UnaryOperator::Negate),
            TokenKind::LeftParen => {
                let inner = self.parse_expression(0)?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RightParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(ExpressionError::UnbalancedParenthesis {
                        offset: token.offset,
                    }),
                }
            }
            kind => Err(ExpressionError::UnexpectedToken {
                found: kind.to_string(),
                offset: token.offset,
            }),
        }
    }
}

/// `base ** exponent`, exact (repeated multiplication) for integer exponents.
pub fn complex_power(base: Complex64, exponent: Complex64) -> Complex64 {
    if exponent.im == 0.0 && exponent.re.fract() == 0.0 && exponent.re.abs() <= i32::MAX as f64 {
        base.powi(exponent.re as i32)
    } else {
        base.powc(exponent)
    }
}

impl Expression {
    /// Parses `source` following Python operator precedence, so that
    /// `-x**2` is `-(x**2)` and `x**2**3` is `x**(2**3)`. Trees deeper than
    /// `MAX_NESTING_DEPTH` are rejected.
    pub fn parse(source: &str) -> Result<Expression, ExpressionError> {
        let mut parser = Parser {
            tokens: tokenize(source)?,
            position: 0,
            recursion_depth: 0,
        };
        let (expression, _) = parser.parse_expression(0)?;
        if let Some(token) = parser.next() {
            return Err(ExpressionError::UnexpectedToken {
                found: token.kind.to_string(),
                offset: token.offset,
            });
        }
        Ok(expression)
    }

    /// Direct evaluation of the tree at `z`.
    pub fn evaluate(&self, z: Complex64) -> Complex64 {
        match self {
            Expression::Constant(value) => *value,
            Expression::Variable => z,
            Expression::Unary(UnaryOperator::Plus, operand) => operand.evaluate(z),
            Expression::Unary(UnaryOperator::Negate, operand) => -operand.evaluate(z),
            Expression::Binary(operator, lhs, rhs) => {
                let a = lhs.evaluate(z);
                let b = rhs.evaluate(z);
                match operator {
                    BinaryOperator::Add => a + b,
                    BinaryOperator::Subtract => a - b,
                    BinaryOperator::Multiply => a * b,
                    BinaryOperator::Divide => a / b,
                    BinaryOperator::Power => complex_power(a, b),
                }
            }
        }
    }
}
