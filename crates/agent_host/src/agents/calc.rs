//! Arithmetic agent.
//!
//! Input is checked against a strict character allow-list before anything
//! is parsed; accepted input is evaluated by a small recursive-descent parser
//! over `f64`. Nothing is ever handed to an interpreter.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{Agent, AgentFailure, AgentOutput, Presentation};

/// Candidate expression runs inside a marker argument
static EXPRESSION_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9 +\-*/().xX×=]+").expect("expression pattern is valid"));

const MAX_DEPTH: usize = 256;

pub struct CalcAgent;

impl CalcAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalcAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the multiplication spellings `x` and `X` with `*`
pub fn normalize_operators(expression: &str) -> String {
    expression
        .chars()
        .map(|c| match c {
            'x' | 'X' => '*',
            other => other,
        })
        .collect()
}

/// Pull the expression out of a marker argument such as `what is 7 x 3 =`.
///
/// Keeps the first run of expression characters that contains a digit, cut
/// at the first `=`, with `×` read as `*`. Arguments without such a run are returned trimmed so the
/// evaluator can reject them.
pub fn sanitize_expression(argument: &str) -> String {
    let run = EXPRESSION_RUN_RE
        .find_iter(argument)
        .map(|m| m.as_str())
        .find(|run| run.chars().any(|c| c.is_ascii_digit()));

    match run {
        Some(run) => {
            let before_eq = run.split('=').next().unwrap_or(run);
            normalize_operators(&before_eq.replace('×', "*"))
                .trim()
                .to_string()
        }
        None => argument.trim().to_string(),
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<f64, AgentFailure> {
    let normalized = normalize_operators(expression);
    if let Some(bad) = normalized
        .chars()
        .find(|c| !(c.is_ascii_digit() || c.is_ascii_whitespace() || "+-*/().".contains(*c)))
    {
        return Err(AgentFailure::DisallowedCharacter(bad));
    }

    let mut parser = Parser {
        src: normalized.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.parse().map_err(AgentFailure::Calculation)?;
    if !value.is_finite() {
        return Err(AgentFailure::Calculation("result is not a finite number".into()));
    }
    // -0 prints as "-0"
    Ok(if value == 0.0 { 0.0 } else { value })
}

/// Shortest representation that round-trips (`4`, `0.30000000000000004`)
pub fn format_value(value: f64) -> String {
    format!("{}", value)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

type ParseResult = Result<f64, String>;

impl Parser<'_> {
    fn parse(&mut self) -> ParseResult {
        if self.peek().is_none() {
            return Err("empty expression".into());
        }
        let value = self.expression()?;
        match self.peek() {
            None => Ok(value),
            Some(c) => Err(format!("unexpected '{}'", c as char)),
        }
    }

    fn peek(&mut self) -> Option<u8> {
        while self.src.get(self.pos).is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.src.get(self.pos).copied()
    }

    fn is_power(&self) -> bool {
        self.src.get(self.pos) == Some(&b'*') && self.src.get(self.pos + 1) == Some(&b'*')
    }

    fn expression(&mut self) -> ParseResult {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> ParseResult {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(b'*') if !self.is_power() => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err("division by zero".into());
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> ParseResult {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        let value = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                self.unary().map(|v| -v)
            }
            Some(b'+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        };
        self.depth -= 1;
        value
    }

    /// `**` binds tighter than unary minus on its left and is right-associative
    fn power(&mut self) -> ParseResult {
        let base = self.primary()?;
        self.peek();
        if self.is_power() {
            self.pos += 2;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> ParseResult {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.expression()?;
                match self.peek() {
                    Some(b')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("missing closing parenthesis".into()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) => Err(format!("unexpected '{}'", c as char)),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn number(&mut self) -> ParseResult {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == b'.')
        {
            self.pos += 1;
        }
        let literal = String::from_utf8_lossy(&self.src[start..self.pos]);
        literal
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", literal))
    }
}

#[async_trait]
impl Agent for CalcAgent {
    fn id(&self) -> &str {
        "calc"
    }

    async fn run(&self, argument: &str) -> Result<AgentOutput, AgentFailure> {
        let value = format_value(evaluate(argument)?);
        Ok(AgentOutput::text(format!("```\nResult: {}\n```", value)).with_value(value))
    }

    fn sanitize(&self, argument: &str) -> String {
        sanitize_expression(argument)
    }

    fn presentation(&self) -> Presentation {
        Presentation::Equation
    }
}
