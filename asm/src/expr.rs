//! Arithmetic expression evaluation over constants and symbols.
//!
//! The evaluator is deliberately precedence-free: it always splits at the
//! last operator in the text, so `2+3*4` is `(2+3)*4`. Parentheses are the
//! only grouping mechanism.

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::symbols::SymbolTable;

const OPERATORS: &[char] = &['-', '+', '/', '*', '%', '&', '|', '~', '<', '>'];
const UNARY_OPERATORS: &[char] = &['-', '+', '~'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("Unary operator can only be used as first element in an expression or parenthetical expression")]
    DanglingUnary,

    #[error("No matching ) in expression")]
    UnmatchedParen,

    #[error("Dangling ) in expression")]
    DanglingParen,

    #[error("Dangling \\ in expression (probably in last line of file)")]
    DanglingContinuation,

    #[error("Divide by 0 error in expression")]
    DivideByZero,

    #[error("Undefined symbol [{0}] in expression")]
    UndefinedSymbol(String),

    #[error("Unimplemented expression operator [{0}]")]
    UnknownOperator(char),

    #[error("Expression value out of range")]
    Overflow,

    #[error("Invalid constant [{0}]")]
    BadConstant(String),

    #[error("Cannot parse expression [{0}]")]
    Unparseable(String),
}

/// True for text that satisfies the symbol grammar: letters, digits and
/// `_ . $ :`, not starting with a digit or `-`.
pub fn is_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        None => false,
        Some(c) if c.is_ascii_digit() || c == '-' => false,
        Some(c) if !is_symbol_char(c) => false,
        Some(_) => chars.all(is_symbol_char),
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | ':')
}

/// Value of a numeric or character constant: decimal by default, `0x`/`0o`/
/// `0b` prefixed, or a 3-character quoted literal giving the code point.
pub fn constant(s: &str) -> Result<i32, ExprError> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() == 3 && (chars[0] == '\'' || chars[0] == '"') && chars[2] == chars[0] {
        return Ok(chars[1] as i32);
    }
    let lower = s.to_lowercase();
    let (radix, digits) = match lower.get(..2) {
        Some("0x") => (16, &lower[2..]),
        Some("0o") => (8, &lower[2..]),
        Some("0b") => (2, &lower[2..]),
        _ => (10, lower.as_str()),
    };
    i32::from_str_radix(digits, radix).map_err(|_| ExprError::BadConstant(s.to_string()))
}

pub fn is_constant(s: &str) -> bool {
    constant(s).is_ok()
}

/// Syntax check only: unresolved symbols are accepted (a sentinel value is
/// substituted), so this works before the symbol table is populated.
pub fn is_expression(s: &str) -> bool {
    static NO_SYMBOLS: Lazy<SymbolTable> = Lazy::new(SymbolTable::empty);
    evaluate(s, &NO_SYMBOLS, true).is_ok()
}

/// Evaluate an expression. With `check_only`, undefined symbols evaluate to
/// a dummy 1 instead of failing, which turns the evaluator into a pure
/// syntax checker.
pub fn evaluate(text: &str, symbols: &SymbolTable, check_only: bool) -> Result<i32, ExprError> {
    // Nothing to the right of a unary operator.
    if text.is_empty() {
        return Err(ExprError::DanglingUnary);
    }

    // Reduce parentheticals one at a time: the last `(` with the first `)`
    // after it is always an innermost group, so nesting resolves correctly.
    let mut s = text.to_string();
    while let Some(open) = s.rfind('(') {
        let close = s[open..]
            .find(')')
            .map(|i| i + open)
            .ok_or(ExprError::UnmatchedParen)?;
        let val = evaluate(&s[open + 1..close], symbols, check_only)?;
        s.replace_range(open..=close, &val.to_string());
    }

    if s.contains(')') {
        return Err(ExprError::DanglingParen);
    }
    if s.ends_with('\\') {
        return Err(ExprError::DanglingContinuation);
    }

    eval_flat(&s, symbols, check_only)
}

/// Evaluate text with no parentheses left in it.
fn eval_flat(s: &str, symbols: &SymbolTable, check_only: bool) -> Result<i32, ExprError> {
    // Split at the LAST operator occurrence; recursion evaluates everything
    // to its left first. This is what makes the grammar precedence-free.
    let split = s
        .char_indices()
        .filter(|(_, c)| OPERATORS.contains(c))
        .last();

    if let Some((mut idx, mut op)) = split {
        if UNARY_OPERATORS.contains(&op) {
            if idx == 0 {
                // The whole remainder is a unary expression.
                let v = evaluate(&s[op.len_utf8()..], symbols, check_only)?;
                return match op {
                    '-' => v.checked_neg().ok_or(ExprError::Overflow),
                    '+' => Ok(v),
                    _ => Ok(!v),
                };
            }
            // `a<op><unary><b>`: retreat so the earlier operator is the
            // binary split and the unary sticks to the right operand.
            if let Some((pidx, pc)) = s[..idx].char_indices().last() {
                if OPERATORS.contains(&pc) {
                    idx = pidx;
                    op = pc;
                }
            }
        }

        let lhs = evaluate(&s[..idx], symbols, check_only)?;
        let rhs = evaluate(&s[idx + op.len_utf8()..], symbols, check_only)?;
        return apply(op, lhs, rhs);
    }

    if let Ok(v) = constant(s) {
        Ok(v)
    } else if is_symbol(s) {
        match symbols.get(s) {
            Some(v) => Ok(v),
            None if check_only => Ok(1),
            None => Err(ExprError::UndefinedSymbol(s.to_string())),
        }
    } else {
        Err(ExprError::Unparseable(s.to_string()))
    }
}

fn apply(op: char, a: i32, b: i32) -> Result<i32, ExprError> {
    match op {
        '+' => a.checked_add(b).ok_or(ExprError::Overflow),
        '-' => a.checked_sub(b).ok_or(ExprError::Overflow),
        '*' => a.checked_mul(b).ok_or(ExprError::Overflow),
        '/' => floor_div(a, b),
        '%' => floor_mod(a, b),
        '&' => Ok(a & b),
        '|' => Ok(a | b),
        '<' => shift_left(a, b),
        '>' => shift_right(a, b),
        other => Err(ExprError::UnknownOperator(other)),
    }
}

// Division and modulo round toward negative infinity, matching the target's
// reference arithmetic rather than Rust's truncating `/` and `%`.

fn floor_div(a: i32, b: i32) -> Result<i32, ExprError> {
    if b == 0 {
        return Err(ExprError::DivideByZero);
    }
    let q = a.checked_div(b).ok_or(ExprError::Overflow)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i32, b: i32) -> Result<i32, ExprError> {
    if b == 0 {
        return Err(ExprError::DivideByZero);
    }
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn shift_left(a: i32, b: i32) -> Result<i32, ExprError> {
    if !(0..32).contains(&b) {
        return Err(ExprError::Overflow);
    }
    i32::try_from((a as i64) << b).map_err(|_| ExprError::Overflow)
}

fn shift_right(a: i32, b: i32) -> Result<i32, ExprError> {
    if b < 0 {
        return Err(ExprError::Overflow);
    }
    Ok(a >> b.min(31))
}
