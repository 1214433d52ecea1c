//! Classifies one normalized line into an operation. Pure per-line: the
//! parser never consults the symbol table, and syntactic problems become
//! error-carrying operations instead of aborting the file.

use once_cell::sync::Lazy;

use crate::bitmap::BitmapImport;
use crate::expr::{evaluate, is_constant, is_expression, is_symbol};
use crate::line::SourceLine;
use crate::symbols::SymbolTable;

// ----------------------------------------------------------------------------
// Operation

/// How an address instruction names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddrTarget {
    Symbol(String),
    Constant(String),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Address(AddrTarget),
    Compute {
        dest: String,
        comp: String,
        jump: String,
    },
    /// Precise-ALU form: `dest := comp [;jump]`.
    Extended {
        dest: String,
        comp: String,
        jump: String,
    },
    Label {
        name: String,
    },
    Variable {
        name: String,
        size: String,
        init: Vec<String>,
        alias: bool,
    },
    Constant {
        name: String,
        expr: String,
    },
    Invalid,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub line: SourceLine,
    pub kind: Kind,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub code: Option<u16>,
}

impl Operation {
    pub fn new(line: SourceLine, kind: Kind) -> Self {
        Operation {
            line,
            kind,
            error: None,
            warning: None,
            code: None,
        }
    }

    pub fn invalid(line: SourceLine, msg: impl Into<String>) -> Self {
        let mut op = Operation::new(line, Kind::Invalid);
        op.error = Some(msg.into());
        op
    }

    pub fn fail(&mut self, msg: impl Into<String>) {
        self.error = Some(msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warning = Some(msg.into());
    }

    /// Instructions occupy one program word; labels and declarations none.
    pub fn consumes_pc(&self) -> bool {
        matches!(
            self.kind,
            Kind::Address(_) | Kind::Compute { .. } | Kind::Extended { .. }
        )
    }

    pub fn has_init(&self) -> bool {
        matches!(&self.kind, Kind::Variable { init, .. } if !init.is_empty())
    }
}

// ----------------------------------------------------------------------------
// Parsing

/// Size expressions in array declarations are validated against predefined
/// symbols only; the parser runs before any user symbol exists.
static PREDEF: Lazy<SymbolTable> = Lazy::new(SymbolTable::new);

pub fn parse(line: &SourceLine, bitmap: &dyn BitmapImport) -> Operation {
    let text = line.text.as_str();

    if let Some(rest) = text.strip_prefix('@') {
        parse_address(line, rest)
    } else if text.starts_with('(') {
        parse_label(line, text)
    } else if let Some(rest) = text.strip_prefix('$') {
        parse_variable(line, rest, bitmap)
    } else if let Some(rest) = text.strip_prefix('#') {
        parse_constant(line, rest)
    } else {
        parse_compute(line, text)
    }
}

fn parse_address(line: &SourceLine, rest: &str) -> Operation {
    let target = if is_symbol(rest) {
        AddrTarget::Symbol(rest.to_string())
    } else if is_constant(rest) {
        AddrTarget::Constant(rest.to_string())
    } else if is_expression(rest) {
        AddrTarget::Expression(rest.to_string())
    } else {
        return Operation::invalid(
            line.clone(),
            "@ value is not a symbol, constant or expression",
        );
    };
    Operation::new(line.clone(), Kind::Address(target))
}

fn parse_label(line: &SourceLine, text: &str) -> Operation {
    match text.strip_suffix(')') {
        Some(inner) => Operation::new(
            line.clone(),
            Kind::Label {
                name: inner[1..].to_string(),
            },
        ),
        None => Operation::invalid(line.clone(), "Label definition does not end in ')'"),
    }
}

/// `$name`, `$name=v`, `$name(size)`, `$name(size)=v,..`, `$name(*)=file`,
/// `$name@value`. The reserved name `_` becomes a unique anonymous symbol.
fn parse_variable(line: &SourceLine, rest: &str, bitmap: &dyn BitmapImport) -> Operation {
    let anonymize = |name: &str| {
        if name == "_" {
            format!("__Anon__{}", line.no)
        } else {
            name.to_string()
        }
    };

    // Array syntax only when the `(` belongs to the name part; a `(` after
    // `=` is the start of an initializer expression.
    let array_form = match (rest.find('('), rest.find('=')) {
        (Some(p), Some(e)) => p < e,
        (Some(_), None) => true,
        _ => false,
    };

    if array_form {
        let (name, after) = rest.split_once('(').unwrap_or((rest, ""));
        let name = anonymize(name);
        let Some((size, tail)) = after.split_once(')') else {
            return Operation::invalid(line.clone(), "Variable definition is missing closing ')'");
        };

        if size == "*" {
            let path = match tail.strip_prefix('=') {
                Some(p) => p,
                None => {
                    return Operation::invalid(
                        line.clone(),
                        format!("File [{tail}] not found, or not image"),
                    )
                }
            };
            return match bitmap.import(path) {
                Ok((size, init)) => Operation::new(
                    line.clone(),
                    Kind::Variable {
                        name,
                        size,
                        init,
                        alias: false,
                    },
                ),
                Err(_) => Operation::invalid(
                    line.clone(),
                    format!("File [{path}] not found, or not image"),
                ),
            };
        }

        let init: Vec<String> = match tail.strip_prefix('=') {
            Some(values) => values.split(',').map(str::to_string).collect(),
            None => vec![],
        };
        if !init.is_empty() {
            if let Ok(n) = evaluate(size, &PREDEF, false) {
                if n < 0 || n as usize != init.len() {
                    return Operation::invalid(
                        line.clone(),
                        format!(
                            "Variable size ({n}) does not match number of values provided ({})",
                            init.len()
                        ),
                    );
                }
            }
        }
        return Operation::new(
            line.clone(),
            Kind::Variable {
                name,
                size: size.to_string(),
                init,
                alias: false,
            },
        );
    }

    if let Some((name, values)) = rest.split_once('=') {
        let init: Vec<String> = values.split(',').map(str::to_string).collect();
        if init.len() != 1 {
            return Operation::invalid(
                line.clone(),
                format!(
                    "Variable size (1) does not match number of values provided ({})",
                    init.len()
                ),
            );
        }
        return Operation::new(
            line.clone(),
            Kind::Variable {
                name: anonymize(name),
                size: "1".to_string(),
                init,
                alias: false,
            },
        );
    }

    if let Some((name, target)) = rest.split_once('@') {
        if target.contains(',') {
            return Operation::invalid(line.clone(), "Variable alias can have only one value");
        }
        return Operation::new(
            line.clone(),
            Kind::Variable {
                name: anonymize(name),
                size: target.to_string(),
                init: vec![],
                alias: true,
            },
        );
    }

    Operation::new(
        line.clone(),
        Kind::Variable {
            name: anonymize(rest),
            size: "1".to_string(),
            init: vec![],
            alias: false,
        },
    )
}

fn parse_constant(line: &SourceLine, rest: &str) -> Operation {
    match rest.split_once('=') {
        Some((name, expr)) => Operation::new(
            line.clone(),
            Kind::Constant {
                name: name.to_string(),
                expr: expr.to_string(),
            },
        ),
        None => Operation::invalid(line.clone(), "Constant definition does not contain a value"),
    }
}

fn parse_compute(line: &SourceLine, text: &str) -> Operation {
    let parts: Vec<&str> = text.split(';').collect();
    if parts.len() > 2 {
        return Operation::invalid(line.clone(), "Multiple ;'s in operation");
    }
    let jump = if parts.len() == 2 {
        parts[1].to_uppercase()
    } else {
        "NULL".to_string()
    };
    let head = parts[0].to_uppercase();

    if head.contains(":=") {
        let sides: Vec<&str> = head.split(":=").collect();
        if sides.len() != 2 {
            return Operation::invalid(line.clone(), "Multiple :='s in operation");
        }
        return Operation::new(
            line.clone(),
            Kind::Extended {
                dest: sides[0].to_string(),
                comp: sides[1].to_string(),
                jump,
            },
        );
    }

    let sides: Vec<&str> = head.split('=').collect();
    match sides.len() {
        1 => Operation::new(
            line.clone(),
            Kind::Compute {
                dest: "NULL".to_string(),
                comp: sides[0].to_string(),
                jump,
            },
        ),
        2 => Operation::new(
            line.clone(),
            Kind::Compute {
                dest: sides[0].to_string(),
                comp: sides[1].to_string(),
                jump,
            },
        ),
        _ => Operation::invalid(line.clone(), "Multiple ='s in operation"),
    }
}
