//! Power-on initialization synthesis. Memory cannot be initialized at load
//! time, so declarations with initializer values get a generated routine:
//! a jump to it is spliced ahead of user code and the body is appended
//! after, leaving every user address untouched beyond the two-word prologue.

use crate::expr::evaluate;
use crate::line::SourceLine;
use crate::parser::{AddrTarget, Kind, Operation};
use crate::symbols::SymbolTable;

pub const INIT_LABEL: &str = "__INIT";
pub const RET_LABEL: &str = "__INIT.Ret";

/// One scalar initializer value bound for a memory cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct InitEntry {
    value: u16,
    symbol: String,
    offset: usize,
    line_no: i32,
}

/// The jump-to-init pair and return label, inserted ahead of user code
/// before the symbol passes run so every label lands on its final address.
pub fn prologue() -> Vec<Operation> {
    vec![
        Operation::new(
            SourceLine::synthetic(-1, "@__INIT // Jump to Initializer"),
            Kind::Address(AddrTarget::Expression(INIT_LABEL.to_string())),
        ),
        jump(-1),
        Operation::new(
            SourceLine::synthetic(-1, "(__INIT.Ret)"),
            Kind::Label {
                name: RET_LABEL.to_string(),
            },
        ),
    ]
}

/// The entry label of the generated routine, appended after user code.
pub fn epilogue() -> Operation {
    Operation::new(
        SourceLine::synthetic(-2, "(__INIT)"),
        Kind::Label {
            name: INIT_LABEL.to_string(),
        },
    )
}

/// Generate the initializer body. Entries are sorted by value so equal and
/// adjacent values share the loaded register: an equal value skips the load
/// entirely and a value one above the previous costs a single increment.
pub fn synthesize(ops: &[Operation], symbols: &SymbolTable) -> Vec<Operation> {
    let mut out: Vec<Operation> = Vec::new();
    let mut entries: Vec<InitEntry> = Vec::new();

    for op in ops {
        let Kind::Variable { name, init, .. } = &op.kind else {
            continue;
        };
        for (offset, expr) in init.iter().enumerate() {
            match evaluate(expr, symbols, false) {
                Ok(v) => entries.push(InitEntry {
                    value: (v as i64 & 0xFFFF) as u16,
                    symbol: name.clone(),
                    offset,
                    line_no: op.line.no,
                }),
                Err(_) => {
                    let cell = if init.len() == 1 {
                        name.clone()
                    } else {
                        format!("{name}[{offset}]")
                    };
                    out.push(Operation::invalid(
                        op.line.clone(),
                        format!(
                            "Invalid constant initialization expression [{expr}] provided for {cell}"
                        ),
                    ));
                }
            }
        }
    }

    entries.sort();

    // What the D register currently holds; initializer values are unsigned
    // so -1 never matches.
    let mut loaded: i32 = -1;

    for entry in &entries {
        let val = entry.value as i32;
        let cell = format!("{}+{}", entry.symbol, entry.offset);
        let no = entry.line_no;

        if val == 0 || val == 1 {
            // Machine constants write directly, no register involved.
            out.push(load_address(no, &cell));
            out.push(store(no, "M", &val.to_string(), &format!("M={val}")));
        } else if val == 0xFFFF {
            out.push(load_address(no, &cell));
            out.push(store(no, "M", "-1", "M=-1"));
        } else {
            if val != loaded {
                if val == loaded + 1 && val != 2 {
                    // D already holds the previous value; 2 is excluded
                    // because the 0/1 cases above never touch D.
                    out.push(store(no, "D", "D+1", "D=D+1"));
                } else if val < 32768 {
                    out.push(load_address(no, &val.to_string()));
                    out.push(store(no, "D", "A", "D=A"));
                } else {
                    // Too wide for an address literal: load the complement
                    // and undo it in the compute stage.
                    let inv = !val & 0xFFFF;
                    out.push(load_address(no, &inv.to_string()));
                    out.push(store(no, "D", "!A", "D=!A"));
                }
            }
            out.push(load_address(no, &cell));
            out.push(store(no, "M", "D", "M=D"));
        }

        loaded = val;
    }

    out.push(load_address(-3, RET_LABEL));
    out.push(jump(-3));
    out
}

fn load_address(no: i32, expr: &str) -> Operation {
    Operation::new(
        SourceLine::synthetic(no, &format!("@{expr}")),
        Kind::Address(AddrTarget::Expression(expr.to_string())),
    )
}

fn store(no: i32, dest: &str, comp: &str, raw: &str) -> Operation {
    Operation::new(
        SourceLine::synthetic(no, raw),
        Kind::Compute {
            dest: dest.to_string(),
            comp: comp.to_string(),
            jump: "NULL".to_string(),
        },
    )
}

fn jump(no: i32) -> Operation {
    Operation::new(
        SourceLine::synthetic(no, "0;JMP"),
        Kind::Compute {
            dest: "NULL".to_string(),
            comp: "0".to_string(),
            jump: "JMP".to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Category;

    fn var(no: i32, name: &str, init: &[&str]) -> Operation {
        Operation::new(
            SourceLine::synthetic(no, name),
            Kind::Variable {
                name: name.to_string(),
                size: init.len().to_string(),
                init: init.iter().map(|s| s.to_string()).collect(),
                alias: false,
            },
        )
    }

    fn body_len(ops: &[Operation]) -> usize {
        // Drop the closing jump pair to measure just the stores.
        synthesize(ops, &SymbolTable::new()).len() - 2
    }

    #[test]
    fn hack_constants_write_directly() {
        // One @cell + one M=v per entry, no D loads.
        let ops = [var(1, "a", &["0", "1", "-1"])];
        assert_eq!(body_len(&ops), 6);
    }

    #[test]
    fn equal_values_share_the_loaded_register() {
        // 5 loads once (2 words) then two 2-word stores.
        let ops = [var(1, "a", &["5", "5"])];
        assert_eq!(body_len(&ops), 6);
    }

    #[test]
    fn adjacent_value_costs_one_increment() {
        let mut table = SymbolTable::new();
        table.insert("a", 16, Category::Variable).unwrap();
        table.insert("b", 21, Category::Variable).unwrap();

        // Sorted values 0,1,5,5,6: the 6 rides on the 5 with a single D=D+1
        // instead of a fresh 2-word load.
        let ops = [var(1, "a", &["5", "0", "1", "5", "6"])];
        let body = synthesize(&ops, &table);
        let adjacent = body
            .iter()
            .filter(|op| op.line.raw == "D=D+1")
            .count();
        assert_eq!(adjacent, 1);
        // 0:2 + 1:2 + 5:(2+2) + 5:2 + 6:(1+2) + return:2
        assert_eq!(body.len(), 15);
    }

    #[test]
    fn two_cannot_ride_on_one() {
        // After writing 1 the D register holds nothing usable.
        let ops = [var(1, "a", &["1", "2"])];
        let body = synthesize(&ops, &SymbolTable::new());
        assert!(body.iter().all(|op| op.line.raw != "D=D+1"));
    }

    #[test]
    fn wide_values_load_complemented() {
        let ops = [var(1, "a", &["-2"])];
        let body = synthesize(&ops, &SymbolTable::new());
        // -2 is 0xFFFE, complement 1: @1 / D=!A / @a+0 / M=D, then return.
        assert_eq!(body[0].line.raw, "@1");
        assert_eq!(body[1].line.raw, "D=!A");
        assert_eq!(body.len(), 6);
    }

    #[test]
    fn bad_initializer_is_one_error_among_many() {
        let ops = [var(7, "a", &["1", "bogus+", "3"])];
        let body = synthesize(&ops, &SymbolTable::new());
        let errors: Vec<_> = body.iter().filter(|op| op.error.is_some()).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .error
            .as_deref()
            .unwrap()
            .contains("a[1]"));
        // The two good values still generate code.
        assert!(body.len() > 3);
    }

    #[test]
    fn scaffold_shapes() {
        let pro = prologue();
        assert_eq!(pro.len(), 3);
        assert!(pro[0].consumes_pc());
        assert!(pro[1].consumes_pc());
        assert!(!pro[2].consumes_pc());
        assert!(!epilogue().consumes_pc());
    }
}
