//! Console diagnostics and the end-of-run report.

use color_print::cprintln;
use terminal_size::{terminal_size, Width};

use arch::{MAX_RAM, MAX_ROM};

use crate::parser::Operation;
use crate::passes::Assembly;
use crate::symbols::Category;

/// Print every diagnostic and the closing summary. Returns false when the
/// run produced errors and no artifact should be written.
pub fn print_report(asm: &Assembly) -> bool {
    for op in asm.errors() {
        if let Some(msg) = &op.error {
            cprintln!("<red,bold>Error in line {}</>: {}", position(op), msg);
            print_source(op);
        }
    }
    for op in asm.warnings() {
        if let Some(msg) = &op.warning {
            cprintln!("<yellow,bold>Warning in line {}</>: {}", position(op), msg);
            print_source(op);
        }
    }

    let errors = asm.errors().count();
    let warnings = asm.warnings().count();

    if errors > 0 {
        cprintln!(
            "<red,bold>Assembly aborted</> -- {} error(s) and {} warning(s) detected.",
            errors,
            warnings
        );
        return false;
    }

    println!("{}", usage_line("Program length", asm.pc as i64, MAX_ROM as i64));
    println!("{}", usage_line("RAM usage", asm.ram, MAX_RAM as i64));
    cprintln!(
        "<green,bold>Assembly complete</> -- 0 error(s) and {} warning(s) detected.",
        warnings
    );
    true
}

fn print_source(op: &Operation) {
    cprintln!("      <blue>|</> {}", op.line.raw);
}

/// Generated operations carry no meaningful source position.
fn position(op: &Operation) -> String {
    if op.line.no > 0 {
        op.line.no.to_string()
    } else {
        "(generated)".to_string()
    }
}

fn usage_line(what: &str, used: i64, total: i64) -> String {
    let percent = used as f64 * 100.0 / total as f64;
    format!("{what}: {used} (of {total}, {percent:.1}%)")
}

/// Dump the symbol table as a set of column-first grids. Labels, constants
/// and variables are each printed twice, once sorted by name and once by
/// value, so both "where is this symbol" and "what lives at this address"
/// are answerable at a glance. Declared and auto-allocated variables share
/// a section; the auto-allocated ones get their own grid too so typos that
/// silently became implicit variables stand out.
pub fn print_symbols(asm: &Assembly) {
    let collect = |cats: &[Category]| -> Vec<(&str, i32)> {
        cats.iter()
            .flat_map(|c| asm.symbols.in_category(*c))
            .collect()
    };
    let by_name = |mut list: Vec<(&str, i32)>| -> Vec<String> {
        list.sort_by_key(|(n, _)| n.to_lowercase());
        symbol_cells(&list)
    };
    let by_value = |mut list: Vec<(&str, i32)>| -> Vec<String> {
        list.sort_by_key(|&(n, v)| (v, n.to_lowercase()));
        symbol_cells(&list)
    };

    print_grid("Predefined symbols", &by_name(collect(&[Category::Predefined])));
    for (name_title, value_title, cats) in [
        ("Labels (by name)", "Labels (by value)", &[Category::Label][..]),
        (
            "Constants (by name)",
            "Constants (by value)",
            &[Category::Constant][..],
        ),
        (
            "Variables (by name)",
            "Variables (by value)",
            &[Category::Variable, Category::Implicit][..],
        ),
    ] {
        print_grid(name_title, &by_name(collect(cats)));
        print_grid(value_title, &by_value(collect(cats)));
    }
    print_grid(
        "Auto-allocated variables",
        &by_name(collect(&[Category::Implicit])),
    );
}

/// `name value` cells, names padded to the section's widest so the value
/// column lines up.
fn symbol_cells(list: &[(&str, i32)]) -> Vec<String> {
    let width = list.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    list.iter()
        .map(|(n, v)| format!("{n:<width$} {v:5}"))
        .collect()
}

const COLUMN_SEP: &str = " | ";

fn print_grid(title: &str, cells: &[String]) {
    if cells.is_empty() {
        return;
    }
    let cell_width = cells.iter().map(|s| s.len()).max().unwrap_or(0);
    let (cols, rows) = grid_shape(cells.len(), cell_width, console_width());

    cprintln!("<bold>{}</>", title);
    println!("{} -----", "-".repeat(cell_width.max(title.len())));
    for row in 0..rows {
        let mut line = String::new();
        for col in 0..cols {
            let idx = col * rows + row;
            if idx >= cells.len() {
                break;
            }
            if col > 0 {
                line.push_str(COLUMN_SEP);
            }
            line.push_str(&format!("{:<cell_width$}", cells[idx]));
        }
        println!("{}", line.trim_end());
    }
    println!();
}

/// Columns that fit the console, then rows to hold everything column-first.
fn grid_shape(count: usize, cell_width: usize, console: usize) -> (usize, usize) {
    let stride = cell_width + COLUMN_SEP.len();
    let cols = ((console + COLUMN_SEP.len()) / stride).max(1).min(count);
    let rows = (count + cols - 1) / cols;
    (cols, rows)
}

fn console_width() -> usize {
    match terminal_size() {
        Some((Width(w), _)) => w as usize,
        None => 80,
    }
}
