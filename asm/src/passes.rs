//! The compilation pipeline: normalize, parse, three symbol passes,
//! initialization synthesis and code generation. All state lives in the
//! `Assembly` produced for one run; nothing survives between compilations.

use arch::{MAX_RAM, MAX_ROM, VAR_BASE};

use crate::bitmap::BitmapImport;
use crate::expr::{constant, evaluate};
use crate::init;
use crate::line;
use crate::parser::{self, AddrTarget, Kind, Operation};
use crate::symbols::{Category, SymbolTable};

pub struct Assembly {
    pub ops: Vec<Operation>,
    pub symbols: SymbolTable,
    pub pc: u32,
    pub ram: i64,
}

impl Assembly {
    pub fn has_errors(&self) -> bool {
        self.ops.iter().any(|op| op.error.is_some())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter().filter(|op| op.error.is_some())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter().filter(|op| op.warning.is_some())
    }

    /// Emitted instruction words, in program order.
    pub fn words(&self) -> Vec<u16> {
        self.ops.iter().filter_map(|op| op.code).collect()
    }
}

pub fn assemble(source: &str, bitmap: &dyn BitmapImport) -> Assembly {
    let lines = line::normalize(source.lines());

    let mut ops: Vec<Operation> = lines.iter().map(|l| parser::parse(l, bitmap)).collect();

    // The merge loop cannot consume a continuation on the very last line.
    if lines.last().map_or(false, |l| l.text.ends_with('\\')) {
        if let Some(op) = ops.last_mut() {
            op.fail("Last line in the file contains a line-continuation character (\\).");
        }
    }

    let mut init_needed = false;
    for op in ops.iter_mut() {
        if let Kind::Address(AddrTarget::Symbol(s)) = &op.kind {
            if s.starts_with("__") {
                op.warn(
                    "Use of __symbol in code; please be careful as these are \
                     reserved for internal assembler use.",
                );
            }
        }
        init_needed = init_needed || op.has_init();
    }

    // Splice the init scaffold in before the passes so the injected labels
    // get addresses along with everything else. The body itself cannot be
    // generated until the symbol table is complete.
    if init_needed {
        let mut spliced = init::prologue();
        spliced.append(&mut ops);
        spliced.push(init::epilogue());
        ops = spliced;
    }

    let mut asm = Assembly {
        ops,
        symbols: SymbolTable::new(),
        pc: 0,
        ram: VAR_BASE as i64,
    };

    pass1_labels(&mut asm);
    pass2_declarations(&mut asm);
    pass3_implicit(&mut asm);

    // First gate: no synthesis or encoding on top of a broken symbol table.
    if asm.has_errors() {
        return asm;
    }

    if init_needed {
        let body = init::synthesize(&asm.ops, &asm.symbols);
        asm.pc += body.len() as u32;
        asm.ops.extend(body);
        if asm.pc >= MAX_ROM {
            if let Some(op) = asm.ops.last_mut() {
                op.fail("Program too large!");
            }
        }
    }

    if asm.has_errors() {
        return asm;
    }

    codegen(&mut asm);
    asm
}

/// Pass 1: bind labels to program-counter addresses.
fn pass1_labels(asm: &mut Assembly) {
    for op in asm.ops.iter_mut() {
        if let Kind::Label { name } = &op.kind {
            match asm.symbols.insert(name, asm.pc as i32, Category::Label) {
                Ok(()) => {}
                Err(e) => op.fail(e.to_string()),
            }
        }
        if op.consumes_pc() {
            asm.pc += 1;
        }
    }
    if asm.pc >= MAX_ROM {
        if let Some(op) = asm.ops.last_mut() {
            op.fail("Program too large!");
        }
    }
}

/// Pass 2: bind declared constants and variables. Forward references to
/// pass-1 labels work; references to later declarations do not.
fn pass2_declarations(asm: &mut Assembly) {
    for op in asm.ops.iter_mut() {
        let (name, expr, alias, is_const, init_len) = match &op.kind {
            Kind::Constant { name, expr } => (name.clone(), expr.clone(), false, true, 0),
            Kind::Variable {
                name,
                size,
                init,
                alias,
            } => (name.clone(), size.clone(), *alias, false, init.len()),
            _ => continue,
        };

        if let Err(e) = asm.symbols.check_name(&name) {
            op.fail(e.to_string());
            continue;
        }

        // A bad expression still binds a sentinel so later references fail
        // with their own distinct errors instead of a cascade of this one.
        let value = match evaluate(&expr, &asm.symbols, false) {
            Ok(v) => v,
            Err(e) => {
                op.fail(e.to_string());
                1
            }
        };

        // Sizes naming user symbols cannot be checked at parse time; the
        // count invariant is re-applied here with the full table.
        if op.error.is_none()
            && !is_const
            && !alias
            && init_len > 0
            && (value < 0 || value as usize != init_len)
        {
            op.fail(format!(
                "Variable size ({value}) does not match number of values provided ({init_len})"
            ));
        }

        if is_const {
            let _ = asm.symbols.insert(&name, value, Category::Constant);
        } else if alias {
            let _ = asm.symbols.insert(&name, value, Category::Variable);
        } else {
            let _ = asm
                .symbols
                .insert(&name, asm.ram as i32, Category::Variable);
            asm.ram += value as i64;
            if asm.ram > MAX_RAM as i64 {
                op.fail("Out of RAM (data) memory.");
            }
        }
    }
}

/// Pass 3: auto-allocate one RAM slot per still-unresolved address symbol.
fn pass3_implicit(asm: &mut Assembly) {
    for op in asm.ops.iter_mut() {
        let Kind::Address(AddrTarget::Symbol(name)) = &op.kind else {
            continue;
        };
        if asm.symbols.contains(name) {
            continue;
        }
        match asm.symbols.insert(name, asm.ram as i32, Category::Implicit) {
            Ok(()) => {
                asm.ram += 1;
                if asm.ram > MAX_RAM as i64 {
                    op.fail("Out of memory.");
                }
            }
            Err(e) => op.fail(e.to_string()),
        }
    }
}

/// Encode every fully-resolved operation into its 16-bit word.
fn codegen(asm: &mut Assembly) {
    for op in asm.ops.iter_mut() {
        match &op.kind {
            Kind::Address(target) => {
                let value = match target {
                    AddrTarget::Constant(text) => match constant(text) {
                        Ok(v) => v,
                        Err(e) => {
                            op.fail(e.to_string());
                            0
                        }
                    },
                    AddrTarget::Symbol(name) => match asm.symbols.get(name) {
                        Some(v) => v,
                        None => {
                            op.fail(format!("Undefined symbol [{name}] in expression"));
                            0
                        }
                    },
                    AddrTarget::Expression(text) => {
                        match evaluate(text, &asm.symbols, false) {
                            Ok(v) => v,
                            Err(e) => {
                                op.fail(e.to_string());
                                0
                            }
                        }
                    }
                };
                if !arch::encode::address_in_range(value) {
                    op.warn("@expression out of -16384..32767 range; lower 15 bits used");
                }
                op.code = Some(arch::encode::address(value));
            }
            Kind::Compute { dest, comp, jump } => {
                match arch::encode::compute(comp, dest, jump) {
                    Ok(word) => op.code = Some(word),
                    Err(e) => op.fail(e.to_string()),
                }
            }
            Kind::Extended { dest, comp, jump } => {
                match arch::encode::extended(comp, dest, jump) {
                    Ok(word) => op.code = Some(word),
                    Err(e) => op.fail(e.to_string()),
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::BitmapImport;

    struct NoBitmap;

    impl BitmapImport for NoBitmap {
        fn import(&self, _path: &str) -> Result<(String, Vec<String>), String> {
            Err("no bitmap in tests".to_string())
        }
    }

    fn run(src: &str) -> Assembly {
        assemble(src, &NoBitmap)
    }

    fn first_error(asm: &Assembly) -> String {
        asm.errors()
            .next()
            .and_then(|op| op.error.clone())
            .expect("expected an error")
    }

    #[test]
    fn plain_program_round_trips() {
        let asm = run("@5\nD=A\n@result\nM=D\n");
        assert!(!asm.has_errors());
        assert_eq!(asm.pc, 4);
        assert_eq!(asm.words().len(), 4);
        assert_eq!(asm.symbols.get("result"), Some(16));
        assert_eq!(asm.warnings().count(), 0);
        assert_eq!(asm.words()[0], 0b0000000000000101);
    }

    #[test]
    fn labels_bind_to_pc() {
        let asm = run("@start\n(start)\nD=A\n(end)\n0;JMP\n");
        assert_eq!(asm.symbols.get("start"), Some(1));
        assert_eq!(asm.symbols.get("end"), Some(2));
        // `start` resolved as a label, not allocated as a variable.
        assert_eq!(asm.ram, 16);
    }

    #[test]
    fn ram_allocation_is_deterministic() {
        let asm = run("$a(3)\n$b\n$c(2)\n@d\n");
        assert_eq!(asm.symbols.get("a"), Some(16));
        assert_eq!(asm.symbols.get("b"), Some(19));
        assert_eq!(asm.symbols.get("c"), Some(20));
        // Implicit allocation follows the declared ones.
        assert_eq!(asm.symbols.get("d"), Some(22));
    }

    #[test]
    fn alias_consumes_no_ram() {
        let asm = run("$base(2)\n$shadow@base+1\n$next\n");
        assert_eq!(asm.symbols.get("shadow"), Some(17));
        assert_eq!(asm.symbols.get("next"), Some(18));
    }

    #[test]
    fn constants_consume_no_ram() {
        let asm = run("#width=32\n$x\n@width\n");
        assert_eq!(asm.symbols.get("width"), Some(32));
        assert_eq!(asm.symbols.get("x"), Some(16));
        assert_eq!(asm.ram, 17);
        assert_eq!(asm.words()[0], 32);
    }

    #[test]
    fn duplicate_declaration_fails_without_output() {
        let asm = run("$n=7\n$n=8\n");
        assert!(asm.has_errors());
        assert_eq!(first_error(&asm), "Symbol previously defined");
        assert!(asm.words().is_empty());
        assert_eq!(asm.symbols.get("n"), Some(16));
    }

    #[test]
    fn case_variant_duplicate_fails() {
        let asm = run("$count\n$Count\n");
        assert_eq!(
            first_error(&asm),
            "Symbol previously defined (case-insensitive)"
        );
    }

    #[test]
    fn size_mismatch_with_user_symbol_size() {
        // The parser cannot evaluate `n`, so the count check lands in the
        // declaration pass once the constant is bound.
        let asm = run("#n=3\n$v(n)=1,2\n");
        assert_eq!(
            first_error(&asm),
            "Variable size (3) does not match number of values provided (2)"
        );
        assert!(asm.words().is_empty());
        // A matching count passes and allocates the declared size.
        let ok = run("#n=3\n$v(n)=1,2,3\n$next\n");
        assert!(!ok.has_errors());
        assert_eq!(ok.symbols.get("next"), Some(19));
    }

    #[test]
    fn rom_capacity_boundary() {
        let ok = run(&"0;JMP\n".repeat(32767));
        assert!(!ok.has_errors());
        assert_eq!(ok.pc, 32767);

        let over = run(&"0;JMP\n".repeat(32768));
        assert_eq!(first_error(&over), "Program too large!");
        assert!(over.words().is_empty());

        // Init synthesis can also push the program over the top: 2 prologue
        // words + 32760 user words + 6 generated words hits 32768 exactly.
        let over = run(&format!("{}$x=5\n", "0;JMP\n".repeat(32760)));
        assert_eq!(first_error(&over), "Program too large!");
    }

    #[test]
    fn ram_capacity_boundary() {
        // 16384 - 16 words exactly fills data memory.
        let ok = run("$big(16368)\n");
        assert!(!ok.has_errors());
        let over = run("$big(16368)\n$one\n");
        assert_eq!(first_error(&over), "Out of RAM (data) memory.");
    }

    #[test]
    fn init_scaffold_preserves_user_addresses() {
        let asm = run("$x=5\n(loop)\n@loop\n0;JMP\n");
        assert!(!asm.has_errors());
        // Two prologue words come first, so the user label sits at 2.
        assert_eq!(asm.symbols.get("loop"), Some(2));
        assert!(asm.symbols.get("__INIT").is_some());
        assert!(asm.symbols.get("__INIT.Ret").is_some());
        // Prologue jump + 2 user words + init body (4) + return jump (2).
        assert_eq!(asm.pc, 2 + 2 + 4 + 2);
        assert_eq!(asm.words().len() as u32, asm.pc);
    }

    #[test]
    fn no_initializers_means_no_scaffold() {
        let asm = run("$x\n@x\nM=0\n");
        assert!(asm.symbols.get("__INIT").is_none());
        assert_eq!(asm.pc, 2);
    }

    #[test]
    fn init_entries_sort_and_share_loads() {
        // Values 5,0,1,5,6 over two variables: sorted emission shares the
        // 5 and increments to 6.
        let asm = run("$a(3)=5,0,1\n$b(2)=5,6\n");
        assert!(!asm.has_errors());
        // 2 prologue + 0:2 + 1:2 + 5:4 + 5:2 + 6:3 + ret:2 = 17
        assert_eq!(asm.pc, 17);
    }

    #[test]
    fn dunder_address_symbol_warns() {
        let asm = run("@__secret\nM=1\n");
        assert!(!asm.has_errors());
        assert_eq!(asm.warnings().count(), 1);
    }

    #[test]
    fn dangling_continuation_on_last_line() {
        let asm = run("@1\nD=A \\");
        assert!(asm.has_errors());
        assert!(first_error(&asm).contains("line-continuation"));
    }

    #[test]
    fn expression_addresses_resolve_against_labels() {
        let asm = run("(top)\n@top+2\nD=A\n");
        assert!(!asm.has_errors());
        assert_eq!(asm.words()[0], 2);
    }

    #[test]
    fn out_of_range_address_warns_but_encodes() {
        let asm = run("@SCREEN*3\n");
        assert!(!asm.has_errors());
        assert_eq!(asm.warnings().count(), 1);
        assert_eq!(asm.words()[0], (16384 * 3) & 0x7FFF);
    }

    #[test]
    fn divide_by_zero_is_an_operation_error() {
        // An address operand that cannot even syntax-check fails at parse
        // time; a declaration expression fails during the binding pass.
        let asm = run("@1/0\n");
        assert_eq!(
            first_error(&asm),
            "@ value is not a symbol, constant or expression"
        );
        let asm = run("#bad=1/0\n");
        assert_eq!(first_error(&asm), "Divide by 0 error in expression");
    }

    #[test]
    fn unknown_mnemonics_have_distinct_errors() {
        assert_eq!(first_error(&run("D=Q\n")), "Unknown alu operation Q");
        assert_eq!(first_error(&run("Q=D\n")), "Unknown destination Q");
        assert_eq!(first_error(&run("D=A;JXX\n")), "Unknown jump JXX");
    }

    #[test]
    fn extended_compute_encodes() {
        let asm = run("D:=D+D\nMD:=!(0&M);JEQ\n");
        assert!(!asm.has_errors());
        assert_eq!(asm.words().len(), 2);
        assert_eq!(asm.words()[0] >> 13, 0b111);
    }

    #[test]
    fn one_bad_line_does_not_hide_others() {
        let asm = run("(dup)\n(dup)\n#dup=1\n");
        let msgs: Vec<String> = asm.errors().map(|op| op.error.clone().unwrap()).collect();
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn errors_gate_encoding() {
        let asm = run("$n=7\n$n=8\n@n\n");
        assert!(asm.ops.iter().all(|op| op.code.is_none()));
    }
}
