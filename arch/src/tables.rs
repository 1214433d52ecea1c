use indexmap::IndexMap;
use once_cell::sync::Lazy;

// ----------------------------------------------------------------------------
// Predefined symbols

pub static PREDEFINED: &[(&str, i32)] = &[
    ("R0", 0),
    ("R1", 1),
    ("R2", 2),
    ("R3", 3),
    ("R4", 4),
    ("R5", 5),
    ("R6", 6),
    ("R7", 7),
    ("R8", 8),
    ("R9", 9),
    ("R10", 10),
    ("R11", 11),
    ("R12", 12),
    ("R13", 13),
    ("R14", 14),
    ("R15", 15),
    ("SP", 0),
    ("LCL", 1),
    ("ARG", 2),
    ("THIS", 3),
    ("THAT", 4),
    ("SCREEN", 16384),
    ("KBD", 24576),
    ("KBD_SPACE", 32),
    ("KBD_NEWLINE", 128),
    ("KBD_BACKSPACE", 129),
    ("KBD_LEFTARROW", 130),
    ("KBD_UPARROW", 131),
    ("KBD_RIGHTARROW", 132),
    ("KBD_DOWNARROW", 133),
    ("KBD_HOME", 134),
    ("KBD_END", 135),
    ("KBD_PAGEUP", 136),
    ("KBD_PAGEDOWN", 137),
    ("KBD_INSERT", 138),
    ("KBD_DELETE", 139),
    ("KBD_ESC", 140),
    ("KBD_F1", 141),
    ("KBD_F2", 142),
    ("KBD_F3", 143),
    ("KBD_F4", 144),
    ("KBD_F5", 145),
    ("KBD_F6", 146),
    ("KBD_F7", 147),
    ("KBD_F8", 148),
    ("KBD_F9", 149),
    ("KBD_F10", 150),
    ("KBD_F11", 151),
    ("KBD_F12", 152),
];

// ----------------------------------------------------------------------------
// Compute instruction fields

/// Template for every compute-family word; the top three bits are always set.
pub const CINSTR: u16 = 0b1110000000000000;

/// Jump field (3 lsbits).
pub static JMPS: Lazy<IndexMap<&'static str, u16>> = Lazy::new(|| {
    IndexMap::from([
        ("NULL", 0b000),
        ("JGT", 0b001),
        ("JEQ", 0b010),
        ("JGE", 0b011),
        ("JLT", 0b100),
        ("JNE", 0b101),
        ("JLE", 0b110),
        ("JMP", 0b111),
    ])
});

/// Destination field (bits 3-5). Every register ordering is accepted.
pub static DESTS: Lazy<IndexMap<&'static str, u16>> = Lazy::new(|| {
    IndexMap::from([
        ("", 0b000000),
        ("NULL", 0b000000),
        ("M", 0b001000),
        ("D", 0b010000),
        ("MD", 0b011000),
        ("A", 0b100000),
        ("AM", 0b101000),
        ("AD", 0b110000),
        ("AMD", 0b111000),
        ("DM", 0b011000),
        ("MA", 0b101000),
        ("DA", 0b110000),
        ("ADM", 0b111000),
        ("MAD", 0b111000),
        ("MDA", 0b111000),
        ("DAM", 0b111000),
        ("DMA", 0b111000),
    ])
});

/// Named ALU computations (bits 6-12). Includes the `~` NOT synonyms, the
/// NAND (`^`) and NOR (`_`) extras, and a few constant synonyms. The machine's
/// own decoder only implements the documented subset; we encode all of them
/// anyway.
pub static COMPS: Lazy<IndexMap<&'static str, u16>> = Lazy::new(|| {
    IndexMap::from([
        ("0", 0b0101010000000),
        ("1", 0b0111111000000),
        ("-1", 0b0111010000000),
        ("D", 0b0001100000000),
        ("A", 0b0110000000000),
        ("!D", 0b0001101000000),
        ("!A", 0b0110001000000),
        ("-D", 0b0001111000000),
        ("-A", 0b0110011000000),
        ("D+1", 0b0011111000000),
        ("A+1", 0b0110111000000),
        ("D-1", 0b0001110000000),
        ("A-1", 0b0110010000000),
        ("D+A", 0b0000010000000),
        ("D-A", 0b0010011000000),
        ("A-D", 0b0000111000000),
        ("D&A", 0b0000000000000),
        ("D|A", 0b0010101000000),
        ("A+D", 0b0000010000000),
        ("A&D", 0b0000000000000),
        ("A|D", 0b0010101000000),
        ("M", 0b1110000000000),
        ("!M", 0b1110001000000),
        ("-M", 0b1110011000000),
        ("M+1", 0b1110111000000),
        ("M-1", 0b1110010000000),
        ("D+M", 0b1000010000000),
        ("D-M", 0b1010011000000),
        ("M-D", 0b1000111000000),
        ("D&M", 0b1000000000000),
        ("D|M", 0b1010101000000),
        ("M+D", 0b1000010000000),
        ("M&D", 0b1000000000000),
        ("M|D", 0b1010101000000),
        ("~D", 0b0001101000000),
        ("~A", 0b0110001000000),
        ("~M", 0b1110001000000),
        ("-2", 0b0111110000000),
        ("D^A", 0b0000001000000),
        ("A^D", 0b0000001000000),
        ("D_A", 0b0010100000000),
        ("A_D", 0b0010100000000),
        ("D^M", 0b1000001000000),
        ("M^D", 0b1000001000000),
        ("D_M", 0b1010100000000),
        ("M_D", 0b1010100000000),
        ("0XFFFF", 0b0111010000000),
        ("0X0000", 0b0101010000000),
        ("0X0001", 0b0111111000000),
    ])
});

// ----------------------------------------------------------------------------
// Precise ALU control fields
//
// The extended form matches operand text greedily by prefix, which is only
// sound while no entry in a table is a prefix of another entry in the same
// table. A test below asserts this so a table edit cannot silently break
// the matcher.

/// Output complement bit for the `!(..)` / `~(..)` wrapper.
pub const NOTALU: u16 = 0b0000001000000;

/// X operand field (zx/nx bits).
pub static XOPS: Lazy<IndexMap<&'static str, u16>> = Lazy::new(|| {
    IndexMap::from([
        ("0", 0b0100000000000),
        ("-1", 0b0110000000000),
        ("D", 0b0000000000000),
        ("!D", 0b0010000000000),
        ("~D", 0b0010000000000),
    ])
});

/// Y operand field (a/zy/ny bits).
pub static YOPS: Lazy<IndexMap<&'static str, u16>> = Lazy::new(|| {
    IndexMap::from([
        ("0", 0b0001000000000),
        ("-1", 0b0001100000000),
        ("D", 0b0000000000000),
        ("!D", 0b0000100000000),
        ("~D", 0b0000100000000),
        ("M", 0b1000000000000),
        ("!M", 0b1000100000000),
        ("~M", 0b1000100000000),
    ])
});

/// Combining function bit.
pub static FUNCS: Lazy<IndexMap<&'static str, u16>> = Lazy::new(|| {
    IndexMap::from([("&", 0b0000000000000), ("+", 0b0000010000000)])
});
