pub mod encode;
pub mod tables;

/// Words of instruction memory.
pub const MAX_ROM: u32 = 32768;

/// Words of data memory.
pub const MAX_RAM: u32 = 16384;

/// First data address available for variables; 0-15 are the machine registers.
pub const VAR_BASE: u32 = 16;
