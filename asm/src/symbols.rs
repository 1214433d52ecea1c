//! The per-compilation symbol table and its naming invariants.

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;

use crate::expr::{is_constant, is_symbol};

/// Why a symbol exists; purely for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Predefined,
    Label,
    Constant,
    Variable,
    Implicit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Empty symbol")]
    Empty,

    #[error("Cannot define a constant as a symbol")]
    ConstantName,

    #[error("Badly formed symbol")]
    Malformed,

    #[error("Symbol previously defined")]
    Duplicate,

    #[error("Symbol previously defined (case-insensitive)")]
    CaseDuplicate,
}

/// Symbol name to value, plus the upper-cased shadow set used to catch
/// case-variant collisions (usually typos). Scoped to one compilation.
#[derive(Debug)]
pub struct SymbolTable {
    map: IndexMap<String, (i32, Category)>,
    upper: HashSet<String>,
}

impl SymbolTable {
    /// Table pre-loaded with the machine's predefined symbols.
    pub fn new() -> Self {
        let mut table = Self::empty();
        for (name, value) in arch::tables::PREDEFINED {
            table.map.insert(name.to_string(), (*value, Category::Predefined));
            table.upper.insert(name.to_uppercase());
        }
        table
    }

    pub fn empty() -> Self {
        SymbolTable {
            map: IndexMap::new(),
            upper: HashSet::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.map.get(name).map(|(v, _)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// The invariant every pass applies before insertion: non-empty, not a
    /// numeric constant, well-formed, and no exact or case-insensitive
    /// collision with an existing symbol.
    pub fn check_name(&self, name: &str) -> Result<(), SymbolError> {
        if name.is_empty() {
            Err(SymbolError::Empty)
        } else if is_constant(name) {
            Err(SymbolError::ConstantName)
        } else if !is_symbol(name) {
            Err(SymbolError::Malformed)
        } else if self.map.contains_key(name) {
            Err(SymbolError::Duplicate)
        } else if self.upper.contains(&name.to_uppercase()) {
            Err(SymbolError::CaseDuplicate)
        } else {
            Ok(())
        }
    }

    pub fn insert(&mut self, name: &str, value: i32, cat: Category) -> Result<(), SymbolError> {
        self.check_name(name)?;
        self.map.insert(name.to_string(), (value, cat));
        self.upper.insert(name.to_uppercase());
        Ok(())
    }

    /// Symbols of one category, in insertion order.
    pub fn in_category(&self, cat: Category) -> Vec<(&str, i32)> {
        self.map
            .iter()
            .filter(|(_, (_, c))| *c == cat)
            .map(|(k, (v, _))| (k.as_str(), *v))
            .collect()
    }
}
