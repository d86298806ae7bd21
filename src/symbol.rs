use std::collections::HashMap;

use crate::value::SymbolId;

/// Interned symbol table. Each unique symbol name maps to a unique SymbolId,
/// so special-form dispatch is an integer compare instead of a string compare.
pub struct SymbolTable {
    name_to_id: HashMap<String, SymbolId>,
    id_to_name: Vec<String>,
}

/// Well-known symbol IDs, pre-interned at startup.
/// These must match the order of interning in SymbolTable::new().
pub mod sym {
    use crate::value::SymbolId;

    pub const PRINT: SymbolId = SymbolId(0);
    pub const SETQ: SymbolId = SymbolId(1);
    pub const LET: SymbolId = SymbolId(2);
    pub const LAMBDA: SymbolId = SymbolId(3);
    pub const DEFMACRO: SymbolId = SymbolId(4);
    pub const COND: SymbolId = SymbolId(5);
    pub const FOR: SymbolId = SymbolId(6);
    pub const CONS: SymbolId = SymbolId(7);
    pub const LIST: SymbolId = SymbolId(8);
    pub const ATOM: SymbolId = SymbolId(9);
    pub const TYPE: SymbolId = SymbolId(10);
    pub const TAIL: SymbolId = SymbolId(11);
    pub const PLUS: SymbolId = SymbolId(12);
    pub const MINUS: SymbolId = SymbolId(13);
    pub const TIMES: SymbolId = SymbolId(14);
    pub const MOD: SymbolId = SymbolId(15);
    pub const EQ: SymbolId = SymbolId(16);
    pub const GREATER: SymbolId = SymbolId(17);
    pub const NUM_OBJECTS: SymbolId = SymbolId(18);
    pub const GC: SymbolId = SymbolId(19);
    pub const REQUIRE: SymbolId = SymbolId(20);
}

impl SymbolTable {
    /// Create a new symbol table with all well-known symbols pre-interned.
    /// The order MUST match the constants in the `sym` module above.
    pub fn new() -> Self {
        let names = [
            "print", "setq", "let", "lambda", "defmacro", "cond", "for",
            "cons", "list", "atom", "type", "tail",
            "+", "-", "*", "mod", "=", ">",
            "number-of-objects", "gc", "require",
        ];

        let mut name_to_id = HashMap::new();
        let mut id_to_name = Vec::new();

        for (i, name) in names.iter().enumerate() {
            let id = SymbolId(i as u32);
            name_to_id.insert(name.to_string(), id);
            id_to_name.push(name.to_string());
        }

        SymbolTable {
            name_to_id,
            id_to_name,
        }
    }

    /// Intern a symbol name. Returns the existing ID if already interned,
    /// or creates a new one.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = SymbolId(self.id_to_name.len() as u32);
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.push(name.to_string());
        id
    }

    /// Look up a symbol name by its ID.
    pub fn name(&self, id: SymbolId) -> &str {
        &self.id_to_name[id.0 as usize]
    }

    /// Look up a symbol ID by name, without interning.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.name_to_id.get(name).copied()
    }

    /// Total number of interned symbols.
    pub fn count(&self) -> usize {
        self.id_to_name.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ids_match_interning_order() {
        let table = SymbolTable::new();
        assert_eq!(table.lookup("print"), Some(sym::PRINT));
        assert_eq!(table.lookup("defmacro"), Some(sym::DEFMACRO));
        assert_eq!(table.lookup("number-of-objects"), Some(sym::NUM_OBJECTS));
        assert_eq!(table.lookup(">"), Some(sym::GREATER));
        assert_eq!(table.name(sym::MOD), "mod");
    }

    #[test]
    fn intern_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern("counter");
        let b = table.intern("counter");
        assert_eq!(a, b);
        assert_eq!(table.name(a), "counter");
    }
}
