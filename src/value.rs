use std::fmt;

use crate::env::EnvId;

/// Unique identifier for an interned symbol name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Index into the object heap. This is the GC handle: every runtime value
/// is an ObjId, and the object it names lives in the registry until a
/// sweep proves it unreachable.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub u32);

/// A lambda's formal parameters, body, and the environment it closed over.
/// The captured environment is fixed at creation time; each call builds a
/// fresh child frame under it.
#[derive(Clone, PartialEq, Eq)]
pub struct Closure {
    pub params: ObjId,
    pub body: ObjId,
    pub env: EnvId,
}

/// A macro template: parameters and body, no captured environment.
/// Expansion is purely structural substitution.
#[derive(Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub params: ObjId,
    pub body: ObjId,
}

/// The fundamental slisp object. A closed set: the evaluator matches
/// exhaustively, so an unhandled shape is a compile error, not a runtime
/// surprise.
#[derive(Clone, PartialEq, Eq)]
pub enum Obj {
    Nil,
    True,
    Int(i64),
    Str(String),
    Sym(SymbolId),
    Pair(ObjId, ObjId),
    Closure(Closure),
    Macro(MacroDef),
}

impl Obj {
    pub fn is_nil(&self) -> bool {
        matches!(self, Obj::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Obj::Pair(..))
    }

    /// Returns true if this object is an atom (anything but a pair).
    pub fn is_atom(&self) -> bool {
        !self.is_pair()
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Obj::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<SymbolId> {
        match self {
            Obj::Sym(id) => Some(*id),
            _ => None,
        }
    }

    /// The variant name reported by the `type` form.
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::Nil => "nil",
            Obj::True => "t",
            Obj::Int(_) => "integer",
            Obj::Str(_) => "string",
            Obj::Sym(_) => "symbol",
            Obj::Pair(..) => "pair",
            Obj::Closure(_) => "lambda",
            Obj::Macro(_) => "macro",
        }
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obj::Nil => write!(f, "Nil"),
            Obj::True => write!(f, "True"),
            Obj::Int(n) => write!(f, "Int({})", n),
            Obj::Str(s) => write!(f, "Str({:?})", s),
            Obj::Sym(id) => write!(f, "Sym({})", id.0),
            Obj::Pair(a, d) => write!(f, "Pair({}, {})", a.0, d.0),
            Obj::Closure(c) => write!(f, "Closure(env {})", c.env.0),
            Obj::Macro(_) => write!(f, "Macro"),
        }
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

impl fmt::Debug for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjId({})", self.0)
    }
}
