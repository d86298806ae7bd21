use crate::heap::Heap;
use crate::symbol::SymbolTable;
use crate::value::{Obj, ObjId};

/// Render a value to its canonical textual form. This format is part of
/// the external contract: `print` writes exactly this, newline-terminated.
pub fn print_val(id: ObjId, heap: &Heap, symbols: &SymbolTable) -> String {
    let mut out = String::new();
    print_inner(id, heap, symbols, &mut out, 0);
    out
}

fn print_inner(id: ObjId, heap: &Heap, symbols: &SymbolTable, out: &mut String, depth: usize) {
    if depth > 1000 {
        out.push_str("...");
        return;
    }

    match heap.get(id) {
        Obj::Nil => out.push_str("nil"),
        Obj::True => out.push('T'),
        Obj::Int(n) => out.push_str(&n.to_string()),
        // String contents go out verbatim; the grammar has no escapes.
        Obj::Str(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Obj::Sym(sid) => out.push_str(symbols.name(*sid)),
        Obj::Pair(first, rest) => {
            out.push('(');
            print_inner(*first, heap, symbols, out, depth + 1);
            let mut current = *rest;
            loop {
                match heap.get(current) {
                    Obj::Nil => break,
                    Obj::Pair(f, r) => {
                        out.push(' ');
                        let (f, r) = (*f, *r);
                        print_inner(f, heap, symbols, out, depth + 1);
                        current = r;
                    }
                    _ => {
                        // Improper list: a dotted tail renders before the
                        // closing bracket and must stay distinct.
                        out.push_str(" . ");
                        print_inner(current, heap, symbols, out, depth + 1);
                        break;
                    }
                }
            }
            out.push(')');
        }
        Obj::Closure(c) => {
            out.push_str("(lambda ");
            print_inner(c.params, heap, symbols, out, depth + 1);
            out.push(' ');
            print_inner(c.body, heap, symbols, out, depth + 1);
            out.push(')');
        }
        Obj::Macro(m) => {
            out.push_str("(lambda ");
            print_inner(m.params, heap, symbols, out, depth + 1);
            out.push(' ');
            print_inner(m.body, heap, symbols, out, depth + 1);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Obj;
    use pretty_assertions::assert_eq;

    fn setup() -> (Heap, SymbolTable) {
        (Heap::new(4096), SymbolTable::new())
    }

    #[test]
    fn atoms_render_canonically() {
        let (mut heap, symbols) = setup();
        let nil = heap.nil().unwrap();
        let t = heap.truth().unwrap();
        let n = heap.int(-42).unwrap();
        let s = heap.alloc(Obj::Str("hi there".into())).unwrap();
        assert_eq!(print_val(nil, &heap, &symbols), "nil");
        assert_eq!(print_val(t, &heap, &symbols), "T");
        assert_eq!(print_val(n, &heap, &symbols), "-42");
        assert_eq!(print_val(s, &heap, &symbols), "\"hi there\"");
    }

    #[test]
    fn proper_list_renders_space_separated() {
        let (mut heap, symbols) = setup();
        let one = heap.int(1).unwrap();
        let two = heap.int(2).unwrap();
        let three = heap.int(3).unwrap();
        let list = heap.list(&[one, two, three]).unwrap();
        assert_eq!(print_val(list, &heap, &symbols), "(1 2 3)");
    }

    #[test]
    fn dotted_pair_renders_with_dot() {
        let (mut heap, symbols) = setup();
        let one = heap.int(1).unwrap();
        let two = heap.int(2).unwrap();
        let dotted = heap.pair(one, two).unwrap();
        assert_eq!(print_val(dotted, &heap, &symbols), "(1 . 2)");
    }

    #[test]
    fn improper_tail_deep_in_list() {
        let (mut heap, symbols) = setup();
        let one = heap.int(1).unwrap();
        let two = heap.int(2).unwrap();
        let three = heap.int(3).unwrap();
        let tail = heap.pair(two, three).unwrap();
        let list = heap.pair(one, tail).unwrap();
        assert_eq!(print_val(list, &heap, &symbols), "(1 2 . 3)");
    }

    #[test]
    fn nested_list_renders_with_own_brackets() {
        let (mut heap, mut symbols) = setup();
        let x = symbols.intern("x");
        let xs = heap.sym(x).unwrap();
        let one = heap.int(1).unwrap();
        let inner = heap.list(&[xs, one]).unwrap();
        let two = heap.int(2).unwrap();
        let outer = heap.list(&[inner, two]).unwrap();
        assert_eq!(print_val(outer, &heap, &symbols), "((x 1) 2)");
    }
}
