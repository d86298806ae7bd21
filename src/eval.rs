use log::trace;

use crate::env::{EnvArena, EnvId};
use crate::error::{LispError, LispResult};
use crate::gc;
use crate::heap::Heap;
use crate::module::{DynamicLoader, ModuleLoader};
use crate::printer;
use crate::reader;
use crate::symbol::{sym, SymbolTable};
use crate::value::{Closure, MacroDef, Obj, ObjId, SymbolId};

/// Default registry capacity: plenty for scripts, finite so a runaway
/// allocation loop fails with HeapOverflow instead of eating the host.
pub const DEFAULT_HEAP_CAPACITY: usize = 10_000_000;

/// Where `require` looks for native modules.
pub const PLUGIN_DIR: &str = "plugin";

/// The interpreter. All runtime state lives here — the object registry,
/// the environment arena, the symbol table, and the single active
/// environment pointer — so independent instances can coexist and the
/// collector can find its roots.
pub struct Interp {
    pub heap: Heap,
    pub envs: EnvArena,
    pub symbols: SymbolTable,
    root_env: EnvId,
    /// The active environment: the one name resolution uses right now.
    /// Mutated only by scope entry/exit in this module.
    env: EnvId,
    loader: Box<dyn ModuleLoader>,
}

impl Interp {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HEAP_CAPACITY)
    }

    pub fn with_capacity(heap_capacity: usize) -> Self {
        let heap = Heap::new(heap_capacity);
        let mut envs = EnvArena::new();
        let symbols = SymbolTable::new();
        let root_env = envs.alloc(None);
        Interp {
            heap,
            envs,
            symbols,
            root_env,
            env: root_env,
            loader: Box::new(DynamicLoader::new(PLUGIN_DIR)),
        }
    }

    /// Replace the module-loading capability (tests use closures here).
    pub fn set_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = loader;
    }

    pub fn root_env(&self) -> EnvId {
        self.root_env
    }

    pub fn active_env(&self) -> EnvId {
        self.env
    }

    /// Bind a name in the root environment. This is the surface native
    /// modules use from their `slisp_init` entry point.
    pub fn define_global(&mut self, name: &str, val: ObjId) {
        let id = self.symbols.intern(name);
        self.envs.define(self.root_env, id, val);
    }

    /// Render a value to its canonical textual form.
    pub fn render(&self, id: ObjId) -> String {
        printer::print_val(id, &self.heap, &self.symbols)
    }

    /// Read and evaluate every expression in `src`, returning the last
    /// result (Nil for empty input). Reads one expression at a time:
    /// parsed-but-unevaluated forms are reachable from no environment,
    /// so batching the reads would let a mid-program `(gc)` sweep the
    /// rest of the program out from under the evaluator.
    pub fn eval_str(&mut self, src: &str) -> LispResult<ObjId> {
        let mut result = self.heap.nil()?;
        let mut pos = 0;
        while let Some((expr, next)) =
            reader::read_one_at(src, pos, &mut self.heap, &mut self.symbols)?
        {
            result = self.eval(expr)?;
            pos = next;
        }
        Ok(result)
    }

    /// Evaluate a sequence of top-level expressions in order.
    pub fn eval_seq(&mut self, exprs: &[ObjId]) -> LispResult<ObjId> {
        let mut result = self.heap.nil()?;
        for &expr in exprs {
            result = self.eval(expr)?;
        }
        Ok(result)
    }

    // ========================================================================
    // Core evaluation
    // ========================================================================

    /// Evaluate one expression against the active environment.
    pub fn eval(&mut self, expr: ObjId) -> LispResult<ObjId> {
        match self.heap.get(expr) {
            // Self-evaluating atoms.
            Obj::Nil
            | Obj::True
            | Obj::Int(_)
            | Obj::Str(_)
            | Obj::Closure(_)
            | Obj::Macro(_) => Ok(expr),
            Obj::Sym(id) => {
                let id = *id;
                self.envs.lookup(self.env, id).ok_or_else(|| {
                    LispError::UnboundName(self.symbols.name(id).to_string())
                })
            }
            Obj::Pair(head, tail) => {
                let (head, tail) = (*head, *tail);
                self.eval_form(head, tail)
            }
        }
    }

    /// Evaluate a call form: special-form dispatch, then application.
    fn eval_form(&mut self, head: ObjId, tail: ObjId) -> LispResult<ObjId> {
        if let Obj::Sym(s) = self.heap.get(head) {
            let s = *s;
            if let Some(result) = self.eval_special(s, tail) {
                return result;
            }
        }

        // Not a special form: evaluate the head and apply.
        let op = self.eval(head)?;
        match self.heap.get(op) {
            Obj::Closure(c) => {
                let c = c.clone();
                self.apply_closure(&c, tail)
            }
            Obj::Macro(m) => {
                let m = m.clone();
                let expansion = self.expand_macro(&m, tail)?;
                self.eval(expansion)
            }
            _ => Err(LispError::UndefinedOperator(self.render(head))),
        }
    }

    /// Dispatch a special form by its pre-interned symbol id.
    /// Returns None when the symbol names no special form.
    fn eval_special(&mut self, s: SymbolId, tail: ObjId) -> Option<LispResult<ObjId>> {
        let result = match s {
            sym::PRINT => self.form_print(tail),
            sym::SETQ => self.form_setq(tail),
            sym::LET => self.form_let(tail),
            sym::LAMBDA => self.form_lambda(tail),
            sym::DEFMACRO => self.form_defmacro(tail),
            sym::COND => self.form_cond(tail),
            sym::FOR => self.form_for(tail),
            sym::CONS => self.form_cons(tail),
            sym::LIST => self.form_list(tail),
            sym::ATOM => self.form_atom(tail),
            sym::TYPE => self.form_type(tail),
            sym::TAIL => self.form_tail(tail),
            sym::PLUS => self.form_add(tail),
            sym::MINUS => self.form_sub(tail),
            sym::TIMES => self.form_mul(tail),
            sym::MOD => self.form_mod(tail),
            sym::EQ => self.form_eq(tail),
            sym::GREATER => self.form_gt(tail),
            sym::NUM_OBJECTS => self.form_num_objects(tail),
            sym::GC => self.form_gc(tail),
            sym::REQUIRE => self.form_require(tail),
            _ => return None,
        };
        trace!("special form {}", self.symbols.name(s));
        Some(result)
    }

    // ========================================================================
    // Special forms
    // ========================================================================

    /// (print x) — write the canonical rendering plus newline; result Nil.
    fn form_print(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("print", tail, 1)?;
        let val = self.eval(args[0])?;
        println!("{}", self.render(val));
        self.heap.nil()
    }

    /// (setq name expr) — assignment: mutates the nearest existing binding
    /// in the chain, or creates one in the active frame.
    fn form_setq(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("setq", tail, 2)?;
        let name = self.expect_sym(args[0])?;
        let val = self.eval(args[1])?;
        self.envs.assign(self.env, name, val);
        Ok(val)
    }

    /// (let ((name init) ...) body...) — initializers are bound
    /// UNevaluated; this is the documented design, not an oversight.
    /// A bound init form evaluates later only if the body evaluates it.
    fn form_let(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_at_least("let", tail, 1)?;
        let bindings = self.heap.list_to_vec(args[0]).ok_or_else(|| {
            LispError::MalformedForm("let", "bindings are not a proper list".into())
        })?;

        let frame = self.envs.alloc(Some(self.env));
        for binding in bindings {
            let pair = self.heap.list_to_vec(binding).ok_or_else(|| {
                LispError::MalformedForm("let", "binding is not a proper list".into())
            })?;
            if pair.len() < 2 {
                return Err(LispError::MalformedForm(
                    "let",
                    "binding needs a name and an initializer".into(),
                ));
            }
            let name = self.expect_sym(pair[0])?;
            self.envs.define(frame, name, pair[1]);
        }

        self.in_scope(frame, |interp| interp.eval_body(&args[1..]))
    }

    /// (lambda params body...) — capture the active environment.
    fn form_lambda(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let (params, body) = self.heap.pair_parts(tail).ok_or_else(|| {
            LispError::MalformedForm("lambda", "expected a parameter list and a body".into())
        })?;
        if !self.heap.is_proper_list(params) {
            return Err(LispError::MalformedForm(
                "lambda",
                "parameter list is not a proper list".into(),
            ));
        }
        self.heap.alloc(Obj::Closure(Closure {
            params,
            body,
            env: self.env,
        }))
    }

    /// (defmacro name params body) — no environment is captured;
    /// expansion is purely structural.
    fn form_defmacro(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("defmacro", tail, 3)?;
        let name = self.expect_sym(args[0])?;
        let params = args[1];
        if !self.heap.is_proper_list(params) {
            return Err(LispError::MalformedForm(
                "defmacro",
                "parameter list is not a proper list".into(),
            ));
        }
        let body = args[2];
        if !self.heap.get(body).is_pair() {
            return Err(LispError::TypeMismatch(self.render(body), "a pair"));
        }
        let mac = self.heap.alloc(Obj::Macro(MacroDef { params, body }))?;
        self.envs.assign(self.env, name, mac);
        Ok(mac)
    }

    /// (cond (test consequent) ...) — first non-Nil test wins; later
    /// clauses are never evaluated; no true test yields Nil.
    fn form_cond(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let clauses = self.args_vec("cond", tail)?;
        for clause in clauses {
            let parts = self.heap.list_to_vec(clause).ok_or_else(|| {
                LispError::MalformedForm("cond", "clause is not a proper list".into())
            })?;
            if parts.len() < 2 {
                return Err(LispError::MalformedForm(
                    "cond",
                    "clause needs a test and a consequent".into(),
                ));
            }
            let test = self.eval(parts[0])?;
            if !self.heap.get(test).is_nil() {
                return self.eval(parts[1]);
            }
        }
        self.heap.nil()
    }

    /// (for counter start end body...) — bounds evaluated once; the
    /// counter is a mutable Integer in a fresh scope; result Nil.
    fn form_for(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_at_least("for", tail, 3)?;
        let name = self.expect_sym(args[0])?;
        let start = self.eval_int(args[1])?;
        let end = self.eval_int(args[2])?;

        let counter = self.heap.int(start)?;
        let frame = self.envs.alloc(Some(self.env));
        self.envs.define(frame, name, counter);

        let body = &args[3..];
        self.in_scope(frame, |interp| {
            let mut i = start;
            while i < end {
                for &expr in body {
                    interp.eval(expr)?;
                }
                i += 1;
                interp.heap.set_int(counter, i);
            }
            interp.heap.nil()
        })
    }

    /// (cons a b) — both evaluated; a fresh Pair.
    fn form_cons(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("cons", tail, 2)?;
        let first = self.eval(args[0])?;
        let rest = self.eval(args[1])?;
        self.heap.pair(first, rest)
    }

    /// (list ...) — returns the argument tail as-is, UNevaluated. This
    /// mirrors the reference behavior exactly; covered by a test so any
    /// change is intentional.
    fn form_list(&mut self, tail: ObjId) -> LispResult<ObjId> {
        Ok(tail)
    }

    /// (atom x) — True for every shape but Pair.
    fn form_atom(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("atom", tail, 1)?;
        let val = self.eval(args[0])?;
        if self.heap.get(val).is_atom() {
            self.heap.truth()
        } else {
            self.heap.nil()
        }
    }

    /// (type x) — a symbol naming the value's variant.
    fn form_type(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("type", tail, 1)?;
        let val = self.eval(args[0])?;
        let name = self.heap.get(val).type_name();
        let id = self.symbols.intern(name);
        self.heap.sym(id)
    }

    /// (tail list n) — the list after skipping n elements.
    fn form_tail(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("tail", tail, 2)?;
        let list = self.eval(args[0])?;
        if !self.heap.get(list).is_pair() {
            return Err(LispError::TypeMismatch(self.render(list), "a pair"));
        }
        let n = self.eval_int(args[1])?;
        let mut current = list;
        for _ in 0..n {
            match self.heap.get(current) {
                Obj::Pair(_, rest) => current = *rest,
                _ => return Err(LispError::TypeMismatch(self.render(current), "a pair")),
            }
        }
        Ok(current)
    }

    fn form_add(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_vec("+", tail)?;
        let mut sum: i64 = 0;
        for arg in args {
            sum = sum.wrapping_add(self.eval_int(arg)?);
        }
        self.heap.int(sum)
    }

    fn form_sub(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_at_least("-", tail, 1)?;
        let mut acc = self.eval_int(args[0])?;
        for &arg in &args[1..] {
            acc = acc.wrapping_sub(self.eval_int(arg)?);
        }
        self.heap.int(acc)
    }

    fn form_mul(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_vec("*", tail)?;
        let mut product: i64 = 1;
        for arg in args {
            product = product.wrapping_mul(self.eval_int(arg)?);
        }
        self.heap.int(product)
    }

    fn form_mod(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("mod", tail, 2)?;
        let x = self.eval_int(args[0])?;
        let y = self.eval_int(args[1])?;
        if y == 0 {
            return Err(LispError::MalformedForm("mod", "division by zero".into()));
        }
        self.heap.int(x.wrapping_rem(y))
    }

    fn form_eq(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("=", tail, 2)?;
        let x = self.eval_int(args[0])?;
        let y = self.eval_int(args[1])?;
        if x == y {
            self.heap.truth()
        } else {
            self.heap.nil()
        }
    }

    fn form_gt(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact(">", tail, 2)?;
        let x = self.eval_int(args[0])?;
        let y = self.eval_int(args[1])?;
        if x > y {
            self.heap.truth()
        } else {
            self.heap.nil()
        }
    }

    /// (number-of-objects) — the live-object registry count, sampled
    /// before the result Integer itself is allocated.
    fn form_num_objects(&mut self, tail: ObjId) -> LispResult<ObjId> {
        self.args_exact("number-of-objects", tail, 0)?;
        let live = self.heap.live_count();
        self.heap.int(live as i64)
    }

    /// (gc) — mark from the active environment chain, then sweep.
    fn form_gc(&mut self, tail: ObjId) -> LispResult<ObjId> {
        self.args_exact("gc", tail, 0)?;
        gc::collect(&mut self.heap, &mut self.envs, self.env);
        self.heap.nil()
    }

    /// (require name) — load a native module and run its entry point,
    /// which may register bindings in the root environment.
    fn form_require(&mut self, tail: ObjId) -> LispResult<ObjId> {
        let args = self.args_exact("require", tail, 1)?;
        let val = self.eval(args[0])?;
        let name = match self.heap.get(val) {
            Obj::Str(s) => s.clone(),
            _ => return Err(LispError::TypeMismatch(self.render(val), "a string")),
        };
        let init = self.loader.load(&name)?;
        init(self)?;
        self.heap.nil()
    }

    // ========================================================================
    // Application and macro expansion
    // ========================================================================

    /// Apply a closure: arguments evaluated left-to-right in the CALLER's
    /// environment, bound positionally in a fresh child of the closure's
    /// CAPTURED environment (lexical scoping).
    fn apply_closure(&mut self, closure: &Closure, arg_tail: ObjId) -> LispResult<ObjId> {
        let params = self.param_names(closure.params)?;
        let args = self.args_vec("call", arg_tail)?;
        if args.len() != params.len() {
            return Err(LispError::MalformedForm(
                "call",
                format!("expected {} arguments, got {}", params.len(), args.len()),
            ));
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }

        let frame = self.envs.alloc(Some(closure.env));
        for (name, val) in params.into_iter().zip(values) {
            self.envs.define(frame, name, val);
        }

        let body = self.heap.list_to_vec(closure.body).ok_or_else(|| {
            LispError::MalformedForm("lambda", "body is not a proper list".into())
        })?;
        self.in_scope(frame, |interp| interp.eval_body(&body))
    }

    /// Expand a macro call: walk the body structurally, substituting
    /// call-site arguments (unevaluated) for the formal parameters. Fresh
    /// Pair nodes are allocated; atoms are shared. No scope is created —
    /// the formals are template placeholders, not variables.
    fn expand_macro(&mut self, mac: &MacroDef, arg_tail: ObjId) -> LispResult<ObjId> {
        let params = self.param_names(mac.params)?;
        let args = self.args_vec("macro call", arg_tail)?;
        self.substitute(mac.body, &params, &args)
    }

    fn substitute(
        &mut self,
        node: ObjId,
        params: &[SymbolId],
        args: &[ObjId],
    ) -> LispResult<ObjId> {
        match self.heap.get(node) {
            Obj::Sym(s) => match params.iter().position(|p| p == s) {
                Some(i) => args.get(i).copied().ok_or_else(|| {
                    LispError::MalformedForm("macro call", "too few arguments".into())
                }),
                None => Ok(node),
            },
            Obj::Pair(first, rest) => {
                let (first, rest) = (*first, *rest);
                let new_first = self.substitute(first, params, args)?;
                let new_rest = self.substitute(rest, params, args)?;
                self.heap.pair(new_first, new_rest)
            }
            _ => Ok(node),
        }
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    /// Run `f` with `frame` as the active environment, restoring the
    /// previous one afterwards — including on error, so a failure deep in
    /// a body cannot leave the interpreter in a half-entered scope.
    fn in_scope<T>(
        &mut self,
        frame: EnvId,
        f: impl FnOnce(&mut Self) -> LispResult<T>,
    ) -> LispResult<T> {
        let saved = self.env;
        self.env = frame;
        let result = f(self);
        self.env = saved;
        result
    }

    /// Evaluate body forms in order; the last value is the result.
    fn eval_body(&mut self, body: &[ObjId]) -> LispResult<ObjId> {
        let mut result = None;
        for &expr in body {
            result = Some(self.eval(expr)?);
        }
        match result {
            Some(val) => Ok(val),
            None => self.heap.nil(),
        }
    }

    /// Collect a form's argument chain, failing on an improper list.
    fn args_vec(&self, form: &'static str, tail: ObjId) -> LispResult<Vec<ObjId>> {
        self.heap.list_to_vec(tail).ok_or_else(|| {
            LispError::MalformedForm(form, "arguments are not a proper list".into())
        })
    }

    fn args_exact(&self, form: &'static str, tail: ObjId, n: usize) -> LispResult<Vec<ObjId>> {
        let args = self.args_vec(form, tail)?;
        if args.len() != n {
            return Err(LispError::MalformedForm(
                form,
                format!("expected {} arguments, got {}", n, args.len()),
            ));
        }
        Ok(args)
    }

    fn args_at_least(&self, form: &'static str, tail: ObjId, n: usize) -> LispResult<Vec<ObjId>> {
        let args = self.args_vec(form, tail)?;
        if args.len() < n {
            return Err(LispError::MalformedForm(
                form,
                format!("expected at least {} arguments, got {}", n, args.len()),
            ));
        }
        Ok(args)
    }

    /// The unevaluated expression must be a symbol; returns its id.
    fn expect_sym(&self, id: ObjId) -> LispResult<SymbolId> {
        self.heap
            .get(id)
            .as_sym()
            .ok_or_else(|| LispError::TypeMismatch(self.render(id), "a symbol"))
    }

    /// Evaluate an expression and require an Integer result.
    fn eval_int(&mut self, expr: ObjId) -> LispResult<i64> {
        let val = self.eval(expr)?;
        self.heap
            .get(val)
            .as_int()
            .ok_or_else(|| LispError::TypeMismatch(self.render(val), "an integer"))
    }

    /// A parameter list as symbol ids.
    fn param_names(&self, params: ObjId) -> LispResult<Vec<SymbolId>> {
        let items = self.heap.list_to_vec(params).ok_or_else(|| {
            LispError::MalformedForm("lambda", "parameter list is not a proper list".into())
        })?;
        items.into_iter().map(|id| self.expect_sym(id)).collect()
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn interp() -> Interp {
        Interp::with_capacity(1 << 20)
    }

    fn eval_to(src: &str) -> String {
        let mut it = interp();
        let val = it.eval_str(src).unwrap();
        it.render(val)
    }

    fn eval_err(src: &str) -> LispError {
        interp().eval_str(src).unwrap_err()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval_to("(+ 1 2 3)"), "6");
        assert_eq!(eval_to("(+)"), "0");
        assert_eq!(eval_to("(- 10 2 3)"), "5");
        assert_eq!(eval_to("(- 4)"), "4");
        assert_eq!(eval_to("(* 2 3 4)"), "24");
        assert_eq!(eval_to("(*)"), "1");
        assert_eq!(eval_to("(mod 7 3)"), "1");
        assert_eq!(eval_to("(mod -7 3)"), "-1");
        assert_eq!(eval_to("(= 2 2)"), "T");
        assert_eq!(eval_to("(= 2 3)"), "nil");
        assert_eq!(eval_to("(> 3 2)"), "T");
        assert_eq!(eval_to("(> 2 3)"), "nil");
    }

    #[test]
    fn arithmetic_type_errors() {
        assert!(matches!(
            eval_err("(+ 1 \"two\")"),
            LispError::TypeMismatch(v, "an integer") if v == "\"two\""
        ));
        assert!(matches!(
            eval_err("(mod 1 0)"),
            LispError::MalformedForm("mod", _)
        ));
        assert!(matches!(
            eval_err("(= 1 2 3)"),
            LispError::MalformedForm("=", _)
        ));
    }

    #[test]
    fn lambda_application() {
        assert_eq!(eval_to("((lambda (x) (+ x 1)) 5)"), "6");
        assert_eq!(eval_to("((lambda (a b) (* a b)) 3 4)"), "12");
        // Body forms run in order; the last value is the result.
        assert_eq!(eval_to("(setq x 0) ((lambda () (setq x 1) (+ x 10)))"), "11");
    }

    #[test]
    fn call_arity_is_checked() {
        assert!(matches!(
            eval_err("((lambda (x y) (+ x y)) 1)"),
            LispError::MalformedForm("call", _)
        ));
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        // The inner lambda still resolves n from the maker's call scope
        // after that scope has exited.
        let src = "
            (setq make-adder (lambda (n) (lambda (x) (+ x n))))
            (setq add-two (make-adder 2))
            (add-two 3)";
        assert_eq!(eval_to(src), "5");
    }

    #[test]
    fn capture_is_by_reference_not_snapshot() {
        // setq through the closure's chain mutates the captured frame.
        let src = "
            (setq counter (lambda (n) (lambda () (setq n (+ n 1)))))
            (setq tick (counter 0))
            (tick)
            (tick)";
        assert_eq!(eval_to(src), "2");
    }

    #[test]
    fn call_scope_parents_the_captured_env_not_the_callers() {
        // Lexical scoping: f sees the a from its definition site even
        // though the caller binds its own a.
        let src = "
            (setq a 1)
            (setq f (lambda () a))
            ((lambda (a) (f)) 99)";
        assert_eq!(eval_to(src), "1");
    }

    #[test]
    fn setq_mutates_nearest_binding() {
        assert_eq!(eval_to("(let ((x 1)) (setq x 2) x)"), "2");
        // A let-local binding shields the outer one.
        assert_eq!(eval_to("(setq x 1) (let ((x 2)) (setq x 3)) x"), "1");
        // Without a local binding, assignment walks outward.
        assert_eq!(eval_to("(setq x 1) (let ((y 2)) (setq x 3)) x"), "3");
    }

    #[test]
    fn let_binds_initializers_unevaluated() {
        // The initializer is bound as a form, not its value.
        assert_eq!(eval_to("(let ((x (+ 1 2))) x)"), "(+ 1 2)");
        // Literal initializers are self-evaluating, so they behave as
        // one would expect.
        assert_eq!(eval_to("(let ((x 5)) (+ x 1))"), "6");
    }

    #[test]
    fn let_scope_is_popped() {
        assert!(matches!(
            eval_err("(let ((x 1)) x) x"),
            LispError::UnboundName(name) if name == "x"
        ));
    }

    #[test]
    fn cond_takes_first_true_clause_only() {
        assert_eq!(eval_to("(cond (nil 1) (t 2) (t 3))"), "2");
        assert_eq!(eval_to("(cond (nil 1))"), "nil");
        // Consequents of later clauses must not run.
        let src = "
            (setq z 0)
            (cond (nil (setq z 1)) (t 2) (t (setq z 5)))
            z";
        assert_eq!(eval_to(src), "0");
    }

    #[test]
    fn for_loops_over_the_half_open_range() {
        let src = "
            (setq sum 0)
            (for i 0 5 (setq sum (+ sum i)))
            sum";
        assert_eq!(eval_to(src), "10");
        assert_eq!(eval_to("(for i 0 0 (setq missing 1)) 9"), "9");
    }

    #[test]
    fn for_counter_scope_is_popped() {
        assert!(matches!(
            eval_err("(for i 0 3 i) i"),
            LispError::UnboundName(name) if name == "i"
        ));
    }

    #[test]
    fn cons_and_atom() {
        assert_eq!(eval_to("(cons 1 2)"), "(1 . 2)");
        assert_eq!(eval_to("(cons 1 (cons 2 nil))"), "(1 2)");
        assert_eq!(eval_to("(atom 1)"), "T");
        assert_eq!(eval_to("(atom nil)"), "T");
        assert_eq!(eval_to("(atom (cons 1 2))"), "nil");
    }

    #[test]
    fn list_returns_its_unevaluated_tail() {
        // Reference behavior preserved exactly: no element evaluation.
        assert_eq!(eval_to("(list 1 2 3)"), "(1 2 3)");
        assert_eq!(eval_to("(list 1 (+ 1 2))"), "(1 (+ 1 2))");
    }

    #[test]
    fn type_names_variants() {
        assert_eq!(eval_to("(type 5)"), "integer");
        assert_eq!(eval_to("(type \"s\")"), "string");
        assert_eq!(eval_to("(type nil)"), "nil");
        assert_eq!(eval_to("(type t)"), "t");
        assert_eq!(eval_to("(type (cons 1 2))"), "pair");
        assert_eq!(eval_to("(type (lambda (x) x))"), "lambda");
    }

    #[test]
    fn tail_skips_elements() {
        assert_eq!(eval_to("(tail (list 1 2 3) 1)"), "(2 3)");
        assert_eq!(eval_to("(tail (list 1 2 3) 3)"), "nil");
        assert!(matches!(
            eval_err("(tail 5 1)"),
            LispError::TypeMismatch(_, "a pair")
        ));
    }

    #[test]
    fn print_result_is_nil() {
        assert_eq!(eval_to("(print 5)"), "nil");
    }

    #[test]
    fn unbound_name_is_reported() {
        assert!(matches!(
            eval_err("(print z)"),
            LispError::UnboundName(name) if name == "z"
        ));
    }

    #[test]
    fn non_function_head_is_undefined_operator() {
        assert!(matches!(
            eval_err("((+ 1 1) 3)"),
            LispError::UndefinedOperator(_)
        ));
        assert!(matches!(
            eval_err("(5)"),
            LispError::UndefinedOperator(head) if head == "5"
        ));
    }

    #[test]
    fn macro_expansion_substitutes_structurally() {
        assert_eq!(eval_to("(defmacro add-one (x) (+ x 1)) (add-one 4)"), "5");
        // The argument form is substituted, not its value: (+ 1 2) is
        // evaluated twice inside the expansion.
        assert_eq!(eval_to("(defmacro both (x) (+ x x)) (both (+ 1 2))"), "6");
        // Substitution reaches nested pairs.
        assert_eq!(
            eval_to("(defmacro nest (x) (+ 1 (* x 2))) (nest (+ 1 1))"),
            "5"
        );
    }

    #[test]
    fn macro_sees_unevaluated_arguments() {
        // The macro receives the symbol itself: expanding (incq n) into
        // (setq n (+ n 1)) works on the caller's binding.
        let src = "
            (defmacro incq (x) (setq x (+ x 1)))
            (setq n 5)
            (incq n)
            n";
        assert_eq!(eval_to(src), "6");
    }

    #[test]
    fn defmacro_result_and_shape_checks() {
        assert!(matches!(
            eval_err("(defmacro m (x) 5)"),
            LispError::TypeMismatch(_, "a pair")
        ));
        assert!(matches!(
            eval_err("(defmacro m (x))"),
            LispError::MalformedForm("defmacro", _)
        ));
    }

    #[test]
    fn gc_frees_unreachable_objects() {
        let mut it = interp();
        it.eval_str("(setq p (cons 1 2))").unwrap();
        it.eval_str("(gc)").unwrap();
        let with_pair = it.heap.live_count();
        it.eval_str("(setq p nil)").unwrap();
        it.eval_str("(gc)").unwrap();
        assert!(it.heap.live_count() < with_pair);
    }

    #[test]
    fn collection_cannot_sweep_later_top_level_forms() {
        // The trailing `keep` expression is read only after (gc) has
        // run; a batch-reading entry point would have parsed it up
        // front, left it rootless, and swept it mid-program.
        let mut it = interp();
        let val = it.eval_str("(setq keep (cons 1 2)) (gc) keep").unwrap();
        assert_eq!(it.render(val), "(1 . 2)");
    }

    #[test]
    fn gc_keeps_everything_reachable() {
        let mut it = interp();
        it.eval_str("(setq p (cons 1 (cons 2 nil)))").unwrap();
        it.eval_str("(gc)").unwrap();
        let live = it.heap.live_count();
        it.eval_str("(gc)").unwrap();
        // The second cycle had nothing new to free beyond the Nil the
        // first (gc) itself returned.
        assert!(it.heap.live_count() <= live);
        assert_eq!(it.eval_str("p").map(|v| it.render(v)).unwrap(), "(1 2)");
    }

    #[test]
    fn gc_keeps_data_reachable_through_closures() {
        let mut it = interp();
        it.eval_str("(setq f ((lambda (n) (lambda () n)) 42))")
            .unwrap();
        it.eval_str("(gc)").unwrap();
        assert_eq!(it.eval_str("(f)").map(|v| it.render(v)).unwrap(), "42");
    }

    #[test]
    fn number_of_objects_reports_registry_growth() {
        let mut it = interp();
        let before = it.eval_str("(number-of-objects)").unwrap();
        let before = it.heap.get(before).as_int().unwrap();
        it.eval_str("(setq big (cons 1 (cons 2 (cons 3 nil))))")
            .unwrap();
        let after = it.eval_str("(number-of-objects)").unwrap();
        let after = it.heap.get(after).as_int().unwrap();
        assert!(after > before);
    }

    struct StubLoader;

    impl crate::module::ModuleLoader for StubLoader {
        fn load(&mut self, name: &str) -> LispResult<crate::module::ModuleInit> {
            assert_eq!(name, "geometry");
            Ok(Box::new(|interp: &mut Interp| {
                let pi = interp.heap.int(3)?;
                interp.define_global("rough-pi", pi);
                Ok(())
            }))
        }
    }

    #[test]
    fn require_runs_the_module_init_against_the_root_env() {
        let mut it = interp();
        it.set_loader(Box::new(StubLoader));
        assert_eq!(eval_src(&mut it, "(require \"geometry\") rough-pi"), "3");
    }

    #[test]
    fn require_failure_is_module_load() {
        assert!(matches!(
            eval_err("(require \"no-such-module\")"),
            LispError::ModuleLoad(_)
        ));
        assert!(matches!(
            eval_err("(require 5)"),
            LispError::TypeMismatch(_, "a string")
        ));
    }

    fn eval_src(it: &mut Interp, src: &str) -> String {
        let val = it.eval_str(src).unwrap();
        it.render(val)
    }
}
