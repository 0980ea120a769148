//! Translation environment
//!
//! The state threaded through one module translation: the symbolic stack,
//! the instruction buffer of the open block, fresh-identifier and fresh-label
//! counters, temporary type info, pending labels, the symbol table, the
//! builtins seen so far and the worklist of nested code objects still to be
//! translated.
//!
//! Procedure-scoped pieces (stack, buffer, counters, locals, labels) are
//! reset by [`Environment::enter_proc`]; everything else is module-scoped.
//! The public entry point constructs a fresh environment per module, so the
//! mutation here never escapes a single `to_module` call.

use crate::builtins::Builtin;
use crate::labels::LabelMap;
use crate::stack::DataStack;
use crate::symbols::{Info, QualifiedName, SourceLoc, SymbolTable};
use indexmap::{IndexMap, IndexSet};
use pytir_bytecode::CodeObject;
use pytir_textual::{Ident, Instr};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// A function or method body, translated into a procedure.
    Function,
    /// A class body, scanned for method definitions.
    ClassBody,
}

/// A nested code object discovered during lowering, queued for the module
/// assembler.
#[derive(Debug, Clone)]
pub struct PendingProc {
    pub qname: QualifiedName,
    pub code: Arc<CodeObject>,
    pub enclosing_class: Option<String>,
    pub kind: PendingKind,
}

#[derive(Debug)]
pub struct Environment {
    module_name: String,
    last_loc: SourceLoc,
    pub stack: DataStack,
    pub instr_buf: Vec<Instr>,
    fresh_id: u32,
    fresh_label: u32,
    temp_info: HashMap<Ident, Info>,
    pub labels: LabelMap,
    pub symbols: SymbolTable,
    pub builtins_seen: IndexSet<Builtin>,
    pub hosts_seen: IndexSet<&'static str>,
    pending: IndexMap<String, PendingProc>,
    is_toplevel: bool,
    enclosing_class: Option<String>,
}

impl Environment {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            last_loc: SourceLoc::default(),
            stack: DataStack::new(),
            instr_buf: Vec::new(),
            fresh_id: 0,
            fresh_label: 0,
            temp_info: HashMap::new(),
            labels: LabelMap::new(),
            symbols: SymbolTable::new(),
            builtins_seen: IndexSet::new(),
            hosts_seen: IndexSet::new(),
            pending: IndexMap::new(),
            is_toplevel: true,
            enclosing_class: None,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Begin translating a new procedure: procedure-scoped state is reset,
    /// module-scoped state survives.
    pub fn enter_proc(&mut self, is_toplevel: bool, enclosing_class: Option<&str>) {
        self.stack.reset();
        self.instr_buf.clear();
        self.fresh_id = 0;
        self.fresh_label = 0;
        self.temp_info.clear();
        self.labels.clear();
        self.symbols.reset_locals();
        self.last_loc = SourceLoc::default();
        self.is_toplevel = is_toplevel;
        self.enclosing_class = enclosing_class.map(str::to_string);
    }

    /// Begin a new block: only the instruction buffer is reset.
    pub fn enter_node(&mut self) {
        self.instr_buf.clear();
    }

    pub fn mk_fresh_ident(&mut self, info: Info) -> Ident {
        let id = Ident(self.fresh_id);
        self.fresh_id += 1;
        self.temp_info.insert(id, info);
        id
    }

    pub fn mk_fresh_label(&mut self) -> String {
        let label = format!("b{}", self.fresh_label);
        self.fresh_label += 1;
        label
    }

    pub fn ident_info(&self, id: Ident) -> Option<&Info> {
        self.temp_info.get(&id)
    }

    pub fn push_instr(&mut self, instr: Instr) {
        self.instr_buf.push(instr);
    }

    pub fn update_last_line(&mut self, starts_line: Option<u32>) {
        if let Some(line) = starts_line {
            self.last_loc = SourceLoc::line(line);
        }
    }

    pub fn loc(&self) -> SourceLoc {
        self.last_loc
    }

    pub fn is_toplevel(&self) -> bool {
        self.is_toplevel
    }

    pub fn enclosing_class(&self) -> Option<&str> {
        self.enclosing_class.as_deref()
    }

    pub fn reset_stack(&mut self) {
        self.stack.reset();
    }

    pub fn record_builtin(&mut self, builtin: Builtin) {
        self.builtins_seen.insert(builtin);
    }

    pub fn record_host(&mut self, name: &'static str) {
        self.hosts_seen.insert(name);
    }

    /// The qualified name of a module-level symbol: `module::name`.
    pub fn global_qualified(&self, name: &str) -> String {
        format!("{}::{}", self.module_name, name)
    }

    /// Queue a nested code object. Keyed by qualified name so re-defining a
    /// name translates only the last definition (shadowing).
    pub fn queue_proc(&mut self, pending: PendingProc) {
        self.pending.insert(pending.qname.value.clone(), pending);
    }

    /// Worklist order is discovery order.
    pub fn take_next_pending(&mut self) -> Option<PendingProc> {
        self.pending.shift_remove_index(0).map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pytir_textual::Typ;

    #[test]
    fn test_fresh_idents_carry_info() {
        let mut env = Environment::new("dummy");
        let a = env.mk_fresh_ident(Info::of_typ(Typ::PyInt));
        let b = env.mk_fresh_ident(Info::of_typ(Typ::PyObject));

        assert_eq!(a, Ident(0));
        assert_eq!(b, Ident(1));
        assert_eq!(env.ident_info(a).unwrap().typ, Typ::PyInt);
        assert_eq!(env.ident_info(b).unwrap().typ, Typ::PyObject);
    }

    #[test]
    fn test_fresh_labels() {
        let mut env = Environment::new("dummy");
        assert_eq!(env.mk_fresh_label(), "b0");
        assert_eq!(env.mk_fresh_label(), "b1");
    }

    #[test]
    fn test_enter_proc_resets_counters() {
        let mut env = Environment::new("dummy");
        env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
        env.mk_fresh_label();
        env.stack.push(crate::stack::DataCell::Const(0));

        env.enter_proc(false, None);
        assert!(env.stack.is_empty());
        assert_eq!(env.mk_fresh_ident(Info::of_typ(Typ::PyObject)), Ident(0));
        assert_eq!(env.mk_fresh_label(), "b0");
        assert!(!env.is_toplevel());
    }

    #[test]
    fn test_enter_proc_keeps_module_state() {
        let mut env = Environment::new("dummy");
        env.record_builtin(Builtin::BinaryAdd);
        env.enter_proc(false, Some("C"));

        assert!(env.builtins_seen.contains(&Builtin::BinaryAdd));
        assert_eq!(env.enclosing_class(), Some("C"));
    }

    #[test]
    fn test_update_last_line() {
        let mut env = Environment::new("dummy");
        env.update_last_line(Some(7));
        env.update_last_line(None);
        assert_eq!(env.loc().line, Some(7));
    }

    #[test]
    fn test_pending_worklist_order_and_shadowing() {
        let mut env = Environment::new("dummy");
        let code = Arc::new(CodeObject {
            filename: "dummy.py".to_string(),
            name: "f".to_string(),
            consts: vec![],
            names: vec![],
            varnames: vec![],
            argcount: 0,
            flags: 0,
            instructions: vec![],
        });
        for name in ["dummy::f", "dummy::g", "dummy::f"] {
            env.queue_proc(PendingProc {
                qname: QualifiedName::new(name, SourceLoc::default()),
                code: code.clone(),
                enclosing_class: None,
                kind: PendingKind::Function,
            });
        }

        assert_eq!(env.take_next_pending().unwrap().qname.value, "dummy::f");
        assert_eq!(env.take_next_pending().unwrap().qname.value, "dummy::g");
        assert!(env.take_next_pending().is_none());
    }
}
