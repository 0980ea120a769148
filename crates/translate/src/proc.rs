//! Per-procedure translation driver
//!
//! Walks one code object's instruction stream, consulting the label map at
//! every boundary, opening and closing blocks, and delegating each opcode to
//! the lowering rules. Also home to cell materialization: the point where a
//! lazy stack cell is resolved into an IR expression, emitting loads as
//! needed.

use crate::builtins::Builtin;
use crate::env::{Environment, PendingKind, PendingProc};
use crate::error::{TranslateError, TranslateResult};
use crate::labels::{LabelInfo, Prelude};
use crate::stack::DataCell;
use crate::symbols::{Info, QualifiedName, Signature, SourceLoc, SymbolInfo};
use pytir_bytecode::{CodeObject, ConstValue, Opcode};
use pytir_textual::{Block, Const, Exp, Instr, NodeCall, ProcDecl, Terminator, Typ};
use smallvec::{smallvec, SmallVec};
use std::mem;

/// The record type name used for iteration items.
pub(crate) const ITER_ITEM: &str = "PyIterItem";

/// The block currently being filled.
#[derive(Debug)]
pub(crate) struct OpenBlock {
    pub(crate) label: String,
    pub(crate) params: Vec<(pytir_textual::Ident, Typ)>,
}

pub(crate) struct ProcTranslator<'a> {
    pub(crate) env: &'a mut Environment,
    pub(crate) code: &'a CodeObject,
    pub(crate) blocks: Vec<Block>,
    pub(crate) open: Option<OpenBlock>,
    /// Offset of the instruction being lowered, for error reporting.
    pub(crate) offset: u32,
    pub(crate) opcode: Opcode,
    /// Offset of the following instruction; relative jumps resolve against it.
    pub(crate) next_off: u32,
}

/// Translate one code object into a procedure declaration. Nested code
/// objects discovered on the way are queued on the environment's worklist.
pub(crate) fn translate_proc(
    env: &mut Environment,
    code: &CodeObject,
    qname: QualifiedName,
    enclosing_class: Option<&str>,
    is_toplevel: bool,
) -> TranslateResult<ProcDecl> {
    env.enter_proc(is_toplevel, enclosing_class);

    let short = qname.short().to_string();
    let enclosing = enclosing_class
        .map(str::to_string)
        .unwrap_or_else(|| env.module_name().to_string());
    let sig = env
        .symbols
        .lookup_signature(&enclosing, &short)
        .cloned()
        .unwrap_or_else(Signature::untyped);

    let mut params: Vec<(String, Typ)> = Vec::new();
    let param_names: Vec<String> = code.param_names().to_vec();
    for (i, pname) in param_names.iter().enumerate() {
        let typ = if i == 0 && enclosing_class.is_some() {
            Typ::Struct(enclosing.clone())
        } else {
            sig.param_typ(pname).cloned().unwrap_or(Typ::PyObject)
        };
        env.symbols.register_symbol(
            false,
            pname,
            SymbolInfo {
                qualified_name: QualifiedName::new(pname.clone(), SourceLoc::default()),
                is_builtin: false,
                info: Info::of_typ(typ.clone()),
            },
        );
        params.push((pname.clone(), typ));
    }
    let result = sig.ret.clone();

    let mut tr = ProcTranslator::new(env, code);
    tr.open_fresh();
    for (i, instr) in code.instructions.iter().enumerate() {
        let op = Opcode::from_name(&instr.opname).ok_or_else(|| TranslateError::UnknownOpcode {
            opname: instr.opname.clone(),
            offset: instr.offset,
        })?;
        tr.offset = instr.offset;
        tr.opcode = op;
        tr.next_off = code
            .instructions
            .get(i + 1)
            .map(|next| next.offset)
            .unwrap_or(instr.offset + 2);
        tr.env.update_last_line(instr.starts_line);
        tr.at_boundary()?;
        if tr.open.is_none() {
            // Unreachable code after a terminator still becomes a block
            // (the compiler's dead `return None` epilogue, typically).
            tr.open_fresh();
        }
        tr.lower(op, instr)?;
    }
    if tr.open.is_some() {
        tr.close_with(Terminator::Ret(Exp::null()));
    }
    let blocks = tr.blocks;
    Ok(ProcDecl {
        name: qname.value,
        params,
        result,
        blocks,
    })
}

/// Turn a compiler-reported code-object name into a qualified IR name:
/// `C.m` -> `module::C::m`, `f.<locals>.g` -> `module::f::g`.
pub(crate) fn qualify_code_name(module: &str, raw: &str) -> String {
    let mut parts: Vec<&str> = vec![module];
    parts.extend(raw.split('.').filter(|s| *s != "<locals>"));
    parts.join("::")
}

impl<'a> ProcTranslator<'a> {
    pub(crate) fn new(env: &'a mut Environment, code: &'a CodeObject) -> Self {
        Self {
            env,
            code,
            blocks: Vec::new(),
            open: None,
            offset: 0,
            opcode: Opcode::Nop,
            next_off: 0,
        }
    }

    pub(crate) fn underflow(&self) -> TranslateError {
        TranslateError::StackUnderflow {
            offset: self.offset,
            opcode: self.opcode.name().to_string(),
        }
    }

    pub(crate) fn unsupported(&self, message: impl Into<String>) -> TranslateError {
        TranslateError::Unsupported {
            message: message.into(),
            offset: self.offset,
        }
    }

    pub(crate) fn pop1(&mut self) -> TranslateResult<DataCell> {
        self.env.stack.pop().ok_or_else(|| self.underflow())
    }

    pub(crate) fn name_str(&self, idx: u32) -> TranslateResult<String> {
        self.code
            .name_at(idx)
            .map(str::to_string)
            .ok_or_else(|| self.unsupported(format!("name index {} out of range", idx)))
    }

    pub(crate) fn varname_str(&self, idx: u32) -> TranslateResult<String> {
        self.code
            .varname_at(idx)
            .map(str::to_string)
            .ok_or_else(|| self.unsupported(format!("varname index {} out of range", idx)))
    }

    pub(crate) fn const_at(&self, idx: u32) -> TranslateResult<ConstValue> {
        self.code
            .const_at(idx)
            .cloned()
            .ok_or_else(|| self.unsupported(format!("constant index {} out of range", idx)))
    }

    // ----- block machinery -----

    /// Open a new block with a fresh label and no parameters.
    pub(crate) fn open_fresh(&mut self) {
        let label = self.env.mk_fresh_label();
        self.env.reset_stack();
        self.env.enter_node();
        self.open = Some(OpenBlock {
            label,
            params: Vec::new(),
        });
    }

    /// Materialize a registered label: instantiate its SSA parameters, push
    /// them back as `Temp` cells (deepest last so the stack is restored
    /// bottom-up) and apply the prelude.
    pub(crate) fn open_from_label(&mut self, info: &LabelInfo) -> TranslateResult<()> {
        let mut params = Vec::with_capacity(info.ssa_params.len());
        for typ in &info.ssa_params {
            let id = self.env.mk_fresh_ident(Info::of_typ(typ.clone()));
            params.push((id, typ.clone()));
        }
        self.env.reset_stack();
        self.env.enter_node();
        for (id, _) in params.iter().rev() {
            self.env.stack.push(DataCell::Temp(*id));
        }
        self.open = Some(OpenBlock {
            label: info.name.clone(),
            params: params.clone(),
        });
        match &info.prelude {
            Prelude::Nothing => {}
            Prelude::Prune(c) => self.env.push_instr(Instr::Prune {
                cond: Exp::Var(*c),
            }),
            Prelude::PruneNot(c) => self.env.push_instr(Instr::Prune {
                cond: Exp::Not(Box::new(Exp::Var(*c))),
            }),
            Prelude::PruneThenLoadNext(c) => {
                self.env.push_instr(Instr::Prune {
                    cond: Exp::Var(*c),
                });
                let item = self.pop1()?;
                let item_id = match item {
                    DataCell::Temp(id) => id,
                    _ => return Err(self.unsupported("iteration item is not a block parameter")),
                };
                let next = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
                self.env.push_instr(Instr::Load {
                    id: next,
                    typ: Typ::PyObject,
                    src: Exp::Field {
                        base: Box::new(Exp::Var(item_id)),
                        record: Some(ITER_ITEM.to_string()),
                        name: "next_item".to_string(),
                    },
                });
                self.env.stack.push(DataCell::Temp(next));
            }
        }
        Ok(())
    }

    /// Close the open block with a terminator, draining the instruction
    /// buffer. The symbolic stack is empty afterwards: every live value has
    /// crossed the boundary as an SSA argument.
    pub(crate) fn close_with(&mut self, term: Terminator) {
        if let Some(ob) = self.open.take() {
            let instrs = mem::take(&mut self.env.instr_buf);
            self.blocks.push(Block {
                label: ob.label,
                params: ob.params,
                instrs,
                term,
            });
        }
        self.env.reset_stack();
    }

    /// Label check at an instruction boundary: a registered label here closes
    /// the open block (implicit fall-through jump carrying the live stack)
    /// and opens the labeled one. The `processed` flag keeps each block body
    /// emitted exactly once.
    pub(crate) fn at_boundary(&mut self) -> TranslateResult<()> {
        let info = match self.env.labels.get(self.offset) {
            Some(info) => info.clone(),
            None => return Ok(()),
        };
        if self.open.is_some() {
            let (args, typs) = self.live_args()?;
            if typs.len() != info.ssa_params.len() {
                return Err(TranslateError::SsaArityMismatch {
                    offset: self.offset,
                    expected: info.ssa_params.len(),
                    actual: typs.len(),
                });
            }
            self.close_with(Terminator::Jmp(smallvec![NodeCall {
                label: info.name.clone(),
                args,
            }]));
        }
        if !info.processed {
            self.env.labels.mark_processed(self.offset);
            self.open_from_label(&info)?;
        }
        Ok(())
    }

    /// Look up or create the label for a jump target. A fresh registration
    /// fixes the SSA arity; a second registration must match it.
    pub(crate) fn ensure_label(
        &mut self,
        target: u32,
        typs: SmallVec<[Typ; 4]>,
        prelude: Prelude,
    ) -> TranslateResult<String> {
        if let Some(existing) = self.env.labels.get(target) {
            let name = existing.name.clone();
            let expected = existing.ssa_params.len();
            if expected != typs.len() {
                return Err(TranslateError::SsaArityMismatch {
                    offset: self.offset,
                    expected,
                    actual: typs.len(),
                });
            }
            let mut info = LabelInfo::with_ssa_params(name.clone(), typs);
            info.prelude = prelude;
            let _ = self.env.labels.register(target, info);
            return Ok(name);
        }
        if target < self.offset {
            // A backward jump must land on a block the translator has
            // already materialized (the FOR_ITER loop header); anything else
            // is a loop shape outside the modeled subset.
            return Err(self.unsupported(format!(
                "backward jump to unlabeled offset {}",
                target
            )));
        }
        let name = self.env.mk_fresh_label();
        let mut info = LabelInfo::with_ssa_params(name.clone(), typs);
        info.prelude = prelude;
        self.env
            .labels
            .register(target, info)
            .expect("fresh label registration cannot mismatch");
        Ok(name)
    }

    // ----- materialization -----

    /// Materialize every live cell, top of stack first, as jump arguments.
    pub(crate) fn live_args(
        &mut self,
    ) -> TranslateResult<(SmallVec<[Exp; 4]>, SmallVec<[Typ; 4]>)> {
        let cells: Vec<DataCell> = self.env.stack.cells().to_vec();
        let mut args = SmallVec::new();
        let mut typs = SmallVec::new();
        for cell in cells.iter().rev() {
            let (exp, typ) = self.materialize_cell(cell)?;
            args.push(exp);
            typs.push(typ);
        }
        Ok((args, typs))
    }

    /// Resolve a cell into an expression and its type, emitting loads into
    /// the open block as needed.
    pub(crate) fn materialize_cell(&mut self, cell: &DataCell) -> TranslateResult<(Exp, Typ)> {
        match cell {
            DataCell::Const(idx) => {
                let value = self.const_at(*idx)?;
                self.const_to_exp(&value)
            }
            DataCell::Name(idx) => {
                let name = self.name_str(*idx)?;
                self.name_value(&name)
            }
            DataCell::VarName(idx) => {
                let name = self.varname_str(*idx)?;
                self.local_value(&name)
            }
            DataCell::Temp(id) => {
                let typ = self
                    .env
                    .ident_info(*id)
                    .map(|info| info.typ.clone())
                    .unwrap_or(Typ::PyObject);
                Ok((Exp::Var(*id), typ))
            }
            DataCell::Code {
                qualified_name,
                code,
                ..
            } => {
                self.env.record_builtin(Builtin::PythonCode);
                self.env.queue_proc(PendingProc {
                    qname: qualified_name.clone(),
                    code: code.clone(),
                    enclosing_class: None,
                    kind: PendingKind::Function,
                });
                Ok((
                    Exp::call(
                        Builtin::PythonCode.qualified(),
                        vec![Exp::Const(Const::Str(qualified_name.value.clone()))],
                    ),
                    Typ::PyCode,
                ))
            }
            DataCell::Map(_) => {
                Err(self.unsupported("annotation map consumed in value position"))
            }
            DataCell::BuildClassMarker => Err(TranslateError::MalformedClassBuild {
                message: "class marker consumed in value position".to_string(),
                offset: self.offset,
            }),
        }
    }

    pub(crate) fn const_to_exp(&mut self, value: &ConstValue) -> TranslateResult<(Exp, Typ)> {
        match value {
            ConstValue::Int(n) => Ok((
                wrapper_call("python_int", vec![Exp::Const(Const::Int(*n))]),
                Typ::PyInt,
            )),
            ConstValue::Bool(b) => Ok((
                wrapper_call(
                    "python_bool",
                    vec![Exp::Const(Const::Int(if *b { 1 } else { 0 }))],
                ),
                Typ::PyBool,
            )),
            ConstValue::Float(x) => {
                self.env.record_builtin(Builtin::PythonFloat);
                Ok((
                    Exp::call(
                        Builtin::PythonFloat.qualified(),
                        vec![Exp::Const(Const::Float(*x))],
                    ),
                    Typ::PyFloat,
                ))
            }
            ConstValue::Str(s) => Ok((
                wrapper_call("python_string", vec![Exp::Const(Const::Str(s.clone()))]),
                Typ::PyString,
            )),
            ConstValue::None => Ok((Exp::null(), Typ::PyNone)),
            ConstValue::Tuple(items) => {
                let mut args = Vec::with_capacity(items.len());
                for item in items {
                    let (exp, _) = self.const_to_exp(item)?;
                    args.push(exp);
                }
                Ok((wrapper_call("python_tuple", args), Typ::PyObject))
            }
            ConstValue::Code(code) => {
                let qname = QualifiedName::new(
                    qualify_code_name(self.env.module_name(), &code.name),
                    self.env.loc(),
                );
                self.env.record_builtin(Builtin::PythonCode);
                self.env.queue_proc(PendingProc {
                    qname: qname.clone(),
                    code: code.clone(),
                    enclosing_class: None,
                    kind: PendingKind::Function,
                });
                Ok((
                    Exp::call(
                        Builtin::PythonCode.qualified(),
                        vec![Exp::Const(Const::Str(qname.value))],
                    ),
                    Typ::PyCode,
                ))
            }
        }
    }

    /// A global name reference consumed as a value.
    pub(crate) fn name_value(&mut self, name: &str) -> TranslateResult<(Exp, Typ)> {
        if let Some(sym) = self.env.symbols.lookup_symbol(false, name).cloned() {
            return self.symbol_value(name, &sym, false);
        }
        if let Some(sym) = self.env.symbols.lookup_symbol(true, name).cloned() {
            return self.symbol_value(name, &sym, true);
        }
        // Implicit read of an unknown global still gets a declaration so
        // every emitted load refers to a declared global.
        let qualified = self.env.global_qualified(name);
        let sym = SymbolInfo {
            qualified_name: QualifiedName::new(qualified, self.env.loc()),
            is_builtin: false,
            info: Info::of_typ(Typ::PyObject),
        };
        self.env.symbols.register_symbol(true, name, sym.clone());
        self.symbol_value(name, &sym, true)
    }

    fn symbol_value(
        &mut self,
        name: &str,
        sym: &SymbolInfo,
        is_global: bool,
    ) -> TranslateResult<(Exp, Typ)> {
        if sym.info.is_code {
            self.env.record_builtin(Builtin::PythonCode);
            return Ok((
                Exp::call(
                    Builtin::PythonCode.qualified(),
                    vec![Exp::Const(Const::Str(sym.qualified_name.value.clone()))],
                ),
                Typ::PyCode,
            ));
        }
        if sym.info.is_class {
            self.env.record_builtin(Builtin::PythonClass);
            return Ok((
                Exp::call(
                    Builtin::PythonClass.qualified(),
                    vec![Exp::Const(Const::Str(sym.qualified_name.short().to_string()))],
                ),
                Typ::PyClass,
            ));
        }
        let (lvar, typ) = if is_global {
            (sym.qualified_name.value.clone(), Typ::PyObject)
        } else {
            (name.to_string(), sym.info.typ.clone())
        };
        let id = self.env.mk_fresh_ident(Info::of_typ(typ.clone()));
        self.env.push_instr(Instr::Load {
            id,
            typ: typ.clone(),
            src: Exp::Lvar(lvar),
        });
        Ok((Exp::Var(id), typ))
    }

    /// A local variable reference consumed as a value. Locals holding code
    /// or class values resolve the same way globals do.
    pub(crate) fn local_value(&mut self, name: &str) -> TranslateResult<(Exp, Typ)> {
        if let Some(sym) = self.env.symbols.lookup_symbol(false, name).cloned() {
            return self.symbol_value(name, &sym, false);
        }
        let sym = SymbolInfo {
            qualified_name: QualifiedName::new(name, self.env.loc()),
            is_builtin: false,
            info: Info::of_typ(Typ::PyObject),
        };
        self.env.symbols.register_symbol(false, name, sym.clone());
        self.symbol_value(name, &sym, false)
    }
}

/// A call to one of the unconditionally declared primitive wrappers.
pub(crate) fn wrapper_call(name: &str, args: Vec<Exp>) -> Exp {
    Exp::call(format!("$builtins.{}", name), args)
}
