//! Call lowering
//!
//! `CALL_FUNCTION` resolution order: a class-build marker in callee position
//! triggers the class rule; a callee naming a known user function becomes a
//! direct call; a known host builtin becomes a `$builtins` call; everything
//! else goes through the `python_call` shim. Method calls always go through
//! `python_load_method` / `python_call_method`.
//!
//! Also here: `MAKE_FUNCTION` (signature registration from annotation maps)
//! and the class-body scan that turns method definitions into queued
//! procedures.

use crate::builtins::{host_builtin, Builtin};
use crate::env::{Environment, PendingKind, PendingProc};
use crate::error::{TranslateError, TranslateResult};
use crate::proc::{qualify_code_name, ProcTranslator};
use crate::stack::DataCell;
use crate::symbols::{Info, QualifiedName, Signature, SymbolInfo};
use pytir_bytecode::{CodeObject, ConstValue, Opcode};
use pytir_textual::{Const, Exp, Instr, Typ};

/// `MAKE_FUNCTION` flag bit for the annotation map. The other bits carry
/// defaults and closure cells, which are outside the modeled subset.
const MAKE_FUNCTION_ANNOTATIONS: u32 = 0x04;

impl ProcTranslator<'_> {
    pub(crate) fn lower_call_function(&mut self, argc: usize) -> TranslateResult<()> {
        let args = self
            .env
            .stack
            .pop_n(argc)
            .ok_or_else(|| self.underflow())?;
        let callee = self.pop1()?;

        if matches!(callee, DataCell::BuildClassMarker) {
            return self.lower_class_build(args);
        }

        let callee_name = match &callee {
            DataCell::Name(idx) => Some(self.name_str(*idx)?),
            DataCell::VarName(idx) => Some(self.varname_str(*idx)?),
            _ => None,
        };
        if let Some(name) = callee_name {
            if let Some(sym) = self.env.symbols.lookup(&name).cloned() {
                if sym.info.is_code {
                    return self.direct_call(&sym, &args);
                }
                if sym.info.is_class {
                    return self.constructor_call(&sym, &args);
                }
                // A plain variable in callee position: generic call below.
            } else if matches!(callee, DataCell::Name(_)) {
                if let Some(host) = host_builtin(&name) {
                    self.env.record_host(host);
                    let exps = self.materialize_args(&args)?;
                    let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
                    self.env.push_instr(Instr::Let {
                        id,
                        rhs: Exp::call(format!("$builtins.{}", host), exps),
                    });
                    self.env.stack.push(DataCell::Temp(id));
                    return Ok(());
                }
            }
        }

        let (callee_exp, _) = self.materialize_cell(&callee)?;
        let mut exps = vec![callee_exp];
        exps.extend(self.materialize_args(&args)?);
        self.env.record_builtin(Builtin::PythonCall);
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::call(Builtin::PythonCall.qualified(), exps),
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// A call to a known user function: `module::f(args...)`, typed by the
    /// annotated return type when one was registered.
    fn direct_call(&mut self, sym: &SymbolInfo, args: &[DataCell]) -> TranslateResult<()> {
        let short = sym.qualified_name.short().to_string();
        let module = self.env.module_name().to_string();
        let ret = self
            .env
            .symbols
            .lookup_signature(&module, &short)
            .map(|sig| sig.ret.clone())
            .unwrap_or(Typ::PyObject);
        let exps = self.materialize_args(args)?;
        let id = self.env.mk_fresh_ident(Info::of_typ(ret));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::Call {
                proc: sym.qualified_name.value.clone(),
                args: exps,
            },
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// A call to a registered class: construction through the
    /// `python_class_constructor` shim, typed as the class record.
    fn constructor_call(&mut self, sym: &SymbolInfo, args: &[DataCell]) -> TranslateResult<()> {
        let short = sym.qualified_name.short().to_string();
        let mut exps = vec![Exp::Const(Const::Str(short.clone()))];
        exps.extend(self.materialize_args(args)?);
        self.env.record_builtin(Builtin::PythonClassConstructor);
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::Struct(short)));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::call(Builtin::PythonClassConstructor.qualified(), exps),
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// `LOAD_METHOD name`: bind a method handle.
    pub(crate) fn lower_load_method(&mut self, idx: u32) -> TranslateResult<()> {
        let name = self.name_str(idx)?;
        let base = self.pop1()?;
        let (base_exp, _) = self.materialize_cell(&base)?;
        self.env.record_builtin(Builtin::PythonLoadMethod);
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyMethod));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::call(
                Builtin::PythonLoadMethod.qualified(),
                vec![base_exp, Exp::Const(Const::Str(name))],
            ),
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// `CALL_METHOD n`: invoke a bound method handle.
    pub(crate) fn lower_call_method(&mut self, argc: usize) -> TranslateResult<()> {
        let args = self
            .env
            .stack
            .pop_n(argc)
            .ok_or_else(|| self.underflow())?;
        let method = self.pop1()?;
        let (method_exp, _) = self.materialize_cell(&method)?;
        let mut exps = vec![method_exp];
        exps.extend(self.materialize_args(&args)?);
        self.env.record_builtin(Builtin::PythonCallMethod);
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::call(Builtin::PythonCallMethod.qualified(), exps),
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// `MAKE_FUNCTION flags`: claim the code cell under its qualified name
    /// and register the annotated signature.
    pub(crate) fn lower_make_function(&mut self, flags: u32) -> TranslateResult<()> {
        if flags & !MAKE_FUNCTION_ANNOTATIONS != 0 {
            return Err(self.unsupported(format!(
                "MAKE_FUNCTION flags 0x{:02x}: defaults and closure cells are unsupported",
                flags
            )));
        }
        let qualname_cell = self.pop1()?;
        let code_cell = self.pop1()?;
        let annotations = if flags & MAKE_FUNCTION_ANNOTATIONS != 0 {
            match self.pop1()? {
                DataCell::Map(entries) => Some(entries),
                _ => {
                    return Err(
                        self.unsupported("MAKE_FUNCTION annotations are not a constant key map")
                    )
                }
            }
        } else {
            None
        };
        let cell = build_function_cell(
            self.env,
            self.code,
            qualname_cell,
            code_cell,
            annotations,
            None,
            self.offset,
        )?;
        self.env.stack.push(cell);
        Ok(())
    }

    /// The `LOAD_BUILD_CLASS` handshake: callee position held the marker and
    /// the arguments are `(class body code, class name, bases...)`.
    fn lower_class_build(&mut self, args: Vec<DataCell>) -> TranslateResult<()> {
        let malformed = |message: &str, offset: u32| TranslateError::MalformedClassBuild {
            message: message.to_string(),
            offset,
        };
        if args.len() < 2 {
            return Err(malformed(
                "class build with fewer than two arguments",
                self.offset,
            ));
        }
        let body = match &args[0] {
            DataCell::Code { code, .. } => code.clone(),
            _ => {
                return Err(malformed(
                    "first class build argument is not a code object",
                    self.offset,
                ))
            }
        };
        let name = match &args[1] {
            DataCell::Const(idx) => match self.const_at(*idx)? {
                ConstValue::Str(s) => s,
                _ => {
                    return Err(malformed(
                        "class name is not a string constant",
                        self.offset,
                    ))
                }
            },
            _ => {
                return Err(malformed(
                    "class name is not a string constant",
                    self.offset,
                ))
            }
        };
        // Base classes (args[2..]) are name references only; inheritance is
        // not modeled.

        let qualified = self.env.global_qualified(&name);
        self.env.symbols.register_class(&name);
        self.env.symbols.register_symbol(
            true,
            &name,
            SymbolInfo {
                qualified_name: QualifiedName::new(qualified.clone(), self.env.loc()),
                is_builtin: false,
                info: Info::class(),
            },
        );
        self.env.queue_proc(PendingProc {
            qname: QualifiedName::new(qualified, self.env.loc()),
            code: body,
            enclosing_class: Some(name.clone()),
            kind: PendingKind::ClassBody,
        });
        self.env.record_builtin(Builtin::PythonClass);
        let id = self.env.mk_fresh_ident(Info::class());
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::call(
                Builtin::PythonClass.qualified(),
                vec![Exp::Const(Const::Str(name))],
            ),
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// Materialize popped call arguments, in call order.
    pub(crate) fn materialize_args(&mut self, cells: &[DataCell]) -> TranslateResult<Vec<Exp>> {
        let mut exps = Vec::with_capacity(cells.len());
        for cell in cells {
            let (exp, _) = self.materialize_cell(cell)?;
            exps.push(exp);
        }
        Ok(exps)
    }
}

/// Shared `MAKE_FUNCTION` core for procedure bodies and class bodies:
/// resolve the qualified name, register the annotated signature under the
/// right enclosing scope, and hand back the claimed code cell.
pub(crate) fn build_function_cell(
    env: &mut Environment,
    code_src: &CodeObject,
    qualname_cell: DataCell,
    code_cell: DataCell,
    annotations: Option<Vec<(String, DataCell)>>,
    enclosing_class: Option<&str>,
    offset: u32,
) -> TranslateResult<DataCell> {
    let raw_qualname = match &qualname_cell {
        DataCell::Const(idx) => code_src
            .const_at(*idx)
            .and_then(|c| c.as_str())
            .map(str::to_string),
        _ => None,
    };
    let raw_qualname = raw_qualname.ok_or_else(|| TranslateError::Unsupported {
        message: "MAKE_FUNCTION without a constant qualified name".to_string(),
        offset,
    })?;
    let code = match code_cell {
        DataCell::Code { code, .. } => code,
        _ => {
            return Err(TranslateError::Unsupported {
                message: "MAKE_FUNCTION without a code object".to_string(),
                offset,
            })
        }
    };

    let qualified = qualify_code_name(env.module_name(), &raw_qualname);
    let qname = QualifiedName::new(qualified, env.loc());
    let short = qname.short().to_string();

    let sig = match &annotations {
        Some(entries) => signature_from_annotations(env, code_src, entries),
        None => Signature::untyped(),
    };
    match enclosing_class {
        Some(class) => env.symbols.register_method(class, &short, sig),
        None => {
            let module = env.module_name().to_string();
            env.symbols.register_function(&module, &short, sig);
        }
    }

    Ok(DataCell::Code {
        is_fun_or_class: true,
        qualified_name: qname,
        code,
    })
}

/// Build a signature from an annotation map: the `return` key fixes the
/// result type, every other key annotates the parameter of that name.
fn signature_from_annotations(
    env: &Environment,
    code_src: &CodeObject,
    entries: &[(String, DataCell)],
) -> Signature {
    let mut sig = Signature::untyped();
    for (key, cell) in entries {
        let typ = annotation_typ(env, code_src, cell);
        if key == "return" {
            sig.ret = typ;
        } else {
            sig.params.push((key.clone(), typ));
        }
    }
    sig
}

/// Resolve an annotation value to an IR type. Annotations are name
/// references (`int`, `str`, a class name) or string constants; anything
/// else degrades to `*PyObject`.
fn annotation_typ(env: &Environment, code_src: &CodeObject, cell: &DataCell) -> Typ {
    let type_name: Option<String> = match cell {
        DataCell::Name(idx) => code_src.name_at(*idx).map(str::to_string),
        DataCell::Const(idx) => code_src
            .const_at(*idx)
            .and_then(|c| c.as_str())
            .map(str::to_string),
        _ => None,
    };
    match type_name.as_deref() {
        Some("int") => Typ::PyInt,
        Some("float") => Typ::PyFloat,
        Some("bool") => Typ::PyBool,
        Some("str") => Typ::PyString,
        Some(other) if env.symbols.is_class(other) => Typ::Struct(other.to_string()),
        _ => Typ::PyObject,
    }
}

/// Scan a class body for method definitions. No procedure is emitted for the
/// body itself: the `__module__`/`__qualname__` boilerplate is dropped and
/// every stored method is queued as a `module::Class::method` procedure.
pub(crate) fn lower_class_body(
    env: &mut Environment,
    class_name: &str,
    code: &CodeObject,
) -> TranslateResult<()> {
    let mut stack: Vec<DataCell> = Vec::new();
    for instr in &code.instructions {
        let op = Opcode::from_name(&instr.opname).ok_or_else(|| TranslateError::UnknownOpcode {
            opname: instr.opname.clone(),
            offset: instr.offset,
        })?;
        match op {
            Opcode::LoadConst => {
                let value =
                    code.const_at(instr.arg)
                        .cloned()
                        .ok_or_else(|| TranslateError::MalformedClassBuild {
                            message: format!("constant index {} out of range", instr.arg),
                            offset: instr.offset,
                        })?;
                if let ConstValue::Code(nested) = value {
                    let qname = QualifiedName::new(
                        qualify_code_name(env.module_name(), &nested.name),
                        env.loc(),
                    );
                    stack.push(DataCell::Code {
                        is_fun_or_class: false,
                        qualified_name: qname,
                        code: nested,
                    });
                } else {
                    stack.push(DataCell::Const(instr.arg));
                }
            }
            Opcode::LoadName | Opcode::LoadGlobal => stack.push(DataCell::Name(instr.arg)),
            Opcode::MakeFunction => {
                if instr.arg & !MAKE_FUNCTION_ANNOTATIONS != 0 {
                    return Err(TranslateError::Unsupported {
                        message: format!(
                            "MAKE_FUNCTION flags 0x{:02x} in class body",
                            instr.arg
                        ),
                        offset: instr.offset,
                    });
                }
                let qualname_cell =
                    stack
                        .pop()
                        .ok_or_else(|| TranslateError::MalformedClassBuild {
                            message: "MAKE_FUNCTION on an empty class body stack".to_string(),
                            offset: instr.offset,
                        })?;
                let code_cell =
                    stack
                        .pop()
                        .ok_or_else(|| TranslateError::MalformedClassBuild {
                            message: "MAKE_FUNCTION on an empty class body stack".to_string(),
                            offset: instr.offset,
                        })?;
                let annotations = if instr.arg & MAKE_FUNCTION_ANNOTATIONS != 0 {
                    match stack.pop() {
                        Some(DataCell::Map(entries)) => Some(entries),
                        _ => {
                            return Err(TranslateError::MalformedClassBuild {
                                message: "method annotations are not a constant key map"
                                    .to_string(),
                                offset: instr.offset,
                            })
                        }
                    }
                } else {
                    None
                };
                let cell = build_function_cell(
                    env,
                    code,
                    qualname_cell,
                    code_cell,
                    annotations,
                    Some(class_name),
                    instr.offset,
                )?;
                stack.push(cell);
            }
            Opcode::BuildConstKeyMap => {
                let count = instr.arg as usize;
                let keys_cell =
                    stack
                        .pop()
                        .ok_or_else(|| TranslateError::MalformedClassBuild {
                            message: "constant key map on an empty class body stack".to_string(),
                            offset: instr.offset,
                        })?;
                let keys = const_key_tuple(code, &keys_cell).ok_or_else(|| {
                    TranslateError::MalformedClassBuild {
                        message: "constant key map without key tuple".to_string(),
                        offset: instr.offset,
                    }
                })?;
                if keys.len() != count || stack.len() < count {
                    return Err(TranslateError::MalformedClassBuild {
                        message: "constant key map arity mismatch".to_string(),
                        offset: instr.offset,
                    });
                }
                let values = stack.split_off(stack.len() - count);
                stack.push(DataCell::Map(keys.into_iter().zip(values).collect()));
            }
            Opcode::StoreName => {
                let cell = stack
                    .pop()
                    .ok_or_else(|| TranslateError::MalformedClassBuild {
                        message: "store on an empty class body stack".to_string(),
                        offset: instr.offset,
                    })?;
                if let DataCell::Code {
                    qualified_name,
                    code: method_code,
                    ..
                } = cell
                {
                    env.queue_proc(PendingProc {
                        qname: qualified_name,
                        code: method_code,
                        enclosing_class: Some(class_name.to_string()),
                        kind: PendingKind::Function,
                    });
                }
            }
            Opcode::PopTop => {
                stack.pop();
            }
            Opcode::Nop | Opcode::SetupAnnotations => {}
            Opcode::ReturnValue => break,
            other => {
                return Err(TranslateError::MalformedClassBuild {
                    message: format!("unexpected {} in class body", other.name()),
                    offset: instr.offset,
                })
            }
        }
    }
    Ok(())
}

fn const_key_tuple(code: &CodeObject, cell: &DataCell) -> Option<Vec<String>> {
    let idx = match cell {
        DataCell::Const(idx) => *idx,
        _ => return None,
    };
    match code.const_at(idx)? {
        ConstValue::Tuple(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}
