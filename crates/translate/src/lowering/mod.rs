//! Per-opcode lowering rules
//!
//! Each rule reads operands off the symbolic stack, emits zero or more IR
//! instructions into the open block, and pushes result cells back. Dispatch
//! is exhaustive over the opcode table; anything outside the modeled subset
//! fails fast instead of emitting wrong IR.
//!
//! The rules are split by family: this module handles dispatch, constant and
//! name loads, stores, attributes, arithmetic and stack shuffles;
//! [`call`] handles calls, function and class building; [`flow`] handles
//! jumps, iteration and return.

pub(crate) mod call;
pub(crate) mod flow;

use crate::builtins::Builtin;
use crate::env::{PendingKind, PendingProc};
use crate::error::TranslateResult;
use crate::proc::{qualify_code_name, ProcTranslator};
use crate::stack::DataCell;
use crate::symbols::{Info, QualifiedName, SymbolInfo};
use pytir_bytecode::{ConstValue, Instruction, Opcode};
use pytir_textual::{Exp, Instr, Typ};

impl ProcTranslator<'_> {
    pub(crate) fn lower(&mut self, op: Opcode, instr: &Instruction) -> TranslateResult<()> {
        match op {
            Opcode::LoadConst => self.lower_load_const(instr.arg),
            Opcode::LoadName | Opcode::LoadGlobal => {
                self.env.stack.push(DataCell::Name(instr.arg));
                Ok(())
            }
            Opcode::LoadFast => {
                self.env.stack.push(DataCell::VarName(instr.arg));
                Ok(())
            }
            Opcode::StoreName => self.lower_store(instr.arg, true, false),
            Opcode::StoreGlobal => self.lower_store(instr.arg, true, true),
            Opcode::StoreFast => self.lower_store(instr.arg, false, false),
            Opcode::LoadAttr => self.lower_load_attr(instr.arg),
            Opcode::StoreAttr => self.lower_store_attr(instr.arg),
            Opcode::BinaryAdd => self.lower_binary_add(),
            Opcode::CallFunction => self.lower_call_function(instr.arg as usize),
            Opcode::LoadMethod => self.lower_load_method(instr.arg),
            Opcode::CallMethod => self.lower_call_method(instr.arg as usize),
            Opcode::MakeFunction => self.lower_make_function(instr.arg),
            Opcode::GetIter => self.lower_get_iter(),
            Opcode::ForIter => self.lower_for_iter(instr),
            Opcode::PopJumpIfFalse => self.lower_pop_jump(instr.arg, true),
            Opcode::PopJumpIfTrue => self.lower_pop_jump(instr.arg, false),
            Opcode::JumpIfFalseOrPop => self.lower_or_pop_jump(instr.arg, false),
            Opcode::JumpIfTrueOrPop => self.lower_or_pop_jump(instr.arg, true),
            Opcode::JumpAbsolute => self.lower_jump(instr.arg),
            Opcode::JumpForward => self.lower_jump(self.next_off + instr.arg),
            Opcode::ReturnValue => self.lower_return(),
            Opcode::LoadBuildClass => {
                self.env.stack.push(DataCell::BuildClassMarker);
                Ok(())
            }
            Opcode::BuildTuple => self.lower_build_tuple(instr.arg as usize),
            Opcode::BuildConstKeyMap => self.lower_build_const_key_map(instr.arg as usize),
            Opcode::PopTop => {
                self.pop1()?;
                Ok(())
            }
            Opcode::DupTop => {
                let top = self
                    .env
                    .stack
                    .peek()
                    .cloned()
                    .ok_or_else(|| self.underflow())?;
                self.env.stack.push(top);
                Ok(())
            }
            Opcode::RotTwo => {
                let a = self.pop1()?;
                let b = self.pop1()?;
                self.env.stack.push(a);
                self.env.stack.push(b);
                Ok(())
            }
            Opcode::Nop | Opcode::SetupAnnotations => Ok(()),
        }
    }

    /// `LOAD_CONST i`: code constants become `Code` cells immediately so the
    /// later `MAKE_FUNCTION` can claim them; everything else stays a lazy
    /// `Const` cell.
    fn lower_load_const(&mut self, idx: u32) -> TranslateResult<()> {
        let value = self.const_at(idx)?;
        if let ConstValue::Code(code) = value {
            let qname = QualifiedName::new(
                qualify_code_name(self.env.module_name(), &code.name),
                self.env.loc(),
            );
            self.env.stack.push(DataCell::Code {
                is_fun_or_class: false,
                qualified_name: qname,
                code,
            });
        } else {
            self.env.stack.push(DataCell::Const(idx));
        }
        Ok(())
    }

    /// `STORE_NAME` / `STORE_GLOBAL` / `STORE_FAST`: register the symbol if
    /// new and emit a typed store. Storing a code or class value registers
    /// the symbol only.
    fn lower_store(
        &mut self,
        idx: u32,
        from_names: bool,
        force_global: bool,
    ) -> TranslateResult<()> {
        let name = if from_names {
            self.name_str(idx)?
        } else {
            self.varname_str(idx)?
        };
        let cell = self.pop1()?;
        let is_global = force_global || (self.env.is_toplevel() && from_names);

        if let DataCell::Code {
            qualified_name,
            code,
            ..
        } = &cell
        {
            self.env.symbols.register_symbol(
                is_global,
                &name,
                SymbolInfo {
                    qualified_name: qualified_name.clone(),
                    is_builtin: false,
                    info: Info::code(),
                },
            );
            self.env.queue_proc(PendingProc {
                qname: qualified_name.clone(),
                code: code.clone(),
                enclosing_class: None,
                kind: PendingKind::Function,
            });
            return Ok(());
        }
        if let DataCell::Temp(id) = &cell {
            if self
                .env
                .ident_info(*id)
                .map(|info| info.is_class)
                .unwrap_or(false)
            {
                // The class symbol was registered when the build sequence was
                // lowered; the store of the class object itself is dropped.
                return Ok(());
            }
        }

        let (rhs, typ) = self.materialize_cell(&cell)?;
        let lvar = if is_global {
            let qualified = self.env.global_qualified(&name);
            self.env.symbols.register_symbol(
                true,
                &name,
                SymbolInfo {
                    qualified_name: QualifiedName::new(qualified.clone(), self.env.loc()),
                    is_builtin: false,
                    info: Info::of_typ(typ.clone()),
                },
            );
            qualified
        } else {
            self.env.symbols.register_symbol(
                false,
                &name,
                SymbolInfo {
                    qualified_name: QualifiedName::new(name.clone(), self.env.loc()),
                    is_builtin: false,
                    info: Info::of_typ(typ.clone()),
                },
            );
            name
        };
        self.env.push_instr(Instr::Store {
            dst: Exp::Lvar(lvar),
            rhs,
            typ,
        });
        Ok(())
    }

    /// `LOAD_ATTR`: `n = base.?.attr`, typed `*PyObject`.
    fn lower_load_attr(&mut self, idx: u32) -> TranslateResult<()> {
        let attr = self.name_str(idx)?;
        let base = self.pop1()?;
        let (base_exp, _) = self.materialize_cell(&base)?;
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::Field {
                base: Box::new(base_exp),
                record: None,
                name: attr,
            },
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// `STORE_ATTR`: a field store. `self.<attr>` stores inside a method
    /// refine the enclosing class's record type.
    fn lower_store_attr(&mut self, idx: u32) -> TranslateResult<()> {
        let attr = self.name_str(idx)?;
        let base = self.pop1()?;
        let value = self.pop1()?;

        if let DataCell::VarName(var_idx) = &base {
            let base_name = self.varname_str(*var_idx)?;
            if base_name == "self" {
                if let Some(class) = self.env.enclosing_class().map(str::to_string) {
                    // Field type is resolved after materialization below.
                    let (base_exp, _) = self.materialize_cell(&base)?;
                    let (rhs, typ) = self.materialize_cell(&value)?;
                    self.env.symbols.register_class_field(&class, &attr, typ.clone());
                    self.env.push_instr(Instr::Store {
                        dst: Exp::Field {
                            base: Box::new(base_exp),
                            record: None,
                            name: attr,
                        },
                        rhs,
                        typ,
                    });
                    return Ok(());
                }
            }
        }

        let (base_exp, _) = self.materialize_cell(&base)?;
        let (rhs, typ) = self.materialize_cell(&value)?;
        self.env.push_instr(Instr::Store {
            dst: Exp::Field {
                base: Box::new(base_exp),
                record: None,
                name: attr,
            },
            rhs,
            typ,
        });
        Ok(())
    }

    /// `BINARY_ADD`: `$builtins.binary_add(a, b) : *PyObject`.
    fn lower_binary_add(&mut self) -> TranslateResult<()> {
        let b = self.pop1()?;
        let a = self.pop1()?;
        let (a_exp, _) = self.materialize_cell(&a)?;
        let (b_exp, _) = self.materialize_cell(&b)?;
        self.env.record_builtin(Builtin::BinaryAdd);
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::call(Builtin::BinaryAdd.qualified(), vec![a_exp, b_exp]),
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// `BUILD_TUPLE n`: a flat tuple value through the `python_tuple`
    /// wrapper.
    fn lower_build_tuple(&mut self, count: usize) -> TranslateResult<()> {
        let cells = self
            .env
            .stack
            .pop_n(count)
            .ok_or_else(|| self.underflow())?;
        let mut args = Vec::with_capacity(count);
        for cell in &cells {
            let (exp, _) = self.materialize_cell(cell)?;
            args.push(exp);
        }
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
        self.env.push_instr(Instr::Let {
            id,
            rhs: crate::proc::wrapper_call("python_tuple", args),
        });
        self.env.stack.push(DataCell::Temp(id));
        Ok(())
    }

    /// `BUILD_CONST_KEY_MAP n`: the annotation-dict shape. Keys come from a
    /// constant tuple of strings; values stay lazy cells inside a `Map`.
    fn lower_build_const_key_map(&mut self, count: usize) -> TranslateResult<()> {
        let keys_cell = self.pop1()?;
        let keys = match keys_cell {
            DataCell::Const(idx) => match self.const_at(idx)? {
                ConstValue::Tuple(items) => {
                    let mut keys = Vec::with_capacity(items.len());
                    for item in &items {
                        match item.as_str() {
                            Some(s) => keys.push(s.to_string()),
                            None => {
                                return Err(
                                    self.unsupported("non-string key in constant key map")
                                )
                            }
                        }
                    }
                    keys
                }
                _ => return Err(self.unsupported("constant key map without key tuple")),
            },
            _ => return Err(self.unsupported("constant key map without constant keys")),
        };
        if keys.len() != count {
            return Err(self.unsupported(format!(
                "constant key map arity mismatch: {} keys for {} values",
                keys.len(),
                count
            )));
        }
        let values = self
            .env
            .stack
            .pop_n(count)
            .ok_or_else(|| self.underflow())?;
        let entries = keys.into_iter().zip(values).collect();
        self.env.stack.push(DataCell::Map(entries));
        Ok(())
    }
}
