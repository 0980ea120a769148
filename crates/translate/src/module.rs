//! Module assembly
//!
//! Drives one code object at a time from a worklist seeded with the
//! top-level object. Nested functions, methods and class bodies are queued
//! as they are discovered. At the end the module collects every procedure,
//! the global declarations, the class record types (plus the `PyIterItem`
//! and `PyMethod` records when their builtins were used) and the builtin
//! declaration closure.
//!
//! `to_module` is the pure public entry point: a fresh environment per call,
//! no shared state between modules.

use crate::builtins::{self, Builtin};
use crate::env::{Environment, PendingKind};
use crate::error::{TranslateError, TranslateResult};
use crate::lowering::call::lower_class_body;
use crate::proc::translate_proc;
use crate::symbols::{QualifiedName, SourceLoc};
use pytir_bytecode::CodeObject;
use pytir_textual::{Global, Module, StructDecl, Typ};
use std::path::Path;

/// Translate a loaded code object into a Textual IR module. The module's
/// qualified-name prefix is the file stem of `source_path`.
pub fn to_module(source_path: &Path, code: &CodeObject) -> TranslateResult<Module> {
    if code.instructions.is_empty() {
        return Err(TranslateError::EmptyCode {
            name: code.name.clone(),
        });
    }
    let module_name = source_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("module")
        .to_string();

    let mut env = Environment::new(module_name.clone());
    let mut module = Module::new();

    let toplevel = QualifiedName::new(
        format!("{}::__module_body__", module_name),
        SourceLoc::default(),
    );
    module
        .procs
        .push(translate_proc(&mut env, code, toplevel, None, true)?);

    while let Some(pending) = env.take_next_pending() {
        match pending.kind {
            PendingKind::Function => {
                let proc = translate_proc(
                    &mut env,
                    &pending.code,
                    pending.qname,
                    pending.enclosing_class.as_deref(),
                    false,
                )?;
                module.procs.push(proc);
            }
            PendingKind::ClassBody => {
                let class = pending
                    .enclosing_class
                    .clone()
                    .expect("class bodies are queued with their class name");
                lower_class_body(&mut env, &class, &pending.code)?;
            }
        }
    }

    for (_, sym) in env.symbols.globals() {
        if sym.info.is_code || sym.info.is_class || sym.is_builtin {
            continue;
        }
        module.globals.push(Global {
            name: sym.qualified_name.value.clone(),
            typ: Typ::PyObject,
        });
    }

    for (name, fields) in env.symbols.classes() {
        module.structs.push(StructDecl {
            name: name.clone(),
            fields: fields
                .iter()
                .map(|(field, typ)| (field.clone(), typ.clone()))
                .collect(),
        });
    }
    if env.builtins_seen.contains(&Builtin::PythonIterNext) {
        module.structs.push(StructDecl {
            name: "PyIterItem".to_string(),
            fields: vec![
                ("has_item".to_string(), Typ::Int),
                ("next_item".to_string(), Typ::PyObject),
            ],
        });
    }
    if env.builtins_seen.contains(&Builtin::PythonLoadMethod) {
        module.structs.push(StructDecl {
            name: "PyMethod".to_string(),
            fields: vec![
                ("receiver".to_string(), Typ::PyObject),
                ("name".to_string(), Typ::PyString),
            ],
        });
    }

    module.declares = builtins::declarations(&env.builtins_seen, &env.hosts_seen);
    Ok(module)
}
