//! Shared helpers for the translator integration suites.

#![allow(dead_code)]

use pytir_bytecode::{CodeObject, ConstValue, Instruction};
use pytir_textual::Module;
use pytir_translate::to_module;
use std::path::Path;
use std::sync::Arc;

pub fn instr(opname: &str, arg: u32, offset: u32) -> Instruction {
    Instruction::new(opname, arg, offset)
}

pub fn code_object(
    name: &str,
    consts: Vec<ConstValue>,
    names: &[&str],
    varnames: &[&str],
    argcount: u32,
    instructions: Vec<Instruction>,
) -> CodeObject {
    CodeObject {
        filename: "dummy.py".to_string(),
        name: name.to_string(),
        consts,
        names: names.iter().map(|s| s.to_string()).collect(),
        varnames: varnames.iter().map(|s| s.to_string()).collect(),
        argcount,
        flags: 0,
        instructions,
    }
}

pub fn nested(code: CodeObject) -> ConstValue {
    ConstValue::Code(Arc::new(code))
}

pub fn translate(code: &CodeObject) -> Module {
    to_module(Path::new("dummy.py"), code).expect("translation should succeed")
}

pub fn translate_text(code: &CodeObject) -> String {
    translate(code).to_string()
}
