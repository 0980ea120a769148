//! Disassembly loader
//!
//! Reads a JSON disassembly into the [`CodeObject`] model and normalizes the
//! instruction stream: `EXTENDED_ARG` prefixes are folded into the argument
//! of the instruction that follows them, recursively through nested code
//! constants. Jump targets in the input are byte offsets and survive folding
//! unchanged because only the prefix instruction is removed.

use crate::code::{CodeObject, ConstValue};
use crate::error::{BytecodeError, BytecodeResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const EXTENDED_ARG: &str = "EXTENDED_ARG";

pub fn load_path(path: &Path) -> BytecodeResult<CodeObject> {
    let text = fs::read_to_string(path)?;
    load_str(&text)
}

pub fn load_str(text: &str) -> BytecodeResult<CodeObject> {
    let mut code: CodeObject = serde_json::from_str(text)?;
    normalize(&mut code)?;
    Ok(code)
}

fn normalize(code: &mut CodeObject) -> BytecodeResult<()> {
    fold_extended_args(code)?;
    for c in &mut code.consts {
        if let ConstValue::Code(nested) = c {
            let mut inner = (**nested).clone();
            normalize(&mut inner)?;
            *nested = Arc::new(inner);
        }
    }
    Ok(())
}

fn fold_extended_args(code: &mut CodeObject) -> BytecodeResult<()> {
    let mut folded = Vec::with_capacity(code.instructions.len());
    let mut pending: u32 = 0;
    for mut instr in code.instructions.drain(..) {
        if instr.opname == EXTENDED_ARG {
            pending = (pending | instr.arg) << 8;
            continue;
        }
        instr.arg |= pending;
        pending = 0;
        folded.push(instr);
    }
    if pending != 0 {
        return Err(BytecodeError::Disassembly(format!(
            "dangling EXTENDED_ARG at end of {:?}",
            code.name
        )));
    }
    code.instructions = folded;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal() {
        let code = load_str(
            r#"{
                "filename": "dummy.py",
                "name": "<module>",
                "co_consts": [{"int": 42}, "none"],
                "co_names": ["x"],
                "co_varnames": [],
                "co_argcount": 0,
                "co_flags": 64,
                "instructions": [
                    {"opname": "LOAD_CONST", "arg": 0, "offset": 0, "starts_line": 1},
                    {"opname": "STORE_NAME", "arg": 0, "offset": 2},
                    {"opname": "LOAD_CONST", "arg": 1, "offset": 4},
                    {"opname": "RETURN_VALUE", "arg": 0, "offset": 6}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(code.name, "<module>");
        assert_eq!(code.consts.len(), 2);
        assert_eq!(code.consts[0], ConstValue::Int(42));
        assert_eq!(code.consts[1], ConstValue::None);
        assert_eq!(code.instructions.len(), 4);
        assert_eq!(code.instructions[0].starts_line, Some(1));
    }

    #[test]
    fn test_nested_code_const() {
        let code = load_str(
            r#"{
                "filename": "dummy.py",
                "name": "<module>",
                "co_consts": [{"code": {
                    "filename": "dummy.py",
                    "name": "f",
                    "co_consts": ["none"],
                    "co_names": [],
                    "co_varnames": ["x"],
                    "co_argcount": 1,
                    "co_flags": 67,
                    "instructions": [
                        {"opname": "LOAD_CONST", "arg": 0, "offset": 0},
                        {"opname": "RETURN_VALUE", "arg": 0, "offset": 2}
                    ]
                }}],
                "co_names": [],
                "co_varnames": [],
                "co_argcount": 0,
                "co_flags": 64,
                "instructions": [
                    {"opname": "RETURN_VALUE", "arg": 0, "offset": 0}
                ]
            }"#,
        )
        .unwrap();
        let nested = code.consts[0].as_code().unwrap();
        assert_eq!(nested.name, "f");
        assert_eq!(nested.argcount, 1);
    }

    #[test]
    fn test_extended_arg_folding() {
        let code = load_str(
            r#"{
                "filename": "dummy.py",
                "name": "<module>",
                "co_consts": [],
                "co_names": [],
                "co_varnames": [],
                "co_argcount": 0,
                "co_flags": 64,
                "instructions": [
                    {"opname": "EXTENDED_ARG", "arg": 1, "offset": 0},
                    {"opname": "JUMP_ABSOLUTE", "arg": 4, "offset": 2},
                    {"opname": "NOP", "arg": 0, "offset": 4}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(code.instructions.len(), 2);
        assert_eq!(code.instructions[0].opname, "JUMP_ABSOLUTE");
        assert_eq!(code.instructions[0].arg, 256 | 4);
    }

    #[test]
    fn test_dangling_extended_arg() {
        let err = load_str(
            r#"{
                "filename": "dummy.py",
                "name": "<module>",
                "co_consts": [],
                "co_names": [],
                "co_varnames": [],
                "co_argcount": 0,
                "co_flags": 64,
                "instructions": [
                    {"opname": "EXTENDED_ARG", "arg": 1, "offset": 0}
                ]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, BytecodeError::Disassembly(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            load_str("{not json").unwrap_err(),
            BytecodeError::Json(_)
        ));
    }
}
