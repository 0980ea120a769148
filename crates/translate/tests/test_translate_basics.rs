//! Straight-line translation tests
//!
//! Constant stores, name resolution, arithmetic through `binary_add`, host
//! builtin calls, direct calls to user functions and the conditional-return
//! shape with its prune arms.

mod common;

use common::{code_object, instr, nested, translate, translate_text};
use pytir_bytecode::{CodeObject, ConstValue};
use pytir_translate::{to_module, TranslateError};
use std::path::Path;

/// `x = 42`
fn store_const_module() -> CodeObject {
    code_object(
        "<module>",
        vec![ConstValue::Int(42), ConstValue::None],
        &["x"],
        &[],
        0,
        vec![
            instr("LOAD_CONST", 0, 0),
            instr("STORE_NAME", 0, 2),
            instr("LOAD_CONST", 1, 4),
            instr("RETURN_VALUE", 0, 6),
        ],
    )
}

#[test]
fn test_store_constant_full_module() {
    let text = translate_text(&store_const_module());
    let expected = "\
.source_language = \"python\"

define dummy::__module_body__() : *PyObject {
  #b0:
      store &dummy::x <- $builtins.python_int(42): *PyInt
      ret null
}

global dummy::x: *PyObject

declare $builtins.python_int(int) : *PyInt
declare $builtins.python_bool(int) : *PyBool
declare $builtins.python_string(*String) : *PyString
declare $builtins.python_tuple(...) : *PyObject
";
    assert_eq!(text, expected);
}

/// `x = 42; y = 10; print(x + y)`
#[test]
fn test_binary_add_and_print() {
    let module = code_object(
        "<module>",
        vec![ConstValue::Int(42), ConstValue::Int(10), ConstValue::None],
        &["x", "y", "print"],
        &[],
        0,
        vec![
            instr("LOAD_CONST", 0, 0),
            instr("STORE_NAME", 0, 2),
            instr("LOAD_CONST", 1, 4),
            instr("STORE_NAME", 1, 6),
            instr("LOAD_NAME", 2, 8),
            instr("LOAD_NAME", 0, 10),
            instr("LOAD_NAME", 1, 12),
            instr("BINARY_ADD", 0, 14),
            instr("CALL_FUNCTION", 1, 16),
            instr("POP_TOP", 0, 18),
            instr("LOAD_CONST", 2, 20),
            instr("RETURN_VALUE", 0, 22),
        ],
    );
    let text = translate_text(&module);

    let body = "\
  #b0:
      store &dummy::x <- $builtins.python_int(42): *PyInt
      store &dummy::y <- $builtins.python_int(10): *PyInt
      n0:*PyObject = load &dummy::x
      n1:*PyObject = load &dummy::y
      n2 = $builtins.binary_add(n0, n1)
      n3 = $builtins.print(n2)
      ret null
";
    assert!(text.contains(body), "unexpected body:\n{}", text);
    assert!(text.contains("global dummy::x: *PyObject\n"));
    assert!(text.contains("global dummy::y: *PyObject\n"));
    assert!(text.contains("declare $builtins.binary_add(*PyObject, *PyObject) : *PyObject\n"));
    assert!(text.contains("declare $builtins.print(...) : *PyObject\n"));
}

/// `def coin(): return False` / `def f(x, y): if coin(): return x else: return y`
fn conditional_module() -> CodeObject {
    let coin = code_object(
        "coin",
        vec![ConstValue::Bool(false)],
        &[],
        &[],
        0,
        vec![instr("LOAD_CONST", 0, 0), instr("RETURN_VALUE", 0, 2)],
    );
    let f = code_object(
        "f",
        vec![ConstValue::None],
        &["coin"],
        &["x", "y"],
        2,
        vec![
            instr("LOAD_GLOBAL", 0, 0),
            instr("CALL_FUNCTION", 0, 2),
            instr("POP_JUMP_IF_FALSE", 10, 4),
            instr("LOAD_FAST", 0, 6),
            instr("RETURN_VALUE", 0, 8),
            instr("LOAD_FAST", 1, 10),
            instr("RETURN_VALUE", 0, 12),
            instr("LOAD_CONST", 0, 14),
            instr("RETURN_VALUE", 0, 16),
        ],
    );
    code_object(
        "<module>",
        vec![
            nested(coin),
            ConstValue::Str("coin".to_string()),
            nested(f),
            ConstValue::Str("f".to_string()),
            ConstValue::None,
        ],
        &["coin", "f"],
        &[],
        0,
        vec![
            instr("LOAD_CONST", 0, 0),
            instr("LOAD_CONST", 1, 2),
            instr("MAKE_FUNCTION", 0, 4),
            instr("STORE_NAME", 0, 6),
            instr("LOAD_CONST", 2, 8),
            instr("LOAD_CONST", 3, 10),
            instr("MAKE_FUNCTION", 0, 12),
            instr("STORE_NAME", 1, 14),
            instr("LOAD_CONST", 4, 16),
            instr("RETURN_VALUE", 0, 18),
        ],
    )
}

#[test]
fn test_conditional_return_blocks() {
    let text = translate_text(&conditional_module());

    assert!(text.contains("define dummy::coin() : *PyObject {"));
    assert!(text.contains("ret $builtins.python_bool(0)"));

    let f = "\
define dummy::f(x: *PyObject, y: *PyObject) : *PyObject {
  #b0:
      n0 = dummy::coin()
      n1 = $builtins.python_is_true(n0)
      jmp b1, b2
  #b1:
      prune n1
      n2:*PyObject = load &x
      ret n2
  #b2:
      prune __sil_lnot(n1)
      n3:*PyObject = load &y
      ret n3
  #b3:
      ret null
}
";
    assert!(text.contains(f), "unexpected f:\n{}", text);
    assert!(text.contains("declare $builtins.python_is_true(*PyObject) : int\n"));
    // Function definitions are symbols, not globals.
    assert!(!text.contains("global dummy::coin"));
    assert!(!text.contains("global dummy::f"));
}

#[test]
fn test_proc_order_toplevel_first() {
    let module = translate(&conditional_module());
    let names: Vec<&str> = module.procs.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["dummy::__module_body__", "dummy::coin", "dummy::f"]);
}

#[test]
fn test_empty_code_object_rejected() {
    let module = code_object("<module>", vec![], &[], &[], 0, vec![]);
    let err = to_module(Path::new("dummy.py"), &module).unwrap_err();
    assert!(matches!(err, TranslateError::EmptyCode { .. }));
}

#[test]
fn test_unknown_opcode_rejected() {
    let module = code_object(
        "<module>",
        vec![ConstValue::None],
        &[],
        &[],
        0,
        vec![instr("SETUP_FINALLY", 0, 0), instr("RETURN_VALUE", 0, 2)],
    );
    let err = to_module(Path::new("dummy.py"), &module).unwrap_err();
    match err {
        TranslateError::UnknownOpcode { opname, offset } => {
            assert_eq!(opname, "SETUP_FINALLY");
            assert_eq!(offset, 0);
        }
        other => panic!("expected UnknownOpcode, got {:?}", other),
    }
}

#[test]
fn test_stack_underflow_reported_with_offset() {
    let module = code_object(
        "<module>",
        vec![],
        &[],
        &[],
        0,
        vec![instr("RETURN_VALUE", 0, 0)],
    );
    let err = to_module(Path::new("dummy.py"), &module).unwrap_err();
    match err {
        TranslateError::StackUnderflow { offset, opcode } => {
            assert_eq!(offset, 0);
            assert_eq!(opcode, "RETURN_VALUE");
        }
        other => panic!("expected StackUnderflow, got {:?}", other),
    }
}

#[test]
fn test_make_function_closure_flags_rejected() {
    let f = code_object(
        "f",
        vec![ConstValue::None],
        &[],
        &[],
        0,
        vec![instr("LOAD_CONST", 0, 0), instr("RETURN_VALUE", 0, 2)],
    );
    let module = code_object(
        "<module>",
        vec![nested(f), ConstValue::Str("f".to_string()), ConstValue::None],
        &["f"],
        &[],
        0,
        vec![
            instr("LOAD_CONST", 0, 0),
            instr("LOAD_CONST", 1, 2),
            instr("MAKE_FUNCTION", 0x08, 4),
            instr("STORE_NAME", 0, 6),
            instr("LOAD_CONST", 2, 8),
            instr("RETURN_VALUE", 0, 10),
        ],
    );
    let err = to_module(Path::new("dummy.py"), &module).unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported { .. }));
}
