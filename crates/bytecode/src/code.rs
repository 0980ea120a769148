//! Code objects
//!
//! A code object is one compiled unit (module, function or class body) with
//! its constants pool, names tables and instruction stream. Nested units
//! appear as [`ConstValue::Code`] constants; they share structure through
//! `Arc` so data-stack cells can reference them cheaply.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One entry of the constants pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    None,
    /// A flat tuple of constants (annotation key tuples, literal tuples).
    Tuple(Vec<ConstValue>),
    /// A nested code object (function body, class body).
    Code(Arc<CodeObject>),
}

impl ConstValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&Arc<CodeObject>> {
        match self {
            ConstValue::Code(code) => Some(code),
            _ => None,
        }
    }
}

/// One disassembled instruction. `opname` is kept as the raw disassembler
/// string; the translator resolves it against the opcode table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opname: String,
    #[serde(default)]
    pub arg: u32,
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_line: Option<u32>,
}

impl Instruction {
    pub fn new(opname: impl Into<String>, arg: u32, offset: u32) -> Self {
        Self {
            opname: opname.into(),
            arg,
            offset,
            starts_line: None,
        }
    }
}

/// A compiled unit: constants, names tables, argument count and the linear
/// instruction stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeObject {
    pub filename: String,
    pub name: String,
    #[serde(rename = "co_consts", default)]
    pub consts: Vec<ConstValue>,
    #[serde(rename = "co_names", default)]
    pub names: Vec<String>,
    #[serde(rename = "co_varnames", default)]
    pub varnames: Vec<String>,
    #[serde(rename = "co_argcount", default)]
    pub argcount: u32,
    #[serde(rename = "co_flags", default)]
    pub flags: u32,
    pub instructions: Vec<Instruction>,
}

impl CodeObject {
    pub fn const_at(&self, idx: u32) -> Option<&ConstValue> {
        self.consts.get(idx as usize)
    }

    pub fn name_at(&self, idx: u32) -> Option<&str> {
        self.names.get(idx as usize).map(String::as_str)
    }

    pub fn varname_at(&self, idx: u32) -> Option<&str> {
        self.varnames.get(idx as usize).map(String::as_str)
    }

    /// Names of the positional parameters, in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.varnames[..self.argcount.min(self.varnames.len() as u32) as usize]
    }
}
