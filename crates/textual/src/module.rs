//! Textual IR module structure
//!
//! Everything a translated module contains:
//! - procedure declarations with SSA blocks
//! - global variable declarations
//! - record type declarations
//! - external builtin declarations

use crate::types::Typ;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// An SSA identifier, printed `n0`, `n1`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ident(pub u32);

/// A literal constant in expression position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Const {
    Int(i64),
    Float(f64),
    Str(String),
    Null,
}

/// An IR expression. Expressions are pure; anything with an effect is an
/// [`Instr`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Exp {
    /// A previously bound SSA identifier.
    Var(Ident),
    /// The address of a variable: `&x` or `&module::x`.
    Lvar(String),
    /// Field access. `record` names the record type when it is known
    /// (`base.PyIterItem.has_item`); otherwise the unknown-record form
    /// `base.?.attr` is printed.
    Field {
        base: Box<Exp>,
        record: Option<String>,
        name: String,
    },
    Const(Const),
    /// A call to a procedure or builtin: `dummy::f(...)`,
    /// `$builtins.python_int(42)`.
    Call { proc: String, args: Vec<Exp> },
    /// Logical negation of a machine boolean: `__sil_lnot(e)`.
    Not(Box<Exp>),
}

impl Exp {
    pub fn call(proc: impl Into<String>, args: Vec<Exp>) -> Exp {
        Exp::Call {
            proc: proc.into(),
            args,
        }
    }

    pub fn null() -> Exp {
        Exp::Const(Const::Null)
    }
}

/// A single IR instruction inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    /// `n0:*T = load <src>`
    Load { id: Ident, typ: Typ, src: Exp },
    /// `store <dst> <- <rhs>: *T`
    Store { dst: Exp, rhs: Exp, typ: Typ },
    /// `n0 = <rhs>`
    Let { id: Ident, rhs: Exp },
    /// `prune <cond>`
    Prune { cond: Exp },
}

/// One jump target with its SSA arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCall {
    pub label: String,
    pub args: SmallVec<[Exp; 4]>,
}

impl NodeCall {
    pub fn new(label: impl Into<String>, args: impl IntoIterator<Item = Exp>) -> Self {
        Self {
            label: label.into(),
            args: args.into_iter().collect(),
        }
    }
}

/// Block terminator. `Jmp` carries one target for unconditional flow, two for
/// a pruned conditional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Jmp(SmallVec<[NodeCall; 2]>),
    Ret(Exp),
}

/// A labeled basic block with SSA parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub params: Vec<(Ident, Typ)>,
    pub instrs: Vec<Instr>,
    pub term: Terminator,
}

/// A procedure declaration: `define name(params) : *R { blocks }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcDecl {
    pub name: String,
    pub params: Vec<(String, Typ)>,
    pub result: Typ,
    pub blocks: Vec<Block>,
}

/// `global name: *T`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub typ: Typ,
}

/// `type Name = {field: *T; ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, Typ)>,
}

/// `declare $builtins.name(params) : *T`. `params` is `None` for a variadic
/// declaration, printed `(...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinDecl {
    pub name: String,
    pub params: Option<Vec<Typ>>,
    pub result: Typ,
}

/// A complete Textual IR module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub source_language: String,
    pub procs: Vec<ProcDecl>,
    pub globals: Vec<Global>,
    pub structs: Vec<StructDecl>,
    pub declares: Vec<BuiltinDecl>,
}

impl Module {
    pub fn new() -> Self {
        Self {
            source_language: "python".to_string(),
            procs: Vec::new(),
            globals: Vec::new(),
            structs: Vec::new(),
            declares: Vec::new(),
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}
