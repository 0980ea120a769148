//! IR types
//!
//! Three flavors coexist:
//! - raw machine types (`int`, `float`, `*String`) used in builtin
//!   signatures and for boolean test results
//! - boxed runtime types (`*PyObject`, `*PyInt`, ...) used everywhere a
//!   source-language value flows
//! - named record types (`*C`) for user classes

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Typ {
    /// Machine integer, printed `int`.
    Int,
    /// Machine float, printed `float`.
    Float,
    /// Raw string literal, printed `*String`.
    Str,
    PyObject,
    PyInt,
    PyFloat,
    PyBool,
    PyString,
    PyNone,
    PyCode,
    PyClass,
    PyMethod,
    PyIterItem,
    /// A user class record type, printed `*Name`.
    Struct(String),
}

impl Typ {
    /// Whether the type is one of the boxed runtime types (prints with a
    /// leading `*`).
    pub fn is_boxed(&self) -> bool {
        !matches!(self, Typ::Int | Typ::Float)
    }
}

impl fmt::Display for Typ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typ::Int => write!(f, "int"),
            Typ::Float => write!(f, "float"),
            Typ::Str => write!(f, "*String"),
            Typ::PyObject => write!(f, "*PyObject"),
            Typ::PyInt => write!(f, "*PyInt"),
            Typ::PyFloat => write!(f, "*PyFloat"),
            Typ::PyBool => write!(f, "*PyBool"),
            Typ::PyString => write!(f, "*PyString"),
            Typ::PyNone => write!(f, "*PyNone"),
            Typ::PyCode => write!(f, "*PyCode"),
            Typ::PyClass => write!(f, "*PyClass"),
            Typ::PyMethod => write!(f, "*PyMethod"),
            Typ::PyIterItem => write!(f, "*PyIterItem"),
            Typ::Struct(name) => write!(f, "*{}", name),
        }
    }
}
