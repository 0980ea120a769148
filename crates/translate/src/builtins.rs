//! Builtin registry
//!
//! The translator models source-language primitives through external "shim"
//! procedures under the `$builtins` namespace. Shims referenced during
//! lowering are recorded and declared at module assembly; the primitive
//! wrappers (`python_int`, `python_bool`, `python_string`, `python_tuple`)
//! are declared unconditionally.
//!
//! A small table of host builtins (`print`, `range`, ...) is also kept:
//! calls whose callee resolves to neither a local nor a user global but
//! matches the table are emitted as direct `$builtins` calls.

use indexmap::IndexSet;
use pytir_textual::{BuiltinDecl, Typ};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    IsTrue,
    BinaryAdd,
    PythonCall,
    PythonCallMethod,
    PythonClass,
    PythonClassConstructor,
    PythonCode,
    PythonFloat,
    PythonIter,
    PythonIterNext,
    PythonLoadMethod,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::IsTrue => "python_is_true",
            Builtin::BinaryAdd => "binary_add",
            Builtin::PythonCall => "python_call",
            Builtin::PythonCallMethod => "python_call_method",
            Builtin::PythonClass => "python_class",
            Builtin::PythonClassConstructor => "python_class_constructor",
            Builtin::PythonCode => "python_code",
            Builtin::PythonFloat => "python_float",
            Builtin::PythonIter => "python_iter",
            Builtin::PythonIterNext => "python_iter_next",
            Builtin::PythonLoadMethod => "python_load_method",
        }
    }

    /// The fully qualified callee name as it appears in call expressions.
    pub fn qualified(&self) -> String {
        format!("$builtins.{}", self.name())
    }

    /// The fixed IR signature. `None` parameters mean variadic.
    pub fn decl(&self) -> BuiltinDecl {
        let (params, result) = match self {
            Builtin::IsTrue => (Some(vec![Typ::PyObject]), Typ::Int),
            Builtin::BinaryAdd => (Some(vec![Typ::PyObject, Typ::PyObject]), Typ::PyObject),
            Builtin::PythonCall => (None, Typ::PyObject),
            Builtin::PythonCallMethod => (None, Typ::PyObject),
            Builtin::PythonClass => (Some(vec![Typ::Str]), Typ::PyClass),
            Builtin::PythonClassConstructor => (None, Typ::PyObject),
            Builtin::PythonCode => (Some(vec![Typ::Str]), Typ::PyCode),
            Builtin::PythonFloat => (Some(vec![Typ::Float]), Typ::PyFloat),
            Builtin::PythonIter => (Some(vec![Typ::PyObject]), Typ::PyObject),
            Builtin::PythonIterNext => (Some(vec![Typ::PyObject]), Typ::PyIterItem),
            Builtin::PythonLoadMethod => (Some(vec![Typ::PyObject, Typ::Str]), Typ::PyMethod),
        };
        BuiltinDecl {
            name: self.name().to_string(),
            params,
            result,
        }
    }
}

/// Host builtins the translator recognizes by name at call sites.
const HOST_BUILTINS: &[&str] = &["print", "range", "len"];

pub fn host_builtin(name: &str) -> Option<&'static str> {
    HOST_BUILTINS.iter().find(|&&h| h == name).copied()
}

/// Primitive wrappers, declared in every module.
fn wrapper_decls() -> Vec<BuiltinDecl> {
    vec![
        BuiltinDecl {
            name: "python_int".to_string(),
            params: Some(vec![Typ::Int]),
            result: Typ::PyInt,
        },
        BuiltinDecl {
            name: "python_bool".to_string(),
            params: Some(vec![Typ::Int]),
            result: Typ::PyBool,
        },
        BuiltinDecl {
            name: "python_string".to_string(),
            params: Some(vec![Typ::Str]),
            result: Typ::PyString,
        },
        BuiltinDecl {
            name: "python_tuple".to_string(),
            params: None,
            result: Typ::PyObject,
        },
    ]
}

/// Assemble the `declare` list: referenced shims in first-use order, then
/// referenced host builtins, then the unconditional wrappers.
pub fn declarations(
    shims: &IndexSet<Builtin>,
    hosts: &IndexSet<&'static str>,
) -> Vec<BuiltinDecl> {
    let mut decls: Vec<BuiltinDecl> = shims.iter().map(Builtin::decl).collect();
    decls.extend(hosts.iter().map(|host| BuiltinDecl {
        name: (*host).to_string(),
        params: None,
        result: Typ::PyObject,
    }));
    decls.extend(wrapper_decls());
    decls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shim_names() {
        assert_eq!(Builtin::IsTrue.name(), "python_is_true");
        assert_eq!(Builtin::BinaryAdd.qualified(), "$builtins.binary_add");
    }

    #[test]
    fn test_shim_signatures() {
        let decl = Builtin::IsTrue.decl();
        assert_eq!(decl.params, Some(vec![Typ::PyObject]));
        assert_eq!(decl.result, Typ::Int);

        let call = Builtin::PythonCall.decl();
        assert_eq!(call.params, None);
    }

    #[test]
    fn test_host_table() {
        assert_eq!(host_builtin("print"), Some("print"));
        assert_eq!(host_builtin("range"), Some("range"));
        assert_eq!(host_builtin("coin"), None);
    }

    #[test]
    fn test_declarations_always_include_wrappers() {
        let decls = declarations(&IndexSet::new(), &IndexSet::new());
        let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["python_int", "python_bool", "python_string", "python_tuple"]
        );
    }

    #[test]
    fn test_declarations_order() {
        let mut shims = IndexSet::new();
        shims.insert(Builtin::BinaryAdd);
        shims.insert(Builtin::IsTrue);
        let mut hosts = IndexSet::new();
        hosts.insert("print");

        let decls = declarations(&shims, &hosts);
        let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "binary_add",
                "python_is_true",
                "print",
                "python_int",
                "python_bool",
                "python_string",
                "python_tuple"
            ]
        );
    }
}
