//! Symbol and type registry
//!
//! Two scopes: module-level globals and procedure-level locals, with local
//! shadowing global on lookup. Duplicate registration is not an error; the
//! later entry wins, which is exactly the source language's shadowing
//! semantics. The registry also records function/method signatures and the
//! field tables of user classes (refined lazily from `self.<attr>` stores).

use indexmap::IndexMap;
use pytir_textual::Typ;

/// A line-number source location. The instruction stream only carries
/// `starts_line`, so there is nothing finer to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLoc {
    pub line: Option<u32>,
}

impl SourceLoc {
    pub fn line(line: u32) -> Self {
        Self { line: Some(line) }
    }
}

/// A dotted path locating a symbol: `module::fn`, `module::Class::method`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub value: String,
    pub loc: SourceLoc,
}

impl QualifiedName {
    pub fn new(value: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            value: value.into(),
            loc,
        }
    }

    /// The last path segment: `module::C::get` -> `get`.
    pub fn short(&self) -> &str {
        self.value.rsplit("::").next().unwrap_or(&self.value)
    }
}

/// Coarse type information attached to symbols and temporaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub is_code: bool,
    pub is_class: bool,
    pub typ: Typ,
}

impl Info {
    pub fn of_typ(typ: Typ) -> Self {
        Self {
            is_code: false,
            is_class: false,
            typ,
        }
    }

    pub fn code() -> Self {
        Self {
            is_code: true,
            is_class: false,
            typ: Typ::PyCode,
        }
    }

    pub fn class() -> Self {
        Self {
            is_code: false,
            is_class: true,
            typ: Typ::PyClass,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub qualified_name: QualifiedName,
    pub is_builtin: bool,
    pub info: Info,
}

/// An annotated procedure signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<(String, Typ)>,
    pub ret: Typ,
}

impl Signature {
    pub fn untyped() -> Self {
        Self {
            params: Vec::new(),
            ret: Typ::PyObject,
        }
    }

    pub fn param_typ(&self, name: &str) -> Option<&Typ> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: IndexMap<String, SymbolInfo>,
    locals: IndexMap<String, SymbolInfo>,
    /// Signatures keyed by (enclosing class or module, procedure name).
    signatures: IndexMap<(String, String), Signature>,
    /// Class name -> field table, in registration order.
    classes: IndexMap<String, IndexMap<String, Typ>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_symbol(&mut self, is_global: bool, name: &str, info: SymbolInfo) {
        let scope = if is_global {
            &mut self.globals
        } else {
            &mut self.locals
        };
        scope.insert(name.to_string(), info);
    }

    pub fn lookup_symbol(&self, is_global: bool, name: &str) -> Option<&SymbolInfo> {
        let scope = if is_global { &self.globals } else { &self.locals };
        scope.get(name)
    }

    /// Scoped lookup with local shadowing global.
    pub fn lookup(&self, name: &str) -> Option<&SymbolInfo> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }

    pub fn reset_locals(&mut self) {
        self.locals.clear();
    }

    pub fn register_function(&mut self, module: &str, name: &str, sig: Signature) {
        self.signatures
            .insert((module.to_string(), name.to_string()), sig);
    }

    pub fn register_method(&mut self, class: &str, name: &str, sig: Signature) {
        self.signatures
            .insert((class.to_string(), name.to_string()), sig);
    }

    pub fn lookup_signature(&self, enclosing: &str, name: &str) -> Option<&Signature> {
        self.signatures
            .get(&(enclosing.to_string(), name.to_string()))
    }

    pub fn register_class(&mut self, name: &str) {
        self.classes.entry(name.to_string()).or_default();
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Record a field written in a class body. The first write fixes the
    /// type; later writes with other types widen nothing (source semantics
    /// keep the annotated store authoritative).
    pub fn register_class_field(&mut self, class: &str, field: &str, typ: Typ) {
        let fields = self.classes.entry(class.to_string()).or_default();
        fields.entry(field.to_string()).or_insert(typ);
    }

    pub fn classes(&self) -> impl Iterator<Item = (&String, &IndexMap<String, Typ>)> {
        self.classes.iter()
    }

    pub fn globals(&self) -> impl Iterator<Item = (&String, &SymbolInfo)> {
        self.globals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(qualified: &str, typ: Typ) -> SymbolInfo {
        SymbolInfo {
            qualified_name: QualifiedName::new(qualified, SourceLoc::default()),
            is_builtin: false,
            info: Info::of_typ(typ),
        }
    }

    #[test]
    fn test_local_shadows_global() {
        let mut table = SymbolTable::new();
        table.register_symbol(true, "x", sym("dummy::x", Typ::PyObject));
        table.register_symbol(false, "x", sym("x", Typ::PyInt));

        let found = table.lookup("x").unwrap();
        assert_eq!(found.info.typ, Typ::PyInt);

        table.reset_locals();
        let found = table.lookup("x").unwrap();
        assert_eq!(found.info.typ, Typ::PyObject);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut table = SymbolTable::new();
        table.register_symbol(true, "x", sym("dummy::x", Typ::PyInt));
        table.register_symbol(true, "x", sym("dummy::x", Typ::PyString));
        assert_eq!(table.lookup("x").unwrap().info.typ, Typ::PyString);
    }

    #[test]
    fn test_signatures() {
        let mut table = SymbolTable::new();
        table.register_function(
            "dummy",
            "f",
            Signature {
                params: vec![("x".to_string(), Typ::PyInt)],
                ret: Typ::PyBool,
            },
        );
        table.register_method("C", "get", Signature::untyped());

        let sig = table.lookup_signature("dummy", "f").unwrap();
        assert_eq!(sig.ret, Typ::PyBool);
        assert_eq!(sig.param_typ("x"), Some(&Typ::PyInt));
        assert!(table.lookup_signature("C", "get").is_some());
        assert!(table.lookup_signature("C", "set").is_none());
    }

    #[test]
    fn test_class_fields_first_write_wins() {
        let mut table = SymbolTable::new();
        table.register_class("C");
        table.register_class_field("C", "x", Typ::PyInt);
        table.register_class_field("C", "x", Typ::PyObject);

        let (_, fields) = table.classes().next().unwrap();
        assert_eq!(fields.get("x"), Some(&Typ::PyInt));
    }

    #[test]
    fn test_qualified_short() {
        let q = QualifiedName::new("dummy::C::get", SourceLoc::line(3));
        assert_eq!(q.short(), "get");
        assert_eq!(q.loc.line, Some(3));
    }
}
