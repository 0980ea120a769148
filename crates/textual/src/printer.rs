//! Textual pretty-printer
//!
//! `Display` impls for every IR node. Formatting contract:
//! - block labels are indented two spaces, instructions six
//! - SSA bindings print without a space around the colon (`n0:*PyObject`),
//!   definition parameters and results with one (`x: *PyObject`, `: *R`)
//! - one emitted line per instruction, so downstream tools can diff output
//!   line by line

use crate::module::{
    Block, BuiltinDecl, Const, Exp, Global, Ident, Instr, Module, NodeCall, ProcDecl, StructDecl,
    Terminator,
};
use std::fmt;

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Int(i) => write!(f, "{}", i),
            Const::Float(x) => write!(f, "{:?}", x),
            Const::Str(s) => write!(f, "{:?}", s),
            Const::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::Var(id) => write!(f, "{}", id),
            Exp::Lvar(name) => write!(f, "&{}", name),
            Exp::Field { base, record, name } => match record {
                Some(rec) => write!(f, "{}.{}.{}", base, rec, name),
                None => write!(f, "{}.?.{}", base, name),
            },
            Exp::Const(c) => write!(f, "{}", c),
            Exp::Call { proc, args } => {
                write!(f, "{}(", proc)?;
                write_comma_sep(f, args)?;
                write!(f, ")")
            }
            Exp::Not(e) => write!(f, "__sil_lnot({})", e),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Load { id, typ, src } => write!(f, "{}:{} = load {}", id, typ, src),
            Instr::Store { dst, rhs, typ } => write!(f, "store {} <- {}: {}", dst, rhs, typ),
            Instr::Let { id, rhs } => write!(f, "{} = {}", id, rhs),
            Instr::Prune { cond } => write!(f, "prune {}", cond),
        }
    }
}

impl fmt::Display for NodeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.label)
        } else {
            write!(f, "{}(", self.label)?;
            write_comma_sep(f, &self.args)?;
            write!(f, ")")
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jmp(targets) => {
                write!(f, "jmp ")?;
                write_comma_sep(f, targets)
            }
            Terminator::Ret(e) => write!(f, "ret {}", e),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  #{}", self.label)?;
        if !self.params.is_empty() {
            write!(f, "(")?;
            for (i, (id, typ)) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}:{}", id, typ)?;
            }
            write!(f, ")")?;
        }
        writeln!(f, ":")?;
        for instr in &self.instrs {
            writeln!(f, "      {}", instr)?;
        }
        writeln!(f, "      {}", self.term)
    }
}

impl fmt::Display for ProcDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "define {}(", self.name)?;
        for (i, (name, typ)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, typ)?;
        }
        writeln!(f, ") : {} {{", self.result)?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "global {}: {}", self.name, self.typ)
    }
}

impl fmt::Display for StructDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type {} = {{", self.name)?;
        for (i, (name, typ)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", name, typ)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for BuiltinDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "declare $builtins.{}(", self.name)?;
        match &self.params {
            Some(typs) => write_comma_sep(f, typs)?,
            None => write!(f, "...")?,
        }
        writeln!(f, ") : {}", self.result)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".source_language = {:?}", self.source_language)?;
        for proc in &self.procs {
            writeln!(f)?;
            write!(f, "{}", proc)?;
        }
        if !self.globals.is_empty() {
            writeln!(f)?;
            for global in &self.globals {
                write!(f, "{}", global)?;
            }
        }
        if !self.structs.is_empty() {
            writeln!(f)?;
            for decl in &self.structs {
                write!(f, "{}", decl)?;
            }
        }
        if !self.declares.is_empty() {
            writeln!(f)?;
            for decl in &self.declares {
                write!(f, "{}", decl)?;
            }
        }
        Ok(())
    }
}

fn write_comma_sep<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Typ;
    use smallvec::smallvec;

    #[test]
    fn test_exp_display() {
        assert_eq!(Exp::Var(Ident(3)).to_string(), "n3");
        assert_eq!(Exp::Lvar("dummy::x".to_string()).to_string(), "&dummy::x");
        assert_eq!(
            Exp::call("$builtins.python_int", vec![Exp::Const(Const::Int(42))]).to_string(),
            "$builtins.python_int(42)"
        );
        assert_eq!(
            Exp::Not(Box::new(Exp::Var(Ident(1)))).to_string(),
            "__sil_lnot(n1)"
        );
    }

    #[test]
    fn test_field_display() {
        let unknown = Exp::Field {
            base: Box::new(Exp::Var(Ident(0))),
            record: None,
            name: "attr".to_string(),
        };
        assert_eq!(unknown.to_string(), "n0.?.attr");

        let known = Exp::Field {
            base: Box::new(Exp::Var(Ident(3))),
            record: Some("PyIterItem".to_string()),
            name: "has_item".to_string(),
        };
        assert_eq!(known.to_string(), "n3.PyIterItem.has_item");
    }

    #[test]
    fn test_instr_display() {
        let load = Instr::Load {
            id: Ident(0),
            typ: Typ::PyObject,
            src: Exp::Lvar("dummy::x".to_string()),
        };
        assert_eq!(load.to_string(), "n0:*PyObject = load &dummy::x");

        let store = Instr::Store {
            dst: Exp::Lvar("dummy::x".to_string()),
            rhs: Exp::call("$builtins.python_int", vec![Exp::Const(Const::Int(42))]),
            typ: Typ::PyInt,
        };
        assert_eq!(
            store.to_string(),
            "store &dummy::x <- $builtins.python_int(42): *PyInt"
        );
    }

    #[test]
    fn test_terminator_display() {
        let jmp = Terminator::Jmp(smallvec![
            NodeCall::new("b1", [Exp::Var(Ident(0))]),
            NodeCall::new("b2", []),
        ]);
        assert_eq!(jmp.to_string(), "jmp b1(n0), b2");
        assert_eq!(Terminator::Ret(Exp::null()).to_string(), "ret null");
    }

    #[test]
    fn test_block_display() {
        let block = Block {
            label: "b1".to_string(),
            params: vec![(Ident(5), Typ::PyInt), (Ident(6), Typ::PyCode)],
            instrs: vec![Instr::Prune {
                cond: Exp::Var(Ident(1)),
            }],
            term: Terminator::Ret(Exp::Var(Ident(5))),
        };
        let expected = "  #b1(n5:*PyInt, n6:*PyCode):\n      prune n1\n      ret n5\n";
        assert_eq!(block.to_string(), expected);
    }

    #[test]
    fn test_struct_decl_display() {
        let decl = StructDecl {
            name: "PyIterItem".to_string(),
            fields: vec![
                ("has_item".to_string(), Typ::Int),
                ("next_item".to_string(), Typ::PyObject),
            ],
        };
        assert_eq!(
            decl.to_string(),
            "type PyIterItem = {has_item: int; next_item: *PyObject}\n"
        );
    }

    #[test]
    fn test_builtin_decl_display() {
        let fixed = BuiltinDecl {
            name: "python_int".to_string(),
            params: Some(vec![Typ::Int]),
            result: Typ::PyInt,
        };
        assert_eq!(fixed.to_string(), "declare $builtins.python_int(int) : *PyInt\n");

        let variadic = BuiltinDecl {
            name: "python_call".to_string(),
            params: None,
            result: Typ::PyObject,
        };
        assert_eq!(
            variadic.to_string(),
            "declare $builtins.python_call(...) : *PyObject\n"
        );
    }

    #[test]
    fn test_module_display_header() {
        let module = Module::new();
        assert_eq!(module.to_string(), ".source_language = \"python\"\n");
    }
}
