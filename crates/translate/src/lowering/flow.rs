//! Control-flow lowering
//!
//! Conditional jumps test through the `python_is_true` shim and close the
//! block with a two-way `jmp`; both successor blocks are registered with the
//! live stack as SSA parameters and a `prune` prelude for their arm. The
//! `FOR_ITER` rule reifies the loop header as a block labeled at its own
//! offset so the back edge has somewhere to jump.

use crate::builtins::Builtin;
use crate::error::TranslateResult;
use crate::labels::Prelude;
use crate::proc::{ProcTranslator, ITER_ITEM};
use crate::symbols::Info;
use pytir_bytecode::Instruction;
use pytir_textual::{Exp, Instr, NodeCall, Terminator, Typ};
use smallvec::{smallvec, SmallVec};

impl ProcTranslator<'_> {
    /// `POP_JUMP_IF_FALSE` / `POP_JUMP_IF_TRUE`: pop the tested value, bind
    /// the machine condition, close with a two-way jump (taken-arm first).
    pub(crate) fn lower_pop_jump(&mut self, target: u32, jump_when_false: bool) -> TranslateResult<()> {
        let cond = self.pop1()?;
        let (tested, _) = self.materialize_cell(&cond)?;
        self.env.record_builtin(Builtin::IsTrue);
        let c = self.env.mk_fresh_ident(Info::of_typ(Typ::Int));
        self.env.push_instr(Instr::Let {
            id: c,
            rhs: Exp::call(Builtin::IsTrue.qualified(), vec![tested]),
        });

        let (args, typs) = self.live_args()?;
        let (true_off, false_off) = if jump_when_false {
            (self.next_off, target)
        } else {
            (target, self.next_off)
        };
        let true_label = self.ensure_label(true_off, typs.clone(), Prelude::Prune(c))?;
        let false_label = self.ensure_label(false_off, typs, Prelude::PruneNot(c))?;
        self.close_with(Terminator::Jmp(smallvec![
            NodeCall {
                label: true_label,
                args: args.clone(),
            },
            NodeCall {
                label: false_label,
                args,
            },
        ]));
        Ok(())
    }

    /// `JUMP_IF_TRUE_OR_POP` / `JUMP_IF_FALSE_OR_POP`: the tested value stays
    /// live on the taken arm only.
    pub(crate) fn lower_or_pop_jump(&mut self, target: u32, jump_when_true: bool) -> TranslateResult<()> {
        let cond = self.pop1()?;
        let (tested, tested_typ) = self.materialize_cell(&cond)?;
        self.env.record_builtin(Builtin::IsTrue);
        let c = self.env.mk_fresh_ident(Info::of_typ(Typ::Int));
        self.env.push_instr(Instr::Let {
            id: c,
            rhs: Exp::call(Builtin::IsTrue.qualified(), vec![tested.clone()]),
        });

        let (rest_args, rest_typs) = self.live_args()?;
        let mut kept_args: SmallVec<[Exp; 4]> = smallvec![tested];
        kept_args.extend(rest_args.iter().cloned());
        let mut kept_typs: SmallVec<[Typ; 4]> = smallvec![tested_typ];
        kept_typs.extend(rest_typs.iter().cloned());

        let (true_label, true_args, false_label, false_args) = if jump_when_true {
            let t = self.ensure_label(target, kept_typs, Prelude::Prune(c))?;
            let f = self.ensure_label(self.next_off, rest_typs, Prelude::PruneNot(c))?;
            (t, kept_args, f, rest_args)
        } else {
            let t = self.ensure_label(self.next_off, rest_typs, Prelude::Prune(c))?;
            let f = self.ensure_label(target, kept_typs, Prelude::PruneNot(c))?;
            (t, rest_args, f, kept_args)
        };
        self.close_with(Terminator::Jmp(smallvec![
            NodeCall {
                label: true_label,
                args: true_args,
            },
            NodeCall {
                label: false_label,
                args: false_args,
            },
        ]));
        Ok(())
    }

    /// Unconditional jump carrying the live stack.
    pub(crate) fn lower_jump(&mut self, target: u32) -> TranslateResult<()> {
        let (args, typs) = self.live_args()?;
        let label = self.ensure_label(target, typs, Prelude::Nothing)?;
        self.close_with(Terminator::Jmp(smallvec![NodeCall { label, args }]));
        Ok(())
    }

    /// `GET_ITER`: `$builtins.python_iter(x) : *PyObject`.
    pub(crate) fn lower_get_iter(&mut self) -> TranslateResult<()> {
        let cell = self.pop1()?;
        let (exp, _) = self.materialize_cell(&cell)?;
        self.env.record_builtin(Builtin::PythonIter);
        let id = self.env.mk_fresh_ident(Info::of_typ(Typ::PyObject));
        self.env.push_instr(Instr::Let {
            id,
            rhs: Exp::call(Builtin::PythonIter.qualified(), vec![exp]),
        });
        self.env.stack.push(crate::stack::DataCell::Temp(id));
        Ok(())
    }

    /// `FOR_ITER delta`: reify the loop header at this offset, pull the next
    /// iteration item and branch on `has_item`. The body arm carries the item
    /// record as an extra leading SSA parameter; its prelude loads
    /// `next_item` back onto the stack. The exit arm drops the iterator.
    pub(crate) fn lower_for_iter(&mut self, instr: &Instruction) -> TranslateResult<()> {
        let exit_target = self.next_off + instr.arg;

        let (args, typs) = self.live_args()?;
        if args.is_empty() {
            return Err(self.underflow());
        }
        let header = self.ensure_label(self.offset, typs, Prelude::Nothing)?;
        self.close_with(Terminator::Jmp(smallvec![NodeCall {
            label: header,
            args,
        }]));
        let info = self
            .env
            .labels
            .get(self.offset)
            .cloned()
            .expect("loop header label was just registered");
        self.env.labels.mark_processed(self.offset);
        self.open_from_label(&info)?;

        let it_cell = self
            .env
            .stack
            .peek()
            .cloned()
            .ok_or_else(|| self.underflow())?;
        let (it_exp, _) = self.materialize_cell(&it_cell)?;
        self.env.record_builtin(Builtin::PythonIterNext);
        let item = self.env.mk_fresh_ident(Info::of_typ(Typ::PyIterItem));
        self.env.push_instr(Instr::Let {
            id: item,
            rhs: Exp::call(Builtin::PythonIterNext.qualified(), vec![it_exp]),
        });
        let has = self.env.mk_fresh_ident(Info::of_typ(Typ::Int));
        self.env.push_instr(Instr::Load {
            id: has,
            typ: Typ::Int,
            src: Exp::Field {
                base: Box::new(Exp::Var(item)),
                record: Some(ITER_ITEM.to_string()),
                name: "has_item".to_string(),
            },
        });

        let (live, live_typs) = self.live_args()?;
        let mut body_args: SmallVec<[Exp; 4]> = smallvec![Exp::Var(item)];
        body_args.extend(live.iter().cloned());
        let mut body_typs: SmallVec<[Typ; 4]> = smallvec![Typ::PyIterItem];
        body_typs.extend(live_typs.iter().cloned());
        let body_label =
            self.ensure_label(self.next_off, body_typs, Prelude::PruneThenLoadNext(has))?;

        let exit_args: SmallVec<[Exp; 4]> = live.iter().skip(1).cloned().collect();
        let exit_typs: SmallVec<[Typ; 4]> = live_typs.iter().skip(1).cloned().collect();
        let exit_label = self.ensure_label(exit_target, exit_typs, Prelude::PruneNot(has))?;

        self.close_with(Terminator::Jmp(smallvec![
            NodeCall {
                label: body_label,
                args: body_args,
            },
            NodeCall {
                label: exit_label,
                args: exit_args,
            },
        ]));
        Ok(())
    }

    /// `RETURN_VALUE`: close the block with `ret`.
    pub(crate) fn lower_return(&mut self) -> TranslateResult<()> {
        let cell = self.pop1()?;
        let (exp, _) = self.materialize_cell(&cell)?;
        self.close_with(Terminator::Ret(exp));
        Ok(())
    }
}
