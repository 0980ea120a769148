//! Label and block bookkeeping
//!
//! Forward jump targets are registered as pending labels keyed by bytecode
//! offset. A label records the block name, the types of the SSA parameters
//! (one per stack cell live at the join) and a deferred prelude applied when
//! the block is materialized. The `processed` flag guarantees each block body
//! is emitted exactly once and detects `for`-loop back edges.

use indexmap::IndexMap;
use pytir_textual::{Ident, Typ};
use smallvec::SmallVec;

/// Deferred block-entry transformation, applied by the materializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prelude {
    Nothing,
    /// `prune c`: the arm where the condition held.
    Prune(Ident),
    /// `prune __sil_lnot(c)`: the arm where it did not.
    PruneNot(Ident),
    /// `FOR_ITER` body arm: `prune c`, then replace the iteration-item
    /// parameter on top of the stack with a load of its `next_item` field.
    PruneThenLoadNext(Ident),
}

#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub name: String,
    pub ssa_params: SmallVec<[Typ; 4]>,
    pub prelude: Prelude,
    pub processed: bool,
}

impl LabelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ssa_params: SmallVec::new(),
            prelude: Prelude::Nothing,
            processed: false,
        }
    }

    pub fn with_ssa_params(name: impl Into<String>, typs: impl IntoIterator<Item = Typ>) -> Self {
        Self {
            name: name.into(),
            ssa_params: typs.into_iter().collect(),
            prelude: Prelude::Nothing,
            processed: false,
        }
    }

    pub fn with_prelude(mut self, prelude: Prelude) -> Self {
        self.prelude = prelude;
        self
    }
}

/// Outcome of merging a registration into an existing label.
#[derive(Debug, PartialEq, Eq)]
pub struct ArityMismatch {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Default)]
pub struct LabelMap {
    by_offset: IndexMap<u32, LabelInfo>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label at a future offset. Registering where a label already
    /// exists merges: arities must agree, and a non-trivial existing prelude
    /// wins (two non-trivial preludes never meet on the forward-only CFGs the
    /// translator accepts).
    pub fn register(&mut self, offset: u32, info: LabelInfo) -> Result<(), ArityMismatch> {
        if let Some(existing) = self.by_offset.get_mut(&offset) {
            if existing.ssa_params.len() != info.ssa_params.len() {
                return Err(ArityMismatch {
                    expected: existing.ssa_params.len(),
                    actual: info.ssa_params.len(),
                });
            }
            if existing.prelude == Prelude::Nothing {
                existing.prelude = info.prelude;
            }
            return Ok(());
        }
        self.by_offset.insert(offset, info);
        Ok(())
    }

    pub fn get(&self, offset: u32) -> Option<&LabelInfo> {
        self.by_offset.get(&offset)
    }

    pub fn mark_processed(&mut self, offset: u32) {
        if let Some(info) = self.by_offset.get_mut(&offset) {
            info.processed = true;
        }
    }

    pub fn clear(&mut self) {
        self.by_offset.clear();
    }
}
