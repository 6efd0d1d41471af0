//! State table (C4): feedback cells with per-round liveness.
//!
//! Grounded on `original_source/vm/src/state.hpp` (the `{data, is_executed}`
//! pair) and `src/backend/bytecode/vm/state_ops.rs` for naming conventions,
//! adapted from MeTTa's mutable-state-cell opcode trio to the feedback-cell
//! garbage collection contract of spec.md §4.5/§4.6.

use tracing::trace;

use crate::error::{VmError, VmResult};
use crate::thread_table::ThreadId;
use crate::value::Value;

/// `{data, is_executed, owner_thread}`, all zeroed at install (spec.md §3).
#[derive(Debug, Clone)]
pub struct StateCell {
    pub data: Value,
    pub is_executed: bool,
    pub owner_thread: ThreadId,
}

impl Default for StateCell {
    fn default() -> Self {
        StateCell { data: Value::Undefined, is_executed: false, owner_thread: ThreadId(0) }
    }
}

#[derive(Debug, Default)]
pub struct StateTable {
    cells: Vec<StateCell>,
}

impl StateTable {
    pub fn new(size: usize) -> Self {
        StateTable { cells: vec![StateCell::default(); size] }
    }

    pub fn reset(&mut self, size: usize) {
        self.cells = vec![StateCell::default(); size];
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, i: usize) -> VmResult<&StateCell> {
        self.cells.get(i).ok_or(VmError::IndexOutOfBounds { index: i, len: self.cells.len() })
    }

    pub fn get_mut(&mut self, i: usize) -> VmResult<&mut StateCell> {
        let len = self.cells.len();
        self.cells.get_mut(i).ok_or(VmError::IndexOutOfBounds { index: i, len })
    }

    /// Mark cell `i` touched by `thread` this round, without changing its
    /// data (used by `SET_FEEDBACK`/`INIT_FEEDBACK` bookkeeping).
    pub fn mark_executed(&mut self, i: usize, thread: ThreadId) -> VmResult<()> {
        let cell = self.get_mut(i)?;
        cell.is_executed = true;
        cell.owner_thread = thread;
        Ok(())
    }

    /// Run the post-round garbage collection described in spec.md §4.5: for
    /// every cell owned by `thread`, if untouched this round its data resets
    /// to `Undefined`, otherwise the touched flag is cleared for the next
    /// round.
    pub fn gc_thread(&mut self, thread: ThreadId) {
        let mut reset = 0usize;
        let mut kept = 0usize;
        for cell in self.cells.iter_mut().filter(|c| c.owner_thread == thread) {
            if cell.is_executed {
                cell.is_executed = false;
                kept += 1;
            } else {
                cell.data = Value::Undefined;
                reset += 1;
            }
        }
        trace!(target: "delftproto::state", thread = thread.0, reset, kept, "gc_thread");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_cell_resets_after_gc() {
        let mut table = StateTable::new(2);
        table.mark_executed(0, ThreadId(0)).unwrap();
        table.get_mut(0).unwrap().data = Value::Number(5.0);
        // cell 1 never touched this round
        table.gc_thread(ThreadId(0));
        assert!(table.get(0).unwrap().is_executed == false);
        assert!(matches!(table.get(0).unwrap().data, Value::Number(n) if n == 5.0));
        assert!(matches!(table.get(1).unwrap().data, Value::Undefined));
    }

    #[test]
    fn cell_touched_every_round_survives() {
        let mut table = StateTable::new(1);
        for _ in 0..3 {
            table.mark_executed(0, ThreadId(0)).unwrap();
            table.gc_thread(ThreadId(0));
            assert!(!table.get(0).unwrap().is_executed);
        }
    }
}
